use axum::{
    extract::{rejection::JsonRejection, Path},
    Json,
};

use crate::database::models::{Publication, PublicationInput};
use crate::handlers::{parse_orcid, parse_uuid};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::PublicationService;

/// POST /api/researchers/:orcid/publications - add a local publication
pub async fn create(
    auth: AuthUser,
    Path(orcid): Path<String>,
    payload: Result<Json<PublicationInput>, JsonRejection>,
) -> ApiResult<Publication> {
    let orcid_id = parse_orcid(&orcid)?;
    auth.ensure_owner(orcid_id.as_str())?;
    let Json(input) = payload?;

    let publication = PublicationService::connect().await?.create(&orcid_id, input).await?;
    Ok(ApiResponse::created(publication))
}

/// PUT /api/publications/:id
pub async fn update(
    auth: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<PublicationInput>, JsonRejection>,
) -> ApiResult<Publication> {
    let id = parse_uuid(&id, "publication")?;
    let Json(input) = payload?;

    let service = PublicationService::connect().await?;
    auth.ensure_owner(&service.owner_of(id).await?)?;
    let publication = service.update(id, input).await?;
    Ok(ApiResponse::success(publication))
}

/// DELETE /api/publications/:id
pub async fn delete(auth: AuthUser, Path(id): Path<String>) -> ApiResult<()> {
    let id = parse_uuid(&id, "publication")?;

    let service = PublicationService::connect().await?;
    auth.ensure_owner(&service.owner_of(id).await?)?;
    service.delete(id).await?;
    Ok(ApiResponse::<()>::no_content())
}
