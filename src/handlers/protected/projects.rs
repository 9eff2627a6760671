use axum::{
    extract::{rejection::JsonRejection, Path},
    Json,
};

use crate::database::models::{MemberInput, ProjectInput, ProjectView};
use crate::handlers::{parse_orcid, parse_uuid};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::ProjectService;

/// Connects the service and checks the caller owns the project.
async fn owned(auth: &AuthUser, id: uuid::Uuid) -> Result<ProjectService, crate::error::ApiError> {
    let service = ProjectService::connect().await?;
    auth.ensure_owner(&service.owner_of(id).await?)?;
    Ok(service)
}

/// POST /api/researchers/:orcid/projects
pub async fn create(
    auth: AuthUser,
    Path(orcid): Path<String>,
    payload: Result<Json<ProjectInput>, JsonRejection>,
) -> ApiResult<ProjectView> {
    let orcid_id = parse_orcid(&orcid)?;
    auth.ensure_owner(orcid_id.as_str())?;
    let Json(input) = payload?;

    let project = ProjectService::connect().await?.create(&orcid_id, input).await?;
    Ok(ApiResponse::created(project))
}

/// PUT /api/projects/:id
pub async fn update(
    auth: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<ProjectInput>, JsonRejection>,
) -> ApiResult<ProjectView> {
    let id = parse_uuid(&id, "project")?;
    let Json(input) = payload?;

    let project = owned(&auth, id).await?.update(id, input).await?;
    Ok(ApiResponse::success(project))
}

/// DELETE /api/projects/:id
pub async fn delete(auth: AuthUser, Path(id): Path<String>) -> ApiResult<()> {
    let id = parse_uuid(&id, "project")?;
    owned(&auth, id).await?.delete(id).await?;
    Ok(ApiResponse::<()>::no_content())
}

/// POST /api/projects/:id/members - add a registered researcher or change their role
pub async fn add_member(
    auth: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<MemberInput>, JsonRejection>,
) -> ApiResult<ProjectView> {
    let id = parse_uuid(&id, "project")?;
    let Json(input) = payload?;
    parse_orcid(&input.orcid_id)?;

    let project = owned(&auth, id).await?.add_member(id, input).await?;
    Ok(ApiResponse::success(project))
}

/// DELETE /api/projects/:id/members/:orcid
pub async fn remove_member(auth: AuthUser, Path((id, orcid)): Path<(String, String)>) -> ApiResult<()> {
    let id = parse_uuid(&id, "project")?;
    let member = parse_orcid(&orcid)?;

    owned(&auth, id).await?.remove_member(id, &member).await?;
    Ok(ApiResponse::<()>::no_content())
}

/// PUT /api/projects/:id/publications/:work_id - link a publication (idempotent)
pub async fn link_publication(auth: AuthUser, Path((id, work_id)): Path<(String, String)>) -> ApiResult<ProjectView> {
    let id = parse_uuid(&id, "project")?;
    let work_id = parse_uuid(&work_id, "publication")?;

    let service = owned(&auth, id).await?;
    service.link_work(id, work_id).await?;
    Ok(ApiResponse::success(service.get(id).await?))
}

/// DELETE /api/projects/:id/publications/:work_id
pub async fn unlink_publication(auth: AuthUser, Path((id, work_id)): Path<(String, String)>) -> ApiResult<()> {
    let id = parse_uuid(&id, "project")?;
    let work_id = parse_uuid(&work_id, "publication")?;

    owned(&auth, id).await?.unlink_work(id, work_id).await?;
    Ok(ApiResponse::<()>::no_content())
}
