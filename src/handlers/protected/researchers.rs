use axum::{
    extract::{rejection::JsonRejection, Path},
    Json,
};

use crate::database::models::{ResearcherInput, ResearcherProfile};
use crate::handlers::parse_orcid;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{ResearcherService, SyncReport, SyncService};

/// POST /api/researchers - register the signed-in researcher's profile
pub async fn create(auth: AuthUser, payload: Result<Json<ResearcherInput>, JsonRejection>) -> ApiResult<ResearcherProfile> {
    let Json(input) = payload?;
    let profile = ResearcherService::connect()
        .await?
        .create(&auth.orcid_id, input)
        .await?;
    Ok(ApiResponse::created(profile))
}

/// PUT /api/researchers/:orcid
pub async fn update(
    auth: AuthUser,
    Path(orcid): Path<String>,
    payload: Result<Json<ResearcherInput>, JsonRejection>,
) -> ApiResult<ResearcherProfile> {
    let orcid_id = parse_orcid(&orcid)?;
    auth.ensure_owner(orcid_id.as_str())?;
    let Json(input) = payload?;

    let profile = ResearcherService::connect().await?.update(&orcid_id, input).await?;
    Ok(ApiResponse::success(profile))
}

/// DELETE /api/researchers/:orcid - removes the profile and everything it owns
pub async fn delete(auth: AuthUser, Path(orcid): Path<String>) -> ApiResult<()> {
    let orcid_id = parse_orcid(&orcid)?;
    auth.ensure_owner(orcid_id.as_str())?;

    ResearcherService::connect().await?.delete(&orcid_id).await?;
    Ok(ApiResponse::<()>::no_content())
}

/// POST /api/researchers/:orcid/sync - pull the live ORCID record into the cache
pub async fn sync(auth: AuthUser, Path(orcid): Path<String>) -> ApiResult<SyncReport> {
    let orcid_id = parse_orcid(&orcid)?;
    auth.ensure_owner(orcid_id.as_str())?;

    let report = SyncService::connect().await?.sync(&orcid_id).await?;
    Ok(ApiResponse::success(report))
}
