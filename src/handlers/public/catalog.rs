// handlers/public/catalog.rs - read-only views of the local profile cache

use axum::extract::{rejection::QueryRejection, Path, Query};

use crate::database::models::{ProjectView, Publication, ResearcherProfile};
use crate::filter::{ListQuery, Page};
use crate::handlers::{parse_orcid, parse_uuid};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{ProjectService, PublicationService, ResearcherService};

/// GET /api/researchers - registered researchers, searchable by `q`
pub async fn list_researchers(query: Result<Query<ListQuery>, QueryRejection>) -> ApiResult<Page<ResearcherProfile>> {
    let Query(query) = query?;
    let page = ResearcherService::connect().await?.list(&query).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/researchers/:orcid
pub async fn get_researcher(Path(orcid): Path<String>) -> ApiResult<ResearcherProfile> {
    let orcid_id = parse_orcid(&orcid)?;
    let profile = ResearcherService::connect().await?.get(&orcid_id).await?;
    Ok(ApiResponse::success(profile))
}

/// GET /api/researchers/:orcid/publications - filter with `q`, `year`, `type`; order with `sort`
pub async fn list_publications(
    Path(orcid): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Page<Publication>> {
    let orcid_id = parse_orcid(&orcid)?;
    let Query(query) = query?;
    let page = PublicationService::connect().await?.list_for(&orcid_id, &query).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/researchers/:orcid/projects - owned and joined projects
pub async fn list_projects(
    Path(orcid): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Page<ProjectView>> {
    let orcid_id = parse_orcid(&orcid)?;
    let Query(query) = query?;
    let page = ProjectService::connect().await?.list_for(&orcid_id, &query).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/publications/:id
pub async fn get_publication(Path(id): Path<String>) -> ApiResult<Publication> {
    let id = parse_uuid(&id, "publication")?;
    let publication = PublicationService::connect().await?.get(id).await?;
    Ok(ApiResponse::success(publication))
}

/// GET /api/projects/:id
pub async fn get_project(Path(id): Path<String>) -> ApiResult<ProjectView> {
    let id = parse_uuid(&id, "project")?;
    let project = ProjectService::connect().await?.get(id).await?;
    Ok(ApiResponse::success(project))
}

/// GET /api/projects/:id/publications
pub async fn project_publications(Path(id): Path<String>) -> ApiResult<Vec<Publication>> {
    let id = parse_uuid(&id, "project")?;
    let publications = ProjectService::connect().await?.publications(id).await?;
    Ok(ApiResponse::success(publications))
}
