// handlers/public/orcid.rs - live ORCID proxy, mapped to local shapes

use axum::extract::{rejection::QueryRejection, Path, Query};
use serde::{Deserialize, Serialize};

use crate::config::{self, ORCID_MAX_ROWS};
use crate::database::models::{ProjectInput, PublicationInput};
use crate::error::ApiError;
use crate::handlers::{parse_orcid, parse_put_code};
use crate::middleware::{ApiResponse, ApiResult};
use crate::orcid::mapping::{
    profile_from_record, project_from_funding_detail, projects_from_fundings, publication_from_work_detail,
    publications_from_works,
};
use crate::orcid::{accumulate, build_query, OrcidClient, OrcidProfile, SearchHit, SearchOutcome, SearchParams, SearchSource};

/// Query string of the search endpoints. Fields are listed out rather than
/// flattened so numeric values parse from the urlencoded form.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub given_names: Option<String>,
    pub family_name: Option<String>,
    pub affiliation: Option<String>,
    pub keyword: Option<String>,
    pub start: Option<u64>,
    pub rows: Option<u32>,
    pub max: Option<u32>,
}

impl SearchQuery {
    fn params(&self) -> SearchParams {
        SearchParams {
            q: self.q.clone(),
            given_names: self.given_names.clone(),
            family_name: self.family_name.clone(),
            affiliation: self.affiliation.clone(),
            keyword: self.keyword.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchPageView {
    pub query: String,
    pub start: u64,
    pub rows: u32,
    pub num_found: u64,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
pub struct SearchAllView {
    pub query: String,
    #[serde(flatten)]
    pub outcome: SearchOutcome,
}

/// GET /api/orcid/search - one page of ORCID expanded search
pub async fn search(query: Result<Query<SearchQuery>, QueryRejection>) -> ApiResult<SearchPageView> {
    let Query(query) = query?;
    let solr = build_query(&query.params())?;
    let start = query.start.unwrap_or(0);
    let rows = query
        .rows
        .unwrap_or(config::config().orcid.search_page_size)
        .clamp(1, ORCID_MAX_ROWS);

    let page = OrcidClient::shared()?.search_page(&solr, start, rows).await?;
    Ok(ApiResponse::success(SearchPageView {
        query: solr,
        start,
        rows,
        num_found: page.num_found,
        hits: page.hits,
    }))
}

/// GET /api/orcid/search/all - every page up to `max` results, de-duplicated
pub async fn search_all(query: Result<Query<SearchQuery>, QueryRejection>) -> ApiResult<SearchAllView> {
    let Query(query) = query?;
    let solr = build_query(&query.params())?;
    let settings = &config::config().orcid;
    let max = query
        .max
        .unwrap_or(settings.search_max_results)
        .clamp(1, settings.search_max_results.max(1));

    let outcome = accumulate(OrcidClient::shared()?, &solr, settings.search_page_size, max).await?;
    Ok(ApiResponse::success(SearchAllView { query: solr, outcome }))
}

/// GET /api/orcid/:orcid - full public profile
pub async fn profile(Path(orcid): Path<String>) -> ApiResult<OrcidProfile> {
    let orcid_id = parse_orcid(&orcid)?;
    let record = OrcidClient::shared()?.record(&orcid_id).await?;
    Ok(ApiResponse::success(profile_from_record(&orcid_id, &record)))
}

/// GET /api/orcid/:orcid/works - work summaries, one per group
pub async fn works(Path(orcid): Path<String>) -> ApiResult<Vec<PublicationInput>> {
    let orcid_id = parse_orcid(&orcid)?;
    let works = OrcidClient::shared()?.works(&orcid_id).await?;
    Ok(ApiResponse::success(publications_from_works(&works)))
}

/// GET /api/orcid/:orcid/works/:put_code - work detail including contributors
pub async fn work(Path((orcid, put_code)): Path<(String, String)>) -> ApiResult<PublicationInput> {
    let orcid_id = parse_orcid(&orcid)?;
    let put_code = parse_put_code(&put_code)?;
    let work = OrcidClient::shared()?.work(&orcid_id, put_code).await?;
    publication_from_work_detail(&work)
        .map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found(format!("Work {} has no title", put_code)))
}

/// GET /api/orcid/:orcid/fundings - funding summaries, one per group
pub async fn fundings(Path(orcid): Path<String>) -> ApiResult<Vec<ProjectInput>> {
    let orcid_id = parse_orcid(&orcid)?;
    let fundings = OrcidClient::shared()?.fundings(&orcid_id).await?;
    Ok(ApiResponse::success(projects_from_fundings(&fundings)))
}

/// GET /api/orcid/:orcid/fundings/:put_code - funding detail with amount and role
pub async fn funding(Path((orcid, put_code)): Path<(String, String)>) -> ApiResult<ProjectInput> {
    let orcid_id = parse_orcid(&orcid)?;
    let put_code = parse_put_code(&put_code)?;
    let funding = OrcidClient::shared()?.funding(&orcid_id, put_code).await?;
    project_from_funding_detail(&funding, &orcid_id)
        .map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found(format!("Funding {} has no title", put_code)))
}
