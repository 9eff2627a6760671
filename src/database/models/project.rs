use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Row of the `projects` table: a funded project, mirroring an ORCID funding when `put_code` is set.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub owner_orcid: String,
    pub put_code: Option<i64>,
    pub name: String,
    pub start_year: Option<i32>,
    pub start_month: Option<i32>,
    pub end_year: Option<i32>,
    pub end_month: Option<i32>,
    pub funding_agency: Option<String>,
    pub funding_amount: Option<Decimal>,
    pub currency: Option<String>,
    pub role: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectMember {
    #[serde(skip)]
    pub project_id: Uuid,
    pub orcid_id: String,
    pub name: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub members: Vec<ProjectMember>,
    pub work_ids: Vec<Uuid>,
}

/// Create/update payload for a project; also the target shape of ORCID funding mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInput {
    #[serde(default, skip_deserializing)]
    pub put_code: Option<i64>,
    pub name: String,
    pub start_year: Option<i32>,
    pub start_month: Option<i32>,
    pub end_year: Option<i32>,
    pub end_month: Option<i32>,
    pub funding_agency: Option<String>,
    pub funding_amount: Option<Decimal>,
    pub currency: Option<String>,
    pub role: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberInput {
    pub orcid_id: String,
    pub role: Option<String>,
}
