use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Row of the `works` table. `put_code` is set when the work mirrors an ORCID entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Work {
    pub id: Uuid,
    pub owner_orcid: String,
    pub put_code: Option<i64>,
    pub title: String,
    pub publication_year: Option<i32>,
    pub work_type: String,
    pub source: Option<String>,
    pub identifier_type: Option<String>,
    pub identifier_value: Option<String>,
    pub url: Option<String>,
    pub journal_title: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkAuthor {
    #[serde(skip)]
    pub work_id: Uuid,
    pub position: i32,
    pub name: String,
    pub orcid_id: Option<String>,
    /// Whether `orcid_id` belongs to a registered user.
    pub registered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Publication {
    #[serde(flatten)]
    pub work: Work,
    pub authors: Vec<WorkAuthor>,
    pub project_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorInput {
    pub name: String,
    #[serde(default)]
    pub orcid_id: Option<String>,
}

/// Create/update payload for a publication; also the target shape of ORCID work mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicationInput {
    #[serde(default, skip_deserializing)]
    pub put_code: Option<i64>,
    pub title: String,
    #[serde(alias = "year")]
    pub publication_year: Option<i32>,
    #[serde(alias = "type")]
    pub work_type: Option<String>,
    pub source: Option<String>,
    pub identifier_type: Option<String>,
    pub identifier_value: Option<String>,
    pub url: Option<String>,
    pub journal_title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub authors: Vec<AuthorInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_ids: Option<Vec<Uuid>>,
}
