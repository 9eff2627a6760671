use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row of the `users` table: a registered researcher, keyed by ORCID iD.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Researcher {
    pub orcid_id: String,
    pub given_names: Option<String>,
    pub family_name: Option<String>,
    pub credit_name: Option<String>,
    pub institution: Option<String>,
    pub biography: Option<String>,
    pub email: Option<String>,
    /// Unset while the row is only a sign-in stub.
    pub registered_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Researcher {
    pub fn display_name(&self) -> String {
        display_name(
            self.credit_name.as_deref(),
            self.given_names.as_deref(),
            self.family_name.as_deref(),
            &self.orcid_id,
        )
    }
}

/// Credit name, else "given family", else the ORCID iD.
pub fn display_name(credit: Option<&str>, given: Option<&str>, family: Option<&str>, orcid_id: &str) -> String {
    if let Some(credit) = credit.map(str::trim).filter(|s| !s.is_empty()) {
        return credit.to_string();
    }
    let joined = [given, family]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        orcid_id.to_string()
    } else {
        joined
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ExternalLink {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearcherProfile {
    #[serde(flatten)]
    pub researcher: Researcher,
    pub display_name: String,
    pub research_areas: Vec<String>,
    pub external_links: Vec<ExternalLink>,
}

/// Create/update payload for a researcher profile.
///
/// `research_areas` and `external_links` replace the stored lists when
/// present and are left alone when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearcherInput {
    #[serde(default)]
    pub orcid_id: Option<String>,
    pub given_names: Option<String>,
    pub family_name: Option<String>,
    pub credit_name: Option<String>,
    pub institution: Option<String>,
    pub biography: Option<String>,
    pub email: Option<String>,
    pub research_areas: Option<Vec<String>>,
    pub external_links: Option<Vec<ExternalLink>>,
}
