use thiserror::Error;

use super::identifier::OrcidIdError;

#[derive(Debug, Error)]
pub enum OrcidError {
    #[error(transparent)]
    InvalidId(#[from] OrcidIdError),

    #[error("ORCID record not found: {0}")]
    NotFound(String),

    #[error("ORCID record is deprecated or deactivated: {0}")]
    Gone(String),

    #[error("search query is empty")]
    EmptyQuery,

    #[error("ORCID OAuth client credentials are not configured")]
    NotConfigured,

    #[error("ORCID returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("ORCID request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected ORCID payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid ORCID URL: {0}")]
    Url(#[from] url::ParseError),
}
