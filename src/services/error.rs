use std::collections::HashMap;
use thiserror::Error;

use crate::database::DatabaseError;
use crate::filter::FilterError;
use crate::orcid::{OrcidError, OrcidIdError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0:?}")]
    Validation(HashMap<String, String>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidId(#[from] OrcidIdError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Orcid(#[from] OrcidError),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(err.into())
    }
}

impl ServiceError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), message.into());
        ServiceError::Validation(errors)
    }
}
