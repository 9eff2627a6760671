use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterError {
    #[error("Cannot sort by '{field}'; allowed: {allowed}")]
    InvalidSort { field: String, allowed: String },

    #[error("Invalid sort direction: {0}")]
    InvalidDirection(String),
}
