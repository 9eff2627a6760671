//! Access to the public ORCID registry: identifiers, wire types, mapping to
//! local shapes, the HTTP client and multi-page search.

pub mod client;
pub mod error;
pub mod identifier;
pub mod mapping;
pub mod search;
pub mod types;

pub use client::OrcidClient;
pub use error::OrcidError;
pub use identifier::{OrcidId, OrcidIdError};
pub use mapping::{OrcidProfile, SearchHit};
pub use search::{accumulate, build_query, SearchOutcome, SearchPage, SearchParams, SearchSource};
