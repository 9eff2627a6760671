// handlers/public/mod.rs - Public handlers (no authentication)

pub mod auth;
pub mod catalog;
pub mod orcid;
pub mod root;

pub use auth::orcid_callback;
pub use root::{health, root};
