pub mod error;
pub mod project_service;
pub mod publication_service;
pub mod researcher_service;
pub mod sync_service;
pub mod validation;

pub use error::ServiceError;
pub use project_service::ProjectService;
pub use publication_service::PublicationService;
pub use researcher_service::ResearcherService;
pub use sync_service::{SyncReport, SyncService};
