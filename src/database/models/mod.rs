pub mod project;
pub mod researcher;
pub mod work;

pub use project::{MemberInput, Project, ProjectInput, ProjectMember, ProjectView};
pub use researcher::{display_name, ExternalLink, Researcher, ResearcherInput, ResearcherProfile};
pub use work::{AuthorInput, Publication, PublicationInput, Work, WorkAuthor};
