//! Server-side pagination, sorting and text filtering for list endpoints.

pub mod error;
pub mod filter_order;
pub mod filter_where;
pub mod pagination;
pub mod types;

pub use error::FilterError;
pub use filter_order::{FilterOrder, SortSpec};
pub use filter_where::contains_pattern;
pub use pagination::Pagination;
pub use types::*;
