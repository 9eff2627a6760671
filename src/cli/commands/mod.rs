pub mod lookup;
pub mod migrate;
pub mod search;
pub mod sync;
