//! Shared data model of the refscope analysis core.
//!
//! Everything that crosses a crate boundary lives here: source snapshots,
//! the element model, occurrences produced by resolvers, and the result
//! types of the search queries.

pub mod error;
pub mod models;

pub use error::{AnalysisError, AnalysisResult};
pub use models::*;
