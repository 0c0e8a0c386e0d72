pub mod element;
pub mod language;
pub mod library;
pub mod occurrence;
pub mod search;
pub mod source;

pub use element::*;
pub use language::*;
pub use library::*;
pub use occurrence::*;
pub use search::*;
pub use source::*;
