pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod util;

pub mod features;
pub mod index;
pub mod project;
pub mod resource;
pub mod runtime;

pub use cancel::CancelToken;
pub use config::DriverConfig;
pub use error::{RefscopeError, Result};
pub use features::hierarchy::SubtypeQuery;
pub use runtime::{AnalysisDriver, AnalysisDriverBuilder, DriverState, ResolvedUnit};
