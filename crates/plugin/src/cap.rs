use crate::model::{ParsedUnit, ResolutionError, ResolutionScope, ResolvedLibrary, SyntaxError};
use refscope_api::models::Snapshot;
use std::path::Path;

pub trait FileMatcherCap: Send + Sync {
    fn supports_path(&self, path: &Path) -> bool;
}

/// Parser contract: pure and deterministic for identical bytes.
pub trait ParseCap: Send + Sync {
    /// `Err` only for input the parser cannot recover from at all; ordinary
    /// syntax errors are reported on [`ParsedUnit::errors`].
    fn parse(&self, snapshot: &Snapshot) -> Result<ParsedUnit, SyntaxError>;
}

/// Resolver contract: builds the element table of one file and binds its
/// identifier occurrences against the element tables in `scope`.
pub trait ResolveCap: Send + Sync {
    fn resolve(
        &self,
        unit: &ParsedUnit,
        scope: &ResolutionScope<'_>,
    ) -> Result<ResolvedLibrary, ResolutionError>;
}
