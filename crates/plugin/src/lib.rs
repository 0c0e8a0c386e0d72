//! Collaborator contracts consumed by the analysis core.
//!
//! A language plugin contributes a [`LanguageCaps`] bundle (file matcher,
//! parser, resolver). Package configuration and file access are separate
//! providers so hosts can swap them independently.

use refscope_api::models::Language;
use std::path::Path;
use std::sync::Arc;

pub mod cap;
pub mod model;
pub mod package;
pub mod resource;

pub use cap::{FileMatcherCap, ParseCap, ResolveCap};
pub use model::{
    Directive, DirectiveKind, ParsedUnit, ResolutionError, ResolutionScope, ResolvedDirective,
    ResolvedLibrary, SyntaxError,
};
pub use package::{PackageConfigProvider, PackageInfo};
pub use resource::ResourceProvider;

/// Capabilities registered by one language plugin.
#[derive(Clone)]
pub struct LanguageCaps {
    pub language: Language,
    pub matcher: Arc<dyn FileMatcherCap>,
    pub parser: Arc<dyn ParseCap>,
    pub resolver: Arc<dyn ResolveCap>,
}

impl LanguageCaps {
    pub fn supports_path(&self, path: &Path) -> bool {
        self.matcher.supports_path(path)
    }
}
