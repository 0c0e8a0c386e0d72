//! Reference language plugin for a Dart subset: directives, type
//! declarations, members, and enough of the expression grammar to bind
//! every identifier occurrence.

pub mod cap;
pub mod parser;
pub mod resolver;

pub use cap::registration::dart_caps;

use std::sync::Arc;

pub struct DartPlugin {
    parser: Arc<parser::DartParser>,
    resolver: Arc<resolver::DartResolver>,
}

impl DartPlugin {
    pub fn new() -> Self {
        Self {
            parser: Arc::new(parser::DartParser::new()),
            resolver: Arc::new(resolver::DartResolver::new()),
        }
    }
}

impl Default for DartPlugin {
    fn default() -> Self {
        Self::new()
    }
}
