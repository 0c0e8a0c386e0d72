use refscope_api::models::{Element, LibraryElements, Occurrence, SourcePath, Stamp};
use smol_str::SmolStr;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Import,
    Export,
    Part,
    PartOf,
}

/// A file-level dependency as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub uri: SmolStr,
    /// Offset of the URI literal.
    pub offset: usize,
    pub length: usize,
    /// `as p` prefix of an import.
    pub prefix: Option<SmolStr>,
}

/// A directive paired with the file its URI maps to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDirective {
    pub directive: Directive,
    pub target: Option<SourcePath>,
}

/// Recoverable parse problem, recorded on the unit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("syntax error at {offset}: {message}")]
pub struct SyntaxError {
    pub offset: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("resolution failed: {0}")]
pub struct ResolutionError(pub String);

/// Output of a parser: the directives the driver needs for dependency
/// tracking plus an opaque tree only the matching resolver understands.
#[derive(Clone)]
pub struct ParsedUnit {
    pub path: SourcePath,
    pub stamp: Stamp,
    pub directives: Vec<Directive>,
    pub errors: Vec<SyntaxError>,
    /// Every identifier spelled in the file, deduplicated. Lets queries skip
    /// files that cannot mention a name before resolving them.
    pub identifiers: Vec<SmolStr>,
    pub tree: Arc<dyn Any + Send + Sync>,
}

impl ParsedUnit {
    pub fn tree<T: 'static>(&self) -> Option<&T> {
        self.tree.downcast_ref::<T>()
    }

    pub fn mentions(&self, name: &str) -> bool {
        self.identifiers.iter().any(|id| id == name)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The library this file is a part of, when it is a part file.
    pub fn part_of(&self) -> Option<&Directive> {
        self.directives
            .iter()
            .find(|d| d.kind == DirectiveKind::PartOf)
    }
}

impl fmt::Debug for ParsedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedUnit")
            .field("path", &self.path)
            .field("stamp", &self.stamp)
            .field("directives", &self.directives)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

/// What a resolver sees of the rest of the world while resolving one file.
pub struct ResolutionScope<'a> {
    pub path: &'a SourcePath,
    pub library_uri: &'a str,
    /// The file's directives in source order, with their targets.
    pub directives: &'a [ResolvedDirective],
    /// Element tables of every file reachable through the directives.
    pub libraries: &'a HashMap<SourcePath, Arc<LibraryElements>>,
}

impl<'a> ResolutionScope<'a> {
    pub fn library(&self, path: &SourcePath) -> Option<&'a Arc<LibraryElements>> {
        self.libraries.get(path)
    }

    /// Every file whose top-level names are visible through `path`'s
    /// namespace: the file itself, its parts, and what it re-exports.
    pub fn export_namespace(&self, path: &SourcePath) -> Vec<&'a Arc<LibraryElements>> {
        let mut out: Vec<&'a Arc<LibraryElements>> = Vec::new();
        let mut stack = vec![path.clone()];
        let mut seen = std::collections::HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(lib) = self.libraries.get(&current) {
                out.push(lib);
                stack.extend(lib.exports.iter().cloned());
                stack.extend(lib.parts.iter().cloned());
            }
        }
        out
    }
}

/// Output of a resolver for one file.
#[derive(Debug, Clone, Default)]
pub struct ResolvedLibrary {
    /// Element 0 must be the library element.
    pub elements: Vec<Element>,
    pub occurrences: Vec<Occurrence>,
    pub diagnostics: Vec<String>,
}
