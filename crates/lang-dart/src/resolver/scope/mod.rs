//! Name lookup, innermost scope first: locals, members of the enclosing
//! type, the library namespace (the file and its parts), then imports.

pub mod import_scope;
pub mod library;
pub mod local;
pub mod member;

pub use import_scope::ImportScope;
pub use library::LibraryScope;
pub use local::LocalScope;
pub use member::MemberScope;

use crate::parser::ast::CompilationUnit;
use refscope_api::models::{Element, ElementKey, ElementTag};
use refscope_plugin::ResolutionScope;
use smol_str::SmolStr;

pub trait Scope {
    /// `setter` asks for the setter of an accessor pair when there is one.
    fn lookup(&self, name: &str, setter: bool) -> Option<ElementKey>;
    fn name(&self) -> &'static str;
}

/// Names to try for `name`, setter first when writing.
pub fn candidates(name: &str, setter: bool) -> Vec<SmolStr> {
    if setter {
        vec![SmolStr::new(format!("{name}=")), SmolStr::new(name)]
    } else {
        vec![SmolStr::new(name)]
    }
}

/// Top-level elements that take part in a namespace.
pub fn in_namespace(element: &Element) -> bool {
    !matches!(
        element.tag(),
        ElementTag::Library | ElementTag::Import | ElementTag::Export | ElementTag::Prefix
    )
}

/// The file-level scopes shared by both resolution steps.
pub struct Namespaces<'s> {
    pub library: LibraryScope<'s>,
    pub imports: ImportScope<'s>,
}

impl<'s> Namespaces<'s> {
    pub fn new(tree: &CompilationUnit, scope: &ResolutionScope<'s>) -> Self {
        Self {
            library: LibraryScope::new(tree, scope),
            imports: ImportScope::new(scope),
        }
    }

    /// Library namespace first, then imports.
    pub fn lookup(&self, name: &str, setter: bool) -> Option<ElementKey> {
        self.library
            .lookup(name, setter)
            .or_else(|| self.imports.lookup(name, setter))
    }
}
