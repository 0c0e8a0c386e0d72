//! Element table construction and occurrence binding for one file.
//!
//! Resolution runs in two steps. `declare` walks the declarations and
//! builds every non-local element, resolving header types against the
//! library namespace. `bind` then walks bodies with a scope chain
//! (locals, members, library, imports) and records one occurrence per
//! identifier it visits.

mod bind;
mod declare;
mod expr;
pub(crate) mod scope;

use crate::parser::ast::{CompilationUnit, Span};
use refscope_api::models::{Element, ElementKey, SourceLocation, SourcePath};
use refscope_plugin::{ParsedUnit, ResolutionError, ResolutionScope, ResolvedLibrary};
use smol_str::SmolStr;
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct DartResolver;

impl DartResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(
        &self,
        unit: &ParsedUnit,
        scope: &ResolutionScope<'_>,
    ) -> Result<ResolvedLibrary, ResolutionError> {
        let tree = unit.tree::<CompilationUnit>().ok_or_else(|| {
            ResolutionError(format!("{} was not parsed by the Dart parser", unit.path))
        })?;
        let namespaces = scope::Namespaces::new(tree, scope);
        let mut table = declare::declare(tree, scope, &namespaces);
        let (occurrences, diagnostics) = bind::bind(tree, scope, &namespaces, &mut table);
        trace!(
            path = %unit.path,
            elements = table.len(),
            occurrences = occurrences.len(),
            "resolved"
        );
        Ok(ResolvedLibrary {
            elements: table.into_elements(),
            occurrences,
            diagnostics,
        })
    }
}

/// Elements of the file being resolved, addressable by qualified name.
pub(crate) struct ElementTable {
    path: SourcePath,
    elements: Vec<Element>,
    by_name: HashMap<SmolStr, usize>,
}

impl ElementTable {
    pub(crate) fn new(path: SourcePath) -> Self {
        Self {
            path,
            elements: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub(crate) fn path(&self) -> &SourcePath {
        &self.path
    }

    pub(crate) fn key(&self, name: impl Into<SmolStr>) -> ElementKey {
        ElementKey::new(self.path.clone(), name)
    }

    /// Keeps the first declaration of a duplicated name.
    pub(crate) fn insert(&mut self, element: Element) -> bool {
        if self.by_name.contains_key(&element.key.name) {
            return false;
        }
        self.by_name
            .insert(element.key.name.clone(), self.elements.len());
        self.elements.push(element);
        true
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Element> {
        self.by_name.get(name).map(|&i| &self.elements[i])
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.by_name.get(name).map(|&i| &mut self.elements[i])
    }

    pub(crate) fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub(crate) fn len(&self) -> usize {
        self.elements.len()
    }

    pub(crate) fn into_elements(self) -> Vec<Element> {
        self.elements
    }
}

/// Element lookup across the file being resolved and the tables in scope.
pub(crate) trait ElementSource {
    fn element(&self, key: &ElementKey) -> Option<&Element>;
}

pub(crate) struct World<'a, 's> {
    pub(crate) table: &'a ElementTable,
    pub(crate) scope: &'a ResolutionScope<'s>,
}

impl ElementSource for World<'_, '_> {
    fn element(&self, key: &ElementKey) -> Option<&Element> {
        if &key.path == self.table.path() {
            return self.table.get(&key.name);
        }
        self.scope
            .library(&key.path)
            .and_then(|lib| lib.element(key))
            .map(|e| e.as_ref())
    }
}

pub(crate) fn location(
    path: &SourcePath,
    offset: usize,
    length: usize,
    code: Span,
) -> SourceLocation {
    SourceLocation {
        path: path.clone(),
        offset,
        length,
        code_offset: code.start,
        code_length: code.len(),
    }
}

/// Key of a local declaration; the offset keeps shadowed names apart.
pub(crate) fn local_key(owner: &ElementKey, name: &str, offset: usize) -> ElementKey {
    owner.member(&format!("{name}@{offset}"))
}

#[cfg(test)]
mod tests;
