use super::element::{Element, ElementKey};
use super::source::SourcePath;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::Arc;

/// The element table produced for one file: the Element Graph slice a
/// resolver consumes for dependencies.
///
/// Element `0` is always the library element (keyed by the empty name).
#[derive(Debug, Clone)]
pub struct LibraryElements {
    pub path: SourcePath,
    pub uri: SmolStr,
    elements: Vec<Arc<Element>>,
    by_name: HashMap<SmolStr, usize>,
    /// Files whose namespace this file re-exports.
    pub exports: Vec<SourcePath>,
    /// Files sharing this file's namespace (`part` / `part of`).
    pub parts: Vec<SourcePath>,
}

impl LibraryElements {
    pub fn new(
        path: SourcePath,
        uri: SmolStr,
        elements: Vec<Element>,
        exports: Vec<SourcePath>,
        parts: Vec<SourcePath>,
    ) -> Self {
        let elements: Vec<Arc<Element>> = elements.into_iter().map(Arc::new).collect();
        let by_name = elements
            .iter()
            .enumerate()
            .map(|(i, e)| (e.key.name.clone(), i))
            .collect();
        Self {
            path,
            uri,
            elements,
            by_name,
            exports,
            parts,
        }
    }

    pub fn library(&self) -> Option<&Arc<Element>> {
        self.elements.first()
    }

    pub fn elements(&self) -> &[Arc<Element>] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Look up by qualified name inside this file.
    pub fn get(&self, qualified_name: &str) -> Option<&Arc<Element>> {
        self.by_name.get(qualified_name).map(|&i| &self.elements[i])
    }

    pub fn element(&self, key: &ElementKey) -> Option<&Arc<Element>> {
        if key.path != self.path {
            return None;
        }
        self.get(&key.name)
    }

    /// Top-level declaration with the given simple name.
    pub fn top_level(&self, name: &str) -> Option<&Arc<Element>> {
        self.get(name).filter(|e| e.is_top_level())
    }

    pub fn top_level_elements(&self) -> impl Iterator<Item = &Arc<Element>> {
        self.elements.iter().skip(1).filter(|e| e.is_top_level())
    }

    /// Direct members of the element identified by `key`.
    pub fn members_of(&self, key: &ElementKey) -> Vec<&Arc<Element>> {
        match self.element(key) {
            Some(owner) => owner
                .kind
                .members()
                .iter()
                .filter_map(|m| self.element(m))
                .collect(),
            None => Vec::new(),
        }
    }
}
