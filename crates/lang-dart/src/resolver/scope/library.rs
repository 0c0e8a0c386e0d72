use super::{Scope, candidates, in_namespace};
use crate::parser::ast::{CompilationUnit, Declaration, FunctionKind};
use refscope_api::models::{ElementKey, LibraryElements, SourcePath};
use refscope_plugin::{DirectiveKind, ResolutionScope};
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Top-level names of the library the file belongs to: its own
/// declarations first, then those of the other files sharing the library
/// through `part` / `part of`.
pub struct LibraryScope<'s> {
    own: HashMap<SmolStr, ElementKey>,
    own_types: HashSet<SmolStr>,
    shared: Vec<&'s Arc<LibraryElements>>,
}

impl<'s> LibraryScope<'s> {
    pub fn new(tree: &CompilationUnit, scope: &ResolutionScope<'s>) -> Self {
        let path = scope.path;
        let key = |name: &str| ElementKey::new(path.clone(), name);
        let mut own = HashMap::new();
        let mut own_types = HashSet::new();
        for declaration in &tree.declarations {
            match declaration {
                Declaration::Type(decl) => {
                    own_types.insert(decl.name.name.clone());
                    own.entry(decl.name.name.clone())
                        .or_insert_with(|| key(&decl.name.name));
                }
                Declaration::TypeAlias(decl) => {
                    own_types.insert(decl.name.name.clone());
                    own.entry(decl.name.name.clone())
                        .or_insert_with(|| key(&decl.name.name));
                }
                Declaration::Extension(decl) => {
                    if let Some(name) = &decl.name {
                        own.entry(name.name.clone()).or_insert_with(|| key(&name.name));
                    }
                }
                Declaration::Function(decl) => {
                    let name = match decl.kind {
                        FunctionKind::Setter => SmolStr::new(format!("{}=", decl.name.name)),
                        _ => decl.name.name.clone(),
                    };
                    own.entry(name.clone()).or_insert_with(|| key(&name));
                }
                Declaration::Variables(decl) => {
                    for var in &decl.vars {
                        own.entry(var.name.name.clone())
                            .or_insert_with(|| key(&var.name.name));
                    }
                }
            }
        }

        let mut shared_paths: Vec<SourcePath> = Vec::new();
        for directive in scope.directives {
            let Some(target) = &directive.target else {
                continue;
            };
            match directive.directive.kind {
                DirectiveKind::Part => shared_paths.push(target.clone()),
                DirectiveKind::PartOf => {
                    shared_paths.push(target.clone());
                    if let Some(parent) = scope.library(target) {
                        shared_paths.extend(parent.parts.iter().cloned());
                    }
                }
                _ => {}
            }
        }
        let mut seen = HashSet::new();
        seen.insert(path.clone());
        let shared = shared_paths
            .into_iter()
            .filter(|p| seen.insert(p.clone()))
            .filter_map(|p| scope.library(&p))
            .collect();

        Self {
            own,
            own_types,
            shared,
        }
    }

    /// Whether `name` is a class, mixin, enum, extension type or alias
    /// declared in this file.
    pub fn is_own_type(&self, name: &str) -> bool {
        self.own_types.contains(name)
    }

    pub fn shared(&self) -> &[&'s Arc<LibraryElements>] {
        &self.shared
    }

    /// An element named `name` in a sibling part or the defining library.
    pub fn shared_element(&self, name: &str) -> Option<ElementKey> {
        self.shared
            .iter()
            .find_map(|lib| lib.top_level(name))
            .map(|e| e.key.clone())
    }
}

impl Scope for LibraryScope<'_> {
    fn lookup(&self, name: &str, setter: bool) -> Option<ElementKey> {
        for candidate in candidates(name, setter) {
            if let Some(key) = self.own.get(&candidate) {
                return Some(key.clone());
            }
            let shared = self
                .shared
                .iter()
                .filter_map(|lib| lib.top_level(&candidate))
                .find(|e| in_namespace(e));
            if let Some(element) = shared {
                return Some(element.key.clone());
            }
        }
        None
    }

    fn name(&self) -> &'static str {
        "Library"
    }
}
