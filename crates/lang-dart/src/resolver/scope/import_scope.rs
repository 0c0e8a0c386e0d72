use super::{Scope, candidates, in_namespace};
use refscope_api::models::{Element, ElementKey, LibraryElements};
use refscope_plugin::{DirectiveKind, ResolutionScope};
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::Arc;

/// Names brought in by `import` directives. Prefixed imports are only
/// reachable through their prefix.
pub struct ImportScope<'s> {
    unprefixed: Vec<&'s Arc<LibraryElements>>,
    prefixes: HashMap<SmolStr, Vec<&'s Arc<LibraryElements>>>,
}

impl<'s> ImportScope<'s> {
    pub fn new(scope: &ResolutionScope<'s>) -> Self {
        let mut unprefixed = Vec::new();
        let mut prefixes: HashMap<SmolStr, Vec<&'s Arc<LibraryElements>>> = HashMap::new();
        for directive in scope.directives {
            if directive.directive.kind != DirectiveKind::Import {
                continue;
            }
            let namespace = match &directive.target {
                Some(target) => scope.export_namespace(target),
                None => Vec::new(),
            };
            match &directive.directive.prefix {
                // A prefix whose import did not resolve still exists.
                Some(prefix) => prefixes.entry(prefix.clone()).or_default().extend(namespace),
                None => unprefixed.extend(namespace),
            }
        }
        Self {
            unprefixed,
            prefixes,
        }
    }

    pub fn is_prefix(&self, name: &str) -> bool {
        self.prefixes.contains_key(name)
    }

    pub fn lookup_prefixed(&self, prefix: &str, name: &str, setter: bool) -> Option<ElementKey> {
        let libraries = self.prefixes.get(prefix)?;
        find_exported(libraries, name, setter)
    }

    /// Every imported library, prefixed or not.
    pub fn libraries(&self) -> impl Iterator<Item = &'s Arc<LibraryElements>> + '_ {
        self.unprefixed
            .iter()
            .chain(self.prefixes.values().flatten())
            .copied()
    }
}

fn is_exported(element: &Element) -> bool {
    in_namespace(element) && !element.is_private()
}

fn find_exported(
    libraries: &[&Arc<LibraryElements>],
    name: &str,
    setter: bool,
) -> Option<ElementKey> {
    for candidate in candidates(name, setter) {
        let found = libraries
            .iter()
            .filter_map(|lib| lib.top_level(&candidate))
            .find(|e| is_exported(e));
        if let Some(element) = found {
            return Some(element.key.clone());
        }
    }
    None
}

impl Scope for ImportScope<'_> {
    fn lookup(&self, name: &str, setter: bool) -> Option<ElementKey> {
        find_exported(&self.unprefixed, name, setter)
    }

    fn name(&self) -> &'static str {
        "Import"
    }
}
