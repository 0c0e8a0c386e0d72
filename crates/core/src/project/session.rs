use super::{PackageGraph, PackageNode};
use crate::util::file_uri;
use dashmap::DashMap;
use indexmap::IndexSet;
use refscope_api::SourcePath;
use smol_str::SmolStr;
use std::path::Path;
use std::sync::Arc;

/// Per-session memo of package-level facts.
///
/// Built for one [`PackageGraph`]; the driver swaps in a fresh context
/// whenever the package set changes, so nothing here is ever invalidated
/// piecemeal.
#[derive(Debug, Default)]
pub struct SessionContext {
    packages: Arc<PackageGraph>,
    closures: DashMap<SmolStr, Arc<IndexSet<SmolStr>>>,
    dependents: DashMap<SmolStr, Arc<IndexSet<SmolStr>>>,
}

impl SessionContext {
    pub fn new(packages: Arc<PackageGraph>) -> Self {
        Self {
            packages,
            closures: DashMap::new(),
            dependents: DashMap::new(),
        }
    }

    pub fn packages(&self) -> &Arc<PackageGraph> {
        &self.packages
    }

    pub fn package_of(&self, path: &Path) -> Option<&PackageNode> {
        self.packages.package_of(path)
    }

    /// `package:<name>/<rel>` for files under a package's `lib`, else a `file:` URI.
    pub fn uri_for(&self, path: &SourcePath) -> SmolStr {
        if let Some(node) = self.package_of(path.as_path()) {
            if let Ok(rel) = path.as_path().strip_prefix(node.info.lib_dir()) {
                let rel: Vec<_> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect();
                return SmolStr::new(format!("package:{}/{}", node.info.name, rel.join("/")));
            }
        }
        file_uri(path)
    }

    /// Map a directive URI written in `from` to a file path.
    ///
    /// `dart:` and unknown `package:` URIs have no file.
    pub fn resolve_uri(&self, from: &SourcePath, uri: &str) -> Option<SourcePath> {
        if let Some(rest) = uri.strip_prefix("package:") {
            let (name, rel) = rest.split_once('/')?;
            let node = self.packages.get(name)?;
            return Some(SourcePath::new(node.info.lib_dir().join(rel)));
        }
        if uri.starts_with("file:") {
            let url = url::Url::parse(uri).ok()?;
            return url.to_file_path().ok().map(SourcePath::new);
        }
        if uri.contains(':') {
            return None;
        }
        Some(from.join_sibling(uri))
    }

    /// `name` plus every package it transitively depends on.
    pub fn closure_of(&self, name: &str) -> Arc<IndexSet<SmolStr>> {
        if let Some(hit) = self.closures.get(name) {
            return hit.clone();
        }
        let mut closure: IndexSet<SmolStr> = IndexSet::new();
        let mut stack = vec![SmolStr::new(name)];
        while let Some(current) = stack.pop() {
            if !closure.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.packages.get(&current) {
                stack.extend(node.dependencies.iter().rev().cloned());
            }
        }
        let closure = Arc::new(closure);
        self.closures.insert(SmolStr::new(name), closure.clone());
        closure
    }

    /// Packages whose dependency closure contains `name`, including `name`.
    pub fn dependents_of(&self, name: &str) -> Arc<IndexSet<SmolStr>> {
        if let Some(hit) = self.dependents.get(name) {
            return hit.clone();
        }
        let dependents: IndexSet<SmolStr> = self
            .packages
            .packages()
            .map(|node| node.info.name.clone())
            .filter(|candidate| self.closure_of(candidate).contains(name))
            .collect();
        let dependents = Arc::new(dependents);
        self.dependents.insert(SmolStr::new(name), dependents.clone());
        dependents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::StaticPackageConfig;
    use std::path::PathBuf;

    fn session() -> SessionContext {
        let config = StaticPackageConfig::new()
            .package("aaa", "/ws/aaa", &[])
            .package("bbb", "/ws/bbb", &["aaa"])
            .package("app", "/ws/app", &["bbb", "aaa"]);
        let graph = PackageGraph::discover(&[PathBuf::from("/ws/app")], &config);
        SessionContext::new(Arc::new(graph))
    }

    #[test]
    fn test_uri_for_package_and_file() {
        let session = session();
        assert_eq!(
            session.uri_for(&SourcePath::new("/ws/aaa/lib/src/a.dart")),
            "package:aaa/src/a.dart"
        );
        assert_eq!(
            session.uri_for(&SourcePath::new("/ws/app/bin/main.dart")),
            "file:///ws/app/bin/main.dart"
        );
    }

    #[test]
    fn test_resolve_uri_forms() {
        let session = session();
        let from = SourcePath::new("/ws/app/lib/main.dart");
        assert_eq!(
            session.resolve_uri(&from, "package:aaa/a.dart"),
            Some(SourcePath::new("/ws/aaa/lib/a.dart"))
        );
        assert_eq!(
            session.resolve_uri(&from, "src/b.dart"),
            Some(SourcePath::new("/ws/app/lib/src/b.dart"))
        );
        assert_eq!(
            session.resolve_uri(&from, "file:///ws/app/bin/x.dart"),
            Some(SourcePath::new("/ws/app/bin/x.dart"))
        );
        assert_eq!(session.resolve_uri(&from, "dart:core"), None);
        assert_eq!(session.resolve_uri(&from, "package:zzz/z.dart"), None);
    }

    #[test]
    fn test_closures_and_dependents() {
        let session = session();
        let closure: Vec<_> = session.closure_of("app").iter().cloned().collect();
        assert_eq!(closure, vec!["app", "bbb", "aaa"]);
        let dependents: Vec<_> = session.dependents_of("aaa").iter().cloned().collect();
        assert_eq!(dependents, vec!["app", "bbb", "aaa"]);
        assert!(Arc::ptr_eq(&session.dependents_of("aaa"), &session.dependents_of("aaa")));
        assert_eq!(session.dependents_of("bbb").len(), 2);
    }
}
