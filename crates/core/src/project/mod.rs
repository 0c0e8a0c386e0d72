//! Package structure of an analysis session.
//!
//! [`PackageGraph`] is the dependency closure of the analysis roots as
//! reported by the [`PackageConfigProvider`]; [`SessionContext`] memoizes
//! closure queries over it and is replaced whenever the graph changes.

pub mod config;
pub mod session;

pub use config::StaticPackageConfig;
pub use session::SessionContext;

use indexmap::IndexMap;
use refscope_plugin::{PackageConfigProvider, PackageInfo};
use smol_str::SmolStr;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNode {
    pub info: PackageInfo,
    /// Declared dependencies, by name.
    pub dependencies: Vec<SmolStr>,
}

/// Packages reachable from the analysis roots, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    packages: IndexMap<SmolStr, PackageNode>,
    /// Analysis roots that are not inside any package.
    folders: Vec<PathBuf>,
}

impl PackageGraph {
    /// Breadth-first walk from `roots` through declared dependencies.
    ///
    /// Packages that no root reaches are never asked for.
    pub fn discover(roots: &[PathBuf], provider: &dyn PackageConfigProvider) -> Self {
        let mut graph = PackageGraph::default();
        let mut expanded: HashSet<SmolStr> = HashSet::new();
        let mut queued: HashSet<SmolStr> = HashSet::new();
        let mut queue: VecDeque<PathBuf> = roots.iter().cloned().collect();

        while let Some(from) = queue.pop_front() {
            let visible = provider.packages_visible_from(&from);
            let own = containing_package(&visible, &from).cloned();
            match &own {
                Some(own) => {
                    if !expanded.insert(own.name.clone()) {
                        continue;
                    }
                    let dependencies = visible
                        .iter()
                        .filter(|p| p.name != own.name)
                        .map(|p| p.name.clone())
                        .collect();
                    graph.packages.insert(
                        own.name.clone(),
                        PackageNode {
                            info: own.clone(),
                            dependencies,
                        },
                    );
                }
                None if roots.contains(&from) => graph.folders.push(from.clone()),
                None => continue,
            }
            for info in visible {
                if own.as_ref().is_some_and(|o| o.name == info.name) {
                    continue;
                }
                if !expanded.contains(&info.name) && queued.insert(info.name.clone()) {
                    queue.push_back(info.root);
                }
            }
        }
        graph
    }

    pub fn packages(&self) -> impl Iterator<Item = &PackageNode> {
        self.packages.values()
    }

    pub fn get(&self, name: &str) -> Option<&PackageNode> {
        self.packages.get(name)
    }

    pub fn folders(&self) -> &[PathBuf] {
        &self.folders
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// The innermost package whose root contains `path`.
    pub fn package_of(&self, path: &Path) -> Option<&PackageNode> {
        self.packages
            .values()
            .filter(|node| node.info.contains(path))
            .max_by_key(|node| node.info.root.components().count())
    }

    /// Directories whose files are analyzed: package roots, then folder roots.
    pub fn roots(&self) -> Vec<PathBuf> {
        self.packages
            .values()
            .map(|node| node.info.root.clone())
            .chain(self.folders.iter().cloned())
            .collect()
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.package_of(path).is_some() || self.folders.iter().any(|f| path.starts_with(f))
    }
}

fn containing_package<'a>(visible: &'a [PackageInfo], path: &Path) -> Option<&'a PackageInfo> {
    visible
        .iter()
        .filter(|p| p.contains(path))
        .max_by_key(|p| p.root.components().count())
}
