use smol_str::SmolStr;
use std::path::{Path, PathBuf};

/// A package as described by the package configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageInfo {
    pub name: SmolStr,
    pub root: PathBuf,
}

impl PackageInfo {
    pub fn new(name: impl Into<SmolStr>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Directory holding the package's public libraries (`package:` URIs).
    pub fn lib_dir(&self) -> PathBuf {
        self.root.join("lib")
    }

    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

/// Package-config collaborator.
pub trait PackageConfigProvider: Send + Sync {
    /// The package containing `path` plus the packages it declares as
    /// dependencies. Empty when `path` is not inside a configured package.
    fn packages_visible_from(&self, path: &Path) -> Vec<PackageInfo>;
}
