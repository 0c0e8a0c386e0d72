use refscope_plugin::{PackageConfigProvider, PackageInfo};
use smol_str::SmolStr;
use std::path::{Path, PathBuf};

/// Package configuration declared up front: each package with its root and
/// direct dependencies.
#[derive(Debug, Clone, Default)]
pub struct StaticPackageConfig {
    entries: Vec<(PackageInfo, Vec<SmolStr>)>,
}

impl StaticPackageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn package(mut self, name: &str, root: impl Into<PathBuf>, dependencies: &[&str]) -> Self {
        self.entries.push((
            PackageInfo::new(name, root),
            dependencies.iter().map(|d| SmolStr::new(d)).collect(),
        ));
        self
    }

    fn find(&self, name: &str) -> Option<&PackageInfo> {
        self.entries
            .iter()
            .map(|(info, _)| info)
            .find(|info| info.name == name)
    }
}

impl PackageConfigProvider for StaticPackageConfig {
    fn packages_visible_from(&self, path: &Path) -> Vec<PackageInfo> {
        let Some((own, dependencies)) = self
            .entries
            .iter()
            .filter(|(info, _)| info.contains(path))
            .max_by_key(|(info, _)| info.root.components().count())
        else {
            return Vec::new();
        };
        std::iter::once(own.clone())
            .chain(dependencies.iter().filter_map(|d| self.find(d).cloned()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_packages_are_own_plus_dependencies() {
        let config = StaticPackageConfig::new()
            .package("aaa", "/ws/aaa", &[])
            .package("bbb", "/ws/bbb", &["aaa", "missing"]);
        let names: Vec<_> = config
            .packages_visible_from(Path::new("/ws/bbb/lib/b.dart"))
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["bbb", "aaa"]);
        assert!(config.packages_visible_from(Path::new("/elsewhere")).is_empty());
    }
}
