//! [`ResourceProvider`] implementations: an in-memory file map and the
//! physical file system.

use ignore::WalkBuilder;
use refscope_plugin::ResourceProvider;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Files held in memory, keyed by absolute path.
#[derive(Debug, Default)]
pub struct MemoryResourceProvider {
    files: RwLock<BTreeMap<PathBuf, String>>,
}

impl MemoryResourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.add_file(path, content);
        self
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.into(), content.into());
    }

    pub fn remove_file(&self, path: &Path) -> bool {
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path)
            .is_some()
    }
}

impl ResourceProvider for MemoryResourceProvider {
    fn read(&self, path: &Path) -> io::Result<String> {
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn list_files(&self, root: &Path) -> Vec<PathBuf> {
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .filter(|p| p.starts_with(root))
            .cloned()
            .collect()
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(path)
    }
}

/// The real file system. Listing honours `.gitignore` and skips hidden
/// entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhysicalResourceProvider;

impl PhysicalResourceProvider {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceProvider for PhysicalResourceProvider {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn list_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        files
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_provider_lists_sorted_under_root() {
        let provider = MemoryResourceProvider::new()
            .with_file("/ws/b.dart", "")
            .with_file("/ws/a.dart", "class A {}")
            .with_file("/other/c.dart", "");
        assert_eq!(
            provider.list_files(Path::new("/ws")),
            vec![PathBuf::from("/ws/a.dart"), PathBuf::from("/ws/b.dart")]
        );
        assert_eq!(provider.read(Path::new("/ws/a.dart")).unwrap(), "class A {}");
        assert!(provider.remove_file(Path::new("/ws/a.dart")));
        assert_eq!(
            provider.read(Path::new("/ws/a.dart")).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_physical_provider_walks_directory() {
        let dir = tempfile::Builder::new()
            .prefix("refscope")
            .tempdir()
            .unwrap();
        std::fs::create_dir_all(dir.path().join("lib/src")).unwrap();
        std::fs::write(dir.path().join("lib/src/b.dart"), "class B {}").unwrap();
        std::fs::write(dir.path().join("lib/a.dart"), "class A {}").unwrap();

        let provider = PhysicalResourceProvider::new();
        let files = provider.list_files(dir.path());
        assert_eq!(
            files,
            vec![dir.path().join("lib/a.dart"), dir.path().join("lib/src/b.dart")]
        );
        assert!(provider.exists(&files[0]));
        assert_eq!(provider.read(&files[1]).unwrap(), "class B {}");
    }
}
