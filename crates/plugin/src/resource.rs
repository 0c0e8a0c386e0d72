use std::path::{Path, PathBuf};

/// File-system collaborator. The driver never touches the disk directly.
pub trait ResourceProvider: Send + Sync {
    fn read(&self, path: &Path) -> std::io::Result<String>;

    /// Every file below `root`, in a deterministic order.
    fn list_files(&self, root: &Path) -> Vec<PathBuf>;

    fn exists(&self, path: &Path) -> bool;
}
