use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Absolute, lexically normalized file identifier.
///
/// Stable across edits; cloning only bumps a reference count.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourcePath(Arc<Path>);

impl SourcePath {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self(Arc::from(normalize(path.as_ref()).as_path()))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn file_name(&self) -> &str {
        self.0.file_name().and_then(|n| n.to_str()).unwrap_or_default()
    }

    pub fn parent(&self) -> Option<&Path> {
        self.0.parent()
    }

    pub fn is_within(&self, root: &Path) -> bool {
        self.0.starts_with(root)
    }

    /// Resolve a relative reference (e.g. an import string) against this file's directory.
    pub fn join_sibling(&self, relative: &str) -> SourcePath {
        match self.0.parent() {
            Some(dir) => SourcePath::new(dir.join(relative)),
            None => SourcePath::new(relative),
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl fmt::Debug for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<&str> for SourcePath {
    fn from(s: &str) -> Self {
        SourcePath::new(s)
    }
}

impl From<PathBuf> for SourcePath {
    fn from(p: PathBuf) -> Self {
        SourcePath::new(p)
    }
}

impl From<&Path> for SourcePath {
    fn from(p: &Path) -> Self {
        SourcePath::new(p)
    }
}

impl AsRef<Path> for SourcePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Serialize for SourcePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string_lossy())
    }
}

impl<'de> Deserialize<'de> for SourcePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let path = String::deserialize(deserializer)?;
        Ok(SourcePath::new(path))
    }
}

/// Snapshot content travels as a plain string.
mod shared_text {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S: Serializer>(text: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Arc<str>, D::Error> {
        Ok(Arc::from(String::deserialize(deserializer)?))
    }
}

/// Monotonic version assigned to each snapshot of a file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Stamp(pub u64);

/// Immutable view of one file's content at a given stamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub path: SourcePath,
    #[serde(with = "shared_text")]
    pub content: Arc<str>,
    pub stamp: Stamp,
    pub content_hash: u64,
}

impl Snapshot {
    pub fn new(path: SourcePath, content: Arc<str>, stamp: Stamp, content_hash: u64) -> Self {
        Self {
            path,
            content,
            stamp,
            content_hash,
        }
    }

    pub fn text(&self) -> &str {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Convert a byte offset into a 0-based (line, column) pair. The
    /// column counts bytes; an offset inside a character is moved back to
    /// its start.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let mut offset = offset.min(self.content.len());
        while !self.content.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &self.content[..offset];
        let line = before.matches('\n').count();
        let col = match before.rfind('\n') {
            Some(nl) => offset - nl - 1,
            None => offset,
        };
        (line, col)
    }
}
