use crate::models::SourcePath;

/// Outcomes a caller of the driver or the search index must handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Path is not inside any analysis root: {0}")]
    InvalidPath(SourcePath),
    #[error("Analysis cancelled")]
    Cancelled,
    #[error("Invalid name pattern: {0}")]
    InvalidPattern(String),
    #[error("Unknown subtype id: {0}")]
    UnknownSubtype(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("I/O error for {path}: {message}")]
    Io { path: SourcePath, message: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisError::Cancelled)
    }
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
