use refscope_api::{AnalysisError, SourcePath};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RefscopeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Plugin error: {0}")]
    Plugin(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for RefscopeError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        RefscopeError::Plugin(err.to_string())
    }
}

impl RefscopeError {
    /// Attach the file an error happened for, producing the caller-facing taxonomy.
    pub fn for_path(self, path: &SourcePath) -> AnalysisError {
        match self {
            RefscopeError::Io(err) => AnalysisError::Io {
                path: path.clone(),
                message: err.to_string(),
            },
            RefscopeError::Analysis(err) => err,
            other => AnalysisError::Internal(other.to_string()),
        }
    }
}

impl From<RefscopeError> for AnalysisError {
    fn from(err: RefscopeError) -> Self {
        match err {
            RefscopeError::Analysis(err) => err,
            other => AnalysisError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RefscopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_keeps_path() {
        let path = SourcePath::new("/ws/lib/a.dart");
        let err = RefscopeError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        match err.for_path(&path) {
            AnalysisError::Io { path: p, message } => {
                assert_eq!(p, path);
                assert!(message.contains("missing"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cancellation_passes_through() {
        let err: AnalysisError = RefscopeError::Analysis(AnalysisError::Cancelled).into();
        assert!(err.is_cancelled());
    }
}
