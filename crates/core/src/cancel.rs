//! Cooperative cancellation.
//!
//! A [`CancelToken`] is a shared single-shot flag. Long-running operations
//! poll it at these boundaries:
//!
//! - once per file during discovery, parsing and index scans;
//! - once per library cycle and once per file during resolution;
//! - once per declaration batch (`DriverConfig::cancel_check_batch`) in
//!   `declarations`.
//!
//! Nothing is preempted; a cancelled operation stops at the next boundary
//! and reports [`AnalysisError::Cancelled`].

use refscope_api::{AnalysisError, AnalysisResult};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub fn check(&self) -> AnalysisResult<()> {
        if self.inner.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// A token cancelled together with `self`, but cancellable on its own.
    pub fn child(&self) -> CancelToken {
        CancelToken {
            inner: self.inner.child_token(),
        }
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(AnalysisError::Cancelled));
    }

    #[test]
    fn test_child_follows_parent_only() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());

        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        token.cancel();
        handle.await.unwrap();
    }
}
