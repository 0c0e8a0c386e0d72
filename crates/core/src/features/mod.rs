//! Queries over the search index.
//!
//! Every query follows the same shape: compute the candidate files, scout
//! out the ones whose identifier set cannot contain the name, resolve the
//! rest lazily through the driver, then read their [`FileIndex`].

pub mod declarations;
pub mod hierarchy;
pub mod search;

use crate::cancel::CancelToken;
use crate::index::FileIndex;
use crate::runtime::AnalysisDriver;
use refscope_api::models::{Search, SearchResult, SearchedFiles, SourcePath};
use refscope_api::{AnalysisError, AnalysisResult};
use std::sync::Arc;
use tracing::debug;

impl AnalysisDriver {
    /// Resolve each candidate `search` has not scanned yet and hand its
    /// index to `visit`. Files that never spell `scout` are skipped
    /// unresolved.
    pub(crate) async fn scan_files(
        &self,
        candidates: impl IntoIterator<Item = SourcePath>,
        scout: Option<&str>,
        search: &Search,
        searched: &mut SearchedFiles,
        token: &CancelToken,
        mut visit: impl FnMut(&FileIndex),
    ) -> AnalysisResult<()> {
        let state = self.snapshot();
        for path in candidates {
            token.check()?;
            if searched.was_searched(&path, search) {
                continue;
            }
            if let Some(name) = scout {
                let parsed = state.file(&path).and_then(|f| f.current_parse());
                if parsed.is_some_and(|p| !p.mentions(name)) {
                    continue;
                }
            }
            let unit = match self.get_resolved_unit(&path, token).await {
                Ok(unit) => unit,
                Err(AnalysisError::Cancelled) => return Err(AnalysisError::Cancelled),
                Err(err) => {
                    debug!(path = %path, error = %err, "candidate skipped");
                    continue;
                }
            };
            searched.add(&path, search);
            if unit.partial {
                continue;
            }
            let index: Arc<FileIndex> = self.snapshot().index().file_for(&unit);
            visit(&index);
        }
        Ok(())
    }

    /// Sort by (file order, offset) and drop duplicate locations.
    pub(crate) fn finish_results(&self, mut results: Vec<SearchResult>) -> Vec<SearchResult> {
        let state = self.snapshot();
        results.sort_by_cached_key(|r| (state.file_order(&r.path), r.offset, r.length));
        results.dedup_by(|a, b| a.path == b.path && a.offset == b.offset && a.length == b.length);
        results
    }
}
