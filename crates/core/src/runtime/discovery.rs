use super::{AnalysisDriver, FileState, ParsedFile};
use crate::cancel::CancelToken;
use crate::error::RefscopeError;
use crate::project::SessionContext;
use indexmap::IndexSet;
use rayon::prelude::*;
use refscope_api::models::{Language, SourcePath, Snapshot};
use refscope_api::{AnalysisError, AnalysisResult};
use refscope_plugin::{ParsedUnit, ResolvedDirective, SyntaxError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl AnalysisDriver {
    /// List the files of every package and folder root once.
    ///
    /// All-or-nothing: a cancelled discovery publishes nothing.
    pub fn ensure_discovered(&self, token: &CancelToken) -> AnalysisResult<()> {
        let state = self.snapshot();
        if state.discovered {
            return Ok(());
        }

        let mut listed: IndexSet<SourcePath> = IndexSet::new();
        for root in state.session.packages().roots() {
            token.check()?;
            for file in self.resources.list_files(&root) {
                if self.caps_for(&file).is_some() {
                    listed.insert(SourcePath::new(file));
                }
            }
        }

        let mut found: Vec<Arc<Snapshot>> = Vec::new();
        for path in listed {
            token.check()?;
            if state.files.contains_key(&path) {
                continue;
            }
            match self.read_source(&state, &path) {
                Ok(content) => found.push(self.new_snapshot(path, content)),
                Err(err) => warn!(path = %path, error = %err, "unreadable file skipped"),
            }
        }

        let count = found.len();
        self.update(|next| {
            if !Arc::ptr_eq(&next.session, &state.session) {
                // The roots changed meanwhile; the next query discovers again.
                return;
            }
            for snapshot in found {
                if !next.files.contains_key(&snapshot.path) {
                    next.files
                        .insert(snapshot.path.clone(), FileState::new(snapshot));
                }
            }
            next.discovered = true;
        });
        info!(files = count, "discovery finished");
        Ok(())
    }

    /// Make sure `path` is tracked, discovering the session's files first.
    ///
    /// Fails with `InvalidPath` when the path is outside every root, has no
    /// language plugin, or does not exist.
    pub fn ensure_tracked(
        &self,
        path: &SourcePath,
        token: &CancelToken,
    ) -> AnalysisResult<Arc<Snapshot>> {
        if let Some(file) = self.snapshot().files.get(path) {
            return Ok(file.snapshot.clone());
        }
        let state = self.snapshot();
        if !state.is_known(path) || self.caps_for(path.as_path()).is_none() {
            return Err(AnalysisError::InvalidPath(path.clone()));
        }

        self.ensure_discovered(token)?;
        let state = self.snapshot();
        if let Some(file) = state.files.get(path) {
            return Ok(file.snapshot.clone());
        }

        let content = match self.read_source(&state, path) {
            Ok(content) => content,
            Err(RefscopeError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(AnalysisError::InvalidPath(path.clone()));
            }
            Err(err) => return Err(err.for_path(path)),
        };
        let snapshot = self.new_snapshot(path.clone(), content);
        let mut tracked = snapshot.clone();
        self.update(|next| match next.files.get(path) {
            Some(existing) => tracked = existing.snapshot.clone(),
            None => {
                next.files
                    .insert(path.clone(), FileState::new(snapshot.clone()));
            }
        });
        debug!(path = %path, "tracked outside discovery");
        Ok(tracked)
    }

    /// Parse every tracked file whose current snapshot has no parse yet.
    pub fn ensure_parsed(&self, token: &CancelToken) -> AnalysisResult<()> {
        self.ensure_discovered(token)?;
        let state = self.snapshot();
        let pending: Vec<Arc<Snapshot>> = state
            .files
            .values()
            .filter(|f| f.current_parse().is_none())
            .map(|f| f.snapshot.clone())
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let parsed = self.parse_batch(&state.session, &pending, token)?;
        self.update(|next| {
            for parsed in parsed {
                if let Some(file) = next.files.get_mut(&parsed.unit.path) {
                    if file.snapshot.stamp == parsed.stamp() {
                        file.parsed = Some(parsed);
                    }
                }
            }
        });
        Ok(())
    }

    /// Parse `snapshots`, on the parse pool when the batch is large enough.
    pub(crate) fn parse_batch(
        &self,
        session: &SessionContext,
        snapshots: &[Arc<Snapshot>],
        token: &CancelToken,
    ) -> AnalysisResult<Vec<Arc<ParsedFile>>> {
        let parse_one = |snapshot: &Arc<Snapshot>| -> Option<Arc<ParsedFile>> {
            if token.is_cancelled() {
                return None;
            }
            Some(Arc::new(self.parse_file(session, snapshot)))
        };

        let parsed: Vec<Option<Arc<ParsedFile>>> = match &self.parse_pool {
            Some(pool) if snapshots.len() >= self.config.parallel_parse_min_batch => {
                pool.install(|| snapshots.par_iter().map(parse_one).collect())
            }
            _ => snapshots.iter().map(parse_one).collect(),
        };
        token.check()?;
        parsed
            .into_iter()
            .map(|p| p.ok_or(AnalysisError::Cancelled))
            .collect()
    }

    fn parse_file(&self, session: &SessionContext, snapshot: &Snapshot) -> ParsedFile {
        let path = &snapshot.path;
        let Some(caps) = self.caps_for(path.as_path()) else {
            return failed_parse(
                snapshot,
                Language::UNKNOWN,
                SyntaxError::new(0, "no language plugin"),
            );
        };
        // A panicking plugin fails this file only.
        match panic::catch_unwind(AssertUnwindSafe(|| caps.parser.parse(snapshot))) {
            Ok(Ok(unit)) => {
                let directives = unit
                    .directives
                    .iter()
                    .map(|d| ResolvedDirective {
                        directive: d.clone(),
                        target: session.resolve_uri(path, &d.uri),
                    })
                    .collect();
                ParsedFile::new(unit, caps.language.clone(), directives, false)
            }
            Ok(Err(err)) => {
                warn!(path = %path, error = %err, "parse failed");
                failed_parse(snapshot, caps.language.clone(), err)
            }
            Err(_) => {
                warn!(path = %path, "parser panicked");
                let err = SyntaxError::new(0, "parser panicked");
                failed_parse(snapshot, caps.language.clone(), err)
            }
        }
    }
}

fn failed_parse(snapshot: &Snapshot, language: Language, error: SyntaxError) -> ParsedFile {
    let unit = ParsedUnit {
        path: snapshot.path.clone(),
        stamp: snapshot.stamp,
        directives: Vec::new(),
        errors: vec![error],
        identifiers: Vec::new(),
        tree: Arc::new(()),
    };
    ParsedFile::new(unit, language, Vec::new(), true)
}
