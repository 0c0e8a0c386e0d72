//! Analysis driver with MVCC state.
//!
//! - Readers take a cheap snapshot (`Arc` clone) of the published state.
//! - Writers clone the state, apply their change and swap it in.
//! - Resolution computes outside the lock and commits all-or-nothing.

mod discovery;
mod resolve;
mod state;

pub use state::{DriverState, FileState, ParsedFile, ResolvedUnit};

use crate::cancel::CancelToken;
use crate::config::DriverConfig;
use crate::error::{RefscopeError, Result};
use crate::project::{PackageGraph, SessionContext, StaticPackageConfig};
use crate::util::content_hash;
use dashmap::DashMap;
use refscope_api::models::{Element, ElementKey, SourcePath, Snapshot, Stamp};
use refscope_api::{AnalysisError, AnalysisResult};
use refscope_plugin::{LanguageCaps, PackageConfigProvider, ResourceProvider};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info};

pub struct AnalysisDriver {
    config: DriverConfig,

    /// Current published state (double Arc for MVCC)
    state: RwLock<Arc<DriverState>>,

    languages: Vec<LanguageCaps>,
    package_config: Arc<dyn PackageConfigProvider>,
    resources: Arc<dyn ResourceProvider>,

    /// Dedicated pool for parsing large batches
    parse_pool: Option<rayon::ThreadPool>,

    /// One lock per path with a resolution in flight
    in_flight: DashMap<SourcePath, Arc<tokio::sync::Mutex<()>>>,

    next_stamp: AtomicU64,
}

pub struct AnalysisDriverBuilder {
    resources: Arc<dyn ResourceProvider>,
    package_config: Option<Arc<dyn PackageConfigProvider>>,
    languages: Vec<LanguageCaps>,
    roots: Vec<PathBuf>,
    config: DriverConfig,
}

impl AnalysisDriverBuilder {
    pub fn with_language(mut self, caps: LanguageCaps) -> Self {
        self.languages.push(caps);
        self
    }

    pub fn with_package_config(mut self, provider: Arc<dyn PackageConfigProvider>) -> Self {
        self.package_config = Some(provider);
        self
    }

    pub fn with_root(mut self, root: impl AsRef<Path>) -> Self {
        self.roots.push(SourcePath::new(root).as_path().to_path_buf());
        self
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<AnalysisDriver> {
        if self.languages.is_empty() {
            return Err(RefscopeError::Plugin(
                "no language plugin registered".to_string(),
            ));
        }
        let parse_pool = if self.config.max_parallel_parse > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.max_parallel_parse)
                .thread_name(|i| format!("refscope-parse-{i}"))
                .build()
                .map_err(|e| RefscopeError::Internal(e.to_string()))?;
            Some(pool)
        } else {
            None
        };

        let package_config = self
            .package_config
            .unwrap_or_else(|| Arc::new(StaticPackageConfig::new()));
        let packages = PackageGraph::discover(&self.roots, package_config.as_ref());
        info!(
            roots = self.roots.len(),
            packages = packages.len(),
            "analysis session created"
        );

        let state = DriverState {
            roots: self.roots,
            session: Arc::new(SessionContext::new(Arc::new(packages))),
            ..DriverState::default()
        };

        Ok(AnalysisDriver {
            config: self.config,
            state: RwLock::new(Arc::new(state)),
            languages: self.languages,
            package_config,
            resources: self.resources,
            parse_pool,
            in_flight: DashMap::new(),
            next_stamp: AtomicU64::new(1),
        })
    }
}

impl AnalysisDriver {
    pub fn builder(resources: Arc<dyn ResourceProvider>) -> AnalysisDriverBuilder {
        AnalysisDriverBuilder {
            resources,
            package_config: None,
            languages: Vec::new(),
            roots: Vec::new(),
            config: DriverConfig::default(),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// The current published state. Stays consistent while held.
    pub fn snapshot(&self) -> Arc<DriverState> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.snapshot().roots.clone()
    }

    pub fn packages(&self) -> Arc<PackageGraph> {
        self.snapshot().session.packages().clone()
    }

    pub fn session(&self) -> Arc<SessionContext> {
        self.snapshot().session.clone()
    }

    /// Tracked files in discovery order.
    pub fn known_files(&self) -> Vec<SourcePath> {
        self.snapshot().files.keys().cloned().collect()
    }

    /// Widen the session by another analysis root.
    ///
    /// The package graph and the session context are rebuilt; directive
    /// targets may change, so every cached parse and unit is invalidated.
    pub fn add_root(&self, root: impl AsRef<Path>) {
        let root = SourcePath::new(root).as_path().to_path_buf();
        self.update(|state| {
            if state.roots.contains(&root) {
                return;
            }
            state.roots.push(root.clone());
            let packages = PackageGraph::discover(&state.roots, self.package_config.as_ref());
            info!(root = %root.display(), packages = packages.len(), "analysis root added");
            state.session = Arc::new(SessionContext::new(Arc::new(packages)));
            state.discovered = false;
            for file in state.files.values_mut() {
                file.parsed = None;
                file.dirty = true;
            }
        });
    }

    /// Record new content for `path`.
    ///
    /// Cheap and synchronous: replaces the snapshot and marks dependents
    /// dirty; nothing is parsed or resolved.
    pub fn apply_edit(&self, path: &SourcePath, content: impl Into<Arc<str>>) {
        let content: Arc<str> = content.into();
        let hash = content_hash(&content);
        self.update(|state| {
            state.overlays.insert(path.clone(), content.clone());
            if !state.is_known(path) || !self.supports(path) {
                debug!(path = %path, "overlay outside analysis roots");
                return;
            }
            if let Some(file) = state.files.get(path) {
                if file.snapshot.content_hash == hash {
                    return;
                }
            }
            let snapshot = Arc::new(Snapshot::new(
                path.clone(),
                content.clone(),
                self.next_stamp(),
                hash,
            ));
            match state.files.get_mut(path) {
                Some(file) => {
                    file.snapshot = snapshot;
                    file.dirty = true;
                }
                None => {
                    state.files.insert(path.clone(), FileState::new(snapshot));
                }
            }
            let marked = state.mark_dependents_dirty(path);
            debug!(path = %path, marked, "edit applied");
        });
    }

    /// Forget `path`: its overlay, its cached results and its index entries.
    pub fn remove_file(&self, path: &SourcePath) {
        self.update(|state| {
            state.overlays.remove(path);
            let marked = state.mark_dependents_dirty(path);
            state.files.shift_remove(path);
            state.index.remove(path);
            debug!(path = %path, marked, "file removed");
        });
    }

    /// The resolved unit of `path`.
    ///
    /// A fresh cached unit is returned as is (the same `Arc`). Otherwise the
    /// stale part of the dependency closure is resolved and committed;
    /// concurrent callers for the same path wait for one resolution.
    pub async fn get_resolved_unit(
        &self,
        path: &SourcePath,
        token: &CancelToken,
    ) -> AnalysisResult<Arc<ResolvedUnit>> {
        token.check()?;
        self.ensure_tracked(path, token)?;
        if let Some(unit) = self.snapshot().fresh_unit(path) {
            return Ok(unit.clone());
        }

        let lock = self.in_flight.entry(path.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            match self.snapshot().fresh_unit(path) {
                Some(unit) => Ok(unit.clone()),
                None => run_blocking(|| self.resolve_and_commit(path, token)),
            }
        };
        drop(lock);
        self.in_flight
            .remove_if(path, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// The element identified by `key`, resolving its file if needed.
    pub async fn element(
        &self,
        key: &ElementKey,
        token: &CancelToken,
    ) -> AnalysisResult<Option<Arc<Element>>> {
        let unit = self.get_resolved_unit(&key.path, token).await?;
        Ok(unit.element(key).cloned())
    }

    /// Resolve every tracked file so the index covers the whole session.
    pub async fn ensure_indexed(&self, token: &CancelToken) -> AnalysisResult<()> {
        self.ensure_parsed(token)?;
        for path in self.known_files() {
            token.check()?;
            match self.get_resolved_unit(&path, token).await {
                Ok(_) => {}
                Err(AnalysisError::Cancelled) => return Err(AnalysisError::Cancelled),
                Err(err) => debug!(path = %path, error = %err, "skipped while indexing"),
            }
        }
        Ok(())
    }

    fn update(&self, change: impl FnOnce(&mut DriverState)) {
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        let mut next = (**guard).clone();
        change(&mut next);
        *guard = Arc::new(next);
    }

    fn next_stamp(&self) -> Stamp {
        Stamp(self.next_stamp.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn caps_for(&self, path: &Path) -> Option<&LanguageCaps> {
        self.languages.iter().find(|caps| caps.supports_path(path))
    }

    fn supports(&self, path: &SourcePath) -> bool {
        self.caps_for(path.as_path()).is_some()
    }

    pub(crate) fn new_snapshot(&self, path: SourcePath, content: Arc<str>) -> Arc<Snapshot> {
        let hash = content_hash(&content);
        Arc::new(Snapshot::new(path, content, self.next_stamp(), hash))
    }

    /// Overlay content if there is one, else the resource provider's.
    pub(crate) fn read_source(&self, state: &DriverState, path: &SourcePath) -> Result<Arc<str>> {
        if let Some(content) = state.overlay(path) {
            return Ok(content.clone());
        }
        Ok(Arc::from(self.resources.read(path.as_path())?))
    }
}

/// Run CPU-bound work so other tasks on a multi-threaded runtime keep
/// their worker. A current-thread runtime runs it inline.
fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}
