//! Resolution of the stale part of a dependency closure.
//!
//! 1. Walk the closure of the target through directive targets, parsing
//!    files whose current snapshot has no parse.
//! 2. Order the stale files into library cycles with Tarjan's algorithm
//!    (dependencies first).
//! 3. Resolve each cycle against what is already resolved; multi-file
//!    cycles get a second pass so members see each other's elements.
//! 4. Stage everything, then commit under the write lock. A staged unit is
//!    installed only if every file it was computed from still has the
//!    stamp it was read at.

use super::{AnalysisDriver, FileState, ParsedFile, ResolvedUnit};
use crate::cancel::CancelToken;
use crate::project::SessionContext;
use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use refscope_api::models::{
    Element, ElementKey, ElementKind, LibraryElements, SourcePath, Snapshot, Stamp,
};
use refscope_api::{AnalysisError, AnalysisResult};
use refscope_plugin::{DirectiveKind, ResolutionScope, ResolvedDirective};
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

struct WorkFile {
    snapshot: Arc<Snapshot>,
    parsed: Arc<ParsedFile>,
    fresh: Option<Arc<ResolvedUnit>>,
    /// Read during this batch, not yet tracked.
    new_file: bool,
    /// Parsed during this batch.
    reparsed: bool,
}

struct Staged {
    path: SourcePath,
    snapshot: Arc<Snapshot>,
    parsed: Option<Arc<ParsedFile>>,
    unit: Option<Arc<ResolvedUnit>>,
    new_file: bool,
}

impl AnalysisDriver {
    pub(super) fn resolve_and_commit(
        &self,
        target: &SourcePath,
        token: &CancelToken,
    ) -> AnalysisResult<Arc<ResolvedUnit>> {
        let (unit, staged) = self.resolve_batch(target, token)?;
        let (installed, cached) = self.commit(target, staged);
        debug!(path = %target, installed, "resolution committed");
        Ok(cached.unwrap_or(unit))
    }

    fn resolve_batch(
        &self,
        target: &SourcePath,
        token: &CancelToken,
    ) -> AnalysisResult<(Arc<ResolvedUnit>, Vec<Staged>)> {
        let state = self.snapshot();
        let session = state.session.clone();
        let work = self.collect_closure(target, token)?;
        if !work.contains_key(target) {
            return Err(AnalysisError::InvalidPath(target.clone()));
        }

        // Library cycles over the stale files, dependencies first.
        let mut graph: DiGraph<&SourcePath, ()> = DiGraph::new();
        let mut nodes: HashMap<&SourcePath, NodeIndex> = HashMap::new();
        for (path, file) in &work {
            if file.fresh.is_none() {
                nodes.insert(path, graph.add_node(path));
            }
        }
        for (path, &node) in &nodes {
            for dependency in work[*path].parsed.dependencies() {
                if let Some(&dep_node) = nodes.get(dependency) {
                    if dep_node != node {
                        graph.update_edge(node, dep_node, ());
                    }
                }
            }
        }
        let cycles = tarjan_scc(&graph);

        let mut libraries: HashMap<SourcePath, Arc<LibraryElements>> = work
            .iter()
            .filter_map(|(path, file)| {
                file.fresh
                    .as_ref()
                    .map(|unit| (path.clone(), unit.library.clone()))
            })
            .collect();
        let mut units: HashMap<SourcePath, ResolvedUnit> = HashMap::new();

        for cycle in cycles {
            token.check()?;
            let members: Vec<&SourcePath> = cycle.iter().map(|&n| graph[n]).collect();
            let passes = if members.len() > 1 { 2 } else { 1 };
            for _ in 0..passes {
                let mut produced = Vec::with_capacity(members.len());
                for &path in &members {
                    token.check()?;
                    produced.push(self.resolve_file(&session, path, &work, &libraries));
                }
                for unit in produced {
                    libraries.insert(unit.path().clone(), unit.library.clone());
                    units.insert(unit.path().clone(), unit);
                }
            }
        }

        let mut staged = Vec::new();
        let mut result = work[target].fresh.clone();
        for (path, file) in &work {
            let unit = units.remove(path).map(|mut unit| {
                unit.inputs = input_stamps(path, &work);
                Arc::new(unit)
            });
            if path == target && unit.is_some() {
                result = unit.clone();
            }
            if unit.is_none() && !file.new_file && !file.reparsed {
                continue;
            }
            staged.push(Staged {
                path: path.clone(),
                snapshot: file.snapshot.clone(),
                parsed: file.reparsed.then(|| file.parsed.clone()),
                unit,
                new_file: file.new_file,
            });
        }

        let unit = result.ok_or_else(|| {
            AnalysisError::Internal(format!("no unit produced for {target}"))
        })?;
        Ok((unit, staged))
    }

    /// Breadth-first walk from `target` through directive targets.
    fn collect_closure(
        &self,
        target: &SourcePath,
        token: &CancelToken,
    ) -> AnalysisResult<IndexMap<SourcePath, WorkFile>> {
        let state = self.snapshot();
        let mut work: IndexMap<SourcePath, WorkFile> = IndexMap::new();
        let mut seen: HashSet<SourcePath> = HashSet::new();
        let mut frontier = vec![target.clone()];

        while !frontier.is_empty() {
            token.check()?;
            let start = work.len();
            let mut to_parse: Vec<(Arc<Snapshot>, bool)> = Vec::new();
            for path in frontier.drain(..) {
                if !seen.insert(path.clone()) {
                    continue;
                }
                match state.files.get(&path) {
                    Some(file) => match file.current_parse() {
                        Some(parsed) => {
                            work.insert(
                                path.clone(),
                                WorkFile {
                                    snapshot: file.snapshot.clone(),
                                    parsed: parsed.clone(),
                                    fresh: state.fresh_unit(&path).cloned(),
                                    new_file: false,
                                    reparsed: false,
                                },
                            );
                        }
                        None => to_parse.push((file.snapshot.clone(), false)),
                    },
                    None => {
                        if !state.is_known(&path) || self.caps_for(path.as_path()).is_none() {
                            continue;
                        }
                        match self.read_source(&state, &path) {
                            Ok(content) => {
                                to_parse.push((self.new_snapshot(path.clone(), content), true))
                            }
                            Err(err) => debug!(path = %path, error = %err, "dependency missing"),
                        }
                    }
                }
            }

            let snapshots: Vec<Arc<Snapshot>> = to_parse.iter().map(|(s, _)| s.clone()).collect();
            let parsed = self.parse_batch(&state.session, &snapshots, token)?;
            for ((snapshot, new_file), parsed) in to_parse.into_iter().zip(parsed) {
                work.insert(
                    snapshot.path.clone(),
                    WorkFile {
                        snapshot,
                        parsed,
                        fresh: None,
                        new_file,
                        reparsed: true,
                    },
                );
            }

            for (_, file) in work.iter().skip(start) {
                frontier.extend(
                    file.parsed
                        .dependencies()
                        .filter(|d| !seen.contains(*d))
                        .cloned(),
                );
            }
        }
        Ok(work)
    }

    fn resolve_file(
        &self,
        session: &SessionContext,
        path: &SourcePath,
        work: &IndexMap<SourcePath, WorkFile>,
        libraries: &HashMap<SourcePath, Arc<LibraryElements>>,
    ) -> ResolvedUnit {
        let file = &work[path];
        let uri = session.uri_for(path);
        let library_path = file
            .parsed
            .part_of()
            .filter(|owner| work.contains_key(*owner))
            .cloned()
            .unwrap_or_else(|| path.clone());
        let library_uri = session.uri_for(&library_path);

        // A part sees the imports of its library.
        let mut directives: Vec<ResolvedDirective> = file.parsed.directives.clone();
        if library_path != *path {
            directives.extend(
                work[&library_path]
                    .parsed
                    .directives
                    .iter()
                    .filter(|d| d.directive.kind == DirectiveKind::Import)
                    .cloned(),
            );
        }
        let exports: Vec<SourcePath> = file
            .parsed
            .targets_of(DirectiveKind::Export)
            .cloned()
            .collect();
        let parts: Vec<SourcePath> = file
            .parsed
            .targets_of(DirectiveKind::Part)
            .chain(file.parsed.part_of())
            .cloned()
            .collect();

        let mut diagnostics: Vec<String> = file
            .parsed
            .unit
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect();
        let mut partial = file.parsed.unit.has_errors();

        let resolved = match self.caps_for(path.as_path()) {
            Some(caps) if !file.parsed.failed => {
                let scope = ResolutionScope {
                    path,
                    library_uri: &library_uri,
                    directives: &directives,
                    libraries,
                };
                let resolve = || caps.resolver.resolve(&file.parsed.unit, &scope);
                match panic::catch_unwind(AssertUnwindSafe(resolve)) {
                    Ok(Ok(library)) => Some(library),
                    Ok(Err(err)) => {
                        diagnostics.push(err.to_string());
                        None
                    }
                    Err(_) => {
                        diagnostics.push("resolver panicked".to_string());
                        None
                    }
                }
            }
            _ => None,
        };

        let (elements, occurrences) = match resolved {
            Some(library) if is_library_element(library.elements.first()) => {
                diagnostics.extend(library.diagnostics);
                (library.elements, library.occurrences)
            }
            Some(_) => {
                diagnostics.push("resolver produced no library element".to_string());
                partial = true;
                (vec![library_element(path, &uri)], Vec::new())
            }
            None => {
                partial = true;
                (vec![library_element(path, &uri)], Vec::new())
            }
        };
        if partial {
            warn!(path = %path, diagnostics = diagnostics.len(), "unit resolved with errors");
        } else {
            debug!(path = %path, elements = elements.len(), "unit resolved");
        }

        ResolvedUnit {
            snapshot: file.snapshot.clone(),
            library: Arc::new(LibraryElements::new(
                path.clone(),
                uri.clone(),
                elements,
                exports,
                parts,
            )),
            uri,
            library_path,
            library_uri,
            occurrences,
            directives: file.parsed.directives.clone(),
            partial,
            diagnostics,
            inputs: Vec::new(),
        }
    }

    /// Install staged results whose inputs are unchanged.
    ///
    /// A path that already has a fresh unit keeps it, so a batch that also
    /// resolved a dependency never replaces the cache entry another caller
    /// already returned. Returns the number of units installed and the kept
    /// unit of `target`, if it had one.
    fn commit(
        &self,
        target: &SourcePath,
        staged: Vec<Staged>,
    ) -> (usize, Option<Arc<ResolvedUnit>>) {
        let mut installed = 0;
        let mut cached = None;
        self.update(|next| {
            for item in &staged {
                if !next.files.contains_key(&item.path) {
                    if item.new_file && next.is_known(&item.path) {
                        let mut file = FileState::new(item.snapshot.clone());
                        file.parsed = item.parsed.clone();
                        next.files.insert(item.path.clone(), file);
                    }
                    continue;
                }
                if let Some(file) = next.files.get_mut(&item.path) {
                    if file.snapshot.stamp == item.snapshot.stamp && item.parsed.is_some() {
                        file.parsed = item.parsed.clone();
                    }
                }
            }

            for item in staged {
                let Some(unit) = item.unit else { continue };
                let unchanged = unit.inputs.iter().all(|(input, stamp)| {
                    next.files
                        .get(input)
                        .is_some_and(|f| f.snapshot.stamp == *stamp)
                });
                if !unchanged {
                    debug!(path = %item.path, "stale result dropped at commit");
                    continue;
                }
                if let Some(fresh) = next.fresh_unit(&item.path) {
                    if item.path == *target {
                        cached = Some(fresh.clone());
                    }
                    debug!(path = %item.path, "fresh unit kept at commit");
                    continue;
                }
                if let Some(file) = next.files.get_mut(&item.path) {
                    file.unit = Some(unit.clone());
                    file.dirty = false;
                    next.index.update(&unit);
                    installed += 1;
                }
            }
        });
        (installed, cached)
    }
}

/// Stamps of `path` and every work file it transitively depends on.
fn input_stamps(
    path: &SourcePath,
    work: &IndexMap<SourcePath, WorkFile>,
) -> Vec<(SourcePath, Stamp)> {
    let mut seen: HashSet<&SourcePath> = HashSet::new();
    let mut stack = vec![path];
    let mut inputs = Vec::new();
    while let Some(current) = stack.pop() {
        let Some((key, file)) = work.get_key_value(current) else {
            continue;
        };
        if !seen.insert(key) {
            continue;
        }
        inputs.push((key.clone(), file.snapshot.stamp));
        stack.extend(file.parsed.dependencies());
    }
    inputs
}

fn is_library_element(element: Option<&Element>) -> bool {
    element.is_some_and(|e| matches!(e.kind, ElementKind::Library { .. }))
}

/// Synthetic library element for a unit the resolver produced nothing for.
fn library_element(path: &SourcePath, uri: &SmolStr) -> Element {
    Element {
        key: ElementKey::new(path.clone(), ""),
        name: None,
        kind: ElementKind::Library { uri: uri.clone() },
        enclosing: None,
        location: None,
        is_static: false,
        signature: None,
        declared_type: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::StaticPackageConfig;
    use crate::resource::MemoryResourceProvider;
    use refscope_dart::dart_caps;

    const A: &str = "/ws/app/lib/a.dart";
    const B: &str = "/ws/app/lib/b.dart";

    fn driver() -> AnalysisDriver {
        let provider = MemoryResourceProvider::new()
            .with_file(A, "class A {}\n")
            .with_file(B, "import 'a.dart';\nclass B extends A {}\n");
        let packages = StaticPackageConfig::new().package("app", "/ws/app", &[]);
        AnalysisDriver::builder(Arc::new(provider))
            .with_language(dart_caps())
            .with_package_config(Arc::new(packages))
            .with_root("/ws/app")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_keeps_a_dependency_resolved_meanwhile() {
        let driver = driver();
        let token = CancelToken::new();
        let (a, b) = (SourcePath::new(A), SourcePath::new(B));
        driver.ensure_tracked(&b, &token).unwrap();

        let (_, staged) = driver.resolve_batch(&b, &token).unwrap();
        assert_eq!(staged.iter().filter(|s| s.unit.is_some()).count(), 2);
        let first = driver.get_resolved_unit(&a, &token).await.unwrap();

        let (installed, cached) = driver.commit(&b, staged);
        assert_eq!(installed, 1);
        assert!(cached.is_none());

        let second = driver.get_resolved_unit(&a, &token).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(driver.snapshot().fresh_unit(&b).is_some());
    }

    #[tokio::test]
    async fn test_commit_returns_the_cached_target() {
        let driver = driver();
        let token = CancelToken::new();
        let a = SourcePath::new(A);
        driver.ensure_tracked(&a, &token).unwrap();

        let (unit, staged) = driver.resolve_batch(&a, &token).unwrap();
        let first = driver.get_resolved_unit(&a, &token).await.unwrap();
        assert!(!Arc::ptr_eq(&unit, &first));

        let (installed, cached) = driver.commit(&a, staged);
        assert_eq!(installed, 0);
        assert!(Arc::ptr_eq(&cached.unwrap(), &first));
    }
}
