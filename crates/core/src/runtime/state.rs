use crate::index::SearchIndex;
use crate::project::SessionContext;
use indexmap::{IndexMap, IndexSet};
use refscope_api::models::{
    Element, ElementKey, Language, LibraryElements, Occurrence, SourcePath, Snapshot, Stamp,
};
use refscope_plugin::{DirectiveKind, ParsedUnit, ResolvedDirective};
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// A parse of one snapshot together with its directive targets.
#[derive(Debug)]
pub struct ParsedFile {
    pub unit: ParsedUnit,
    pub language: Language,
    pub directives: Vec<ResolvedDirective>,
    identifiers: HashSet<SmolStr>,
    /// The parser rejected the file outright; there is no tree to resolve.
    pub failed: bool,
}

impl ParsedFile {
    pub fn new(
        unit: ParsedUnit,
        language: Language,
        directives: Vec<ResolvedDirective>,
        failed: bool,
    ) -> Self {
        let identifiers = unit.identifiers.iter().cloned().collect();
        Self {
            unit,
            language,
            directives,
            identifiers,
            failed,
        }
    }

    pub fn stamp(&self) -> Stamp {
        self.unit.stamp
    }

    pub fn mentions(&self, name: &str) -> bool {
        self.identifiers.contains(name)
    }

    /// Every file this one names in a directive.
    pub fn dependencies(&self) -> impl Iterator<Item = &SourcePath> {
        self.directives.iter().filter_map(|d| d.target.as_ref())
    }

    /// The library owning this file when it is a part.
    pub fn part_of(&self) -> Option<&SourcePath> {
        self.directives
            .iter()
            .find(|d| d.directive.kind == DirectiveKind::PartOf)
            .and_then(|d| d.target.as_ref())
    }

    pub fn targets_of(&self, kind: DirectiveKind) -> impl Iterator<Item = &SourcePath> {
        self.directives
            .iter()
            .filter(move |d| d.directive.kind == kind)
            .filter_map(|d| d.target.as_ref())
    }
}

/// The resolved form of one file.
#[derive(Debug)]
pub struct ResolvedUnit {
    pub snapshot: Arc<Snapshot>,
    pub uri: SmolStr,
    /// The library this file belongs to: itself, or the owner of a part.
    pub library_path: SourcePath,
    pub library_uri: SmolStr,
    pub library: Arc<LibraryElements>,
    pub occurrences: Vec<Occurrence>,
    pub directives: Vec<ResolvedDirective>,
    /// Parsing or resolution failed; the unit exists but queries skip it.
    pub partial: bool,
    pub diagnostics: Vec<String>,
    /// Stamp of every file the unit was computed from, itself included.
    pub(crate) inputs: Vec<(SourcePath, Stamp)>,
}

impl ResolvedUnit {
    pub fn path(&self) -> &SourcePath {
        &self.snapshot.path
    }

    pub fn stamp(&self) -> Stamp {
        self.snapshot.stamp
    }

    pub fn elements(&self) -> &[Arc<Element>] {
        self.library.elements()
    }

    pub fn element(&self, key: &ElementKey) -> Option<&Arc<Element>> {
        self.library.element(key)
    }

    /// The declaration whose name covers `offset`.
    pub fn declaration_at(&self, offset: usize) -> Option<&Arc<Element>> {
        self.library
            .elements()
            .iter()
            .filter(|e| e.location.as_ref().is_some_and(|l| l.covers(offset)))
            .min_by_key(|e| e.location.as_ref().map(|l| l.length))
    }

    pub fn occurrence_at(&self, offset: usize) -> Option<&Occurrence> {
        self.occurrences
            .iter()
            .find(|o| offset >= o.offset && offset <= o.end())
    }

    pub fn inputs(&self) -> &[(SourcePath, Stamp)] {
        &self.inputs
    }
}

#[derive(Debug, Clone)]
pub struct FileState {
    pub snapshot: Arc<Snapshot>,
    pub parsed: Option<Arc<ParsedFile>>,
    pub unit: Option<Arc<ResolvedUnit>>,
    /// An input changed since `unit` was computed.
    pub dirty: bool,
}

impl FileState {
    pub fn new(snapshot: Arc<Snapshot>) -> Self {
        Self {
            snapshot,
            parsed: None,
            unit: None,
            dirty: true,
        }
    }

    /// The parse of the current snapshot, if there is one.
    pub fn current_parse(&self) -> Option<&Arc<ParsedFile>> {
        self.parsed
            .as_ref()
            .filter(|p| p.stamp() == self.snapshot.stamp)
    }
}

/// Published state of the driver. Immutable once published; writers clone,
/// modify and swap.
#[derive(Debug, Clone, Default)]
pub struct DriverState {
    pub(crate) roots: Vec<PathBuf>,
    pub(crate) session: Arc<SessionContext>,
    /// Tracked files in discovery order.
    pub(crate) files: IndexMap<SourcePath, FileState>,
    pub(crate) overlays: HashMap<SourcePath, Arc<str>>,
    pub(crate) discovered: bool,
    pub(crate) index: SearchIndex,
}

impl DriverState {
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    pub fn is_discovered(&self) -> bool {
        self.discovered
    }

    pub fn file(&self, path: &SourcePath) -> Option<&FileState> {
        self.files.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &SourcePath> {
        self.files.keys()
    }

    pub fn overlay(&self, path: &SourcePath) -> Option<&Arc<str>> {
        self.overlays.get(path)
    }

    /// Position of `path` in discovery order; untracked paths sort last.
    pub fn file_order(&self, path: &SourcePath) -> usize {
        self.files.get_index_of(path).unwrap_or(usize::MAX)
    }

    /// Inside an analysis root or a discovered package.
    pub fn is_known(&self, path: &SourcePath) -> bool {
        self.roots.iter().any(|r| path.is_within(r))
            || self.session.packages().contains_path(path.as_path())
    }

    /// The cached unit, if no input changed since it was computed.
    pub fn fresh_unit(&self, path: &SourcePath) -> Option<&Arc<ResolvedUnit>> {
        let file = self.files.get(path)?;
        let unit = file.unit.as_ref()?;
        if file.dirty || unit.stamp() != file.snapshot.stamp {
            return None;
        }
        unit.inputs
            .iter()
            .all(|(input, stamp)| {
                self.files
                    .get(input)
                    .is_some_and(|f| f.snapshot.stamp == *stamp)
            })
            .then_some(unit)
    }

    /// The library owning `path` according to its current parse.
    pub fn library_of(&self, path: &SourcePath) -> SourcePath {
        self.files
            .get(path)
            .and_then(|f| f.parsed.as_ref())
            .and_then(|p| p.part_of())
            .cloned()
            .unwrap_or_else(|| path.clone())
    }

    /// `path` followed by every file that depends on it through
    /// directives, transitively, in discovery order.
    pub fn dependents_closure(&self, path: &SourcePath) -> IndexSet<SourcePath> {
        let mut reverse: HashMap<&SourcePath, Vec<&SourcePath>> = HashMap::new();
        for (file, state) in &self.files {
            if let Some(parsed) = &state.parsed {
                for dependency in parsed.dependencies() {
                    reverse.entry(dependency).or_default().push(file);
                }
            }
        }

        let mut closure: IndexSet<SourcePath> = IndexSet::new();
        closure.insert(path.clone());
        let mut stack = vec![path];
        while let Some(current) = stack.pop() {
            for dependent in reverse.get(current).into_iter().flatten() {
                if closure.insert((*dependent).clone()) {
                    stack.push(*dependent);
                }
            }
        }
        let mut ordered: Vec<SourcePath> = closure.into_iter().collect();
        ordered.sort_by_key(|p| (p != path, self.file_order(p)));
        ordered.into_iter().collect()
    }

    pub(crate) fn mark_dependents_dirty(&mut self, path: &SourcePath) -> usize {
        let closure = self.dependents_closure(path);
        let mut marked = 0;
        for dependent in &closure {
            if let Some(file) = self.files.get_mut(dependent) {
                if !file.dirty {
                    file.dirty = true;
                    marked += 1;
                }
            }
        }
        marked
    }
}
