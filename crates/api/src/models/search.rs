use super::element::ElementKey;
use super::source::SourcePath;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::HashSet;

/// How an occurrence uses the element it was matched against.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum SearchResultKind {
    Reference,
    Read,
    Write,
    ReadWrite,
    Invocation,
    ReferenceByConstructorTearOff,
    InvocationByEnumConstantWithoutArguments,
}

/// A single match produced by a reference-style query.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchResult {
    pub path: SourcePath,
    /// Innermost declaration containing the occurrence.
    pub enclosing_element: Option<ElementKey>,
    pub kind: SearchResultKind,
    pub offset: usize,
    pub length: usize,
    /// `false` for heuristic name matches that could not be bound statically.
    pub is_resolved: bool,
    /// Written with an explicit receiver (`x.name`, `this.name`).
    pub is_qualified: bool,
}

/// Result of a `subtypes` query.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubtypeResult {
    /// `<libraryUri>;<declaringUri>;<name>`.
    pub id: String,
    pub name: SmolStr,
    pub library_uri: String,
    /// Names of members declared directly on the subtype, in declaration order.
    pub members: Vec<SmolStr>,
}

impl SubtypeResult {
    pub fn make_id(library_uri: &str, declaring_uri: &str, name: &str) -> String {
        format!("{library_uri};{declaring_uri};{name}")
    }
}

/// Kind of a workspace symbol.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DeclarationKind {
    Class,
    Constructor,
    Enum,
    EnumConstant,
    Extension,
    ExtensionType,
    Field,
    Function,
    Getter,
    Method,
    Mixin,
    Setter,
    TypeAlias,
    Variable,
}

/// Denormalized, queryable projection of a declaration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: SmolStr,
    pub kind: DeclarationKind,
    pub path: SourcePath,
    /// Index of `path` in [`WorkspaceSymbols::files`].
    pub file_index: usize,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub code_offset: usize,
    pub code_length: usize,
    pub containing_class_name: Option<SmolStr>,
    pub containing_mixin_name: Option<SmolStr>,
    pub parameters: Option<SmolStr>,
}

/// Result of a `declarations` query.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceSymbols {
    pub declarations: Vec<Declaration>,
    pub files: Vec<SourcePath>,
    /// The query was cancelled; `declarations` is a prefix of the full result.
    pub cancelled: bool,
}

impl WorkspaceSymbols {
    /// Index of `path` in `files`, appending it on first use.
    pub fn file_index(&mut self, path: &SourcePath) -> usize {
        match self.files.iter().position(|p| p == path) {
            Some(i) => i,
            None => {
                self.files.push(path.clone());
                self.files.len() - 1
            }
        }
    }
}

/// What a query scanned a file for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Search {
    References(ElementKey),
    UnresolvedMembers(SmolStr),
    ClassMembers(SmolStr),
    Subtypes(ElementKey),
    SupertypeClauses(ElementKey),
    TopLevelElements(SmolStr),
}

/// Files already scanned by the current query.
///
/// Owned by one query invocation and shared across its expansion steps. A
/// file is skipped only by the search that already scanned it, so a query
/// over several elements still visits each file once per element.
#[derive(Debug, Default)]
pub struct SearchedFiles {
    scanned: HashSet<(SourcePath, Search)>,
    paths: HashSet<SourcePath>,
}

impl SearchedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `search` scanned `path`; returns `false` if it already
    /// had.
    pub fn add(&mut self, path: &SourcePath, search: &Search) -> bool {
        self.paths.insert(path.clone());
        self.scanned.insert((path.clone(), search.clone()))
    }

    pub fn was_searched(&self, path: &SourcePath, search: &Search) -> bool {
        self.scanned.contains(&(path.clone(), search.clone()))
    }

    /// Scanned by any search.
    pub fn contains(&self, path: &SourcePath) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_searched_files_add_once_per_search() {
        let mut searched = SearchedFiles::new();
        let p = SourcePath::new("/a.dart");
        let x = Search::References(ElementKey::new(p.clone(), "x"));
        let y = Search::References(ElementKey::new(p.clone(), "y"));
        assert!(searched.add(&p, &x));
        assert!(!searched.add(&p, &x));
        assert!(searched.was_searched(&p, &x));
        assert!(!searched.was_searched(&p, &y));
        assert!(searched.add(&p, &y));
        assert!(searched.contains(&p));
        assert_eq!(searched.len(), 1);
    }

    #[test]
    fn test_subtype_id_format() {
        let id = SubtypeResult::make_id("package:aaa/a.dart", "package:aaa/a.dart", "B");
        assert_eq!(id, "package:aaa/a.dart;package:aaa/a.dart;B");
    }

    #[test]
    fn test_workspace_symbols_file_index_is_stable() {
        let mut ws = WorkspaceSymbols::default();
        let a = SourcePath::new("/a.dart");
        let b = SourcePath::new("/b.dart");
        assert_eq!(ws.file_index(&a), 0);
        assert_eq!(ws.file_index(&b), 1);
        assert_eq!(ws.file_index(&a), 0);
    }
}
