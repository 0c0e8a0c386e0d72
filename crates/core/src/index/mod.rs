//! Search index: one [`FileIndex`] per resolved file plus a global subtype
//! lattice, maintained by per-file deltas whenever a unit is committed or a
//! file is removed.

use crate::runtime::ResolvedUnit;
use indexmap::IndexSet;
use refscope_api::models::{
    Element, ElementKey, ElementTag, Occurrence, OccurrenceContext, SearchResultKind, SourcePath,
};
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::Arc;

/// Lookup tables over one resolved unit. Partial units get empty tables.
#[derive(Debug)]
pub struct FileIndex {
    unit: Arc<ResolvedUnit>,
    by_target: HashMap<ElementKey, Vec<usize>>,
    unresolved_members: HashMap<SmolStr, Vec<usize>>,
    class_members: HashMap<SmolStr, Vec<usize>>,
    /// `(subtype, direct supertype)` pairs declared in this file.
    subtype_edges: Vec<(ElementKey, ElementKey)>,
}

impl FileIndex {
    pub fn build(unit: Arc<ResolvedUnit>) -> Self {
        let mut index = FileIndex {
            unit,
            by_target: HashMap::new(),
            unresolved_members: HashMap::new(),
            class_members: HashMap::new(),
            subtype_edges: Vec::new(),
        };
        if index.unit.partial {
            return index;
        }

        for (i, occurrence) in index.unit.occurrences.iter().enumerate() {
            match &occurrence.target {
                Some(target) => index.by_target.entry(target.clone()).or_default().push(i),
                None if occurrence.is_member_selector => index
                    .unresolved_members
                    .entry(occurrence.name.clone())
                    .or_default()
                    .push(i),
                None => {}
            }
        }

        let library = index.unit.library.clone();
        for (i, element) in library.elements().iter().enumerate() {
            if let Some(shape) = element.kind.type_shape() {
                for supertype in shape.direct_supertypes() {
                    index
                        .subtype_edges
                        .push((element.key.clone(), supertype.clone()));
                }
            }
            if element.tag().is_class_member() && declared_in_type(&library, element) {
                if let Some(name) = &element.name {
                    index.class_members.entry(name.clone()).or_default().push(i);
                }
            }
        }
        index
    }

    pub fn unit(&self) -> &Arc<ResolvedUnit> {
        &self.unit
    }

    pub fn path(&self) -> &SourcePath {
        self.unit.path()
    }

    /// Resolved occurrences bound to `key`, in source order.
    pub fn references_to(&self, key: &ElementKey) -> impl Iterator<Item = &Occurrence> {
        self.occurrences_at(self.by_target.get(key))
    }

    /// Member-selector occurrences named `name` that have no static target.
    pub fn unresolved_members_named(&self, name: &str) -> impl Iterator<Item = &Occurrence> {
        self.occurrences_at(self.unresolved_members.get(name))
    }

    fn occurrences_at<'a>(
        &'a self,
        indices: Option<&'a Vec<usize>>,
    ) -> impl Iterator<Item = &'a Occurrence> {
        indices
            .into_iter()
            .flatten()
            .map(|&i| &self.unit.occurrences[i])
    }

    /// Fields, methods, getters and setters named `name` declared in a
    /// class, mixin, enum or extension type.
    pub fn class_members_named(&self, name: &str) -> impl Iterator<Item = &Arc<Element>> {
        self.class_members
            .get(name)
            .into_iter()
            .flatten()
            .map(|&i| &self.unit.library.elements()[i])
    }

    /// Types declared here that name `supertype` as a direct supertype.
    pub fn subtypes_of(&self, supertype: &ElementKey) -> impl Iterator<Item = &Arc<Element>> {
        self.subtype_edges
            .iter()
            .filter(move |(_, sup)| sup == supertype)
            .filter_map(|(sub, _)| self.unit.library.element(sub))
    }

    pub fn subtype_edges(&self) -> &[(ElementKey, ElementKey)] {
        &self.subtype_edges
    }
}

fn declared_in_type(library: &refscope_api::LibraryElements, element: &Element) -> bool {
    element
        .enclosing
        .as_ref()
        .and_then(|owner| library.element(owner))
        .is_some_and(|owner| owner.tag().can_have_subtypes())
}

/// Workspace-wide view: every committed file's index plus the direct
/// subtype lattice.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    files: HashMap<SourcePath, Arc<FileIndex>>,
    subtypes: HashMap<ElementKey, IndexSet<ElementKey>>,
}

impl SearchIndex {
    pub fn update(&mut self, unit: &Arc<ResolvedUnit>) {
        let path = unit.path().clone();
        self.remove(&path);
        let file = Arc::new(FileIndex::build(unit.clone()));
        for (sub, sup) in file.subtype_edges() {
            self.subtypes
                .entry(sup.clone())
                .or_default()
                .insert(sub.clone());
        }
        self.files.insert(path, file);
    }

    pub fn remove(&mut self, path: &SourcePath) {
        let Some(old) = self.files.remove(path) else {
            return;
        };
        for (sub, sup) in old.subtype_edges() {
            if let Some(subs) = self.subtypes.get_mut(sup) {
                subs.shift_remove(sub);
                if subs.is_empty() {
                    self.subtypes.remove(sup);
                }
            }
        }
    }

    pub fn file(&self, path: &SourcePath) -> Option<&Arc<FileIndex>> {
        self.files.get(path)
    }

    /// The index of `unit` if it is the committed one, else a fresh build.
    pub fn file_for(&self, unit: &Arc<ResolvedUnit>) -> Arc<FileIndex> {
        match self.files.get(unit.path()) {
            Some(file) if Arc::ptr_eq(file.unit(), unit) => file.clone(),
            _ => Arc::new(FileIndex::build(unit.clone())),
        }
    }

    pub fn direct_subtypes(&self, key: &ElementKey) -> impl Iterator<Item = &ElementKey> {
        self.subtypes.get(key).into_iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Kind of a resolved occurrence bound to an element tagged `target`.
pub fn classify(context: OccurrenceContext, target: ElementTag) -> SearchResultKind {
    match context {
        OccurrenceContext::Call => SearchResultKind::Invocation,
        OccurrenceContext::Assignment => SearchResultKind::Write,
        OccurrenceContext::CompoundAssignment => SearchResultKind::ReadWrite,
        OccurrenceContext::Read if target.is_variable_like() => SearchResultKind::Read,
        OccurrenceContext::Read | OccurrenceContext::TypeUsage => SearchResultKind::Reference,
        OccurrenceContext::ConstructorTearOff => SearchResultKind::ReferenceByConstructorTearOff,
        OccurrenceContext::EnumConstantWithoutArguments => {
            SearchResultKind::InvocationByEnumConstantWithoutArguments
        }
    }
}

/// Kind of a member selector whose target is unknown.
pub fn classify_unresolved(context: OccurrenceContext) -> SearchResultKind {
    // A selector is treated as naming a field-like member.
    classify(context, ElementTag::Field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        use OccurrenceContext::*;
        assert_eq!(classify(Call, ElementTag::Method), SearchResultKind::Invocation);
        assert_eq!(classify(Assignment, ElementTag::Field), SearchResultKind::Write);
        assert_eq!(
            classify(CompoundAssignment, ElementTag::LocalVariable),
            SearchResultKind::ReadWrite
        );
        assert_eq!(classify(Read, ElementTag::Field), SearchResultKind::Read);
        assert_eq!(classify(Read, ElementTag::Function), SearchResultKind::Reference);
        assert_eq!(classify(TypeUsage, ElementTag::Class), SearchResultKind::Reference);
        assert_eq!(
            classify(ConstructorTearOff, ElementTag::Constructor),
            SearchResultKind::ReferenceByConstructorTearOff
        );
        assert_eq!(
            classify(EnumConstantWithoutArguments, ElementTag::Constructor),
            SearchResultKind::InvocationByEnumConstantWithoutArguments
        );
    }

    #[test]
    fn test_unresolved_read_is_read() {
        assert_eq!(
            classify_unresolved(OccurrenceContext::Read),
            SearchResultKind::Read
        );
        assert_eq!(
            classify_unresolved(OccurrenceContext::Call),
            SearchResultKind::Invocation
        );
    }
}
