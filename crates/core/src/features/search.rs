use crate::cancel::CancelToken;
use crate::index::{classify, classify_unresolved};
use crate::runtime::AnalysisDriver;
use refscope_api::models::{
    Element, ElementTag, Search, SearchResult, SearchedFiles, SourcePath,
};
use refscope_api::AnalysisResult;
use regex::Regex;
use smol_str::SmolStr;
use std::sync::Arc;

/// Elements only visible inside the file that declares them.
fn is_file_local(tag: ElementTag) -> bool {
    matches!(
        tag,
        ElementTag::Parameter
            | ElementTag::LocalVariable
            | ElementTag::TypeParameter
            | ElementTag::Label
            | ElementTag::Prefix
    )
}

/// The identifier a reference to `element` spells in source.
fn scout_name(element: &Element) -> &str {
    match element.name.as_deref() {
        Some(name) if !name.is_empty() => name,
        // Unnamed constructors are referenced through their class name.
        _ => element
            .enclosing
            .as_ref()
            .map(|owner| owner.simple_name())
            .unwrap_or_default(),
    }
}

impl AnalysisDriver {
    /// Every resolved occurrence bound to `element`.
    ///
    /// Candidates are the declaring file plus every file depending on it
    /// through imports, exports or parts, minus files in `searched`.
    pub async fn references(
        &self,
        element: &Element,
        searched: &mut SearchedFiles,
        token: &CancelToken,
    ) -> AnalysisResult<Vec<SearchResult>> {
        self.ensure_parsed(token)?;
        let state = self.snapshot();
        let key = &element.key;
        let candidates: Vec<SourcePath> = if is_file_local(element.tag()) {
            vec![key.path.clone()]
        } else {
            state.dependents_closure(&key.path).into_iter().collect()
        };

        let tag = element.tag();
        let search = Search::References(key.clone());
        let scout = Some(scout_name(element));
        let mut results = Vec::new();
        self.scan_files(candidates, scout, &search, searched, token, |index| {
            for occurrence in index.references_to(key) {
                results.push(SearchResult {
                    path: index.path().clone(),
                    enclosing_element: occurrence.enclosing.clone(),
                    kind: classify(occurrence.context, tag),
                    offset: occurrence.offset,
                    length: occurrence.length,
                    is_resolved: true,
                    is_qualified: occurrence.is_qualified,
                });
            }
        })
        .await?;
        Ok(self.finish_results(results))
    }

    /// Member selectors named `name` whose receiver could not be typed.
    ///
    /// Advisory matches: every result has `is_resolved == false`.
    pub async fn unresolved_member_references(
        &self,
        name: &str,
        searched: &mut SearchedFiles,
        token: &CancelToken,
    ) -> AnalysisResult<Vec<SearchResult>> {
        self.ensure_parsed(token)?;
        let candidates = self.known_files();
        let search = Search::UnresolvedMembers(SmolStr::new(name));
        let mut results = Vec::new();
        self.scan_files(candidates, Some(name), &search, searched, token, |index| {
            for occurrence in index.unresolved_members_named(name) {
                results.push(SearchResult {
                    path: index.path().clone(),
                    enclosing_element: occurrence.enclosing.clone(),
                    kind: classify_unresolved(occurrence.context),
                    offset: occurrence.offset,
                    length: occurrence.length,
                    is_resolved: false,
                    is_qualified: occurrence.is_qualified,
                });
            }
        })
        .await?;
        Ok(self.finish_results(results))
    }

    /// Fields, methods, getters and setters named `name` declared directly
    /// in a class, mixin, enum or extension type.
    pub async fn class_members(
        &self,
        name: &str,
        searched: &mut SearchedFiles,
        token: &CancelToken,
    ) -> AnalysisResult<Vec<Arc<Element>>> {
        self.ensure_parsed(token)?;
        let candidates = self.known_files();
        let search = Search::ClassMembers(SmolStr::new(name));
        let mut members = Vec::new();
        self.scan_files(candidates, Some(name), &search, searched, token, |index| {
            members.extend(index.class_members_named(name).cloned());
        })
        .await?;
        Ok(members)
    }

    /// Top-level classes, mixins, type aliases, functions and variables whose
    /// name matches `pattern`.
    ///
    /// Private names are returned only when `visible_from` belongs to the
    /// declaring library.
    pub async fn top_level_elements(
        &self,
        pattern: &Regex,
        visible_from: Option<&SourcePath>,
        token: &CancelToken,
    ) -> AnalysisResult<Vec<Arc<Element>>> {
        self.ensure_parsed(token)?;
        let viewer_library = visible_from.map(|path| self.snapshot().library_of(path));
        let search = Search::TopLevelElements(SmolStr::new(pattern.as_str()));
        let mut searched = SearchedFiles::new();
        let mut found = Vec::new();
        self.scan_files(self.known_files(), None, &search, &mut searched, token, |index| {
            let unit = index.unit();
            for element in unit.library.top_level_elements() {
                let listed = matches!(
                    element.tag(),
                    ElementTag::Class
                        | ElementTag::Mixin
                        | ElementTag::TypeAlias
                        | ElementTag::Function
                        | ElementTag::TopLevelVariable
                );
                if !listed || !pattern.is_match(element.display_name()) {
                    continue;
                }
                if element.is_private() && viewer_library.as_ref() != Some(&unit.library_path) {
                    continue;
                }
                found.push(element.clone());
            }
        })
        .await?;
        Ok(found)
    }

    /// The element declared or referenced at `offset` in `path`.
    pub async fn element_at(
        &self,
        path: &SourcePath,
        offset: usize,
        token: &CancelToken,
    ) -> AnalysisResult<Option<Arc<Element>>> {
        let unit = self.get_resolved_unit(path, token).await?;
        if let Some(element) = unit.declaration_at(offset) {
            return Ok(Some(element.clone()));
        }
        let Some(target) = unit.occurrence_at(offset).and_then(|o| o.target.clone()) else {
            return Ok(None);
        };
        self.element(&target, token).await
    }
}
