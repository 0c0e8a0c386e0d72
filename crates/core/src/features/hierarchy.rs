use crate::cancel::CancelToken;
use crate::runtime::{AnalysisDriver, DriverState};
use indexmap::IndexSet;
use refscope_api::models::{
    ElementKey, Search, SearchResult, SearchResultKind, SearchedFiles, SourcePath, SubtypeResult,
};
use refscope_api::{AnalysisError, AnalysisResult};
use smol_str::SmolStr;

/// Starting point of a `subtypes` query.
#[derive(Debug, Clone, Copy)]
pub enum SubtypeQuery<'a> {
    /// A type element.
    Type(&'a ElementKey),
    /// A previous result, to page one level deeper.
    Subtype(&'a SubtypeResult),
}

impl AnalysisDriver {
    /// Direct subtypes through `extends`, `with`, `implements` or a mixin's
    /// `on` clause.
    ///
    /// Scanned: the declaring package and every package whose dependency
    /// closure contains it, plus files outside any package.
    pub async fn subtypes(
        &self,
        searched: &mut SearchedFiles,
        query: SubtypeQuery<'_>,
        token: &CancelToken,
    ) -> AnalysisResult<Vec<SubtypeResult>> {
        self.ensure_parsed(token)?;
        let state = self.snapshot();
        let key = match query {
            SubtypeQuery::Type(key) => key.clone(),
            SubtypeQuery::Subtype(result) => key_from_subtype_id(&state, &result.id)?,
        };

        let candidates = subtype_candidates(&state, &key);
        let search = Search::Subtypes(key.clone());
        let scout = Some(key.simple_name());
        let mut results = Vec::new();
        self.scan_files(candidates, scout, &search, searched, token, |index| {
            let unit = index.unit();
            for subtype in index.subtypes_of(&key) {
                let name = subtype.display_name();
                let mut members: IndexSet<SmolStr> = IndexSet::new();
                for member in unit.library.members_of(&subtype.key) {
                    if member.tag().is_class_member() {
                        if let Some(member_name) = &member.name {
                            members.insert(member_name.clone());
                        }
                    }
                }
                results.push(SubtypeResult {
                    id: SubtypeResult::make_id(&unit.library_uri, &unit.uri, name),
                    name: SmolStr::new(name),
                    library_uri: unit.library_uri.to_string(),
                    members: members.into_iter().collect(),
                });
            }
        })
        .await?;
        Ok(results)
    }

    /// Supertype-clause occurrences naming `supertype`, as reference results.
    ///
    /// Scoped like [`subtypes`](Self::subtypes): packages that do not
    /// depend on the declaring package are not scanned.
    pub async fn sub_types(
        &self,
        supertype: &ElementKey,
        searched: &mut SearchedFiles,
        token: &CancelToken,
    ) -> AnalysisResult<Vec<SearchResult>> {
        self.ensure_parsed(token)?;
        let candidates = subtype_candidates(&self.snapshot(), supertype);
        let search = Search::SupertypeClauses(supertype.clone());
        let mut results = Vec::new();
        self.scan_files(
            candidates,
            Some(supertype.simple_name()),
            &search,
            searched,
            token,
            |index| {
                for occurrence in index.references_to(supertype) {
                    if occurrence.clause.is_none() {
                        continue;
                    }
                    results.push(SearchResult {
                        path: index.path().clone(),
                        enclosing_element: occurrence.enclosing.clone(),
                        kind: SearchResultKind::Reference,
                        offset: occurrence.offset,
                        length: occurrence.length,
                        is_resolved: true,
                        is_qualified: occurrence.is_qualified,
                    });
                }
            },
        )
        .await?;
        Ok(self.finish_results(results))
    }

    /// Every transitive subtype of `key` in the session, breadth first.
    pub async fn all_subtypes(
        &self,
        key: &ElementKey,
        token: &CancelToken,
    ) -> AnalysisResult<Vec<ElementKey>> {
        self.ensure_indexed(token).await?;
        let state = self.snapshot();
        let mut found: IndexSet<ElementKey> = IndexSet::new();
        let mut cursor = 0;
        found.extend(state.index().direct_subtypes(key).cloned());
        while cursor < found.len() {
            token.check()?;
            let current = found[cursor].clone();
            for subtype in state.index().direct_subtypes(&current) {
                if subtype != key {
                    found.insert(subtype.clone());
                }
            }
            cursor += 1;
        }
        Ok(found.into_iter().collect())
    }
}

/// Files that may declare a subtype of `key`: its own package, every
/// package whose dependency closure contains it, and files outside any
/// package.
fn subtype_candidates(state: &DriverState, key: &ElementKey) -> Vec<SourcePath> {
    let session = state.session();
    let allowed = session
        .package_of(key.path.as_path())
        .map(|node| session.dependents_of(&node.info.name));
    state
        .paths()
        .filter(|path| match (&allowed, session.package_of(path.as_path())) {
            (Some(allowed), Some(node)) => allowed.contains(&node.info.name),
            _ => true,
        })
        .cloned()
        .collect()
}

/// Inverse of [`SubtypeResult::make_id`]: the declaring URI and name locate
/// the element.
fn key_from_subtype_id(state: &DriverState, id: &str) -> AnalysisResult<ElementKey> {
    let unknown = || AnalysisError::UnknownSubtype(id.to_string());
    let mut parts = id.split(';');
    let (Some(_library_uri), Some(declaring_uri), Some(name), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(unknown());
    };
    if name.is_empty() || !declaring_uri.contains(':') {
        return Err(unknown());
    }
    let anchor = SourcePath::new("/");
    let path = state
        .session()
        .resolve_uri(&anchor, declaring_uri)
        .ok_or_else(unknown)?;
    Ok(ElementKey::new(path, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_subtype_ids_are_rejected() {
        let state = DriverState::default();
        for id in ["", "a;b", "a;b;c;d", "lib;relative.dart;B", "x;file:///a.dart;"] {
            assert!(matches!(
                key_from_subtype_id(&state, id),
                Err(AnalysisError::UnknownSubtype(_))
            ));
        }
        let key = key_from_subtype_id(&state, "file:///a.dart;file:///a.dart;B").unwrap();
        assert_eq!(key, ElementKey::new(SourcePath::new("/a.dart"), "B"));
    }
}
