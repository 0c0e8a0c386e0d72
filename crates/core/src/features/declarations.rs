use crate::cancel::CancelToken;
use crate::runtime::{AnalysisDriver, ResolvedUnit};
use refscope_api::models::{
    Declaration, DeclarationKind, Element, ElementTag, WorkspaceSymbols,
};
use refscope_api::{AnalysisError, AnalysisResult};
use regex::Regex;
use smol_str::SmolStr;
use tracing::debug;

impl AnalysisDriver {
    /// Workspace symbols whose name matches `pattern` (all when `None`), in
    /// discovery order then declaration order, truncated at `max_results`.
    ///
    /// Cancellation is not an error here: the result is marked `cancelled`
    /// and holds what was collected so far.
    pub async fn declarations(
        &self,
        pattern: Option<&Regex>,
        max_results: Option<usize>,
        token: &CancelToken,
    ) -> AnalysisResult<WorkspaceSymbols> {
        let mut symbols = WorkspaceSymbols::default();
        if let Err(err) = self.ensure_discovered(token) {
            return cancelled_or(err, symbols);
        }
        let batch = self.config().cancel_check_batch.max(1);
        let limit = max_results.unwrap_or(usize::MAX);
        let mut since_check = 0;

        for path in self.known_files() {
            if token.is_cancelled() {
                symbols.cancelled = true;
                return Ok(symbols);
            }
            let unit = match self.get_resolved_unit(&path, token).await {
                Ok(unit) => unit,
                Err(err) if err.is_cancelled() => return cancelled_or(err, symbols),
                Err(err) => {
                    debug!(path = %path, error = %err, "file skipped");
                    continue;
                }
            };
            if unit.partial {
                continue;
            }

            for element in unit.elements() {
                let Some(declaration) = to_declaration(element, &unit) else {
                    continue;
                };
                if pattern.is_some_and(|p| !p.is_match(&declaration.name)) {
                    continue;
                }
                if symbols.declarations.len() >= limit {
                    return Ok(symbols);
                }
                let file_index = symbols.file_index(&path);
                symbols.declarations.push(Declaration {
                    file_index,
                    ..declaration
                });

                since_check += 1;
                if since_check >= batch {
                    since_check = 0;
                    if token.is_cancelled() {
                        symbols.cancelled = true;
                        return Ok(symbols);
                    }
                }
            }
        }
        Ok(symbols)
    }
}

fn cancelled_or(
    err: AnalysisError,
    mut symbols: WorkspaceSymbols,
) -> AnalysisResult<WorkspaceSymbols> {
    if err.is_cancelled() {
        symbols.cancelled = true;
        Ok(symbols)
    } else {
        Err(err)
    }
}

fn declaration_kind(tag: ElementTag) -> Option<DeclarationKind> {
    Some(match tag {
        ElementTag::Class => DeclarationKind::Class,
        ElementTag::Mixin => DeclarationKind::Mixin,
        ElementTag::Enum => DeclarationKind::Enum,
        ElementTag::EnumConstant => DeclarationKind::EnumConstant,
        ElementTag::Extension => DeclarationKind::Extension,
        ElementTag::ExtensionType => DeclarationKind::ExtensionType,
        ElementTag::TypeAlias => DeclarationKind::TypeAlias,
        ElementTag::Function => DeclarationKind::Function,
        ElementTag::TopLevelVariable => DeclarationKind::Variable,
        ElementTag::Field => DeclarationKind::Field,
        ElementTag::Method => DeclarationKind::Method,
        ElementTag::Getter => DeclarationKind::Getter,
        ElementTag::Setter => DeclarationKind::Setter,
        ElementTag::Constructor => DeclarationKind::Constructor,
        _ => return None,
    })
}

/// Project a named, non-local element. `file_index` is filled by the caller.
fn to_declaration(element: &Element, unit: &ResolvedUnit) -> Option<Declaration> {
    let kind = declaration_kind(element.tag())?;
    let location = element.location.as_ref()?;
    let owner = element
        .enclosing
        .as_ref()
        .and_then(|key| unit.element(key))
        .filter(|owner| owner.tag() != ElementTag::Library);

    let name: SmolStr = match (&element.name, kind) {
        (Some(name), _) if !name.is_empty() => name.clone(),
        // The unnamed constructor is listed under its class name.
        (_, DeclarationKind::Constructor) => owner?.name.clone()?,
        _ => return None,
    };

    let (containing_class_name, containing_mixin_name) = match owner {
        Some(owner) if owner.tag() == ElementTag::Mixin => (None, owner.name.clone()),
        Some(owner) => (owner.name.clone(), None),
        None => (None, None),
    };
    let (line, column) = unit.snapshot.line_col(location.offset);

    Some(Declaration {
        name,
        kind,
        path: location.path.clone(),
        file_index: 0,
        offset: location.offset,
        line: line + 1,
        column: column + 1,
        code_offset: location.code_offset,
        code_length: location.code_length,
        containing_class_name,
        containing_mixin_name,
        parameters: element.signature.clone(),
    })
}
