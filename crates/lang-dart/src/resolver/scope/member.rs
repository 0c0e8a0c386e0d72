use super::{Scope, candidates};
use crate::resolver::ElementSource;
use refscope_api::models::{ElementKey, ElementKind, ElementTag};
use std::collections::{HashSet, VecDeque};

/// An extension and the type it extends.
pub type VisibleExtension = (ElementKey, Option<ElementKey>);

/// Instance and static members visible by bare name inside a type body,
/// inherited ones and applicable extension members included.
pub struct MemberScope<'a, S: ElementSource + ?Sized> {
    pub owner: Option<&'a ElementKey>,
    pub source: &'a S,
    pub extensions: &'a [VisibleExtension],
}

impl<S: ElementSource + ?Sized> Scope for MemberScope<'_, S> {
    fn lookup(&self, name: &str, setter: bool) -> Option<ElementKey> {
        let owner = self.owner?;
        find_member(self.source, owner, name, setter, self.extensions)
    }

    fn name(&self) -> &'static str {
        "Member"
    }
}

/// The element a type name stands for once aliases are followed.
pub fn resolve_alias<S: ElementSource + ?Sized>(source: &S, key: &ElementKey) -> ElementKey {
    let mut current = key.clone();
    for _ in 0..8 {
        match source.element(&current).map(|e| &e.kind) {
            Some(ElementKind::TypeAlias {
                aliased: Some(next),
            }) => current = next.clone(),
            _ => break,
        }
    }
    current
}

fn declared_member<S: ElementSource + ?Sized>(
    source: &S,
    owner: &ElementKey,
    name: &str,
    setter: bool,
) -> Option<ElementKey> {
    for candidate in candidates(name, setter) {
        let key = owner.member(&candidate);
        let is_member = source.element(&key).is_some_and(|m| {
            m.tag() != ElementTag::Constructor && m.enclosing.as_ref() == Some(owner)
        });
        if is_member {
            return Some(key);
        }
    }
    None
}

/// Member `name` of `owner` or of any of its supertypes, then of the
/// extensions that apply to one of them.
pub fn find_member<S: ElementSource + ?Sized>(
    source: &S,
    owner: &ElementKey,
    name: &str,
    setter: bool,
    extensions: &[VisibleExtension],
) -> Option<ElementKey> {
    let mut queue = VecDeque::from([owner.clone()]);
    let mut seen: HashSet<ElementKey> = HashSet::new();
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.clone()) {
            continue;
        }
        let Some(element) = source.element(&current) else {
            continue;
        };
        match &element.kind {
            ElementKind::TypeAlias { aliased } => {
                queue.extend(aliased.iter().cloned());
                continue;
            }
            ElementKind::Extension { extended_type, .. } => {
                if let Some(found) = declared_member(source, &current, name, setter) {
                    return Some(found);
                }
                queue.extend(extended_type.iter().cloned());
            }
            kind => {
                if let Some(found) = declared_member(source, &current, name, setter) {
                    return Some(found);
                }
                if let Some(shape) = kind.type_shape() {
                    queue.extend(shape.direct_supertypes().into_iter().cloned());
                }
            }
        }
    }
    extensions
        .iter()
        .filter(|(_, on)| on.as_ref().is_some_and(|on| seen.contains(on)))
        .find_map(|(extension, _)| declared_member(source, extension, name, setter))
}

/// Member `name` declared directly in `owner`, constructors included, as
/// reached through `Owner.name`.
pub fn static_member<S: ElementSource + ?Sized>(
    source: &S,
    owner: &ElementKey,
    name: &str,
    setter: bool,
) -> Option<ElementKey> {
    candidates(name, setter).into_iter().find_map(|candidate| {
        let key = owner.member(&candidate);
        source
            .element(&key)
            .filter(|m| m.enclosing.as_ref() == Some(owner))
            .map(|_| key)
    })
}

/// The declared unnamed constructor of `class`, if any.
pub fn unnamed_constructor<S: ElementSource + ?Sized>(
    source: &S,
    class: &ElementKey,
) -> Option<ElementKey> {
    let key = class.member("");
    source
        .element(&key)
        .is_some_and(|e| e.tag() == ElementTag::Constructor)
        .then_some(key)
}
