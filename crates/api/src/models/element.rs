use super::source::SourcePath;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// Stable logical identity of a declaration: declaring file plus the
/// qualified name inside that file (`A`, `A.foo`, `A.` for the unnamed
/// constructor, `A.x=` for a setter, `f.p` for a parameter).
///
/// Survives re-resolution of an unchanged declaration, so it is used for
/// every back-reference between elements and for cross-file binding.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey {
    pub path: SourcePath,
    pub name: SmolStr,
}

impl ElementKey {
    pub fn new(path: SourcePath, name: impl Into<SmolStr>) -> Self {
        Self {
            path,
            name: name.into(),
        }
    }

    /// Key of a member declared inside the element identified by `self`.
    pub fn member(&self, member: &str) -> Self {
        Self::new(self.path.clone(), format!("{}.{}", self.name, member))
    }

    /// The last dotted segment (the simple name).
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.path, self.name)
    }
}

/// Location of a declaration inside the snapshot that produced it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub path: SourcePath,
    /// Offset of the name (or of the keyword for unnamed declarations).
    pub offset: usize,
    pub length: usize,
    /// Full declaration range.
    pub code_offset: usize,
    pub code_length: usize,
}

impl SourceLocation {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn covers(&self, offset: usize) -> bool {
        offset >= self.offset && offset <= self.end()
    }
}

/// Supertype edges and members shared by every type-declaring kind.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeShape {
    pub supertype: Option<ElementKey>,
    /// Mixins in application order.
    pub mixins: Vec<ElementKey>,
    pub interfaces: Vec<ElementKey>,
    /// `on` clause of a mixin.
    pub superclass_constraints: Vec<ElementKey>,
    /// Directly declared members in declaration order.
    pub members: Vec<ElementKey>,
}

impl TypeShape {
    /// Every direct supertype, in clause order, deduplicated.
    pub fn direct_supertypes(&self) -> Vec<&ElementKey> {
        let mut out: Vec<&ElementKey> = Vec::new();
        let all = self
            .supertype
            .iter()
            .chain(self.mixins.iter())
            .chain(self.interfaces.iter())
            .chain(self.superclass_constraints.iter());
        for key in all {
            if !out.contains(&key) {
                out.push(key);
            }
        }
        out
    }

    pub fn has_direct_supertype(&self, key: &ElementKey) -> bool {
        self.supertype.as_ref() == Some(key)
            || self.mixins.contains(key)
            || self.interfaces.contains(key)
            || self.superclass_constraints.contains(key)
    }
}

/// Kind-specific payload of an element.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ElementKind {
    Library {
        uri: SmolStr,
    },
    Class(TypeShape),
    Mixin(TypeShape),
    Enum(TypeShape),
    Extension {
        extended_type: Option<ElementKey>,
        members: Vec<ElementKey>,
    },
    ExtensionType(TypeShape),
    TypeAlias {
        aliased: Option<ElementKey>,
    },
    Function {
        parameters: Vec<ElementKey>,
    },
    TopLevelVariable,
    Field,
    EnumConstant,
    Method {
        parameters: Vec<ElementKey>,
    },
    Getter,
    Setter,
    Constructor {
        parameters: Vec<ElementKey>,
    },
    Parameter,
    LocalVariable,
    TypeParameter,
    Import {
        uri: SmolStr,
    },
    Export {
        uri: SmolStr,
    },
    Prefix,
    Label,
}

/// Discriminant-only view of [`ElementKind`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ElementTag {
    Library,
    Class,
    Mixin,
    Enum,
    Extension,
    ExtensionType,
    TypeAlias,
    Function,
    TopLevelVariable,
    Field,
    EnumConstant,
    Method,
    Getter,
    Setter,
    Constructor,
    Parameter,
    LocalVariable,
    TypeParameter,
    Import,
    Export,
    Prefix,
    Label,
}

impl ElementKind {
    pub fn tag(&self) -> ElementTag {
        match self {
            ElementKind::Library { .. } => ElementTag::Library,
            ElementKind::Class(_) => ElementTag::Class,
            ElementKind::Mixin(_) => ElementTag::Mixin,
            ElementKind::Enum(_) => ElementTag::Enum,
            ElementKind::Extension { .. } => ElementTag::Extension,
            ElementKind::ExtensionType(_) => ElementTag::ExtensionType,
            ElementKind::TypeAlias { .. } => ElementTag::TypeAlias,
            ElementKind::Function { .. } => ElementTag::Function,
            ElementKind::TopLevelVariable => ElementTag::TopLevelVariable,
            ElementKind::Field => ElementTag::Field,
            ElementKind::EnumConstant => ElementTag::EnumConstant,
            ElementKind::Method { .. } => ElementTag::Method,
            ElementKind::Getter => ElementTag::Getter,
            ElementKind::Setter => ElementTag::Setter,
            ElementKind::Constructor { .. } => ElementTag::Constructor,
            ElementKind::Parameter => ElementTag::Parameter,
            ElementKind::LocalVariable => ElementTag::LocalVariable,
            ElementKind::TypeParameter => ElementTag::TypeParameter,
            ElementKind::Import { .. } => ElementTag::Import,
            ElementKind::Export { .. } => ElementTag::Export,
            ElementKind::Prefix => ElementTag::Prefix,
            ElementKind::Label => ElementTag::Label,
        }
    }

    /// Shape of classes, mixins, enums and extension types.
    pub fn type_shape(&self) -> Option<&TypeShape> {
        match self {
            ElementKind::Class(shape)
            | ElementKind::Mixin(shape)
            | ElementKind::Enum(shape)
            | ElementKind::ExtensionType(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn members(&self) -> &[ElementKey] {
        match self {
            ElementKind::Extension { members, .. } => members,
            other => other.type_shape().map(|s| s.members.as_slice()).unwrap_or(&[]),
        }
    }

    pub fn parameters(&self) -> &[ElementKey] {
        match self {
            ElementKind::Function { parameters }
            | ElementKind::Method { parameters }
            | ElementKind::Constructor { parameters } => parameters,
            _ => &[],
        }
    }
}

impl ElementTag {
    pub fn is_type_declaration(self) -> bool {
        matches!(
            self,
            ElementTag::Class
                | ElementTag::Mixin
                | ElementTag::Enum
                | ElementTag::Extension
                | ElementTag::ExtensionType
                | ElementTag::TypeAlias
                | ElementTag::TypeParameter
        )
    }

    /// Elements that hold a value and are therefore read or written.
    pub fn is_variable_like(self) -> bool {
        matches!(
            self,
            ElementTag::TopLevelVariable
                | ElementTag::Field
                | ElementTag::EnumConstant
                | ElementTag::Getter
                | ElementTag::Setter
                | ElementTag::Parameter
                | ElementTag::LocalVariable
        )
    }

    /// Members that can be found by `class_members`.
    pub fn is_class_member(self) -> bool {
        matches!(
            self,
            ElementTag::Field | ElementTag::Method | ElementTag::Getter | ElementTag::Setter
        )
    }

    pub fn can_have_subtypes(self) -> bool {
        matches!(
            self,
            ElementTag::Class | ElementTag::Mixin | ElementTag::Enum | ElementTag::ExtensionType
        )
    }
}

/// A resolved declaration.
///
/// Immutable: re-resolution produces new instances.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub key: ElementKey,
    /// `None` for unnamed constructors and the library element of an unnamed library.
    pub name: Option<SmolStr>,
    pub kind: ElementKind,
    pub enclosing: Option<ElementKey>,
    /// `None` for synthetic elements.
    pub location: Option<SourceLocation>,
    pub is_static: bool,
    /// Rendered parameter list, e.g. `(int a, {String? b})`.
    pub signature: Option<SmolStr>,
    /// Declared type of a variable, or return type of a function, when it
    /// names a type declaration.
    pub declared_type: Option<ElementKey>,
}

impl Element {
    pub fn tag(&self) -> ElementTag {
        self.kind.tag()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn is_private(&self) -> bool {
        self.name.as_deref().is_some_and(|n| n.starts_with('_'))
    }

    pub fn is_synthetic(&self) -> bool {
        self.location.is_none()
    }

    pub fn is_top_level(&self) -> bool {
        // The library element is keyed by the empty name.
        self.enclosing
            .as_ref()
            .is_none_or(|parent| parent.name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ElementKey {
        ElementKey::new(SourcePath::new("/p/lib/a.dart"), name)
    }

    #[test]
    fn test_member_key_and_simple_name() {
        let a = key("A");
        let foo = a.member("foo");
        assert_eq!(foo.name, "A.foo");
        assert_eq!(foo.simple_name(), "foo");
        assert_eq!(a.simple_name(), "A");
    }

    #[test]
    fn test_direct_supertypes_are_deduplicated() {
        let shape = TypeShape {
            supertype: Some(key("A")),
            mixins: vec![key("M")],
            interfaces: vec![key("A"), key("I")],
            superclass_constraints: vec![],
            members: vec![],
        };
        let names: Vec<_> = shape
            .direct_supertypes()
            .into_iter()
            .map(|k| k.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "M", "I"]);
        assert!(shape.has_direct_supertype(&key("I")));
        assert!(!shape.has_direct_supertype(&key("B")));
    }

    #[test]
    fn test_kind_serializes_with_tag() {
        let kind = ElementKind::Import {
            uri: SmolStr::new("b.dart"),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["kind"], "import");
        assert_eq!(json["uri"], "b.dart");
    }
}
