use super::element::ElementKey;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Syntactic context of an identifier occurrence, as seen by the resolver.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum OccurrenceContext {
    /// Target of a call: `f(...)`, `x.m(...)`, `A(...)`.
    Call,
    /// Left side of a plain assignment.
    Assignment,
    /// Left side of a compound assignment (`x += v`), both read and written.
    CompoundAssignment,
    /// Any other value use.
    Read,
    /// Declared type, type argument, or an `extends`/`with`/`implements`/`on` clause.
    TypeUsage,
    /// `A.new` or `A.named` without an argument list.
    ConstructorTearOff,
    /// Enum constant declared without arguments, bound to the generative constructor.
    EnumConstantWithoutArguments,
}

/// Clause a type usage appears in, when it is a supertype clause.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SupertypeClause {
    Extends,
    With,
    Implements,
    On,
}

/// One identifier or selector occurrence in a resolved file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub offset: usize,
    pub length: usize,
    pub name: SmolStr,
    /// Statically resolved target; `None` when the name could not be bound.
    pub target: Option<ElementKey>,
    pub context: OccurrenceContext,
    /// Written with an explicit receiver.
    pub is_qualified: bool,
    /// Member-selector syntax (`x.name`, or a bare name inside a type body).
    pub is_member_selector: bool,
    /// Set when the occurrence names a supertype in a declaration header.
    pub clause: Option<SupertypeClause>,
    /// Innermost declaration containing the occurrence.
    pub enclosing: Option<ElementKey>,
}

impl Occurrence {
    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}
