use super::bind::{Binder, Syntax};
use super::{ElementSource, local_key};
use super::scope::Scope;
use super::scope::member::{
    MemberScope, find_member, resolve_alias, static_member, unnamed_constructor,
};
use crate::parser::ast::*;
use refscope_api::models::{ElementKey, ElementTag, OccurrenceContext, SupertypeClause};
use smol_str::SmolStr;

/// Types that never name a declaration.
const BUILTIN_TYPES: &[&str] = &["void", "dynamic", "Function"];

/// What a receiver expression denotes.
pub(super) enum Operand {
    /// A value of the given static type, when known.
    Value(Option<ElementKey>),
    /// A type name, as in `A.create()`.
    Type(ElementKey),
    /// An import prefix, as in `p.A`.
    Prefix(SmolStr),
}

impl Operand {
    fn value_type(self) -> Option<ElementKey> {
        match self {
            Operand::Value(ty) => ty,
            Operand::Type(_) | Operand::Prefix(_) => None,
        }
    }
}

fn is_write(context: OccurrenceContext) -> bool {
    matches!(
        context,
        OccurrenceContext::Assignment | OccurrenceContext::CompoundAssignment
    )
}

impl Binder<'_, '_> {
    /// Bind the names in a type annotation and return the declaration the
    /// outer type names.
    pub(super) fn type_ref(
        &mut self,
        ty: &TypeRef,
        clause: Option<SupertypeClause>,
    ) -> Option<ElementKey> {
        for arg in &ty.args {
            self.type_ref(arg, None);
        }
        for param in &ty.function_params {
            self.type_ref(param, None);
        }
        if ty.prefix.is_none() && BUILTIN_TYPES.contains(&ty.name.name.as_str()) {
            return None;
        }
        let (target, syntax) = match &ty.prefix {
            Some(prefix) => {
                let is_prefix = self.namespaces.imports.is_prefix(&prefix.name);
                let prefix_key = is_prefix.then(|| self.table.key(prefix.name.clone()));
                self.record(prefix, prefix_key, OccurrenceContext::Read, Syntax::BARE);
                let target = is_prefix
                    .then(|| {
                        self.namespaces
                            .imports
                            .lookup_prefixed(&prefix.name, &ty.name.name, false)
                    })
                    .flatten();
                (target, Syntax::PREFIXED)
            }
            None => (self.lookup_type(ty), Syntax::BARE),
        };
        self.record(&ty.name, target.clone(), OccurrenceContext::TypeUsage, syntax);
        if let Some(occurrence) = self.occurrences.last_mut() {
            occurrence.clause = clause;
        }
        target
    }

    /// Resolve a type annotation without recording anything.
    pub(super) fn lookup_type(&self, ty: &TypeRef) -> Option<ElementKey> {
        if let Some(prefix) = &ty.prefix {
            return self
                .namespaces
                .imports
                .lookup_prefixed(&prefix.name, &ty.name.name, false);
        }
        let local = self
            .locals
            .lookup(&ty.name.name, false)
            .filter(|k| self.tag_of(k) == Some(ElementTag::TypeParameter));
        local.or_else(|| self.namespaces.lookup(&ty.name.name, false))
    }

    /// Static type of the value `key` denotes when read.
    fn value_type(&self, key: &ElementKey) -> Option<ElementKey> {
        let element = self.element(key)?;
        if element.tag().is_variable_like() {
            element.declared_type.clone()
        } else {
            None
        }
    }

    /// Static type of a call of `key`.
    fn return_type(&self, key: &ElementKey) -> Option<ElementKey> {
        let element = self.element(key)?;
        match element.tag() {
            ElementTag::Function | ElementTag::Method | ElementTag::Constructor => {
                element.declared_type.clone()
            }
            _ => None,
        }
    }

    fn member_scope_lookup(&self, name: &str, setter: bool) -> Option<ElementKey> {
        MemberScope {
            owner: self.owner.as_ref(),
            source: self,
            extensions: &self.extensions,
        }
        .lookup(name, setter)
    }

    /// Bind a bare identifier through the scope chain.
    fn name_operand(&mut self, name: &Name, context: OccurrenceContext) -> Operand {
        let setter = is_write(context);
        if let Some(key) = self.locals.lookup(&name.name, setter) {
            let ty = self.value_type(&key);
            self.record(name, Some(key), context, Syntax::BARE);
            return Operand::Value(ty);
        }
        if let Some(key) = self.member_scope_lookup(&name.name, setter) {
            let ty = self.value_type(&key);
            self.record(name, Some(key), context, Syntax::IMPLICIT_MEMBER);
            return Operand::Value(ty);
        }
        if self.namespaces.imports.is_prefix(&name.name)
            && self.namespaces.library.lookup(&name.name, false).is_none()
        {
            let prefix = self.table.key(name.name.clone());
            self.record(name, Some(prefix), OccurrenceContext::Read, Syntax::BARE);
            return Operand::Prefix(name.name.clone());
        }
        match self.namespaces.lookup(&name.name, setter) {
            Some(key) if self.is_class_like(&key) => {
                self.record(name, Some(key.clone()), context, Syntax::BARE);
                Operand::Type(resolve_alias(&*self, &key))
            }
            Some(key) => {
                let ty = self.value_type(&key);
                self.record(name, Some(key), context, Syntax::BARE);
                Operand::Value(ty)
            }
            None => {
                let syntax = match self.owner {
                    Some(_) => Syntax::IMPLICIT_MEMBER,
                    None => Syntax::BARE,
                };
                self.record(name, None, context, syntax);
                Operand::Value(None)
            }
        }
    }

    fn operand(&mut self, expr: &Expr) -> Operand {
        match expr {
            Expr::Ident(name) => self.name_operand(name, OccurrenceContext::Read),
            Expr::Member { target, name } => {
                self.member_access(target, name, OccurrenceContext::Read)
            }
            Expr::Wrapped(inner) => Operand::Value(self.expr(inner)),
            other => Operand::Value(self.expr(other)),
        }
    }

    /// Bind `target.name` used in `context`.
    fn member_access(&mut self, target: &Expr, name: &Name, context: OccurrenceContext) -> Operand {
        let setter = is_write(context);
        match self.operand(target) {
            Operand::Prefix(prefix) => {
                let key = self
                    .namespaces
                    .imports
                    .lookup_prefixed(&prefix, &name.name, setter);
                self.record(name, key.clone(), context, Syntax::PREFIXED);
                match key {
                    Some(key) if self.is_class_like(&key) => {
                        Operand::Type(resolve_alias(&*self, &key))
                    }
                    Some(key) => Operand::Value(self.value_type(&key)),
                    None => Operand::Value(None),
                }
            }
            Operand::Type(class) => {
                let key = self.static_or_constructor(&class, &name.name, setter);
                let is_constructor = key
                    .as_ref()
                    .is_some_and(|k| self.tag_of(k) == Some(ElementTag::Constructor));
                let context = match context {
                    OccurrenceContext::Read if is_constructor => {
                        OccurrenceContext::ConstructorTearOff
                    }
                    other => other,
                };
                let ty = key.as_ref().and_then(|k| self.value_type(k));
                self.record(name, key, context, Syntax::SELECTOR);
                Operand::Value(ty)
            }
            Operand::Value(ty) => {
                let key = ty.and_then(|ty| {
                    let ty = resolve_alias(&*self, &ty);
                    find_member(&*self, &ty, &name.name, setter, &self.extensions)
                });
                let ty = key.as_ref().and_then(|k| self.value_type(k));
                self.record(name, key, context, Syntax::SELECTOR);
                Operand::Value(ty)
            }
        }
    }

    /// `A.name` on a type: a static member or a constructor. `new` names
    /// the unnamed constructor.
    fn static_or_constructor(
        &self,
        class: &ElementKey,
        name: &str,
        setter: bool,
    ) -> Option<ElementKey> {
        if name == "new" {
            return unnamed_constructor(self, class);
        }
        static_member(self, class, name, setter)
    }

    /// Bind an expression and return its static type when it is known.
    pub(super) fn expr(&mut self, expr: &Expr) -> Option<ElementKey> {
        match expr {
            Expr::Ident(name) => self.name_operand(name, OccurrenceContext::Read).value_type(),
            Expr::Literal => None,
            Expr::This(_) => self.this_type(),
            Expr::Super(_) => self.super_type(),
            Expr::CascadeReceiver => self.cascades.last().cloned().flatten(),
            Expr::Member { target, name } => self
                .member_access(target, name, OccurrenceContext::Read)
                .value_type(),
            Expr::Call {
                callee,
                type_args,
                args,
            } => {
                for ty in type_args {
                    self.type_ref(ty, None);
                }
                self.call(callee, args)
            }
            Expr::New {
                ty,
                constructor,
                args,
            } => self.instance_creation(ty, constructor.as_ref(), args),
            Expr::Index { target, index } => {
                self.expr(target);
                self.expr(index);
                None
            }
            Expr::Assign {
                target,
                kind,
                value,
            } => {
                self.assign_target(target, *kind);
                value.as_ref().and_then(|value| self.expr(value))
            }
            Expr::Binary { left, right } => {
                self.expr(left);
                self.expr(right);
                None
            }
            Expr::Unary(inner) => {
                self.expr(inner);
                None
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                let then = self.expr(then);
                let otherwise = self.expr(otherwise);
                then.filter(|t| Some(t) == otherwise.as_ref())
            }
            Expr::Is { expr, ty } => {
                self.expr(expr);
                self.type_ref(ty, None);
                None
            }
            Expr::As { expr, ty } => {
                self.expr(expr);
                self.type_ref(ty, None).filter(|k| self.is_class_like(k))
            }
            Expr::Collection { type_args, elements } => {
                for ty in type_args {
                    self.type_ref(ty, None);
                }
                for element in elements {
                    self.expr(element);
                }
                None
            }
            Expr::Function { params, body, span } => {
                let closure = local_key(
                    &self.enclosing.clone().unwrap_or_else(|| self.library_key()),
                    "<closure>",
                    span.start,
                );
                self.locals.push();
                self.params(&closure, params, None);
                self.body(body);
                self.locals.pop();
                None
            }
            Expr::Cascade { target, sections } => {
                let ty = self.expr(target);
                self.cascades.push(ty.clone());
                for section in sections {
                    self.expr(section);
                }
                self.cascades.pop();
                ty
            }
            Expr::Wrapped(inner) => self.expr(inner),
            Expr::TypeLiteral(ty) => {
                self.type_ref(ty, None);
                None
            }
        }
    }

    /// Bind the left side of an assignment.
    pub(super) fn assign_target(&mut self, target: &Expr, kind: AssignKind) {
        let context = match kind {
            AssignKind::Plain => OccurrenceContext::Assignment,
            AssignKind::Compound => OccurrenceContext::CompoundAssignment,
        };
        match target {
            Expr::Ident(name) => {
                self.name_operand(name, context);
            }
            Expr::Member { target, name } => {
                self.member_access(target, name, context);
            }
            Expr::Wrapped(inner) => self.assign_target(inner, kind),
            other => {
                self.expr(other);
            }
        }
    }

    fn call(&mut self, callee: &Expr, args: &[Argument]) -> Option<ElementKey> {
        let (target, ty) = match callee {
            Expr::Ident(name) => match self.name_operand(name, OccurrenceContext::Call) {
                Operand::Type(class) => self.construct(name, class),
                _ => self.called(),
            },
            Expr::Member { target, name } => {
                match self.member_access(target, name, OccurrenceContext::Call) {
                    Operand::Type(class) => self.construct(name, class),
                    _ => self.called(),
                }
            }
            other => {
                self.expr(other);
                (None, None)
            }
        };
        self.arguments(target.as_ref(), args);
        ty
    }

    /// Target and result type of the call just recorded.
    fn called(&self) -> (Option<ElementKey>, Option<ElementKey>) {
        let target = self.occurrences.last().and_then(|o| o.target.clone());
        let ty = target.as_ref().and_then(|k| self.return_type(k));
        (target, ty)
    }

    /// `A(...)`: the type name becomes a type usage and the call binds to
    /// the unnamed constructor when it is declared.
    fn construct(
        &mut self,
        name: &Name,
        class: ElementKey,
    ) -> (Option<ElementKey>, Option<ElementKey>) {
        if let Some(occurrence) = self.occurrences.last_mut() {
            occurrence.context = OccurrenceContext::TypeUsage;
        }
        let constructor = unnamed_constructor(&*self, &class);
        if let Some(ctor) = &constructor {
            self.record_at(
                name.end(),
                0,
                SmolStr::default(),
                Some(ctor.clone()),
                OccurrenceContext::Call,
                Syntax::BARE,
            );
        }
        (constructor, Some(class))
    }

    /// `new A()`, `const A.named()`, `new p.A.named()`.
    fn instance_creation(
        &mut self,
        ty: &TypeRef,
        constructor: Option<&Name>,
        args: &[Argument],
    ) -> Option<ElementKey> {
        let named_on_class = match &ty.prefix {
            Some(prefix)
                if constructor.is_none() && !self.namespaces.imports.is_prefix(&prefix.name) =>
            {
                Some((prefix, &ty.name))
            }
            _ => None,
        };
        let (class, constructor) = match named_on_class {
            Some((class_name, ctor_name)) => {
                for arg in &ty.args {
                    self.type_ref(arg, None);
                }
                let class = self
                    .namespaces
                    .lookup(&class_name.name, false)
                    .filter(|k| self.is_class_like(k));
                self.record(class_name, class.clone(), OccurrenceContext::TypeUsage, Syntax::BARE);
                (class, Some(ctor_name))
            }
            None => (self.type_ref(ty, None), constructor),
        };
        let class = class.map(|k| resolve_alias(&*self, &k));
        let target = match constructor {
            Some(name) => {
                let target = class
                    .as_ref()
                    .and_then(|c| self.static_or_constructor(c, &name.name, false))
                    .filter(|k| self.tag_of(k) == Some(ElementTag::Constructor));
                self.record(name, target.clone(), OccurrenceContext::Call, Syntax::SELECTOR);
                target
            }
            None => {
                let target = class.as_ref().and_then(|c| unnamed_constructor(&*self, c));
                if let Some(ctor) = &target {
                    self.record_at(
                        ty.name.end(),
                        0,
                        SmolStr::default(),
                        Some(ctor.clone()),
                        OccurrenceContext::Call,
                        Syntax::BARE,
                    );
                }
                target
            }
        };
        self.arguments(target.as_ref(), args);
        class
    }

    /// Bind call arguments. Named arguments bind to the parameter of the
    /// callee they name.
    pub(super) fn arguments(&mut self, callee: Option<&ElementKey>, args: &[Argument]) {
        for arg in args {
            if let Some(label) = &arg.label {
                let target = callee
                    .map(|c| c.member(&label.name))
                    .filter(|k| self.tag_of(k) == Some(ElementTag::Parameter));
                self.record(label, target, OccurrenceContext::Read, Syntax::BARE);
            }
            self.expr(&arg.value);
        }
    }
}
