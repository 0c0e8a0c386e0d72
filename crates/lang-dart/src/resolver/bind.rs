use super::scope::member::{
    VisibleExtension, resolve_alias, static_member, unnamed_constructor,
};
use super::scope::{LocalScope, Namespaces};
use super::{ElementSource, ElementTable, local_key, location};
use crate::parser::ast::*;
use refscope_api::models::{
    Element, ElementKey, ElementKind, ElementTag, LibraryElements, Occurrence, OccurrenceContext,
    SupertypeClause,
};
use refscope_plugin::{DirectiveKind, ResolutionScope};
use smol_str::SmolStr;
use std::sync::Arc;

/// How an occurrence is spelled.
#[derive(Debug, Clone, Copy)]
pub(super) struct Syntax {
    pub qualified: bool,
    pub member_selector: bool,
}

impl Syntax {
    pub const BARE: Syntax = Syntax {
        qualified: false,
        member_selector: false,
    };
    /// `x.name`
    pub const SELECTOR: Syntax = Syntax {
        qualified: true,
        member_selector: true,
    };
    /// `p.name` through an import prefix.
    pub const PREFIXED: Syntax = Syntax {
        qualified: true,
        member_selector: false,
    };
    /// A bare name bound to a member of the enclosing type.
    pub const IMPLICIT_MEMBER: Syntax = Syntax {
        qualified: false,
        member_selector: true,
    };
}

/// Walk every body of `tree` and record its occurrences. Locals are added
/// to `table` as they are declared.
pub(crate) fn bind(
    tree: &CompilationUnit,
    scope: &ResolutionScope<'_>,
    namespaces: &Namespaces<'_>,
    table: &mut ElementTable,
) -> (Vec<Occurrence>, Vec<String>) {
    let mut binder = Binder::new(scope, namespaces, table);
    binder.directives();
    for declaration in &tree.declarations {
        binder.declaration(declaration);
    }
    (binder.occurrences, binder.diagnostics)
}

pub(super) struct Binder<'a, 's> {
    pub(super) table: &'a mut ElementTable,
    pub(super) scope: &'a ResolutionScope<'s>,
    pub(super) namespaces: &'a Namespaces<'s>,
    pub(super) locals: LocalScope,
    /// Class, mixin, enum or extension whose body is being walked.
    pub(super) owner: Option<ElementKey>,
    pub(super) extensions: Vec<VisibleExtension>,
    pub(super) enclosing: Option<ElementKey>,
    /// Static types of the enclosing cascade receivers.
    pub(super) cascades: Vec<Option<ElementKey>>,
    pub(super) occurrences: Vec<Occurrence>,
    pub(super) diagnostics: Vec<String>,
}

impl ElementSource for Binder<'_, '_> {
    fn element(&self, key: &ElementKey) -> Option<&Element> {
        if key.path == *self.table.path() {
            return self.table.get(&key.name);
        }
        self.scope
            .library(&key.path)
            .and_then(|lib| lib.element(key))
            .map(|e| e.as_ref())
    }
}

impl<'a, 's> Binder<'a, 's> {
    fn new(
        scope: &'a ResolutionScope<'s>,
        namespaces: &'a Namespaces<'s>,
        table: &'a mut ElementTable,
    ) -> Self {
        let mut libraries: Vec<&Arc<LibraryElements>> = namespaces.library.shared().to_vec();
        libraries.extend(namespaces.imports.libraries());
        let visible = table
            .elements()
            .iter()
            .chain(
                libraries
                    .iter()
                    .flat_map(|lib| lib.top_level_elements())
                    .map(|e| e.as_ref()),
            )
            .filter_map(|e| match &e.kind {
                ElementKind::Extension { extended_type, .. } => {
                    Some((e.key.clone(), extended_type.clone()))
                }
                _ => None,
            })
            .collect();
        Self {
            table,
            scope,
            namespaces,
            locals: LocalScope::default(),
            owner: None,
            extensions: visible,
            enclosing: None,
            cascades: Vec::new(),
            occurrences: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub(super) fn library_key(&self) -> ElementKey {
        self.table.key("")
    }

    pub(super) fn record(
        &mut self,
        name: &Name,
        target: Option<ElementKey>,
        context: OccurrenceContext,
        syntax: Syntax,
    ) {
        self.record_at(name.offset, name.name.len(), name.name.clone(), target, context, syntax);
    }

    pub(super) fn record_at(
        &mut self,
        offset: usize,
        length: usize,
        name: SmolStr,
        target: Option<ElementKey>,
        context: OccurrenceContext,
        syntax: Syntax,
    ) {
        self.occurrences.push(Occurrence {
            offset,
            length,
            name,
            target,
            context,
            is_qualified: syntax.qualified,
            is_member_selector: syntax.member_selector,
            clause: None,
            enclosing: self.enclosing.clone(),
        });
    }

    /// Replace the innermost declaration, returning the previous one.
    fn enter(&mut self, key: ElementKey) -> Option<ElementKey> {
        self.enclosing.replace(key)
    }

    fn directives(&mut self) {
        for resolved in self.scope.directives {
            if resolved.target.is_some() {
                continue;
            }
            let kind = match resolved.directive.kind {
                DirectiveKind::Import => "import",
                DirectiveKind::Export => "export",
                DirectiveKind::Part => "part",
                DirectiveKind::PartOf => "part of",
            };
            self.diagnostics.push(format!(
                "unresolved {kind} '{}' at {}",
                resolved.directive.uri, resolved.directive.offset
            ));
        }
    }

    fn declaration(&mut self, declaration: &Declaration) {
        match declaration {
            Declaration::Type(decl) => self.type_decl(decl),
            Declaration::Extension(decl) => {
                let key = match &decl.name {
                    Some(name) => self.table.key(name.name.clone()),
                    None => self.table.key(format!("extension@{}", decl.keyword)),
                };
                let outer = self.enter(key.clone());
                self.locals.push();
                self.declare_type_params(&key, &decl.type_params);
                if let Some(on) = &decl.on {
                    self.type_ref(on, None);
                }
                self.owner = Some(key.clone());
                for member in &decl.members {
                    self.member(&key, member);
                }
                self.owner = None;
                self.locals.pop();
                self.enclosing = outer;
            }
            Declaration::TypeAlias(decl) => {
                let key = self.table.key(decl.name.name.clone());
                let outer = self.enter(key.clone());
                self.locals.push();
                self.declare_type_params(&key, &decl.type_params);
                if let Some(aliased) = &decl.aliased {
                    self.type_ref(aliased, None);
                }
                self.locals.pop();
                self.enclosing = outer;
            }
            Declaration::Function(decl) => {
                let key = match decl.kind {
                    FunctionKind::Setter => self.table.key(format!("{}=", decl.name.name)),
                    _ => self.table.key(decl.name.name.clone()),
                };
                self.function(key, decl, false);
            }
            Declaration::Variables(decl) => {
                if let Some(ty) = &decl.ty {
                    self.type_ref(ty, None);
                }
                for var in &decl.vars {
                    let outer = self.enter(self.table.key(var.name.name.clone()));
                    if let Some(init) = &var.init {
                        self.expr(init);
                    }
                    self.enclosing = outer;
                }
            }
        }
    }

    fn type_decl(&mut self, decl: &TypeDecl) {
        let key = self.table.key(decl.name.name.clone());
        let outer = self.enter(key.clone());
        self.locals.push();
        self.declare_type_params(&key, &decl.type_params);

        if let Some(extends) = &decl.extends {
            self.type_ref(extends, Some(SupertypeClause::Extends));
        }
        for ty in &decl.with {
            self.type_ref(ty, Some(SupertypeClause::With));
        }
        for ty in &decl.implements {
            self.type_ref(ty, Some(SupertypeClause::Implements));
        }
        for ty in &decl.on {
            self.type_ref(ty, Some(SupertypeClause::On));
        }
        if let Some(ty) = decl.representation.as_ref().and_then(|r| r.ty.as_ref()) {
            self.type_ref(ty, None);
        }

        self.owner = Some(key.clone());
        for constant in &decl.enum_constants {
            self.enum_constant(&key, constant);
        }
        for member in &decl.members {
            self.member(&key, member);
        }
        self.owner = None;
        self.locals.pop();
        self.enclosing = outer;
    }

    fn enum_constant(&mut self, owner: &ElementKey, constant: &EnumConstant) {
        let outer = self.enter(owner.member(&constant.name.name));
        let end = constant.name.end();
        let target = match &constant.constructor {
            Some(name) => {
                let target = static_member(&*self, owner, &name.name, false)
                    .filter(|k| self.tag_of(k) == Some(ElementTag::Constructor));
                self.record(name, target.clone(), OccurrenceContext::Call, Syntax::SELECTOR);
                target
            }
            None => {
                let target = unnamed_constructor(&*self, owner);
                if let Some(ctor) = &target {
                    let context = match constant.args {
                        Some(_) => OccurrenceContext::Call,
                        None => OccurrenceContext::EnumConstantWithoutArguments,
                    };
                    self.record_at(
                        end,
                        0,
                        SmolStr::default(),
                        Some(ctor.clone()),
                        context,
                        Syntax::BARE,
                    );
                }
                target
            }
        };
        if let Some(args) = &constant.args {
            self.arguments(target.as_ref(), args);
        }
        self.enclosing = outer;
    }

    fn member(&mut self, owner: &ElementKey, member: &Member) {
        match member {
            Member::Field(fields) => {
                if let Some(ty) = &fields.ty {
                    self.type_ref(ty, None);
                }
                for var in &fields.vars {
                    let outer = self.enter(owner.member(&var.name.name));
                    if let Some(init) = &var.init {
                        self.expr(init);
                    }
                    self.enclosing = outer;
                }
            }
            Member::Method(method) => {
                let key = match method.kind {
                    FunctionKind::Setter => owner.member(&format!("{}=", method.name.name)),
                    _ => owner.member(&method.name.name),
                };
                self.function(key, method, false);
            }
            Member::Constructor(ctor) => self.constructor(owner, ctor),
        }
    }

    fn constructor(&mut self, owner: &ElementKey, ctor: &ConstructorDecl) {
        let key = owner.member(ctor.name.as_ref().map(|n| n.name.as_str()).unwrap_or(""));
        let outer = self.enter(key.clone());
        self.locals.push();
        self.params(&key, &ctor.params, Some(owner));

        for initializer in &ctor.initializers {
            match initializer {
                Initializer::Field { name, value } => {
                    let target = static_member(&*self, owner, &name.name, true)
                        .filter(|k| self.tag_of(k) != Some(ElementTag::Constructor));
                    self.record(name, target, OccurrenceContext::Assignment, Syntax::BARE);
                    self.expr(value);
                }
                Initializer::Super {
                    keyword,
                    name,
                    args,
                } => {
                    let superclass = self.super_type();
                    let target = match name {
                        Some(name) => {
                            let target = superclass
                                .as_ref()
                                .and_then(|s| static_member(&*self, s, &name.name, false))
                                .filter(|k| self.tag_of(k) == Some(ElementTag::Constructor));
                            let context = OccurrenceContext::Call;
                            self.record(name, target.clone(), context, Syntax::SELECTOR);
                            target
                        }
                        None => {
                            let target = superclass
                                .as_ref()
                                .and_then(|s| unnamed_constructor(&*self, s));
                            if let Some(ctor) = &target {
                                self.record_at(
                                    keyword + "super".len(),
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
                }
                Initializer::Assert(args) => self.arguments(None, args),
            }
        }

        match &ctor.redirect {
            Some(Redirect::This { name, args }) => {
                let target = match name {
                    Some(name) => {
                        let target = static_member(&*self, owner, &name.name, false)
                            .filter(|k| self.tag_of(k) == Some(ElementTag::Constructor));
                        let context = OccurrenceContext::Call;
                        self.record(name, target.clone(), context, Syntax::SELECTOR);
                        target
                    }
                    None => unnamed_constructor(&*self, owner),
                };
                self.arguments(target.as_ref(), args);
            }
            Some(Redirect::Factory { ty, name }) => {
                let class = self.type_ref(ty, None).map(|k| resolve_alias(&*self, &k));
                match name {
                    Some(name) => {
                        let target = class
                            .as_ref()
                            .and_then(|c| static_member(&*self, c, &name.name, false))
                            .filter(|k| self.tag_of(k) == Some(ElementTag::Constructor));
                        self.record(
                            name,
                            target,
                            OccurrenceContext::ConstructorTearOff,
                            Syntax::SELECTOR,
                        );
                    }
                    None => {
                        let ctor = class.as_ref().and_then(|c| unnamed_constructor(&*self, c));
                        if let Some(ctor) = ctor {
                            self.record_at(
                                ty.name.end(),
                                0,
                                SmolStr::default(),
                                Some(ctor),
                                OccurrenceContext::ConstructorTearOff,
                                Syntax::BARE,
                            );
                        }
                    }
                }
            }
            None => {}
        }

        self.body(&ctor.body);
        self.locals.pop();
        self.enclosing = outer;
    }

    /// Bind a function or method whose element is `key`. `local` is set
    /// for functions declared inside a body.
    fn function(&mut self, key: ElementKey, decl: &FunctionDecl, local: bool) {
        let outer = self.enter(key.clone());
        self.locals.push();
        if local {
            self.insert_type_params(&key, &decl.type_params);
        }
        self.declare_type_params(&key, &decl.type_params);
        if let Some(ty) = &decl.return_type {
            self.type_ref(ty, None);
        }
        let class = self.owner.clone();
        self.params(&key, &decl.params, class.as_ref());
        self.body(&decl.body);
        self.locals.pop();
        self.enclosing = outer;
    }

    /// Bind the parameters of `owner` and bring them into scope. Parameter
    /// elements of local functions and closures are created here.
    pub(super) fn params(
        &mut self,
        owner: &ElementKey,
        params: &[Param],
        class: Option<&ElementKey>,
    ) {
        for param in params {
            let declared = param.ty.as_ref().and_then(|ty| self.type_ref(ty, None));
            let key = owner.member(&param.name.name);
            if self.table.get(&key.name).is_none() {
                let declared_type = declared.filter(|k| self.is_class_like(k));
                let kind = ElementKind::Parameter;
                self.insert_local(key.clone(), &param.name, kind, param.span, declared_type);
            }
            if param.mode == ParamMode::Field {
                let target = class
                    .and_then(|c| static_member(&*self, c, &param.name.name, true))
                    .filter(|k| self.tag_of(k) != Some(ElementTag::Constructor));
                self.record(&param.name, target, OccurrenceContext::Assignment, Syntax::SELECTOR);
            }
            if let Some(default) = &param.default {
                self.expr(default);
            }
            self.locals.declare(&param.name.name, key);
        }
    }

    pub(super) fn insert_local(
        &mut self,
        key: ElementKey,
        name: &Name,
        kind: ElementKind,
        code: Span,
        declared_type: Option<ElementKey>,
    ) {
        let element = Element {
            key,
            name: Some(name.name.clone()),
            kind,
            enclosing: Some(self.enclosing.clone().unwrap_or_else(|| self.library_key())),
            location: Some(location(self.table.path(), name.offset, name.name.len(), code)),
            is_static: false,
            signature: None,
            declared_type,
        };
        self.table.insert(element);
    }

    fn declare_type_params(&mut self, owner: &ElementKey, names: &[Name]) {
        for name in names {
            self.locals.declare(&name.name, owner.member(&format!("<{}>", name.name)));
        }
    }

    fn insert_type_params(&mut self, owner: &ElementKey, names: &[Name]) {
        for name in names {
            let key = owner.member(&format!("<{}>", name.name));
            let code = Span {
                start: name.offset,
                end: name.end(),
            };
            self.insert_local(key, name, ElementKind::TypeParameter, code, None);
        }
    }

    pub(super) fn body(&mut self, body: &Body) {
        match body {
            Body::None => {}
            Body::Block(stmts) => self.block(stmts),
            Body::Expr(expr) => {
                self.expr(expr);
            }
        }
    }

    fn block(&mut self, stmts: &[Stmt]) {
        self.locals.push();
        for stmt in stmts {
            self.statement(stmt);
        }
        self.locals.pop();
    }

    fn scoped(&mut self, stmt: &Stmt) {
        self.locals.push();
        self.statement(stmt);
        self.locals.pop();
    }

    fn owner_of_locals(&self) -> ElementKey {
        self.enclosing.clone().unwrap_or_else(|| self.library_key())
    }

    fn local_variables(&mut self, decl: &VariablesDecl) {
        let declared = decl.ty.as_ref().and_then(|ty| self.type_ref(ty, None));
        for var in &decl.vars {
            let inferred = var.init.as_ref().and_then(|init| self.expr(init));
            let declared_type = match &decl.ty {
                Some(_) => declared.clone().filter(|k| self.is_class_like(k)),
                None => inferred,
            };
            let key = local_key(&self.owner_of_locals(), &var.name.name, var.name.offset);
            let kind = ElementKind::LocalVariable;
            self.insert_local(key.clone(), &var.name, kind, decl.span, declared_type);
            self.locals.declare(&var.name.name, key);
        }
    }

    fn statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(stmts) => self.block(stmts),
            Stmt::Variables(decl) => self.local_variables(decl),
            Stmt::LocalFunction(decl) => {
                let key = local_key(&self.owner_of_locals(), &decl.name.name, decl.name.offset);
                let declared_type = decl
                    .return_type
                    .as_ref()
                    .and_then(|ty| self.lookup_type(ty))
                    .filter(|k| self.is_class_like(k));
                self.insert_local(
                    key.clone(),
                    &decl.name,
                    ElementKind::Function {
                        parameters: decl.params.iter().map(|p| key.member(&p.name.name)).collect(),
                    },
                    decl.span,
                    declared_type,
                );
                self.locals.declare(&decl.name.name, key.clone());
                self.function(key, decl, true);
            }
            Stmt::Expr(expr) => {
                self.expr(expr);
            }
            Stmt::Return(expr) => {
                if let Some(expr) = expr {
                    self.expr(expr);
                }
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                self.scoped(then);
                if let Some(otherwise) = otherwise {
                    self.scoped(otherwise);
                }
            }
            Stmt::While { cond, body } => {
                self.expr(cond);
                self.scoped(body);
            }
            Stmt::DoWhile { body, cond } => {
                self.scoped(body);
                self.expr(cond);
            }
            Stmt::For {
                init,
                cond,
                updates,
                body,
            } => {
                self.locals.push();
                if let Some(init) = init {
                    self.statement(init);
                }
                if let Some(cond) = cond {
                    self.expr(cond);
                }
                for update in updates {
                    self.expr(update);
                }
                self.scoped(body);
                self.locals.pop();
            }
            Stmt::ForIn {
                var,
                iterable,
                body,
            } => {
                self.expr(iterable);
                self.locals.push();
                match var {
                    ForInVar::Declared { ty, name } => {
                        let declared_type = ty
                            .as_ref()
                            .and_then(|ty| self.type_ref(ty, None))
                            .filter(|k| self.is_class_like(k));
                        let key = local_key(&self.owner_of_locals(), &name.name, name.offset);
                        let code = Span {
                            start: name.offset,
                            end: name.end(),
                        };
                        let kind = ElementKind::LocalVariable;
                        self.insert_local(key.clone(), name, kind, code, declared_type);
                        self.locals.declare(&name.name, key);
                    }
                    ForInVar::Existing(target) => self.assign_target(target, AssignKind::Plain),
                }
                self.scoped(body);
                self.locals.pop();
            }
            Stmt::Switch { subject, cases } => {
                self.expr(subject);
                for case in cases {
                    let labels = case.labels.len();
                    for label in &case.labels {
                        self.declare_label(label);
                    }
                    if let Some(pattern) = &case.pattern {
                        self.expr(pattern);
                    }
                    self.block(&case.body);
                    for _ in 0..labels {
                        self.locals.pop_label();
                    }
                }
            }
            Stmt::Try {
                body,
                catches,
                finally,
            } => {
                self.block(body);
                for clause in catches {
                    self.locals.push();
                    let declared_type = clause
                        .on
                        .as_ref()
                        .and_then(|ty| self.type_ref(ty, None))
                        .filter(|k| self.is_class_like(k));
                    for (name, ty) in [(&clause.exception, declared_type), (&clause.stack, None)] {
                        let Some(name) = name else {
                            continue;
                        };
                        let key = local_key(&self.owner_of_locals(), &name.name, name.offset);
                        let code = Span {
                            start: name.offset,
                            end: name.end(),
                        };
                        self.insert_local(key.clone(), name, ElementKind::LocalVariable, code, ty);
                        self.locals.declare(&name.name, key);
                    }
                    self.block(&clause.body);
                    self.locals.pop();
                }
                if let Some(finally) = finally {
                    self.block(finally);
                }
            }
            Stmt::Labeled { label, body } => {
                self.declare_label(label);
                self.statement(body);
                self.locals.pop_label();
            }
            Stmt::Break(Some(label)) | Stmt::Continue(Some(label)) => {
                let target = self.locals.label(&label.name).cloned();
                self.record(label, target, OccurrenceContext::Read, Syntax::BARE);
            }
            Stmt::Break(None) | Stmt::Continue(None) | Stmt::Empty => {}
        }
    }

    fn declare_label(&mut self, label: &Name) {
        let key = local_key(&self.owner_of_locals(), &format!("{}:", label.name), label.offset);
        let code = Span {
            start: label.offset,
            end: label.end(),
        };
        self.insert_local(key.clone(), label, ElementKind::Label, code, None);
        self.locals.push_label(&label.name, key);
    }

    pub(super) fn tag_of(&self, key: &ElementKey) -> Option<ElementTag> {
        self.element(key).map(Element::tag)
    }

    pub(super) fn is_class_like(&self, key: &ElementKey) -> bool {
        matches!(
            self.tag_of(key),
            Some(
                ElementTag::Class
                    | ElementTag::Mixin
                    | ElementTag::Enum
                    | ElementTag::ExtensionType
                    | ElementTag::TypeAlias
            )
        )
    }

    /// The static type of `this` inside the current body.
    pub(super) fn this_type(&self) -> Option<ElementKey> {
        let owner = self.owner.as_ref()?;
        match &self.element(owner)?.kind {
            ElementKind::Extension { extended_type, .. } => extended_type.clone(),
            _ => Some(owner.clone()),
        }
    }

    /// The superclass of the current type, or the first `on` constraint of
    /// a mixin.
    pub(super) fn super_type(&self) -> Option<ElementKey> {
        let owner = self.owner.as_ref()?;
        let shape = self.element(owner)?.kind.type_shape()?;
        shape
            .supertype
            .clone()
            .or_else(|| shape.superclass_constraints.first().cloned())
            .map(|k| resolve_alias(self, &k))
    }
}
