use super::scope::Namespaces;
use super::{ElementTable, location};
use crate::parser::ast::*;
use refscope_api::models::{Element, ElementKey, ElementKind, ElementTag, TypeShape};
use refscope_plugin::{DirectiveKind, ResolutionScope};
use smol_str::SmolStr;

/// Type parameters in scope while declaring, innermost last.
type TypeParams = Vec<(SmolStr, ElementKey)>;

/// Build the non-local elements of `tree`. Element 0 is the library.
pub(crate) fn declare(
    tree: &CompilationUnit,
    scope: &ResolutionScope<'_>,
    namespaces: &Namespaces<'_>,
) -> ElementTable {
    let mut declarer = Declarer {
        table: ElementTable::new(scope.path.clone()),
        tree,
        scope,
        namespaces,
    };
    declarer.library();
    declarer.directives();
    for declaration in &tree.declarations {
        declarer.declaration(declaration);
    }
    declarer.prefixes();
    declarer.table
}

struct Declarer<'a, 's> {
    table: ElementTable,
    tree: &'a CompilationUnit,
    scope: &'a ResolutionScope<'s>,
    namespaces: &'a Namespaces<'s>,
}

fn element(
    key: ElementKey,
    name: Option<SmolStr>,
    kind: ElementKind,
    enclosing: &ElementKey,
) -> Element {
    Element {
        key,
        name,
        kind,
        enclosing: Some(enclosing.clone()),
        location: None,
        is_static: false,
        signature: None,
        declared_type: None,
    }
}

impl Declarer<'_, '_> {
    fn library_key(&self) -> ElementKey {
        self.table.key("")
    }

    fn at(&self, mut element: Element, name: &Name, code: Span) -> Element {
        element.location = Some(location(self.table.path(), name.offset, name.name.len(), code));
        element
    }

    fn library(&mut self) {
        let whole = Span {
            start: 0,
            end: self.tree.source.len(),
        };
        let name = self.tree.library_name.as_ref();
        let library = Element {
            key: self.library_key(),
            name: name.map(|n| n.name.clone()),
            kind: ElementKind::Library {
                uri: SmolStr::new(self.scope.library_uri),
            },
            enclosing: None,
            location: name.map(|n| location(self.table.path(), n.offset, n.name.len(), whole)),
            is_static: false,
            signature: None,
            declared_type: None,
        };
        self.table.insert(library);
    }

    fn directives(&mut self) {
        let library = self.library_key();
        for (directive, span) in &self.tree.directives {
            let (label, kind) = match directive.kind {
                DirectiveKind::Import => (
                    "import",
                    ElementKind::Import {
                        uri: directive.uri.clone(),
                    },
                ),
                DirectiveKind::Export => (
                    "export",
                    ElementKind::Export {
                        uri: directive.uri.clone(),
                    },
                ),
                DirectiveKind::Part | DirectiveKind::PartOf => continue,
            };
            let key = self.table.key(format!("{label}@{}", directive.offset));
            let mut el = element(key, None, kind, &library);
            el.location = Some(location(
                self.table.path(),
                directive.offset,
                directive.length,
                *span,
            ));
            self.table.insert(el);
        }
    }

    /// One element per distinct import prefix, located at its first
    /// declaration.
    fn prefixes(&mut self) {
        let library = self.library_key();
        for (directive, span) in &self.tree.directives {
            let Some(prefix) = &directive.prefix else {
                continue;
            };
            let offset =
                prefix_offset(&self.tree.source, *span, prefix).unwrap_or(directive.offset);
            let name = Name {
                name: prefix.clone(),
                offset,
            };
            let key = self.table.key(prefix.clone());
            let el = element(key, Some(prefix.clone()), ElementKind::Prefix, &library);
            let el = self.at(el, &name, *span);
            self.table.insert(el);
        }
    }

    fn declaration(&mut self, declaration: &Declaration) {
        let library = self.library_key();
        match declaration {
            Declaration::Type(decl) => self.type_decl(decl),
            Declaration::Extension(decl) => self.extension(decl),
            Declaration::TypeAlias(decl) => {
                let key = self.table.key(decl.name.name.clone());
                let type_params = self.type_params(&key, &decl.type_params, &Vec::new());
                let aliased = decl
                    .aliased
                    .as_ref()
                    .and_then(|ty| self.resolve_type(ty, &type_params));
                let el = element(
                    key.clone(),
                    Some(decl.name.name.clone()),
                    ElementKind::TypeAlias { aliased },
                    &library,
                );
                let el = self.at(el, &decl.name, decl.span);
                self.table.insert(el);
                self.insert_type_params(&key, &decl.type_params);
            }
            Declaration::Function(decl) => {
                self.function(&library, decl, false, &Vec::new());
            }
            Declaration::Variables(decl) => {
                for var in &decl.vars {
                    let key = self.table.key(var.name.name.clone());
                    let mut el = element(
                        key,
                        Some(var.name.name.clone()),
                        ElementKind::TopLevelVariable,
                        &library,
                    );
                    el.declared_type = self.declared_type(decl.ty.as_ref(), var.init.as_ref(), &[]);
                    let el = self.at(el, &var.name, decl.span);
                    self.table.insert(el);
                }
            }
        }
    }

    fn type_decl(&mut self, decl: &TypeDecl) {
        let library = self.library_key();
        let key = self.table.key(decl.name.name.clone());
        let type_params = self.type_params(&key, &decl.type_params, &Vec::new());
        let resolve_all = |this: &Self, types: &[TypeRef]| -> Vec<ElementKey> {
            types
                .iter()
                .filter_map(|ty| this.resolve_type(ty, &type_params))
                .collect()
        };
        let shape = TypeShape {
            supertype: decl
                .extends
                .as_ref()
                .and_then(|ty| self.resolve_type(ty, &type_params)),
            mixins: resolve_all(self, &decl.with),
            interfaces: resolve_all(self, &decl.implements),
            superclass_constraints: match decl.kind {
                TypeDeclKind::Mixin => resolve_all(self, &decl.on),
                _ => Vec::new(),
            },
            members: Vec::new(),
        };
        let kind = match decl.kind {
            TypeDeclKind::Class => ElementKind::Class(shape),
            TypeDeclKind::Mixin => ElementKind::Mixin(shape),
            TypeDeclKind::Enum => ElementKind::Enum(shape),
            TypeDeclKind::ExtensionType => ElementKind::ExtensionType(shape),
        };
        let el = element(key.clone(), Some(decl.name.name.clone()), kind, &library);
        let el = self.at(el, &decl.name, decl.span);
        if !self.table.insert(el) {
            return;
        }
        self.insert_type_params(&key, &decl.type_params);

        let mut members = Vec::new();
        for constant in &decl.enum_constants {
            let member = key.member(&constant.name.name);
            let mut el = element(
                member.clone(),
                Some(constant.name.name.clone()),
                ElementKind::EnumConstant,
                &key,
            );
            el.is_static = true;
            el.declared_type = Some(key.clone());
            let el = self.at(el, &constant.name, constant.span);
            if self.table.insert(el) {
                members.push(member);
            }
        }
        if let Some(rep) = &decl.representation {
            let member = key.member(&rep.name.name);
            let name = Some(rep.name.name.clone());
            let mut el = element(member.clone(), name, ElementKind::Field, &key);
            el.declared_type = self.declared_type(rep.ty.as_ref(), None, &type_params);
            let el = self.at(el, &rep.name, rep.span);
            if self.table.insert(el) {
                members.push(member);
            }
        }
        members.extend(self.members(&key, &decl.members, &type_params));

        if let Some(ElementKind::Class(shape)
        | ElementKind::Mixin(shape)
        | ElementKind::Enum(shape)
        | ElementKind::ExtensionType(shape)) =
            self.table.get_mut(&key.name).map(|e| &mut e.kind)
        {
            shape.members = members;
        }
    }

    fn extension(&mut self, decl: &ExtensionDecl) {
        let library = self.library_key();
        let key_name = match &decl.name {
            Some(name) => name.name.clone(),
            None => SmolStr::new(format!("extension@{}", decl.keyword)),
        };
        let key = self.table.key(key_name);
        let type_params = self.type_params(&key, &decl.type_params, &Vec::new());
        let extended_type = decl
            .on
            .as_ref()
            .and_then(|ty| self.resolve_type(ty, &type_params));
        let mut el = element(
            key.clone(),
            decl.name.as_ref().map(|n| n.name.clone()),
            ElementKind::Extension {
                extended_type,
                members: Vec::new(),
            },
            &library,
        );
        let anchor = decl.name.clone().unwrap_or(Name {
            name: SmolStr::new("extension"),
            offset: decl.keyword,
        });
        el = self.at(el, &anchor, decl.span);
        if !self.table.insert(el) {
            return;
        }
        self.insert_type_params(&key, &decl.type_params);
        let declared = self.members(&key, &decl.members, &type_params);
        if let Some(ElementKind::Extension { members, .. }) =
            self.table.get_mut(&key.name).map(|e| &mut e.kind)
        {
            *members = declared;
        }
    }

    fn members(
        &mut self,
        owner: &ElementKey,
        members: &[Member],
        outer: &TypeParams,
    ) -> Vec<ElementKey> {
        let mut keys = Vec::new();
        for member in members {
            match member {
                Member::Field(fields) => {
                    for var in &fields.vars {
                        let key = owner.member(&var.name.name);
                        let name = Some(var.name.name.clone());
                        let mut el = element(key.clone(), name, ElementKind::Field, owner);
                        el.is_static = fields.is_static;
                        el.declared_type =
                            self.declared_type(fields.ty.as_ref(), var.init.as_ref(), outer);
                        let el = self.at(el, &var.name, fields.span);
                        if self.table.insert(el) {
                            keys.push(key);
                        }
                    }
                }
                Member::Method(method) => {
                    if let Some(key) = self.function(owner, method, true, outer) {
                        keys.push(key);
                    }
                }
                Member::Constructor(ctor) => {
                    if let Some(key) = self.constructor(owner, ctor, outer) {
                        keys.push(key);
                    }
                }
            }
        }
        keys
    }

    fn constructor(
        &mut self,
        owner: &ElementKey,
        ctor: &ConstructorDecl,
        outer: &TypeParams,
    ) -> Option<ElementKey> {
        let suffix = ctor.name.as_ref().map(|n| n.name.as_str()).unwrap_or("");
        let key = owner.member(suffix);
        let mut el = element(
            key.clone(),
            ctor.name.as_ref().map(|n| n.name.clone()),
            ElementKind::Constructor {
                parameters: Vec::new(),
            },
            owner,
        );
        el.signature = Some(SmolStr::new(self.tree.text(ctor.params_span)));
        el.declared_type = Some(owner.clone());
        let anchor = ctor.name.as_ref().unwrap_or(&ctor.class_name);
        let el = self.at(el, anchor, ctor.span);
        if !self.table.insert(el) {
            return None;
        }
        let parameters = self.parameters(&key, &ctor.params, outer, Some(owner));
        if let Some(ElementKind::Constructor { parameters: slot }) =
            self.table.get_mut(&key.name).map(|e| &mut e.kind)
        {
            *slot = parameters;
        }
        Some(key)
    }

    /// Top-level functions (`owner` is the library) and members.
    fn function(
        &mut self,
        owner: &ElementKey,
        decl: &FunctionDecl,
        is_member: bool,
        outer: &TypeParams,
    ) -> Option<ElementKey> {
        let key_name = match decl.kind {
            FunctionKind::Setter => SmolStr::new(format!("{}=", decl.name.name)),
            _ => decl.name.name.clone(),
        };
        let key = if is_member {
            owner.member(&key_name)
        } else {
            self.table.key(key_name)
        };
        let type_params = self.type_params(&key, &decl.type_params, outer);

        let kind = match (decl.kind, is_member) {
            (FunctionKind::Getter, _) => ElementKind::Getter,
            (FunctionKind::Setter, _) => ElementKind::Setter,
            (_, true) => ElementKind::Method {
                parameters: Vec::new(),
            },
            (_, false) => ElementKind::Function {
                parameters: Vec::new(),
            },
        };
        let mut el = element(key.clone(), Some(decl.name.name.clone()), kind, owner);
        el.is_static = decl.is_static;
        el.signature = decl
            .params_span
            .map(|span| SmolStr::new(self.tree.text(span)));
        el.declared_type = self.declared_type(decl.return_type.as_ref(), None, &type_params);
        let el = self.at(el, &decl.name, decl.span);
        if !self.table.insert(el) {
            return None;
        }
        self.insert_type_params(&key, &decl.type_params);
        let parameters = self.parameters(&key, &decl.params, &type_params, None);
        if let Some(
            ElementKind::Function { parameters: slot } | ElementKind::Method { parameters: slot },
        ) = self.table.get_mut(&key.name).map(|e| &mut e.kind)
        {
            *slot = parameters;
        }
        Some(key)
    }

    /// Parameter elements of `owner`. `this.x` parameters take the type of
    /// the field they initialize.
    fn parameters(
        &mut self,
        owner: &ElementKey,
        params: &[Param],
        type_params: &TypeParams,
        class: Option<&ElementKey>,
    ) -> Vec<ElementKey> {
        let mut keys = Vec::new();
        for param in params {
            let key = owner.member(&param.name.name);
            let name = Some(param.name.name.clone());
            let mut el = element(key.clone(), name, ElementKind::Parameter, owner);
            el.declared_type = match (param.mode, class) {
                (ParamMode::Field, Some(class)) => self
                    .table
                    .get(&class.member(&param.name.name).name)
                    .and_then(|field| field.declared_type.clone()),
                _ => self.declared_type(param.ty.as_ref(), None, type_params),
            };
            let el = self.at(el, &param.name, param.span);
            if self.table.insert(el) {
                keys.push(key);
            }
        }
        keys
    }

    /// Keys for `names`, appended to `outer`. Elements are inserted
    /// separately so the owner precedes them in the table.
    fn type_params(&self, owner: &ElementKey, names: &[Name], outer: &TypeParams) -> TypeParams {
        let mut params = outer.clone();
        params.extend(
            names
                .iter()
                .map(|n| (n.name.clone(), owner.member(&format!("<{}>", n.name)))),
        );
        params
    }

    fn insert_type_params(&mut self, owner: &ElementKey, names: &[Name]) {
        for name in names {
            let key = owner.member(&format!("<{}>", name.name));
            let el = element(key, Some(name.name.clone()), ElementKind::TypeParameter, owner);
            let code = Span {
                start: name.offset,
                end: name.end(),
            };
            let el = self.at(el, name, code);
            self.table.insert(el);
        }
    }

    fn resolve_type(
        &self,
        ty: &TypeRef,
        type_params: &[(SmolStr, ElementKey)],
    ) -> Option<ElementKey> {
        if let Some(prefix) = &ty.prefix {
            return self
                .namespaces
                .imports
                .lookup_prefixed(&prefix.name, &ty.name.name, false);
        }
        if let Some((_, key)) = type_params.iter().rev().find(|(n, _)| *n == ty.name.name) {
            return Some(key.clone());
        }
        self.namespaces.lookup(&ty.name.name, false)
    }

    fn element(&self, key: &ElementKey) -> Option<&Element> {
        if key.path == *self.table.path() {
            return self.table.get(&key.name);
        }
        self.scope
            .library(&key.path)
            .and_then(|lib| lib.element(key))
            .map(|e| e.as_ref())
    }

    fn is_class_like(&self, key: &ElementKey) -> bool {
        if key.path == *self.table.path() {
            return self.namespaces.library.is_own_type(&key.name);
        }
        self.element(key).is_some_and(|e| {
            matches!(
                e.tag(),
                ElementTag::Class
                    | ElementTag::Mixin
                    | ElementTag::Enum
                    | ElementTag::ExtensionType
                    | ElementTag::TypeAlias
            )
        })
    }

    fn declared_type(
        &self,
        ty: Option<&TypeRef>,
        init: Option<&Expr>,
        type_params: &[(SmolStr, ElementKey)],
    ) -> Option<ElementKey> {
        match ty {
            Some(ty) => self
                .resolve_type(ty, type_params)
                .filter(|key| self.is_class_like(key)),
            None => init.and_then(|init| self.infer(init)),
        }
    }

    /// Static type of an initializer, for the shapes that need no local
    /// scope: constructor calls and calls of typed functions.
    fn infer(&self, expr: &Expr) -> Option<ElementKey> {
        match expr {
            Expr::New { ty, .. } => match &ty.prefix {
                Some(prefix) if !self.namespaces.imports.is_prefix(&prefix.name) => self
                    .namespaces
                    .lookup(&prefix.name, false)
                    .filter(|k| self.is_class_like(k)),
                _ => self.resolve_type(ty, &[]).filter(|k| self.is_class_like(k)),
            },
            Expr::Call { callee, .. } => match callee.as_ref() {
                Expr::Ident(name) => {
                    let key = self.namespaces.lookup(&name.name, false)?;
                    if self.is_class_like(&key) {
                        Some(key)
                    } else {
                        self.element(&key).and_then(|e| e.declared_type.clone())
                    }
                }
                Expr::Member { target, .. } => match target.as_ref() {
                    Expr::Ident(class) => self
                        .namespaces
                        .lookup(&class.name, false)
                        .filter(|k| self.is_class_like(k)),
                    _ => None,
                },
                _ => None,
            },
            Expr::Wrapped(inner) => self.infer(inner),
            Expr::As { ty, .. } => self.resolve_type(ty, &[]).filter(|k| self.is_class_like(k)),
            _ => None,
        }
    }
}

/// Offset of the `as` prefix name inside a directive.
fn prefix_offset(source: &str, span: Span, prefix: &str) -> Option<usize> {
    let text = source.get(span.start..span.end)?;
    let after_as = text.rfind(" as ")? + " as ".len();
    let rest = &text[after_as..];
    let skipped = rest.len() - rest.trim_start().len();
    rest.trim_start()
        .starts_with(prefix)
        .then_some(span.start + after_as + skipped)
}
