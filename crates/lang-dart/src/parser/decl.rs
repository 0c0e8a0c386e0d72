use super::Parser;
use super::ast::*;
use super::lexer::TokenKind;
use refscope_plugin::{Directive, DirectiveKind};
use smol_str::SmolStr;

const CLASS_MODIFIERS: &[&str] = &["abstract", "base", "sealed", "interface", "final", "augment"];

pub(crate) enum FunctionOrVariables {
    Function(FunctionDecl),
    Variables(VariablesDecl),
}

impl Parser<'_> {
    pub(crate) fn compilation_unit(&mut self) -> CompilationUnit {
        let mut unit = CompilationUnit::default();
        while !self.at_eof() && self.fatal.is_none() {
            let before = self.pos;
            self.skip_annotations();
            if self.at("library") && (self.tok_at(1).kind == TokenKind::Ident || self.at_n(1, ";"))
            {
                self.bump();
                unit.library_name = self.name_any();
                while self.eat(".") {
                    self.name_any();
                }
                self.expect(";");
            } else if let Some(kind) = self.directive_kind() {
                if let Some(directive) = self.directive(kind) {
                    unit.directives.push(directive);
                }
            } else if let Some(declaration) = self.top_level_declaration() {
                unit.declarations.push(declaration);
            }
            if self.pos == before {
                self.error("unexpected token");
                self.bump();
            }
        }
        unit
    }

    fn directive_kind(&self) -> Option<DirectiveKind> {
        let uri_follows = |ahead: usize| self.tok_at(ahead).kind == TokenKind::String;
        match self.text_at(0) {
            "import" if uri_follows(1) => Some(DirectiveKind::Import),
            "export" if uri_follows(1) => Some(DirectiveKind::Export),
            "part" if self.at_n(1, "of") => Some(DirectiveKind::PartOf),
            "part" if uri_follows(1) => Some(DirectiveKind::Part),
            _ => None,
        }
    }

    /// `part of some.name;` carries no URI and yields no directive.
    fn directive(&mut self, kind: DirectiveKind) -> Option<(Directive, Span)> {
        let start = self.bump().start;
        if kind == DirectiveKind::PartOf {
            self.bump();
            if self.tok().kind != TokenKind::String {
                while self.name_any().is_some() && self.eat(".") {}
                self.expect(";");
                return None;
            }
        }
        let uri_token = self.bump();
        let uri = unquote(self.text_of(uri_token));

        let mut prefix = None;
        loop {
            if self.at("if") && self.at_n(1, "(") {
                self.bump();
                self.skip_balanced();
                if self.tok().kind == TokenKind::String {
                    self.bump();
                }
            } else if self.eat("deferred") {
            } else if self.eat("as") {
                prefix = self.expect_name().map(|n| n.name);
            } else if self.at("show") || self.at("hide") {
                self.bump();
                while self.name_any().is_some() && self.eat(",") {}
            } else {
                break;
            }
        }
        self.expect(";");
        let directive = Directive {
            kind,
            uri: SmolStr::new(uri),
            offset: uri_token.start,
            length: uri_token.len(),
            prefix,
        };
        Some((
            directive,
            Span {
                start,
                end: self.prev_end(),
            },
        ))
    }

    fn top_level_declaration(&mut self) -> Option<Declaration> {
        let start = self.tok().start;
        let mut modifiers = 0;
        while CLASS_MODIFIERS.contains(&self.text_at(modifiers)) {
            modifiers += 1;
        }
        let kind = match (self.text_at(modifiers), self.text_at(modifiers + 1)) {
            ("class", _) => Some(TypeDeclKind::Class),
            ("mixin", "class") => Some(TypeDeclKind::Class),
            ("mixin", _) => Some(TypeDeclKind::Mixin),
            ("enum", _) => Some(TypeDeclKind::Enum),
            ("extension", "type") => Some(TypeDeclKind::ExtensionType),
            _ => None,
        };
        if let Some(kind) = kind {
            self.pos += modifiers;
            return self.type_decl(kind, start).map(Declaration::Type);
        }
        if modifiers == 0 && self.at("extension") {
            return self.extension_decl(start).map(Declaration::Extension);
        }
        if modifiers == 0 && self.at("typedef") {
            return self.type_alias(start).map(Declaration::TypeAlias);
        }

        while matches!(
            self.text_at(0),
            "external" | "late" | "final" | "const" | "var" | "augment"
        ) {
            self.bump();
        }
        match self.function_or_variables(start, false)? {
            FunctionOrVariables::Function(f) => Some(Declaration::Function(f)),
            FunctionOrVariables::Variables(v) => Some(Declaration::Variables(v)),
        }
    }

    fn type_decl(&mut self, kind: TypeDeclKind, start: usize) -> Option<TypeDecl> {
        match kind {
            TypeDeclKind::Class => {
                self.eat("mixin");
                self.bump();
            }
            TypeDeclKind::ExtensionType => {
                self.bump();
                self.bump();
                self.eat("const");
            }
            TypeDeclKind::Mixin | TypeDeclKind::Enum => {
                self.bump();
            }
        }
        let name = self.expect_name()?;
        let type_params = self.type_params();
        let mut decl = TypeDecl {
            kind,
            name,
            type_params,
            extends: None,
            with: Vec::new(),
            implements: Vec::new(),
            on: Vec::new(),
            representation: None,
            enum_constants: Vec::new(),
            members: Vec::new(),
            span: Span { start, end: start },
        };

        if kind == TypeDeclKind::ExtensionType {
            if self.eat(".") {
                self.name_any();
            }
            if self.at("(") {
                let rep_start = self.bump().start;
                let ty = self.type_before_name();
                if let Some(name) = self.expect_name() {
                    decl.representation = Some(Param {
                        name,
                        ty,
                        mode: ParamMode::Plain,
                        named: false,
                        default: None,
                        span: Span {
                            start: rep_start,
                            end: self.tok().end,
                        },
                    });
                }
                self.expect(")");
            }
        }

        // `class A = B with M;`
        if kind == TypeDeclKind::Class && self.eat("=") {
            decl.extends = self.type_ref();
            if self.eat("with") {
                decl.with = self.type_list();
            }
            if self.eat("implements") {
                decl.implements = self.type_list();
            }
            self.expect(";");
            decl.span.end = self.prev_end();
            return Some(decl);
        }

        loop {
            if self.eat("extends") {
                decl.extends = self.type_ref();
                if decl.extends.is_none() {
                    self.error("expected a type");
                }
            } else if self.eat("with") {
                decl.with = self.type_list();
            } else if self.eat("implements") {
                decl.implements = self.type_list();
            } else if self.eat("on") {
                decl.on = self.type_list();
            } else {
                break;
            }
        }

        if !self.expect("{") {
            decl.span.end = self.prev_end();
            return Some(decl);
        }
        if kind == TypeDeclKind::Enum {
            decl.enum_constants = self.enum_constants();
        }
        decl.members = self.class_members(&decl.name.name);
        self.expect("}");
        decl.span.end = self.prev_end();
        Some(decl)
    }

    fn type_list(&mut self) -> Vec<TypeRef> {
        let mut types = Vec::new();
        loop {
            match self.type_ref() {
                Some(ty) => types.push(ty),
                None => {
                    self.error("expected a type");
                    break;
                }
            }
            if !self.eat(",") {
                break;
            }
        }
        types
    }

    fn enum_constants(&mut self) -> Vec<EnumConstant> {
        let mut constants = Vec::new();
        loop {
            self.skip_annotations();
            if self.eat(";") || self.at("}") {
                break;
            }
            let start = self.tok().start;
            let Some(name) = self.expect_name() else {
                break;
            };
            if self.at("<") {
                let save = self.pos;
                if self.type_args().is_none() {
                    self.pos = save;
                }
            }
            let constructor = if self.eat(".") { self.name_any() } else { None };
            let args = if self.at("(") { Some(self.arguments()) } else { None };
            constants.push(EnumConstant {
                name,
                constructor,
                args,
                span: Span {
                    start,
                    end: self.prev_end(),
                },
            });
            if !self.eat(",") {
                self.eat(";");
                break;
            }
        }
        constants
    }

    fn extension_decl(&mut self, start: usize) -> Option<ExtensionDecl> {
        let keyword = self.bump().start;
        let name = if self.at("on") { None } else { self.name() };
        let type_params = self.type_params();
        let on = if self.expect("on") { self.type_ref() } else { None };
        let mut members = Vec::new();
        if self.expect("{") {
            members = self.class_members("");
            self.expect("}");
        }
        Some(ExtensionDecl {
            name,
            keyword,
            type_params,
            on,
            members,
            span: Span {
                start,
                end: self.prev_end(),
            },
        })
    }

    fn type_alias(&mut self, start: usize) -> Option<TypeAliasDecl> {
        self.bump();
        let modern = self.at_name() && (self.at_n(1, "=") || self.at_n(1, "<"));
        let (name, type_params, aliased) = if modern {
            let name = self.expect_name()?;
            let type_params = self.type_params();
            if self.eat("=") {
                (name, type_params, self.type_ref())
            } else {
                self.params();
                (name, type_params, None)
            }
        } else {
            self.type_before_name();
            let name = self.expect_name()?;
            let type_params = self.type_params();
            self.params();
            (name, type_params, None)
        };
        self.expect(";");
        Some(TypeAliasDecl {
            name,
            type_params,
            aliased,
            span: Span {
                start,
                end: self.prev_end(),
            },
        })
    }

    fn class_members(&mut self, class_name: &str) -> Vec<Member> {
        let mut members = Vec::new();
        while !self.at("}") && !self.at_eof() && self.fatal.is_none() {
            let before = self.pos;
            if let Some(member) = self.member(class_name) {
                members.push(member);
            }
            if self.pos == before {
                self.error("unexpected token in type body");
                self.bump();
            }
        }
        members
    }

    fn member(&mut self, class_name: &str) -> Option<Member> {
        self.skip_annotations();
        let start = self.tok().start;
        if self.eat(";") {
            return None;
        }
        let mut is_static = false;
        let mut is_factory = false;
        loop {
            match self.text_at(0) {
                "static" => is_static = true,
                "factory" => is_factory = true,
                "external" | "abstract" | "covariant" | "late" | "final" | "const" | "var"
                | "augment" => {}
                _ => break,
            }
            self.bump();
        }

        let names_class = !class_name.is_empty() && self.at(class_name);
        let constructor_shape = self.at_n(1, "(")
            || (self.at_n(1, ".") && self.tok_at(2).kind == TokenKind::Ident);
        if is_factory || (names_class && constructor_shape) {
            return self.constructor(start, is_factory).map(Member::Constructor);
        }
        match self.function_or_variables(start, is_static)? {
            FunctionOrVariables::Function(f) => Some(Member::Method(f)),
            FunctionOrVariables::Variables(v) => Some(Member::Field(v)),
        }
    }

    fn constructor(&mut self, start: usize, is_factory: bool) -> Option<ConstructorDecl> {
        let class_name = self.name_any()?;
        let name = if self.eat(".") {
            self.name_any().filter(|n| n.name != "new")
        } else {
            None
        };
        let (params, params_span) = self.params();
        let mut initializers = Vec::new();
        let mut redirect = None;
        let mut body = Body::None;

        if is_factory && self.eat("=") {
            if let Some(ty) = self.type_ref() {
                let name = if self.eat(".") { self.name_any() } else { None };
                redirect = Some(Redirect::Factory { ty, name });
            }
            self.expect(";");
        } else {
            if self.eat(":") {
                loop {
                    if self.at("super") {
                        let keyword = self.bump().start;
                        let name = if self.eat(".") { self.name_any() } else { None };
                        let args = self.arguments();
                        initializers.push(Initializer::Super {
                            keyword,
                            name,
                            args,
                        });
                    } else if self.at("this") && !self.at_n(3, "=") {
                        self.bump();
                        let name = if self.eat(".") { self.name_any() } else { None };
                        let args = self.arguments();
                        redirect = Some(Redirect::This { name, args });
                    } else if self.at("assert") {
                        self.bump();
                        initializers.push(Initializer::Assert(self.arguments()));
                    } else {
                        if self.eat("this") {
                            self.expect(".");
                        }
                        let Some(name) = self.expect_name() else {
                            break;
                        };
                        self.expect("=");
                        let value = self.expr();
                        initializers.push(Initializer::Field { name, value });
                    }
                    if !self.eat(",") {
                        break;
                    }
                }
            }
            body = self.function_body();
        }

        Some(ConstructorDecl {
            class_name,
            name,
            params,
            params_span,
            initializers,
            redirect,
            body,
            span: Span {
                start,
                end: self.prev_end(),
            },
        })
    }

    /// Shared tail of top-level and member declarations once modifiers are
    /// consumed: an optional type, then a function, accessor, operator or
    /// variable list.
    pub(crate) fn function_or_variables(
        &mut self,
        start: usize,
        is_static: bool,
    ) -> Option<FunctionOrVariables> {
        let accessor_ahead = (self.at("get") || self.at("set"))
            && self.tok_at(1).kind == TokenKind::Ident
            && !matches!(self.text_at(2), ";" | "=" | ",");
        let operator_ahead = self.at("operator") && !self.at_n(1, "(");
        let ty = if accessor_ahead || operator_ahead {
            None
        } else {
            self.type_before_name()
        };

        let (kind, name) = if (self.at("get") || self.at("set"))
            && self.tok_at(1).kind == TokenKind::Ident
        {
            let kind = if self.at("get") {
                FunctionKind::Getter
            } else {
                FunctionKind::Setter
            };
            self.bump();
            (kind, self.expect_name()?)
        } else if self.at("operator") && !self.at_n(1, "(") {
            self.bump();
            (FunctionKind::Operator, self.operator_name()?)
        } else {
            (FunctionKind::Function, self.expect_name()?)
        };

        if kind != FunctionKind::Function || self.at("(") || self.at("<") {
            let type_params = self.type_params();
            let (params, params_span) = if kind == FunctionKind::Getter {
                (Vec::new(), None)
            } else {
                let (params, span) = self.params();
                (params, Some(span))
            };
            let body = self.function_body();
            return Some(FunctionOrVariables::Function(FunctionDecl {
                kind,
                name,
                return_type: ty,
                type_params,
                params,
                params_span,
                body,
                is_static,
                span: Span {
                    start,
                    end: self.prev_end(),
                },
            }));
        }

        let vars = self.var_list(name);
        self.expect(";");
        Some(FunctionOrVariables::Variables(VariablesDecl {
            ty,
            is_static,
            vars,
            span: Span {
                start,
                end: self.prev_end(),
            },
        }))
    }

    fn operator_name(&mut self) -> Option<Name> {
        let first = self.bump();
        let mut end = first.end;
        match self.text_of(first) {
            "[" => {
                if self.at("]") {
                    end = self.bump().end;
                }
                if self.at("=") && self.tok().start == end {
                    end = self.bump().end;
                }
            }
            ">" if self.at(">") && self.tok().start == end => end = self.bump().end,
            "" => {
                self.error("expected an operator");
                return None;
            }
            _ => {}
        }
        Some(Name {
            name: SmolStr::new(&self.src[first.start..end]),
            offset: first.start,
        })
    }

    pub(crate) fn var_list(&mut self, first: Name) -> Vec<VarDecl> {
        let mut vars = Vec::new();
        let mut name = first;
        loop {
            let start = name.offset;
            let init = if self.eat("=") { Some(self.expr()) } else { None };
            vars.push(VarDecl {
                name,
                init,
                span: Span {
                    start,
                    end: self.prev_end(),
                },
            });
            if !self.eat(",") {
                break;
            }
            match self.expect_name() {
                Some(next) => name = next,
                None => break,
            }
        }
        vars
    }

    pub(crate) fn type_params(&mut self) -> Vec<Name> {
        let mut names = Vec::new();
        if !self.eat("<") {
            return names;
        }
        loop {
            self.skip_annotations();
            if let Some(name) = self.expect_name() {
                names.push(name);
            }
            if self.eat("extends") && self.type_ref().is_none() {
                self.error("expected a bound");
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect(">");
        names
    }

    pub(crate) fn params(&mut self) -> (Vec<Param>, Span) {
        let start = self.tok().start;
        if !self.expect("(") {
            return (Vec::new(), Span { start, end: start });
        }
        let mut params = Vec::new();
        let mut named = false;
        loop {
            if self.eat(")") || self.at_eof() {
                break;
            }
            if self.eat("{") {
                named = true;
                continue;
            }
            if self.eat("[") || self.eat("}") || self.eat("]") || self.eat(",") {
                continue;
            }
            let before = self.pos;
            if let Some(param) = self.param(named) {
                params.push(param);
            }
            if self.pos == before {
                self.error("unexpected token in parameter list");
                self.bump();
            }
        }
        (
            params,
            Span {
                start,
                end: self.prev_end(),
            },
        )
    }

    fn param(&mut self, named: bool) -> Option<Param> {
        self.skip_annotations();
        let start = self.tok().start;
        while matches!(
            self.text_at(0),
            "required" | "covariant" | "final" | "const" | "var" | "late"
        ) {
            self.bump();
        }
        let (mode, ty) = if (self.at("this") || self.at("super")) && self.at_n(1, ".") {
            let mode = if self.at("this") {
                ParamMode::Field
            } else {
                ParamMode::Super
            };
            self.bump();
            self.bump();
            (mode, None)
        } else {
            (ParamMode::Plain, self.type_before_name())
        };
        let name = self.expect_name()?;
        if self.at("(") {
            // Function-typed parameter.
            self.skip_balanced();
        }
        self.eat("?");
        let default = if self.eat("=") || self.eat(":") {
            Some(self.expr())
        } else {
            None
        };
        Some(Param {
            name,
            ty,
            mode,
            named,
            default,
            span: Span {
                start,
                end: self.prev_end(),
            },
        })
    }

    pub(crate) fn function_body(&mut self) -> Body {
        while self.at("async") || self.at("sync") {
            self.bump();
            self.eat("*");
        }
        if self.at("{") {
            return Body::Block(self.block());
        }
        if self.eat("=>") {
            let value = self.expr();
            self.expect(";");
            return Body::Expr(value);
        }
        if self.eat("native") && self.tok().kind == TokenKind::String {
            self.bump();
        }
        self.expect(";");
        Body::None
    }

    /// A type, but only when a name follows it; otherwise nothing is consumed.
    pub(crate) fn type_before_name(&mut self) -> Option<TypeRef> {
        let save = self.pos;
        if let Some(ty) = self.type_ref() {
            if self.at_ident() && !matches!(self.text_at(0), "in" | "is" | "as") {
                return Some(ty);
            }
        }
        self.pos = save;
        None
    }

    /// Parse a type without reporting errors; `None` leaves the position
    /// somewhere inside the attempt, so callers restore it themselves.
    pub(crate) fn type_ref(&mut self) -> Option<TypeRef> {
        if !self.at_ident() {
            return None;
        }
        let text = self.text_at(0);
        if (text != "void" && super::RESERVED.contains(&text)) || text == "await" {
            return None;
        }
        if text == "Function" {
            return self.function_type(None);
        }
        let first = self.name_any()?;
        let (prefix, name) = if self.at(".") && self.tok_at(1).kind == TokenKind::Ident {
            self.bump();
            (Some(first), self.name_any()?)
        } else {
            (None, first)
        };
        let args = if self.at("<") { self.type_args()? } else { Vec::new() };
        self.eat("?");
        let mut ty = TypeRef {
            prefix,
            name,
            args,
            function_params: Vec::new(),
        };
        while self.at("Function") && (self.at_n(1, "(") || self.at_n(1, "<")) {
            ty = self.function_type(Some(ty))?;
        }
        Some(ty)
    }

    fn function_type(&mut self, return_type: Option<TypeRef>) -> Option<TypeRef> {
        let keyword = self.name_any()?;
        if self.at("<") {
            self.type_params();
        }
        if !self.eat("(") {
            // Bare `Function`.
            self.eat("?");
            return Some(TypeRef {
                prefix: None,
                name: keyword,
                args: return_type.into_iter().collect(),
                function_params: Vec::new(),
            });
        }
        let mut function_params = Vec::new();
        loop {
            if self.eat(")") {
                break;
            }
            if self.eat("{") || self.eat("[") || self.eat("}") || self.eat("]") || self.eat(",") {
                continue;
            }
            self.eat("required");
            let before = self.pos;
            let ty = self.type_ref()?;
            function_params.push(ty);
            if self.at_ident() {
                self.bump();
            }
            if self.pos == before || self.at_eof() {
                return None;
            }
        }
        self.eat("?");
        Some(TypeRef {
            prefix: None,
            name: keyword,
            args: return_type.into_iter().collect(),
            function_params,
        })
    }

    pub(crate) fn type_args(&mut self) -> Option<Vec<TypeRef>> {
        if !self.eat("<") {
            return None;
        }
        let mut args = Vec::new();
        loop {
            args.push(self.type_ref()?);
            if !self.eat(",") {
                break;
            }
        }
        self.eat(">").then_some(args)
    }
}

fn unquote(literal: &str) -> &str {
    let literal = literal.strip_prefix('r').unwrap_or(literal);
    for quote in ["'''", "\"\"\"", "'", "\""] {
        if let Some(inner) = literal
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    literal
}
