use super::Parser;
use super::ast::*;
use super::lexer::TokenKind;

impl Parser<'_> {
    pub(crate) fn expr(&mut self) -> Expr {
        if !self.enter() {
            return Expr::Literal;
        }
        let expr = self.expr_inner();
        self.leave();
        expr
    }

    fn expr_inner(&mut self) -> Expr {
        if self.eat("throw") {
            return Expr::Wrapped(Box::new(self.expr()));
        }
        let target = self.conditional();
        if let Some(kind) = self.assignment_op() {
            self.bump();
            let value = self.expr();
            return Expr::Assign {
                target: Box::new(target),
                kind,
                value: Some(Box::new(value)),
            };
        }
        if self.at("..") || self.at("?..") {
            let mut sections = Vec::new();
            while self.eat("..") || self.eat("?..") {
                sections.push(self.cascade_section());
            }
            return Expr::Cascade {
                target: Box::new(target),
                sections,
            };
        }
        target
    }

    fn assignment_op(&self) -> Option<AssignKind> {
        match self.text_at(0) {
            "=" => Some(AssignKind::Plain),
            "+=" | "-=" | "*=" | "/=" | "%=" | "~/=" | "??=" | "<<=" | "&=" | "|=" | "^="
            | "&&=" | "||=" => Some(AssignKind::Compound),
            _ => None,
        }
    }

    fn cascade_section(&mut self) -> Expr {
        let receiver = Box::new(Expr::CascadeReceiver);
        let mut section = if self.eat("[") {
            let index = self.expr();
            self.expect("]");
            Expr::Index {
                target: receiver,
                index: Box::new(index),
            }
        } else {
            match self.name_any() {
                Some(name) => Expr::Member {
                    target: receiver,
                    name,
                },
                None => {
                    self.error("expected a cascade selector");
                    return Expr::CascadeReceiver;
                }
            }
        };
        section = self.postfix_tail(section);
        if let Some(kind) = self.assignment_op() {
            self.bump();
            let value = self.conditional();
            section = Expr::Assign {
                target: Box::new(section),
                kind,
                value: Some(Box::new(value)),
            };
        }
        section
    }

    fn conditional(&mut self) -> Expr {
        let cond = self.binary(1);
        if !self.eat("?") {
            return cond;
        }
        let then = self.expr();
        self.expect(":");
        let otherwise = self.expr();
        Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Precedence and token width of the binary operator at the cursor.
    fn binary_op(&self) -> Option<(u8, usize)> {
        let token = self.tok();
        if token.kind != TokenKind::Punct {
            return None;
        }
        Some(match self.text_of(token) {
            "??" => (1, 1),
            "||" => (2, 1),
            "&&" => (3, 1),
            "==" | "!=" => (4, 1),
            ">" if self.at_n(1, ">") && self.tok_at(1).start == token.end => (9, 2),
            "<" | ">" | "<=" | ">=" => (5, 1),
            "|" => (6, 1),
            "^" => (7, 1),
            "&" => (8, 1),
            "<<" => (9, 1),
            "+" | "-" => (10, 1),
            "*" | "/" | "%" | "~/" => (11, 1),
            _ => return None,
        })
    }

    fn binary(&mut self, min: u8) -> Expr {
        let mut left = self.unary();
        loop {
            if (self.at("is") || self.at("as")) && min <= 5 {
                let is_cast = self.at("as");
                self.bump();
                self.eat("!");
                let Some(ty) = self.type_ref() else {
                    self.error("expected a type");
                    break;
                };
                left = if is_cast {
                    Expr::As {
                        expr: Box::new(left),
                        ty,
                    }
                } else {
                    Expr::Is {
                        expr: Box::new(left),
                        ty,
                    }
                };
                continue;
            }
            let Some((prec, width)) = self.binary_op() else {
                break;
            };
            if prec < min {
                break;
            }
            for _ in 0..width {
                self.bump();
            }
            let right = self.binary(prec + 1);
            left = Expr::Binary {
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        left
    }

    fn unary(&mut self) -> Expr {
        if !self.enter() {
            return Expr::Literal;
        }
        let expr = match self.text_at(0) {
            "-" | "!" | "~" if self.tok().kind == TokenKind::Punct => {
                self.bump();
                Expr::Unary(Box::new(self.unary()))
            }
            "++" | "--" => {
                self.bump();
                Expr::Assign {
                    target: Box::new(self.unary()),
                    kind: AssignKind::Compound,
                    value: None,
                }
            }
            "await" if !matches!(self.text_at(1), ";" | ")" | "," | "=" | ".") => {
                self.bump();
                Expr::Wrapped(Box::new(self.unary()))
            }
            _ => {
                let primary = self.primary();
                self.postfix_tail(primary)
            }
        };
        self.leave();
        expr
    }

    fn postfix_tail(&mut self, mut expr: Expr) -> Expr {
        loop {
            if self.at(".") || self.at("?.") {
                self.bump();
                let Some(name) = self.name_any() else {
                    self.error("expected a member name");
                    break;
                };
                expr = Expr::Member {
                    target: Box::new(expr),
                    name,
                };
            } else if self.at("!") {
                self.bump();
                expr = Expr::Wrapped(Box::new(expr));
            } else if self.at("(") {
                let args = self.arguments();
                expr = Expr::Call {
                    callee: Box::new(expr),
                    type_args: Vec::new(),
                    args,
                };
            } else if self.at("<") {
                let save = self.pos;
                match self.type_args() {
                    Some(type_args) if self.at("(") => {
                        let args = self.arguments();
                        expr = Expr::Call {
                            callee: Box::new(expr),
                            type_args,
                            args,
                        };
                    }
                    _ => {
                        self.pos = save;
                        break;
                    }
                }
            } else if self.at("[") {
                self.bump();
                let index = self.expr();
                self.expect("]");
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.at("++") || self.at("--") {
                self.bump();
                expr = Expr::Assign {
                    target: Box::new(expr),
                    kind: AssignKind::Compound,
                    value: None,
                };
            } else {
                break;
            }
        }
        expr
    }

    pub(crate) fn arguments(&mut self) -> Vec<Argument> {
        let mut args = Vec::new();
        if !self.expect("(") {
            return args;
        }
        while !self.at(")") && !self.at_eof() {
            let before = self.pos;
            let label = if self.at_ident() && self.at_n(1, ":") {
                let label = self.name_any();
                self.bump();
                label
            } else {
                None
            };
            let value = self.expr();
            args.push(Argument { label, value });
            if !self.eat(",") {
                break;
            }
            if self.pos == before {
                self.bump();
            }
        }
        self.expect(")");
        args
    }

    fn primary(&mut self) -> Expr {
        let token = self.tok();
        match token.kind {
            TokenKind::Number => {
                self.bump();
                return Expr::Literal;
            }
            TokenKind::String => {
                while self.tok().kind == TokenKind::String {
                    self.bump();
                }
                return Expr::Literal;
            }
            TokenKind::Eof => {
                self.error("expected an expression");
                return Expr::Literal;
            }
            TokenKind::Punct => return self.punct_primary(),
            TokenKind::Ident => {}
        }

        match self.text_of(token) {
            "true" | "false" | "null" => {
                self.bump();
                Expr::Literal
            }
            "this" => {
                self.bump();
                Expr::This(token.start)
            }
            "super" => {
                self.bump();
                Expr::Super(token.start)
            }
            "new" | "const" => {
                self.bump();
                if self.at("[") || self.at("{") || self.at("<") || self.at("(") {
                    return self.punct_primary();
                }
                let Some(ty) = self.type_ref() else {
                    self.error("expected a type");
                    return Expr::Literal;
                };
                let constructor = if self.eat(".") { self.name_any() } else { None };
                let args = if self.at("(") {
                    self.arguments()
                } else {
                    Vec::new()
                };
                Expr::New {
                    ty,
                    constructor,
                    args,
                }
            }
            "switch" if self.at_n(1, "(") => {
                self.bump();
                self.skip_balanced();
                if self.at("{") {
                    self.skip_balanced();
                }
                Expr::Literal
            }
            text if super::RESERVED.contains(&text) => {
                self.error("expected an expression");
                Expr::Literal
            }
            _ => match self.name_any() {
                Some(name) => Expr::Ident(name),
                None => Expr::Literal,
            },
        }
    }

    fn punct_primary(&mut self) -> Expr {
        match self.text_at(0) {
            "(" if self.is_function_literal() => self.function_literal(),
            "(" => {
                self.bump();
                if self.eat(")") {
                    return Expr::Literal;
                }
                let first = self.expr();
                if !self.at(",") {
                    self.expect(")");
                    return Expr::Wrapped(Box::new(first));
                }
                let mut elements = vec![first];
                while self.eat(",") && !self.at(")") {
                    elements.push(self.expr());
                }
                self.expect(")");
                Expr::Collection {
                    type_args: Vec::new(),
                    elements,
                }
            }
            "[" => self.collection("]", Vec::new()),
            "{" => self.collection("}", Vec::new()),
            "<" => {
                let save = self.pos;
                match self.type_args() {
                    Some(type_args) if self.at("[") => self.collection("]", type_args),
                    Some(type_args) if self.at("{") => self.collection("}", type_args),
                    _ => {
                        self.pos = save;
                        self.error("expected an expression");
                        Expr::Literal
                    }
                }
            }
            "#" => {
                self.bump();
                self.bump();
                while self.at(".") && self.tok_at(1).kind == TokenKind::Ident {
                    self.bump();
                    self.bump();
                }
                Expr::Literal
            }
            _ => {
                self.error("expected an expression");
                Expr::Literal
            }
        }
    }

    fn is_function_literal(&self) -> bool {
        let Some(close) = self.matching_close(self.pos) else {
            return false;
        };
        let after = |ahead: usize| {
            let index = (close + ahead).min(self.tokens.len() - 1);
            self.text_of(self.tokens[index])
        };
        match after(1) {
            "=>" | "{" => true,
            "async" | "sync" => matches!(after(2), "=>" | "{" | "*"),
            _ => false,
        }
    }

    fn function_literal(&mut self) -> Expr {
        let start = self.tok().start;
        let (params, _) = self.params();
        while self.at("async") || self.at("sync") {
            self.bump();
            self.eat("*");
        }
        let body = if self.at("{") {
            Body::Block(self.block())
        } else if self.eat("=>") {
            Body::Expr(self.expr())
        } else {
            self.error("expected a function body");
            Body::None
        };
        Expr::Function {
            params,
            body: Box::new(body),
            span: Span {
                start,
                end: self.prev_end(),
            },
        }
    }

    fn collection(&mut self, close: &str, type_args: Vec<TypeRef>) -> Expr {
        self.bump();
        let mut elements = Vec::new();
        while !self.at(close) && !self.at_eof() && self.fatal.is_none() {
            let before = self.pos;
            self.collection_element(&mut elements);
            if !self.eat(",") {
                break;
            }
            if self.pos == before {
                self.bump();
            }
        }
        self.expect(close);
        Expr::Collection {
            type_args,
            elements,
        }
    }

    fn collection_element(&mut self, out: &mut Vec<Expr>) {
        if self.eat("...") || self.eat("...?") {
            out.push(self.expr());
            return;
        }
        if self.eat("if") {
            self.expect("(");
            out.push(self.expr());
            self.expect(")");
            self.collection_element(out);
            if self.eat("else") {
                self.collection_element(out);
            }
            return;
        }
        if self.at("for") && self.at_n(1, "(") {
            self.bump();
            self.skip_balanced();
            self.collection_element(out);
            return;
        }
        out.push(self.expr());
        if self.eat(":") {
            out.push(self.expr());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse_ok;
    use super::*;

    fn init_of(source: &str) -> Expr {
        let mut unit = parse_ok(source);
        match unit.declarations.remove(0) {
            Declaration::Variables(mut vars) => vars.vars.remove(0).init.unwrap(),
            other => panic!("expected variables, got {other:?}"),
        }
    }

    #[test]
    fn test_member_call_chain() {
        let expr = init_of("var x = a.b(1).c;");
        let Expr::Member { target, name } = expr else {
            panic!("expected a member access");
        };
        assert_eq!(name.name, "c");
        let Expr::Call { callee, args, .. } = *target else {
            panic!("expected a call");
        };
        assert_eq!(args.len(), 1);
        assert!(matches!(*callee, Expr::Member { ref name, .. } if name.name == "b"));
    }

    #[test]
    fn test_generic_call_versus_comparison() {
        assert!(matches!(
            init_of("var x = f<int>(1);"),
            Expr::Call { ref type_args, .. } if type_args.len() == 1
        ));
        assert!(matches!(init_of("var x = a < b;"), Expr::Binary { .. }));
        assert!(matches!(init_of("var x = a < b && c > d;"), Expr::Binary { .. }));
    }

    #[test]
    fn test_constructor_forms() {
        assert!(matches!(
            init_of("var x = const A.named(1);"),
            Expr::New { ref ty, constructor: None, .. } if ty.prefix.is_some()
        ));
        assert!(matches!(
            init_of("var x = new p.A.named();"),
            Expr::New { constructor: Some(_), .. }
        ));
        assert!(matches!(
            init_of("var x = A.new;"),
            Expr::Member { ref name, .. } if name.name == "new"
        ));
    }

    #[test]
    fn test_cascades_and_assignments() {
        let Expr::Cascade { sections, .. } = init_of("var x = A()..f = 1..g();") else {
            panic!("expected a cascade");
        };
        assert_eq!(sections.len(), 2);
        assert!(matches!(sections[0], Expr::Assign { kind: AssignKind::Plain, .. }));
        assert!(matches!(sections[1], Expr::Call { .. }));
        assert!(matches!(
            init_of("var x = y ??= 2;"),
            Expr::Assign { kind: AssignKind::Compound, .. }
        ));
    }

    #[test]
    fn test_function_literals_and_collections() {
        assert!(matches!(init_of("var f = (a, b) => a + b;"), Expr::Function { .. }));
        assert!(matches!(init_of("var f = (x) async { await x; };"), Expr::Function { .. }));
        assert!(matches!(init_of("var p = (a + b) * c;"), Expr::Binary { .. }));
        let Expr::Collection { elements, .. } =
            init_of("var m = <String, int>{'a': 1, ...other, if (c) 'b': 2};")
        else {
            panic!("expected a collection");
        };
        assert_eq!(elements.len(), 6);
    }

    #[test]
    fn test_conditional_and_type_tests() {
        assert!(matches!(init_of("var x = a ? b : c;"), Expr::Conditional { .. }));
        assert!(matches!(init_of("var x = a is! B;"), Expr::Is { .. }));
        assert!(matches!(init_of("var x = (a as B).c;"), Expr::Member { .. }));
        assert!(matches!(init_of("var x = a!.b;"), Expr::Member { .. }));
    }
}
