use super::Parser;
use super::ast::*;
use super::lexer::TokenKind;

impl Parser<'_> {
    pub(crate) fn block(&mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        if !self.expect("{") {
            return stmts;
        }
        while !self.at("}") && !self.at_eof() && self.fatal.is_none() {
            let before = self.pos;
            if let Some(stmt) = self.statement() {
                stmts.push(stmt);
            }
            if self.pos == before {
                self.error("unexpected token");
                self.bump();
            }
        }
        self.expect("}");
        stmts
    }

    fn statement(&mut self) -> Option<Stmt> {
        if !self.enter() {
            return None;
        }
        let stmt = self.statement_inner();
        self.leave();
        stmt
    }

    fn sub_statement(&mut self) -> Box<Stmt> {
        Box::new(self.statement().unwrap_or(Stmt::Empty))
    }

    fn statement_inner(&mut self) -> Option<Stmt> {
        self.skip_annotations();
        match self.text_at(0) {
            "{" => return Some(Stmt::Block(self.block())),
            ";" => {
                self.bump();
                return Some(Stmt::Empty);
            }
            "return" => {
                self.bump();
                if self.eat(";") {
                    return Some(Stmt::Return(None));
                }
                let value = self.expr();
                self.expect(";");
                return Some(Stmt::Return(Some(value)));
            }
            "if" => {
                self.bump();
                self.expect("(");
                let cond = self.expr();
                self.expect(")");
                let then = self.sub_statement();
                let otherwise = self.eat("else").then(|| self.sub_statement());
                return Some(Stmt::If {
                    cond,
                    then,
                    otherwise,
                });
            }
            "while" => {
                self.bump();
                self.expect("(");
                let cond = self.expr();
                self.expect(")");
                let body = self.sub_statement();
                return Some(Stmt::While { cond, body });
            }
            "do" => {
                self.bump();
                let body = self.sub_statement();
                self.expect("while");
                self.expect("(");
                let cond = self.expr();
                self.expect(")");
                self.expect(";");
                return Some(Stmt::DoWhile { body, cond });
            }
            "for" => return Some(self.for_statement()),
            "switch" if self.at_n(1, "(") => return Some(self.switch_statement()),
            "try" => return Some(self.try_statement()),
            "break" | "continue" => {
                let is_break = self.at("break");
                self.bump();
                let label = self.name();
                self.expect(";");
                return Some(if is_break {
                    Stmt::Break(label)
                } else {
                    Stmt::Continue(label)
                });
            }
            "assert" => {
                self.bump();
                let args = self.arguments();
                self.expect(";");
                return Some(Stmt::Expr(Expr::Collection {
                    type_args: Vec::new(),
                    elements: args.into_iter().map(|a| a.value).collect(),
                }));
            }
            "yield" => {
                self.bump();
                self.eat("*");
                let value = self.expr();
                self.expect(";");
                return Some(Stmt::Expr(value));
            }
            "rethrow" => {
                self.bump();
                self.expect(";");
                return Some(Stmt::Empty);
            }
            "var" | "final" | "late" => {
                let decl = self.local_variables()?;
                self.expect(";");
                return Some(Stmt::Variables(decl));
            }
            "const" if self.tok_at(1).kind == TokenKind::Ident && !self.at_n(2, "(") => {
                let decl = self.local_variables()?;
                self.expect(";");
                return Some(Stmt::Variables(decl));
            }
            _ => {}
        }

        if self.at_name() && self.at_n(1, ":") {
            let label = self.name()?;
            self.bump();
            let body = self.sub_statement();
            return Some(Stmt::Labeled { label, body });
        }
        if let Some(function) = self.local_function() {
            return Some(Stmt::LocalFunction(function));
        }
        if let Some(decl) = self.typed_local_variables() {
            self.expect(";");
            return Some(Stmt::Variables(decl));
        }
        let value = self.expr();
        self.expect(";");
        Some(Stmt::Expr(value))
    }

    /// `var`/`final`/`const`/`late` declarations, type optional.
    fn local_variables(&mut self) -> Option<VariablesDecl> {
        let start = self.tok().start;
        while matches!(self.text_at(0), "var" | "final" | "const" | "late") {
            self.bump();
        }
        let ty = self.type_before_name();
        let name = self.expect_name()?;
        let vars = self.var_list(name);
        Some(VariablesDecl {
            ty,
            is_static: false,
            vars,
            span: Span {
                start,
                end: self.prev_end(),
            },
        })
    }

    /// `Type name = ...` without a leading keyword; nothing is consumed when
    /// the statement turns out to be an expression.
    fn typed_local_variables(&mut self) -> Option<VariablesDecl> {
        let save = self.pos;
        let start = self.tok().start;
        if let Some(ty) = self.type_ref() {
            if self.at_name() && matches!(self.text_at(1), "=" | ";" | ",") {
                if let Some(name) = self.name() {
                    let vars = self.var_list(name);
                    return Some(VariablesDecl {
                        ty: Some(ty),
                        is_static: false,
                        vars,
                        span: Span {
                            start,
                            end: self.prev_end(),
                        },
                    });
                }
            }
        }
        self.pos = save;
        None
    }

    fn local_function(&mut self) -> Option<FunctionDecl> {
        let save = self.pos;
        let start = self.tok().start;
        let return_type = self.type_before_name();
        if self.at_name() && (self.at_n(1, "(") || self.at_n(1, "<")) {
            if let Some(name) = self.name() {
                let type_params = self.type_params();
                let is_function = self.at("(")
                    && self.matching_close(self.pos).is_some_and(|close| {
                        let last = self.tokens.len() - 1;
                        let after = self.text_of(self.tokens[(close + 1).min(last)]);
                        matches!(after, "{" | "=>" | "async" | "sync")
                    });
                if is_function {
                    let (params, params_span) = self.params();
                    let body = self.function_body();
                    return Some(FunctionDecl {
                        kind: FunctionKind::Function,
                        name,
                        return_type,
                        type_params,
                        params,
                        params_span: Some(params_span),
                        body,
                        is_static: false,
                        span: Span {
                            start,
                            end: self.prev_end(),
                        },
                    });
                }
            }
        }
        self.pos = save;
        None
    }

    fn for_statement(&mut self) -> Stmt {
        self.bump();
        self.eat("await");
        self.expect("(");

        let save = self.pos;
        while matches!(self.text_at(0), "var" | "final" | "const" | "late") {
            self.bump();
        }
        let ty = self.type_before_name();
        if self.at_name() && self.at_n(1, "in") {
            if let Some(name) = self.name() {
                let declared = ty.is_some() || save != self.pos - 1;
                self.bump();
                let iterable = self.expr();
                self.expect(")");
                let body = self.sub_statement();
                let var = if declared {
                    ForInVar::Declared { ty, name }
                } else {
                    ForInVar::Existing(Expr::Ident(name))
                };
                return Stmt::ForIn {
                    var,
                    iterable,
                    body,
                };
            }
        }
        self.pos = save;

        let init = if self.eat(";") {
            None
        } else {
            let init = if matches!(self.text_at(0), "var" | "final" | "const" | "late") {
                self.local_variables().map(Stmt::Variables)
            } else if let Some(decl) = self.typed_local_variables() {
                Some(Stmt::Variables(decl))
            } else {
                Some(Stmt::Expr(self.expr()))
            };
            self.expect(";");
            init.map(Box::new)
        };
        let cond = if self.at(";") { None } else { Some(self.expr()) };
        self.expect(";");
        let mut updates = Vec::new();
        while !self.at(")") && !self.at_eof() {
            updates.push(self.expr());
            if !self.eat(",") {
                break;
            }
        }
        self.expect(")");
        let body = self.sub_statement();
        Stmt::For {
            init,
            cond,
            updates,
            body,
        }
    }

    fn switch_statement(&mut self) -> Stmt {
        self.bump();
        self.expect("(");
        let subject = self.expr();
        self.expect(")");
        let mut cases = Vec::new();
        if !self.expect("{") {
            return Stmt::Switch { subject, cases };
        }
        while !self.at("}") && !self.at_eof() && self.fatal.is_none() {
            let mut labels = Vec::new();
            while self.at_name() && self.at_n(1, ":") {
                if let Some(label) = self.name() {
                    labels.push(label);
                }
                self.bump();
            }
            let pattern = if self.eat("case") {
                let pattern = self.expr();
                let pattern = if self.eat("when") {
                    let guard = self.expr();
                    Expr::Collection {
                        type_args: Vec::new(),
                        elements: vec![pattern, guard],
                    }
                } else {
                    pattern
                };
                Some(pattern)
            } else if self.eat("default") {
                None
            } else {
                self.error("expected `case` or `default`");
                self.bump();
                continue;
            };
            self.expect(":");
            let mut body = Vec::new();
            while !matches!(self.text_at(0), "case" | "default" | "}") && !self.at_eof() {
                let before = self.pos;
                if let Some(stmt) = self.statement() {
                    body.push(stmt);
                }
                if self.pos == before {
                    self.error("unexpected token");
                    self.bump();
                }
            }
            cases.push(SwitchCase {
                labels,
                pattern,
                body,
            });
        }
        self.expect("}");
        Stmt::Switch { subject, cases }
    }

    fn try_statement(&mut self) -> Stmt {
        self.bump();
        let body = self.block();
        let mut catches = Vec::new();
        loop {
            let on = if self.eat("on") { self.type_ref() } else { None };
            let (mut exception, mut stack) = (None, None);
            if self.eat("catch") {
                self.expect("(");
                exception = self.expect_name();
                if self.eat(",") {
                    stack = self.expect_name();
                }
                self.expect(")");
            } else if on.is_none() {
                break;
            }
            let body = self.block();
            catches.push(CatchClause {
                on,
                exception,
                stack,
                body,
            });
        }
        let finally = self.eat("finally").then(|| self.block());
        Stmt::Try {
            body,
            catches,
            finally,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse_ok;
    use super::*;

    fn body_of(source: &str) -> Vec<Stmt> {
        let mut unit = parse_ok(source);
        match unit.declarations.remove(0) {
            Declaration::Function(FunctionDecl {
                body: Body::Block(stmts),
                ..
            }) => stmts,
            other => panic!("expected a function with a block body, got {other:?}"),
        }
    }

    #[test]
    fn test_declarations_versus_expressions() {
        let stmts =
            body_of("void f() { A a = A(); var b = 1; a = b; foo(a); List<int> xs; x.y = 2; }");
        assert!(matches!(&stmts[0], Stmt::Variables(v) if v.ty.is_some()));
        assert!(matches!(&stmts[1], Stmt::Variables(v) if v.ty.is_none()));
        assert!(matches!(&stmts[2], Stmt::Expr(Expr::Assign { .. })));
        assert!(matches!(&stmts[3], Stmt::Expr(Expr::Call { .. })));
        assert!(matches!(&stmts[4], Stmt::Variables(_)));
        assert!(matches!(&stmts[5], Stmt::Expr(Expr::Assign { .. })));
    }

    #[test]
    fn test_local_function_and_call_statement() {
        let stmts = body_of("void f() { int g(int x) => x; g(1); h() {} }");
        assert!(matches!(&stmts[0], Stmt::LocalFunction(g) if g.name.name == "g"));
        assert!(matches!(&stmts[1], Stmt::Expr(Expr::Call { .. })));
        assert!(matches!(&stmts[2], Stmt::LocalFunction(h) if h.return_type.is_none()));
    }

    #[test]
    fn test_control_flow() {
        let stmts = body_of(
            r#"void f() {
  for (var i = 0; i < 3; i++) {}
  for (final x in xs) {}
  for (y in ys) {}
  while (a) { break; }
  do { continue; } while (b);
  outer: for (;;) { break outer; }
  switch (v) { case 1: g(); default: h(); }
  try { g(); } on FormatException catch (e, s) { } catch (e) { } finally { }
  if (a) g(); else h();
}"#,
        );
        assert!(matches!(&stmts[0], Stmt::For { init: Some(_), cond: Some(_), .. }));
        assert!(matches!(
            &stmts[1],
            Stmt::ForIn { var: ForInVar::Declared { .. }, .. }
        ));
        assert!(matches!(
            &stmts[2],
            Stmt::ForIn { var: ForInVar::Existing(_), .. }
        ));
        assert!(matches!(&stmts[3], Stmt::While { .. }));
        assert!(matches!(&stmts[4], Stmt::DoWhile { .. }));
        assert!(matches!(&stmts[5], Stmt::Labeled { label, .. } if label.name == "outer"));
        assert!(matches!(&stmts[6], Stmt::Switch { cases, .. } if cases.len() == 2));
        assert!(matches!(
            &stmts[7],
            Stmt::Try { catches, finally: Some(_), .. } if catches.len() == 2
        ));
        assert!(matches!(&stmts[8], Stmt::If { otherwise: Some(_), .. }));
    }
}
