pub mod ast;
pub mod lexer;

mod decl;
mod expr;
mod stmt;

use ast::{CompilationUnit, Name};
use lexer::{Lexer, Token, TokenKind};
use refscope_api::models::Snapshot;
use refscope_plugin::{ParsedUnit, SyntaxError};
use smol_str::SmolStr;
use std::collections::HashSet;
use std::sync::Arc;

/// Nesting beyond this aborts the parse instead of recursing further.
const MAX_DEPTH: usize = 256;

/// Words that never start a name or a type.
const RESERVED: &[&str] = &[
    "assert", "break", "case", "catch", "class", "const", "continue", "default", "do", "else",
    "enum", "extends", "false", "final", "finally", "for", "if", "in", "is", "new", "null",
    "rethrow", "return", "super", "switch", "this", "throw", "true", "try", "var", "while",
    "with",
];

#[derive(Debug, Clone, Default)]
pub struct DartParser;

impl DartParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, snapshot: &Snapshot) -> Result<ParsedUnit, SyntaxError> {
        let (unit, errors, identifiers) = parse_source(snapshot.content.clone())?;
        let directives = unit.directives.iter().map(|(d, _)| d.clone()).collect();
        Ok(ParsedUnit {
            path: snapshot.path.clone(),
            stamp: snapshot.stamp,
            directives,
            errors,
            identifiers,
            tree: Arc::new(unit),
        })
    }
}

type ParseOutput = (CompilationUnit, Vec<SyntaxError>, Vec<SmolStr>);

/// Parse `source` into a tree, its recoverable errors and its identifiers.
pub fn parse_source(source: Arc<str>) -> Result<ParseOutput, SyntaxError> {
    let (tokens, mut errors) = Lexer::new(&source).tokenize();
    let mut parser = Parser::new(&source, &tokens);
    let mut unit = parser.compilation_unit();
    if let Some(offset) = parser.fatal {
        return Err(SyntaxError::new(offset, "nesting too deep"));
    }
    errors.append(&mut parser.errors);
    errors.sort_by_key(|e| e.offset);

    let mut seen = HashSet::new();
    let identifiers = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Ident)
        .map(|t| &source[t.start..t.end])
        .filter(|text| seen.insert(*text))
        .map(SmolStr::new)
        .collect();
    unit.source = source.clone();
    Ok((unit, errors, identifiers))
}

pub(crate) struct Parser<'a> {
    src: &'a str,
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    pub(crate) errors: Vec<SyntaxError>,
    pub(crate) fatal: Option<usize>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str, tokens: &'a [Token]) -> Self {
        Self {
            src,
            tokens,
            pos: 0,
            depth: 0,
            errors: Vec::new(),
            fatal: None,
        }
    }

    fn tok(&self) -> Token {
        self.tok_at(0)
    }

    fn tok_at(&self, ahead: usize) -> Token {
        let last = self.tokens.len().saturating_sub(1);
        self.tokens[(self.pos + ahead).min(last)]
    }

    fn text_of(&self, token: Token) -> &'a str {
        &self.src[token.start..token.end]
    }

    fn text_at(&self, ahead: usize) -> &'a str {
        let token = self.tok_at(ahead);
        match token.kind {
            TokenKind::Ident | TokenKind::Punct => self.text_of(token),
            _ => "",
        }
    }

    fn at(&self, text: &str) -> bool {
        self.text_at(0) == text
    }

    fn at_n(&self, ahead: usize, text: &str) -> bool {
        self.text_at(ahead) == text
    }

    fn at_eof(&self) -> bool {
        self.tok().kind == TokenKind::Eof
    }

    fn at_ident(&self) -> bool {
        self.tok().kind == TokenKind::Ident
    }

    fn at_name(&self) -> bool {
        self.at_ident() && !RESERVED.contains(&self.text_at(0))
    }

    fn bump(&mut self) -> Token {
        let token = self.tok();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.at(text) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> bool {
        if self.eat(text) {
            return true;
        }
        self.error(format!("expected `{text}`"));
        false
    }

    fn error(&mut self, message: impl Into<String>) {
        let offset = self.tok().start;
        if self.errors.last().is_some_and(|e| e.offset == offset) {
            return;
        }
        self.errors.push(SyntaxError::new(offset, message));
    }

    fn prev_end(&self) -> usize {
        match self.pos {
            0 => 0,
            pos => self.tokens[pos - 1].end,
        }
    }

    fn make_name(&self, token: Token) -> Name {
        Name {
            name: SmolStr::new(self.text_of(token)),
            offset: token.start,
        }
    }

    /// A non-reserved identifier.
    fn name(&mut self) -> Option<Name> {
        if !self.at_name() {
            return None;
        }
        let token = self.bump();
        Some(self.make_name(token))
    }

    fn expect_name(&mut self) -> Option<Name> {
        let name = self.name();
        if name.is_none() {
            self.error("expected a name");
        }
        name
    }

    /// Any identifier, reserved words included (`A.new`, `x.default`).
    fn name_any(&mut self) -> Option<Name> {
        if !self.at_ident() {
            return None;
        }
        let token = self.bump();
        Some(self.make_name(token))
    }

    fn enter(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            if self.fatal.is_none() {
                self.fatal = Some(self.tok().start);
            }
            self.pos = self.tokens.len().saturating_sub(1);
            return false;
        }
        self.depth += 1;
        true
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Index of the token closing the bracket at `open`.
    fn matching_close(&self, open: usize) -> Option<usize> {
        let (open_text, close_text) = match self.text_of(self.tokens[open]) {
            "(" => ("(", ")"),
            "[" => ("[", "]"),
            "{" => ("{", "}"),
            _ => return None,
        };
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            if token.kind != TokenKind::Punct {
                continue;
            }
            let text = self.text_of(*token);
            if text == open_text {
                depth += 1;
            } else if text == close_text {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
        }
        None
    }

    /// Skip a bracketed group starting at the current token.
    fn skip_balanced(&mut self) {
        match self.matching_close(self.pos) {
            Some(close) => self.pos = close + 1,
            None => {
                self.error("unbalanced brackets");
                self.pos = self.tokens.len().saturating_sub(1);
            }
        }
    }

    fn skip_annotations(&mut self) {
        while self.at("@") {
            self.bump();
            self.name_any();
            while self.at(".") {
                self.bump();
                self.name_any();
            }
            if self.at("<") {
                let save = self.pos;
                if self.type_args().is_none() {
                    self.pos = save;
                }
            }
            if self.at("(") {
                self.skip_balanced();
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn parse_ok(source: &str) -> CompilationUnit {
    let (unit, errors, _) = parse_source(source.into()).unwrap();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    unit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_are_deduplicated_in_order() {
        let (_, _, identifiers) = parse_source("class A { A a; void b() => a; }".into()).unwrap();
        assert_eq!(identifiers, vec!["class", "A", "a", "void", "b"]);
    }

    #[test]
    fn test_deep_nesting_is_fatal() {
        let source = format!("var x = {}1{};", "(".repeat(400), ")".repeat(400));
        let err = parse_source(source.into()).unwrap_err();
        assert_eq!(err.message, "nesting too deep");
    }
}
