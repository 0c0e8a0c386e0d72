//! Token stream for the parser, derived with `logos`.
//!
//! Keywords come out as identifiers; the parser decides by text.

use logos::Logos;
use refscope_plugin::SyntaxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    String,
    Punct,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, thiserror::Error)]
pub enum LexError {
    #[default]
    #[error("unexpected character")]
    UnexpectedCharacter,
    #[error("unterminated comment")]
    UnterminatedComment,
    #[error("unterminated string")]
    UnterminatedString,
}

/// `>>` is never a token so nested type arguments close one at a time.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(error = LexError)]
#[logos(skip r"[ \t\r\n\f]+")]
enum RawToken {
    #[regex(r"//[^\n]*")]
    #[token("/*", block_comment)]
    Comment,

    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*")]
    Ident,

    #[regex(r"0[xX][0-9a-fA-F]+")]
    #[regex(r"[0-9][0-9_]*(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?")]
    Number,

    #[token("'", |lex| string(lex, b'\'', Quoting::Single))]
    #[token("\"", |lex| string(lex, b'"', Quoting::Single))]
    #[token("'''", |lex| string(lex, b'\'', Quoting::Triple))]
    #[token("\"\"\"", |lex| string(lex, b'"', Quoting::Triple))]
    #[token("r'", |lex| string(lex, b'\'', Quoting::RawSingle))]
    #[token("r\"", |lex| string(lex, b'"', Quoting::RawSingle))]
    #[token("r'''", |lex| string(lex, b'\'', Quoting::RawTriple))]
    #[token("r\"\"\"", |lex| string(lex, b'"', Quoting::RawTriple))]
    String,

    #[token("...?")]
    #[token("~/=")]
    #[token("??=")]
    #[token("<<=")]
    #[token("&&=")]
    #[token("||=")]
    #[token("...")]
    #[token("?..")]
    #[token("==")]
    #[token("!=")]
    #[token("<=")]
    #[token(">=")]
    #[token("&&")]
    #[token("||")]
    #[token("??")]
    #[token("?.")]
    #[token("..")]
    #[token("=>")]
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    #[token("++")]
    #[token("--")]
    #[token("<<")]
    #[token("~/")]
    #[token("{")]
    #[token("}")]
    #[token("(")]
    #[token(")")]
    #[token("[")]
    #[token("]")]
    #[token("<")]
    #[token(">")]
    #[token(";")]
    #[token(",")]
    #[token(".")]
    #[token("?")]
    #[token(":")]
    #[token("=")]
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("%")]
    #[token("!")]
    #[token("&")]
    #[token("|")]
    #[token("^")]
    #[token("~")]
    #[token("@")]
    #[token("#")]
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quoting {
    Single,
    Triple,
    RawSingle,
    RawTriple,
}

impl Quoting {
    fn triple(self) -> bool {
        matches!(self, Quoting::Triple | Quoting::RawTriple)
    }

    fn raw(self) -> bool {
        matches!(self, Quoting::RawSingle | Quoting::RawTriple)
    }
}

// Comments nest. Scanning is over bytes; every stop lands on an ASCII byte.
fn block_comment(lex: &mut logos::Lexer<RawToken>) -> Result<(), LexError> {
    let rest = lex.remainder().as_bytes();
    let mut depth = 1;
    let mut pos = 0;
    while pos < rest.len() {
        if rest[pos..].starts_with(b"/*") {
            depth += 1;
            pos += 2;
        } else if rest[pos..].starts_with(b"*/") {
            depth -= 1;
            pos += 2;
            if depth == 0 {
                lex.bump(pos);
                return Ok(());
            }
        } else {
            pos += 1;
        }
    }
    lex.bump(rest.len());
    Err(LexError::UnterminatedComment)
}

fn string(lex: &mut logos::Lexer<RawToken>, quote: u8, quoting: Quoting) -> Result<(), LexError> {
    let rest = lex.remainder().as_bytes();
    match string_body(rest, quote, quoting) {
        Ok(len) => {
            lex.bump(len);
            Ok(())
        }
        Err(len) => {
            lex.bump(len);
            Err(LexError::UnterminatedString)
        }
    }
}

/// Length of a string body up to and including its closing quote. `Err`
/// carries the length consumed before giving up.
///
/// Interpolations stay inside the string; their contents are not bound.
fn string_body(rest: &[u8], quote: u8, quoting: Quoting) -> Result<usize, usize> {
    let closer = [quote; 3];
    let mut pos = 0;
    while pos < rest.len() {
        let c = rest[pos];
        if !quoting.raw() && c == b'\\' {
            pos += 2;
            continue;
        }
        if !quoting.raw() && c == b'$' && rest.get(pos + 1) == Some(&b'{') {
            pos = interpolation(rest, pos + 2);
            continue;
        }
        if c == b'\n' && !quoting.triple() {
            return Err(pos);
        }
        if c == quote {
            if !quoting.triple() {
                return Ok(pos + 1);
            }
            if rest[pos..].starts_with(&closer) {
                return Ok(pos + 3);
            }
        }
        pos += 1;
    }
    Err(rest.len())
}

fn interpolation(rest: &[u8], mut pos: usize) -> usize {
    let mut depth = 1;
    while pos < rest.len() {
        match rest[pos] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return pos + 1;
                }
            }
            quote @ (b'\'' | b'"') => {
                let quoting = if rest[pos..].starts_with(&[quote; 3]) {
                    Quoting::Triple
                } else {
                    Quoting::Single
                };
                pos += if quoting.triple() { 3 } else { 1 };
                pos += match string_body(&rest[pos..], quote, quoting) {
                    Ok(len) | Err(len) => len,
                };
                continue;
            }
            _ => {}
        }
        pos += 1;
    }
    rest.len()
}

pub struct Lexer<'a> {
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src }
    }

    /// Tokens end with a single `Eof`. An unterminated string still yields
    /// its token so the parser sees a literal where one was started.
    pub fn tokenize(self) -> (Vec<Token>, Vec<SyntaxError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        let mut lex = RawToken::lexer(self.src);
        while let Some(result) = lex.next() {
            let span = lex.span();
            let kind = match result {
                Ok(RawToken::Comment) => continue,
                Ok(RawToken::Ident) => TokenKind::Ident,
                Ok(RawToken::Number) => TokenKind::Number,
                Ok(RawToken::String) => TokenKind::String,
                Ok(RawToken::Punct) => TokenKind::Punct,
                Err(error) => {
                    errors.push(SyntaxError::new(span.start, error.to_string()));
                    match error {
                        LexError::UnterminatedString => TokenKind::String,
                        _ => continue,
                    }
                }
            };
            tokens.push(Token {
                kind,
                start: span.start,
                end: span.end,
            });
        }
        let end = self.src.len();
        tokens.push(Token {
            kind: TokenKind::Eof,
            start: end,
            end,
        });
        (tokens, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(src: &str) -> Vec<&str> {
        let (tokens, errors) = Lexer::new(src).tokenize();
        assert!(errors.is_empty(), "{errors:?}");
        tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| &src[t.start..t.end])
            .collect()
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(texts("a /* b /* c */ */ d // e\nf"), vec!["a", "d", "f"]);
    }

    #[test]
    fn test_non_ascii_text_in_comments_and_strings() {
        let src = "/* café © 2024 */\nvar s = 'naïve ${x} ✓'; // ünïcode\nclass A {}";
        assert_eq!(
            texts(src),
            vec!["var", "s", "=", "'naïve ${x} ✓'", ";", "class", "A", "{", "}"]
        );
    }

    #[test]
    fn test_non_ascii_outside_strings_is_an_error() {
        let (tokens, errors) = Lexer::new("var é = 1;").tokenize();
        assert!(!errors.is_empty());
        assert_eq!(errors[0].offset, 4);
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Number));
    }

    #[test]
    fn test_nested_type_arguments_keep_single_closers() {
        assert_eq!(
            texts("List<List<int>> x;"),
            vec!["List", "<", "List", "<", "int", ">", ">", "x", ";"]
        );
    }

    #[test]
    fn test_strings_with_interpolation_are_one_token() {
        assert_eq!(
            texts(r#"x = "a ${b("}")} c" + r'\d' + '''m'n''';"#),
            vec!["x", "=", r#""a ${b("}")} c""#, "+", r"r'\d'", "+", "'''m'n'''", ";"]
        );
    }

    #[test]
    fn test_longest_punctuation_wins() {
        assert_eq!(texts("a ??= b?.c..d"), vec!["a", "??=", "b", "?.", "c", "..", "d"]);
        assert_eq!(texts("1.5e3 .5 0xFF"), vec!["1.5e3", ".5", "0xFF"]);
    }

    #[test]
    fn test_unterminated_string_is_reported() {
        let (tokens, errors) = Lexer::new("x = 'abc\n;").tokenize();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].offset, 4);
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!((tokens[2].start, tokens[2].end), (4, 8));
    }

    #[test]
    fn test_unterminated_comment_is_reported() {
        let (tokens, errors) = Lexer::new("a /* é").tokenize();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "unterminated comment");
        assert_eq!(tokens.len(), 2);
    }
}
