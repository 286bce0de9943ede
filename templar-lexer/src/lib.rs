use logos::Logos;

mod scanner;

pub use scanner::{ActionScanner, LineIndex, RawAction};

/// Decode the escape sequences a template string literal may carry.
/// Unrecognized escapes pass through unchanged.
fn unescape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(idx) = rest.find('\\') {
        out.push_str(&rest[..idx]);
        let mut tail = rest[idx + 1..].chars();
        match tail.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
        rest = tail.as_str();
    }

    out.push_str(rest);
    out
}

/// Token types for template action expressions
///
/// Keywords (`if`, `range`, `end`, ...) are ordinary identifiers; the action
/// parser classifies them by position.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token("|")]
    Pipe,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(":=")]
    Declare,
    #[token("=")]
    Assign,

    // Dot path: `.`, `.Field`, `.Field.Sub`
    #[regex(r"\.([A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*)?", |lex| lex.slice().to_string())]
    DotPath(String),

    // Dollar variable with optional path: `$`, `$v`, `$v.Field`, `$.Field`
    #[regex(r"\$[A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*", |lex| lex.slice().to_string())]
    Dollar(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len()-1])
    })]
    Str(String),

    // Raw string literal (backticks)
    #[regex(r"`[^`]*`", |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    RawStr(String),

    #[regex(r"-?[0-9]+(\.[0-9]+)?", |lex| lex.slice().to_string())]
    Number(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpan {
    pub token: Token,
    /// Byte range relative to the action content the lexer was given.
    pub span: std::ops::Range<usize>,
}

pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
        }
    }
}

impl<'source> Iterator for Lexer<'source> {
    type Item = Result<TokenSpan, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.inner.next()?;
        let span = self.inner.span();

        match token {
            Ok(tok) => Some(Ok(TokenSpan { token: tok, span })),
            Err(_) => Some(Err(LexError::InvalidToken { span })),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LexError {
    #[error("Invalid token at {span:?}")]
    InvalidToken { span: std::ops::Range<usize> },
    #[error("Unclosed action starting at line {line}")]
    UnclosedAction { line: u32 },
}
