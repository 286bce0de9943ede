//! Recursive-descent grammar for action expressions.
//!
//! ```text
//! pipeline := command ('|' command)*
//! command  := operand operand*            // args make it a call
//! operand  := ident | path | string | number | '(' pipeline ')' path?
//! ```
//!
//! Keywords have already been peeled off by the action parser; this grammar
//! only sees the expression part.

use templar_ast::template::{ExprNode, PathExpr, PathRoot};
use templar_lexer::{Lexer, Token, TokenSpan};

pub struct ExprParser {
    tokens: Vec<TokenSpan>,
    current: usize,
    /// Absolute byte offset of the text the tokens were lexed from.
    base: usize,
}

impl ExprParser {
    /// Tokenize `source`, an action fragment starting at absolute byte
    /// offset `base`.
    pub fn new(source: &str, base: usize) -> Result<Self, String> {
        let tokens: Result<Vec<_>, _> = Lexer::new(source).collect();
        let tokens = tokens.map_err(|e| e.to_string())?;
        Ok(Self {
            tokens,
            current: 0,
            base,
        })
    }

    /// Wrap an already tokenized fragment.
    pub fn from_tokens(tokens: Vec<TokenSpan>, base: usize) -> Self {
        Self {
            tokens,
            current: 0,
            base,
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|t| &t.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.current)
            .map(|t| self.base + t.span.start)
            .unwrap_or(self.base)
    }

    fn advance(&mut self) -> Option<&TokenSpan> {
        let span = self.tokens.get(self.current);
        if span.is_some() {
            self.current += 1;
        }
        span
    }

    /// Parse a full pipeline and require the input to be consumed.
    pub fn parse_all(&mut self) -> Result<ExprNode, String> {
        let expr = self.parse_pipeline()?;
        if !self.is_at_end() {
            return Err(format!("unexpected token {:?}", self.peek()));
        }
        Ok(expr)
    }

    pub fn parse_pipeline(&mut self) -> Result<ExprNode, String> {
        let offset = self.offset();
        let mut stages = vec![self.parse_command()?];
        while matches!(self.peek(), Some(Token::Pipe)) {
            self.advance();
            stages.push(self.parse_command()?);
        }
        if stages.len() == 1 {
            Ok(stages.remove(0))
        } else {
            Ok(ExprNode::Pipeline { stages, offset })
        }
    }

    /// One pipeline stage: an operand followed by whitespace-separated
    /// arguments.
    fn parse_command(&mut self) -> Result<ExprNode, String> {
        let offset = self.offset();
        let head = self.parse_operand()?;

        let mut args = Vec::new();
        while self.starts_operand() {
            args.push(self.parse_operand()?);
        }

        match head {
            ExprNode::Call { name, offset, .. } if !args.is_empty() => {
                Ok(ExprNode::Call { name, args, offset })
            }
            ExprNode::Path(path) if !args.is_empty() => {
                Ok(ExprNode::PathCall { path, args, offset })
            }
            other if args.is_empty() => Ok(other),
            other => Err(format!(
                "literal {:?} cannot be applied to arguments",
                other
            )),
        }
    }

    fn starts_operand(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Ident(_)
                    | Token::DotPath(_)
                    | Token::Dollar(_)
                    | Token::Str(_)
                    | Token::RawStr(_)
                    | Token::Number(_)
                    | Token::LParen
            )
        )
    }

    fn parse_operand(&mut self) -> Result<ExprNode, String> {
        let offset = self.offset();
        let token = match self.advance() {
            Some(span) => span.token.clone(),
            None => return Err("unexpected end of expression".to_string()),
        };

        match token {
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(ExprNode::Bool {
                    value: true,
                    offset,
                }),
                "false" => Ok(ExprNode::Bool {
                    value: false,
                    offset,
                }),
                "nil" => Ok(ExprNode::Nil { offset }),
                _ => Ok(ExprNode::Call {
                    name,
                    args: Vec::new(),
                    offset,
                }),
            },
            Token::DotPath(text) => Ok(ExprNode::Path(parse_dot_path(&text, offset))),
            Token::Dollar(text) => Ok(ExprNode::Path(parse_dollar_path(&text, offset))),
            Token::Str(value) | Token::RawStr(value) => Ok(ExprNode::Str { value, offset }),
            Token::Number(value) => Ok(ExprNode::Number { value, offset }),
            Token::LParen => {
                let inner = self.parse_pipeline()?;
                match self.advance() {
                    Some(TokenSpan {
                        token: Token::RParen,
                        ..
                    }) => {}
                    _ => return Err("expected ')'".to_string()),
                }
                // Postfix field access on the parenthesized value.
                let trail = match self.peek() {
                    Some(Token::DotPath(text)) if text.starts_with('.') && text.len() > 1 => {
                        let trail_offset = self.offset();
                        let text = text.clone();
                        self.advance();
                        Some(parse_dot_path(&text, trail_offset))
                    }
                    _ => None,
                };
                Ok(ExprNode::Paren {
                    inner: Box::new(inner),
                    trail,
                    offset,
                })
            }
            other => Err(format!("unexpected token {:?}", other)),
        }
    }
}

/// `.A.B` → Dot root with segments `[A, B]`; `.` → bare dot.
pub fn parse_dot_path(text: &str, offset: usize) -> PathExpr {
    let segments: Vec<String> = text
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    PathExpr {
        root: PathRoot::Dot,
        segments,
        offset,
        text: text.to_string(),
    }
}

/// `$`, `$.A`, `$v`, `$v.A.B`.
pub fn parse_dollar_path(text: &str, offset: usize) -> PathExpr {
    let body = &text[1..];
    let mut parts = body.split('.');
    let head = parts.next().unwrap_or("");
    let segments: Vec<String> = parts.filter(|s| !s.is_empty()).map(str::to_string).collect();
    let root = if head.is_empty() {
        PathRoot::Root
    } else {
        PathRoot::Var(head.to_string())
    };
    PathExpr {
        root,
        segments,
        offset,
        text: text.to_string(),
    }
}
