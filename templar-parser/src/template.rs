//! Action-stream parser: classifies each `{{ ... }}` by its leading keyword,
//! checks the opener/`end` structure and captures `define`/`block` regions
//! verbatim.

use templar_ast::template::{Action, ActionKind, BlockRegion, ExprNode, ParsedTemplate};
use templar_lexer::{ActionScanner, LexError, Lexer, RawAction, Token, TokenSpan};

use crate::{expr::ExprParser, ParseError};

pub struct TemplateParser<'a> {
    template: &'a str,
    source: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Opener {
    If,
    With,
    Range,
    Define,
    Block,
}

impl Opener {
    fn keyword(self) -> &'static str {
        match self {
            Opener::If => "if",
            Opener::With => "with",
            Opener::Range => "range",
            Opener::Define => "define",
            Opener::Block => "block",
        }
    }
}

impl<'a> TemplateParser<'a> {
    /// `template` is the logical name used in error messages; `source` is the
    /// file text.
    pub fn new(template: &'a str, source: &'a str) -> Self {
        Self { template, source }
    }

    pub fn parse(&self) -> Result<ParsedTemplate, ParseError> {
        let scanner = ActionScanner::new(self.source);
        let raw_actions = scanner.scan().map_err(|e| match e {
            LexError::UnclosedAction { line } => ParseError::UnclosedAction {
                template: self.template.to_string(),
                line,
            },
            LexError::InvalidToken { .. } => ParseError::Syntax {
                template: self.template.to_string(),
                line: 0,
                message: e.to_string(),
            },
        })?;

        let mut actions = Vec::with_capacity(raw_actions.len());
        for raw in &raw_actions {
            let kind = self.classify(raw)?;
            actions.push(Action {
                kind,
                line: raw.line,
                col: raw.col,
                start: raw.start,
                end: raw.end,
            });
        }

        let blocks = self.check_structure(&scanner, &actions)?;
        Ok(ParsedTemplate { actions, blocks })
    }

    fn syntax(&self, line: u32, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            template: self.template.to_string(),
            line,
            message: message.into(),
        }
    }

    fn classify(&self, raw: &RawAction) -> Result<ActionKind, ParseError> {
        let tokens: Result<Vec<TokenSpan>, _> = Lexer::new(&raw.content).collect();
        let tokens = tokens.map_err(|e| self.syntax(raw.line, e.to_string()))?;
        if tokens.is_empty() {
            return Err(self.syntax(raw.line, "empty action"));
        }

        let base = raw.content_offset;
        let rest =
            |from: usize| ExprParser::from_tokens(tokens.get(from..).unwrap_or(&[]).to_vec(), base);

        match &tokens[0].token {
            Token::Ident(kw) => match kw.as_str() {
                "if" => {
                    let expr = self.pipeline(rest(1), raw.line)?;
                    Ok(ActionKind::If(expr))
                }
                "with" => {
                    let expr = self.pipeline(rest(1), raw.line)?;
                    Ok(ActionKind::With(expr))
                }
                "range" => {
                    let (bindings, from) = range_bindings(&tokens);
                    let expr = self.pipeline(rest(from), raw.line)?;
                    Ok(ActionKind::Range { bindings, expr })
                }
                "end" => {
                    if tokens.len() > 1 {
                        return Err(self.syntax(raw.line, "unexpected text after end"));
                    }
                    Ok(ActionKind::End)
                }
                "else" => self.classify_else(raw, &tokens, base),
                "define" => {
                    let (name, _) = self.block_name(raw, &tokens, "define")?;
                    if tokens.len() > 2 {
                        return Err(self.syntax(raw.line, "unexpected text after define name"));
                    }
                    Ok(ActionKind::Define { name })
                }
                "block" => {
                    let (name, _) = self.block_name(raw, &tokens, "block")?;
                    let expr = if tokens.len() > 2 {
                        Some(self.pipeline(rest(2), raw.line)?)
                    } else {
                        None
                    };
                    Ok(ActionKind::Block { name, expr })
                }
                "template" => {
                    let (name, name_offset) = self.block_name(raw, &tokens, "template")?;
                    let ctx = if tokens.len() > 2 {
                        Some(self.pipeline(rest(2), raw.line)?)
                    } else {
                        None
                    };
                    Ok(ActionKind::Template {
                        name,
                        name_offset,
                        ctx,
                    })
                }
                _ => {
                    let expr = self.pipeline(rest(0), raw.line)?;
                    Ok(ActionKind::Expr(expr))
                }
            },
            Token::Dollar(var) if !var.contains('.') && var.len() > 1 => {
                match tokens.get(1).map(|t| &t.token) {
                    Some(Token::Declare) => {
                        let expr = self.pipeline(rest(2), raw.line)?;
                        Ok(ActionKind::Declare {
                            var: var[1..].to_string(),
                            expr,
                        })
                    }
                    Some(Token::Assign) => {
                        let expr = self.pipeline(rest(2), raw.line)?;
                        Ok(ActionKind::SetVar {
                            var: var[1..].to_string(),
                            expr,
                        })
                    }
                    _ => {
                        let expr = self.pipeline(rest(0), raw.line)?;
                        Ok(ActionKind::Expr(expr))
                    }
                }
            }
            _ => {
                let expr = self.pipeline(rest(0), raw.line)?;
                Ok(ActionKind::Expr(expr))
            }
        }
    }

    fn classify_else(
        &self,
        raw: &RawAction,
        tokens: &[TokenSpan],
        base: usize,
    ) -> Result<ActionKind, ParseError> {
        let rest =
            |from: usize| ExprParser::from_tokens(tokens.get(from..).unwrap_or(&[]).to_vec(), base);
        match tokens.get(1).map(|t| &t.token) {
            None => Ok(ActionKind::Else),
            Some(Token::Ident(kw)) => match kw.as_str() {
                "if" => Ok(ActionKind::ElseIf(self.pipeline(rest(2), raw.line)?)),
                "with" => Ok(ActionKind::ElseWith(self.pipeline(rest(2), raw.line)?)),
                "range" => {
                    let (bindings, from) = range_bindings(&tokens[1..]);
                    let expr = self.pipeline(rest(from + 1), raw.line)?;
                    Ok(ActionKind::ElseRange { bindings, expr })
                }
                other => Err(self.syntax(raw.line, format!("unexpected `{other}` after else"))),
            },
            Some(other) => Err(self.syntax(raw.line, format!("unexpected {other:?} after else"))),
        }
    }

    fn pipeline(&self, mut parser: ExprParser, line: u32) -> Result<ExprNode, ParseError> {
        parser.parse_all().map_err(|m| self.syntax(line, m))
    }

    /// The quoted name after `define`/`block`/`template`; returns the name
    /// and the byte offset of the opening quote.
    fn block_name(
        &self,
        raw: &RawAction,
        tokens: &[TokenSpan],
        keyword: &str,
    ) -> Result<(String, usize), ParseError> {
        match tokens.get(1) {
            Some(TokenSpan {
                token: Token::Str(name) | Token::RawStr(name),
                span,
            }) => Ok((name.clone(), raw.content_offset + span.start)),
            _ => Err(self.syntax(
                raw.line,
                format!("{keyword} requires a quoted template name"),
            )),
        }
    }

    /// Verify opener/`end` balance and capture `define`/`block` regions.
    fn check_structure(
        &self,
        scanner: &ActionScanner<'_>,
        actions: &[Action],
    ) -> Result<Vec<BlockRegion>, ParseError> {
        let mut stack: Vec<(usize, Opener)> = Vec::new();
        let mut blocks = Vec::new();

        for (i, action) in actions.iter().enumerate() {
            match &action.kind {
                ActionKind::If(_) => stack.push((i, Opener::If)),
                ActionKind::With(_) => stack.push((i, Opener::With)),
                ActionKind::Range { .. } => stack.push((i, Opener::Range)),
                ActionKind::Define { .. } => stack.push((i, Opener::Define)),
                ActionKind::Block { .. } => stack.push((i, Opener::Block)),
                ActionKind::Else
                | ActionKind::ElseIf(_)
                | ActionKind::ElseWith(_)
                | ActionKind::ElseRange { .. } => match stack.last() {
                    Some((_, Opener::If | Opener::With | Opener::Range)) => {}
                    _ => {
                        return Err(ParseError::OrphanElse {
                            template: self.template.to_string(),
                            line: action.line,
                        })
                    }
                },
                ActionKind::End => {
                    let (open_index, opener) = match stack.pop() {
                        Some(top) => top,
                        None => {
                            return Err(ParseError::UnmatchedEnd {
                                template: self.template.to_string(),
                                line: action.line,
                            })
                        }
                    };
                    if matches!(opener, Opener::Define | Opener::Block) {
                        blocks.push(self.build_region(scanner, actions, open_index, i));
                    }
                }
                _ => {}
            }
        }

        if let Some((open_index, opener)) = stack.pop() {
            return Err(ParseError::UnclosedBlock {
                template: self.template.to_string(),
                line: actions[open_index].line,
                keyword: opener.keyword(),
            });
        }

        Ok(blocks)
    }

    fn build_region(
        &self,
        scanner: &ActionScanner<'_>,
        actions: &[Action],
        open_index: usize,
        end_index: usize,
    ) -> BlockRegion {
        let opener = &actions[open_index];
        let (name, expr) = match &opener.kind {
            ActionKind::Define { name } => (name.clone(), None),
            ActionKind::Block { name, expr } => (name.clone(), expr.clone()),
            _ => (String::new(), None),
        };
        let body_start = opener.end;
        let body_end = actions[end_index].start;
        let (body_line, body_col) = scanner.line_index().position(body_start);
        BlockRegion {
            name,
            expr,
            start_index: open_index,
            end_index,
            line: opener.line,
            col: opener.col,
            body_text: self.source[body_start..body_end].to_string(),
            body_line,
            body_col,
        }
    }
}

/// Leading `$v :=` / `$k, $v :=` bindings of a range action. Returns the
/// binding names (without `$`) and the token index where the range
/// expression begins. `tokens[0]` is the `range` keyword itself.
fn range_bindings(tokens: &[TokenSpan]) -> (Vec<String>, usize) {
    let mut bindings = Vec::new();
    let mut i = 1;

    while let Some(TokenSpan {
        token: Token::Dollar(name),
        ..
    }) = tokens.get(i)
    {
        if name.contains('.') || name.len() < 2 {
            break;
        }
        bindings.push(name[1..].to_string());
        match tokens.get(i + 1).map(|t| &t.token) {
            Some(Token::Comma) => i += 2,
            Some(Token::Declare) => {
                return (bindings, i + 2);
            }
            _ => break,
        }
    }

    // No `:=` found: not a binding form after all.
    (Vec::new(), 1)
}
