//! Action scanner: locates `{{ ... }}` spans in raw template text.
//!
//! The scanner is deliberately ignorant of what is inside an action; it
//! strips whitespace-trim markers, drops comment actions and hands the inner
//! text to the expression lexer. Positions are 1-based.

use crate::LexError;

/// One `{{ ... }}` occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAction {
    /// Inner text with trim markers and surrounding whitespace removed.
    pub content: String,
    /// Byte offset of the first content byte in the source.
    pub content_offset: usize,
    /// Position of the opening `{{`.
    pub line: u32,
    pub col: u32,
    /// Byte range of the whole `{{ ... }}` span, markers included.
    pub start: usize,
    pub end: usize,
}

impl RawAction {
    /// Length of the full action span in bytes.
    pub fn span_len(&self) -> usize {
        self.end - self.start
    }
}

/// Byte-offset to line/column translation for one source text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// 1-based (line, col) of a byte offset.
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let col = offset - self.line_starts.get(line).copied().unwrap_or(0);
        (line as u32 + 1, col as u32 + 1)
    }
}

pub struct ActionScanner<'source> {
    source: &'source str,
    index: LineIndex,
}

impl<'source> ActionScanner<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            source,
            index: LineIndex::new(source),
        }
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.index
    }

    /// Collect every non-comment action, left to right.
    pub fn scan(&self) -> Result<Vec<RawAction>, LexError> {
        let mut actions = Vec::new();
        let mut rest = self.source;
        let mut base = 0usize;

        while let Some(open) = rest.find("{{") {
            let start = base + open;
            let after_open = &rest[open + 2..];

            // Comment action: runs to the matching `*/}}`.
            let body = after_open.strip_prefix('-').unwrap_or(after_open);
            if body.trim_start().starts_with("/*") {
                match after_open.find("*/") {
                    Some(close_comment) => {
                        let tail = &after_open[close_comment + 2..];
                        let after_marker = tail.trim_start().strip_prefix('-').unwrap_or(tail.trim_start());
                        match after_marker.strip_prefix("}}") {
                            Some(_) => {
                                let consumed = after_open.len() - after_marker.len() + 2;
                                base = start + 2 + consumed;
                                rest = &self.source[base..];
                                continue;
                            }
                            None => {
                                let (line, _) = self.index.position(start);
                                return Err(LexError::UnclosedAction { line });
                            }
                        }
                    }
                    None => {
                        let (line, _) = self.index.position(start);
                        return Err(LexError::UnclosedAction { line });
                    }
                }
            }

            let close = match after_open.find("}}") {
                Some(c) => c,
                None => {
                    let (line, _) = self.index.position(start);
                    return Err(LexError::UnclosedAction { line });
                }
            };

            let end = start + 2 + close + 2;
            let mut inner = &after_open[..close];
            let mut inner_start = start + 2;

            // Leading trim marker `{{- `
            if let Some(stripped) = inner.strip_prefix('-') {
                inner = stripped;
                inner_start += 1;
            }
            // Trailing trim marker ` -}}`
            if let Some(stripped) = inner.strip_suffix('-') {
                inner = stripped;
            }

            // Track where the trimmed content actually begins.
            let trimmed = inner.trim_start();
            inner_start += inner.len() - trimmed.len();
            let content = trimmed.trim_end();

            let (line, col) = self.index.position(start);
            actions.push(RawAction {
                content: content.to_string(),
                content_offset: inner_start,
                line,
                col,
                start,
                end,
            });

            base = end;
            rest = &self.source[base..];
        }

        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_basic() {
        let scanner = ActionScanner::new("hello {{ .Name }} world");
        let actions = scanner.scan().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].content, ".Name");
        assert_eq!(actions[0].line, 1);
        assert_eq!(actions[0].col, 7);
    }

    #[test]
    fn test_scan_trim_markers() {
        let scanner = ActionScanner::new("{{- if .Ok -}}\nx\n{{- end -}}");
        let actions = scanner.scan().unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].content, "if .Ok");
        assert_eq!(actions[1].content, "end");
        assert_eq!(actions[1].line, 3);
    }

    #[test]
    fn test_scan_skips_comments() {
        let scanner = ActionScanner::new("{{/* a comment with }} inside */}}{{ .X }}");
        let actions = scanner.scan().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].content, ".X");
    }

    #[test]
    fn test_unclosed_action() {
        let scanner = ActionScanner::new("line one\n{{ .Name");
        let err = scanner.scan().unwrap_err();
        match err {
            LexError::UnclosedAction { line } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_multiline_positions() {
        let scanner = ActionScanner::new("a\nb\n  {{ .Deep }}");
        let actions = scanner.scan().unwrap();
        assert_eq!(actions[0].line, 3);
        assert_eq!(actions[0].col, 3);
        let (line, col) = scanner.line_index().position(actions[0].content_offset);
        assert_eq!(line, 3);
        assert_eq!(col, 6);
    }
}
