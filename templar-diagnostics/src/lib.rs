// Diagnostic model for the Templar analyzer.
// Validation findings are plain serializable records; rendering adds color
// and suggestions for terminal collaborators without changing the records.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "{}", "error".red().bold()),
            Severity::Warning => write!(f, "{}", "warning".yellow().bold()),
        }
    }
}

/// Diagnostic taxonomy. Structural failures (unclosed action, unmatched
/// `end`, orphan `else`, unbalanced stack) collapse into [`Structural`].
///
/// [`Structural`]: DiagnosticKind::Structural
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnknownVariable,
    UnknownField,
    UnknownPartial,
    BadTemplateContext,
    DuplicateNamedBlock,
    Structural,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub template: String,
    pub line: u32,
    pub col: u32,
    /// The offending variable or reference text as written.
    pub variable: String,
    pub message: String,
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// Host-source location of the render call this diagnostic traces back
    /// to, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,
}

impl ValidationResult {
    pub fn error(
        kind: DiagnosticKind,
        template: impl Into<String>,
        line: u32,
        col: u32,
        variable: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            template: template.into(),
            line,
            col,
            variable: variable.into(),
            message: message.into(),
            severity: Severity::Error,
            kind,
            source_file: None,
            source_line: None,
        }
    }

    pub fn warning(
        kind: DiagnosticKind,
        template: impl Into<String>,
        line: u32,
        col: u32,
        variable: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, template, line, col, variable, message)
        }
    }

    pub fn with_source(mut self, file: impl Into<String>, line: u32) -> Self {
        self.source_file = Some(file.into());
        self.source_line = Some(line);
        self
    }

    /// Render for a terminal: `error: message` + ` --> template:line:col`,
    /// with an optional "did you mean" help line.
    pub fn render(&self, suggestion: Option<&str>) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}: {}\n", self.severity, self.message.bold()));
        out.push_str(&format!(
            " {} {}:{}:{}\n",
            "-->".cyan().bold(),
            self.template,
            self.line,
            self.col
        ));
        if let (Some(file), Some(line)) = (&self.source_file, self.source_line) {
            out.push_str(&format!(
                " {} rendered from {}:{}\n",
                "=".cyan().bold(),
                file,
                line
            ));
        }
        if let Some(suggestion) = suggestion {
            out.push_str(&format!(
                " {} did you mean `{}`?\n",
                "help:".green().bold(),
                suggestion
            ));
        }
        out
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.render(None))
    }
}

/// Collects validation findings and keeps per-severity counts.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<ValidationResult>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: ValidationResult) {
        match diagnostic.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = ValidationResult>) {
        for d in diagnostics {
            self.emit(d);
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[ValidationResult] {
        &self.diagnostics
    }

    /// Stable order for consumers: template, then position.
    pub fn into_sorted(mut self) -> Vec<ValidationResult> {
        self.diagnostics
            .sort_by(|a, b| {
                (&a.template, a.line, a.col, &a.variable).cmp(&(
                    &b.template,
                    b.line,
                    b.col,
                    &b.variable,
                ))
            });
        self.diagnostics
    }

    /// Print all diagnostics to stderr.
    pub fn print_all(&self) {
        for diag in &self.diagnostics {
            eprintln!("{}", diag.render(None));
        }
    }
}

/// Fuzzy name matching behind "did you mean?" hints.
pub mod fuzzy {
    use strsim::jaro_winkler;

    /// Similarity a candidate must clear before it is worth suggesting.
    const SUGGESTION_THRESHOLD: f64 = 0.8;

    /// Rank `candidates` by Jaro-Winkler similarity to `target`, keeping at
    /// most `limit` names above `threshold`, best first.
    pub fn find_similar_names(
        target: &str,
        candidates: &[String],
        threshold: f64,
        limit: usize,
    ) -> Vec<String> {
        // Ranked insertion into a small buffer; the candidate list is tiny
        // and a full sort buys nothing.
        let mut ranked: Vec<(f64, &String)> = Vec::with_capacity(limit + 1);
        for candidate in candidates {
            let score = jaro_winkler(target, candidate);
            if score <= threshold {
                continue;
            }
            let slot = ranked.partition_point(|(kept, _)| *kept >= score);
            if slot < limit {
                ranked.insert(slot, (score, candidate));
                ranked.truncate(limit);
            }
        }
        ranked.into_iter().map(|(_, name)| name.clone()).collect()
    }

    /// Single best suggestion, if any candidate is close enough.
    pub fn best_match(target: &str, candidates: &[String]) -> Option<String> {
        let mut best: Option<(f64, &String)> = None;
        for candidate in candidates {
            let score = jaro_winkler(target, candidate);
            if score <= SUGGESTION_THRESHOLD {
                continue;
            }
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, candidate));
            }
        }
        best.map(|(_, name)| name.clone())
    }
}
