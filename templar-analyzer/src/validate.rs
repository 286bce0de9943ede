//! Template validation: resolves every variable expression against the
//! scope stack and recursively validates nested template invocations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::warn;
use templar_ast::model::{TemplateContext, TemplateVar};
use templar_ast::template::{ActionKind, ExprNode, ParsedTemplate, PathExpr, PathRoot};
use templar_diagnostics::{DiagnosticKind, DiagnosticSink, Severity, ValidationResult};
use templar_harvest::CONTEXT_FILE_ORIGIN;
use templar_lexer::LineIndex;
use templar_parser::{ParseError, TemplateParser};

use crate::infer::Inferencer;
use crate::registry::{is_template_file, BlockRegistry};
use crate::scope::{self, Resolution, ScopeFrame, ScopeStack};

pub struct Validator<'a> {
    templates: &'a BTreeMap<String, TemplateContext>,
    registry: &'a BlockRegistry,
    inferencer: Inferencer<'a>,
    template_base: PathBuf,
}

/// Position bookkeeping for one validated source: the logical template name
/// for diagnostics, the line index of the text being walked, and the offset
/// of that text within its file (named-block bodies start mid-file).
struct Run<'r> {
    display: &'r str,
    index: LineIndex,
    body_line: u32,
    body_col: u32,
    origin: Option<(String, u32)>,
}

impl Run<'_> {
    fn position(&self, offset: usize) -> (u32, u32) {
        let (line, col) = self.index.position(offset);
        let abs_line = self.body_line + line - 1;
        let abs_col = if line == 1 {
            self.body_col + col - 1
        } else {
            col
        };
        (abs_line, abs_col)
    }

    fn diag(
        &self,
        kind: DiagnosticKind,
        severity: Severity,
        offset: usize,
        variable: &str,
        message: String,
    ) -> ValidationResult {
        let (line, col) = self.position(offset);
        let mut diag = match severity {
            Severity::Error => {
                ValidationResult::error(kind, self.display, line, col, variable, message)
            }
            Severity::Warning => {
                ValidationResult::warning(kind, self.display, line, col, variable, message)
            }
        };
        if let Some((file, line)) = &self.origin {
            diag = diag.with_source(file.clone(), *line);
        }
        diag
    }
}

impl<'a> Validator<'a> {
    pub fn new(
        templates: &'a BTreeMap<String, TemplateContext>,
        registry: &'a BlockRegistry,
        inferencer: Inferencer<'a>,
        template_base: PathBuf,
    ) -> Self {
        Self {
            templates,
            registry,
            inferencer,
            template_base,
        }
    }

    /// Validate every template with a known context, plus named-block
    /// duplicates. The result is sorted by template and position.
    pub fn validate_all(&self) -> Vec<ValidationResult> {
        let mut sink = DiagnosticSink::new();

        for dup in self.registry.duplicate_errors() {
            let (template, line) = dup
                .entries
                .first()
                .map(|e| (e.template_path.clone(), e.line))
                .unwrap_or_default();
            sink.emit(ValidationResult::error(
                DiagnosticKind::DuplicateNamedBlock,
                template,
                line,
                1,
                dup.name.as_str(),
                dup.message.clone(),
            ));
        }

        for (name, ctx) in self.templates {
            self.validate_template(name, ctx, &mut sink);
        }

        sink.into_sorted()
    }

    fn validate_template(&self, name: &str, ctx: &TemplateContext, sink: &mut DiagnosticSink) {
        let path = self.template_base.join(name);
        let source = match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(err) => {
                warn!("skipping unreadable template {}: {err}", path.display());
                return;
            }
        };
        let origin = ctx
            .render_sites
            .iter()
            .find(|s| s.file != CONTEXT_FILE_ORIGIN)
            .map(|s| (s.file.clone(), s.line));
        let mut visited = vec![name.to_string()];
        self.validate_source(name, &source, &ctx.vars, origin, 1, 1, &mut visited, sink);
    }

    /// Parse and walk one source text. `body_line`/`body_col` locate the
    /// text inside its file (1/1 for whole files).
    #[allow(clippy::too_many_arguments)]
    fn validate_source(
        &self,
        display: &str,
        source: &str,
        vars: &BTreeMap<String, TemplateVar>,
        origin: Option<(String, u32)>,
        body_line: u32,
        body_col: u32,
        visited: &mut Vec<String>,
        sink: &mut DiagnosticSink,
    ) {
        let run = Run {
            display,
            index: LineIndex::new(source),
            body_line,
            body_col,
            origin,
        };

        let parsed = match TemplateParser::new(display, source).parse() {
            Ok(parsed) => parsed,
            Err(err) => {
                sink.emit(structural(&run, &err));
                return;
            }
        };

        let mut stack = ScopeStack::new(vars);
        self.walk(
            &parsed,
            0,
            parsed.actions.len(),
            &mut stack,
            &run,
            visited,
            sink,
        );

        if !stack.is_balanced() {
            sink.emit(run.diag(
                DiagnosticKind::Structural,
                Severity::Error,
                0,
                "",
                format!("template {display} leaves {} scopes open", stack.depth() - 1),
            ));
        }
    }

    /// Walk actions in `[start, end)`, updating the scope stack and
    /// validating expressions.
    #[allow(clippy::too_many_arguments)]
    fn walk(
        &self,
        parsed: &ParsedTemplate,
        start: usize,
        end: usize,
        stack: &mut ScopeStack,
        run: &Run<'_>,
        visited: &mut Vec<String>,
        sink: &mut DiagnosticSink,
    ) {
        let mut i = start;
        while i < end {
            let Some(action) = parsed.actions.get(i) else {
                break;
            };

            if let Some(region) = parsed.region_at(i) {
                // `block` renders in place with its own derived context;
                // `define` bodies run only when invoked.
                if let ActionKind::Block { expr, .. } = &action.kind {
                    self.validate_block_region(parsed, region, expr.as_ref(), stack, run, visited, sink);
                }
                i = region.end_index + 1;
                continue;
            }

            match &action.kind {
                // The else variants pop first: their expressions resolve
                // against the parent dot, not the branch being left.
                ActionKind::If(expr) | ActionKind::ElseIf(expr) => {
                    if matches!(action.kind, ActionKind::ElseIf(_)) {
                        stack.pop();
                    }
                    self.check_expr(expr, stack, run, sink);
                    stack.push_copy();
                }
                ActionKind::With(expr) | ActionKind::ElseWith(expr) => {
                    if matches!(action.kind, ActionKind::ElseWith(_)) {
                        stack.pop();
                    }
                    self.check_expr(expr, stack, run, sink);
                    let frame = match self.inferencer.infer(expr, stack) {
                        Some(shape) => ScopeFrame::from_shape(&shape),
                        None => ScopeFrame::opaque(),
                    };
                    stack.push(frame);
                }
                ActionKind::Range { bindings, expr }
                | ActionKind::ElseRange { bindings, expr } => {
                    if matches!(action.kind, ActionKind::ElseRange { .. }) {
                        stack.pop();
                    }
                    self.check_expr(expr, stack, run, sink);
                    let frame = self.range_frame(expr, bindings, stack);
                    stack.push(frame);
                }
                ActionKind::Else => {
                    stack.pop();
                    stack.push_copy();
                }
                ActionKind::End => {
                    if stack.pop().is_none() {
                        sink.emit(run.diag(
                            DiagnosticKind::Structural,
                            Severity::Error,
                            action.start,
                            "",
                            "unexpected {{end}} with no open block".to_string(),
                        ));
                    }
                }
                ActionKind::Declare { var, expr } | ActionKind::SetVar { var, expr } => {
                    self.check_expr(expr, stack, run, sink);
                    let shape = self
                        .inferencer
                        .infer(expr, stack)
                        .unwrap_or_default();
                    stack.declare_local(var, shape);
                }
                ActionKind::Template {
                    name,
                    name_offset,
                    ctx,
                } => {
                    self.handle_template(name, *name_offset, ctx.as_ref(), stack, run, visited, sink);
                }
                ActionKind::Expr(expr) => {
                    self.check_expr(expr, stack, run, sink);
                }
                // Region openers were handled above.
                ActionKind::Define { .. } | ActionKind::Block { .. } => {}
            }

            i += 1;
        }
    }

    /// The frame pushed by a `range` action: dot is the element type, with
    /// `$index`/`$element` (or `$key`/`$value`) bindings as locals.
    fn range_frame(
        &self,
        expr: &ExprNode,
        bindings: &[String],
        stack: &ScopeStack,
    ) -> ScopeFrame {
        let Some(shape) = self.inferencer.infer(expr, stack) else {
            return ScopeFrame::opaque();
        };

        let element = scope::element_shape(&shape);
        let mut frame = ScopeFrame::from_shape(&element);

        match bindings {
            [value] => {
                frame.locals.insert(value.clone(), element);
            }
            [key, value] => {
                let key_shape = if shape.is_map {
                    scope::shape_from_type_str(
                        shape.key_type.as_deref().unwrap_or("string"),
                        Vec::new(),
                    )
                } else {
                    scope::shape_from_type_str("int", Vec::new())
                };
                frame.locals.insert(key.clone(), key_shape);
                frame.locals.insert(value.clone(), element);
            }
            _ => {}
        }
        frame
    }

    /// Resolve every path occurrence in an expression and emit diagnostics
    /// for the failures.
    fn check_expr(
        &self,
        expr: &ExprNode,
        stack: &ScopeStack,
        run: &Run<'_>,
        sink: &mut DiagnosticSink,
    ) {
        let mut paths = Vec::new();
        expr.collect_paths(&mut paths);
        for path in paths {
            if let Some(diag) = self.check_path(path, stack, run) {
                sink.emit(diag);
            }
        }
    }

    fn check_path(
        &self,
        path: &PathExpr,
        stack: &ScopeStack,
        run: &Run<'_>,
    ) -> Option<ValidationResult> {
        match scope::resolve_path(stack, path) {
            Resolution::Ok(_) | Resolution::Opaque => None,
            Resolution::UnknownVariable { name } => Some(run.diag(
                DiagnosticKind::UnknownVariable,
                Severity::Error,
                path.offset,
                &path.text,
                format!("Template variable \"{name}\" is not defined in the render context"),
            )),
            Resolution::UnknownField { field, owner } => Some(run.diag(
                DiagnosticKind::UnknownField,
                Severity::Error,
                path.offset,
                &path.text,
                format!("Field \"{field}\" does not exist on type {owner}"),
            )),
            Resolution::UntrackedLocal { name } => Some(run.diag(
                DiagnosticKind::UnknownVariable,
                Severity::Error,
                path.offset,
                &path.text,
                format!("Template variable \"{name}\" is not defined in the render context"),
            )),
        }
    }

    /// A `block` region renders where it stands: validate its body with the
    /// context derived from its expression.
    #[allow(clippy::too_many_arguments)]
    fn validate_block_region(
        &self,
        parsed: &ParsedTemplate,
        region: &templar_ast::template::BlockRegion,
        expr: Option<&ExprNode>,
        stack: &ScopeStack,
        run: &Run<'_>,
        visited: &mut Vec<String>,
        sink: &mut DiagnosticSink,
    ) {
        let derived = match expr {
            None => Some(BTreeMap::new()),
            Some(expr) => match self.derive_vars(expr, stack, run, sink) {
                DerivedVars::Vars(vars) => Some(vars),
                DerivedVars::Skip => None,
            },
        };
        let Some(vars) = derived else {
            return;
        };
        if visited.iter().any(|v| v == &region.name) {
            return;
        }
        visited.push(region.name.clone());
        let mut inner = ScopeStack::new(&vars);
        self.walk(
            parsed,
            region.start_index + 1,
            region.end_index,
            &mut inner,
            run,
            visited,
            sink,
        );
        visited.pop();
    }

    /// Nested `{{template NAME CTX?}}` invocation.
    #[allow(clippy::too_many_arguments)]
    fn handle_template(
        &self,
        name: &str,
        name_offset: usize,
        ctx: Option<&ExprNode>,
        stack: &ScopeStack,
        run: &Run<'_>,
        visited: &mut Vec<String>,
        sink: &mut DiagnosticSink,
    ) {
        let vars = match ctx {
            None => BTreeMap::new(),
            Some(expr) => match self.derive_vars(expr, stack, run, sink) {
                DerivedVars::Vars(vars) => vars,
                DerivedVars::Skip => return,
            },
        };

        if visited.iter().any(|v| v == name) {
            // Recursive invocation chains terminate silently.
            return;
        }

        if let Some(entry) = self.registry.lookup(name) {
            visited.push(name.to_string());
            self.validate_source(
                &entry.block.template_path,
                &entry.block.body_text,
                &vars,
                run.origin.clone(),
                entry.body_line,
                entry.body_col,
                visited,
                sink,
            );
            visited.pop();
            return;
        }

        let looks_file_based =
            name.contains('/') || name.contains('\\') || is_template_file(Path::new(name));
        if !looks_file_based {
            return;
        }

        let normalized = name.strip_prefix("./").unwrap_or(name);
        let path = self.template_base.join(normalized);
        if !path.is_file() {
            sink.emit(run.diag(
                DiagnosticKind::UnknownPartial,
                Severity::Warning,
                name_offset,
                name,
                format!("Partial template \"{name}\" does not exist"),
            ));
            return;
        }
        let source = match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(err) => {
                warn!("skipping unreadable partial {}: {err}", path.display());
                return;
            }
        };
        visited.push(name.to_string());
        self.validate_source(
            normalized,
            &source,
            &vars,
            run.origin.clone(),
            1,
            1,
            visited,
            sink,
        );
        visited.pop();
    }

    /// The variables a nested body sees as its root context.
    fn derive_vars(
        &self,
        expr: &ExprNode,
        stack: &ScopeStack,
        run: &Run<'_>,
        sink: &mut DiagnosticSink,
    ) -> DerivedVars {
        // `.` and `$` pass the current view through.
        if let ExprNode::Path(path) = expr {
            if path.is_bare() {
                let frame = match path.root {
                    PathRoot::Root => stack.root(),
                    _ => stack.top(),
                };
                if frame.opaque {
                    return DerivedVars::Skip;
                }
                return DerivedVars::Vars(fields_as_vars(&frame.fields));
            }
            // Untracked locals skip descent without a diagnostic.
            if let PathRoot::Var(local) = &path.root {
                if stack.lookup_local(local).is_none() {
                    return DerivedVars::Skip;
                }
            }
        }

        match self.inferencer.infer(expr, stack) {
            Some(shape) if !scope::is_opaque(&shape) => {
                DerivedVars::Vars(fields_as_vars(&shape.fields))
            }
            Some(_) => DerivedVars::Skip,
            None => {
                sink.emit(run.diag(
                    DiagnosticKind::BadTemplateContext,
                    Severity::Warning,
                    expr.offset(),
                    &expr_text(expr),
                    "Template context argument does not resolve in the current scope".to_string(),
                ));
                DerivedVars::Skip
            }
        }
    }
}

enum DerivedVars {
    Vars(BTreeMap<String, TemplateVar>),
    Skip,
}

fn fields_as_vars(fields: &[TemplateVar]) -> BTreeMap<String, TemplateVar> {
    fields
        .iter()
        .map(|f| (f.name.clone(), f.clone()))
        .collect()
}

fn expr_text(expr: &ExprNode) -> String {
    match expr {
        ExprNode::Path(p) => p.text.clone(),
        ExprNode::Str { value, .. } => format!("\"{value}\""),
        ExprNode::Number { value, .. } => value.clone(),
        ExprNode::Bool { value, .. } => value.to_string(),
        ExprNode::Nil { .. } => "nil".to_string(),
        ExprNode::Call { name, .. } => name.clone(),
        ExprNode::PathCall { path, .. } => path.text.clone(),
        ExprNode::Paren { .. } => "(...)".to_string(),
        ExprNode::Pipeline { stages, .. } => stages
            .first()
            .map(expr_text)
            .unwrap_or_default(),
    }
}

fn structural(run: &Run<'_>, err: &ParseError) -> ValidationResult {
    let mut diag = ValidationResult::error(
        DiagnosticKind::Structural,
        err.template(),
        run.body_line + err.line().saturating_sub(1),
        1,
        "",
        err.to_string(),
    );
    if let Some((file, line)) = &run.origin {
        diag = diag.with_source(file.clone(), *line);
    }
    diag
}
