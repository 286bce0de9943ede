//! End-to-end validation scenarios: host program + on-disk template tree in,
//! diagnostics out.

mod common;

use std::fs;
use std::path::Path;

use common::Builder;
use templar_analyzer::{Analyzer, AnalyzerConfig};
use templar_diagnostics::{DiagnosticKind, Severity, ValidationResult};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn analyzer_for(dir: &Path) -> Analyzer {
    Analyzer::new(AnalyzerConfig {
        template_root: dir.to_path_buf(),
        ..Default::default()
    })
}

fn write_template(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, body).unwrap();
}

fn user_program(template: &str) -> Builder {
    let mut b = Builder::new();
    let user = b.user_type();
    b.render_call("show", template, vec![("User", user)], 10);
    b
}

#[test]
fn test_scoped_field_access_is_clean() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "index.html",
        "{{ with .User }}{{ .Address.City }}{{ end }}",
    );

    let b = user_program("index.html");
    let analysis = analyzer_for(dir.path()).analyze(&b.program);
    assert_eq!(analysis.diagnostics, Vec::<ValidationResult>::new());
}

#[test]
fn test_missing_field_inside_with() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "index.html",
        "{{ with .User }}{{ .Address.Invalid }}{{ end }}",
    );

    let b = user_program("index.html");
    let analysis = analyzer_for(dir.path()).analyze(&b.program);

    assert_eq!(analysis.diagnostics.len(), 1);
    let diag = &analysis.diagnostics[0];
    assert_eq!(diag.kind, DiagnosticKind::UnknownField);
    assert_eq!(diag.severity, Severity::Error);
    assert_eq!(diag.variable, ".Address.Invalid");
    assert_eq!(diag.template, "index.html");
    assert!(
        diag.message
            .contains("Field \"Invalid\" does not exist on type Address"),
        "message: {}",
        diag.message
    );
    // The diagnostic traces back to the host render call.
    assert_eq!(diag.source_file.as_deref(), Some("main.go"));
    assert_eq!(diag.source_line, Some(10));
}

#[test]
fn test_range_else_is_clean() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "list.html",
        "{{ range .Items }}{{ .Name }}{{ else }}none{{ end }}",
    );

    let mut b = Builder::new();
    let items = b.items_type();
    b.render_call("list", "list.html", vec![("Items", items)], 12);
    let analysis = analyzer_for(dir.path()).analyze(&b.program);
    assert_eq!(analysis.diagnostics, Vec::<ValidationResult>::new());
}

#[test]
fn test_partial_context_propagation() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "profile.html",
        "{{ template \"user_detail.html\" .User }}",
    );
    write_template(
        dir.path(),
        "user_detail.html",
        "{{ .Name }} {{ .Age }} {{ .Address.City }}",
    );

    let b = user_program("profile.html");
    let analysis = analyzer_for(dir.path()).analyze(&b.program);
    assert_eq!(analysis.diagnostics, Vec::<ValidationResult>::new());
}

#[test]
fn test_partial_diagnostics_carry_partial_name() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "profile.html",
        "{{ template \"user_detail.html\" .User }}",
    );
    write_template(dir.path(), "user_detail.html", "{{ .Name }} {{ .Bogus }}");

    let b = user_program("profile.html");
    let analysis = analyzer_for(dir.path()).analyze(&b.program);

    assert_eq!(analysis.diagnostics.len(), 1);
    let diag = &analysis.diagnostics[0];
    assert_eq!(diag.template, "user_detail.html");
    assert_eq!(diag.kind, DiagnosticKind::UnknownVariable);
    assert_eq!(diag.line, 1);
}

#[test]
fn test_duplicate_named_block() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "a.html",
        "{{ define \"header\" }}a{{ end }}",
    );
    write_template(
        dir.path(),
        "b.html",
        "x\n{{ define \"header\" }}b{{ end }}",
    );

    let b = Builder::new();
    let analysis = analyzer_for(dir.path()).analyze(&b.program);

    assert_eq!(analysis.graph.named_block_errors.len(), 1);
    let dup = &analysis.graph.named_block_errors[0];
    assert_eq!(dup.name, "header");
    assert_eq!(dup.entries.len(), 2);
    assert!(dup.message.contains("a.html:1"));
    assert!(dup.message.contains("b.html:2"));

    let diags: Vec<&ValidationResult> = analysis
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::DuplicateNamedBlock)
        .collect();
    assert_eq!(diags.len(), 1);
}

#[test]
fn test_global_implicit_setter_flows_into_view() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "viewB.html",
        "{{ .globalVar }} {{ .localVarB }}",
    );

    let mut b = Builder::new();
    let string = b.basic("string");
    let ctx = b.context_type();

    // Function A sets a global and never renders.
    let recv = b.ident("c", Some(ctx), templar_ast::host::Pos::new(20, 2));
    let set = b.selector(recv, "Set", templar_ast::host::Pos::new(20, 4));
    let key = b.strlit("globalVar", templar_ast::host::Pos::new(20, 8));
    let value = b.ident("version", Some(string), templar_ast::host::Pos::new(20, 20));
    let call = b.call(set, vec![key, value], templar_ast::host::Pos::new(20, 4));
    b.func(
        "middleware",
        templar_ast::host::Block {
            stmts: vec![templar_ast::host::Stmt::Expr(call)],
        },
    );

    // Function B sets a local and renders.
    let recv = b.ident("c", Some(ctx), templar_ast::host::Pos::new(30, 2));
    let set = b.selector(recv, "Set", templar_ast::host::Pos::new(30, 4));
    let key = b.strlit("localVarB", templar_ast::host::Pos::new(30, 8));
    let value = b.ident("title", Some(string), templar_ast::host::Pos::new(30, 20));
    let set_call = b.call(set, vec![key, value], templar_ast::host::Pos::new(30, 4));
    let recv = b.ident("c", Some(ctx), templar_ast::host::Pos::new(31, 2));
    let render = b.selector(recv, "Render", templar_ast::host::Pos::new(31, 4));
    let name = b.strlit("viewB.html", templar_ast::host::Pos::new(31, 11));
    let render_call = b.call(render, vec![name], templar_ast::host::Pos::new(31, 4));
    b.func(
        "viewB",
        templar_ast::host::Block {
            stmts: vec![
                templar_ast::host::Stmt::Expr(set_call),
                templar_ast::host::Stmt::Expr(render_call),
            ],
        },
    );

    let analysis = analyzer_for(dir.path()).analyze(&b.program);
    let site = &analysis.graph.templates["viewB.html"];
    assert!(site.vars.contains_key("globalVar"));
    assert!(site.vars.contains_key("localVarB"));
    assert_eq!(analysis.diagnostics, Vec::<ValidationResult>::new());
}

#[test]
fn test_unknown_root_variable() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "index.html", "line\n  {{ .Nope }}");

    let b = user_program("index.html");
    let analysis = analyzer_for(dir.path()).analyze(&b.program);

    assert_eq!(analysis.diagnostics.len(), 1);
    let diag = &analysis.diagnostics[0];
    assert_eq!(diag.kind, DiagnosticKind::UnknownVariable);
    assert!(diag
        .message
        .contains("Template variable \"Nope\" is not defined in the render context"));
    // Localization: inside the {{ ... }} span on line 2.
    assert_eq!(diag.line, 2);
    assert!(diag.col >= 3, "col {} should be inside the action", diag.col);
}

#[test]
fn test_structural_error_is_fatal_per_template_only() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "bad.html", "{{ if .User }}never closed");
    write_template(dir.path(), "good.html", "{{ .User.Name }}");

    let mut b = Builder::new();
    let user = b.user_type();
    b.render_call("bad", "bad.html", vec![("User", user)], 10);
    b.render_call("good", "good.html", vec![("User", user)], 20);

    let analysis = analyzer_for(dir.path()).analyze(&b.program);
    let structural: Vec<&ValidationResult> = analysis
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::Structural)
        .collect();
    assert_eq!(structural.len(), 1);
    assert_eq!(structural[0].template, "bad.html");
    // good.html still validated cleanly.
    assert!(!analysis.diagnostics.iter().any(|d| d.template == "good.html"));
}

#[test]
fn test_missing_partial_warning() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "index.html",
        "{{ template \"partials/side.html\" . }}",
    );

    let b = user_program("index.html");
    let analysis = analyzer_for(dir.path()).analyze(&b.program);

    assert_eq!(analysis.diagnostics.len(), 1);
    let diag = &analysis.diagnostics[0];
    assert_eq!(diag.kind, DiagnosticKind::UnknownPartial);
    assert_eq!(diag.severity, Severity::Warning);
    assert!(diag.message.contains("partials/side.html"));
}

#[test]
fn test_named_block_invocation_with_context() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "layout.html",
        "{{ define \"user_card\" }}{{ .Name }}{{ .Missing }}{{ end }}",
    );
    write_template(
        dir.path(),
        "index.html",
        "{{ template \"user_card\" .User }}",
    );

    let b = user_program("index.html");
    let analysis = analyzer_for(dir.path()).analyze(&b.program);

    let diags: Vec<&ValidationResult> = analysis
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::UnknownVariable)
        .collect();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].template, "layout.html");
    // Positions map back into layout.html, inside the define body.
    assert_eq!(diags[0].line, 1);
}

#[test]
fn test_recursive_partial_terminates() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "tree.html",
        "{{ .Name }}{{ template \"tree.html\" . }}",
    );

    let mut b = Builder::new();
    let string = b.basic("string");
    let node = b.strukt("models", "Node", vec![("Name", string)]);
    b.render_call("tree", "tree.html", vec![("Name", string)], 10);
    let _ = node;

    let analysis = analyzer_for(dir.path()).analyze(&b.program);
    // Terminates; the only requirement is that we got here.
    assert!(analysis.graph.templates.contains_key("tree.html"));
}

#[test]
fn test_local_binding_through_range() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "list.html",
        "{{ range $i, $item := .Items }}{{ $item.Name }}{{ $i }}{{ end }}",
    );

    let mut b = Builder::new();
    let items = b.items_type();
    b.render_call("list", "list.html", vec![("Items", items)], 12);
    let analysis = analyzer_for(dir.path()).analyze(&b.program);
    assert_eq!(analysis.diagnostics, Vec::<ValidationResult>::new());
}

#[test]
fn test_dollar_root_inside_range() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(
        dir.path(),
        "list.html",
        "{{ range .Items }}{{ $.User.Name }}{{ .Name }}{{ end }}",
    );

    let mut b = Builder::new();
    let user = b.user_type();
    let items = b.items_type();
    b.render_call("list", "list.html", vec![("User", user), ("Items", items)], 12);
    let analysis = analyzer_for(dir.path()).analyze(&b.program);
    assert_eq!(analysis.diagnostics, Vec::<ValidationResult>::new());
}

#[test]
fn test_knowledge_graph_serialization_shape() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "index.html", "{{ .User.Name }}");

    let b = user_program("index.html");
    let analysis = analyzer_for(dir.path()).analyze(&b.program);

    let json = serde_json::to_value(&analysis.graph).unwrap();
    assert!(json.get("templates").is_some());
    assert!(json.get("namedBlocks").is_some());
    assert!(json.get("namedBlockErrors").is_some());

    let result_json = serde_json::to_value(&analysis.result).unwrap();
    assert!(result_json.get("renderSites").is_some());
    assert!(result_json.get("funcMaps").is_some());
    let site = &result_json["renderSites"][0];
    assert!(site.get("templateNameStartCol").is_some());
}
