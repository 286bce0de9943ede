//! Render-site collection.
//!
//! Phase 1 enumerates function-body work units sequentially; phase 2
//! partitions them across the worker pool. Each unit is processed in two
//! passes: a local-symbol pass (string-literal assignments, function-map
//! composites) and a template-op pass (render calls, setter calls). Setter
//! scopes that never render are promoted to every render site in the run.

use std::collections::{HashMap, HashSet};

use log::debug;
use templar_ast::{
    host::{Block, Decl, Expr, HostProgram, Stmt},
    model::{FuncMapEntry, ParamSig, RenderSite, TemplateVar},
    types::{TypeId, TypeKind},
};

use crate::extract::TypeTreeExtractor;
use crate::index;
use crate::pool;
use crate::AnalysisResult;

/// Sentinel for an unused function name slot.
pub const DISABLED_FN: &str = "-";

/// Phrases identifying host import failures; such errors are noise for
/// template analysis and are filtered from the result.
const IMPORT_ERROR_PHRASES: &[&str] = &[
    "could not import",
    "cannot find package",
    "no required module provides package",
    "missing go.sum entry",
];

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub render_fn: String,
    pub execute_template_fn: String,
    pub set_fn: String,
    /// Named type whose `set_fn` method binds render-context values.
    pub context_type: String,
    /// Key of the global entry in the external context file.
    pub global_template_key: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            render_fn: "Render".to_string(),
            execute_template_fn: "ExecuteTemplate".to_string(),
            set_fn: "Set".to_string(),
            context_type: "Context".to_string(),
            global_template_key: "global".to_string(),
        }
    }
}

impl CollectorConfig {
    fn is_render_name(&self, name: &str) -> bool {
        (name == self.render_fn && self.render_fn != DISABLED_FN)
            || (name == self.execute_template_fn && self.execute_template_fn != DISABLED_FN)
    }

    fn is_set_name(&self, name: &str) -> bool {
        name == self.set_fn && self.set_fn != DISABLED_FN
    }
}

/// One render call with every template name it resolves to.
#[derive(Debug, Clone)]
pub struct ResolvedRender {
    pub file: String,
    pub line: u32,
    pub start_col: u32,
    pub end_col: u32,
    pub template_names: Vec<String>,
    pub explicit_vars: Vec<TemplateVar>,
}

/// Per-function findings.
#[derive(Debug, Default)]
pub struct FuncScope {
    pub set_vars: Vec<TemplateVar>,
    pub renders: Vec<ResolvedRender>,
    pub func_maps: Vec<FuncMapEntry>,
}

enum UnitBody<'a> {
    Borrowed(&'a Block),
    Owned(Block),
}

struct WorkUnit<'a> {
    pkg_idx: usize,
    file: String,
    body: UnitBody<'a>,
}

impl WorkUnit<'_> {
    fn block(&self) -> &Block {
        match &self.body {
            UnitBody::Borrowed(b) => b,
            UnitBody::Owned(b) => b,
        }
    }
}

pub struct Collector<'a> {
    program: &'a HostProgram,
    extractor: &'a TypeTreeExtractor<'a>,
    config: &'a CollectorConfig,
}

impl<'a> Collector<'a> {
    pub fn new(
        program: &'a HostProgram,
        extractor: &'a TypeTreeExtractor<'a>,
        config: &'a CollectorConfig,
    ) -> Self {
        Self {
            program,
            extractor,
            config,
        }
    }

    pub fn collect(&self) -> AnalysisResult {
        let consts = self.package_consts();
        let units = self.enumerate_units();
        debug!("collector: {} work units", units.len());

        let scopes: Vec<FuncScope> = pool::map_chunks(units, |chunk| {
            chunk
                .iter()
                .map(|unit| self.process_unit(unit, &consts))
                .collect()
        });

        // Global-implicit promotion: scopes that set but never render
        // contribute their bindings to every render site.
        let mut global_sets: Vec<TemplateVar> = Vec::new();
        for scope in &scopes {
            if scope.renders.is_empty() && !scope.set_vars.is_empty() {
                global_sets.extend(scope.set_vars.iter().cloned());
            }
        }

        let mut render_sites = Vec::new();
        let mut func_maps = Vec::new();
        for scope in &scopes {
            func_maps.extend(scope.func_maps.iter().cloned());
            for render in &scope.renders {
                for name in &render.template_names {
                    let mut vars: Vec<TemplateVar> = Vec::new();
                    let mut taken: HashSet<&str> = HashSet::new();
                    for var in render
                        .explicit_vars
                        .iter()
                        .chain(scope.set_vars.iter())
                        .chain(global_sets.iter())
                    {
                        if taken.insert(var.name.as_str()) {
                            vars.push(var.clone());
                        }
                    }
                    render_sites.push(RenderSite {
                        file: render.file.clone(),
                        line: render.line,
                        template_name_start_col: render.start_col,
                        template_name_end_col: render.end_col,
                        template_path: name.clone(),
                        vars,
                    });
                }
            }
        }

        // Workers finish in any order; the output order must not depend on
        // scheduling.
        render_sites.sort_by(|a, b| {
            (&a.file, a.line, &a.template_path).cmp(&(&b.file, b.line, &b.template_path))
        });
        func_maps.sort_by(|a, b| (&a.name, &a.def_file, a.def_line).cmp(&(&b.name, &b.def_file, b.def_line)));

        AnalysisResult {
            render_sites,
            func_maps,
            errors: self.filtered_errors(),
        }
    }

    fn filtered_errors(&self) -> Vec<String> {
        self.program
            .packages
            .iter()
            .flat_map(|p| p.errors.iter())
            .filter(|e| !IMPORT_ERROR_PHRASES.iter().any(|phrase| e.contains(phrase)))
            .cloned()
            .collect()
    }

    /// String-valued package constants, per package index.
    fn package_consts(&self) -> Vec<HashMap<String, String>> {
        self.program
            .packages
            .iter()
            .map(|pkg| {
                let mut consts = HashMap::new();
                for file in &pkg.files {
                    for decl in &file.decls {
                        if let Decl::Const(c) = decl {
                            if let Some(value) = &c.value {
                                consts.insert(c.name.clone(), value.clone());
                            }
                        }
                    }
                }
                consts
            })
            .collect()
    }

    /// Phase 1: top-level function bodies, nested function literals and
    /// top-level variable initializers, each as its own unit.
    fn enumerate_units(&self) -> Vec<WorkUnit<'a>> {
        let mut units = Vec::new();
        for (pkg_idx, pkg) in self.program.packages.iter().enumerate() {
            for file in &pkg.files {
                for decl in &file.decls {
                    match decl {
                        Decl::Func(func) => {
                            if let Some(body) = &func.body {
                                units.push(WorkUnit {
                                    pkg_idx,
                                    file: file.path.clone(),
                                    body: UnitBody::Borrowed(body),
                                });
                                collect_func_lits(body, pkg_idx, &file.path, &mut units);
                            }
                        }
                        Decl::Var(var) => {
                            // The initializer expressions themselves are a
                            // unit; literals inside become further units.
                            let stmts: Vec<Stmt> =
                                var.values.iter().cloned().map(Stmt::Expr).collect();
                            if !stmts.is_empty() {
                                units.push(WorkUnit {
                                    pkg_idx,
                                    file: file.path.clone(),
                                    body: UnitBody::Owned(Block { stmts }),
                                });
                            }
                            for value in &var.values {
                                collect_expr_func_lits(value, pkg_idx, &file.path, &mut units);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        units
    }

    fn process_unit(
        &self,
        unit: &WorkUnit<'_>,
        consts: &[HashMap<String, String>],
    ) -> FuncScope {
        let body = unit.block();
        let mut scope = FuncScope::default();

        // Pass 1: local symbols and function maps.
        let mut symbols: HashMap<String, Vec<String>> = HashMap::new();
        self.local_symbol_pass(body, unit, &mut symbols, &mut scope.func_maps);

        // Pass 2: renders and setters.
        self.template_op_pass(body, unit, &symbols, consts, &mut scope);

        scope
    }

    fn local_symbol_pass(
        &self,
        body: &Block,
        unit: &WorkUnit<'_>,
        symbols: &mut HashMap<String, Vec<String>>,
        func_maps: &mut Vec<FuncMapEntry>,
    ) {
        for_each_stmt(body, &mut |stmt| {
            if let Stmt::Assign { lhs, rhs, .. } = stmt {
                for (l, r) in lhs.iter().zip(rhs.iter()) {
                    if let (Some(name), Some(value)) = (l.as_ident(), r.as_str_lit()) {
                        symbols
                            .entry(name.to_string())
                            .or_default()
                            .push(value.to_string());
                    }
                    // Index assignment into a function map: m["key"] = fn
                    if let Expr::Index { recv, index, .. } = l {
                        if self.is_func_map_expr(recv) {
                            if let Some(key) = index.as_str_lit() {
                                func_maps.push(self.func_map_entry(unit, key, r));
                            }
                        }
                    }
                }
            }
        });

        // Function-map composites, wherever they appear in the body.
        for_each_expr(body, &mut |expr| {
            if let Expr::Composite { elems, .. } = expr {
                if self.is_func_map_expr(expr) {
                    for elem in elems {
                        let Some(key) = elem.key.as_ref().and_then(Expr::as_str_lit) else {
                            continue;
                        };
                        func_maps.push(self.func_map_entry(unit, key, &elem.value));
                    }
                }
            }
        });
    }

    fn template_op_pass(
        &self,
        body: &Block,
        unit: &WorkUnit<'_>,
        symbols: &HashMap<String, Vec<String>>,
        consts: &[HashMap<String, String>],
        scope: &mut FuncScope,
    ) {
        for_each_expr(body, &mut |expr| {
            let Expr::Call { fun, args, .. } = expr else {
                return;
            };
            match fun.as_ref() {
                Expr::Selector { recv, sel, .. } => {
                    if self.config.is_render_name(sel) {
                        // Method shape: template arg at position 0.
                        if let Some(render) = self.resolve_render(
                            unit,
                            symbols,
                            consts,
                            args.first(),
                            args.get(1),
                        ) {
                            scope.renders.push(render);
                        }
                    } else if self.config.is_set_name(sel) && self.receiver_is_context(recv) {
                        if let Some(var) = self.setter_var(args) {
                            scope.set_vars.push(var);
                        }
                    }
                }
                Expr::Ident { name, .. } if self.config.is_render_name(name) => {
                    // Free-function shape: first string-like argument.
                    let idx = args.iter().position(|a| {
                        self.template_names(a, unit.pkg_idx, symbols, consts).is_some()
                    });
                    if let Some(idx) = idx {
                        if let Some(render) = self.resolve_render(
                            unit,
                            symbols,
                            consts,
                            args.get(idx),
                            args.get(idx + 1),
                        ) {
                            scope.renders.push(render);
                        }
                    }
                }
                _ => {}
            }
        });
    }

    fn resolve_render(
        &self,
        unit: &WorkUnit<'_>,
        symbols: &HashMap<String, Vec<String>>,
        consts: &[HashMap<String, String>],
        template_arg: Option<&Expr>,
        data_arg: Option<&Expr>,
    ) -> Option<ResolvedRender> {
        let template_arg = template_arg?;
        let (names, start_col, end_col) =
            self.template_names(template_arg, unit.pkg_idx, symbols, consts)?;
        Some(ResolvedRender {
            file: unit.file.clone(),
            line: template_arg.pos().line,
            start_col,
            end_col,
            template_names: names,
            explicit_vars: data_arg.map(|d| self.data_map_vars(d)).unwrap_or_default(),
        })
    }

    /// Template names an argument resolves to: a literal, a local binding's
    /// literals (one site per literal), or a package constant. The column
    /// range is the name token; for literals the quotes are stripped.
    fn template_names(
        &self,
        arg: &Expr,
        pkg_idx: usize,
        symbols: &HashMap<String, Vec<String>>,
        consts: &[HashMap<String, String>],
    ) -> Option<(Vec<String>, u32, u32)> {
        match arg {
            Expr::StrLit { value, pos, .. } => Some((
                vec![value.clone()],
                pos.col + 1,
                pos.col + 1 + value.len() as u32,
            )),
            Expr::Ident { name, pos, .. } => {
                let end = pos.col + name.len() as u32;
                if let Some(literals) = symbols.get(name) {
                    let mut names: Vec<String> = literals.clone();
                    names.dedup();
                    return Some((names, pos.col, end));
                }
                consts
                    .get(pkg_idx)
                    .and_then(|c| c.get(name))
                    .map(|value| (vec![value.clone()], pos.col, end))
            }
            _ => None,
        }
    }

    /// Explicit data-map keys of a render call.
    fn data_map_vars(&self, data: &Expr) -> Vec<TemplateVar> {
        let data = match data {
            Expr::Unary { expr, .. } => expr.as_ref(),
            other => other,
        };
        let Expr::Composite { elems, .. } = data else {
            return Vec::new();
        };
        if self.is_func_map_expr(data) {
            return Vec::new();
        }
        let mut vars = Vec::new();
        for elem in elems {
            let Some(key) = elem.key.as_ref().and_then(Expr::as_str_lit) else {
                continue;
            };
            let ty = self.type_of(&elem.value).unwrap_or(TypeId::INVALID);
            vars.push(self.extractor.extract_var(key, ty));
        }
        vars
    }

    /// `ctx.Set("key", value)` → TemplateVar for `key` with `value`'s type.
    fn setter_var(&self, args: &[Expr]) -> Option<TemplateVar> {
        let key = args.first()?.as_str_lit()?;
        let value = args.get(1)?;
        let ty = self.type_of(value).unwrap_or(TypeId::INVALID);
        Some(self.extractor.extract_var(key, ty))
    }

    fn receiver_is_context(&self, recv: &Expr) -> bool {
        let Some(ty) = self.type_of(recv) else {
            return false;
        };
        let table = &self.program.types;
        match table.kind(table.deref(ty)) {
            TypeKind::Named { name, .. } => name == &self.config.context_type,
            _ => false,
        }
    }

    fn type_of(&self, expr: &Expr) -> Option<TypeId> {
        self.program.info.type_of(expr.id())
    }

    fn is_func_map_expr(&self, expr: &Expr) -> bool {
        if let Some(ty) = self.type_of(expr) {
            let table = &self.program.types;
            if let TypeKind::Named { name, .. } = table.kind(table.deref(ty)) {
                return name == "FuncMap";
            }
        }
        if let Expr::Composite { type_str, .. } = expr {
            return type_str.ends_with("FuncMap");
        }
        false
    }

    fn func_map_entry(&self, unit: &WorkUnit<'_>, name: &str, value: &Expr) -> FuncMapEntry {
        let table = &self.program.types;
        let (params, returns) = match self.type_of(value).map(|t| table.kind(table.deref(t))) {
            Some(TypeKind::Func { params, results }) => (
                params
                    .iter()
                    .map(|p| ParamSig {
                        name: p.name.clone(),
                        type_str: table.short(p.ty),
                    })
                    .collect(),
                results
                    .iter()
                    .map(|r| ParamSig {
                        name: r.name.clone(),
                        type_str: table.short(r.ty),
                    })
                    .collect(),
            ),
            _ => (Vec::new(), Vec::new()),
        };

        let pkg_name = self
            .program
            .packages
            .get(unit.pkg_idx)
            .map(|p| p.name.as_str())
            .unwrap_or_default();

        // A bound identifier points back at its function declaration.
        let (def_file, def_line, def_col, doc) = match value.as_ident() {
            Some(fname) => match index::find_func(self.program, pkg_name, fname) {
                Some((file, decl)) => (
                    file.to_string(),
                    decl.pos.line,
                    decl.pos.col,
                    decl.doc.clone(),
                ),
                None => (unit.file.clone(), value.pos().line, value.pos().col, None),
            },
            None => (unit.file.clone(), value.pos().line, value.pos().col, None),
        };

        FuncMapEntry {
            name: name.to_string(),
            def_file,
            def_line,
            def_col,
            doc,
            params,
            returns,
        }
    }
}

/// Visit every statement, descending into control flow but never into
/// function literals.
fn for_each_stmt<'b>(block: &'b Block, f: &mut impl FnMut(&'b Stmt)) {
    for stmt in &block.stmts {
        f(stmt);
        match stmt {
            Stmt::If { then, els, .. } => {
                for_each_stmt(then, f);
                if let Some(els) = els {
                    for_each_stmt(els, f);
                }
            }
            Stmt::For { body, .. } => for_each_stmt(body, f),
            Stmt::Block(inner) => for_each_stmt(inner, f),
            _ => {}
        }
    }
}

/// Visit every expression in the body. Nested function literals are
/// separate work units and are not entered.
fn for_each_expr<'b>(block: &'b Block, f: &mut impl FnMut(&'b Expr)) {
    for_each_stmt(block, &mut |stmt| {
        let mut visit = |expr: &'b Expr| visit_expr(expr, f);
        match stmt {
            Stmt::Assign { lhs, rhs, .. } => {
                lhs.iter().for_each(&mut visit);
                rhs.iter().for_each(&mut visit);
            }
            Stmt::Expr(expr) => visit(expr),
            Stmt::If { cond, .. } => visit(cond),
            Stmt::Return { results, .. } => results.iter().for_each(&mut visit),
            Stmt::For { .. } | Stmt::Block(_) => {}
        }
    });
}

fn visit_expr<'b>(expr: &'b Expr, f: &mut impl FnMut(&'b Expr)) {
    f(expr);
    match expr {
        Expr::Selector { recv, .. } => visit_expr(recv, f),
        Expr::Call { fun, args, .. } => {
            visit_expr(fun, f);
            for arg in args {
                visit_expr(arg, f);
            }
        }
        Expr::Composite { elems, .. } => {
            for elem in elems {
                if let Some(key) = &elem.key {
                    visit_expr(key, f);
                }
                visit_expr(&elem.value, f);
            }
        }
        Expr::Index { recv, index, .. } => {
            visit_expr(recv, f);
            visit_expr(index, f);
        }
        Expr::Unary { expr, .. } => visit_expr(expr, f),
        // Function literals are separate work units.
        Expr::FuncLit { .. } => {}
        Expr::Ident { .. } | Expr::StrLit { .. } | Expr::BasicLit { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::TypeTreeExtractor;
    use crate::fixtures::Builder;
    use crate::index::StructIndex;
    use templar_ast::host::{ConstDecl, Decl, Pos};
    use templar_ast::types::ParamDef;

    fn run(builder: &Builder, config: &CollectorConfig) -> AnalysisResult {
        let index = StructIndex::build(&builder.program);
        let extractor = TypeTreeExtractor::new(&builder.program.types, &index);
        Collector::new(&builder.program, &extractor, config).collect()
    }

    fn context_type(b: &mut Builder) -> templar_ast::types::TypeId {
        let ctx = b.strukt("rex", "Context", vec![]);
        b.ptr(ctx)
    }

    #[test]
    fn test_render_with_data_map() {
        let mut b = Builder::new();
        let string = b.basic("string");
        let user = b.strukt("models", "User", vec![("Name", string)]);
        let ctx = context_type(&mut b);

        let recv = b.ident("c", Some(ctx), Pos::new(10, 2));
        let render = b.selector(recv, "Render", None, Pos::new(10, 4));
        let name = b.strlit("index.html", Pos::new(10, 11));
        let user_val = b.ident("user", Some(user), Pos::new(10, 40));
        let key = b.strlit("User", Pos::new(10, 32));
        let data = b.composite("rex.Map", None, vec![(key, user_val)], Pos::new(10, 24));
        let call = b.call(render, vec![name, data], Pos::new(10, 4));
        b.func(
            "index",
            templar_ast::host::Block {
                stmts: vec![Builder::stmt_expr(call)],
            },
        );

        let result = run(&b, &CollectorConfig::default());
        assert_eq!(result.render_sites.len(), 1);
        let site = &result.render_sites[0];
        assert_eq!(site.template_path, "index.html");
        assert_eq!(site.file, "main.go");
        assert_eq!(site.line, 10);
        // Quote-stripped column range of the name literal.
        assert_eq!(site.template_name_start_col, 12);
        assert_eq!(site.template_name_end_col, 22);
        assert_eq!(site.vars.len(), 1);
        assert_eq!(site.vars[0].name, "User");
        assert_eq!(site.vars[0].fields[0].name, "Name");
    }

    #[test]
    fn test_one_site_per_assigned_literal() {
        let mut b = Builder::new();
        let ctx = context_type(&mut b);

        let lhs1 = b.ident("name", None, Pos::new(5, 2));
        let rhs1 = b.strlit("first.html", Pos::new(5, 10));
        let lhs2 = b.ident("name", None, Pos::new(6, 2));
        let rhs2 = b.strlit("second.html", Pos::new(6, 10));
        let recv = b.ident("c", Some(ctx), Pos::new(7, 2));
        let render = b.selector(recv, "Render", None, Pos::new(7, 4));
        let arg = b.ident("name", None, Pos::new(7, 11));
        let call = b.call(render, vec![arg], Pos::new(7, 4));

        b.func(
            "show",
            templar_ast::host::Block {
                stmts: vec![
                    templar_ast::host::Stmt::Assign {
                        lhs: vec![lhs1],
                        rhs: vec![rhs1],
                        define: true,
                        pos: Pos::new(5, 2),
                    },
                    templar_ast::host::Stmt::Assign {
                        lhs: vec![lhs2],
                        rhs: vec![rhs2],
                        define: false,
                        pos: Pos::new(6, 2),
                    },
                    Builder::stmt_expr(call),
                ],
            },
        );

        let result = run(&b, &CollectorConfig::default());
        let paths: Vec<&str> = result
            .render_sites
            .iter()
            .map(|s| s.template_path.as_str())
            .collect();
        assert_eq!(paths, vec!["first.html", "second.html"]);
    }

    #[test]
    fn test_constant_template_name() {
        let mut b = Builder::new();
        let ctx = context_type(&mut b);
        b.program.packages[0].files[0].decls.push(Decl::Const(ConstDecl {
            name: "homeTemplate".to_string(),
            value: Some("home.html".to_string()),
            pos: Pos::new(3, 7),
        }));

        let recv = b.ident("c", Some(ctx), Pos::new(9, 2));
        let render = b.selector(recv, "Render", None, Pos::new(9, 4));
        let arg = b.ident("homeTemplate", None, Pos::new(9, 11));
        let call = b.call(render, vec![arg], Pos::new(9, 4));
        b.func(
            "home",
            templar_ast::host::Block {
                stmts: vec![Builder::stmt_expr(call)],
            },
        );

        let result = run(&b, &CollectorConfig::default());
        assert_eq!(result.render_sites.len(), 1);
        assert_eq!(result.render_sites[0].template_path, "home.html");
    }

    #[test]
    fn test_global_implicit_setter_promotion() {
        let mut b = Builder::new();
        let string = b.basic("string");
        let ctx = context_type(&mut b);

        // Function A: sets "globalVar", never renders.
        let recv_a = b.ident("c", Some(ctx), Pos::new(20, 2));
        let set_a = b.selector(recv_a, "Set", None, Pos::new(20, 4));
        let key_a = b.strlit("globalVar", Pos::new(20, 8));
        let val_a = b.ident("version", Some(string), Pos::new(20, 20));
        let call_a = b.call(set_a, vec![key_a, val_a], Pos::new(20, 4));
        b.func(
            "middleware",
            templar_ast::host::Block {
                stmts: vec![Builder::stmt_expr(call_a)],
            },
        );

        // Function B: sets "localVarB" and renders viewB.html.
        let recv_b1 = b.ident("c", Some(ctx), Pos::new(30, 2));
        let set_b = b.selector(recv_b1, "Set", None, Pos::new(30, 4));
        let key_b = b.strlit("localVarB", Pos::new(30, 8));
        let val_b = b.ident("title", Some(string), Pos::new(30, 20));
        let call_set = b.call(set_b, vec![key_b, val_b], Pos::new(30, 4));

        let recv_b2 = b.ident("c", Some(ctx), Pos::new(31, 2));
        let render = b.selector(recv_b2, "Render", None, Pos::new(31, 4));
        let name = b.strlit("viewB.html", Pos::new(31, 11));
        let call_render = b.call(render, vec![name], Pos::new(31, 4));

        b.func(
            "viewB",
            templar_ast::host::Block {
                stmts: vec![Builder::stmt_expr(call_set), Builder::stmt_expr(call_render)],
            },
        );

        let result = run(&b, &CollectorConfig::default());
        assert_eq!(result.render_sites.len(), 1);
        let site = &result.render_sites[0];
        assert_eq!(site.template_path, "viewB.html");
        let names: Vec<&str> = site.vars.iter().map(|v| v.name.as_str()).collect();
        assert!(names.contains(&"localVarB"), "vars: {names:?}");
        assert!(names.contains(&"globalVar"), "vars: {names:?}");
    }

    #[test]
    fn test_setter_requires_context_type() {
        let mut b = Builder::new();
        let string = b.basic("string");
        let other = b.strukt("store", "Session", vec![]);
        let ctx = context_type(&mut b);

        // session.Set(...) has the wrong receiver type and is ignored.
        let recv = b.ident("session", Some(other), Pos::new(12, 2));
        let set = b.selector(recv, "Set", None, Pos::new(12, 10));
        let key = b.strlit("ignored", Pos::new(12, 14));
        let val = b.ident("v", Some(string), Pos::new(12, 25));
        let call_other = b.call(set, vec![key, val], Pos::new(12, 10));

        let recv2 = b.ident("c", Some(ctx), Pos::new(13, 2));
        let render = b.selector(recv2, "Render", None, Pos::new(13, 4));
        let name = b.strlit("x.html", Pos::new(13, 11));
        let call_render = b.call(render, vec![name], Pos::new(13, 4));

        b.func(
            "handler",
            templar_ast::host::Block {
                stmts: vec![
                    Builder::stmt_expr(call_other),
                    Builder::stmt_expr(call_render),
                ],
            },
        );

        let result = run(&b, &CollectorConfig::default());
        assert_eq!(result.render_sites.len(), 1);
        assert!(result.render_sites[0].vars.is_empty());
    }

    #[test]
    fn test_func_map_composite() {
        let mut b = Builder::new();
        let string = b.basic("string");
        let fn_ty = b.program.types.add(TypeKind::Func {
            params: vec![ParamDef {
                name: "s".to_string(),
                ty: string,
            }],
            results: vec![ParamDef {
                name: String::new(),
                ty: string,
            }],
        });
        let map_ty = {
            let any = b.program.types.add(TypeKind::Interface { methods: vec![] });
            b.map(string, any)
        };
        let func_map = b.program.types.add(TypeKind::Named {
            pkg: "template".to_string(),
            pkg_path: "html/template".to_string(),
            name: "FuncMap".to_string(),
            underlying: map_ty,
        });

        let upper = b.ident("upper", Some(fn_ty), Pos::new(8, 20));
        let key = b.strlit("upper", Pos::new(8, 10));
        let composite = b.composite(
            "template.FuncMap",
            Some(func_map),
            vec![(key, upper)],
            Pos::new(8, 9),
        );
        let lhs = b.ident("funcs", None, Pos::new(8, 2));
        b.func(
            "setup",
            templar_ast::host::Block {
                stmts: vec![templar_ast::host::Stmt::Assign {
                    lhs: vec![lhs],
                    rhs: vec![composite],
                    define: true,
                    pos: Pos::new(8, 2),
                }],
            },
        );

        let result = run(&b, &CollectorConfig::default());
        assert_eq!(result.func_maps.len(), 1);
        let entry = &result.func_maps[0];
        assert_eq!(entry.name, "upper");
        assert_eq!(entry.params.len(), 1);
        assert_eq!(entry.params[0].type_str, "string");
        assert_eq!(entry.returns[0].type_str, "string");
    }

    #[test]
    fn test_free_function_render_first_string_arg() {
        let mut b = Builder::new();
        let writer = b.basic("io.Writer");
        let w = b.ident("w", Some(writer), Pos::new(15, 20));
        let fun = b.ident("ExecuteTemplate", None, Pos::new(15, 2));
        let name = b.strlit("partial.html", Pos::new(15, 23));
        let call = b.call(fun, vec![w, name], Pos::new(15, 2));
        b.func(
            "renderPartial",
            templar_ast::host::Block {
                stmts: vec![Builder::stmt_expr(call)],
            },
        );

        let result = run(&b, &CollectorConfig::default());
        assert_eq!(result.render_sites.len(), 1);
        assert_eq!(result.render_sites[0].template_path, "partial.html");
    }

    #[test]
    fn test_import_errors_filtered() {
        let mut b = Builder::new();
        b.program.packages[0].errors = vec![
            "main.go:3:8: could not import example.com/missing (no package data)".to_string(),
            "main.go:9:2: undefined: helper".to_string(),
        ];
        let result = run(&b, &CollectorConfig::default());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("undefined: helper"));
    }

    #[test]
    fn test_disabled_render_name_sentinel() {
        let mut b = Builder::new();
        let ctx = context_type(&mut b);
        let recv = b.ident("c", Some(ctx), Pos::new(4, 2));
        let render = b.selector(recv, "Render", None, Pos::new(4, 4));
        let name = b.strlit("a.html", Pos::new(4, 11));
        let call = b.call(render, vec![name], Pos::new(4, 4));
        b.func(
            "h",
            templar_ast::host::Block {
                stmts: vec![Builder::stmt_expr(call)],
            },
        );

        let config = CollectorConfig {
            render_fn: DISABLED_FN.to_string(),
            execute_template_fn: DISABLED_FN.to_string(),
            ..Default::default()
        };
        let result = run(&b, &config);
        assert!(result.render_sites.is_empty());
    }
}

/// Collect nested function-literal bodies as work units.
fn collect_func_lits<'a>(
    block: &'a Block,
    pkg_idx: usize,
    file: &str,
    units: &mut Vec<WorkUnit<'a>>,
) {
    for_each_stmt(block, &mut |stmt| {
        let mut visit = |expr: &'a Expr| collect_expr_func_lits(expr, pkg_idx, file, units);
        match stmt {
            Stmt::Assign { lhs, rhs, .. } => {
                lhs.iter().for_each(&mut visit);
                rhs.iter().for_each(&mut visit);
            }
            Stmt::Expr(expr) => visit(expr),
            Stmt::If { cond, .. } => visit(cond),
            Stmt::Return { results, .. } => results.iter().for_each(&mut visit),
            Stmt::For { .. } | Stmt::Block(_) => {}
        }
    });
}

fn collect_expr_func_lits<'a>(
    expr: &'a Expr,
    pkg_idx: usize,
    file: &str,
    units: &mut Vec<WorkUnit<'a>>,
) {
    match expr {
        Expr::FuncLit { body, .. } => {
            units.push(WorkUnit {
                pkg_idx,
                file: file.to_string(),
                body: UnitBody::Borrowed(body),
            });
            collect_func_lits(body, pkg_idx, file, units);
        }
        Expr::Selector { recv, .. } => collect_expr_func_lits(recv, pkg_idx, file, units),
        Expr::Call { fun, args, .. } => {
            collect_expr_func_lits(fun, pkg_idx, file, units);
            for arg in args {
                collect_expr_func_lits(arg, pkg_idx, file, units);
            }
        }
        Expr::Composite { elems, .. } => {
            for elem in elems {
                if let Some(key) = &elem.key {
                    collect_expr_func_lits(key, pkg_idx, file, units);
                }
                collect_expr_func_lits(&elem.value, pkg_idx, file, units);
            }
        }
        Expr::Index { recv, index, .. } => {
            collect_expr_func_lits(recv, pkg_idx, file, units);
            collect_expr_func_lits(index, pkg_idx, file, units);
        }
        Expr::Unary { expr, .. } => collect_expr_func_lits(expr, pkg_idx, file, units),
        _ => {}
    }
}
