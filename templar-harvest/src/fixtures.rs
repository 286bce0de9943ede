//! Test-only builder for host programs.

use templar_ast::host::{
    Block, CompositeElem, Decl, Expr, ExprId, FieldSyntax, FuncDecl, HostProgram, Package, Pos,
    SourceFile, Stmt, TypeDecl,
};
use templar_ast::types::{FieldDef, TypeId, TypeKind};

pub struct Builder {
    pub program: HostProgram,
    next_id: u32,
    next_line: u32,
}

impl Builder {
    pub fn new() -> Self {
        let mut program = HostProgram::default();
        program.root = "example.com/app".to_string();
        program.packages.push(Package {
            name: "main".to_string(),
            import_path: "example.com/app".to_string(),
            imports: vec![],
            files: vec![SourceFile {
                path: "main.go".to_string(),
                decls: vec![],
            }],
            errors: vec![],
        });
        Self {
            program,
            next_id: 0,
            next_line: 100,
        }
    }

    pub fn eid(&mut self) -> ExprId {
        self.next_id += 1;
        ExprId(self.next_id)
    }

    fn line(&mut self) -> u32 {
        self.next_line += 1;
        self.next_line
    }

    pub fn basic(&mut self, name: &str) -> TypeId {
        self.program.types.add(TypeKind::Basic(name.to_string()))
    }

    pub fn slice(&mut self, elem: TypeId) -> TypeId {
        self.program.types.add(TypeKind::Slice(elem))
    }

    pub fn map(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.program.types.add(TypeKind::Map { key, value })
    }

    pub fn ptr(&mut self, inner: TypeId) -> TypeId {
        self.program.types.add(TypeKind::Pointer(inner))
    }

    pub fn ensure_pkg(&mut self, name: &str, import_path: &str) -> usize {
        if let Some(i) = self
            .program
            .packages
            .iter()
            .position(|p| p.name == name)
        {
            return i;
        }
        self.program.packages.push(Package {
            name: name.to_string(),
            import_path: import_path.to_string(),
            imports: vec![],
            files: vec![SourceFile {
                path: format!("{name}/types.go"),
                decls: vec![],
            }],
            errors: vec![],
        });
        self.program.packages.len() - 1
    }

    /// Declare a named struct in `pkg` and index-visible syntax for it.
    pub fn strukt(&mut self, pkg: &str, name: &str, fields: Vec<(&str, TypeId)>) -> TypeId {
        let pkg_idx = self.ensure_pkg(pkg, &format!("example.com/app/{pkg}"));
        let import_path = self.program.packages[pkg_idx].import_path.clone();

        let defs: Vec<FieldDef> = fields
            .iter()
            .map(|(n, t)| FieldDef {
                name: n.to_string(),
                ty: *t,
            })
            .collect();
        let strukt = self.program.types.add(TypeKind::Struct { fields: defs });
        let named = self.program.types.add(TypeKind::Named {
            pkg: pkg.to_string(),
            pkg_path: import_path,
            name: name.to_string(),
            underlying: strukt,
        });

        let decl_line = self.line();
        let syntax: Vec<FieldSyntax> = fields
            .iter()
            .enumerate()
            .map(|(i, (n, t))| FieldSyntax {
                name: n.to_string(),
                type_str: self.program.types.short(*t),
                doc: None,
                comment: None,
                pos: Pos::new(decl_line + i as u32 + 1, 2),
            })
            .collect();
        self.program.packages[pkg_idx].files[0]
            .decls
            .push(Decl::Type(TypeDecl {
                name: name.to_string(),
                ty: named,
                doc: None,
                spec_doc: None,
                comment: None,
                pos: Pos::new(decl_line, 6),
                fields: syntax,
            }));
        named
    }

    /// Patch a previously declared struct's underlying field list (for
    /// cyclic graphs).
    pub fn set_struct_fields(&mut self, named: TypeId, fields: Vec<(&str, TypeId)>) {
        let underlying = self.program.types.underlying(named);
        let defs: Vec<FieldDef> = fields
            .iter()
            .map(|(n, t)| FieldDef {
                name: n.to_string(),
                ty: *t,
            })
            .collect();
        self.program.types.replace(underlying, TypeKind::Struct { fields: defs });
    }

    /// Add a top-level function with a body to `main`.
    pub fn func(&mut self, name: &str, body: Block) {
        let line = self.line();
        self.program.packages[0].files[0].decls.push(Decl::Func(FuncDecl {
            name: name.to_string(),
            receiver: None,
            doc: None,
            pos: Pos::new(line, 1),
            body: Some(body),
        }));
    }

    // ---- expressions -------------------------------------------------

    pub fn ident(&mut self, name: &str, ty: Option<TypeId>, pos: Pos) -> Expr {
        let id = self.eid();
        if let Some(ty) = ty {
            self.program.info.record(id, ty);
        }
        Expr::Ident {
            id,
            name: name.to_string(),
            pos,
        }
    }

    pub fn strlit(&mut self, value: &str, pos: Pos) -> Expr {
        let id = self.eid();
        Expr::StrLit {
            id,
            value: value.to_string(),
            pos,
        }
    }

    pub fn selector(&mut self, recv: Expr, sel: &str, ty: Option<TypeId>, pos: Pos) -> Expr {
        let id = self.eid();
        if let Some(ty) = ty {
            self.program.info.record(id, ty);
        }
        Expr::Selector {
            id,
            recv: Box::new(recv),
            sel: sel.to_string(),
            pos,
        }
    }

    pub fn call(&mut self, fun: Expr, args: Vec<Expr>, pos: Pos) -> Expr {
        let id = self.eid();
        Expr::Call {
            id,
            fun: Box::new(fun),
            args,
            pos,
        }
    }

    pub fn composite(
        &mut self,
        type_str: &str,
        ty: Option<TypeId>,
        elems: Vec<(Expr, Expr)>,
        pos: Pos,
    ) -> Expr {
        let id = self.eid();
        if let Some(ty) = ty {
            self.program.info.record(id, ty);
        }
        Expr::Composite {
            id,
            type_str: type_str.to_string(),
            elems: elems
                .into_iter()
                .map(|(k, v)| CompositeElem {
                    key: Some(k),
                    value: v,
                })
                .collect(),
            pos,
        }
    }

    pub fn stmt_expr(expr: Expr) -> Stmt {
        Stmt::Expr(expr)
    }
}
