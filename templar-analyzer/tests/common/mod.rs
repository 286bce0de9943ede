//! Shared host-program fixtures for the integration tests.
#![allow(dead_code)]

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
            imports: vec!["example.com/app/models".to_string()],
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

    pub fn ptr(&mut self, inner: TypeId) -> TypeId {
        self.program.types.add(TypeKind::Pointer(inner))
    }

    fn ensure_pkg(&mut self, name: &str) -> usize {
        if let Some(i) = self.program.packages.iter().position(|p| p.name == name) {
            return i;
        }
        self.program.packages.push(Package {
            name: name.to_string(),
            import_path: format!("example.com/app/{name}"),
            imports: vec![],
            files: vec![SourceFile {
                path: format!("{name}/types.go"),
                decls: vec![],
            }],
            errors: vec![],
        });
        self.program.packages.len() - 1
    }

    pub fn strukt(&mut self, pkg: &str, name: &str, fields: Vec<(&str, TypeId)>) -> TypeId {
        let pkg_idx = self.ensure_pkg(pkg);
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

    pub fn func(&mut self, name: &str, body: Block) {
        let line = self.line();
        self.program.packages[0].files[0]
            .decls
            .push(Decl::Func(FuncDecl {
                name: name.to_string(),
                receiver: None,
                doc: None,
                pos: Pos::new(line, 1),
                body: Some(body),
            }));
    }

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

    pub fn selector(&mut self, recv: Expr, sel: &str, pos: Pos) -> Expr {
        let id = self.eid();
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
        elems: Vec<(Expr, Expr)>,
        pos: Pos,
    ) -> Expr {
        let id = self.eid();
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

    /// A rex-style context type (`*rex.Context`).
    pub fn context_type(&mut self) -> TypeId {
        let ctx = self.strukt("rex", "Context", vec![]);
        self.ptr(ctx)
    }

    /// `c.Render(template, rex.Map{ key: value, ... })` in a fresh handler
    /// function.
    pub fn render_call(
        &mut self,
        handler: &str,
        template: &str,
        data: Vec<(&str, TypeId)>,
        line: u32,
    ) {
        let ctx = self.context_type();
        let recv = self.ident("c", Some(ctx), Pos::new(line, 2));
        let render = self.selector(recv, "Render", Pos::new(line, 4));
        let name = self.strlit(template, Pos::new(line, 11));
        let elems: Vec<(Expr, Expr)> = data
            .into_iter()
            .enumerate()
            .map(|(i, (key, ty))| {
                let key_expr = self.strlit(key, Pos::new(line, 30 + i as u32 * 10));
                let value = self.ident(&key.to_lowercase(), Some(ty), Pos::new(line, 35 + i as u32 * 10));
                (key_expr, value)
            })
            .collect();
        let data_expr = self.composite("rex.Map", elems, Pos::new(line, 24));
        let call = self.call(render, vec![name, data_expr], Pos::new(line, 4));
        self.func(
            handler,
            Block {
                stmts: vec![Stmt::Expr(call)],
            },
        );
    }

    /// A `User{Name string, Age int, Address{City string}}` type.
    pub fn user_type(&mut self) -> TypeId {
        let string = self.basic("string");
        let int = self.basic("int");
        let address = self.strukt("models", "Address", vec![("City", string)]);
        self.strukt(
            "models",
            "User",
            vec![("Name", string), ("Age", int), ("Address", address)],
        )
    }

    /// An `Item{Name string}` slice type.
    pub fn items_type(&mut self) -> TypeId {
        let string = self.basic("string");
        let item = self.strukt("models", "Item", vec![("Name", string)]);
        self.slice(item)
    }
}
