//! Host-language source model.
//!
//! The host front-end parses and type-checks the host sources and hands the
//! result over as plain data: packages of files, declarations with positions
//! and comments, and expressions tagged with [`ExprId`]s that the
//! [`TypeInfo`](crate::types::TypeInfo) table maps to checked types. The
//! analyzer never parses host source text itself.

use serde::{Deserialize, Serialize};

use crate::types::{TypeId, TypeInfo, TypeTable};

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Identifier assigned by the front-end to every expression node.
///
/// Ids are only required to be unique within one [`HostProgram`]; they key
/// the type-info table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExprId(pub u32);

/// The complete analysis input produced by the host front-end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostProgram {
    pub packages: Vec<Package>,
    pub types: TypeTable,
    pub info: TypeInfo,
    /// Import path of the root package; the enricher's registry BFS starts
    /// here.
    pub root: String,
}

impl HostProgram {
    /// Look up a package by import path.
    pub fn package(&self, import_path: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.import_path == import_path)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Package {
    /// Short package name as used in qualified type keys (`name.Type`).
    pub name: String,
    pub import_path: String,
    /// Import paths of directly imported packages.
    pub imports: Vec<String>,
    pub files: Vec<SourceFile>,
    /// Type-check errors reported by the front-end for this package.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceFile {
    pub path: String,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Decl {
    Type(TypeDecl),
    Func(FuncDecl),
    Const(ConstDecl),
    Var(VarDecl),
}

/// A named type declaration.
///
/// Struct declarations carry their syntactic field list so the struct index
/// can recover per-field positions and comments; non-struct declarations
/// leave it empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeDecl {
    pub name: String,
    /// Checked named type.
    pub ty: TypeId,
    /// Leading block comment on the declaration.
    pub doc: Option<String>,
    /// Comment attached to the type spec inside a grouped declaration.
    pub spec_doc: Option<String>,
    /// Trailing inline comment.
    pub comment: Option<String>,
    pub pos: Pos,
    pub fields: Vec<FieldSyntax>,
}

/// Syntactic struct field: name, written type, comments, position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldSyntax {
    pub name: String,
    pub type_str: String,
    pub doc: Option<String>,
    pub comment: Option<String>,
    pub pos: Pos,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FuncDecl {
    pub name: String,
    pub receiver: Option<Receiver>,
    pub doc: Option<String>,
    pub pos: Pos,
    pub body: Option<Block>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Receiver {
    pub name: String,
    /// Receiver type name with any pointer marker stripped.
    pub type_name: String,
}

/// Top-level constant. Only string-valued constants participate in template
/// name resolution, so the value is kept as an optional string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConstDecl {
    pub name: String,
    pub value: Option<String>,
    pub pos: Pos,
}

/// Top-level variable declaration. Initializer expressions may contain
/// function literals, which the collector treats as separate work units.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VarDecl {
    pub names: Vec<String>,
    pub values: Vec<Expr>,
    pub pos: Pos,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stmt {
    Assign {
        lhs: Vec<Expr>,
        rhs: Vec<Expr>,
        /// `:=` short declaration rather than plain assignment.
        define: bool,
        pos: Pos,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then: Block,
        els: Option<Block>,
    },
    For {
        body: Block,
        pos: Pos,
    },
    Return {
        results: Vec<Expr>,
        pos: Pos,
    },
    Block(Block),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Expr {
    Ident {
        id: ExprId,
        name: String,
        pos: Pos,
    },
    /// String literal; `pos` points at the opening quote.
    StrLit {
        id: ExprId,
        value: String,
        pos: Pos,
    },
    /// Any other literal (numbers, booleans), kept as written.
    BasicLit {
        id: ExprId,
        value: String,
        pos: Pos,
    },
    /// `recv.sel`; `pos` points at the selector.
    Selector {
        id: ExprId,
        recv: Box<Expr>,
        sel: String,
        pos: Pos,
    },
    Call {
        id: ExprId,
        fun: Box<Expr>,
        args: Vec<Expr>,
        pos: Pos,
    },
    /// Composite literal `T{...}`; `type_str` is the written type.
    Composite {
        id: ExprId,
        type_str: String,
        elems: Vec<CompositeElem>,
        pos: Pos,
    },
    Index {
        id: ExprId,
        recv: Box<Expr>,
        index: Box<Expr>,
        pos: Pos,
    },
    FuncLit {
        id: ExprId,
        body: Block,
        pos: Pos,
    },
    Unary {
        id: ExprId,
        op: String,
        expr: Box<Expr>,
        pos: Pos,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeElem {
    pub key: Option<Expr>,
    pub value: Expr,
}

impl Expr {
    pub fn id(&self) -> ExprId {
        match self {
            Expr::Ident { id, .. }
            | Expr::StrLit { id, .. }
            | Expr::BasicLit { id, .. }
            | Expr::Selector { id, .. }
            | Expr::Call { id, .. }
            | Expr::Composite { id, .. }
            | Expr::Index { id, .. }
            | Expr::FuncLit { id, .. }
            | Expr::Unary { id, .. } => *id,
        }
    }

    pub fn pos(&self) -> Pos {
        match self {
            Expr::Ident { pos, .. }
            | Expr::StrLit { pos, .. }
            | Expr::BasicLit { pos, .. }
            | Expr::Selector { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::Composite { pos, .. }
            | Expr::Index { pos, .. }
            | Expr::FuncLit { pos, .. }
            | Expr::Unary { pos, .. } => *pos,
        }
    }

    /// String literal value, if this expression is one.
    pub fn as_str_lit(&self) -> Option<&str> {
        match self {
            Expr::StrLit { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Identifier name, if this expression is one.
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident { name, .. } => Some(name),
            _ => None,
        }
    }
}
