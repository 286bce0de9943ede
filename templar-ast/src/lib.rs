// Shared data model for the Templar analyzer.
//
// This crate owns the host-language source model handed over by the
// host front-end, the checked-type table, and the analysis records that
// every other crate exchanges.

pub mod host;
pub mod model;
pub mod template;
pub mod types;
pub mod typestr;

pub use host::{
    Block, CompositeElem, ConstDecl, Decl, Expr, ExprId, FieldSyntax, FuncDecl, HostProgram,
    Package, Pos, Receiver, SourceFile, Stmt, TypeDecl, VarDecl,
};
pub use model::{
    BlockLoc, DuplicateBlockError, FieldTree, FuncMapEntry, KnowledgeGraph, NamedBlock, ParamSig,
    RenderSite, TemplateContext, TemplateVar,
};
pub use template::{
    Action, ActionKind, BlockRegion, ExprNode, ParsedTemplate, PathExpr, PathRoot,
};
pub use types::{FieldDef, MethodDef, ParamDef, TypeId, TypeInfo, TypeKind, TypeTable};
