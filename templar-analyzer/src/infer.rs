//! Expression type inference for action expressions.
//!
//! Used for editor hover and for typing template-local `$bindings`. Every
//! unsupported shape returns `None`; the collaborator treats that as
//! "unknown" and stays silent.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use templar_ast::model::{FieldTree, FuncMapEntry};
use templar_ast::template::ExprNode;
use templar_harvest::Enricher;

use crate::scope::{self, Resolution, ScopeStack};

static STRING_FUNCS: OnceLock<HashSet<&'static str>> = OnceLock::new();
static BOOL_FUNCS: OnceLock<HashSet<&'static str>> = OnceLock::new();
static NUMERIC_FUNCS: OnceLock<HashSet<&'static str>> = OnceLock::new();

fn string_funcs() -> &'static HashSet<&'static str> {
    STRING_FUNCS.get_or_init(|| {
        ["print", "printf", "println", "html", "js", "urlquery"]
            .into_iter()
            .collect()
    })
}

fn bool_funcs() -> &'static HashSet<&'static str> {
    BOOL_FUNCS.get_or_init(|| {
        ["eq", "ne", "lt", "le", "gt", "ge", "and", "or", "not"]
            .into_iter()
            .collect()
    })
}

fn numeric_funcs() -> &'static HashSet<&'static str> {
    NUMERIC_FUNCS.get_or_init(|| ["add", "sub", "mul", "div", "mod"].into_iter().collect())
}

pub struct Inferencer<'a> {
    func_maps: HashMap<&'a str, &'a FuncMapEntry>,
    /// Hydrates bare host type names with their field trees.
    hydrator: Option<&'a Enricher<'a>>,
}

impl<'a> Inferencer<'a> {
    pub fn new(func_maps: &'a [FuncMapEntry], hydrator: Option<&'a Enricher<'a>>) -> Self {
        Self {
            func_maps: func_maps.iter().map(|e| (e.name.as_str(), e)).collect(),
            hydrator,
        }
    }

    pub fn func_map(&self, name: &str) -> Option<&FuncMapEntry> {
        self.func_maps.get(name).copied()
    }

    /// Infer the value shape of an action expression under a scope stack.
    pub fn infer(&self, expr: &ExprNode, stack: &ScopeStack) -> Option<FieldTree> {
        match expr {
            ExprNode::Path(path) => match scope::resolve_path(stack, path) {
                Resolution::Ok(shape) => Some(shape),
                _ => None,
            },
            ExprNode::Str { .. } => Some(leaf("string")),
            ExprNode::Number { value, .. } => {
                if value.contains('.') {
                    Some(leaf("float64"))
                } else {
                    Some(leaf("int"))
                }
            }
            ExprNode::Bool { .. } => Some(leaf("bool")),
            ExprNode::Nil { .. } => None,
            ExprNode::Call { name, args, .. } => self.infer_call(name, args, stack),
            // Method results are not represented in field trees.
            ExprNode::PathCall { .. } => None,
            ExprNode::Paren { inner, trail, .. } => {
                let shape = self.infer(inner, stack)?;
                match trail {
                    None => Some(shape),
                    Some(trail) => descend(shape, &trail.segments),
                }
            }
            ExprNode::Pipeline { stages, .. } => {
                let last = stages.last()?;
                self.infer(last, stack)
            }
        }
    }

    fn infer_call(&self, name: &str, args: &[ExprNode], stack: &ScopeStack) -> Option<FieldTree> {
        if string_funcs().contains(name) {
            return Some(leaf("string"));
        }
        if bool_funcs().contains(name) {
            return Some(leaf("bool"));
        }
        if numeric_funcs().contains(name) {
            return Some(leaf("int"));
        }

        match name {
            "len" => Some(leaf("int")),
            "index" => {
                // index COLL k1 k2 ...: one element step per key.
                let mut shape = self.infer(args.first()?, stack)?;
                for _ in 1..args.len() {
                    if !(shape.is_map || shape.is_slice) {
                        return None;
                    }
                    shape = scope::element_shape(&shape);
                }
                Some(shape)
            }
            "slice" => self.infer(args.first()?, stack),
            _ => self.infer_user_func(name),
        }
    }

    fn infer_user_func(&self, name: &str) -> Option<FieldTree> {
        let entry = self.func_map(name)?;
        let ret = entry.returns.first()?;
        let mut shape = scope::shape_from_type_str(&ret.type_str, Vec::new());
        // A host type name hydrates with its full field tree.
        if let Some(hydrator) = self.hydrator {
            let hydrated = hydrator.var_from_type_string("", &ret.type_str);
            if !hydrated.fields.is_empty() {
                shape.fields = hydrated.fields;
                shape.is_map = hydrated.is_map;
                shape.is_slice = hydrated.is_slice;
                shape.key_type = hydrated.key_type;
                shape.elem_type = hydrated.elem_type;
            }
        }
        Some(shape)
    }
}

fn leaf(type_str: &str) -> FieldTree {
    FieldTree {
        type_str: type_str.to_string(),
        ..Default::default()
    }
}

fn descend(mut shape: FieldTree, segments: &[String]) -> Option<FieldTree> {
    for segment in segments {
        if shape.is_map || shape.is_slice {
            shape = scope::element_shape(&shape);
        }
        shape = shape.field(segment)?.clone();
    }
    Some(shape)
}
