//! Scope tracking: the stack of dot-contexts maintained while walking a
//! template's action stream, and path resolution against it.
//!
//! Shapes are carried as [`FieldTree`]s whose `name` is irrelevant; an empty
//! `type_str` with no fields marks an *opaque* value (unresolvable type),
//! which suppresses field diagnostics instead of cascading them.

use std::collections::{BTreeMap, HashMap};

use templar_ast::{
    model::{FieldTree, TemplateVar},
    template::{PathExpr, PathRoot},
    typestr,
};

pub const ROOT_KEY: &str = "root";
pub const DOT_KEY: &str = ".";

#[derive(Debug, Clone, Default)]
pub struct ScopeFrame {
    /// `"."` for frames that re-bind the dot, `"root"` for the outermost.
    pub key: String,
    pub type_str: String,
    pub fields: Vec<FieldTree>,
    pub is_slice: bool,
    pub is_map: bool,
    pub key_type: Option<String>,
    pub elem_type: Option<String>,
    /// Dot value could not be typed; field lookups pass silently.
    pub opaque: bool,
    /// Template-local `$bindings` registered on this frame.
    pub locals: HashMap<String, FieldTree>,
}

impl ScopeFrame {
    pub fn root(vars: &BTreeMap<String, TemplateVar>) -> Self {
        Self {
            key: ROOT_KEY.to_string(),
            fields: vars.values().cloned().collect(),
            ..Default::default()
        }
    }

    pub fn from_shape(shape: &FieldTree) -> Self {
        Self {
            key: DOT_KEY.to_string(),
            type_str: shape.type_str.clone(),
            fields: shape.fields.clone(),
            is_slice: shape.is_slice,
            is_map: shape.is_map,
            key_type: shape.key_type.clone(),
            elem_type: shape.elem_type.clone(),
            opaque: is_opaque(shape),
            locals: HashMap::new(),
        }
    }

    pub fn opaque() -> Self {
        Self {
            key: DOT_KEY.to_string(),
            opaque: true,
            ..Default::default()
        }
    }

    pub fn is_root(&self) -> bool {
        self.key == ROOT_KEY
    }

    pub fn field(&self, name: &str) -> Option<&FieldTree> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The frame's value as a shape (for bare `.`).
    pub fn as_shape(&self) -> FieldTree {
        FieldTree {
            type_str: self.type_str.clone(),
            fields: self.fields.clone(),
            is_slice: self.is_slice,
            is_map: self.is_map,
            key_type: self.key_type.clone(),
            elem_type: self.elem_type.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub fn new(vars: &BTreeMap<String, TemplateVar>) -> Self {
        Self {
            frames: vec![ScopeFrame::root(vars)],
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Exactly the root frame remains.
    pub fn is_balanced(&self) -> bool {
        self.frames.len() == 1
    }

    pub fn top(&self) -> &ScopeFrame {
        self.frames.last().unwrap_or_else(|| unreachable_root())
    }

    pub fn root(&self) -> &ScopeFrame {
        self.frames.first().unwrap_or_else(|| unreachable_root())
    }

    pub fn push(&mut self, frame: ScopeFrame) {
        self.frames.push(frame);
    }

    /// Push a copy of the current top (for `if`: dot unchanged, `end` still
    /// pops).
    pub fn push_copy(&mut self) {
        let mut copy = self.top().clone();
        copy.locals = HashMap::new();
        self.frames.push(copy);
    }

    pub fn pop(&mut self) -> Option<ScopeFrame> {
        if self.frames.len() <= 1 {
            return None;
        }
        self.frames.pop()
    }

    pub fn declare_local(&mut self, name: &str, mut shape: FieldTree) {
        shape.name = name.to_string();
        if let Some(top) = self.frames.last_mut() {
            top.locals.insert(name.to_string(), shape);
        }
    }

    pub fn lookup_local(&self, name: &str) -> Option<&FieldTree> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.locals.get(name))
    }
}

// The root frame is never popped; `pop` refuses to drain it.
fn unreachable_root() -> ! {
    unreachable!("scope stack lost its root frame")
}

/// `true` when a value's type could not be resolved.
pub fn is_opaque(shape: &FieldTree) -> bool {
    shape.type_str.is_empty() && shape.fields.is_empty() && !shape.is_map && !shape.is_slice
}

/// Shape of a collection's element (slice element or map value). Nested
/// collections are decoded from the element type string.
pub fn element_shape(node: &FieldTree) -> FieldTree {
    let elem = match &node.elem_type {
        Some(elem) => elem.clone(),
        None => node
            .type_str
            .strip_prefix("[]")
            .unwrap_or(&node.type_str)
            .to_string(),
    };
    shape_from_type_str(&elem, node.fields.clone())
}

/// Build a shape from a written type string, reusing already expanded
/// fields (per the tree invariant they belong to the innermost value type).
pub fn shape_from_type_str(type_str: &str, fields: Vec<FieldTree>) -> FieldTree {
    if let Some((key, value)) = typestr::split_map(type_str) {
        return FieldTree {
            type_str: type_str.to_string(),
            is_map: true,
            key_type: Some(key.to_string()),
            elem_type: Some(value.to_string()),
            fields,
            ..Default::default()
        };
    }
    if let Some(elem) = type_str.strip_prefix("[]") {
        return FieldTree {
            type_str: type_str.to_string(),
            is_slice: true,
            elem_type: Some(elem.to_string()),
            fields,
            ..Default::default()
        };
    }
    FieldTree {
        type_str: type_str.to_string(),
        fields,
        ..Default::default()
    }
}

/// Short display name of a type for diagnostics (`models.Address` →
/// `Address`).
pub fn owner_name(type_str: &str) -> String {
    let (_, base) = typestr::split_prefix(type_str);
    match base.rfind('.') {
        Some(idx) => base[idx + 1..].to_string(),
        None => base.to_string(),
    }
}

/// Result of resolving one path expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Resolved; carries the value's shape.
    Ok(FieldTree),
    /// Resolution passed through an untyped value; nothing to report.
    Opaque,
    /// The root segment is not a context variable.
    UnknownVariable { name: String },
    /// An intermediate type exists but lacks the field.
    UnknownField { field: String, owner: String },
    /// `$name` does not correspond to a tracked local.
    UntrackedLocal { name: String },
}

/// Resolve a path expression against the scope stack.
pub fn resolve_path(stack: &ScopeStack, path: &PathExpr) -> Resolution {
    match &path.root {
        PathRoot::Var(name) => match stack.lookup_local(name) {
            Some(local) => walk_segments(local.clone(), &path.segments),
            None => Resolution::UntrackedLocal {
                name: format!("${name}"),
            },
        },
        PathRoot::Root => {
            let root = stack.root();
            if path.is_bare() {
                return Resolution::Ok(root.as_shape());
            }
            resolve_in_frame(root, &path.segments, true)
        }
        PathRoot::Dot => {
            let top = stack.top();
            if path.is_bare() {
                return Resolution::Ok(top.as_shape());
            }
            if top.opaque {
                return Resolution::Opaque;
            }
            match resolve_in_frame(top, &path.segments, top.is_root()) {
                // A single-selector miss in a scoped frame falls through to
                // the root context.
                Resolution::UnknownField { .. } | Resolution::UnknownVariable { .. }
                    if !top.is_root() && path.segments.len() == 1 =>
                {
                    resolve_in_frame(stack.root(), &path.segments, true)
                }
                other => other,
            }
        }
    }
}

fn resolve_in_frame(frame: &ScopeFrame, segments: &[String], as_root: bool) -> Resolution {
    let Some(first) = segments.first() else {
        return Resolution::Ok(frame.as_shape());
    };

    // A map dot consumes the first selector as a key.
    if frame.is_map {
        let value = element_shape(&frame.as_shape());
        return walk_segments(value, &segments[1..]);
    }

    match frame.field(first) {
        Some(field) => walk_segments(field.clone(), &segments[1..]),
        None if as_root => Resolution::UnknownVariable {
            name: first.clone(),
        },
        None => Resolution::UnknownField {
            field: first.clone(),
            owner: owner_name(&frame.type_str),
        },
    }
}

fn walk_segments(mut current: FieldTree, segments: &[String]) -> Resolution {
    let mut idx = 0;
    while idx < segments.len() {
        if is_opaque(&current) || current.type_str == "method" {
            return Resolution::Opaque;
        }
        if current.is_map {
            // Any single key is valid; descend into the value shape.
            current = element_shape(&current);
            idx += 1;
            continue;
        }
        if current.is_slice {
            // Lenient: selectors on a slice resolve against the element.
            current = element_shape(&current);
            continue;
        }
        let segment = &segments[idx];
        match current.field(segment) {
            Some(field) => {
                current = field.clone();
                idx += 1;
            }
            None => {
                return Resolution::UnknownField {
                    field: segment.clone(),
                    owner: owner_name(&current.type_str),
                }
            }
        }
    }
    Resolution::Ok(current)
}
