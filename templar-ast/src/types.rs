//! Checked-type table.
//!
//! Types are stored once in a flat table and referenced by [`TypeId`], so
//! cyclic host type graphs (`type Node struct { Next *Node }`) are
//! representable without reference cycles. The front-end fills the table and
//! records each expression's checked type in [`TypeInfo`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::host::ExprId;

/// Handle into the [`TypeTable`]. Id 0 is always the invalid type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const INVALID: TypeId = TypeId(0);

    pub fn is_invalid(&self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeKind {
    Invalid,
    /// Predeclared type: `string`, `int`, `bool`, ...
    Basic(String),
    Named {
        /// Short package name.
        pkg: String,
        /// Full import path; empty for types in the universe scope.
        pkg_path: String,
        name: String,
        underlying: TypeId,
    },
    Pointer(TypeId),
    Slice(TypeId),
    Array(TypeId),
    Map {
        key: TypeId,
        value: TypeId,
    },
    Struct {
        fields: Vec<FieldDef>,
    },
    Interface {
        methods: Vec<MethodDef>,
    },
    Func {
        params: Vec<ParamDef>,
        results: Vec<ParamDef>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeId,
}

impl FieldDef {
    /// Exported fields start with an upper-case letter.
    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(|c| c.is_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParamDef {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    pub results: Vec<ParamDef>,
}

impl MethodDef {
    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(|c| c.is_uppercase())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeTable {
    kinds: Vec<TypeKind>,
    /// Exported methods per qualified named type (`pkg.Type`).
    methods: HashMap<String, Vec<MethodDef>>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        Self {
            kinds: vec![TypeKind::Invalid],
            methods: HashMap::new(),
        }
    }

    pub fn add(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind);
        id
    }

    /// Replace a previously added entry. Front-ends use this to tie cyclic
    /// type graphs: add a placeholder, then patch it once the members exist.
    pub fn replace(&mut self, id: TypeId, kind: TypeKind) {
        if let Some(slot) = self.kinds.get_mut(id.0 as usize) {
            *slot = kind;
        }
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        self.kinds.get(id.0 as usize).unwrap_or(&TypeKind::Invalid)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.len() <= 1
    }

    pub fn add_method(&mut self, qualified: &str, method: MethodDef) {
        self.methods.entry(qualified.to_string()).or_default().push(method);
    }

    pub fn methods_of(&self, qualified: &str) -> &[MethodDef] {
        self.methods.get(qualified).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Strip pointer wrappers.
    pub fn deref(&self, mut id: TypeId) -> TypeId {
        while let TypeKind::Pointer(inner) = self.kind(id) {
            id = *inner;
        }
        id
    }

    /// Qualified `pkg.Name` key for a named type, after stripping pointers.
    pub fn named_key(&self, id: TypeId) -> Option<String> {
        match self.kind(self.deref(id)) {
            TypeKind::Named { pkg, name, .. } if !pkg.is_empty() => {
                Some(format!("{}.{}", pkg, name))
            }
            TypeKind::Named { name, .. } => Some(name.clone()),
            _ => None,
        }
    }

    /// Underlying type of a named type (identity for everything else).
    pub fn underlying(&self, id: TypeId) -> TypeId {
        match self.kind(id) {
            TypeKind::Named { underlying, .. } => *underlying,
            _ => id,
        }
    }

    /// Render the type in host syntax with full package paths, e.g.
    /// `[]*example.com/app/models.User` or `map[string]int`.
    ///
    /// Named types never recurse into their underlying type, so cyclic
    /// graphs render in finite time.
    pub fn display(&self, id: TypeId) -> String {
        match self.kind(id) {
            TypeKind::Invalid => "<invalid>".to_string(),
            TypeKind::Basic(name) => name.clone(),
            TypeKind::Named {
                pkg, pkg_path, name, ..
            } => {
                if !pkg_path.is_empty() {
                    format!("{}.{}", pkg_path, name)
                } else if !pkg.is_empty() {
                    format!("{}.{}", pkg, name)
                } else {
                    name.clone()
                }
            }
            TypeKind::Pointer(inner) => format!("*{}", self.display(*inner)),
            TypeKind::Slice(inner) => format!("[]{}", self.display(*inner)),
            TypeKind::Array(inner) => format!("[]{}", self.display(*inner)),
            TypeKind::Map { key, value } => {
                format!("map[{}]{}", self.display(*key), self.display(*value))
            }
            TypeKind::Struct { .. } => "struct{...}".to_string(),
            TypeKind::Interface { methods } if methods.is_empty() => "any".to_string(),
            TypeKind::Interface { .. } => "interface{...}".to_string(),
            TypeKind::Func { .. } => "func".to_string(),
        }
    }

    /// Normalized short form of [`display`](Self::display): collection
    /// prefixes preserved, package path shortened to its last segment.
    pub fn short(&self, id: TypeId) -> String {
        crate::typestr::normalize(&self.display(id))
    }
}

/// Expression → checked type, as recorded by the host type checker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeInfo {
    pub expr_types: HashMap<u32, TypeId>,
}

impl TypeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: ExprId, ty: TypeId) {
        self.expr_types.insert(id.0, ty);
    }

    pub fn type_of(&self, id: ExprId) -> Option<TypeId> {
        self.expr_types.get(&id.0).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_display_terminates() {
        let mut table = TypeTable::new();
        // type Node struct { Next *Node }
        let strukt = table.add(TypeKind::Struct { fields: vec![] });
        let node = table.add(TypeKind::Named {
            pkg: "list".to_string(),
            pkg_path: "example.com/list".to_string(),
            name: "Node".to_string(),
            underlying: strukt,
        });
        let ptr = table.add(TypeKind::Pointer(node));
        // Close the cycle.
        table.replace(
            strukt,
            TypeKind::Struct {
                fields: vec![FieldDef {
                    name: "Next".to_string(),
                    ty: ptr,
                }],
            },
        );
        assert_eq!(table.display(ptr), "*example.com/list.Node");
        assert_eq!(table.short(ptr), "*list.Node");
    }

    #[test]
    fn test_named_key_strips_pointers() {
        let mut table = TypeTable::new();
        let strukt = table.add(TypeKind::Struct { fields: vec![] });
        let user = table.add(TypeKind::Named {
            pkg: "models".to_string(),
            pkg_path: "example.com/app/models".to_string(),
            name: "User".to_string(),
            underlying: strukt,
        });
        let ptr = table.add(TypeKind::Pointer(user));
        assert_eq!(table.named_key(ptr).as_deref(), Some("models.User"));
    }
}
