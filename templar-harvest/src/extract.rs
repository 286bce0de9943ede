//! Type-tree extraction: the recursive expansion of a host type into a
//! [`FieldTree`] of exported fields and methods.
//!
//! Two traversal structures cooperate here and must not be confused:
//! the run-wide [`FieldCache`] memo, and the per-traversal seen-set that
//! breaks path cycles. The seen-set is forked (cloned) when descending into
//! slice or map element types, so sibling occurrences of one element type
//! expand independently; plain struct descent shares it.

use std::collections::HashSet;

use log::trace;
use templar_ast::{
    model::{FieldTree, TemplateVar},
    types::{MethodDef, TypeId, TypeKind, TypeTable},
};

use crate::cache::{FieldCache, TypeInterner};
use crate::index::StructIndex;

pub struct TypeTreeExtractor<'a> {
    table: &'a TypeTable,
    index: &'a StructIndex,
    interner: TypeInterner,
    cache: FieldCache,
}

impl<'a> TypeTreeExtractor<'a> {
    pub fn new(table: &'a TypeTable, index: &'a StructIndex) -> Self {
        Self {
            table,
            index,
            interner: TypeInterner::new(),
            cache: FieldCache::new(),
        }
    }

    pub fn table(&self) -> &TypeTable {
        self.table
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Expand a type into its exported field trees and doc comment.
    /// Unknown or unresolvable types yield an empty tree, never an error.
    pub fn extract(&self, id: TypeId) -> (Vec<FieldTree>, Option<String>) {
        let mut seen = HashSet::new();
        self.extract_inner(id, &mut seen)
    }

    /// Build a [`TemplateVar`] for a binding name with the full collection
    /// facets and field tree of its type.
    pub fn extract_var(&self, name: &str, id: TypeId) -> TemplateVar {
        let mut var = FieldTree {
            name: name.to_string(),
            ..Default::default()
        };
        let mut seen = HashSet::new();
        self.fill(&mut var, id, &mut seen);

        // Root vars point at their type's declaration site when known.
        if var.def_file.is_empty() {
            if let Some(key) = self.table.named_key(self.base_type(id)) {
                if let Some(entry) = self.index.entry(&key) {
                    var.def_file = entry.file.clone();
                    var.def_line = entry.line;
                    var.def_col = entry.col;
                    if var.doc.is_none() {
                        var.doc = entry.doc.clone();
                    }
                }
            }
        }
        var
    }

    /// Strip pointers, and for collections reach the element/value type.
    fn base_type(&self, id: TypeId) -> TypeId {
        let id = self.table.deref(id);
        match self.table.kind(id) {
            TypeKind::Slice(elem) | TypeKind::Array(elem) => self.table.deref(*elem),
            TypeKind::Map { value, .. } => self.table.deref(*value),
            _ => id,
        }
    }

    fn extract_inner(
        &self,
        id: TypeId,
        seen: &mut HashSet<TypeId>,
    ) -> (Vec<FieldTree>, Option<String>) {
        let id = self.table.deref(id);

        // A map at the root unwraps to its value type.
        if let TypeKind::Map { value, .. } = self.table.kind(id) {
            return self.extract_inner(*value, seen);
        }

        match self.table.kind(id) {
            TypeKind::Named { underlying, .. } => {
                let underlying = self.table.deref(*underlying);
                match self.table.kind(underlying) {
                    TypeKind::Struct { .. } => self.extract_named_struct(id, underlying, seen),
                    TypeKind::Interface { methods } => {
                        // Interface method sets are ambiguous at the cache's
                        // key granularity; emitted fresh every time.
                        (self.method_entries(methods, None), None)
                    }
                    // Named map/slice aliases unwrap like their underlying.
                    TypeKind::Map { .. } | TypeKind::Slice(_) | TypeKind::Array(_) => {
                        self.extract_inner(underlying, seen)
                    }
                    _ => (Vec::new(), None),
                }
            }
            TypeKind::Struct { fields } => {
                let fields = fields.clone();
                (self.struct_fields(&fields, None, seen), None)
            }
            TypeKind::Interface { methods } => (self.method_entries(methods, None), None),
            _ => (Vec::new(), None),
        }
    }

    fn extract_named_struct(
        &self,
        id: TypeId,
        underlying: TypeId,
        seen: &mut HashSet<TypeId>,
    ) -> (Vec<FieldTree>, Option<String>) {
        let handle = self.interner.handle(self.table, id);
        if let Some(cached) = self.cache.get(handle) {
            return (cached.fields.clone(), cached.doc.clone());
        }
        if seen.contains(&handle) {
            // Path cycle: truncate here.
            trace!("cycle truncated at {:?}", self.table.short(id));
            return (Vec::new(), None);
        }
        seen.insert(handle);

        let key = self.table.named_key(id);
        let entry = key.as_deref().and_then(|k| self.index.entry(k));
        let doc = entry.and_then(|e| e.doc.clone());

        let TypeKind::Struct { fields } = self.table.kind(underlying) else {
            return (Vec::new(), None);
        };
        let fields = fields.clone();
        let mut out = self.struct_fields(&fields, key.as_deref(), seen);

        // Exported methods of the named type come after the fields.
        let methods = key
            .as_deref()
            .map(|k| self.table.methods_of(k).to_vec())
            .unwrap_or_default();
        out.extend(self.method_entries(&methods, key.as_deref()));

        self.cache.insert(handle, out.clone(), doc.clone());
        (out, doc)
    }

    fn struct_fields(
        &self,
        fields: &[templar_ast::types::FieldDef],
        owner_key: Option<&str>,
        seen: &mut HashSet<TypeId>,
    ) -> Vec<FieldTree> {
        let entry = owner_key.and_then(|k| self.index.entry(k));
        let mut out = Vec::new();
        for field in fields {
            if !field.is_exported() {
                continue;
            }
            let mut tree = FieldTree {
                name: field.name.clone(),
                ..Default::default()
            };
            if let Some(meta) = entry.and_then(|e| e.fields.get(&field.name)) {
                tree.def_file = meta.file.clone();
                tree.def_line = meta.line;
                tree.def_col = meta.col;
                tree.doc = meta.doc.clone();
            }
            self.fill(&mut tree, field.ty, seen);
            out.push(tree);
        }
        out
    }

    /// Fill type string, collection facets and child fields for a tree node.
    /// Unresolvable types leave the node empty (the validator treats an
    /// untyped value as opaque).
    pub fn fill(&self, tree: &mut FieldTree, id: TypeId, seen: &mut HashSet<TypeId>) {
        let id = self.table.deref(id);
        if matches!(self.table.kind(id), TypeKind::Invalid) {
            return;
        }
        tree.type_str = self.table.short(id);

        match self.table.kind(id) {
            TypeKind::Slice(elem) | TypeKind::Array(elem) => {
                tree.is_slice = true;
                tree.elem_type = Some(self.table.short(*elem));
                // Forked seen-set: sibling slice fields of one element type
                // must both expand.
                let mut forked = seen.clone();
                tree.fields = self.extract_inner(*elem, &mut forked).0;
            }
            TypeKind::Map { key, value } => {
                tree.is_map = true;
                tree.key_type = Some(self.table.short(*key));
                tree.elem_type = Some(self.table.short(*value));
                let mut forked = seen.clone();
                tree.fields = self.extract_inner(*value, &mut forked).0;
            }
            TypeKind::Named { underlying, .. } => {
                let underlying = self.table.deref(*underlying);
                match self.table.kind(underlying) {
                    TypeKind::Slice(elem) | TypeKind::Array(elem) => {
                        tree.is_slice = true;
                        tree.elem_type = Some(self.table.short(*elem));
                        let mut forked = seen.clone();
                        tree.fields = self.extract_inner(*elem, &mut forked).0;
                    }
                    TypeKind::Map { key, value } => {
                        tree.is_map = true;
                        tree.key_type = Some(self.table.short(*key));
                        tree.elem_type = Some(self.table.short(*value));
                        let mut forked = seen.clone();
                        tree.fields = self.extract_inner(*value, &mut forked).0;
                    }
                    _ => {
                        let (fields, doc) = self.extract_inner(id, seen);
                        tree.fields = fields;
                        if tree.doc.is_none() {
                            tree.doc = doc;
                        }
                    }
                }
            }
            TypeKind::Struct { .. } | TypeKind::Interface { .. } => {
                let (fields, _) = self.extract_inner(id, seen);
                tree.fields = fields;
            }
            _ => {}
        }
    }

    fn method_entries(&self, methods: &[MethodDef], owner_key: Option<&str>) -> Vec<FieldTree> {
        let mut out: Vec<FieldTree> = methods
            .iter()
            .filter(|m| m.is_exported())
            .map(|m| self.method_entry(m, owner_key))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    fn method_entry(&self, method: &MethodDef, owner_key: Option<&str>) -> FieldTree {
        let signature = self.signature(method);
        let meta = owner_key.and_then(|k| self.index.method_meta(k, &method.name));

        let doc = match meta.and_then(|m| m.doc.clone()) {
            Some(doc) => format!("{}\n{}", signature, doc),
            None => signature,
        };

        FieldTree {
            name: method.name.clone(),
            type_str: "method".to_string(),
            doc: Some(doc),
            def_file: meta.map(|m| m.file.clone()).unwrap_or_default(),
            def_line: meta.map(|m| m.line).unwrap_or_default(),
            def_col: meta.map(|m| m.col).unwrap_or_default(),
            ..Default::default()
        }
    }

    /// Derived `func(a T, b U) (R, error)` signature text.
    pub fn signature(&self, method: &MethodDef) -> String {
        let params: Vec<String> = method
            .params
            .iter()
            .map(|p| {
                if p.name.is_empty() {
                    self.table.short(p.ty)
                } else {
                    format!("{} {}", p.name, self.table.short(p.ty))
                }
            })
            .collect();
        let results: Vec<String> = method.results.iter().map(|r| self.table.short(r.ty)).collect();
        match results.len() {
            0 => format!("func({})", params.join(", ")),
            1 => format!("func({}) {}", params.join(", "), results[0]),
            _ => format!("func({}) ({})", params.join(", "), results.join(", ")),
        }
    }
}
