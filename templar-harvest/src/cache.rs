//! Field cache keyed by interned type handles.
//!
//! The interner canonicalizes every named type to one representative
//! [`TypeId`] per qualified name, so structurally duplicated table entries
//! share a cache slot. The cache itself is append-only for the life of one
//! analysis: once a type is cached it is never recomputed.
//!
//! This is deliberately a different structure from the extractor's
//! per-traversal seen-set: the cache is a run-wide memo, the seen-set is a
//! path guard.

use std::sync::Arc;

use dashmap::DashMap;
use templar_ast::{
    model::FieldTree,
    types::{TypeId, TypeTable},
};

/// Canonical handle per qualified named type.
#[derive(Debug, Default)]
pub struct TypeInterner {
    canon: DashMap<String, TypeId>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical id for `id`. Unnamed types are their own handle.
    pub fn handle(&self, table: &TypeTable, id: TypeId) -> TypeId {
        let id = table.deref(id);
        match table.named_key(id) {
            Some(key) => *self.canon.entry(key).or_insert(id),
            None => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedFields {
    pub fields: Vec<FieldTree>,
    pub doc: Option<String>,
}

/// Read-mostly memo of expanded named struct types. Readers share dashmap
/// shard locks; the rare writer takes a shard exclusively.
#[derive(Debug, Default)]
pub struct FieldCache {
    entries: DashMap<TypeId, Arc<CachedFields>>,
}

impl FieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: TypeId) -> Option<Arc<CachedFields>> {
        self.entries.get(&handle).map(|e| Arc::clone(&e))
    }

    pub fn insert(&self, handle: TypeId, fields: Vec<FieldTree>, doc: Option<String>) {
        self.entries
            .entry(handle)
            .or_insert_with(|| Arc::new(CachedFields { fields, doc }));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use templar_ast::types::TypeKind;

    #[test]
    fn test_interner_canonicalizes_duplicates() {
        let mut table = TypeTable::new();
        let s1 = table.add(TypeKind::Struct { fields: vec![] });
        let a = table.add(TypeKind::Named {
            pkg: "m".to_string(),
            pkg_path: "example.com/m".to_string(),
            name: "T".to_string(),
            underlying: s1,
        });
        let b = table.add(TypeKind::Named {
            pkg: "m".to_string(),
            pkg_path: "example.com/m".to_string(),
            name: "T".to_string(),
            underlying: s1,
        });
        let ptr = table.add(TypeKind::Pointer(a));

        let interner = TypeInterner::new();
        let ha = interner.handle(&table, a);
        let hb = interner.handle(&table, b);
        let hp = interner.handle(&table, ptr);
        assert_eq!(ha, hb);
        assert_eq!(ha, hp);
    }

    #[test]
    fn test_cache_first_write_wins() {
        let cache = FieldCache::new();
        let handle = TypeId(7);
        cache.insert(handle, vec![FieldTree::leaf("A", "string")], None);
        cache.insert(handle, vec![], Some("late".to_string()));
        let cached = cache.get(handle).expect("cached");
        assert_eq!(cached.fields.len(), 1);
        assert_eq!(cached.doc, None);
    }
}
