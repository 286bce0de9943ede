//! Struct index: one pass over every host AST file.
//!
//! Maps each qualified struct type (`pkg.Type`) to its declaration site, doc
//! comment and per-field positions/docs. Workers write to a concurrent map
//! that is frozen into a plain `HashMap` before any reader sees it. A second,
//! single-threaded pass attaches method documentation keyed by receiver type.

use std::collections::HashMap;

use dashmap::DashMap;
use log::debug;
use templar_ast::{
    host::{Decl, FuncDecl, HostProgram, SourceFile, TypeDecl},
    types::TypeKind,
};

use crate::pool;

/// Definition site and doc of one struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    pub file: String,
    pub line: u32,
    pub col: u32,
    pub doc: Option<String>,
}

/// One indexed struct type.
#[derive(Debug, Clone, Default)]
pub struct StructEntry {
    pub file: String,
    pub line: u32,
    pub col: u32,
    pub doc: Option<String>,
    pub fields: HashMap<String, FieldMeta>,
}

/// Method metadata from the second pass.
#[derive(Debug, Clone, Default)]
pub struct MethodMeta {
    pub file: String,
    pub line: u32,
    pub col: u32,
    pub doc: Option<String>,
}

#[derive(Debug, Default)]
pub struct StructIndex {
    structs: HashMap<String, StructEntry>,
    /// `pkg.Type` → method name → metadata.
    methods: HashMap<String, HashMap<String, MethodMeta>>,
}

impl StructIndex {
    /// Index every file of the program. Malformed declarations simply yield
    /// no entries.
    pub fn build(program: &HostProgram) -> Self {
        let concurrent: DashMap<String, StructEntry> = DashMap::new();

        let files: Vec<(&str, &SourceFile)> = program
            .packages
            .iter()
            .flat_map(|p| p.files.iter().map(move |f| (p.name.as_str(), f)))
            .collect();

        pool::for_each_parallel(files, |(pkg, file)| {
            index_file(program, pkg, file, &concurrent);
        });

        let structs: HashMap<String, StructEntry> = concurrent.into_iter().collect();
        debug!("struct index: {} struct types", structs.len());

        let mut index = Self {
            structs,
            methods: HashMap::new(),
        };
        index.attach_method_docs(program);
        index
    }

    /// Entry by qualified name (`pkg.Type`).
    pub fn entry(&self, key: &str) -> Option<&StructEntry> {
        self.structs.get(key)
    }

    pub fn method_meta(&self, type_key: &str, method: &str) -> Option<&MethodMeta> {
        self.methods.get(type_key).and_then(|m| m.get(method))
    }

    pub fn len(&self) -> usize {
        self.structs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structs.is_empty()
    }

    fn attach_method_docs(&mut self, program: &HostProgram) {
        for pkg in &program.packages {
            for file in &pkg.files {
                for decl in &file.decls {
                    let Decl::Func(func) = decl else { continue };
                    let Some(recv) = &func.receiver else { continue };
                    let key = format!("{}.{}", pkg.name, recv.type_name);
                    self.methods.entry(key).or_default().insert(
                        func.name.clone(),
                        MethodMeta {
                            file: file.path.clone(),
                            line: func.pos.line,
                            col: func.pos.col,
                            doc: func.doc.clone(),
                        },
                    );
                }
            }
        }
    }
}

fn index_file(
    program: &HostProgram,
    pkg: &str,
    file: &SourceFile,
    out: &DashMap<String, StructEntry>,
) {
    for decl in &file.decls {
        let Decl::Type(td) = decl else { continue };
        if !is_struct_decl(program, td) {
            continue;
        }

        let mut entry = StructEntry {
            file: file.path.clone(),
            line: td.pos.line,
            col: td.pos.col,
            doc: decl_doc(td),
            fields: HashMap::new(),
        };
        for field in &td.fields {
            entry.fields.insert(
                field.name.clone(),
                FieldMeta {
                    file: file.path.clone(),
                    line: field.pos.line,
                    col: field.pos.col,
                    doc: field.doc.clone().or_else(|| field.comment.clone()),
                },
            );
        }
        out.insert(format!("{}.{}", pkg, td.name), entry);
    }
}

/// Doc preference: leading block comment, then the grouped-spec comment,
/// then the trailing inline comment.
fn decl_doc(td: &TypeDecl) -> Option<String> {
    td.doc
        .clone()
        .or_else(|| td.spec_doc.clone())
        .or_else(|| td.comment.clone())
}

fn is_struct_decl(program: &HostProgram, td: &TypeDecl) -> bool {
    let underlying = program.types.underlying(program.types.deref(td.ty));
    matches!(program.types.kind(underlying), TypeKind::Struct { .. }) || !td.fields.is_empty()
}

/// Receiver-less functions are not methods; kept here so the collector can
/// find a package-level function declaration by name.
pub fn find_func<'a>(program: &'a HostProgram, pkg_name: &str, name: &str) -> Option<(&'a str, &'a FuncDecl)> {
    for pkg in &program.packages {
        if pkg.name != pkg_name {
            continue;
        }
        for file in &pkg.files {
            for decl in &file.decls {
                if let Decl::Func(func) = decl {
                    if func.receiver.is_none() && func.name == name {
                        return Some((file.path.as_str(), func));
                    }
                }
            }
        }
    }
    None
}
