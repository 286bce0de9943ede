//! Context-file enrichment.
//!
//! The optional JSON file declares extra render-context variables per
//! template (plus one global entry). Type strings use host syntax
//! (`[]models.User`, `map[string]Item`); they are resolved against a
//! cross-package registry built by BFS over the import graph.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;

use log::{debug, warn};
use templar_ast::{
    host::{Decl, HostProgram},
    model::{FieldTree, RenderSite, TemplateVar},
    types::TypeId,
    typestr,
};
use thiserror::Error;

use crate::extract::TypeTreeExtractor;

/// `template (or global key) → variable name → type string`.
pub type ContextFile = BTreeMap<String, BTreeMap<String, String>>;

/// Origin file recorded on synthetic render sites for templates that are
/// declared in the context file but never rendered from host source.
pub const CONTEXT_FILE_ORIGIN: &str = "<context-file>";

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("failed to read context file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse context file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Load and parse the external context file.
pub fn load_context_file(path: &Path) -> Result<ContextFile, EnrichError> {
    let text = std::fs::read_to_string(path).map_err(|source| EnrichError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| EnrichError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub struct Enricher<'a> {
    extractor: &'a TypeTreeExtractor<'a>,
    /// `pkg.Type` (and bare `Type` for root-package types) → table id.
    registry: BTreeMap<String, TypeId>,
}

impl<'a> Enricher<'a> {
    /// Build the type registry: BFS over the import graph starting at the
    /// root package, visiting each package once.
    pub fn new(program: &'a HostProgram, extractor: &'a TypeTreeExtractor<'a>) -> Self {
        let mut registry = BTreeMap::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(program.root.as_str());

        while let Some(path) = queue.pop_front() {
            if !visited.insert(path) {
                continue;
            }
            let Some(pkg) = program.package(path) else {
                continue;
            };
            let is_root = pkg.import_path == program.root;
            for file in &pkg.files {
                for decl in &file.decls {
                    if let Decl::Type(td) = decl {
                        registry.insert(format!("{}.{}", pkg.name, td.name), td.ty);
                        if is_root {
                            registry.entry(td.name.clone()).or_insert(td.ty);
                        }
                    }
                }
            }
            for import in &pkg.imports {
                queue.push_back(import.as_str());
            }
        }

        debug!("enricher registry: {} type keys", registry.len());
        Self {
            extractor,
            registry,
        }
    }

    /// Merge declared variables into the discovered render sites and append
    /// synthetic sites for declared-but-unrendered templates.
    ///
    /// Per-site merge order: global entry, then the template's own entry,
    /// then the discovered variables; later entries win on name collision.
    pub fn apply(&self, context: &ContextFile, sites: &mut Vec<RenderSite>, global_key: &str) {
        let global = context.get(global_key);

        for site in sites.iter_mut() {
            let specific = lookup_template(context, &site.template_path, global_key);
            let mut merged: BTreeMap<String, TemplateVar> = BTreeMap::new();
            if let Some(global) = global {
                for (name, type_str) in global {
                    merged.insert(name.clone(), self.var_from_type_string(name, type_str));
                }
            }
            if let Some(specific) = specific {
                for (name, type_str) in specific {
                    merged.insert(name.clone(), self.var_from_type_string(name, type_str));
                }
            }
            for var in site.vars.drain(..) {
                merged.insert(var.name.clone(), var);
            }
            site.vars = merged.into_values().collect();
        }

        // Synthetic sites for declared templates nobody renders.
        let rendered: HashSet<String> = sites
            .iter()
            .map(|s| normalize_name(&s.template_path))
            .collect();
        for (template, vars) in context {
            if template == global_key || rendered.contains(&normalize_name(template)) {
                continue;
            }
            let mut merged: BTreeMap<String, TemplateVar> = BTreeMap::new();
            if let Some(global) = global {
                for (name, type_str) in global {
                    merged.insert(name.clone(), self.var_from_type_string(name, type_str));
                }
            }
            for (name, type_str) in vars {
                merged.insert(name.clone(), self.var_from_type_string(name, type_str));
            }
            sites.push(RenderSite {
                file: CONTEXT_FILE_ORIGIN.to_string(),
                line: 1,
                template_name_start_col: 0,
                template_name_end_col: 0,
                template_path: template.clone(),
                vars: merged.into_values().collect(),
            });
        }
    }

    /// Resolve a declared type string into a full variable tree, falling
    /// back to a bare-typed leaf when the base type is unknown.
    pub fn var_from_type_string(&self, name: &str, type_str: &str) -> TemplateVar {
        let (prefix, base) = typestr::split_prefix(type_str);
        let mut var = FieldTree {
            name: name.to_string(),
            type_str: typestr::normalize(type_str),
            is_slice: prefix.contains("[]"),
            ..Default::default()
        };

        if let Some((key, value)) = typestr::split_map(base) {
            var.is_map = true;
            var.key_type = Some(typestr::normalize(key));
            var.elem_type = Some(typestr::normalize(value));
            if let Some(value_id) = self.resolve_base(value) {
                let (fields, doc) = self.extractor.extract(value_id);
                var.fields = fields;
                var.doc = doc;
            }
            return var;
        }

        match self.resolve_base(base) {
            Some(id) => {
                let resolved = self.extractor.extract_var(name, id);
                var.fields = resolved.fields;
                var.doc = resolved.doc;
                var.def_file = resolved.def_file;
                var.def_line = resolved.def_line;
                var.def_col = resolved.def_col;
                // The written string keeps its collection prefix even when
                // the resolved type spells it differently.
                if resolved.is_map {
                    var.is_map = true;
                    var.key_type = resolved.key_type;
                    var.elem_type = resolved.elem_type;
                }
                var
            }
            None => {
                warn!("context file: unresolved type `{}` for `{}`", type_str, name);
                var
            }
        }
    }

    /// Look a stripped base type up in the registry, tolerating collection
    /// prefixes inside map value positions.
    fn resolve_base(&self, base: &str) -> Option<TypeId> {
        let (_, base) = typestr::split_prefix(base);
        if base.starts_with("map[") {
            return None;
        }
        self.registry.get(base).copied().or_else(|| {
            // Full import paths shorten to the registry's pkg.Type keys.
            let short = typestr::normalize(base);
            self.registry.get(&short).copied()
        })
    }
}

fn normalize_name(name: &str) -> String {
    name.strip_prefix("./").unwrap_or(name).to_string()
}

fn lookup_template<'c>(
    context: &'c ContextFile,
    template: &str,
    global_key: &str,
) -> Option<&'c BTreeMap<String, String>> {
    let normalized = normalize_name(template);
    context
        .iter()
        .find(|(name, _)| *name != global_key && normalize_name(name) == normalized)
        .map(|(_, vars)| vars)
}
