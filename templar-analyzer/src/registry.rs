//! Named-block registry: every `define`/`block` across the template tree,
//! with duplicate detection.
//!
//! The walk is independent of host analysis; an editor collaborator can
//! rebuild just this registry when a template file changes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use log::{debug, warn};
use templar_ast::model::{BlockLoc, DuplicateBlockError, NamedBlock};
use templar_harvest::pool;
use templar_parser::TemplateParser;

/// Template file extensions the walker considers.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["html", "tmpl", "tpl", "gohtml"];

/// A registered block plus where its body begins (needed to map diagnostics
/// in re-parsed bodies back to file positions; not serialized).
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub block: NamedBlock,
    pub body_line: u32,
    pub body_col: u32,
}

#[derive(Debug, Default)]
pub struct BlockRegistry {
    entries: BTreeMap<String, Vec<RegistryEntry>>,
    errors: Vec<DuplicateBlockError>,
}

impl BlockRegistry {
    /// Walk every template file under `base` in parallel and index its
    /// named blocks. Unreadable or structurally broken files are skipped.
    pub fn build(base: &Path) -> Self {
        let files = template_files(base);
        debug!("block registry: scanning {} template files", files.len());

        let concurrent: DashMap<String, Vec<RegistryEntry>> = DashMap::new();
        pool::for_each_parallel(files, |path| {
            index_template_file(base, &path, &concurrent);
        });

        let mut entries: BTreeMap<String, Vec<RegistryEntry>> =
            concurrent.into_iter().collect();
        for list in entries.values_mut() {
            list.sort_by(|a, b| {
                (&a.block.template_path, a.block.start_line)
                    .cmp(&(&b.block.template_path, b.block.start_line))
            });
        }

        let errors = entries
            .iter()
            .filter(|(_, list)| list.len() > 1)
            .map(|(name, list)| {
                let locs: Vec<BlockLoc> = list
                    .iter()
                    .map(|e| BlockLoc {
                        template_path: e.block.template_path.clone(),
                        line: e.block.start_line,
                    })
                    .collect();
                let places: Vec<String> = locs
                    .iter()
                    .map(|l| format!("{}:{}", l.template_path, l.line))
                    .collect();
                DuplicateBlockError {
                    name: name.clone(),
                    message: format!(
                        "Named block \"{}\" is defined more than once: {}",
                        name,
                        places.join(", ")
                    ),
                    entries: locs,
                }
            })
            .collect();

        Self { entries, errors }
    }

    pub fn lookup(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name).and_then(|list| list.first())
    }

    pub fn duplicate_errors(&self) -> &[DuplicateBlockError] {
        &self.errors
    }

    /// Serializable view for the knowledge graph.
    pub fn named_blocks(&self) -> BTreeMap<String, Vec<NamedBlock>> {
        self.entries
            .iter()
            .map(|(name, list)| {
                (
                    name.clone(),
                    list.iter().map(|e| e.block.clone()).collect(),
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn index_template_file(base: &Path, path: &Path, out: &DashMap<String, Vec<RegistryEntry>>) {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            warn!("skipping unreadable template {}: {err}", path.display());
            return;
        }
    };
    let template_path = relative_name(base, path);
    let parsed = match TemplateParser::new(&template_path, &source).parse() {
        Ok(parsed) => parsed,
        Err(err) => {
            // Structural errors surface during validation; the registry
            // only skips the file.
            debug!("block registry: {err}");
            return;
        }
    };

    for region in &parsed.blocks {
        let entry = RegistryEntry {
            block: NamedBlock {
                name: region.name.clone(),
                absolute_path: path.display().to_string(),
                template_path: template_path.clone(),
                start_line: region.line,
                start_col: region.col,
                body_text: region.body_text.clone(),
            },
            body_line: region.body_line,
            body_col: region.body_col,
        };
        out.entry(region.name.clone()).or_default().push(entry);
    }
}

/// Logical template name: path relative to the base, forward slashes.
pub fn relative_name(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

/// Recursive walk collecting template files under `base`.
fn template_files(base: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    walk_dir(base, &mut files);
    files.sort();
    files
}

fn walk_dir(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_dir(&path, out);
        } else if is_template_file(&path) {
            out.push(path);
        }
    }
}

pub fn is_template_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_registry_indexes_and_flags_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.html"),
            "{{ define \"header\" }}<h1>{{ .Title }}</h1>{{ end }}",
        )
        .unwrap();
        fs::create_dir(dir.path().join("partials")).unwrap();
        fs::write(
            dir.path().join("partials/b.html"),
            "text\n{{ define \"header\" }}other{{ end }}\n{{ define \"footer\" }}x{{ end }}",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "{{ define \"ignored\" }}{{ end }}").unwrap();

        let registry = BlockRegistry::build(dir.path());
        assert_eq!(registry.len(), 2);
        assert!(registry.lookup("footer").is_some());

        let errors = registry.duplicate_errors();
        assert_eq!(errors.len(), 1);
        let dup = &errors[0];
        assert_eq!(dup.name, "header");
        assert_eq!(dup.entries.len(), 2);
        assert_eq!(dup.entries[0].template_path, "a.html");
        assert_eq!(dup.entries[0].line, 1);
        assert_eq!(dup.entries[1].template_path, "partials/b.html");
        assert_eq!(dup.entries[1].line, 2);
        assert!(dup.message.contains("a.html:1"));
        assert!(dup.message.contains("partials/b.html:2"));
    }

    #[test]
    fn test_broken_template_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.html"), "{{ define \"x\" }} no end").unwrap();
        fs::write(
            dir.path().join("good.html"),
            "{{ define \"y\" }}ok{{ end }}",
        )
        .unwrap();
        let registry = BlockRegistry::build(dir.path());
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("y").is_some());
    }
}
