//! Analysis records exchanged between the harvester, the knowledge-graph
//! builder and the validator, and serialized for embedding collaborators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Recursive field tree for a host type: exported fields and methods with
/// their types, collection shape, definition site and documentation.
///
/// For slice and map entries, `fields` holds the *element* type's tree, never
/// the collection's own methods.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldTree {
    pub name: String,
    pub type_str: String,
    pub is_slice: bool,
    pub is_map: bool,
    pub key_type: Option<String>,
    pub elem_type: Option<String>,
    pub fields: Vec<FieldTree>,
    pub def_file: String,
    pub def_line: u32,
    pub def_col: u32,
    pub doc: Option<String>,
}

impl FieldTree {
    pub fn leaf(name: impl Into<String>, type_str: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_str: type_str.into(),
            ..Default::default()
        }
    }

    /// Maximum depth of the tree; the richness measure used when merging
    /// candidate variables for one template.
    pub fn depth(&self) -> usize {
        1 + self.fields.iter().map(FieldTree::depth).max().unwrap_or(0)
    }

    /// Child entry by field name.
    pub fn field(&self, name: &str) -> Option<&FieldTree> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A [`FieldTree`] whose `name` is the template-visible binding.
pub type TemplateVar = FieldTree;

/// One host-source expression that renders a template with a data payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderSite {
    pub file: String,
    pub line: u32,
    pub template_name_start_col: u32,
    pub template_name_end_col: u32,
    pub template_path: String,
    pub vars: Vec<TemplateVar>,
}

/// Per-template aggregate: every render site targeting the template, and the
/// richest known variable per name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateContext {
    pub name: String,
    pub vars: BTreeMap<String, TemplateVar>,
    pub render_sites: Vec<RenderSite>,
}

/// A `{{define "name"}}` / `{{block "name" ctx}}` region.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamedBlock {
    pub name: String,
    pub absolute_path: String,
    pub template_path: String,
    pub start_line: u32,
    pub start_col: u32,
    pub body_text: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockLoc {
    pub template_path: String,
    pub line: u32,
}

/// Two or more named blocks share one name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DuplicateBlockError {
    pub name: String,
    pub entries: Vec<BlockLoc>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParamSig {
    pub name: String,
    pub type_str: String,
}

/// A template function registered through a function-map composite.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FuncMapEntry {
    pub name: String,
    pub def_file: String,
    pub def_line: u32,
    pub def_col: u32,
    pub doc: Option<String>,
    pub params: Vec<ParamSig>,
    pub returns: Vec<ParamSig>,
}

/// The aggregate the validator consumes: one context per template plus the
/// named-block index of the template tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KnowledgeGraph {
    pub templates: BTreeMap<String, TemplateContext>,
    pub named_blocks: BTreeMap<String, Vec<NamedBlock>>,
    pub named_block_errors: Vec<DuplicateBlockError>,
}

impl KnowledgeGraph {
    /// Context for a logical template name, tolerating a leading `./`.
    pub fn template(&self, name: &str) -> Option<&TemplateContext> {
        let name = name.strip_prefix("./").unwrap_or(name);
        self.templates.get(name)
    }
}
