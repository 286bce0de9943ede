// Host-source harvesting for the Templar analyzer.
//
// The pipeline: the struct index scans every AST file, the type-tree
// extractor expands checked types into field trees (memoized in the field
// cache), the collector finds render and setter calls per function scope,
// the enricher merges externally declared variables, and the graph builder
// aggregates everything into per-template contexts.

pub mod cache;
pub mod collect;
pub mod enrich;
pub mod extract;
pub mod graph;
pub mod index;
pub mod pool;

#[cfg(test)]
pub(crate) mod fixtures;

use serde::{Deserialize, Serialize};
use templar_ast::model::{FuncMapEntry, RenderSite};

pub use cache::{FieldCache, TypeInterner};
pub use collect::{Collector, CollectorConfig, FuncScope, ResolvedRender, DISABLED_FN};
pub use enrich::{load_context_file, ContextFile, EnrichError, Enricher, CONTEXT_FILE_ORIGIN};
pub use extract::TypeTreeExtractor;
pub use graph::build_contexts;
pub use index::StructIndex;

/// Unaggregated host-source findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisResult {
    pub render_sites: Vec<RenderSite>,
    pub func_maps: Vec<FuncMapEntry>,
    pub errors: Vec<String>,
}
