// Template-side analysis and orchestration for Templar.
//
// The analyzer ties the harvested knowledge graph to the template tree:
// it indexes named blocks, tracks per-action scopes and validates every
// variable expression, including recursive partial and named-block bodies.

pub mod infer;
pub mod registry;
pub mod scope;
pub mod validate;

use std::path::{Path, PathBuf};

use log::debug;
use templar_ast::host::HostProgram;
use templar_ast::model::KnowledgeGraph;
use templar_diagnostics::ValidationResult;
use templar_harvest::{
    build_contexts, load_context_file, AnalysisResult, Collector, CollectorConfig, Enricher,
    StructIndex, TypeTreeExtractor,
};

pub use infer::Inferencer;
pub use registry::{BlockRegistry, RegistryEntry, TEMPLATE_EXTENSIONS};
pub use scope::{ScopeFrame, ScopeStack};
pub use validate::Validator;

/// Analyzer configuration: recognized host function names plus the template
/// tree location. `"-"` disables a function-name slot.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub render_fn: String,
    pub execute_template_fn: String,
    pub set_fn: String,
    pub context_type: String,
    pub global_template_key: String,
    /// Absolute template root.
    pub template_root: PathBuf,
    /// Sub-directory of the root the logical template names are relative
    /// to.
    pub template_sub_root: String,
    /// Optional external context file (JSON).
    pub context_file: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        let collector = CollectorConfig::default();
        Self {
            render_fn: collector.render_fn,
            execute_template_fn: collector.execute_template_fn,
            set_fn: collector.set_fn,
            context_type: collector.context_type,
            global_template_key: collector.global_template_key,
            template_root: PathBuf::from("."),
            template_sub_root: String::new(),
            context_file: None,
        }
    }
}

impl AnalyzerConfig {
    pub fn collector(&self) -> CollectorConfig {
        CollectorConfig {
            render_fn: self.render_fn.clone(),
            execute_template_fn: self.execute_template_fn.clone(),
            set_fn: self.set_fn.clone(),
            context_type: self.context_type.clone(),
            global_template_key: self.global_template_key.clone(),
        }
    }

    /// Directory logical template names resolve against.
    pub fn template_base(&self) -> PathBuf {
        if self.template_sub_root.is_empty() {
            self.template_root.clone()
        } else {
            self.template_root.join(&self.template_sub_root)
        }
    }
}

/// Everything one analysis run produces.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub graph: KnowledgeGraph,
    pub diagnostics: Vec<ValidationResult>,
}

pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Harvest the host program: render sites (context-file enriched),
    /// function maps and surviving host errors. No template validation.
    pub fn analyze_host(&self, program: &HostProgram) -> AnalysisResult {
        let index = StructIndex::build(program);
        let extractor = TypeTreeExtractor::new(&program.types, &index);
        let collector_config = self.config.collector();
        let mut result = Collector::new(program, &extractor, &collector_config).collect();
        self.enrich(program, &extractor, &mut result);
        result
    }

    /// Rebuild only the named-block registry; used by editor collaborators
    /// after a template edit, without re-running the host harvest.
    pub fn build_registry(&self) -> BlockRegistry {
        BlockRegistry::build(&self.config.template_base())
    }

    /// Full run: harvest, aggregate, index named blocks, validate.
    pub fn analyze(&self, program: &HostProgram) -> Analysis {
        let index = StructIndex::build(program);
        let extractor = TypeTreeExtractor::new(&program.types, &index);
        let collector_config = self.config.collector();
        let mut result = Collector::new(program, &extractor, &collector_config).collect();

        let enricher = Enricher::new(program, &extractor);
        if let Some(path) = self.config.context_file.clone() {
            self.apply_context_file(&enricher, &path, &mut result);
        }

        let templates = build_contexts(&result.render_sites);
        let registry = BlockRegistry::build(&self.config.template_base());
        debug!(
            "analysis: {} templates, {} named blocks, {} render sites",
            templates.len(),
            registry.len(),
            result.render_sites.len()
        );

        let inferencer = Inferencer::new(&result.func_maps, Some(&enricher));
        let validator = Validator::new(
            &templates,
            &registry,
            inferencer,
            self.config.template_base(),
        );
        let diagnostics = validator.validate_all();

        let graph = KnowledgeGraph {
            templates,
            named_blocks: registry.named_blocks(),
            named_block_errors: registry.duplicate_errors().to_vec(),
        };

        Analysis {
            result,
            graph,
            diagnostics,
        }
    }

    fn enrich(
        &self,
        program: &HostProgram,
        extractor: &TypeTreeExtractor<'_>,
        result: &mut AnalysisResult,
    ) {
        if let Some(path) = self.config.context_file.clone() {
            let enricher = Enricher::new(program, extractor);
            self.apply_context_file(&enricher, &path, result);
        }
    }

    fn apply_context_file(
        &self,
        enricher: &Enricher<'_>,
        path: &Path,
        result: &mut AnalysisResult,
    ) {
        match load_context_file(path) {
            Ok(context) => {
                enricher.apply(
                    &context,
                    &mut result.render_sites,
                    &self.config.global_template_key,
                );
                // Synthetic sites were appended; restore the stable order.
                result.render_sites.sort_by(|a, b| {
                    (&a.file, a.line, &a.template_path).cmp(&(
                        &b.file,
                        b.line,
                        &b.template_path,
                    ))
                });
            }
            Err(err) => result.errors.push(err.to_string()),
        }
    }
}
