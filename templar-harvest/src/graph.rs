//! Knowledge-graph aggregation: render sites grouped per template, with
//! variable dedup by richness (the deeper field tree wins).

use std::collections::BTreeMap;

use log::debug;
use templar_ast::model::{RenderSite, TemplateContext};

/// Aggregate render sites into one context per logical template name.
pub fn build_contexts(sites: &[RenderSite]) -> BTreeMap<String, TemplateContext> {
    let mut templates: BTreeMap<String, TemplateContext> = BTreeMap::new();

    for site in sites {
        let name = site
            .template_path
            .strip_prefix("./")
            .unwrap_or(&site.template_path)
            .to_string();
        let ctx = templates.entry(name.clone()).or_insert_with(|| TemplateContext {
            name,
            ..Default::default()
        });
        ctx.render_sites.push(site.clone());

        for var in &site.vars {
            match ctx.vars.get(&var.name) {
                Some(existing) if existing.depth() >= var.depth() => {}
                _ => {
                    ctx.vars.insert(var.name.clone(), var.clone());
                }
            }
        }
    }

    debug!("knowledge graph: {} templates", templates.len());
    templates
}
