//! Instruction template loading and rendering
//!
//! Embedded templates are registered at construction; a template directory
//! can override any of them with a `{key}.hbs` file. Rendering never
//! escapes - output is a system prompt, not HTML.

use eyre::{Context, Result};
use handlebars::Handlebars;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use super::embedded;
use crate::schema::LevelKey;

/// Renders per-level instruction prompts
pub struct PromptLibrary {
    handlebars: Handlebars<'static>,
}

impl PromptLibrary {
    /// Create a library with the embedded templates
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);

        for key in LevelKey::ALL {
            handlebars
                .register_template_string(key.as_str(), embedded_template(key))
                .expect("embedded templates are valid");
        }

        Self { handlebars }
    }

    /// Create a library, overriding embedded templates from a directory
    ///
    /// Looks for `{key}.hbs` per schema key; missing files keep the
    /// embedded default.
    pub fn with_overrides(dir: impl AsRef<Path>) -> Result<Self> {
        let mut library = Self::new();
        let dir = dir.as_ref();

        for key in LevelKey::ALL {
            let candidate = dir.join(format!("{}.hbs", key.as_str()));
            if candidate.exists() {
                let template = std::fs::read_to_string(&candidate)
                    .context(format!("Failed to read template {}", candidate.display()))?;
                library
                    .handlebars
                    .register_template_string(key.as_str(), template)
                    .context(format!("Invalid template {}", candidate.display()))?;
                info!(key = key.as_str(), path = %candidate.display(), "Registered template override");
            }
        }

        Ok(library)
    }

    /// Render the instruction for a schema key
    pub fn render(&self, key: LevelKey, data: &Value) -> Result<String> {
        debug!(key = key.as_str(), "render: called");
        self.handlebars
            .render(key.as_str(), data)
            .context(format!("Failed to render template {}", key.as_str()))
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

fn embedded_template(key: LevelKey) -> &'static str {
    match key {
        LevelKey::GoalContext => embedded::GOAL_CONTEXT,
        LevelKey::StrategicBranches => embedded::STRATEGIC_BRANCHES,
        LevelKey::TaskDecomposition => embedded::TASK_DECOMPOSITION,
        LevelKey::MicroParticles => embedded::MICRO_PARTICLES,
        LevelKey::NanoActions => embedded::NANO_ACTIONS,
        LevelKey::ContextAdaptivePrimitives => embedded::CONTEXT_ADAPTIVE_PRIMITIVES,
        LevelKey::ContextMining => embedded::CONTEXT_MINING,
        LevelKey::DomainRelevance => embedded::DOMAIN_RELEVANCE,
        LevelKey::PainPointValidation => embedded::PAIN_POINT_VALIDATION,
        LevelKey::TreeEvolution => embedded::TREE_EVOLUTION,
    }
}
