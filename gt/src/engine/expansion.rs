//! TreeExpansionController - on-demand depth expansion
//!
//! Generates only the levels a tree is missing, attaching results to the
//! existing branches and tasks. Existing levels are untouched and
//! `available_depth` never regresses.

use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::{DecompositionTree, MAX_DEPTH};
use crate::error::EngineError;

use super::decomposer::{DecompositionEngine, flatten_frontier, update_frontier_depths};

/// Grows an existing tree to a deeper target depth
pub struct TreeExpansionController {
    engine: Arc<DecompositionEngine>,
}

impl TreeExpansionController {
    pub fn new(engine: Arc<DecompositionEngine>) -> Self {
        Self { engine }
    }

    /// Expand a tree to `target_depth`
    ///
    /// Idempotent incremental growth: a no-op when the tree already
    /// reaches the target; otherwise only the missing levels are
    /// generated, in order, using the same per-level rules as the initial
    /// decomposition (non-strict: failures fall back per unit).
    pub async fn expand(&self, tree: &mut DecompositionTree, target_depth: u8) -> Result<Vec<String>, EngineError> {
        let target = target_depth.min(MAX_DEPTH);

        if target <= tree.available_depth {
            debug!(
                tree_id = %tree.id,
                available_depth = tree.available_depth,
                target,
                "expand: nothing to do"
            );
            return Ok(Vec::new());
        }

        info!(
            tree_id = %tree.id,
            from = tree.available_depth,
            to = target,
            "Expanding tree"
        );

        let mut warnings = Vec::new();
        for depth in (tree.available_depth + 1)..=target {
            self.engine.generate_level(tree, depth, false, &mut warnings).await?;
        }

        if tree.available_depth >= 3 {
            if tree.has_frontier() {
                update_frontier_depths(tree);
            } else {
                flatten_frontier(tree, &mut warnings);
            }
        }

        Ok(warnings)
    }
}
