//! Error taxonomy for tree operations
//!
//! Level-local generation failures are recovered by the engine's fallback
//! chain and never surface here unless strict mode is set. Everything in
//! this enum is a caller-visible outcome.

use thiserror::Error;

use crate::llm::GenerationError;

/// Errors surfaced by tree operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// No goal text resolvable; fatal, no fallback
    #[error("no goal text could be resolved; a tree cannot be built without a goal")]
    MissingGoal,

    /// Generation failed in strict mode, or template rendering broke
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// An operation that needs an existing tree found none
    #[error("no tree found for project '{project}' path '{path}'; build a tree first")]
    NoTreeFound { project: String, path: String },

    /// The persistence gateway failed on a required read
    #[error("persistence unavailable: {0}")]
    Persistence(#[from] docstore::StoreError),

    /// A referenced task does not exist in the tree
    #[error("task {task_id} not found in tree")]
    TaskNotFound { task_id: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_goal_message_is_actionable() {
        let msg = EngineError::MissingGoal.to_string();
        assert!(msg.contains("goal"));
    }

    #[test]
    fn test_no_tree_found_names_the_project() {
        let err = EngineError::NoTreeFound {
            project: "p1".to_string(),
            path: "spanish".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("p1"));
        assert!(msg.contains("build a tree first"));
    }
}
