//! Frontier task domain type
//!
//! Tasks are the leaf units of actionable work exposed to selection logic.
//! They are created by the decomposition engine (or its fallback) and
//! completed exactly once by completion tracking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Where a generated unit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    #[default]
    Generated,
    Fallback,
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generated => write!(f, "generated"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// A leaf unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique id within the tree (monotonically assigned)
    pub id: u32,

    /// Short title
    pub title: String,

    /// What to do
    pub description: String,

    /// Difficulty 1-5
    pub difficulty: u8,

    /// Estimated duration in minutes
    pub duration_minutes: u32,

    /// Name of the branch this task belongs to
    pub branch: String,

    /// Selection priority: branch priority * 100 + ordinal within branch * 10
    pub priority: u32,

    /// Ids of tasks that must complete first
    #[serde(default)]
    pub prerequisites: BTreeSet<u32>,

    /// Completion flag; transitions false -> true exactly once
    #[serde(default)]
    pub completed: bool,

    /// Attached completion record, immutable once set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionRecord>,

    /// Deepest level successfully attached to this task (3-6)
    pub decomposition_depth: u8,

    /// Whether deeper levels can still be generated for this task
    pub can_decompose_further: bool,

    /// Concrete action to take, when generation provided one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// How to verify the task is done
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,

    /// Whether this task was generated or substituted by fallback
    #[serde(default)]
    pub source: SourceTag,
}

impl Task {
    /// Mark this task completed, attaching the record
    ///
    /// Idempotent on the flag: a second call leaves the original record in
    /// place and returns false.
    pub fn complete(&mut self, record: CompletionRecord) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        self.completion = Some(record);
        true
    }

    /// Whether all prerequisites are in the given completed set
    pub fn is_ready(&self, completed: &BTreeSet<u32>) -> bool {
        self.prerequisites.iter().all(|id| completed.contains(id))
    }
}

/// Feedback attached to a completed task
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    /// Actual time spent in minutes
    pub duration_minutes: u32,

    /// Self-rated quality 1-5
    pub quality: u8,

    /// Self-rated difficulty 1-5
    pub difficulty_rating: u8,

    /// Free-form reflections
    #[serde(default)]
    pub reflections: String,

    /// What was learned
    #[serde(default)]
    pub learning_outcomes: Vec<String>,

    /// Where the user struggled
    #[serde(default)]
    pub struggling_areas: Vec<String>,

    /// Breakthrough moments
    #[serde(default)]
    pub breakthroughs: Vec<String>,

    /// Topics the user wants to explore next
    #[serde(default)]
    pub next_interests: Vec<String>,

    /// Completion timestamp (Unix milliseconds)
    pub completed_at: i64,
}
