//! DecompositionTree - the central aggregate
//!
//! Holds the validated per-level documents plus the canonical branches and
//! frontier tasks derived from them. Growth is monotonic: levels are only
//! ever added, `available_depth` only increases, and populated levels are
//! never deleted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use docstore::{Record, now_ms};

use super::branch::Branch;
use super::characteristics::GoalCharacteristics;
use super::id::generate_id;
use super::task::{SourceTag, Task};

/// Fixed upper bound on decomposition depth
pub const MAX_DEPTH: u8 = 6;

/// Provenance of one generated level
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProvenance {
    /// Generated by the gateway or substituted by fallback
    pub source: SourceTag,

    /// Warnings accumulated while building this level
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl LevelProvenance {
    pub fn generated() -> Self {
        Self {
            source: SourceTag::Generated,
            warnings: Vec::new(),
        }
    }

    pub fn fallback(warning: impl Into<String>) -> Self {
        Self {
            source: SourceTag::Fallback,
            warnings: vec![warning.into()],
        }
    }
}

/// Strategy applied during one evolution pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EvolutionStrategy {
    DepthExpansion,
    BranchExpansion,
    ContentRefinement,
    GoalAdjustment,
}

/// One append-only evolution history entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionEvent {
    /// What triggered the evolution, e.g. "task_completion"
    pub trigger: String,

    /// Strategies applied, in application order
    pub strategies_applied: Vec<EvolutionStrategy>,

    /// When the evolution ran (Unix milliseconds)
    pub timestamp: i64,
}

/// The decomposition tree aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecompositionTree {
    /// Unique identifier, e.g. "019430-tree-learn-spanish"
    pub id: String,

    /// The goal text; immutable for the life of the tree
    pub goal: String,

    /// Caller-supplied context object (learning style, constraints, ...)
    #[serde(default)]
    pub context: Value,

    /// Derived goal characteristics
    pub goal_characteristics: GoalCharacteristics,

    /// Validated level documents, keyed by depth 1-6; absent = not generated
    #[serde(default)]
    pub levels: BTreeMap<u8, Value>,

    /// Per-level generation provenance
    #[serde(default)]
    pub provenance: BTreeMap<u8, LevelProvenance>,

    /// Highest fully-generated level
    pub available_depth: u8,

    /// Constant upper bound (6)
    pub max_depth: u8,

    /// Ordered strategic branches derived from level 2
    #[serde(default)]
    pub strategic_branches: Vec<Branch>,

    /// Flattened leaf tasks derived from levels 3-6
    #[serde(default)]
    pub frontier_tasks: Vec<Task>,

    /// Append-only evolution history
    #[serde(default)]
    pub evolution_history: Vec<EvolutionEvent>,

    /// Next task id to allocate
    #[serde(default)]
    pub next_task_id: u32,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl DecompositionTree {
    /// Create an empty tree for a goal
    pub fn new(goal: impl Into<String>, context: Value, characteristics: GoalCharacteristics) -> Self {
        let goal = goal.into();
        let now = now_ms();
        Self {
            id: generate_id("tree", &goal),
            goal,
            context,
            goal_characteristics: characteristics,
            levels: BTreeMap::new(),
            provenance: BTreeMap::new(),
            available_depth: 0,
            max_depth: MAX_DEPTH,
            strategic_branches: Vec::new(),
            frontier_tasks: Vec::new(),
            evolution_history: Vec::new(),
            next_task_id: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Get a level document, if generated
    pub fn level(&self, depth: u8) -> Option<&Value> {
        self.levels.get(&depth)
    }

    /// Attach a level document with its provenance
    ///
    /// `available_depth` advances to the highest depth with a contiguous
    /// run of populated levels below it; it never regresses.
    pub fn set_level(&mut self, depth: u8, value: Value, provenance: LevelProvenance) {
        debug_assert!((1..=MAX_DEPTH).contains(&depth));
        self.levels.insert(depth, value);
        self.provenance.insert(depth, provenance);

        while self.available_depth < MAX_DEPTH && self.levels.contains_key(&(self.available_depth + 1)) {
            self.available_depth += 1;
        }
        self.touch();
    }

    /// Allocate the next task id
    pub fn allocate_task_id(&mut self) -> u32 {
        let id = self.next_task_id;
        self.next_task_id += 1;
        id
    }

    /// Find a frontier task by id
    pub fn task(&self, id: u32) -> Option<&Task> {
        self.frontier_tasks.iter().find(|t| t.id == id)
    }

    /// Find a frontier task by id, mutably
    pub fn task_mut(&mut self, id: u32) -> Option<&mut Task> {
        self.frontier_tasks.iter_mut().find(|t| t.id == id)
    }

    /// Whether frontier tasks have been flattened yet
    pub fn has_frontier(&self) -> bool {
        !self.frontier_tasks.is_empty()
    }

    /// Whether any level was substituted by fallback content
    pub fn has_fallback_content(&self) -> bool {
        self.provenance.values().any(|p| p.source == SourceTag::Fallback)
    }

    /// Append an evolution event
    pub fn record_evolution(&mut self, event: EvolutionEvent) {
        self.evolution_history.push(event);
        self.touch();
    }

    /// Bump the update timestamp
    pub fn touch(&mut self) {
        self.updated_at = now_ms();
    }
}

impl Record for DecompositionTree {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn file_key() -> &'static str {
        "tree.json"
    }
}
