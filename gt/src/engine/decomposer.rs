//! DecompositionEngine - level-by-level tree generation
//!
//! Drives goal -> branches -> tasks -> micro-steps -> atomic actions ->
//! context variants. Levels are strictly ordered: level n+1 never starts
//! until level n has fully resolved (success or fallback) for all units.
//! Within a level, sibling units fan out concurrently and the engine joins
//! the full set; a failed sibling never cancels the others.

use futures::future::join_all;
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{
    DecompositionTree, GoalCharacteristics, LevelProvenance, MAX_DEPTH, SourceTag, Task, branches_from_level,
};
use crate::error::EngineError;
use crate::llm::{GenerationError, GenerationGateway};
use crate::prompts::PromptLibrary;
use crate::schema::LevelKey;

use super::fallback::{GatewayStrategy, GenerationStrategy, SkeletonStrategy};

/// Floor applied to characteristics-derived target depths
const MIN_TARGET_DEPTH: u8 = 4;

/// Options for a build request
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Explicit target depth; overrides the characteristics-derived default
    /// and is honored as-is (this is the explicit lower-floor request)
    pub target_depth: Option<u8>,

    /// Rebuild even if the tree already has frontier tasks
    pub force_regenerate: bool,

    /// Abort on any generation failure instead of falling back
    pub strict: bool,
}

/// Content produced for one unit, with its provenance
struct ProducedUnit {
    value: Value,
    source: SourceTag,
    warnings: Vec<String>,
}

/// The decomposition engine
pub struct DecompositionEngine {
    strategies: Vec<Arc<dyn GenerationStrategy>>,
    prompts: Arc<PromptLibrary>,
}

impl DecompositionEngine {
    /// Create an engine with the standard strategy chain: gateway, then
    /// deterministic skeleton
    pub fn new(gateway: Arc<GenerationGateway>, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            strategies: vec![Arc::new(GatewayStrategy::new(gateway)), Arc::new(SkeletonStrategy)],
            prompts,
        }
    }

    /// Create an engine with a custom strategy chain (tests)
    pub fn with_strategies(strategies: Vec<Arc<dyn GenerationStrategy>>, prompts: Arc<PromptLibrary>) -> Self {
        Self { strategies, prompts }
    }

    /// Resolve the target depth for a build
    ///
    /// Caller override wins and is honored as-is; the characteristics
    /// default is clamped to [4, 6].
    pub fn resolve_target_depth(characteristics: &GoalCharacteristics, options: &BuildOptions) -> u8 {
        match options.target_depth {
            Some(depth) => depth.clamp(1, MAX_DEPTH),
            None => characteristics.recommended_depth.clamp(MIN_TARGET_DEPTH, MAX_DEPTH),
        }
    }

    /// Decompose a tree to its target depth
    ///
    /// No-op on a tree that already has frontier tasks unless
    /// `force_regenerate` is set; this guards against accidental duplicate
    /// generation and duplicate gateway calls. Returns accumulated
    /// warnings (fallback substitutions, unresolved prerequisites).
    pub async fn decompose(&self, tree: &mut DecompositionTree, options: &BuildOptions) -> Result<Vec<String>, EngineError> {
        if tree.goal.trim().is_empty() {
            return Err(EngineError::MissingGoal);
        }

        if tree.has_frontier() && !options.force_regenerate {
            debug!(tree_id = %tree.id, "decompose: tree already decomposed, no-op");
            return Ok(vec!["tree already has frontier tasks; pass force_regenerate to rebuild".to_string()]);
        }

        let target = Self::resolve_target_depth(&tree.goal_characteristics, options);
        info!(tree_id = %tree.id, target_depth = target, strict = options.strict, "Decomposing goal");

        let mut warnings = Vec::new();
        for depth in (tree.available_depth + 1)..=target {
            self.generate_level(tree, depth, options.strict, &mut warnings).await?;
        }

        if !tree.has_frontier() && tree.available_depth >= 3 {
            flatten_frontier(tree, &mut warnings);
        }

        info!(
            tree_id = %tree.id,
            available_depth = tree.available_depth,
            task_count = tree.frontier_tasks.len(),
            warning_count = warnings.len(),
            "Decomposition complete"
        );
        Ok(warnings)
    }

    /// Generate exactly one level, attaching it to the tree
    ///
    /// Levels 1-2 are single-unit; levels 3-6 fan out one generation call
    /// per parent unit (full coverage, join barrier).
    pub(crate) async fn generate_level(
        &self,
        tree: &mut DecompositionTree,
        depth: u8,
        strict: bool,
        warnings: &mut Vec<String>,
    ) -> Result<(), EngineError> {
        let key = LevelKey::from_depth(depth).expect("generate_level is only called with depths 1-6");
        debug!(tree_id = %tree.id, depth, key = %key, "generate_level: called");

        match depth {
            1 => {
                let payload = json!({ "goal": tree.goal, "context": tree.context });
                let unit = self.produce_unit(key, &payload, strict).await?;
                warnings.extend(unit.warnings.clone());
                let provenance = LevelProvenance {
                    source: unit.source,
                    warnings: unit.warnings,
                };
                tree.set_level(1, unit.value, provenance);
            }
            2 => {
                let payload = json!({
                    "goal": tree.goal,
                    "goalContext": tree.level(1).cloned().unwrap_or(Value::Null),
                });
                let unit = self.produce_unit(key, &payload, strict).await?;
                warnings.extend(unit.warnings.clone());

                tree.strategic_branches = branches_from_level(&unit.value);
                let provenance = LevelProvenance {
                    source: unit.source,
                    warnings: unit.warnings,
                };
                tree.set_level(2, unit.value, provenance);
            }
            3..=6 => {
                let payloads = unit_payloads(tree, depth);
                debug!(depth, unit_count = payloads.len(), "generate_level: fanning out");

                let futures = payloads.iter().map(|payload| self.produce_unit(key, payload, strict));
                let results = join_all(futures).await;

                let mut items = Vec::new();
                let mut level_warnings = Vec::new();
                let mut any_fallback = false;

                for result in results {
                    // In strict mode the first failure aborts the whole
                    // operation - after all siblings resolved
                    let unit = result?;
                    if unit.source == SourceTag::Fallback {
                        any_fallback = true;
                    }
                    level_warnings.extend(unit.warnings);

                    let mut value = unit.value;
                    if let Value::Object(ref mut obj) = value {
                        obj.insert("sourceTag".to_string(), json!(unit.source.to_string()));
                    }
                    items.push(value);
                }

                warnings.extend(level_warnings.iter().cloned());
                let aggregate = json!({ aggregate_key(depth): items });
                let provenance = LevelProvenance {
                    source: if any_fallback { SourceTag::Fallback } else { SourceTag::Generated },
                    warnings: level_warnings,
                };
                tree.set_level(depth, aggregate, provenance);
            }
            _ => unreachable!("depth is validated above"),
        }

        Ok(())
    }

    /// Run the strategy chain for one unit
    async fn produce_unit(&self, key: LevelKey, payload: &Value, strict: bool) -> Result<ProducedUnit, EngineError> {
        let instruction = self
            .prompts
            .render(key, payload)
            .map_err(|e| GenerationError::Template(e.to_string()))?;

        let mut unit_warnings = Vec::new();
        let mut last_error: Option<GenerationError> = None;

        for strategy in &self.strategies {
            match strategy.produce(key, payload, &instruction).await {
                Ok(value) => {
                    if strategy.tag() == SourceTag::Fallback {
                        let reason = last_error
                            .as_ref()
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "generation unavailable".to_string());
                        unit_warnings.push(format!("{} generation failed ({}); substituted fallback skeleton", key, reason));
                    }
                    return Ok(ProducedUnit {
                        value,
                        source: strategy.tag(),
                        warnings: unit_warnings,
                    });
                }
                Err(err) => {
                    if strict {
                        warn!(key = %key, error = %err, "produce_unit: strict mode, aborting");
                        return Err(err.into());
                    }
                    warn!(key = %key, error = %err, "produce_unit: strategy failed, trying next");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| GenerationError::Malformed("no generation strategy produced content".to_string()))
            .into())
    }
}

/// Aggregate collection key for a fan-out level document
fn aggregate_key(depth: u8) -> &'static str {
    match depth {
        3 => "decompositions",
        4 => "expansions",
        5 => "sequences",
        _ => "adaptations",
    }
}

/// Read-only payload slices for every parent unit of a level
fn unit_payloads(tree: &DecompositionTree, depth: u8) -> Vec<Value> {
    match depth {
        3 => tree
            .strategic_branches
            .iter()
            .map(|branch| {
                json!({
                    "goal": tree.goal,
                    "branch": {
                        "name": branch.name,
                        "description": branch.description,
                        "domainFocus": branch.domain_focus,
                    },
                })
            })
            .collect(),
        4 => collection_items(tree, 3, "decompositions")
            .iter()
            .flat_map(|decomposition| {
                let branch = decomposition.get("branch").cloned().unwrap_or(Value::Null);
                let goal = tree.goal.clone();
                items_of(decomposition, "tasks")
                    .into_iter()
                    .map(move |task| json!({ "goal": &goal, "branch": &branch, "task": task }))
            })
            .collect(),
        5 => collection_items(tree, 4, "expansions")
            .iter()
            .flat_map(|expansion| {
                let task = expansion.get("task").cloned().unwrap_or(Value::Null);
                items_of(expansion, "particles")
                    .into_iter()
                    .map(move |particle| json!({ "task": &task, "particle": particle }))
            })
            .collect(),
        6 => collection_items(tree, 5, "sequences")
            .iter()
            .flat_map(|sequence| {
                let particle = sequence.get("particle").cloned().unwrap_or(Value::Null);
                items_of(sequence, "actions")
                    .into_iter()
                    .map(move |action| json!({ "particle": &particle, "action": action }))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn collection_items(tree: &DecompositionTree, depth: u8, key: &str) -> Vec<Value> {
    tree.level(depth)
        .and_then(|level| level.get(key))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn items_of(container: &Value, key: &str) -> Vec<Value> {
    container.get(key).and_then(Value::as_array).cloned().unwrap_or_default()
}

/// Flatten levels 3-6 into frontier tasks
///
/// Tasks get monotonically increasing ids, a priority derived from branch
/// rank and ordinal, and a decomposition depth equal to the deepest level
/// attached to them. Prerequisites are resolved title -> id in a second
/// pass; unknown titles become warnings, never errors.
pub(crate) fn flatten_frontier(tree: &mut DecompositionTree, warnings: &mut Vec<String>) {
    let decompositions = collection_items(tree, 3, "decompositions");
    if decompositions.is_empty() {
        return;
    }

    let branches = tree.strategic_branches.clone();
    let mut tasks: Vec<Task> = Vec::new();
    let mut raw_prerequisites: Vec<Vec<String>> = Vec::new();
    let mut title_to_id: HashMap<(String, String), u32> = HashMap::new();
    let mut branch_task_ids: HashMap<String, Vec<u32>> = HashMap::new();

    for (branch_idx, branch) in branches.iter().enumerate() {
        let Some(decomposition) = find_decomposition(&decompositions, &branch.name, branch_idx) else {
            warnings.push(format!("no task decomposition found for branch '{}'", branch.name));
            continue;
        };

        let source = if decomposition.get("sourceTag").and_then(Value::as_str) == Some("fallback") {
            SourceTag::Fallback
        } else {
            SourceTag::Generated
        };

        for (ordinal, item) in items_of(&decomposition, "tasks").into_iter().enumerate() {
            let id = tree.allocate_task_id();
            let title = item
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Task")
                .to_string();
            let depth = compute_task_depth(tree, &title);

            tasks.push(Task {
                id,
                title: title.clone(),
                description: item
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                difficulty: item.get("difficulty").and_then(Value::as_u64).unwrap_or(3).clamp(1, 5) as u8,
                duration_minutes: item.get("durationMinutes").and_then(Value::as_u64).unwrap_or(30) as u32,
                branch: branch.name.clone(),
                priority: branch.priority * 100 + ordinal as u32 * 10,
                prerequisites: BTreeSet::new(),
                completed: false,
                completion: None,
                decomposition_depth: depth,
                can_decompose_further: depth < MAX_DEPTH,
                action: item.get("action").and_then(Value::as_str).map(str::to_string),
                validation: item.get("validation").and_then(Value::as_str).map(str::to_string),
                source,
            });
            raw_prerequisites.push(
                items_of(&item, "prerequisites")
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            );
            title_to_id.insert((branch.name.clone(), title), id);
            branch_task_ids.entry(branch.name.clone()).or_default().push(id);
        }
    }

    // Second pass: resolve prerequisites (title -> id) within each branch
    for (task, prereq_titles) in tasks.iter_mut().zip(raw_prerequisites) {
        for prereq_title in prereq_titles {
            if let Some(prereq_id) = title_to_id.get(&(task.branch.clone(), prereq_title.clone())) {
                task.prerequisites.insert(*prereq_id);
            } else {
                warnings.push(format!(
                    "task '{}' depends on unknown task '{}'",
                    task.title, prereq_title
                ));
            }
        }
    }

    for branch in tree.strategic_branches.iter_mut() {
        if let Some(ids) = branch_task_ids.remove(&branch.name) {
            branch.tasks = ids;
        }
    }

    tree.frontier_tasks = tasks;
    tree.touch();
}

/// Recompute decomposition depths after new levels were attached
pub(crate) fn update_frontier_depths(tree: &mut DecompositionTree) {
    let titles: Vec<(u32, String)> = tree.frontier_tasks.iter().map(|t| (t.id, t.title.clone())).collect();
    for (id, title) in titles {
        let depth = compute_task_depth(tree, &title);
        if let Some(task) = tree.task_mut(id) {
            if depth > task.decomposition_depth {
                task.decomposition_depth = depth;
            }
            task.can_decompose_further = task.decomposition_depth < MAX_DEPTH;
        }
    }
}

/// Deepest level successfully attached to a task, matched by title chain
fn compute_task_depth(tree: &DecompositionTree, task_title: &str) -> u8 {
    let mut depth = 3;

    let expansions = collection_items(tree, 4, "expansions");
    let Some(expansion) = expansions
        .iter()
        .find(|e| e.get("task").and_then(Value::as_str) == Some(task_title))
    else {
        return depth;
    };
    depth = 4;

    let particle_titles: BTreeSet<String> = items_of(expansion, "particles")
        .iter()
        .filter_map(|p| p.get("title").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    let sequences = collection_items(tree, 5, "sequences");
    let matching_sequences: Vec<&Value> = sequences
        .iter()
        .filter(|s| {
            s.get("particle")
                .and_then(Value::as_str)
                .map(|p| particle_titles.contains(p))
                .unwrap_or(false)
        })
        .collect();
    if matching_sequences.is_empty() {
        return depth;
    }
    depth = 5;

    let action_titles: BTreeSet<String> = matching_sequences
        .iter()
        .flat_map(|s| items_of(s, "actions"))
        .filter_map(|a| a.get("title").and_then(Value::as_str).map(str::to_string))
        .collect();

    let adaptations = collection_items(tree, 6, "adaptations");
    let has_adaptation = adaptations.iter().any(|a| {
        a.get("action")
            .and_then(Value::as_str)
            .map(|title| action_titles.contains(title))
            .unwrap_or(false)
    });
    if has_adaptation {
        depth = 6;
    }

    depth
}

/// Match a decomposition to a branch by name, falling back to position
fn find_decomposition(decompositions: &[Value], branch_name: &str, branch_idx: usize) -> Option<Value> {
    decompositions
        .iter()
        .find(|d| d.get("branch").and_then(Value::as_str) == Some(branch_name))
        .or_else(|| decompositions.get(branch_idx))
        .cloned()
}
