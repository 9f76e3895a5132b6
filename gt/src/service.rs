//! PlannerService - the produced interface
//!
//! Facade over the engine, expansion controller, evolution tracker, and
//! pipeline selector. Owns the persistence handle and the in-memory tree
//! cache; during a process lifetime the in-memory copy is the source of
//! truth and every mutation is mirrored to the store. A failed store write
//! degrades the operation to in-memory (surfaced via `durable: false` and
//! a warning), never fails it.

use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use docstore::Store;

use crate::analyzer;
use crate::domain::{AccumulatedContext, CompletionLog, CompletionRecord, DecompositionTree};
use crate::engine::{BuildOptions, DecompositionEngine, TreeExpansionController};
use crate::error::EngineError;
use crate::evolution::{EvolutionConfig, EvolutionTracker};
use crate::llm::{GenerationGateway, LlmClient};
use crate::pipeline::{Pipeline, PipelineConfig, ResourceContext, TaskPipelineSelector};
use crate::prompts::PromptLibrary;
use crate::vector::{IndexEntry, VectorIndex};

/// Result of a build or expand operation
#[derive(Debug)]
pub struct BuildOutcome {
    pub tree: DecompositionTree,
    pub warnings: Vec<String>,

    /// False when the tree could not be persisted (in-memory only)
    pub durable: bool,
}

/// Result of recording a completion
#[derive(Debug)]
pub struct CompletionOutcome {
    pub evolution_triggered: bool,
    pub durable: bool,
}

/// The planning service facade
pub struct PlannerService {
    store: Option<Store>,
    gateway: Arc<GenerationGateway>,
    engine: Arc<DecompositionEngine>,
    controller: TreeExpansionController,
    tracker: EvolutionTracker,
    selector: TaskPipelineSelector,
    prompts: Arc<PromptLibrary>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    trees: HashMap<(String, String), DecompositionTree>,
}

impl PlannerService {
    /// Create a service over an LLM client and an optional store
    pub fn new(llm: Arc<dyn LlmClient>, store: Option<Store>) -> Self {
        let prompts = Arc::new(PromptLibrary::new());
        let gateway = Arc::new(GenerationGateway::new(llm));
        let engine = Arc::new(DecompositionEngine::new(gateway.clone(), prompts.clone()));
        let controller = TreeExpansionController::new(engine.clone());

        Self {
            store,
            gateway,
            engine,
            controller,
            tracker: EvolutionTracker::new(EvolutionConfig::default()),
            selector: TaskPipelineSelector::default(),
            prompts,
            vector_index: None,
            trees: HashMap::new(),
        }
    }

    /// Override the evolution tracker (tunables or injected clock)
    pub fn with_tracker(mut self, tracker: EvolutionTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Override the pipeline selector tunables
    pub fn with_pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.selector = TaskPipelineSelector::new(config);
        self
    }

    /// Wire in an optional semantic index
    pub fn with_vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Replace the prompt library (template overrides)
    pub fn with_prompts(mut self, prompts: Arc<PromptLibrary>) -> Self {
        let gateway = self.gateway.clone();
        self.engine = Arc::new(DecompositionEngine::new(gateway, prompts.clone()));
        self.controller = TreeExpansionController::new(self.engine.clone());
        self.prompts = prompts;
        self
    }

    /// Build a decomposition tree for a goal
    ///
    /// Idempotent per project/path: an existing tree with frontier tasks is
    /// returned as-is unless `force_regenerate` is set.
    pub async fn build_tree(
        &mut self,
        project: &str,
        path: &str,
        goal: &str,
        context: Value,
        options: &BuildOptions,
    ) -> Result<BuildOutcome, EngineError> {
        debug!(project, path, "build_tree: called");
        if goal.trim().is_empty() {
            return Err(EngineError::MissingGoal);
        }

        if !options.force_regenerate
            && let Some(existing) = self.load_tree(project, path)?
            && existing.has_frontier()
        {
            info!(project, path, tree_id = %existing.id, "build_tree: returning existing tree");
            return Ok(BuildOutcome {
                tree: existing,
                warnings: vec!["tree already exists; pass force_regenerate to rebuild".to_string()],
                durable: true,
            });
        }

        let characteristics = analyzer::analyze(goal, &context);
        let mut tree = DecompositionTree::new(goal, context, characteristics);
        let mut warnings = self.engine.decompose(&mut tree, options).await?;

        let durable = self.persist_tree(project, path, &tree, &mut warnings);
        self.index_frontier(project, path, &tree, &mut warnings).await;

        self.trees.insert(cache_key(project, path), tree.clone());
        Ok(BuildOutcome {
            tree,
            warnings,
            durable,
        })
    }

    /// Expand an existing tree to a deeper target depth
    pub async fn expand_tree(&mut self, project: &str, path: &str, target_depth: u8) -> Result<BuildOutcome, EngineError> {
        debug!(project, path, target_depth, "expand_tree: called");
        let mut tree = self.require_tree(project, path)?;

        let mut warnings = self.controller.expand(&mut tree, target_depth).await?;

        let durable = self.persist_tree(project, path, &tree, &mut warnings);
        self.index_frontier(project, path, &tree, &mut warnings).await;

        self.trees.insert(cache_key(project, path), tree.clone());
        Ok(BuildOutcome {
            tree,
            warnings,
            durable,
        })
    }

    /// Record a task completion; may trigger evolution
    pub async fn record_completion(
        &mut self,
        project: &str,
        path: &str,
        task_id: u32,
        record: CompletionRecord,
    ) -> Result<CompletionOutcome, EngineError> {
        debug!(project, path, task_id, "record_completion: called");
        let mut tree = self.require_tree(project, path)?;
        self.restore_evolution_state(project, path);

        self.tracker.record_completion(project, &mut tree, task_id, record)?;

        let mut warnings = Vec::new();
        let mut durable = self.persist_tree(project, path, &tree, &mut warnings);
        durable &= self.persist_evolution_state(project, path, &mut warnings);

        let evolution_triggered = self.tracker.should_evolve(project, "task_completion");
        if evolution_triggered {
            info!(project, path, "record_completion: evolution triggered");
            let outcome = self
                .tracker
                .evolve(
                    project,
                    &mut tree,
                    "task_completion",
                    &self.controller,
                    &self.gateway,
                    &self.prompts,
                )
                .await?;
            warnings.extend(outcome.warnings);
            durable &= self.persist_tree(project, path, &tree, &mut warnings);
        }

        for warning in &warnings {
            warn!(project, path, warning = %warning, "record_completion: warning");
        }

        self.trees.insert(cache_key(project, path), tree);
        Ok(CompletionOutcome {
            evolution_triggered,
            durable,
        })
    }

    /// Select the next-work pipeline for a project
    pub async fn get_pipeline(
        &mut self,
        project: &str,
        path: &str,
        resources: &ResourceContext,
    ) -> Result<Pipeline, EngineError> {
        debug!(project, path, "get_pipeline: called");
        let tree = self.require_tree(project, path)?;
        Ok(self.selector.select(&tree.frontier_tasks, resources))
    }

    /// Current tree for a project, if one exists
    pub fn tree(&mut self, project: &str, path: &str) -> Result<Option<DecompositionTree>, EngineError> {
        self.load_tree(project, path)
    }

    fn require_tree(&mut self, project: &str, path: &str) -> Result<DecompositionTree, EngineError> {
        self.load_tree(project, path)?.ok_or_else(|| EngineError::NoTreeFound {
            project: project.to_string(),
            path: path.to_string(),
        })
    }

    fn load_tree(&mut self, project: &str, path: &str) -> Result<Option<DecompositionTree>, EngineError> {
        if let Some(tree) = self.trees.get(&cache_key(project, path)) {
            return Ok(Some(tree.clone()));
        }

        let Some(store) = &self.store else {
            return Ok(None);
        };

        match store.load_record::<DecompositionTree>(project, path)? {
            Some(tree) => {
                debug!(project, path, tree_id = %tree.id, "load_tree: restored from store");
                self.trees.insert(cache_key(project, path), tree.clone());
                Ok(Some(tree))
            }
            None => Ok(None),
        }
    }

    fn persist_tree(&self, project: &str, path: &str, tree: &DecompositionTree, warnings: &mut Vec<String>) -> bool {
        let Some(store) = &self.store else {
            warnings.push("no persistence configured; tree is in-memory only".to_string());
            return false;
        };

        match store.save_record(project, path, tree) {
            Ok(()) => true,
            Err(err) => {
                warn!(project, path, error = %err, "persist_tree: store write failed");
                warnings.push(format!("persistence unavailable; tree not saved: {}", err));
                false
            }
        }
    }

    /// Rehydrate tracker state from the store after a process restart
    fn restore_evolution_state(&mut self, project: &str, path: &str) {
        if self.tracker.state(project).is_some() {
            return;
        }
        let Some(store) = &self.store else {
            return;
        };

        let log = store
            .load_record::<CompletionLog>(project, path)
            .ok()
            .flatten()
            .unwrap_or_else(|| CompletionLog::new(project));
        let context = store
            .load_record::<AccumulatedContext>(project, path)
            .ok()
            .flatten()
            .unwrap_or_else(|| AccumulatedContext::new(project));

        if !log.entries.is_empty() || context.total_completions > 0 {
            self.tracker.restore(project, log, context);
        }
    }

    fn persist_evolution_state(&self, project: &str, path: &str, warnings: &mut Vec<String>) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        let Some(state) = self.tracker.state(project) else {
            return true;
        };

        let mut ok = true;
        if let Err(err) = store.save_record(project, path, &state.log) {
            warnings.push(format!("persistence unavailable; completion history not saved: {}", err));
            ok = false;
        }
        if let Err(err) = store.save_record(project, path, &state.context) {
            warnings.push(format!("persistence unavailable; accumulated context not saved: {}", err));
            ok = false;
        }
        ok
    }

    /// Index frontier tasks for semantic retrieval, when an index is wired
    async fn index_frontier(&self, project: &str, path: &str, tree: &DecompositionTree, warnings: &mut Vec<String>) {
        let Some(index) = &self.vector_index else {
            return;
        };

        let entries: Vec<IndexEntry> = tree
            .frontier_tasks
            .iter()
            .map(|task| IndexEntry {
                id: task.id.to_string(),
                text: format!("{} {}", task.title, task.description),
                metadata: json!({ "taskId": task.id, "branch": task.branch }),
            })
            .collect();

        if let Err(err) = index.index(project, path, entries).await {
            warnings.push(format!("vector indexing failed: {}", err));
        }
    }
}

fn cache_key(project: &str, path: &str) -> (String, String) {
    (project.to_string(), path.to_string())
}
