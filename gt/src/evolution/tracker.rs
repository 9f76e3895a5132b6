//! EvolutionTracker - feedback-driven re-planning
//!
//! Owns per-project evolution state (completion history, accumulated
//! context, last evolution timestamp), keyed by project id and injected
//! where needed - there are no ambient singletons. The cooldown check acts
//! as a soft mutex: an evolution request arriving before cooldown expiry
//! is rejected, not queued.

use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use docstore::now_ms;

use crate::domain::{AccumulatedContext, CompletionLog, CompletionRecord, DecompositionTree};
use crate::engine::TreeExpansionController;
use crate::error::EngineError;
use crate::llm::GenerationGateway;
use crate::prompts::PromptLibrary;
use crate::schema::LevelKey;

use super::strategies::{self, EvolutionNeeds, EvolutionOutcome};

/// Tunables for evolution triggering
#[derive(Debug, Clone)]
pub struct EvolutionConfig {
    /// Minimum time between evolutions for one project (milliseconds)
    pub cooldown_ms: i64,

    /// Minimum completions before evolution is considered
    pub min_samples: usize,

    /// How many recent completions the trigger and needs assessment see
    pub recent_window: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 5 * 60 * 1000,
            min_samples: 3,
            recent_window: 5,
        }
    }
}

/// Injectable clock, so cooldown behavior is testable without sleeping
pub type ClockFn = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Per-project evolution state
pub struct ProjectEvolutionState {
    pub log: CompletionLog,
    pub context: AccumulatedContext,
    pub last_evolution_ms: Option<i64>,
}

impl ProjectEvolutionState {
    pub fn new(project: &str) -> Self {
        Self {
            log: CompletionLog::new(project),
            context: AccumulatedContext::new(project),
            last_evolution_ms: None,
        }
    }
}

/// Tracks completions and decides when trees should evolve
pub struct EvolutionTracker {
    config: EvolutionConfig,
    states: HashMap<String, ProjectEvolutionState>,
    clock: ClockFn,
}

impl EvolutionTracker {
    /// Create a tracker with the wall clock
    pub fn new(config: EvolutionConfig) -> Self {
        Self::with_clock(config, Arc::new(now_ms))
    }

    /// Create a tracker with an injected clock (tests)
    pub fn with_clock(config: EvolutionConfig, clock: ClockFn) -> Self {
        Self {
            config,
            states: HashMap::new(),
            clock,
        }
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    /// State for a project, if any completions were recorded or restored
    pub fn state(&self, project: &str) -> Option<&ProjectEvolutionState> {
        self.states.get(project)
    }

    /// Restore state from persisted documents (process restart)
    pub fn restore(&mut self, project: &str, log: CompletionLog, context: AccumulatedContext) {
        debug!(project, entries = log.entries.len(), "restore: called");
        self.states.insert(
            project.to_string(),
            ProjectEvolutionState {
                log,
                context,
                last_evolution_ms: None,
            },
        );
    }

    fn ensure_state(&mut self, project: &str) -> &mut ProjectEvolutionState {
        self.states
            .entry(project.to_string())
            .or_insert_with(|| ProjectEvolutionState::new(project))
    }

    /// Record a task completion
    ///
    /// Appends to history and updates the accumulated context; marks the
    /// task completed. Idempotent on the task flag: re-recording the same
    /// task appends history but returns false and leaves the original
    /// completion record in place.
    pub fn record_completion(
        &mut self,
        project: &str,
        tree: &mut DecompositionTree,
        task_id: u32,
        record: CompletionRecord,
    ) -> Result<bool, EngineError> {
        let task = tree.task_mut(task_id).ok_or(EngineError::TaskNotFound { task_id })?;
        let newly_completed = task.complete(record.clone());
        tree.touch();

        let now = self.now();
        let state = self.ensure_state(project);
        state.log.append(task_id, record.clone(), now);
        state.context.absorb(&record, now);

        info!(
            project,
            task_id,
            newly_completed,
            total = state.log.entries.len(),
            "Recorded completion"
        );
        Ok(newly_completed)
    }

    /// Whether the project should evolve now
    ///
    /// False under cooldown or below the minimum sample count; otherwise
    /// true iff any of the recent completions carries a breakthrough, a
    /// new interest, or a struggling area.
    pub fn should_evolve(&self, project: &str, trigger: &str) -> bool {
        let Some(state) = self.states.get(project) else {
            return false;
        };

        let now = self.now();
        if let Some(last) = state.last_evolution_ms
            && now - last < self.config.cooldown_ms
        {
            debug!(project, trigger, "should_evolve: under cooldown");
            return false;
        }

        if state.log.entries.len() < self.config.min_samples {
            debug!(
                project,
                trigger,
                entries = state.log.entries.len(),
                "should_evolve: below minimum samples"
            );
            return false;
        }

        state.log.recent(self.config.recent_window).iter().any(|entry| {
            !entry.record.breakthroughs.is_empty()
                || !entry.record.next_interests.is_empty()
                || !entry.record.struggling_areas.is_empty()
        })
    }

    /// Assess which strategies the recorded state calls for
    pub fn assess(&self, project: &str, tree: &DecompositionTree) -> EvolutionNeeds {
        match self.states.get(project) {
            Some(state) => EvolutionNeeds::assess(state.log.recent(self.config.recent_window), &state.context, tree),
            None => EvolutionNeeds::default(),
        }
    }

    /// Evolve a tree: assess needs, apply strategies in fixed order,
    /// append one evolution event, start the cooldown window
    pub async fn evolve(
        &mut self,
        project: &str,
        tree: &mut DecompositionTree,
        trigger: &str,
        controller: &TreeExpansionController,
        gateway: &GenerationGateway,
        prompts: &PromptLibrary,
    ) -> Result<EvolutionOutcome, EngineError> {
        let needs = self.assess(project, tree);
        let now = self.now();
        debug!(project, ?needs, "evolve: assessed");

        let context_snapshot = match self.states.get(project) {
            Some(state) => state.context.clone(),
            None => AccumulatedContext::new(project),
        };

        let mut outcome =
            strategies::apply(tree, &needs, trigger, controller, gateway, prompts, &context_snapshot, now).await?;

        if needs.content_refinement {
            outcome.warnings.extend(self.validate_pain_points(project, gateway, prompts).await);
        }

        self.ensure_state(project).last_evolution_ms = Some(now);
        info!(
            project,
            strategies = outcome.event.strategies_applied.len(),
            "Evolution applied"
        );
        Ok(outcome)
    }

    /// Check recorded struggles against the pain-point contract, resolving
    /// the ones the model considers addressed. Failures degrade to a
    /// warning; the accumulated context is left untouched.
    async fn validate_pain_points(
        &mut self,
        project: &str,
        gateway: &GenerationGateway,
        prompts: &PromptLibrary,
    ) -> Vec<String> {
        let struggles: Vec<String> = match self.states.get(project) {
            Some(state) => state.context.unresolved_struggles().map(|s| s.topic.clone()).collect(),
            None => Vec::new(),
        };
        if struggles.is_empty() {
            return Vec::new();
        }

        let payload = json!({ "strugglingAreas": struggles });
        let instruction = match prompts.render(LevelKey::PainPointValidation, &payload) {
            Ok(instruction) => instruction,
            Err(err) => return vec![format!("pain point validation failed: {}", err)],
        };

        match gateway.generate(LevelKey::PainPointValidation, &payload, &instruction).await {
            Ok(value) => {
                let points = value
                    .get("painPoints")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let state = self.ensure_state(project);
                let mut resolved = 0;
                for point in &points {
                    if point.get("addressed").and_then(Value::as_bool).unwrap_or(false)
                        && let Some(area) = point.get("area").and_then(Value::as_str)
                        && state.context.resolve_struggle(area)
                    {
                        resolved += 1;
                    }
                }
                debug!(project, resolved, "validate_pain_points: done");
                Vec::new()
            }
            Err(err) => {
                warn!(project, error = %err, "validate_pain_points: gateway failed, skipping");
                vec![format!("pain point validation failed: {}", err)]
            }
        }
    }
}
