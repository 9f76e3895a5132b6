//! Evolution needs assessment and strategy application
//!
//! `EvolutionNeeds` is a pure function of recorded state - no hidden
//! randomness - so trigger behavior is exactly reproducible from a
//! constructed history. Strategies apply in a fixed order: depth, branch,
//! content, goal. Strategy failures degrade to warnings; evolution never
//! hard-fails a tree that was healthy before it ran.

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::domain::{
    AccumulatedContext, Branch, CompletionEntry, DecompositionTree, EvolutionEvent, EvolutionStrategy, MAX_DEPTH,
    SourceTag, Task, sanitize_branch_name,
};
use crate::engine::{TreeExpansionController, skeleton};
use crate::error::EngineError;
use crate::llm::GenerationGateway;
use crate::prompts::PromptLibrary;
use crate::schema::LevelKey;

/// Which evolution strategies the recorded state calls for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvolutionNeeds {
    pub depth_expansion: bool,
    pub branch_expansion: bool,
    pub content_refinement: bool,
    pub goal_adjustment: bool,
}

impl EvolutionNeeds {
    pub fn any(&self) -> bool {
        self.depth_expansion || self.branch_expansion || self.content_refinement || self.goal_adjustment
    }

    /// Assess needs from the recent completion window and accumulated
    /// context. Pure and deterministic.
    pub fn assess(recent: &[CompletionEntry], context: &AccumulatedContext, tree: &DecompositionTree) -> Self {
        if recent.is_empty() {
            return Self::default();
        }

        let n = recent.len() as f64;
        let avg_quality: f64 = recent.iter().map(|e| e.record.quality as f64).sum::<f64>() / n;
        let avg_difficulty: f64 = recent.iter().map(|e| e.record.difficulty_rating as f64).sum::<f64>() / n;
        let low_quality_count = recent.iter().filter(|e| e.record.quality <= 2).count();

        // Cruising through high-quality completions: finer granularity helps
        let depth_expansion = tree.available_depth < MAX_DEPTH && avg_quality >= 4.0;

        // A recurring interest no existing branch covers
        let branch_expansion = context.emerging_interests.iter().any(|interest| {
            interest.frequency >= 2 && !branch_covers_topic(&tree.strategic_branches, &interest.topic)
        });

        // Recurring unresolved struggles, or a streak of poor completions
        let content_refinement =
            context.unresolved_struggles().any(|s| s.frequency >= 2) || low_quality_count >= 2;

        // Consistent difficulty mismatch in either direction
        let goal_adjustment = avg_difficulty >= 4.5 || avg_difficulty <= 1.5;

        Self {
            depth_expansion,
            branch_expansion,
            content_refinement,
            goal_adjustment,
        }
    }
}

fn branch_covers_topic(branches: &[Branch], topic: &str) -> bool {
    let topic = topic.to_lowercase();
    branches.iter().any(|b| {
        b.name.to_lowercase().contains(&topic)
            || b.domain_focus.to_lowercase().contains(&topic)
            || topic.contains(&b.name.to_lowercase())
    })
}

/// Result of one evolution pass
#[derive(Debug)]
pub struct EvolutionOutcome {
    pub event: EvolutionEvent,
    pub warnings: Vec<String>,
}

/// Apply the needed strategies to a tree, in fixed order
pub async fn apply(
    tree: &mut DecompositionTree,
    needs: &EvolutionNeeds,
    trigger: &str,
    controller: &TreeExpansionController,
    gateway: &GenerationGateway,
    prompts: &PromptLibrary,
    context: &AccumulatedContext,
    now: i64,
) -> Result<EvolutionOutcome, EngineError> {
    let mut applied = Vec::new();
    let mut warnings = Vec::new();

    if needs.depth_expansion {
        let target = tree.available_depth + 1;
        debug!(tree_id = %tree.id, target, "apply: depth expansion");
        warnings.extend(controller.expand(tree, target).await?);
        applied.push(EvolutionStrategy::DepthExpansion);
    }

    if needs.branch_expansion {
        match expand_branches(tree, gateway, prompts, context).await {
            Ok(added) => {
                if let Some(name) = added {
                    info!(tree_id = %tree.id, branch = %name, "apply: added branch");
                    applied.push(EvolutionStrategy::BranchExpansion);
                } else {
                    warnings.push("branch expansion proposed no new branch".to_string());
                }
            }
            Err(err) => {
                warn!(error = %err, "apply: branch expansion failed, skipping");
                warnings.push(format!("branch expansion failed: {}", err));
            }
        }
    }

    if needs.content_refinement {
        match refine_content(tree, gateway, prompts, context).await {
            Ok(refined) => {
                debug!(tree_id = %tree.id, refined, "apply: content refinement");
                applied.push(EvolutionStrategy::ContentRefinement);
            }
            Err(err) => {
                warn!(error = %err, "apply: content refinement failed, skipping");
                warnings.push(format!("content refinement failed: {}", err));
            }
        }
    }

    if needs.goal_adjustment {
        // Recalibration is recorded on the characteristics so future
        // builds and selections can see it
        tree.goal_characteristics.traits.insert("recalibrated".to_string());
        applied.push(EvolutionStrategy::GoalAdjustment);
    }

    let event = EvolutionEvent {
        trigger: trigger.to_string(),
        strategies_applied: applied,
        timestamp: now,
    };
    tree.record_evolution(event.clone());

    Ok(EvolutionOutcome { event, warnings })
}

/// Ask the gateway for fresh branches and graft the first genuinely new one
async fn expand_branches(
    tree: &mut DecompositionTree,
    gateway: &GenerationGateway,
    prompts: &PromptLibrary,
    context: &AccumulatedContext,
) -> Result<Option<String>, EngineError> {
    let interests: Vec<&str> = context.emerging_interests.iter().map(|i| i.topic.as_str()).collect();
    let existing: Vec<&str> = tree.strategic_branches.iter().map(|b| b.name.as_str()).collect();

    let payload = json!({
        "goal": tree.goal,
        "goalContext": tree.level(1).cloned().unwrap_or(Value::Null),
        "existingBranches": existing,
        "emergingInterests": interests,
    });
    let instruction = prompts
        .render(LevelKey::StrategicBranches, &payload)
        .map_err(|e| crate::llm::GenerationError::Template(e.to_string()))?;

    let value = gateway.generate(LevelKey::StrategicBranches, &payload, &instruction).await?;

    let candidates = value.get("branches").and_then(Value::as_array).cloned().unwrap_or_default();
    let existing_lower: Vec<String> = tree.strategic_branches.iter().map(|b| b.name.to_lowercase()).collect();

    let Some(candidate) = candidates.iter().find(|c| {
        let name = sanitize_branch_name(c.get("name").and_then(Value::as_str), 0).to_lowercase();
        !existing_lower.contains(&name)
    }) else {
        return Ok(None);
    };

    let position = tree.strategic_branches.len() + 1;
    let branch = Branch {
        name: sanitize_branch_name(candidate.get("name").and_then(Value::as_str), position),
        description: candidate
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        priority: position as u32,
        domain_focus: candidate
            .get("domainFocus")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        expected_outcomes: Vec::new(),
        tasks: Vec::new(),
    };
    let name = branch.name.clone();

    attach_branch_tasks(tree, branch, gateway, prompts).await?;
    Ok(Some(name))
}

/// Generate tasks for a newly grafted branch and append them to the
/// level-3 document and the frontier
async fn attach_branch_tasks(
    tree: &mut DecompositionTree,
    branch: Branch,
    gateway: &GenerationGateway,
    prompts: &PromptLibrary,
) -> Result<(), EngineError> {
    let payload = json!({
        "goal": tree.goal,
        "branch": { "name": branch.name, "description": branch.description, "domainFocus": branch.domain_focus },
    });
    let instruction = prompts
        .render(LevelKey::TaskDecomposition, &payload)
        .map_err(|e| crate::llm::GenerationError::Template(e.to_string()))?;

    let (mut decomposition, source) = match gateway.generate(LevelKey::TaskDecomposition, &payload, &instruction).await {
        Ok(value) => (value, SourceTag::Generated),
        Err(err) => {
            warn!(error = %err, branch = %branch.name, "attach_branch_tasks: falling back to skeleton");
            (skeleton(LevelKey::TaskDecomposition, &payload), SourceTag::Fallback)
        }
    };

    if let Value::Object(ref mut obj) = decomposition {
        obj.insert("sourceTag".to_string(), json!(source.to_string()));
    }

    let items = decomposition
        .get("tasks")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut branch = branch;
    for (ordinal, item) in items.iter().enumerate() {
        let id = tree.allocate_task_id();
        branch.tasks.push(id);
        tree.frontier_tasks.push(Task {
            id,
            title: item.get("title").and_then(Value::as_str).unwrap_or("Task").to_string(),
            description: item
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            difficulty: item.get("difficulty").and_then(Value::as_u64).unwrap_or(3).clamp(1, 5) as u8,
            duration_minutes: item.get("durationMinutes").and_then(Value::as_u64).unwrap_or(30) as u32,
            branch: branch.name.clone(),
            priority: branch.priority * 100 + ordinal as u32 * 10,
            prerequisites: Default::default(),
            completed: false,
            completion: None,
            decomposition_depth: 3,
            can_decompose_further: true,
            action: item.get("action").and_then(Value::as_str).map(str::to_string),
            validation: item.get("validation").and_then(Value::as_str).map(str::to_string),
            source,
        });
    }

    // Graft into the level documents; the level-2 branch list and level-3
    // aggregate stay consistent with the canonical branches
    if let Some(level3) = tree.levels.get_mut(&3)
        && let Some(decompositions) = level3.get_mut("decompositions").and_then(Value::as_array_mut)
    {
        decompositions.push(decomposition);
    }
    if let Some(level2) = tree.levels.get_mut(&2)
        && let Some(branches) = level2.get_mut("branches").and_then(Value::as_array_mut)
    {
        branches.push(json!({
            "name": branch.name,
            "description": branch.description,
            "priority": branch.priority,
            "domainFocus": branch.domain_focus,
        }));
    }

    tree.strategic_branches.push(branch);
    tree.touch();
    Ok(())
}

/// Ask the gateway for refinement adjustments and apply the actionable ones
async fn refine_content(
    tree: &mut DecompositionTree,
    gateway: &GenerationGateway,
    prompts: &PromptLibrary,
    context: &AccumulatedContext,
) -> Result<usize, EngineError> {
    let struggles: Vec<&str> = context.unresolved_struggles().map(|s| s.topic.as_str()).collect();
    let branches: Vec<&str> = tree.strategic_branches.iter().map(|b| b.name.as_str()).collect();

    let payload = json!({
        "goal": tree.goal,
        "branches": branches,
        "strugglingAreas": struggles,
    });
    let instruction = prompts
        .render(LevelKey::TreeEvolution, &payload)
        .map_err(|e| crate::llm::GenerationError::Template(e.to_string()))?;

    let value = gateway.generate(LevelKey::TreeEvolution, &payload, &instruction).await?;

    let adjustments = value
        .get("adjustments")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut refined = 0;
    for adjustment in &adjustments {
        let target = adjustment.get("target").and_then(Value::as_str).unwrap_or("");
        let identifier = adjustment.get("identifier").and_then(Value::as_str).unwrap_or("");
        let change = adjustment.get("change").and_then(Value::as_str).unwrap_or("");
        if change.is_empty() {
            continue;
        }

        match target {
            "task" => {
                if let Some(task) = tree.frontier_tasks.iter_mut().find(|t| t.title == identifier) {
                    task.description = format!("{} [refined: {}]", task.description, change);
                    refined += 1;
                }
            }
            "branch" => {
                if let Some(branch) = tree.strategic_branches.iter_mut().find(|b| b.name == identifier) {
                    branch.description = format!("{} [refined: {}]", branch.description, change);
                    refined += 1;
                }
            }
            _ => {}
        }
    }

    if refined > 0 {
        tree.touch();
    }
    Ok(refined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CompletionRecord, GoalCharacteristics, Interest, StruggleArea};
    use serde_json::json;

    fn entry(quality: u8, difficulty: u8) -> CompletionEntry {
        CompletionEntry {
            task_id: 0,
            record: CompletionRecord {
                quality,
                difficulty_rating: difficulty,
                completed_at: 1_000,
                ..Default::default()
            },
        }
    }

    fn tree_at_depth(depth: u8) -> DecompositionTree {
        let mut tree = DecompositionTree::new("Learn Spanish", json!({}), GoalCharacteristics::default());
        for d in 1..=depth {
            tree.set_level(d, json!({}), crate::domain::LevelProvenance::generated());
        }
        tree
    }

    #[test]
    fn test_assess_empty_history_needs_nothing() {
        let needs = EvolutionNeeds::assess(&[], &AccumulatedContext::new("p"), &tree_at_depth(3));
        assert!(!needs.any());
    }

    #[test]
    fn test_assess_depth_expansion_on_high_quality() {
        let recent = vec![entry(5, 3), entry(4, 3), entry(5, 3)];
        let needs = EvolutionNeeds::assess(&recent, &AccumulatedContext::new("p"), &tree_at_depth(3));
        assert!(needs.depth_expansion);

        // Already at max depth: no expansion possible
        let needs = EvolutionNeeds::assess(&recent, &AccumulatedContext::new("p"), &tree_at_depth(6));
        assert!(!needs.depth_expansion);
    }

    #[test]
    fn test_assess_branch_expansion_on_uncovered_interest() {
        let mut context = AccumulatedContext::new("p");
        context.emerging_interests.push(Interest {
            topic: "slang".to_string(),
            first_seen: 1_000,
            frequency: 2,
        });

        let recent = vec![entry(3, 3)];
        let needs = EvolutionNeeds::assess(&recent, &context, &tree_at_depth(3));
        assert!(needs.branch_expansion);

        // One-off interests do not trigger
        context.emerging_interests[0].frequency = 1;
        let needs = EvolutionNeeds::assess(&recent, &context, &tree_at_depth(3));
        assert!(!needs.branch_expansion);
    }

    #[test]
    fn test_assess_content_refinement_on_struggles() {
        let mut context = AccumulatedContext::new("p");
        context.struggling_areas.push(StruggleArea {
            topic: "conjugation".to_string(),
            frequency: 2,
            resolved: false,
        });

        let needs = EvolutionNeeds::assess(&[entry(3, 3)], &context, &tree_at_depth(3));
        assert!(needs.content_refinement);

        // Resolved struggles do not trigger
        context.struggling_areas[0].resolved = true;
        let needs = EvolutionNeeds::assess(&[entry(3, 3)], &context, &tree_at_depth(3));
        assert!(!needs.content_refinement);
    }

    #[test]
    fn test_assess_goal_adjustment_on_difficulty_mismatch() {
        let too_hard = vec![entry(3, 5), entry(3, 5), entry(3, 4)];
        let needs = EvolutionNeeds::assess(&too_hard, &AccumulatedContext::new("p"), &tree_at_depth(3));
        assert!(needs.goal_adjustment);

        let too_easy = vec![entry(3, 1), entry(3, 1), entry(3, 2)];
        let needs = EvolutionNeeds::assess(&too_easy, &AccumulatedContext::new("p"), &tree_at_depth(3));
        assert!(needs.goal_adjustment);

        let balanced = vec![entry(3, 3), entry(3, 3), entry(3, 3)];
        let needs = EvolutionNeeds::assess(&balanced, &AccumulatedContext::new("p"), &tree_at_depth(3));
        assert!(!needs.goal_adjustment);
    }

    #[test]
    fn test_assess_is_deterministic() {
        let recent = vec![entry(5, 3), entry(4, 3)];
        let context = AccumulatedContext::new("p");
        let tree = tree_at_depth(3);

        let a = EvolutionNeeds::assess(&recent, &context, &tree);
        let b = EvolutionNeeds::assess(&recent, &context, &tree);
        assert_eq!(a, b);
    }
}
