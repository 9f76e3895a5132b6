//! Generation strategies and the deterministic fallback skeleton
//!
//! Generation for a unit runs through an ordered strategy chain: the
//! gateway first, then the skeleton. The chosen strategy is recorded on
//! the result as a `SourceTag`, so fallback substitution is visible in the
//! tree rather than hidden in control flow. Skeleton content satisfies the
//! same schemas as generated content; downstream consumers see no
//! structural difference.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::domain::SourceTag;
use crate::llm::{GenerationError, GenerationGateway};
use crate::schema::LevelKey;

/// One way of producing level content
#[async_trait]
pub trait GenerationStrategy: Send + Sync {
    /// Tag recorded on content this strategy produced
    fn tag(&self) -> SourceTag;

    /// Produce canonical, schema-conformant content for a unit
    async fn produce(&self, level: LevelKey, payload: &Value, instruction: &str) -> Result<Value, GenerationError>;
}

/// Strategy backed by the generation gateway
pub struct GatewayStrategy {
    gateway: Arc<GenerationGateway>,
}

impl GatewayStrategy {
    pub fn new(gateway: Arc<GenerationGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl GenerationStrategy for GatewayStrategy {
    fn tag(&self) -> SourceTag {
        SourceTag::Generated
    }

    async fn produce(&self, level: LevelKey, payload: &Value, instruction: &str) -> Result<Value, GenerationError> {
        self.gateway.generate(level, payload, instruction).await
    }
}

/// Deterministic skeleton strategy; derives content from the payload alone
pub struct SkeletonStrategy;

#[async_trait]
impl GenerationStrategy for SkeletonStrategy {
    fn tag(&self) -> SourceTag {
        SourceTag::Fallback
    }

    async fn produce(&self, level: LevelKey, payload: &Value, _instruction: &str) -> Result<Value, GenerationError> {
        Ok(skeleton(level, payload))
    }
}

/// Build the fallback skeleton for a level unit
pub fn skeleton(level: LevelKey, payload: &Value) -> Value {
    match level {
        LevelKey::GoalContext => goal_context(&payload_text(payload, "goal")),
        LevelKey::StrategicBranches => strategic_branches(&payload_text(payload, "goal")),
        LevelKey::TaskDecomposition => tasks_for_branch(&payload_text(payload, "goal"), &payload_text(payload, "branch")),
        LevelKey::MicroParticles => particles_for_task(&payload_text(payload, "task")),
        LevelKey::NanoActions => actions_for_particle(&payload_text(payload, "particle")),
        LevelKey::ContextAdaptivePrimitives => variants_for_action(&payload_text(payload, "action")),
        // Auxiliary contracts have neutral skeletons: empty findings
        LevelKey::ContextMining => json!({ "learningOutcomes": [] }),
        LevelKey::DomainRelevance => json!({ "domain": payload_text(payload, "domain"), "relevance": 0.5 }),
        LevelKey::PainPointValidation => json!({ "painPoints": [] }),
        LevelKey::TreeEvolution => json!({
            "adjustments": [
                { "target": "level", "change": "no adjustment; evolution content unavailable" }
            ]
        }),
    }
}

/// Extract a display name from a payload field that may be a string or an
/// object carrying `name`/`title`
fn payload_text(payload: &Value, key: &str) -> String {
    let field = payload.get(key);
    field
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            field
                .and_then(|f| f.get("name").or_else(|| f.get("title")))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "the goal".to_string())
}

fn goal_context(goal: &str) -> Value {
    json!({
        "domain": "general",
        "refinedGoal": goal,
        "motivation": format!("Make steady, visible progress on: {}", goal),
        "successCriteria": [
            format!("Completed the first round of work toward: {}", goal),
            "Can describe what was done and what comes next"
        ],
        "constraints": [],
        "knowledgeAreas": ["fundamentals"]
    })
}

fn strategic_branches(goal: &str) -> Value {
    json!({
        "branches": [
            {
                "name": "Foundations",
                "description": format!("Build the base knowledge needed for: {}", goal),
                "priority": 1,
                "domainFocus": "fundamentals",
                "expectedOutcomes": ["Core concepts are familiar"]
            },
            {
                "name": "Core Practice",
                "description": format!("Regular deliberate practice toward: {}", goal),
                "priority": 2,
                "domainFocus": "practice",
                "expectedOutcomes": ["A repeatable practice routine exists"]
            },
            {
                "name": "Applied Work",
                "description": format!("Apply what was practiced to real situations for: {}", goal),
                "priority": 3,
                "domainFocus": "application",
                "expectedOutcomes": ["Skills hold up outside practice"]
            },
            {
                "name": "Review & Consolidation",
                "description": format!("Review progress and consolidate gains on: {}", goal),
                "priority": 4,
                "domainFocus": "review",
                "expectedOutcomes": ["Weak spots identified and revisited"]
            }
        ]
    })
}

fn tasks_for_branch(goal: &str, branch: &str) -> Value {
    json!({
        "branch": branch,
        "tasks": [
            {
                "title": format!("Survey {}", branch),
                "description": format!("Get an overview of what {} involves for: {}", branch, goal),
                "difficulty": 2,
                "durationMinutes": 20,
                "prerequisites": [],
                "action": format!("List the main topics {} covers", branch),
                "validation": "A written list of topics exists"
            },
            {
                "title": format!("Practice {} fundamentals", branch),
                "description": format!("Work through the basics of {}", branch),
                "difficulty": 2,
                "durationMinutes": 25,
                "prerequisites": [format!("Survey {}", branch)],
                "action": "Complete one focused practice session",
                "validation": "Session notes were written down"
            },
            {
                "title": format!("Apply {} to a small exercise", branch),
                "description": format!("Use what was practiced in {} on one concrete exercise", branch),
                "difficulty": 3,
                "durationMinutes": 30,
                "prerequisites": [format!("Practice {} fundamentals", branch)],
                "action": "Finish one self-contained exercise end to end",
                "validation": "The exercise result was checked against expectations"
            }
        ]
    })
}

fn particles_for_task(task: &str) -> Value {
    json!({
        "task": task,
        "particles": [
            {
                "title": "Prepare",
                "description": format!("Set up everything needed for: {}", task),
                "durationMinutes": 5,
                "action": "Gather materials and clear distractions",
                "validation": "Ready to start without interruptions"
            },
            {
                "title": "Work the task",
                "description": format!("Do the core work of: {}", task),
                "durationMinutes": 15,
                "action": "Work in one focused block",
                "validation": "The main output of the task exists"
            },
            {
                "title": "Check the result",
                "description": format!("Verify the outcome of: {}", task),
                "durationMinutes": 5,
                "action": "Compare the result against the task description",
                "validation": "Gaps, if any, are written down"
            }
        ]
    })
}

fn actions_for_particle(particle: &str) -> Value {
    json!({
        "particle": particle,
        "actions": [
            {
                "title": "Set up",
                "instruction": format!("Open or lay out what '{}' needs", particle),
                "durationSeconds": 60
            },
            {
                "title": "Execute",
                "instruction": format!("Carry out '{}' in one pass", particle),
                "durationSeconds": 300
            },
            {
                "title": "Note the result",
                "instruction": "Write one line about what happened",
                "durationSeconds": 60
            }
        ]
    })
}

fn variants_for_action(action: &str) -> Value {
    json!({
        "action": action,
        "variants": [
            {
                "context": "highEnergy",
                "instruction": format!("Do '{}' at full pace without pausing", action)
            },
            {
                "context": "lowEnergy",
                "instruction": format!("Do '{}' slowly, in two smaller passes", action)
            }
        ]
    })
}
