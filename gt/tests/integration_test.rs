//! Integration tests for GoalTree
//!
//! These tests verify end-to-end behavior of the planner service over a
//! scripted LLM client and a temporary document store.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;

use docstore::Store;
use goaltree::domain::{CompletionRecord, SourceTag};
use goaltree::engine::BuildOptions;
use goaltree::evolution::{EvolutionConfig, EvolutionTracker};
use goaltree::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, TokenUsage, ToolCall};
use goaltree::pipeline::ResourceContext;
use goaltree::service::PlannerService;
use goaltree::{EngineError, GenerationError};

// =============================================================================
// Scripted LLM client
// =============================================================================

/// Answers every generation call with canonical content for the requested
/// tool; tools listed in `fail` error instead.
struct ScriptedClient {
    fail: HashSet<String>,
}

impl ScriptedClient {
    fn new() -> Self {
        Self { fail: HashSet::new() }
    }

    fn failing_on(tools: &[&str]) -> Self {
        Self {
            fail: tools.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn respond(tool: &str, payload: &Value) -> Value {
        match tool {
            "submit_goal_context" => json!({
                "domain": "language-learning",
                "refinedGoal": "Hold a basic conversation in Spanish",
                "motivation": "travel",
                "successCriteria": ["order food", "ask for directions"],
                "constraints": ["30 minutes per day"],
                "knowledgeAreas": ["vocabulary", "listening", "speaking"]
            }),
            "submit_strategic_branches" => json!({
                "branches": [
                    {"name": "Vocabulary", "description": "Core word bank", "priority": 1, "domainFocus": "vocabulary"},
                    {"name": "Listening", "description": "Comprehension at speed", "priority": 2, "domainFocus": "listening"},
                    {"name": "Speaking", "description": "Production and fluency", "priority": 3, "domainFocus": "speaking"}
                ]
            }),
            "submit_task_decomposition" => {
                let branch = payload["branch"]["name"].as_str().unwrap_or("Branch");
                json!({
                    "branch": branch,
                    "tasks": [
                        {
                            "title": format!("Survey {}", branch),
                            "description": format!("Scope out {}", branch),
                            "difficulty": 2,
                            "durationMinutes": 15,
                            "prerequisites": [],
                            "action": "make a topic list",
                            "validation": "list written down"
                        },
                        {
                            "title": format!("Drill {}", branch),
                            "description": format!("Daily drill for {}", branch),
                            "difficulty": 3,
                            "durationMinutes": 25,
                            "prerequisites": [format!("Survey {}", branch)],
                            "action": "run one drill session",
                            "validation": "session logged"
                        },
                        {
                            "title": format!("Apply {}", branch),
                            "description": format!("Use {} in context", branch),
                            "difficulty": 4,
                            "durationMinutes": 30,
                            "prerequisites": [format!("Drill {}", branch)],
                            "action": "use it in one real exchange",
                            "validation": "exchange happened"
                        }
                    ]
                })
            }
            "submit_micro_particles" => {
                let task = payload["task"]["title"].as_str().unwrap_or("Task");
                json!({
                    "task": task,
                    "particles": [
                        {"title": format!("Prepare for {}", task), "action": "set up", "validation": "ready", "durationMinutes": 5},
                        {"title": format!("Do {}", task), "action": "do the work", "validation": "output exists", "durationMinutes": 15},
                        {"title": format!("Wrap up {}", task), "action": "note results", "validation": "notes written", "durationMinutes": 5}
                    ]
                })
            }
            "submit_nano_actions" => {
                let particle = payload["particle"]["title"].as_str().unwrap_or("Step");
                json!({
                    "particle": particle,
                    "actions": [
                        {"title": format!("Start {}", particle), "instruction": "begin", "durationSeconds": 60},
                        {"title": format!("Continue {}", particle), "instruction": "keep going", "durationSeconds": 300},
                        {"title": format!("Finish {}", particle), "instruction": "stop and note", "durationSeconds": 60}
                    ]
                })
            }
            "submit_context_adaptive_primitives" => {
                let action = payload["action"]["title"].as_str().unwrap_or("Action");
                json!({
                    "action": action,
                    "variants": [
                        {"context": "highEnergy", "instruction": format!("{} fast", action)},
                        {"context": "lowEnergy", "instruction": format!("{} slowly", action)}
                    ]
                })
            }
            _ => json!({}),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let tool = request
            .tools
            .first()
            .map(|t| t.name.clone())
            .ok_or_else(|| LlmError::InvalidResponse("no tool in request".to_string()))?;

        if self.fail.contains(&tool) {
            return Err(LlmError::ApiError {
                status: 500,
                message: format!("scripted failure for {}", tool),
            });
        }

        let payload: Value = request
            .messages
            .first()
            .and_then(|m| serde_json::from_str(&m.content).ok())
            .unwrap_or(Value::Null);

        Ok(CompletionResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: "toolu_1".to_string(),
                name: tool.clone(),
                input: ScriptedClient::respond(&tool, &payload),
            }],
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        })
    }
}

fn service_with(client: ScriptedClient, dir: &TempDir) -> PlannerService {
    let store = Store::open(dir.path()).expect("Failed to open store");
    PlannerService::new(Arc::new(client), Some(store))
}

fn record(quality: u8, breakthroughs: &[&str]) -> CompletionRecord {
    CompletionRecord {
        duration_minutes: 20,
        quality,
        difficulty_rating: 3,
        breakthroughs: breakthroughs.iter().map(|s| s.to_string()).collect(),
        completed_at: docstore::now_ms(),
        ..Default::default()
    }
}

// =============================================================================
// Build
// =============================================================================

#[tokio::test]
async fn test_build_tree_to_depth_3() {
    let dir = TempDir::new().unwrap();
    let mut service = service_with(ScriptedClient::new(), &dir);

    let options = BuildOptions {
        target_depth: Some(3),
        ..Default::default()
    };
    let outcome = service
        .build_tree("p1", "spanish", "Learn conversational Spanish", json!({}), &options)
        .await
        .unwrap();

    let tree = &outcome.tree;
    assert_eq!(tree.available_depth, 3);
    assert!(tree.level(1).is_some());
    assert!(tree.level(2).is_some());
    assert!(tree.level(3).is_some());
    assert!(tree.level(4).is_none());
    assert!(tree.level(5).is_none());
    assert!(tree.level(6).is_none());

    let branch_count = tree.strategic_branches.len();
    assert!((3..=7).contains(&branch_count));

    // Every branch has tasks; ids are unique
    assert_eq!(tree.frontier_tasks.len(), branch_count * 3);
    let mut ids: Vec<u32> = tree.frontier_tasks.iter().map(|t| t.id).collect();
    let count = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), count);

    // All generated, nothing fell back
    assert!(tree.frontier_tasks.iter().all(|t| t.source == SourceTag::Generated));
    assert!(!tree.has_fallback_content());
    assert!(outcome.durable);
}

#[tokio::test]
async fn test_build_missing_goal_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut service = service_with(ScriptedClient::new(), &dir);

    let result = service
        .build_tree("p1", "spanish", "   ", json!({}), &BuildOptions::default())
        .await;
    assert!(matches!(result, Err(EngineError::MissingGoal)));
}

#[tokio::test]
async fn test_build_is_idempotent_without_force() {
    let dir = TempDir::new().unwrap();
    let mut service = service_with(ScriptedClient::new(), &dir);

    let options = BuildOptions {
        target_depth: Some(3),
        ..Default::default()
    };
    let first = service
        .build_tree("p1", "spanish", "Learn conversational Spanish", json!({}), &options)
        .await
        .unwrap();
    let second = service
        .build_tree("p1", "spanish", "Learn conversational Spanish", json!({}), &options)
        .await
        .unwrap();

    assert_eq!(first.tree.id, second.tree.id);
    assert_eq!(first.tree.frontier_tasks.len(), second.tree.frontier_tasks.len());

    // Force regenerate builds a fresh tree
    let forced = service
        .build_tree(
            "p1",
            "spanish",
            "Learn conversational Spanish",
            json!({}),
            &BuildOptions {
                target_depth: Some(3),
                force_regenerate: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_ne!(forced.tree.id, first.tree.id);
}

// =============================================================================
// Expansion
// =============================================================================

#[tokio::test]
async fn test_expand_tree_preserves_existing_levels() {
    let dir = TempDir::new().unwrap();
    let mut service = service_with(ScriptedClient::new(), &dir);

    let built = service
        .build_tree(
            "p1",
            "spanish",
            "Learn conversational Spanish",
            json!({}),
            &BuildOptions {
                target_depth: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let level_1 = built.tree.level(1).cloned();
    let level_2 = built.tree.level(2).cloned();
    let level_3 = built.tree.level(3).cloned();

    let expanded = service.expand_tree("p1", "spanish", 5).await.unwrap();
    let tree = &expanded.tree;

    assert_eq!(tree.available_depth, 5);
    assert!(tree.level(4).is_some());
    assert!(tree.level(5).is_some());
    assert!(tree.level(6).is_none());

    // Already-generated levels are byte-for-byte unchanged
    assert_eq!(tree.level(1).cloned(), level_1);
    assert_eq!(tree.level(2).cloned(), level_2);
    assert_eq!(tree.level(3).cloned(), level_3);

    // Task depths caught up
    assert!(tree.frontier_tasks.iter().all(|t| t.decomposition_depth == 5));

    // Expanding to a depth already reached is a no-op
    let again = service.expand_tree("p1", "spanish", 4).await.unwrap();
    assert_eq!(again.tree.available_depth, 5);
}

#[tokio::test]
async fn test_expand_without_tree_is_actionable_error() {
    let dir = TempDir::new().unwrap();
    let mut service = service_with(ScriptedClient::new(), &dir);

    let result = service.expand_tree("nobody", "nothing", 4).await;
    assert!(matches!(result, Err(EngineError::NoTreeFound { .. })));
}

// =============================================================================
// Fallback and strict mode
// =============================================================================

#[tokio::test]
async fn test_task_generation_failure_falls_back() {
    let dir = TempDir::new().unwrap();
    let mut service = service_with(ScriptedClient::failing_on(&["submit_task_decomposition"]), &dir);

    let outcome = service
        .build_tree(
            "p1",
            "spanish",
            "Learn conversational Spanish",
            json!({}),
            &BuildOptions {
                target_depth: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let tree = &outcome.tree;
    assert_eq!(tree.available_depth, 3);
    assert!(tree.level(3).is_some());

    // Level 3 content exists but is tagged as fallback
    assert!(tree.has_fallback_content());
    assert!(tree.frontier_tasks.iter().all(|t| t.source == SourceTag::Fallback));
    assert!(!tree.frontier_tasks.is_empty());
    assert!(outcome.warnings.iter().any(|w| w.contains("fallback")));
}

#[tokio::test]
async fn test_strict_mode_surfaces_generation_failure() {
    let dir = TempDir::new().unwrap();
    let mut service = service_with(ScriptedClient::failing_on(&["submit_task_decomposition"]), &dir);

    let result = service
        .build_tree(
            "p1",
            "spanish",
            "Learn conversational Spanish",
            json!({}),
            &BuildOptions {
                target_depth: Some(3),
                strict: true,
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(
        result,
        Err(EngineError::Generation(GenerationError::Llm(_)))
    ));
}

// =============================================================================
// Completion tracking and evolution
// =============================================================================

#[tokio::test]
async fn test_completion_tracking_and_evolution_trigger() {
    let dir = TempDir::new().unwrap();
    let time = Arc::new(AtomicI64::new(1_000_000));
    let time_ref = time.clone();
    let tracker = EvolutionTracker::with_clock(
        EvolutionConfig::default(),
        Arc::new(move || time_ref.load(Ordering::SeqCst)),
    );
    let mut service = service_with(ScriptedClient::new(), &dir).with_tracker(tracker);

    service
        .build_tree(
            "p1",
            "spanish",
            "Learn conversational Spanish",
            json!({}),
            &BuildOptions {
                target_depth: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Two quiet completions: not enough samples
    let outcome = service
        .record_completion("p1", "spanish", 0, record(3, &[]))
        .await
        .unwrap();
    assert!(!outcome.evolution_triggered);

    let outcome = service
        .record_completion("p1", "spanish", 1, record(3, &[]))
        .await
        .unwrap();
    assert!(!outcome.evolution_triggered);

    // Third completion with a breakthrough crosses the threshold
    let outcome = service
        .record_completion("p1", "spanish", 2, record(4, &["rolled my first r"]))
        .await
        .unwrap();
    assert!(outcome.evolution_triggered);

    let tree = service.tree("p1", "spanish").unwrap().unwrap();
    assert!(tree.task(0).unwrap().completed);
    assert!(tree.task(1).unwrap().completed);
    assert!(tree.task(2).unwrap().completed);
    assert_eq!(tree.evolution_history.len(), 1);

    // Within the cooldown window another trigger-worthy completion stays quiet
    let outcome = service
        .record_completion("p1", "spanish", 3, record(4, &["another breakthrough"]))
        .await
        .unwrap();
    assert!(!outcome.evolution_triggered);

    // Past the cooldown it fires again
    time.fetch_add(6 * 60 * 1000, Ordering::SeqCst);
    let outcome = service
        .record_completion("p1", "spanish", 4, record(4, &["yet another"]))
        .await
        .unwrap();
    assert!(outcome.evolution_triggered);
}

#[tokio::test]
async fn test_completion_is_write_once_per_task() {
    let dir = TempDir::new().unwrap();
    let mut service = service_with(ScriptedClient::new(), &dir);

    service
        .build_tree(
            "p1",
            "spanish",
            "Learn conversational Spanish",
            json!({}),
            &BuildOptions {
                target_depth: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    service
        .record_completion("p1", "spanish", 0, record(5, &[]))
        .await
        .unwrap();
    service
        .record_completion("p1", "spanish", 0, record(1, &[]))
        .await
        .unwrap();

    let tree = service.tree("p1", "spanish").unwrap().unwrap();
    let task = tree.task(0).unwrap();
    assert!(task.completed);
    // Original record preserved
    assert_eq!(task.completion.as_ref().unwrap().quality, 5);
}

#[tokio::test]
async fn test_record_completion_unknown_task() {
    let dir = TempDir::new().unwrap();
    let mut service = service_with(ScriptedClient::new(), &dir);

    service
        .build_tree(
            "p1",
            "spanish",
            "Learn conversational Spanish",
            json!({}),
            &BuildOptions {
                target_depth: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let result = service.record_completion("p1", "spanish", 999, record(3, &[])).await;
    assert!(matches!(result, Err(EngineError::TaskNotFound { task_id: 999 })));
}

// =============================================================================
// Pipeline
// =============================================================================

#[tokio::test]
async fn test_get_pipeline_bounds() {
    let dir = TempDir::new().unwrap();
    let mut service = service_with(ScriptedClient::new(), &dir);

    service
        .build_tree(
            "p1",
            "spanish",
            "Learn conversational Spanish",
            json!({}),
            &BuildOptions {
                target_depth: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let pipeline = service
        .get_pipeline(
            "p1",
            "spanish",
            &ResourceContext {
                energy_level: 3,
                time_available_minutes: 30,
            },
        )
        .await
        .unwrap();

    assert!(pipeline.primary.is_some());
    assert!(pipeline.secondary.len() <= 3);
    assert!(pipeline.tertiary.len() <= 2);

    // No task appears twice
    let mut seen = HashSet::new();
    if let Some(p) = &pipeline.primary {
        seen.insert(p.id);
    }
    for task in pipeline.secondary.iter().chain(pipeline.tertiary.iter()) {
        assert!(seen.insert(task.id));
    }
}

#[tokio::test]
async fn test_get_pipeline_without_tree() {
    let dir = TempDir::new().unwrap();
    let mut service = service_with(ScriptedClient::new(), &dir);

    let result = service.get_pipeline("p1", "spanish", &ResourceContext::default()).await;
    assert!(matches!(result, Err(EngineError::NoTreeFound { .. })));
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_tree_survives_process_restart() {
    let dir = TempDir::new().unwrap();

    let tree_id = {
        let mut service = service_with(ScriptedClient::new(), &dir);
        let outcome = service
            .build_tree(
                "p1",
                "spanish",
                "Learn conversational Spanish",
                json!({}),
                &BuildOptions {
                    target_depth: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        service
            .record_completion("p1", "spanish", 0, record(4, &[]))
            .await
            .unwrap();
        outcome.tree.id
    };

    // Fresh service over the same store directory
    let mut service = service_with(ScriptedClient::new(), &dir);
    let tree = service.tree("p1", "spanish").unwrap().unwrap();
    assert_eq!(tree.id, tree_id);
    assert_eq!(tree.available_depth, 3);
    assert!(tree.task(0).unwrap().completed);

    // Pipeline works off the restored tree
    let pipeline = service
        .get_pipeline("p1", "spanish", &ResourceContext::default())
        .await
        .unwrap();
    assert!(pipeline.primary.is_some());
    // The completed task is not offered again
    assert_ne!(pipeline.primary.unwrap().id, 0);
}

#[tokio::test]
async fn test_no_store_degrades_to_in_memory() {
    let mut service = PlannerService::new(Arc::new(ScriptedClient::new()), None);

    let outcome = service
        .build_tree(
            "p1",
            "spanish",
            "Learn conversational Spanish",
            json!({}),
            &BuildOptions {
                target_depth: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Build succeeded, but the caller is warned the result is not durable
    assert!(!outcome.durable);
    assert_eq!(outcome.tree.available_depth, 3);

    // In-memory operations keep working for the session
    let pipeline = service
        .get_pipeline("p1", "spanish", &ResourceContext::default())
        .await
        .unwrap();
    assert!(pipeline.primary.is_some());
}
