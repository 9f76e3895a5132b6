//! Schema registry - the structural contract per decomposition level
//!
//! Ten fixed schemas: one per tree level (1-6) plus four auxiliary analysis
//! contracts used by evolution tracking. Each schema doubles as the
//! `input_schema` of the `submit_*` tool the generation call forces, so the
//! contract enforced on responses is exactly the contract shown to the model.
//!
//! Schemas never change at runtime.

use serde_json::{Value, json};
use std::collections::HashMap;

use super::validate::{Violation, validate};

/// Key identifying one of the ten fixed schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelKey {
    /// Level 1: refined goal, domain, success criteria
    GoalContext,
    /// Level 2: strategic branches
    StrategicBranches,
    /// Level 3: tasks within a branch
    TaskDecomposition,
    /// Level 4: micro-steps within a task
    MicroParticles,
    /// Level 5: atomic actions within a micro-step
    NanoActions,
    /// Level 6: context-adaptive variants of an atomic action
    ContextAdaptivePrimitives,
    /// Auxiliary: mining accumulated completion context
    ContextMining,
    /// Auxiliary: scoring domain relevance
    DomainRelevance,
    /// Auxiliary: validating recorded pain points
    PainPointValidation,
    /// Auxiliary: tree evolution adjustments
    TreeEvolution,
}

impl LevelKey {
    /// All ten keys, levels first
    pub const ALL: [LevelKey; 10] = [
        LevelKey::GoalContext,
        LevelKey::StrategicBranches,
        LevelKey::TaskDecomposition,
        LevelKey::MicroParticles,
        LevelKey::NanoActions,
        LevelKey::ContextAdaptivePrimitives,
        LevelKey::ContextMining,
        LevelKey::DomainRelevance,
        LevelKey::PainPointValidation,
        LevelKey::TreeEvolution,
    ];

    /// Stable string key, as used in prompts and persisted documents
    pub fn as_str(&self) -> &'static str {
        match self {
            LevelKey::GoalContext => "goalContext",
            LevelKey::StrategicBranches => "strategicBranches",
            LevelKey::TaskDecomposition => "taskDecomposition",
            LevelKey::MicroParticles => "microParticles",
            LevelKey::NanoActions => "nanoActions",
            LevelKey::ContextAdaptivePrimitives => "contextAdaptivePrimitives",
            LevelKey::ContextMining => "contextMining",
            LevelKey::DomainRelevance => "domainRelevance",
            LevelKey::PainPointValidation => "painPointValidation",
            LevelKey::TreeEvolution => "treeEvolution",
        }
    }

    /// Name of the tool the generation call forces for this schema
    pub fn tool_name(&self) -> &'static str {
        match self {
            LevelKey::GoalContext => "submit_goal_context",
            LevelKey::StrategicBranches => "submit_strategic_branches",
            LevelKey::TaskDecomposition => "submit_task_decomposition",
            LevelKey::MicroParticles => "submit_micro_particles",
            LevelKey::NanoActions => "submit_nano_actions",
            LevelKey::ContextAdaptivePrimitives => "submit_context_adaptive_primitives",
            LevelKey::ContextMining => "submit_context_mining",
            LevelKey::DomainRelevance => "submit_domain_relevance",
            LevelKey::PainPointValidation => "submit_pain_point_validation",
            LevelKey::TreeEvolution => "submit_tree_evolution",
        }
    }

    /// Key of the array the canonical shape nests content under, if any
    pub fn collection_key(&self) -> Option<&'static str> {
        match self {
            LevelKey::GoalContext => None,
            LevelKey::StrategicBranches => Some("branches"),
            LevelKey::TaskDecomposition => Some("tasks"),
            LevelKey::MicroParticles => Some("particles"),
            LevelKey::NanoActions => Some("actions"),
            LevelKey::ContextAdaptivePrimitives => Some("variants"),
            LevelKey::ContextMining => None,
            LevelKey::DomainRelevance => None,
            LevelKey::PainPointValidation => Some("painPoints"),
            LevelKey::TreeEvolution => Some("adjustments"),
        }
    }

    /// Tree depth for level schemas (1-6), None for auxiliary ones
    pub fn depth(&self) -> Option<u8> {
        match self {
            LevelKey::GoalContext => Some(1),
            LevelKey::StrategicBranches => Some(2),
            LevelKey::TaskDecomposition => Some(3),
            LevelKey::MicroParticles => Some(4),
            LevelKey::NanoActions => Some(5),
            LevelKey::ContextAdaptivePrimitives => Some(6),
            _ => None,
        }
    }

    /// Level key for a tree depth
    pub fn from_depth(depth: u8) -> Option<LevelKey> {
        match depth {
            1 => Some(LevelKey::GoalContext),
            2 => Some(LevelKey::StrategicBranches),
            3 => Some(LevelKey::TaskDecomposition),
            4 => Some(LevelKey::MicroParticles),
            5 => Some(LevelKey::NanoActions),
            6 => Some(LevelKey::ContextAdaptivePrimitives),
            _ => None,
        }
    }
}

impl std::fmt::Display for LevelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LevelKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LevelKey::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown level key: {}", s))
    }
}

/// One immutable structural contract
#[derive(Debug, Clone)]
pub struct LevelSchema {
    pub key: LevelKey,
    pub description: &'static str,
    pub schema: Value,
}

impl LevelSchema {
    /// Validate a value against this schema
    pub fn validate(&self, value: &Value) -> Result<(), Violation> {
        validate(&self.schema, value)
    }
}

/// Immutable lookup of the ten fixed schemas
pub struct SchemaRegistry {
    schemas: HashMap<LevelKey, LevelSchema>,
}

impl SchemaRegistry {
    /// Build the registry; all ten schemas are always present
    pub fn new() -> Self {
        let mut schemas = HashMap::new();
        for key in LevelKey::ALL {
            schemas.insert(
                key,
                LevelSchema {
                    key,
                    description: description_for(key),
                    schema: schema_for(key),
                },
            );
        }
        Self { schemas }
    }

    /// Look up the schema for a key
    pub fn get(&self, key: LevelKey) -> &LevelSchema {
        self.schemas.get(&key).expect("all level keys are registered")
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn description_for(key: LevelKey) -> &'static str {
    match key {
        LevelKey::GoalContext => "Submit the refined goal context: domain, motivation, success criteria",
        LevelKey::StrategicBranches => "Submit 3-7 strategic branches that partition the goal",
        LevelKey::TaskDecomposition => "Submit 3-10 concrete tasks for one branch",
        LevelKey::MicroParticles => "Submit 3-12 micro-steps for one task",
        LevelKey::NanoActions => "Submit 3-8 atomic actions for one micro-step",
        LevelKey::ContextAdaptivePrimitives => "Submit 2-5 context-adaptive variants of one atomic action",
        LevelKey::ContextMining => "Submit themes mined from recent completion records",
        LevelKey::DomainRelevance => "Submit a relevance score for a candidate domain",
        LevelKey::PainPointValidation => "Submit validated pain points from struggle history",
        LevelKey::TreeEvolution => "Submit adjustments to evolve the plan tree",
    }
}

fn schema_for(key: LevelKey) -> Value {
    match key {
        LevelKey::GoalContext => json!({
            "type": "object",
            "properties": {
                "domain": { "type": "string" },
                "refinedGoal": { "type": "string" },
                "motivation": { "type": "string" },
                "successCriteria": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                    "maxItems": 8
                },
                "constraints": {
                    "type": "array",
                    "items": { "type": "string" }
                },
                "knowledgeAreas": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1,
                    "maxItems": 10
                }
            },
            "required": ["domain", "refinedGoal", "successCriteria"]
        }),
        LevelKey::StrategicBranches => json!({
            "type": "object",
            "properties": {
                "branches": {
                    "type": "array",
                    "minItems": 3,
                    "maxItems": 7,
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "description": { "type": "string" },
                            "priority": { "type": "integer", "minimum": 1, "maximum": 7 },
                            "domainFocus": { "type": "string" },
                            "expectedOutcomes": {
                                "type": "array",
                                "items": { "type": "string" }
                            }
                        },
                        "required": ["description"]
                    }
                }
            },
            "required": ["branches"]
        }),
        LevelKey::TaskDecomposition => json!({
            "type": "object",
            "properties": {
                "branch": { "type": "string" },
                "tasks": {
                    "type": "array",
                    "minItems": 3,
                    "maxItems": 10,
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "description": { "type": "string" },
                            "difficulty": { "type": "integer", "minimum": 1, "maximum": 5 },
                            "durationMinutes": { "type": "integer", "minimum": 1 },
                            "prerequisites": {
                                "type": "array",
                                "items": { "type": "string" }
                            },
                            "action": { "type": "string" },
                            "validation": { "type": "string" }
                        },
                        "required": ["title", "description", "difficulty"]
                    }
                }
            },
            "required": ["branch", "tasks"]
        }),
        LevelKey::MicroParticles => json!({
            "type": "object",
            "properties": {
                "task": { "type": "string" },
                "particles": {
                    "type": "array",
                    "minItems": 3,
                    "maxItems": 12,
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "description": { "type": "string" },
                            "durationMinutes": { "type": "integer", "minimum": 1 },
                            "action": { "type": "string" },
                            "validation": { "type": "string" }
                        },
                        "required": ["title", "action"]
                    }
                }
            },
            "required": ["task", "particles"]
        }),
        LevelKey::NanoActions => json!({
            "type": "object",
            "properties": {
                "particle": { "type": "string" },
                "actions": {
                    "type": "array",
                    "minItems": 3,
                    "maxItems": 8,
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "instruction": { "type": "string" },
                            "durationSeconds": { "type": "integer", "minimum": 1 },
                            "tool": { "type": "string" }
                        },
                        "required": ["title", "instruction"]
                    }
                }
            },
            "required": ["particle", "actions"]
        }),
        LevelKey::ContextAdaptivePrimitives => json!({
            "type": "object",
            "properties": {
                "action": { "type": "string" },
                "variants": {
                    "type": "array",
                    "minItems": 2,
                    "maxItems": 5,
                    "items": {
                        "type": "object",
                        "properties": {
                            "context": {
                                "type": "string",
                                "enum": ["highEnergy", "lowEnergy", "shortSession", "deepFocus", "mobile"]
                            },
                            "instruction": { "type": "string" }
                        },
                        "required": ["context", "instruction"]
                    }
                }
            },
            "required": ["action", "variants"]
        }),
        LevelKey::ContextMining => json!({
            "type": "object",
            "properties": {
                "learningOutcomes": {
                    "type": "array",
                    "items": { "type": "string" }
                },
                "strugglingAreas": {
                    "type": "array",
                    "items": { "type": "string" }
                },
                "emergingInterests": {
                    "type": "array",
                    "items": { "type": "string" }
                },
                "preferredDifficulty": { "type": "integer", "minimum": 1, "maximum": 5 },
                "notes": { "type": "string" }
            },
            "required": ["learningOutcomes"]
        }),
        LevelKey::DomainRelevance => json!({
            "type": "object",
            "properties": {
                "domain": { "type": "string" },
                "relevance": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                "rationale": { "type": "string" }
            },
            "required": ["domain", "relevance"]
        }),
        LevelKey::PainPointValidation => json!({
            "type": "object",
            "properties": {
                "painPoints": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "area": { "type": "string" },
                            "severity": { "type": "integer", "minimum": 1, "maximum": 5 },
                            "addressed": { "type": "boolean" }
                        },
                        "required": ["area", "severity"]
                    }
                }
            },
            "required": ["painPoints"]
        }),
        LevelKey::TreeEvolution => json!({
            "type": "object",
            "properties": {
                "adjustments": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": 10,
                    "items": {
                        "type": "object",
                        "properties": {
                            "target": {
                                "type": "string",
                                "enum": ["branch", "task", "level"]
                            },
                            "identifier": { "type": "string" },
                            "change": { "type": "string" }
                        },
                        "required": ["target", "change"]
                    }
                },
                "rationale": { "type": "string" }
            },
            "required": ["adjustments"]
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_ten_schemas_registered() {
        let registry = SchemaRegistry::new();
        for key in LevelKey::ALL {
            let schema = registry.get(key);
            assert_eq!(schema.key, key);
            assert!(schema.schema.is_object());
        }
    }

    #[test]
    fn test_level_key_depth_mapping() {
        assert_eq!(LevelKey::from_depth(1), Some(LevelKey::GoalContext));
        assert_eq!(LevelKey::from_depth(6), Some(LevelKey::ContextAdaptivePrimitives));
        assert_eq!(LevelKey::from_depth(7), None);
        assert_eq!(LevelKey::StrategicBranches.depth(), Some(2));
        assert_eq!(LevelKey::TreeEvolution.depth(), None);
    }

    #[test]
    fn test_level_key_roundtrip() {
        for key in LevelKey::ALL {
            let parsed: LevelKey = key.as_str().parse().unwrap();
            assert_eq!(parsed, key);
        }
        assert!("unknownKey".parse::<LevelKey>().is_err());
    }

    #[test]
    fn test_branch_cardinality_enforced() {
        let registry = SchemaRegistry::new();
        let schema = registry.get(LevelKey::StrategicBranches);

        let two_branches = serde_json::json!({
            "branches": [
                {"description": "a"},
                {"description": "b"}
            ]
        });
        assert!(schema.validate(&two_branches).is_err());

        let three_branches = serde_json::json!({
            "branches": [
                {"description": "a"},
                {"description": "b"},
                {"description": "c"}
            ]
        });
        assert!(schema.validate(&three_branches).is_ok());
    }

    #[test]
    fn test_task_difficulty_bounds() {
        let registry = SchemaRegistry::new();
        let schema = registry.get(LevelKey::TaskDecomposition);

        let doc = serde_json::json!({
            "branch": "Vocabulary",
            "tasks": [
                {"title": "a", "description": "d", "difficulty": 6},
                {"title": "b", "description": "d", "difficulty": 2},
                {"title": "c", "description": "d", "difficulty": 3}
            ]
        });
        assert!(schema.validate(&doc).is_err());
    }

    #[test]
    fn test_variant_context_enum() {
        let registry = SchemaRegistry::new();
        let schema = registry.get(LevelKey::ContextAdaptivePrimitives);

        let doc = serde_json::json!({
            "action": "say the phrase aloud",
            "variants": [
                {"context": "highEnergy", "instruction": "say it at full speed"},
                {"context": "caffeinated", "instruction": "nope"}
            ]
        });
        assert!(schema.validate(&doc).is_err());
    }
}
