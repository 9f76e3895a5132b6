//! GoalTree - Progressive Hierarchical Decomposition Engine
//!
//! GoalTree turns a high-level goal into a six-level plan tree using an
//! LLM as the sole source of domain intelligence, tracks completion
//! feedback, re-evolves the tree under a cooldown policy, and arranges
//! leaf tasks into a bounded "what next" pipeline.
//!
//! # Core Concepts
//!
//! - **Six fixed levels**: goal context, strategic branches, tasks,
//!   micro-steps, atomic actions, context-adaptive variants
//! - **Schema-enforced generation**: every level is validated against an
//!   immutable contract before it enters the tree
//! - **Fallback, not failure**: generation failures substitute a
//!   deterministic schema-conformant skeleton, visibly tagged
//! - **Monotonic growth**: levels are only ever added; partial trees are
//!   valid, consumable plans
//!
//! # Modules
//!
//! - [`llm`] - LLM client trait, Anthropic implementation, generation gateway
//! - [`schema`] - the ten fixed structural contracts
//! - [`engine`] - level-by-level decomposition and on-demand expansion
//! - [`evolution`] - completion tracking and feedback-driven re-planning
//! - [`pipeline`] - bounded next-task selection
//! - [`service`] - the produced interface over all of the above

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod evolution;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod service;
pub mod vector;

// Re-export commonly used types
pub use analyzer::analyze;
pub use config::{Config, LlmConfig};
pub use domain::{
    AccumulatedContext, Branch, CompletionLog, CompletionRecord, DecompositionTree, EvolutionEvent, GoalCharacteristics,
    SourceTag, Task,
};
pub use engine::{BuildOptions, DecompositionEngine, TreeExpansionController};
pub use error::EngineError;
pub use evolution::{EvolutionConfig, EvolutionNeeds, EvolutionTracker};
pub use llm::{AnthropicClient, GenerationError, GenerationGateway, LlmClient, LlmError};
pub use pipeline::{Pipeline, PipelineConfig, ResourceContext, TaskPipelineSelector};
pub use schema::{LevelKey, SchemaRegistry};
pub use service::{BuildOutcome, CompletionOutcome, PlannerService};
