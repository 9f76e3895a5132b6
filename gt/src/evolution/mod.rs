//! Feedback-driven tree evolution
//!
//! Completion records accumulate into per-project context; once enough
//! samples exist and the cooldown has expired, trigger-worthy feedback
//! (breakthroughs, new interests, struggles) re-evolves the tree through
//! a fixed-order strategy pass.

mod strategies;
mod tracker;

pub use strategies::{EvolutionNeeds, EvolutionOutcome};
pub use tracker::{ClockFn, EvolutionConfig, EvolutionTracker, ProjectEvolutionState};
