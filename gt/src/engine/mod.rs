//! Decomposition engine
//!
//! # Architecture
//!
//! ```text
//! Goal + Context
//!       ↓
//! GoalAnalyzer → GoalCharacteristics (target depth)
//!       ↓
//! DecompositionEngine
//!   level 1: goal context          (one unit)
//!   level 2: strategic branches    (one unit, sanitized)
//!   level 3: tasks per branch      (fan out, join)
//!   level 4: micro-steps per task  (fan out, join)
//!   level 5: atomic actions        (fan out, join)
//!   level 6: context variants      (fan out, join)
//!       ↓
//! frontier tasks (flattened, ids + priorities)
//! ```
//!
//! Each unit runs an ordered strategy chain (gateway, then deterministic
//! skeleton); the chosen strategy is recorded as a `SourceTag`. In strict
//! mode the chain stops at the gateway and any failure aborts the build.

mod decomposer;
mod expansion;
mod fallback;

pub use decomposer::{BuildOptions, DecompositionEngine};
pub use expansion::TreeExpansionController;
pub use fallback::{GatewayStrategy, GenerationStrategy, SkeletonStrategy, skeleton};
