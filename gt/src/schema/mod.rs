//! Level schema contracts and structural validation

mod registry;
mod validate;

pub use registry::{LevelKey, LevelSchema, SchemaRegistry};
pub use validate::{Violation, validate};
