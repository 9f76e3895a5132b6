//! Next-task pipeline selection

mod selector;

pub use selector::{Pipeline, PipelineConfig, ResourceContext, TaskPipelineSelector, task_energy};
