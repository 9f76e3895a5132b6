//! TaskPipelineSelector - bounded "what next" presentation
//!
//! Scores the frontier pool against the caller's resource budget, keeps
//! the top slice, re-buckets by difficulty tier for variety, and partitions
//! into primary / secondary / tertiary. An empty pool yields an explicit
//! empty pipeline, never an error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::domain::Task;

/// Caller's resource budget for the next work session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContext {
    /// Current energy 1-5
    pub energy_level: u8,

    /// Minutes available
    pub time_available_minutes: u32,
}

impl Default for ResourceContext {
    fn default() -> Self {
        Self {
            energy_level: 3,
            time_available_minutes: 30,
        }
    }
}

/// Selector tunables; defaults match the documented scoring contract
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Candidates kept after scoring
    pub pool_size: usize,

    /// Per-tier variety caps applied to the kept slice
    pub easy_cap: usize,
    pub medium_cap: usize,
    pub hard_cap: usize,

    /// Bucket bounds
    pub secondary_max: usize,
    pub tertiary_max: usize,

    /// Scoring weights; must sum to 1.0
    pub energy_weight: f64,
    pub time_weight: f64,
    pub difficulty_weight: f64,
    pub completeness_weight: f64,
    pub readiness_weight: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            easy_cap: 2,
            medium_cap: 4,
            hard_cap: 2,
            secondary_max: 3,
            tertiary_max: 2,
            energy_weight: 0.30,
            time_weight: 0.25,
            difficulty_weight: 0.20,
            completeness_weight: 0.15,
            readiness_weight: 0.10,
        }
    }
}

/// The bounded next-work presentation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub primary: Option<Task>,
    pub secondary: Vec<Task>,
    pub tertiary: Vec<Task>,
}

impl Pipeline {
    pub fn is_empty(&self) -> bool {
        self.primary.is_none()
    }
}

/// Difficulty tier used for variety bucketing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Easy,
    Medium,
    Hard,
}

fn tier(difficulty: u8) -> Tier {
    match difficulty {
        0..=2 => Tier::Easy,
        3..=4 => Tier::Medium,
        _ => Tier::Hard,
    }
}

/// Verbs that push a task's energy demand up
const ACTIVE_VERBS: &[&str] = &[
    "build", "write", "run", "practice", "sprint", "create", "record", "perform", "drill",
];

/// Verbs that pull it down
const CALM_VERBS: &[&str] = &["review", "read", "watch", "listen", "reflect", "plan", "organize"];

/// Energy a task demands, 1-5
///
/// Base is ceil(difficulty / 2), nudged by the leading action verb.
pub fn task_energy(task: &Task) -> u8 {
    let base = (task.difficulty + 1) / 2;

    let first_word = task
        .title
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();

    let adjusted = if ACTIVE_VERBS.contains(&first_word.as_str()) {
        base as i8 + 1
    } else if CALM_VERBS.contains(&first_word.as_str()) {
        base as i8 - 1
    } else {
        base as i8
    };

    adjusted.clamp(1, 5) as u8
}

/// Selects the next-work pipeline from the frontier pool
pub struct TaskPipelineSelector {
    config: PipelineConfig,
}

impl TaskPipelineSelector {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Score one task against the resource budget
    pub fn score(&self, task: &Task, resources: &ResourceContext, completed: &BTreeSet<u32>) -> f64 {
        let energy = task_energy(task);
        let energy_match = 1.0 - (energy as f64 - resources.energy_level as f64).abs() / 5.0;

        let time_match = if task.duration_minutes == 0 {
            1.0
        } else {
            (resources.time_available_minutes as f64 / task.duration_minutes as f64).min(1.0)
        };

        let difficulty_fit = if task.difficulty <= 4 { 1.0 } else { 0.7 };

        let completeness = if task.action.is_some() && task.validation.is_some() {
            1.0
        } else {
            0.7
        };

        let readiness = if task.is_ready(completed) { 1.0 } else { 0.8 };

        self.config.energy_weight * energy_match
            + self.config.time_weight * time_match
            + self.config.difficulty_weight * difficulty_fit
            + self.config.completeness_weight * completeness
            + self.config.readiness_weight * readiness
    }

    /// Build the pipeline from the frontier pool
    pub fn select(&self, tasks: &[Task], resources: &ResourceContext) -> Pipeline {
        let completed: BTreeSet<u32> = tasks.iter().filter(|t| t.completed).map(|t| t.id).collect();

        let mut scored: Vec<(f64, &Task)> = tasks
            .iter()
            .filter(|t| !t.completed)
            .map(|t| (self.score(t, resources, &completed), t))
            .collect();

        if scored.is_empty() {
            debug!("select: empty pool, returning empty pipeline");
            return Pipeline::default();
        }

        // Exact score ties prefer the lower difficulty tier, then the
        // lower id, so ordering is total and deterministic
        scored.sort_by(|(score_a, task_a), (score_b, task_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(task_a.difficulty.cmp(&task_b.difficulty))
                .then(task_a.id.cmp(&task_b.id))
        });
        scored.truncate(self.config.pool_size);

        // Re-bucket by tier for variety
        let mut selected: Vec<&Task> = Vec::new();
        let (mut easy, mut medium, mut hard) = (0usize, 0usize, 0usize);
        for (_, task) in &scored {
            if selected.len() >= self.config.pool_size {
                break;
            }
            let fits = match tier(task.difficulty) {
                Tier::Easy if easy < self.config.easy_cap => {
                    easy += 1;
                    true
                }
                Tier::Medium if medium < self.config.medium_cap => {
                    medium += 1;
                    true
                }
                Tier::Hard if hard < self.config.hard_cap => {
                    hard += 1;
                    true
                }
                _ => false,
            };
            if fits {
                selected.push(task);
            }
        }

        let primary = selected.first().map(|t| (*t).clone());
        let secondary: Vec<Task> = selected
            .iter()
            .skip(1)
            .take(self.config.secondary_max)
            .map(|t| (*t).clone())
            .collect();

        // Tertiary: from the remainder, prefer a lower-energy alternative,
        // then a different branch than primary
        let tertiary = match &primary {
            Some(primary_task) => {
                let primary_energy = task_energy(primary_task);
                let mut remainder: Vec<&Task> = selected
                    .iter()
                    .skip(1 + self.config.secondary_max)
                    .copied()
                    .collect();
                remainder.sort_by_key(|t| {
                    let lower_energy = task_energy(t) < primary_energy;
                    let different_branch = t.branch != primary_task.branch;
                    // false sorts after true
                    (!lower_energy, !different_branch, t.id)
                });
                remainder
                    .into_iter()
                    .take(self.config.tertiary_max)
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };

        debug!(
            secondary = secondary.len(),
            tertiary = tertiary.len(),
            "select: pipeline built"
        );
        Pipeline {
            primary,
            secondary,
            tertiary,
        }
    }
}

impl Default for TaskPipelineSelector {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
