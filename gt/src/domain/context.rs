//! Accumulated completion context
//!
//! Per-tree aggregate built additively from completion records: outcome
//! frequencies, struggle/interest topics with dedup counters, preferred
//! difficulty and duration. Never reset during normal operation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use docstore::{Record, now_ms};

use super::task::CompletionRecord;

/// A recurring struggle topic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StruggleArea {
    pub topic: String,
    pub frequency: u32,
    pub resolved: bool,
}

/// An emerging interest topic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interest {
    pub topic: String,
    pub first_seen: i64,
    pub frequency: u32,
}

/// Mutable per-tree aggregate of completion feedback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatedContext {
    /// Project key this context belongs to
    pub id: String,

    /// Learning outcome -> occurrence count
    #[serde(default)]
    pub learning_outcomes: BTreeMap<String, u32>,

    /// Struggle topics, deduplicated by topic
    #[serde(default)]
    pub struggling_areas: Vec<StruggleArea>,

    /// Interest topics, deduplicated by topic
    #[serde(default)]
    pub emerging_interests: Vec<Interest>,

    /// Running mean of self-rated difficulty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_difficulty: Option<f64>,

    /// Running mean of actual duration in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_duration_minutes: Option<f64>,

    /// Total records absorbed
    #[serde(default)]
    pub total_completions: u32,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl AccumulatedContext {
    /// Create an empty context for a project
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            id: project.into(),
            learning_outcomes: BTreeMap::new(),
            struggling_areas: Vec::new(),
            emerging_interests: Vec::new(),
            preferred_difficulty: None,
            preferred_duration_minutes: None,
            total_completions: 0,
            updated_at: now_ms(),
        }
    }

    /// Absorb one completion record, additively
    pub fn absorb(&mut self, record: &CompletionRecord, now: i64) {
        for outcome in &record.learning_outcomes {
            let topic = normalize_topic(outcome);
            if topic.is_empty() {
                continue;
            }
            *self.learning_outcomes.entry(topic).or_insert(0) += 1;
        }

        for area in &record.struggling_areas {
            let topic = normalize_topic(area);
            if topic.is_empty() {
                continue;
            }
            match self.struggling_areas.iter_mut().find(|s| s.topic == topic) {
                Some(existing) => {
                    existing.frequency += 1;
                    existing.resolved = false;
                }
                None => self.struggling_areas.push(StruggleArea {
                    topic,
                    frequency: 1,
                    resolved: false,
                }),
            }
        }

        for interest in &record.next_interests {
            let topic = normalize_topic(interest);
            if topic.is_empty() {
                continue;
            }
            match self.emerging_interests.iter_mut().find(|i| i.topic == topic) {
                Some(existing) => existing.frequency += 1,
                None => self.emerging_interests.push(Interest {
                    topic,
                    first_seen: now,
                    frequency: 1,
                }),
            }
        }

        let n = self.total_completions as f64;
        self.preferred_difficulty = Some(running_mean(
            self.preferred_difficulty,
            n,
            record.difficulty_rating as f64,
        ));
        self.preferred_duration_minutes = Some(running_mean(
            self.preferred_duration_minutes,
            n,
            record.duration_minutes as f64,
        ));

        self.total_completions += 1;
        self.updated_at = now;
    }

    /// Mark a struggle topic resolved, if present
    pub fn resolve_struggle(&mut self, topic: &str) -> bool {
        let topic = normalize_topic(topic);
        if let Some(area) = self.struggling_areas.iter_mut().find(|s| s.topic == topic) {
            area.resolved = true;
            true
        } else {
            false
        }
    }

    /// Struggle topics that have not been resolved
    pub fn unresolved_struggles(&self) -> impl Iterator<Item = &StruggleArea> {
        self.struggling_areas.iter().filter(|s| !s.resolved)
    }
}

impl Record for AccumulatedContext {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn file_key() -> &'static str {
        "context.json"
    }
}

/// One recorded completion, as persisted in the history document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEntry {
    pub task_id: u32,
    pub record: CompletionRecord,
}

/// Append-only per-project completion history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionLog {
    /// Project key this log belongs to
    pub id: String,

    #[serde(default)]
    pub entries: Vec<CompletionEntry>,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl CompletionLog {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            id: project.into(),
            entries: Vec::new(),
            updated_at: now_ms(),
        }
    }

    pub fn append(&mut self, task_id: u32, record: CompletionRecord, now: i64) {
        self.entries.push(CompletionEntry { task_id, record });
        self.updated_at = now;
    }

    /// The most recent `n` entries, oldest first
    pub fn recent(&self, n: usize) -> &[CompletionEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }
}

impl Record for CompletionLog {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn file_key() -> &'static str {
        "completions.json"
    }
}

fn normalize_topic(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn running_mean(current: Option<f64>, n: f64, sample: f64) -> f64 {
    match current {
        Some(mean) => (mean * n + sample) / (n + 1.0),
        None => sample,
    }
}
