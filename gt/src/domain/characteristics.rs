//! Derived goal characteristics
//!
//! Value object produced by the goal analyzer. Recomputed whenever the goal
//! text changes; persisted only as part of the tree document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Complexity class of a goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityClass {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for ComplexityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for ComplexityClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown complexity class: {}", s)),
        }
    }
}

/// Characteristics derived from goal text and caller context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalCharacteristics {
    /// Overall complexity class
    pub complexity: ComplexityClass,

    /// Raw complexity score the class was derived from
    pub score: f64,

    /// Detected goal traits (e.g. "technical", "creative", "linguistic")
    pub traits: BTreeSet<String>,

    /// Whether the goal warrants decomposition to the deepest levels
    pub requires_deep_decomposition: bool,

    /// Whether the goal benefits from fine-grained atomic actions
    pub benefits_from_granularity: bool,

    /// Recommended decomposition depth (4-6)
    pub recommended_depth: u8,

    /// Confidence in the analysis (0-1); penalized for empty/short goals
    pub confidence: f64,
}

impl Default for GoalCharacteristics {
    fn default() -> Self {
        Self {
            complexity: ComplexityClass::Medium,
            score: 0.5,
            traits: BTreeSet::new(),
            requires_deep_decomposition: false,
            benefits_from_granularity: true,
            recommended_depth: 6,
            confidence: 0.5,
        }
    }
}
