//! Goal analyzer - derives characteristics without calling the LLM
//!
//! Pure function over the goal text and caller context. Always returns a
//! value: an empty or degenerate goal yields the lowest complexity class
//! with a confidence penalty rather than an error.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::domain::{ComplexityClass, GoalCharacteristics, MAX_DEPTH};

/// Depth used when the caller marks the goal simple and urgent
const REDUCED_DEPTH: u8 = 4;

/// Trait keyword sets; a goal can carry several traits at once
const TRAIT_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "technical",
        &[
            "code", "program", "software", "build", "engineer", "develop", "system", "app", "data", "api",
        ],
    ),
    (
        "creative",
        &["write", "paint", "draw", "compose", "design", "novel", "music", "photography"],
    ),
    (
        "linguistic",
        &[
            "language",
            "spanish",
            "french",
            "german",
            "japanese",
            "speak",
            "conversational",
            "vocabulary",
            "fluent",
        ],
    ),
    (
        "physical",
        &["run", "marathon", "fitness", "yoga", "swim", "strength", "climb", "cycling"],
    ),
    (
        "academic",
        &["study", "exam", "degree", "course", "research", "math", "physics", "history", "thesis"],
    ),
];

/// Markers of ambitious scope
const DEPTH_MARKERS: &[&str] = &["master", "fluent", "professional", "advanced", "expert", "complete"];

/// Markers of deliberately narrow scope
const SHALLOW_MARKERS: &[&str] = &["basic", "basics", "simple", "intro", "introduction", "beginner", "quick"];

/// Analyze a goal, deriving its characteristics
pub fn analyze(goal: &str, context: &Value) -> GoalCharacteristics {
    let trimmed = goal.trim();
    if trimmed.is_empty() {
        return GoalCharacteristics {
            complexity: ComplexityClass::Low,
            score: 0.0,
            traits: BTreeSet::new(),
            requires_deep_decomposition: false,
            benefits_from_granularity: false,
            recommended_depth: REDUCED_DEPTH,
            confidence: 0.1,
        };
    }

    let lowered = trimmed.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    let mut traits = BTreeSet::new();
    for (name, keywords) in TRAIT_KEYWORDS {
        if keywords.iter().any(|k| lowered.contains(k)) {
            traits.insert(name.to_string());
        }
    }

    let mut score: f64 = 0.3;

    // Longer goal statements tend to carry more scope
    score += (words.len().min(20) as f64) * 0.015;

    // Breadth: multiple trait areas, conjunctions, list separators
    score += traits.len().saturating_sub(1) as f64 * 0.1;
    score += lowered.matches(" and ").count() as f64 * 0.05;
    score += lowered.matches(',').count() as f64 * 0.03;

    if DEPTH_MARKERS.iter().any(|m| lowered.contains(m)) {
        score += 0.2;
    }
    if SHALLOW_MARKERS.iter().any(|m| lowered.contains(m)) {
        score -= 0.2;
    }

    let score = score.clamp(0.0, 1.0);

    let complexity = if score < 0.35 {
        ComplexityClass::Low
    } else if score < 0.65 {
        ComplexityClass::Medium
    } else {
        ComplexityClass::High
    };

    let marked_simple = context.get("simple").and_then(Value::as_bool).unwrap_or(false);
    let urgent = context
        .get("urgency")
        .and_then(Value::as_str)
        .map(|u| u.eq_ignore_ascii_case("high"))
        .unwrap_or(false);

    // Full depth by default; reduced only on an explicit simple+urgent
    // signal. Complexity can never push past the fixed maximum.
    let recommended_depth = if marked_simple && urgent {
        REDUCED_DEPTH
    } else {
        MAX_DEPTH
    };

    let beginner = context
        .get("experience")
        .and_then(Value::as_str)
        .map(|e| e.eq_ignore_ascii_case("beginner"))
        .unwrap_or(false);

    // Very short goals are ambiguous
    let confidence = if words.len() < 3 { 0.5 } else { 0.9 };

    GoalCharacteristics {
        complexity,
        score,
        traits,
        requires_deep_decomposition: complexity == ComplexityClass::High,
        benefits_from_granularity: beginner || complexity != ComplexityClass::Low,
        recommended_depth,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_goal_is_low_not_error() {
        let characteristics = analyze("", &json!({}));
        assert_eq!(characteristics.complexity, ComplexityClass::Low);
        assert!(characteristics.confidence < 0.2);

        let characteristics = analyze("   ", &json!({}));
        assert_eq!(characteristics.complexity, ComplexityClass::Low);
    }

    #[test]
    fn test_simple_goal() {
        let characteristics = analyze("Learn basic greetings", &json!({}));
        assert_eq!(characteristics.complexity, ComplexityClass::Low);
        assert!(!characteristics.requires_deep_decomposition);
    }

    #[test]
    fn test_ambitious_goal_is_high_complexity() {
        let characteristics = analyze(
            "Master conversational Spanish and write a novel, while building a vocabulary app",
            &json!({}),
        );
        assert_eq!(characteristics.complexity, ComplexityClass::High);
        assert!(characteristics.requires_deep_decomposition);
        assert!(characteristics.traits.contains("linguistic"));
        assert!(characteristics.traits.contains("creative"));
        assert!(characteristics.traits.contains("technical"));
    }

    #[test]
    fn test_default_depth_is_full() {
        let characteristics = analyze("Learn conversational Spanish", &json!({}));
        assert_eq!(characteristics.recommended_depth, 6);
    }

    #[test]
    fn test_simple_and_urgent_reduces_depth() {
        let characteristics = analyze(
            "Learn basic greetings",
            &json!({"simple": true, "urgency": "high"}),
        );
        assert_eq!(characteristics.recommended_depth, 4);

        // Either signal alone is not enough
        let characteristics = analyze("Learn basic greetings", &json!({"simple": true}));
        assert_eq!(characteristics.recommended_depth, 6);

        let characteristics = analyze("Learn basic greetings", &json!({"urgency": "high"}));
        assert_eq!(characteristics.recommended_depth, 6);
    }

    #[test]
    fn test_depth_capped_at_max() {
        let characteristics = analyze(
            "Master advanced professional expert-level complete software engineering and research",
            &json!({}),
        );
        assert!(characteristics.recommended_depth <= MAX_DEPTH);
    }

    #[test]
    fn test_deterministic() {
        let a = analyze("Learn conversational Spanish", &json!({"urgency": "low"}));
        let b = analyze("Learn conversational Spanish", &json!({"urgency": "low"}));
        assert_eq!(a.score, b.score);
        assert_eq!(a.complexity, b.complexity);
        assert_eq!(a.traits, b.traits);
    }

    #[test]
    fn test_beginner_benefits_from_granularity() {
        let characteristics = analyze("Learn basic greetings", &json!({"experience": "beginner"}));
        assert!(characteristics.benefits_from_granularity);
    }
}
