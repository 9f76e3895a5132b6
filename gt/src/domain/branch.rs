//! Strategic branch domain type
//!
//! Branches are the level-2 groupings of a tree. They are created once from
//! the canonical level-2 document and carry a unique rank-order priority that
//! drives traversal and selection order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A top-level strategic grouping of tasks under a goal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    /// Non-empty display name (sanitizer guarantees this)
    pub name: String,

    /// What this branch covers
    pub description: String,

    /// Unique rank within the tree (1 = first)
    pub priority: u32,

    /// Domain focus, e.g. "vocabulary" or "listening"
    #[serde(default)]
    pub domain_focus: String,

    /// Outcomes expected when the branch is done
    #[serde(default)]
    pub expected_outcomes: Vec<String>,

    /// Ids of frontier tasks attached to this branch
    #[serde(default)]
    pub tasks: Vec<u32>,
}

/// Sanitize a branch name, assigning a positional fallback when the
/// generated name is missing or whitespace
pub fn sanitize_branch_name(raw: Option<&str>, position: usize) -> String {
    match raw.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("Branch {}", position),
    }
}

/// Build canonical branches from a validated level-2 document
///
/// Branches keep the model's relative ordering (by declared priority where
/// present, document order otherwise) but always end up with unique
/// rank-order priorities 1..n.
pub fn branches_from_level(level: &Value) -> Vec<Branch> {
    let items = level
        .get("branches")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut ordered: Vec<(u64, usize, Value)> = items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let declared = item
                .get("priority")
                .and_then(Value::as_u64)
                .unwrap_or((idx + 1) as u64);
            (declared, idx, item)
        })
        .collect();
    ordered.sort_by_key(|(declared, idx, _)| (*declared, *idx));

    ordered
        .into_iter()
        .enumerate()
        .map(|(rank, (_, idx, item))| Branch {
            name: sanitize_branch_name(item.get("name").and_then(Value::as_str), idx + 1),
            description: item
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            priority: (rank + 1) as u32,
            domain_focus: item
                .get("domainFocus")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            expected_outcomes: item
                .get("expectedOutcomes")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            tasks: Vec::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_branch_name() {
        assert_eq!(sanitize_branch_name(Some("Vocabulary"), 1), "Vocabulary");
        assert_eq!(sanitize_branch_name(Some("  padded  "), 1), "padded");
        assert_eq!(sanitize_branch_name(Some("   "), 2), "Branch 2");
        assert_eq!(sanitize_branch_name(None, 3), "Branch 3");
    }

    #[test]
    fn test_branches_from_level_assigns_unique_priorities() {
        let level = json!({
            "branches": [
                {"name": "A", "description": "a", "priority": 2},
                {"name": "B", "description": "b", "priority": 2},
                {"name": "C", "description": "c", "priority": 1}
            ]
        });

        let branches = branches_from_level(&level);
        assert_eq!(branches.len(), 3);

        // C declared priority 1, so it ranks first; ties keep document order
        assert_eq!(branches[0].name, "C");
        assert_eq!(branches[1].name, "A");
        assert_eq!(branches[2].name, "B");

        let priorities: Vec<u32> = branches.iter().map(|b| b.priority).collect();
        assert_eq!(priorities, vec![1, 2, 3]);
    }

    #[test]
    fn test_branches_from_level_sanitizes_names() {
        let level = json!({
            "branches": [
                {"description": "first"},
                {"name": "", "description": "second"},
                {"name": "Real Name", "description": "third"}
            ]
        });

        let branches = branches_from_level(&level);
        assert_eq!(branches[0].name, "Branch 1");
        assert_eq!(branches[1].name, "Branch 2");
        assert_eq!(branches[2].name, "Real Name");
        assert!(branches.iter().all(|b| !b.name.trim().is_empty()));
    }

    #[test]
    fn test_branches_from_level_missing_collection() {
        let branches = branches_from_level(&json!({}));
        assert!(branches.is_empty());
    }
}
