//! Core data models for work items, risks, and assignment suggestions.
//!
//! These are the shapes the rest of the application works with after the
//! remote service's field-bag responses have been decoded (see `client`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An unassigned work item fetched from the remote task service.
///
/// Built from the service's `workItems` response by flattening the
/// `System.*` field bag. Immutable once fetched; the only local mutation is
/// removal from the list after a successful assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub url: String,
    pub work_item_type: String,
    pub state: String,
    pub title: String,
}

/// A single AI-generated assignment suggestion awaiting human review.
///
/// Only the first candidate returned by the service is kept. A suggestion
/// without an email cannot be confirmed or bulk-assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionEntry {
    pub task_id: String,
    pub email: Option<String>,
    pub reason: Option<String>,
}

impl SuggestionEntry {
    /// Whether this entry carries enough information to be assigned.
    pub fn assignable(&self) -> bool {
        self.email.as_deref().map_or(false, |e| !e.is_empty())
    }
}

/// A `(task, assignee)` pair as sent to the bulk-assign endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPair {
    pub task_id: String,
    pub email: String,
}

/// A risk item surfaced by the service's risk filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Risk {
    pub id: u64,
    pub title: String,
    pub state: String,
    pub assigned_to: String,
    pub project: String,
    pub priority: Option<i64>,
    pub severity: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority_score: f64,
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<NaiveDate>, today: NaiveDate) -> String {
    match due {
        None => "-".into(),
        Some(d) => {
            let delta = d - today;
            if delta.num_days() == 0 {
                "today".into()
            } else if delta.num_days() == 1 {
                "tomorrow".into()
            } else if delta.num_days() > 1 {
                format!("in {}d", delta.num_days())
            } else {
                format!("{}d late", -delta.num_days())
            }
        }
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignable_requires_nonempty_email() {
        let entry = SuggestionEntry {
            task_id: "1".into(),
            email: Some("a@x.com".into()),
            reason: None,
        };
        assert!(entry.assignable());

        let missing = SuggestionEntry { email: None, ..entry.clone() };
        assert!(!missing.assignable());

        let empty = SuggestionEntry { email: Some(String::new()), ..entry };
        assert!(!empty.assignable());
    }

    #[test]
    fn assignment_pair_serialises_camel_case() {
        let pair = AssignmentPair {
            task_id: "42".into(),
            email: "a@x.com".into(),
        };
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["taskId"], "42");
        assert_eq!(json["email"], "a@x.com");
    }

    #[test]
    fn due_relative_formatting() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert_eq!(format_due_relative(None, today), "-");
        assert_eq!(format_due_relative(Some(today), today), "today");
        assert_eq!(format_due_relative(today.succ_opt(), today), "tomorrow");
        assert_eq!(
            format_due_relative(NaiveDate::from_ymd_opt(2025, 6, 7), today),
            "in 5d"
        );
        assert_eq!(
            format_due_relative(NaiveDate::from_ymd_opt(2025, 5, 31), today),
            "2d late"
        );
    }
}
