//! Extracts task status directives from free-form agent messages.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::task::TaskStatus;

/// How sure the parser is that a message is a status directive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A parsed, not yet applied status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdateCandidate {
    /// Lowercased trailing fragment of the task id.
    pub task_id_suffix: String,
    pub new_status: TaskStatus,
    pub confidence: Confidence,
}

struct Patterns {
    explicit_status: Regex,
    explicit_keyword: Regex,
    natural: Vec<(Regex, TaskStatus)>,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS.get_or_init(build_patterns).as_ref()
}

fn build_patterns() -> Option<Patterns> {
    Some(Patterns {
        explicit_status: Regex::new(r"(?i)\[TASK\s+#([a-z0-9]+)\s+STATUS:\s*([a-z_-]+)\s*\]").ok()?,
        explicit_keyword: Regex::new(
            r"(?i)\[TASK\s+#([a-z0-9]+)\s+(DONE|COMPLETE|COMPLETED|FINISHED|ACTIVE|STARTED|REVIEW|ARCHIVED)\s*\]",
        )
        .ok()?,
        natural: vec![
            (
                Regex::new(r"(?i)\b(?:completed|finished|done\s+with)\s+task\s+#([a-z0-9]+)").ok()?,
                TaskStatus::Done,
            ),
            (
                Regex::new(r"(?i)\b(?:started|working\s+on|began)\s+task\s+#([a-z0-9]+)").ok()?,
                TaskStatus::InProgress,
            ),
            (
                Regex::new(r"(?i)\b(?:reviewing|in\s+review)\s+task\s+#([a-z0-9]+)").ok()?,
                TaskStatus::Review,
            ),
            (
                Regex::new(r"(?i)\barchived\s+task\s+#([a-z0-9]+)").ok()?,
                TaskStatus::Archived,
            ),
        ],
    })
}

/// Map the closed keyword set of the bracketed short form.
fn keyword_status(keyword: &str) -> Option<TaskStatus> {
    match keyword.to_uppercase().as_str() {
        "DONE" | "COMPLETE" | "COMPLETED" | "FINISHED" => Some(TaskStatus::Done),
        "ACTIVE" | "STARTED" => Some(TaskStatus::InProgress),
        "REVIEW" => Some(TaskStatus::Review),
        "ARCHIVED" => Some(TaskStatus::Archived),
        _ => None,
    }
}

/// Parse one message into a status candidate.
///
/// Rules are tried in order and the first match wins: the bracketed
/// `STATUS:<word>` form, the bracketed keyword form, then natural-language
/// phrases. Returns `None` when nothing matches.
pub fn parse_task_status_update(message: &str) -> Option<StatusUpdateCandidate> {
    let text = message.trim();
    if text.is_empty() {
        return None;
    }
    let p = patterns()?;

    if let Some(cap) = p.explicit_status.captures(text) {
        if let Some(status) = TaskStatus::from_keyword(&cap[2]) {
            return Some(candidate(&cap[1], status, Confidence::High));
        }
    }

    if let Some(cap) = p.explicit_keyword.captures(text) {
        if let Some(status) = keyword_status(&cap[2]) {
            return Some(candidate(&cap[1], status, Confidence::High));
        }
    }

    p.natural.iter().find_map(|(re, status)| {
        re.captures(text)
            .map(|cap| candidate(&cap[1], *status, Confidence::Medium))
    })
}

fn candidate(suffix: &str, new_status: TaskStatus, confidence: Confidence) -> StatusUpdateCandidate {
    StatusUpdateCandidate {
        task_id_suffix: suffix.to_lowercase(),
        new_status,
        confidence,
    }
}
