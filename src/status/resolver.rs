//! Suffix resolution of short task references.

use crate::task::Task;

/// Number of trailing id characters compared verbatim.
const TAIL_LEN: usize = 6;

/// Outcome of resolving a suffix against a task list.
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    /// First matching task in iteration order.
    pub task: &'a Task,
    /// How many tasks matched in total.
    pub matches: usize,
}

impl Resolution<'_> {
    pub fn is_ambiguous(&self) -> bool {
        self.matches > 1
    }
}

/// Whether `id` is referred to by `suffix`.
///
/// Matches when the lowercased id ends with the suffix, or when the last six
/// characters of the id equal the suffix exactly.
pub fn matches_suffix(id: &str, suffix: &str) -> bool {
    if suffix.is_empty() {
        return false;
    }
    if id.to_lowercase().ends_with(&suffix.to_lowercase()) {
        return true;
    }
    let chars: Vec<char> = id.chars().collect();
    let start = chars.len().saturating_sub(TAIL_LEN);
    chars[start..].iter().collect::<String>() == suffix
}

/// Resolve a suffix to the first matching task, counting every match.
pub fn resolve_task<'a>(tasks: &'a [Task], suffix: &str) -> Option<Resolution<'a>> {
    let mut found = tasks.iter().filter(|t| matches_suffix(&t.id, suffix));
    let task = found.next()?;
    Some(Resolution {
        task,
        matches: 1 + found.count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;

    fn tasks(ids: &[&str]) -> Vec<Task> {
        ids.iter()
            .map(|id| Task::new(*id, format!("Task {}", id), TaskStatus::Inbox))
            .collect()
    }

    #[test]
    fn resolves_by_suffix() {
        let list = tasks(&["task-a1b2c3", "task-zzz"]);
        let r = resolve_task(&list, "a1b2c3").unwrap();
        assert_eq!(r.task.id, "task-a1b2c3");
        assert!(!r.is_ambiguous());
    }

    #[test]
    fn case_insensitive() {
        let list = tasks(&["TASK-A1B2C3"]);
        assert!(resolve_task(&list, "a1b2c3").is_some());
    }

    #[test]
    fn first_match_wins_when_ambiguous() {
        let list = tasks(&["abc123", "xyz123"]);
        let r = resolve_task(&list, "123").unwrap();
        assert_eq!(r.task.id, "abc123");
        assert_eq!(r.matches, 2);
        assert!(r.is_ambiguous());
    }

    #[test]
    fn no_match() {
        let list = tasks(&["task-a1b2c3"]);
        assert!(resolve_task(&list, "xyz999").is_none());
        assert!(resolve_task(&list, "").is_none());
        assert!(resolve_task(&[], "a1").is_none());
    }

    #[test]
    fn short_ids_use_whole_id_as_tail() {
        assert!(matches_suffix("ab1", "ab1"));
        assert!(!matches_suffix("ab1", "zab1"));
    }
}
