//! Task model, statuses, and the status/column mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Persisted task status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Inbox,
    Assigned,
    Waiting,
    InProgress,
    Review,
    Done,
    Archived,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 7] = [
        TaskStatus::Inbox,
        TaskStatus::Assigned,
        TaskStatus::Waiting,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Done,
        TaskStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Inbox => "inbox",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Waiting => "waiting",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
            TaskStatus::Archived => "archived",
        }
    }

    /// Human-readable label, e.g. "In Progress".
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Inbox => "Inbox",
            TaskStatus::Assigned => "Assigned",
            TaskStatus::Waiting => "Waiting",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Review => "Review",
            TaskStatus::Done => "Done",
            TaskStatus::Archived => "Archived",
        }
    }

    /// Canonicalize a free-form status keyword, synonyms included.
    pub fn from_keyword(word: &str) -> Option<Self> {
        let status = match word.trim().to_lowercase().as_str() {
            "inbox" => TaskStatus::Inbox,
            "assigned" => TaskStatus::Assigned,
            "waiting" | "todo" => TaskStatus::Waiting,
            "in_progress" | "in-progress" | "active" | "working" | "started" => {
                TaskStatus::InProgress
            }
            "review" | "reviewing" | "in_review" => TaskStatus::Review,
            "done" | "complete" | "completed" | "finished" => TaskStatus::Done,
            "archived" => TaskStatus::Archived,
            _ => return None,
        };
        Some(status)
    }

    /// Board column this status is displayed in. Archived tasks have none.
    pub fn bucket(&self) -> Option<Bucket> {
        match self {
            TaskStatus::Inbox => Some(Bucket::Inbox),
            TaskStatus::Assigned | TaskStatus::Waiting => Some(Bucket::Todo),
            TaskStatus::InProgress | TaskStatus::Review => Some(Bucket::InProgress),
            TaskStatus::Done => Some(Bucket::Done),
            TaskStatus::Archived => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::from_keyword(s).ok_or_else(|| format!("Unknown task status: {}", s))
    }
}

/// Kanban display column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Inbox,
    Todo,
    InProgress,
    Done,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [Bucket::Inbox, Bucket::Todo, Bucket::InProgress, Bucket::Done];

    /// Status written to the server when a card is dropped in this column.
    pub fn persisted_status(&self) -> TaskStatus {
        match self {
            Bucket::Inbox => TaskStatus::Inbox,
            Bucket::Todo => TaskStatus::Waiting,
            Bucket::InProgress => TaskStatus::InProgress,
            Bucket::Done => TaskStatus::Done,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Bucket::Inbox => "Inbox",
            Bucket::Todo => "To Do",
            Bucket::InProgress => "In Progress",
            Bucket::Done => "Done",
        }
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inbox" => Ok(Bucket::Inbox),
            "todo" | "to_do" | "to-do" => Ok(Bucket::Todo),
            "in_progress" | "in-progress" => Ok(Bucket::InProgress),
            "done" => Ok(Bucket::Done),
            _ => Err(format!("Unknown column: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// A unit of tracked work, as served by the task API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignee_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: TaskStatus) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status,
            priority: Priority::default(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            assignee_ids: Vec::new(),
            tags: Vec::new(),
            category: None,
        }
    }

    /// Apply a patch locally, mirroring what the server does with it.
    pub fn apply(&mut self, patch: &TaskPatch, now: DateTime<Utc>) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if patch.started_at.is_some() && self.started_at.is_none() {
            self.started_at = patch.started_at;
        }
        if patch.completed_at.is_some() {
            self.completed_at = patch.completed_at;
        }
        self.updated_at = now;
    }
}

/// Partial task update (`PATCH /tasks/{id}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Status change with its one-way timestamp ratchets.
    ///
    /// `completedAt` is set when moving to done; `startedAt` only when moving
    /// to in_progress for a task that was never started.
    pub fn transition(task: &Task, status: TaskStatus, now: DateTime<Utc>) -> Self {
        let mut patch = Self::status(status);
        if status == TaskStatus::Done {
            patch.completed_at = Some(now);
        }
        if status == TaskStatus::InProgress && task.started_at.is_none() {
            patch.started_at = Some(now);
        }
        patch
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageAuthor {
    #[default]
    System,
    Agent,
    User,
}

/// New entry for a task's message transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTaskMessage {
    pub author: MessageAuthor,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl NewTaskMessage {
    pub fn system(content: impl Into<String>, agent_id: Option<String>) -> Self {
        Self {
            author: MessageAuthor::System,
            content: content.into(),
            agent_id,
        }
    }
}

/// Stored transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub task_id: String,
    #[serde(default)]
    pub author: MessageAuthor,
    pub content: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Activity feed entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}
