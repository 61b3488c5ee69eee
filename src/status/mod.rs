//! Task status updates inferred from agent chat messages.
//!
//! - `parser`: text to status candidate
//! - `resolver`: candidate task-id suffix to a live task
//! - `reconciler`: idempotent apply with audit trail and notification

pub mod parser;
pub mod reconciler;
pub mod resolver;

pub use parser::{parse_task_status_update, Confidence, StatusUpdateCandidate};
pub use reconciler::{Reconciler, StatusCallback, StatusChange};
pub use resolver::{resolve_task, Resolution};
