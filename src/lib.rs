//! Mission Control library root.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod kanban;
pub mod listener;
pub mod logging;
pub mod mailbox;
pub mod notifier;
pub mod status;
pub mod task;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{HttpTaskApi, TaskApi};
pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use error::{Error, Result};
pub use kanban::{commit_move, Board, DropOutcome, DropTarget};
pub use listener::{ListenerHandle, MessageListener};
pub use mailbox::{InboundMessage, Mailbox};
pub use notifier::Notifier;
pub use status::{parse_task_status_update, Reconciler, StatusChange};
pub use task::{Bucket, Task, TaskStatus};
pub use web::{run_server, WebServerConfig};
