//! Task API client.
//!
//! The dashboard's REST API is consumed through the [`TaskApi`] trait so the
//! reconciler and the board can be driven by the HTTP client in production
//! and by in-memory fakes in tests.

use std::sync::Arc;

use async_trait::async_trait;

pub mod http;

pub use http::HttpTaskApi;

use crate::config::Settings;
use crate::error::Result;
use crate::task::{Activity, Agent, NewTaskMessage, Task, TaskMessage, TaskPatch};

/// Operations this crate needs from the task API.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// `GET /tasks`
    async fn list_tasks(&self) -> Result<Vec<Task>>;

    /// `GET /tasks/{id}`
    async fn get_task(&self, id: &str) -> Result<Task>;

    /// `PATCH /tasks/{id}`
    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task>;

    /// `POST /tasks/{id}/messages`
    async fn create_task_message(
        &self,
        task_id: &str,
        message: &NewTaskMessage,
    ) -> Result<TaskMessage>;

    /// `GET /activities`
    async fn list_activities(&self) -> Result<Vec<Activity>>;

    /// `GET /agents`
    async fn list_agents(&self) -> Result<Vec<Agent>>;
}

/// Build the HTTP client from settings.
pub fn create_api(settings: &Settings) -> Result<Arc<dyn TaskApi>> {
    Ok(Arc::new(HttpTaskApi::new(&settings.api)?))
}
