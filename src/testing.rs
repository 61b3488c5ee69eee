//! In-memory fakes shared by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::api::TaskApi;
use crate::error::{Error, Result};
use crate::notifier::{Notification, Notifier, Permission, ToastKind};
use crate::task::{Activity, Agent, NewTaskMessage, Task, TaskMessage, TaskPatch};

/// Task API backed by a vector, recording every write.
#[derive(Default)]
pub struct FakeApi {
    pub tasks: Mutex<Vec<Task>>,
    pub updates: Mutex<Vec<(String, TaskPatch)>>,
    pub messages: Mutex<Vec<(String, NewTaskMessage)>>,
    pub activities: Mutex<Vec<Activity>>,
    pub fail_updates: Mutex<bool>,
    pub fail_messages: Mutex<bool>,
}

impl FakeApi {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Default::default()
        }
    }

    pub fn fail_updates(&self, fail: bool) {
        *self.fail_updates.lock().unwrap() = fail;
    }

    pub fn fail_messages(&self, fail: bool) {
        *self.fail_messages.lock().unwrap() = fail;
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskApi for FakeApi {
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.snapshot())
    }

    async fn get_task(&self, id: &str) -> Result<Task> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task> {
        if *self.fail_updates.lock().unwrap() {
            return Err(Error::Timeout);
        }
        self.updates
            .lock()
            .unwrap()
            .push((id.to_string(), patch.clone()));
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        task.apply(patch, Utc::now());
        self.activities.lock().unwrap().push(Activity {
            id: format!("act-{}", self.update_count()),
            kind: "task_updated".to_string(),
            message: format!("{} moved to {}", task.title, task.status),
            agent_id: None,
            task_id: Some(id.to_string()),
            created_at: Utc::now(),
        });
        Ok(task.clone())
    }

    async fn create_task_message(
        &self,
        task_id: &str,
        message: &NewTaskMessage,
    ) -> Result<TaskMessage> {
        if *self.fail_messages.lock().unwrap() {
            return Err(Error::Api {
                status: 500,
                message: "audit write failed".to_string(),
            });
        }
        self.messages
            .lock()
            .unwrap()
            .push((task_id.to_string(), message.clone()));
        Ok(TaskMessage {
            id: None,
            task_id: task_id.to_string(),
            author: message.author,
            content: message.content.clone(),
            agent_id: message.agent_id.clone(),
            created_at: Utc::now(),
        })
    }

    async fn list_activities(&self) -> Result<Vec<Activity>> {
        Ok(self.activities.lock().unwrap().clone())
    }

    async fn list_agents(&self) -> Result<Vec<Agent>> {
        Ok(Vec::new())
    }
}

/// Notifier that records what it was asked to show.
pub struct RecordingNotifier {
    pub permission: Permission,
    pub notifications: Mutex<Vec<Notification>>,
    pub toasts: Mutex<Vec<(ToastKind, String)>>,
}

impl RecordingNotifier {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission,
            notifications: Mutex::new(Vec::new()),
            toasts: Mutex::new(Vec::new()),
        }
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    pub fn last_toast(&self) -> Option<(ToastKind, String)> {
        self.toasts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn permission(&self) -> Permission {
        self.permission
    }

    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn toast(&self, kind: ToastKind, message: &str) -> Result<()> {
        self.toasts.lock().unwrap().push((kind, message.to_string()));
        Ok(())
    }
}
