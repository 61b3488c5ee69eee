//! Applies parsed status directives to the live task list.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use super::parser::{parse_task_status_update, Confidence, StatusUpdateCandidate};
use super::resolver::resolve_task;
use crate::api::TaskApi;
use crate::error::Result;
use crate::notifier::{Notification, Notifier, Permission};
use crate::task::{NewTaskMessage, Task, TaskPatch, TaskStatus};

/// Called with (task after update, old status, new status).
pub type StatusCallback = Arc<dyn Fn(&Task, TaskStatus, TaskStatus) + Send + Sync>;

/// A committed status change.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub task: Task,
    pub old_status: TaskStatus,
    pub new_status: TaskStatus,
    pub confidence: Confidence,
}

pub struct Reconciler {
    api: Arc<dyn TaskApi>,
    notifier: Arc<dyn Notifier>,
    tasks: Arc<RwLock<Vec<Task>>>,
    notifications_enabled: bool,
    on_status_change: Option<StatusCallback>,
}

impl Reconciler {
    pub fn new(api: Arc<dyn TaskApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            notifier,
            tasks: Arc::new(RwLock::new(Vec::new())),
            notifications_enabled: true,
            on_status_change: None,
        }
    }

    /// Share an existing live task list.
    pub fn with_tasks(mut self, tasks: Arc<RwLock<Vec<Task>>>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    pub fn on_status_change(
        mut self,
        callback: impl Fn(&Task, TaskStatus, TaskStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_status_change = Some(Arc::new(callback));
        self
    }

    pub fn tasks(&self) -> Arc<RwLock<Vec<Task>>> {
        Arc::clone(&self.tasks)
    }

    /// Replace the live task list with the server's.
    pub async fn refresh_tasks(&self) -> Result<usize> {
        let fresh = self.api.list_tasks().await?;
        let count = fresh.len();
        *self.tasks.write().await = fresh;
        tracing::debug!("Refreshed {} tasks", count);
        Ok(count)
    }

    /// Apply the status directive in `message`, if any.
    ///
    /// Returns `None` when there is nothing to do (no directive, unknown
    /// task, status already current) and also when a remote write failed;
    /// failures are logged rather than returned.
    pub async fn process_message(
        &self,
        message: &str,
        source_agent_id: Option<&str>,
    ) -> Option<StatusChange> {
        let candidate = parse_task_status_update(message)?;

        let (task, matches) = {
            let tasks = self.tasks.read().await;
            match resolve_task(&tasks, &candidate.task_id_suffix) {
                Some(r) => (r.task.clone(), r.matches),
                None => {
                    tracing::debug!(
                        suffix = %candidate.task_id_suffix,
                        "No task matches status update"
                    );
                    return None;
                }
            }
        };

        if matches > 1 {
            tracing::warn!(
                suffix = %candidate.task_id_suffix,
                matches,
                chosen = %task.id,
                "Ambiguous task reference, using first match"
            );
        }

        if task.status == candidate.new_status {
            tracing::debug!(task_id = %task.id, status = %task.status, "Status already current");
            return None;
        }

        match self.apply(&task, &candidate, source_agent_id).await {
            Ok(change) => Some(change),
            Err(e) => {
                tracing::error!(task_id = %task.id, "Failed to apply status update: {}", e);
                None
            }
        }
    }

    async fn apply(
        &self,
        task: &Task,
        candidate: &StatusUpdateCandidate,
        source_agent_id: Option<&str>,
    ) -> Result<StatusChange> {
        let old_status = task.status;
        let new_status = candidate.new_status;
        let now = Utc::now();
        let patch = TaskPatch::transition(task, new_status, now);

        self.api.update_task(&task.id, &patch).await?;

        // Local echo. Status and audit writes are not atomic.
        let updated = {
            let mut tasks = self.tasks.write().await;
            match tasks.iter_mut().find(|t| t.id == task.id) {
                Some(live) => {
                    live.apply(&patch, now);
                    live.clone()
                }
                None => {
                    let mut copy = task.clone();
                    copy.apply(&patch, now);
                    copy
                }
            }
        };

        let mut content = format!(
            "Status changed from {} to {}",
            old_status.label(),
            new_status.label()
        );
        if let Some(agent) = source_agent_id {
            content.push_str(&format!(" by {}", agent));
        }
        self.api
            .create_task_message(
                &task.id,
                &NewTaskMessage::system(content, source_agent_id.map(str::to_string)),
            )
            .await?;

        tracing::info!(
            task_id = %task.id,
            from = %old_status,
            to = %new_status,
            confidence = ?candidate.confidence,
            "Task status updated from agent message"
        );

        if let Some(callback) = &self.on_status_change {
            callback(&updated, old_status, new_status);
        }

        self.notify(&updated, new_status).await;

        Ok(StatusChange {
            task: updated,
            old_status,
            new_status,
            confidence: candidate.confidence,
        })
    }

    async fn notify(&self, task: &Task, status: TaskStatus) {
        if !self.notifications_enabled || self.notifier.permission() != Permission::Granted {
            return;
        }
        let notification = Notification {
            title: format!("Task updated: {}", task.title),
            body: format!("Status: {}", status.label()),
            tag: Some(format!("task-{}", task.id)),
        };
        if let Err(e) = self.notifier.notify(&notification).await {
            tracing::warn!("Failed to send notification: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeApi, RecordingNotifier};
    use std::sync::Mutex;

    fn setup(
        tasks: Vec<Task>,
        permission: Permission,
    ) -> (Arc<FakeApi>, Arc<RecordingNotifier>, Reconciler) {
        let api = Arc::new(FakeApi::with_tasks(tasks.clone()));
        let notifier = Arc::new(RecordingNotifier::new(permission));
        let reconciler = Reconciler::new(api.clone(), notifier.clone())
            .with_tasks(Arc::new(RwLock::new(tasks)));
        (api, notifier, reconciler)
    }

    #[tokio::test]
    async fn explicit_directive_starts_task() {
        let (api, notifier, reconciler) = setup(
            vec![Task::new("task-a1b2c3", "Build parser", TaskStatus::Assigned)],
            Permission::Granted,
        );

        let change = reconciler
            .process_message("[TASK #a1b2c3 STATUS:in_progress]", Some("coder"))
            .await
            .unwrap();

        assert_eq!(change.old_status, TaskStatus::Assigned);
        assert_eq!(change.new_status, TaskStatus::InProgress);
        assert_eq!(change.confidence, Confidence::High);
        assert!(change.task.started_at.is_some());
        assert!(change.task.completed_at.is_none());

        let updates = api.updates.lock().unwrap().clone();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, "task-a1b2c3");
        assert!(updates[0].1.started_at.is_some());

        let messages = api.messages.lock().unwrap().clone();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].1.content.contains("Assigned to In Progress by coder"));
        assert_eq!(messages[0].1.agent_id.as_deref(), Some("coder"));

        assert_eq!(notifier.notification_count(), 1);
        let live = reconciler.tasks();
        assert_eq!(live.read().await[0].status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn unknown_task_has_no_side_effects() {
        let (api, notifier, reconciler) = setup(
            vec![Task::new("task-a1b2c3", "Build parser", TaskStatus::Assigned)],
            Permission::Granted,
        );

        assert!(reconciler
            .process_message("Completed task #xyz999", None)
            .await
            .is_none());
        assert_eq!(api.update_count(), 0);
        assert_eq!(api.message_count(), 0);
        assert_eq!(notifier.notification_count(), 0);
    }

    #[tokio::test]
    async fn non_directive_is_ignored() {
        let (api, _, reconciler) = setup(
            vec![Task::new("task-a1", "A", TaskStatus::Inbox)],
            Permission::Granted,
        );
        assert!(reconciler.process_message("hello world", None).await.is_none());
        assert_eq!(api.update_count(), 0);
    }

    #[tokio::test]
    async fn already_done_is_a_no_op() {
        let (api, notifier, reconciler) = setup(
            vec![Task::new("task-foo42", "Ship", TaskStatus::Done)],
            Permission::Granted,
        );

        assert!(reconciler
            .process_message("[TASK #foo42 DONE]", None)
            .await
            .is_none());
        assert_eq!(api.update_count(), 0);
        assert_eq!(api.message_count(), 0);
        assert_eq!(notifier.notification_count(), 0);
    }

    #[tokio::test]
    async fn repeated_message_applies_once() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();
        let (api, notifier, reconciler) = setup(
            vec![Task::new("task-q7", "Review PR", TaskStatus::Inbox)],
            Permission::Granted,
        );
        let reconciler = reconciler.on_status_change(move |task, old, new| {
            seen.lock().unwrap().push((task.id.clone(), old, new));
        });

        assert!(reconciler
            .process_message("Reviewing task #q7", None)
            .await
            .is_some());
        assert!(reconciler
            .process_message("Reviewing task #q7", None)
            .await
            .is_none());

        assert_eq!(api.update_count(), 1);
        assert_eq!(api.message_count(), 1);
        assert_eq!(notifier.notification_count(), 1);
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &[("task-q7".to_string(), TaskStatus::Inbox, TaskStatus::Review)]
        );
    }

    #[tokio::test]
    async fn started_at_is_never_overwritten() {
        let mut task = Task::new("task-s1", "Deploy", TaskStatus::Review);
        let started = Utc::now() - chrono::Duration::hours(3);
        task.started_at = Some(started);
        let (api, _, reconciler) = setup(vec![task], Permission::Granted);

        let change = reconciler
            .process_message("working on task #s1", None)
            .await
            .unwrap();

        assert_eq!(change.task.started_at, Some(started));
        assert!(api.updates.lock().unwrap()[0].1.started_at.is_none());
    }

    #[tokio::test]
    async fn done_sets_completed_at() {
        let (api, _, reconciler) = setup(
            vec![Task::new("task-d1", "Docs", TaskStatus::InProgress)],
            Permission::Granted,
        );

        let change = reconciler
            .process_message("[TASK #d1 COMPLETE]", None)
            .await
            .unwrap();
        assert!(change.task.completed_at.is_some());
        assert!(api.updates.lock().unwrap()[0].1.completed_at.is_some());
    }

    #[tokio::test]
    async fn ambiguous_suffix_picks_first() {
        let (api, _, reconciler) = setup(
            vec![
                Task::new("abc123", "First", TaskStatus::Inbox),
                Task::new("xyz123", "Second", TaskStatus::Inbox),
            ],
            Permission::Granted,
        );

        let change = reconciler
            .process_message("[TASK #123 ACTIVE]", None)
            .await
            .unwrap();
        assert_eq!(change.task.id, "abc123");
        assert_eq!(api.updates.lock().unwrap()[0].0, "abc123");
    }

    #[tokio::test]
    async fn remote_failure_returns_none() {
        let (api, notifier, reconciler) = setup(
            vec![Task::new("task-f1", "Fail", TaskStatus::Inbox)],
            Permission::Granted,
        );
        api.fail_updates(true);

        assert!(reconciler
            .process_message("[TASK #f1 DONE]", None)
            .await
            .is_none());
        assert_eq!(api.message_count(), 0);
        assert_eq!(notifier.notification_count(), 0);
        assert_eq!(reconciler.tasks().read().await[0].status, TaskStatus::Inbox);
    }

    #[tokio::test]
    async fn audit_failure_keeps_status_change() {
        let (api, notifier, reconciler) = setup(
            vec![Task::new("task-f2", "Half", TaskStatus::Inbox)],
            Permission::Granted,
        );
        api.fail_messages(true);

        assert!(reconciler
            .process_message("[TASK #f2 DONE]", None)
            .await
            .is_none());
        // Not transactional: the status write already landed.
        assert_eq!(api.update_count(), 1);
        assert_eq!(reconciler.tasks().read().await[0].status, TaskStatus::Done);
        assert_eq!(notifier.notification_count(), 0);
    }

    #[tokio::test]
    async fn notifications_need_granted_permission() {
        let (_, notifier, reconciler) = setup(
            vec![Task::new("task-n1", "Quiet", TaskStatus::Inbox)],
            Permission::Default,
        );
        assert!(reconciler
            .process_message("[TASK #n1 DONE]", None)
            .await
            .is_some());
        assert_eq!(notifier.notification_count(), 0);

        let (_, notifier, reconciler) = setup(
            vec![Task::new("task-n2", "Muted", TaskStatus::Inbox)],
            Permission::Granted,
        );
        let reconciler = reconciler.notifications(false);
        assert!(reconciler
            .process_message("[TASK #n2 DONE]", None)
            .await
            .is_some());
        assert_eq!(notifier.notification_count(), 0);
    }

    #[tokio::test]
    async fn refresh_replaces_live_list() {
        let (api, _, reconciler) = setup(Vec::new(), Permission::Granted);
        api.tasks
            .lock()
            .unwrap()
            .push(Task::new("task-late", "Late", TaskStatus::Inbox));

        assert_eq!(reconciler.refresh_tasks().await.unwrap(), 1);
        assert!(reconciler
            .process_message("[TASK #late DONE]", None)
            .await
            .is_some());
    }
}
