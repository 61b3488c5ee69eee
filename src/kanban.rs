//! Kanban board state with optimistic drag-and-drop moves.
//!
//! The board keeps two task lists: `confirmed`, the last list the server
//! returned, and `shadow`, the list that is rendered. Drags rewrite the
//! shadow immediately; the server is only called on drop, and only when the
//! card changed column. A failed commit replaces the whole shadow list with
//! the confirmed one.

use chrono::Utc;

use crate::api::TaskApi;
use crate::error::{Error, Result};
use crate::notifier::{Notifier, ToastKind};
use crate::task::{Activity, Bucket, Task, TaskPatch, TaskStatus};

/// Where a dragged card is hovering or being dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Column(Bucket),
    /// Another card; the drop lands in that card's column.
    Card(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    /// Picked up, nothing changed yet.
    Dragging,
    /// Shadow status rewritten to the hovered column.
    SpeculativelyMoved,
    /// Server mutation in flight.
    Committing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub task_id: String,
    /// Server-confirmed status when the drag began.
    pub original_status: TaskStatus,
    pub phase: DragPhase,
}

/// A column change waiting for the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Same column: local reorder only.
    Reordered,
    Commit(PendingMove),
}

#[derive(Debug, Clone, Default)]
pub struct Board {
    confirmed: Vec<Task>,
    shadow: Vec<Task>,
    activities: Vec<Activity>,
    drag: Option<DragSession>,
}

impl Board {
    pub fn new(tasks: Vec<Task>, activities: Vec<Activity>) -> Self {
        Self {
            shadow: tasks.clone(),
            confirmed: tasks,
            activities,
            drag: None,
        }
    }

    /// Load the board from the API.
    pub async fn load(api: &dyn TaskApi) -> Result<Self> {
        let tasks = api.list_tasks().await?;
        let activities = api.list_activities().await?;
        Ok(Self::new(tasks, activities))
    }

    /// Rendered tasks.
    pub fn tasks(&self) -> &[Task] {
        &self.shadow
    }

    pub fn confirmed(&self) -> &[Task] {
        &self.confirmed
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn drag(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    /// Rendered cards of one column, in display order.
    pub fn column(&self, bucket: Bucket) -> Vec<&Task> {
        self.shadow
            .iter()
            .filter(|t| t.status.bucket() == Some(bucket))
            .collect()
    }

    /// Accept a fresh server list. The shadow follows unless a drag is active.
    pub fn sync(&mut self, tasks: Vec<Task>, activities: Vec<Activity>) {
        self.confirmed = tasks;
        self.activities = activities;
        if self.drag.is_none() {
            self.shadow = self.confirmed.clone();
        }
    }

    pub fn begin_drag(&mut self, task_id: &str) -> Result<()> {
        if let Some(active) = &self.drag {
            return Err(Error::Board(format!(
                "Task {} is already being moved",
                active.task_id
            )));
        }
        let task = self
            .confirmed
            .iter()
            .find(|t| t.id == task_id)
            .ok_or_else(|| Error::NotFound(format!("Task not on board: {}", task_id)))?;
        if task.status.bucket().is_none() {
            return Err(Error::Board(format!("Task {} is archived", task_id)));
        }

        self.drag = Some(DragSession {
            task_id: task_id.to_string(),
            original_status: task.status,
            phase: DragPhase::Dragging,
        });
        Ok(())
    }

    /// Speculatively move the dragged card into the hovered column.
    pub fn drag_over(&mut self, target: &DropTarget) -> Result<()> {
        let bucket = self.target_bucket(target)?;
        let session = self.active_session()?.clone();

        let mut moved = false;
        if let Some(task) = self.shadow.iter_mut().find(|t| t.id == session.task_id) {
            if task.status.bucket() != Some(bucket) {
                task.status = bucket.persisted_status();
                moved = true;
            }
        }
        if moved {
            self.set_phase(DragPhase::SpeculativelyMoved);
        }
        Ok(())
    }

    /// Finish the gesture.
    ///
    /// Dropping into the column the card started in reorders the shadow list
    /// and ends the drag. Any other column yields the single server mutation
    /// to perform; the drag stays in `Committing` until
    /// [`Board::commit_succeeded`] or [`Board::commit_failed`].
    pub fn drop_on(&mut self, target: &DropTarget) -> Result<DropOutcome> {
        let destination = self.target_bucket(target)?;
        let session = self.active_session()?.clone();

        if session.original_status.bucket() == Some(destination) {
            self.reorder(&session, target);
            self.drag = None;
            return Ok(DropOutcome::Reordered);
        }

        let to = destination.persisted_status();
        if let Some(task) = self.shadow.iter_mut().find(|t| t.id == session.task_id) {
            task.status = to;
        }
        self.set_phase(DragPhase::Committing);

        Ok(DropOutcome::Commit(PendingMove {
            task_id: session.task_id,
            from: session.original_status,
            to,
        }))
    }

    /// Abandon the drag and show the confirmed list again.
    pub fn cancel_drag(&mut self) {
        self.drag = None;
        self.shadow = self.confirmed.clone();
    }

    pub fn commit_succeeded(&mut self, tasks: Vec<Task>, activities: Vec<Activity>) {
        self.drag = None;
        self.sync(tasks, activities);
    }

    /// The server accepted the move but the list could not be refetched.
    pub fn confirm_move(&mut self, pending: &PendingMove) {
        if let Some(task) = self.confirmed.iter_mut().find(|t| t.id == pending.task_id) {
            task.apply(&TaskPatch::status(pending.to), Utc::now());
        }
        self.drag = None;
        self.shadow = self.confirmed.clone();
    }

    /// Full rollback to the last confirmed list.
    pub fn commit_failed(&mut self) {
        self.drag = None;
        self.shadow = self.confirmed.clone();
    }

    fn active_session(&self) -> Result<&DragSession> {
        match &self.drag {
            Some(s) if s.phase == DragPhase::Committing => Err(Error::Board(format!(
                "Move of task {} is still being saved",
                s.task_id
            ))),
            Some(s) => Ok(s),
            None => Err(Error::Board("No drag in progress".to_string())),
        }
    }

    fn set_phase(&mut self, phase: DragPhase) {
        if let Some(session) = self.drag.as_mut() {
            session.phase = phase;
        }
    }

    fn target_bucket(&self, target: &DropTarget) -> Result<Bucket> {
        match target {
            DropTarget::Column(bucket) => Ok(*bucket),
            DropTarget::Card(id) => self
                .shadow
                .iter()
                .find(|t| &t.id == id)
                .and_then(|t| t.status.bucket())
                .ok_or_else(|| Error::NotFound(format!("Card not on board: {}", id))),
        }
    }

    fn reorder(&mut self, session: &DragSession, target: &DropTarget) {
        let Some(from) = self.shadow.iter().position(|t| t.id == session.task_id) else {
            return;
        };
        let mut task = self.shadow.remove(from);
        task.status = session.original_status;

        let index = match target {
            DropTarget::Card(id) if *id != session.task_id => {
                self.shadow.iter().position(|t| &t.id == id)
            }
            _ => None,
        }
        .or_else(|| {
            let bucket = session.original_status.bucket();
            self.shadow
                .iter()
                .rposition(|t| t.status.bucket() == bucket)
                .map(|i| i + 1)
        })
        .unwrap_or(from.min(self.shadow.len()));

        self.shadow.insert(index, task);
    }
}

/// Send a pending move to the server and settle the board.
///
/// On success the task list and activity feed are refetched. On failure the
/// board is rolled back and the error is returned after an error toast.
pub async fn commit_move(
    board: &mut Board,
    api: &dyn TaskApi,
    notifier: &dyn Notifier,
    pending: &PendingMove,
    demo_mode: bool,
) -> Result<()> {
    if let Err(e) = api
        .update_task(&pending.task_id, &TaskPatch::status(pending.to))
        .await
    {
        tracing::warn!(task_id = %pending.task_id, "Move failed, rolling back: {}", e);
        board.commit_failed();
        toast(notifier, ToastKind::Error, &format!("Failed to move task: {}", e)).await;
        return Err(e);
    }

    match api.list_tasks().await {
        Ok(tasks) => {
            let activities = match api.list_activities().await {
                Ok(activities) => activities,
                Err(e) => {
                    tracing::warn!("Activity refresh failed: {}", e);
                    board.activities().to_vec()
                }
            };
            board.commit_succeeded(tasks, activities);
        }
        Err(e) => {
            tracing::warn!("Task refresh after move failed: {}", e);
            board.confirm_move(pending);
        }
    }

    let label = pending.to.bucket().map_or(pending.to.label(), |b| b.label());
    let message = if demo_mode {
        format!(
            "Task moved to {}. Demo mode: this change only lasts for the current session.",
            label
        )
    } else {
        format!("Task moved to {}", label)
    };
    toast(notifier, ToastKind::Success, &message).await;
    Ok(())
}

async fn toast(notifier: &dyn Notifier, kind: ToastKind, message: &str) {
    if let Err(e) = notifier.toast(kind, message).await {
        tracing::warn!("Failed to show toast: {}", e);
    }
}
