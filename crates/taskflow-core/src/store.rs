use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::TaskError;
use crate::notify::{NotificationSink, Severity, TracingSink};
use crate::task::{Task, TaskDraft, TaskPatch};

/// Owns the canonical task collection, newest task first.
///
/// Every mutation is all-or-nothing: a rejected call leaves the collection
/// untouched and reports the failure through the notification sink.
#[derive(Debug)]
pub struct TaskStore<N = TracingSink> {
    tasks: Vec<Task>,
    sink: N,
}

impl Default for TaskStore<TracingSink> {
    fn default() -> Self {
        Self::new(TracingSink)
    }
}

impl<N: NotificationSink> TaskStore<N> {
    pub fn new(sink: N) -> Self {
        Self {
            tasks: Vec::new(),
            sink,
        }
    }

    /// Seeds the store with an existing collection, kept in the given order.
    #[tracing::instrument(skip(tasks, sink), fields(count = tasks.len()))]
    pub fn with_tasks(tasks: Vec<Task>, sink: N) -> Result<Self, TaskError> {
        for (idx, task) in tasks.iter().enumerate() {
            if tasks[..idx].iter().any(|t| t.id == task.id) {
                return Err(TaskError::DuplicateId {
                    id: task.id.clone(),
                });
            }
            if task.title.trim().is_empty() {
                return Err(TaskError::empty_title());
            }
        }
        Ok(Self { tasks, sink })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    pub fn notify(&mut self, message: &str, severity: Severity) {
        self.sink.notify(message, severity);
    }

    /// Copy of the task with `id`. A miss is reported like any other
    /// rejected operation.
    pub fn lookup(&mut self, id: &str) -> Result<Task, TaskError> {
        match self.get(id) {
            Some(task) => Ok(task.clone()),
            None => Err(self.reject(TaskError::not_found(id))),
        }
    }

    #[tracing::instrument(skip(self, draft, now), fields(title_len = draft.title.len()))]
    pub fn add_task(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Result<Task, TaskError> {
        if let Err(err) = draft.validate() {
            return Err(self.reject(err));
        }

        let id = self.fresh_id();
        let task = draft.into_task(id, now);
        self.tasks.insert(0, task.clone());

        info!(id = %task.id, count = self.tasks.len(), "task added");
        self.sink.notify("New task added successfully", Severity::Success);
        Ok(task)
    }

    #[tracing::instrument(skip(self, patch))]
    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> Result<Task, TaskError> {
        let Some(idx) = self.position(id) else {
            return Err(self.reject(TaskError::not_found(id)));
        };
        if let Err(err) = patch.validate() {
            return Err(self.reject(err));
        }

        let task = &mut self.tasks[idx];
        patch.apply_to(task);
        let updated = task.clone();

        debug!(id = %updated.id, "task patch applied");
        self.sink.notify("Task updated successfully", Severity::Success);
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_task(&mut self, id: &str) -> Result<Task, TaskError> {
        let Some(idx) = self.position(id) else {
            return Err(self.reject(TaskError::not_found(id)));
        };

        let removed = self.tasks.remove(idx);
        info!(id = %removed.id, remaining = self.tasks.len(), "task deleted");
        self.sink.notify("Task deleted successfully", Severity::Info);
        Ok(removed)
    }

    #[tracing::instrument(skip(self))]
    pub fn cycle_status(&mut self, id: &str) -> Result<Task, TaskError> {
        let Some(idx) = self.position(id) else {
            return Err(self.reject(TaskError::not_found(id)));
        };

        let task = &mut self.tasks[idx];
        let from = task.status;
        task.status = from.next();
        let updated = task.clone();

        debug!(id = %updated.id, %from, to = %updated.status, "status cycled");
        self.sink.notify(
            &format!("Task marked as {}", updated.status.label()),
            Severity::Success,
        );
        Ok(updated)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    fn fresh_id(&self) -> String {
        loop {
            let candidate = Uuid::new_v4().to_string();
            if self.position(&candidate).is_none() {
                return candidate;
            }
        }
    }

    fn reject(&mut self, err: TaskError) -> TaskError {
        warn!(error = %err, "task operation rejected");
        self.sink.notify(&err.user_message(), Severity::Error);
        err
    }
}
