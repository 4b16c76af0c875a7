//! Selection and edit session: which task is open, and the uncommitted draft.
//!
//! The session only ever holds clones. Nothing written to a draft is visible
//! in the store until `save`/`save_add` commits it.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::error::TaskError;
use crate::notify::NotificationSink;
use crate::store::TaskStore;
use crate::task::{FieldEdit, Task, TaskDraft, TaskPatch};
use crate::view::CategoryFilter;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Closed,
    Viewing(Task),
    Editing { task: Task, draft: Task },
    Adding(TaskDraft),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Closed => "closed",
            SessionState::Viewing(_) => "viewing",
            SessionState::Editing { .. } => "editing",
            SessionState::Adding(_) => "adding",
        }
    }

    /// Id of the stored task the session is looking at, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            SessionState::Viewing(task) | SessionState::Editing { task, .. } => Some(&task.id),
            SessionState::Closed | SessionState::Adding(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Opens `task` for viewing. Any draft in progress is dropped.
    #[tracing::instrument(skip(self, task), fields(id = %task.id, from = self.state.name()))]
    pub fn select(&mut self, task: Task) {
        self.state = SessionState::Viewing(task);
    }

    #[tracing::instrument(skip(self), fields(from = self.state.name()))]
    pub fn enter_edit(&mut self) -> Result<(), TaskError> {
        let SessionState::Viewing(task) = &self.state else {
            return Err(self.invalid("edit"));
        };
        let task = task.clone();
        let draft = task.clone();
        self.state = SessionState::Editing { task, draft };
        Ok(())
    }

    /// Applies `edit` to the edit draft. Returns `false` (and changes
    /// nothing) outside of `Editing`.
    pub fn edit_field(&mut self, edit: FieldEdit) -> bool {
        match &mut self.state {
            SessionState::Editing { draft, .. } => {
                debug!(?edit, "edit draft field");
                draft.apply(edit);
                true
            }
            _ => false,
        }
    }

    /// Applies `edit` to the add draft. Returns `false` outside of `Adding`.
    pub fn edit_new_field(&mut self, edit: FieldEdit) -> bool {
        match &mut self.state {
            SessionState::Adding(draft) => {
                debug!(?edit, "add draft field");
                draft.apply(edit);
                true
            }
            _ => false,
        }
    }

    /// Commits the edit draft.
    ///
    /// A rejected title keeps the session in `Editing` with the draft intact.
    /// If the task vanished from the store the session closes.
    #[tracing::instrument(skip(self, store), fields(from = self.state.name()))]
    pub fn save<N: NotificationSink>(
        &mut self,
        store: &mut TaskStore<N>,
    ) -> Result<Task, TaskError> {
        let SessionState::Editing { draft, .. } = &self.state else {
            return Err(self.invalid("save"));
        };
        let id = draft.id.clone();
        let patch = TaskPatch::from_draft(draft);

        match store.update_task(&id, patch) {
            Ok(updated) => {
                info!(id = %updated.id, "edit committed");
                self.state = SessionState::Viewing(updated.clone());
                Ok(updated)
            }
            Err(err @ TaskError::NotFound { .. }) => {
                self.state = SessionState::Closed;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    pub fn cancel(&mut self) {
        self.close();
    }

    #[tracing::instrument(skip(self), fields(from = self.state.name()))]
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Opens a blank add draft. The draft lands in the selected category, or
    /// in `default_category` when the filter shows all categories.
    #[tracing::instrument(skip(self), fields(from = self.state.name()))]
    pub fn start_add(
        &mut self,
        today: NaiveDate,
        filter: &CategoryFilter,
        default_category: &str,
    ) -> Result<(), TaskError> {
        if self.state != SessionState::Closed {
            return Err(self.invalid("start adding"));
        }
        let category = filter.selected().unwrap_or(default_category);
        self.state = SessionState::Adding(TaskDraft::blank(today, category));
        Ok(())
    }

    /// Creates a task from the add draft and closes the session. A rejected
    /// title keeps the draft open.
    #[tracing::instrument(skip(self, store, now), fields(from = self.state.name()))]
    pub fn save_add<N: NotificationSink>(
        &mut self,
        store: &mut TaskStore<N>,
        now: DateTime<Utc>,
    ) -> Result<Task, TaskError> {
        let SessionState::Adding(draft) = &self.state else {
            return Err(self.invalid("save new task"));
        };

        let created = store.add_task(draft.clone(), now)?;
        self.state = SessionState::Closed;
        Ok(created)
    }

    /// Deletes the open task. The session closes whether or not the store
    /// still had it; uncommitted edits are discarded.
    #[tracing::instrument(skip(self, store), fields(from = self.state.name()))]
    pub fn delete<N: NotificationSink>(
        &mut self,
        store: &mut TaskStore<N>,
    ) -> Result<Task, TaskError> {
        let Some(id) = self.state.task_id().map(str::to_string) else {
            return Err(self.invalid("delete"));
        };
        self.state = SessionState::Closed;
        store.delete_task(&id)
    }

    /// Refreshes the viewed copy after the stored task changed outside the
    /// session (e.g. a status toggle from the list). Drafts are left alone.
    pub fn sync(&mut self, updated: &Task) {
        match &mut self.state {
            SessionState::Viewing(task) | SessionState::Editing { task, .. }
                if task.id == updated.id =>
            {
                *task = updated.clone();
            }
            _ => {}
        }
    }

    /// Closes the session if it refers to a task that no longer exists.
    pub fn forget(&mut self, id: &str) {
        if self.state.task_id() == Some(id) {
            debug!(id, "open task was deleted; closing session");
            self.state = SessionState::Closed;
        }
    }

    fn invalid(&self, op: &'static str) -> TaskError {
        TaskError::InvalidTransition {
            op,
            state: self.state.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::{Session, SessionState};
    use crate::error::TaskError;
    use crate::notify::RecordingSink;
    use crate::store::TaskStore;
    use crate::task::{FieldEdit, Priority, Status, Task, TaskDraft};
    use crate::view::CategoryFilter;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid date")
    }

    fn seeded() -> (TaskStore<RecordingSink>, Task) {
        let mut store = TaskStore::new(RecordingSink::default());
        let task = store
            .add_task(TaskDraft::new("Original", today(), "1"), Utc::now())
            .expect("add");
        (store, task)
    }

    #[test]
    fn edit_is_invisible_until_saved() {
        let (mut store, task) = seeded();
        let mut session = Session::new();
        session.select(task.clone());
        session.enter_edit().expect("enter edit");

        assert!(session.edit_field(FieldEdit::Title("Changed".to_string())));
        assert_eq!(store.get(&task.id).map(|t| t.title.as_str()), Some("Original"));

        let saved = session.save(&mut store).expect("save");
        assert_eq!(saved.title, "Changed");
        assert_eq!(store.get(&task.id).map(|t| t.title.as_str()), Some("Changed"));
        assert_eq!(session.state(), &SessionState::Viewing(saved));
    }

    #[test]
    fn save_with_blank_title_stays_editing() {
        let (mut store, task) = seeded();
        let mut session = Session::new();
        session.select(task.clone());
        session.enter_edit().expect("enter edit");
        session.edit_field(FieldEdit::Title(" ".to_string()));

        let err = session.save(&mut store).expect_err("blank title");
        assert!(matches!(err, TaskError::Validation { .. }));
        assert_eq!(session.state().name(), "editing");
        assert_eq!(store.get(&task.id), Some(&task));
    }

    #[test]
    fn edit_field_is_noop_outside_editing() {
        let (_, task) = seeded();
        let mut session = Session::new();
        assert!(!session.edit_field(FieldEdit::Priority(Priority::High)));

        session.select(task.clone());
        assert!(!session.edit_field(FieldEdit::Priority(Priority::High)));
        assert_eq!(session.state(), &SessionState::Viewing(task));
    }

    #[test]
    fn save_after_task_vanished_closes_session() {
        let (mut store, task) = seeded();
        let mut session = Session::new();
        session.select(task.clone());
        session.enter_edit().expect("enter edit");
        session.edit_field(FieldEdit::Title("Too late".to_string()));
        store.delete_task(&task.id).expect("delete behind the session");

        let err = session.save(&mut store).expect_err("task is gone");
        assert_eq!(err, TaskError::NotFound { id: task.id.clone() });
        assert_eq!(session.state(), &SessionState::Closed);
        assert!(store.is_empty());
    }

    #[test]
    fn enter_edit_needs_a_viewed_task() {
        let mut session = Session::new();
        assert_eq!(
            session.enter_edit(),
            Err(TaskError::InvalidTransition {
                op: "edit",
                state: "closed"
            })
        );

        session
            .start_add(today(), &CategoryFilter::All, "1")
            .expect("start add");
        assert_eq!(
            session.enter_edit(),
            Err(TaskError::InvalidTransition {
                op: "edit",
                state: "adding"
            })
        );
        assert_eq!(session.state().name(), "adding");
    }

    #[test]
    fn cancel_discards_draft() {
        let (mut store, task) = seeded();
        let mut session = Session::new();
        session.select(task.clone());
        session.enter_edit().expect("enter edit");
        session.edit_field(FieldEdit::Status(Status::Completed));
        session.cancel();

        assert_eq!(session.state(), &SessionState::Closed);
        assert!(session.save(&mut store).is_err());
        assert_eq!(store.get(&task.id), Some(&task));
    }

    #[test]
    fn start_add_uses_filter_or_default_category() {
        let mut session = Session::new();
        session
            .start_add(today(), &CategoryFilter::Only("3".to_string()), "1")
            .expect("start add");
        let SessionState::Adding(draft) = session.state() else {
            panic!("expected adding state");
        };
        assert_eq!(draft.category_id, "3");
        assert_eq!(draft.status, Status::NotStarted);
        assert_eq!(draft.priority, Priority::Medium);
        assert_eq!(draft.due_date, today());
        assert!(draft.title.is_empty());

        session.close();
        session
            .start_add(today(), &CategoryFilter::All, "1")
            .expect("start add");
        let SessionState::Adding(draft) = session.state() else {
            panic!("expected adding state");
        };
        assert_eq!(draft.category_id, "1");
    }

    #[test]
    fn save_add_with_empty_title_keeps_adding() {
        let mut store = TaskStore::new(RecordingSink::default());
        let mut session = Session::new();
        session
            .start_add(today(), &CategoryFilter::All, "1")
            .expect("start add");

        let err = session.save_add(&mut store, Utc::now()).expect_err("empty");
        assert!(matches!(err, TaskError::Validation { .. }));
        assert_eq!(session.state().name(), "adding");
        assert!(store.is_empty());
    }

    #[test]
    fn save_add_creates_and_closes() {
        let mut store = TaskStore::new(RecordingSink::default());
        let mut session = Session::new();
        session
            .start_add(today(), &CategoryFilter::All, "1")
            .expect("start add");
        assert!(session.edit_new_field(FieldEdit::Title("New".to_string())));

        let created = session.save_add(&mut store, Utc::now()).expect("save add");
        assert_eq!(store.tasks().first(), Some(&created));
        assert_eq!(session.state(), &SessionState::Closed);
    }

    #[test]
    fn delete_from_editing_closes_session() {
        let (mut store, task) = seeded();
        let mut session = Session::new();
        session.select(task.clone());
        session.enter_edit().expect("enter edit");
        session.edit_field(FieldEdit::Title("unsaved".to_string()));

        let removed = session.delete(&mut store).expect("delete");
        assert_eq!(removed.title, "Original");
        assert_eq!(session.state(), &SessionState::Closed);
        assert!(store.is_empty());
    }

    #[test]
    fn start_add_requires_closed_session() {
        let (_, task) = seeded();
        let mut session = Session::new();
        session.select(task);
        let err = session
            .start_add(today(), &CategoryFilter::All, "1")
            .expect_err("viewing");
        assert_eq!(
            err,
            TaskError::InvalidTransition {
                op: "start adding",
                state: "viewing"
            }
        );
    }

    #[test]
    fn sync_refreshes_viewed_copy_only_for_same_task() {
        let (mut store, task) = seeded();
        let mut session = Session::new();
        session.select(task.clone());

        let cycled = store.cycle_status(&task.id).expect("cycle");
        session.sync(&cycled);
        assert_eq!(session.state(), &SessionState::Viewing(cycled));

        session.forget(&task.id);
        assert_eq!(session.state(), &SessionState::Closed);
    }
}
