use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::parse_due_date;
use crate::error::TaskError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    NotStarted,
    InProgress,
    Completed,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::NotStarted, Status::InProgress, Status::Completed];

    /// Next status in the forward-only ring.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Status::NotStarted => Status::InProgress,
            Status::InProgress => Status::Completed,
            Status::Completed => Status::NotStarted,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Status::NotStarted => "not-started",
            Status::InProgress => "in-progress",
            Status::Completed => "completed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::NotStarted => "not started",
            Status::InProgress => "in progress",
            Status::Completed => "completed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "not-started" | "notstarted" | "todo" => Ok(Status::NotStarted),
            "in-progress" | "inprogress" | "started" => Ok(Status::InProgress),
            "completed" | "done" => Ok(Status::Completed),
            other => Err(anyhow!("unknown status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(Priority::Low),
            "m" | "med" | "medium" => Ok(Priority::Medium),
            "h" | "high" => Ok(Priority::High),
            other => Err(anyhow!("unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    pub status: Status,

    pub priority: Priority,

    pub due_date: NaiveDate,

    pub category_id: String,

    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Edits made while the session holds this task as an edit draft.
    pub fn apply(&mut self, edit: FieldEdit) {
        edit.write(EditableFields {
            title: &mut self.title,
            description: &mut self.description,
            status: &mut self.status,
            priority: &mut self.priority,
            due_date: &mut self.due_date,
            category_id: &mut self.category_id,
        });
    }
}

/// Fields of a task that has not been created yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub due_date: NaiveDate,
    pub category_id: String,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, due_date: NaiveDate, category_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            status: Status::NotStarted,
            priority: Priority::Medium,
            due_date,
            category_id: category_id.into(),
        }
    }

    /// Blank draft offered when the user starts adding a task.
    pub fn blank(today: NaiveDate, category_id: impl Into<String>) -> Self {
        Self::new(String::new(), today, category_id)
    }

    pub fn apply(&mut self, edit: FieldEdit) {
        edit.write(EditableFields {
            title: &mut self.title,
            description: &mut self.description,
            status: &mut self.status,
            priority: &mut self.priority,
            due_date: &mut self.due_date,
            category_id: &mut self.category_id,
        });
    }

    pub(crate) fn validate(&self) -> Result<(), TaskError> {
        validate_title(&self.title)
    }

    pub(crate) fn into_task(self, id: String, now: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            due_date: self.due_date,
            category_id: self.category_id,
            created_at: now,
        }
    }
}

/// Partial update applied to a stored task. `id` and `created_at` are never
/// part of a patch.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub due_date: Option<NaiveDate>,
    pub category_id: Option<String>,
}

impl TaskPatch {
    /// Patch that overwrites every mutable field with the draft's values.
    pub fn from_draft(draft: &Task) -> Self {
        Self {
            title: Some(draft.title.clone()),
            description: Some(draft.description.clone()),
            status: Some(draft.status),
            priority: Some(draft.priority),
            due_date: Some(draft.due_date),
            category_id: Some(draft.category_id.clone()),
        }
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), TaskError> {
        match self.title.as_deref() {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }

    pub(crate) fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due) = self.due_date {
            task.due_date = due;
        }
        if let Some(category_id) = self.category_id {
            task.category_id = category_id;
        }
    }
}

/// Borrowed user-editable fields, shared by stored tasks and add drafts.
struct EditableFields<'a> {
    title: &'a mut String,
    description: &'a mut String,
    status: &'a mut Status,
    priority: &'a mut Priority,
    due_date: &'a mut NaiveDate,
    category_id: &'a mut String,
}

/// One field assignment made on a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    Title(String),
    Description(String),
    Status(Status),
    Priority(Priority),
    DueDate(NaiveDate),
    Category(String),
}

impl FieldEdit {
    pub const FIELD_NAMES: [&'static str; 6] =
        ["title", "description", "status", "priority", "due", "category"];

    /// Builds an edit from a field name and its raw text value.
    pub fn parse(field: &str, value: &str, today: NaiveDate) -> anyhow::Result<Self> {
        let edit = match field.trim().to_ascii_lowercase().as_str() {
            "title" => FieldEdit::Title(value.to_string()),
            "description" | "desc" => FieldEdit::Description(value.to_string()),
            "status" => FieldEdit::Status(value.parse()?),
            "priority" | "pri" => FieldEdit::Priority(value.parse()?),
            "due" | "duedate" | "due_date" => FieldEdit::DueDate(parse_due_date(value, today)?),
            "category" | "cat" => FieldEdit::Category(value.trim().to_string()),
            other => {
                return Err(anyhow!(
                    "unknown field: {other} (expected one of {})",
                    Self::FIELD_NAMES.join(", ")
                ));
            }
        };
        Ok(edit)
    }

    fn write(self, fields: EditableFields<'_>) {
        match self {
            FieldEdit::Title(title) => *fields.title = title,
            FieldEdit::Description(description) => *fields.description = description,
            FieldEdit::Status(status) => *fields.status = status,
            FieldEdit::Priority(priority) => *fields.priority = priority,
            FieldEdit::DueDate(due) => *fields.due_date = due,
            FieldEdit::Category(category_id) => *fields.category_id = category_id,
        }
    }
}

fn validate_title(title: &str) -> Result<(), TaskError> {
    if title.trim().is_empty() {
        Err(TaskError::empty_title())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{FieldEdit, Priority, Status, TaskDraft, TaskPatch};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).expect("valid date")
    }

    #[test]
    fn status_ring_returns_after_three_steps() {
        for status in Status::ALL {
            assert_eq!(status.next().next().next(), status);
            assert_ne!(status.next(), status);
        }
    }

    #[test]
    fn status_parses_dashed_and_underscored_keys() {
        assert_eq!("not-started".parse::<Status>().expect("parse"), Status::NotStarted);
        assert_eq!("IN_PROGRESS".parse::<Status>().expect("parse"), Status::InProgress);
        assert!("archived".parse::<Status>().is_err());
    }

    #[test]
    fn whitespace_title_fails_validation() {
        let draft = TaskDraft::new("   ", day(1), "1");
        assert!(draft.validate().is_err());
        assert!(TaskPatch::title("\t").validate().is_err());
        assert!(TaskPatch::default().validate().is_ok());
    }

    #[test]
    fn field_edit_parses_due_and_priority() {
        let today = day(10);
        assert_eq!(
            FieldEdit::parse("due", "tomorrow", today).expect("due"),
            FieldEdit::DueDate(day(11))
        );
        assert_eq!(
            FieldEdit::parse("pri", "h", today).expect("priority"),
            FieldEdit::Priority(Priority::High)
        );
        assert!(FieldEdit::parse("owner", "me", today).is_err());
    }

    #[test]
    fn task_and_draft_take_the_same_edits() {
        let mut draft = TaskDraft::blank(day(1), "1");
        let mut task = TaskDraft::new("x", day(1), "1").into_task("t1".to_string(), chrono::Utc::now());
        let edits = [
            FieldEdit::Title("Plan trip".to_string()),
            FieldEdit::Description("book flights".to_string()),
            FieldEdit::Status(Status::InProgress),
            FieldEdit::Priority(Priority::Low),
            FieldEdit::DueDate(day(20)),
            FieldEdit::Category("4".to_string()),
        ];
        for edit in edits {
            draft.apply(edit.clone());
            task.apply(edit);
        }

        assert_eq!(task.id, "t1");
        assert_eq!(draft.into_task("t1".to_string(), task.created_at), task);
    }

    #[test]
    fn serializes_status_as_kebab_case() {
        let json = serde_json::to_string(&Status::NotStarted).expect("serialize");
        assert_eq!(json, "\"not-started\"");
    }
}
