use std::fmt;
use std::str::FromStr;

use tracing::trace;

use crate::category::Categories;
use crate::task::{Status, Task};

const ALL: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(id) => task.category_id == *id,
        }
    }

    pub fn selected(&self) -> Option<&str> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Only(id) => Some(id),
        }
    }
}

impl From<&str> for CategoryFilter {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case(ALL) {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(s.to_string())
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CategoryFilter::from(s))
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selected().unwrap_or(ALL))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(Status),
}

impl StatusFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => task.status == *status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case(ALL) {
            Ok(StatusFilter::All)
        } else {
            Ok(StatusFilter::Only(s.parse()?))
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str(ALL),
            StatusFilter::Only(status) => write!(f, "{status}"),
        }
    }
}

/// Filtered view of `tasks`, earliest due date first.
///
/// Equal due dates keep their collection order. The input is never touched;
/// each call builds a fresh vector.
#[tracing::instrument(skip(tasks), fields(total = tasks.len()))]
pub fn derive_view(
    tasks: &[Task],
    category: &CategoryFilter,
    status: &StatusFilter,
) -> Vec<Task> {
    let mut out: Vec<Task> = tasks
        .iter()
        .filter(|task| category.matches(task) && status.matches(task))
        .cloned()
        .collect();

    // stable: ties stay in collection order
    out.sort_by_key(|task| task.due_date);

    trace!(visible = out.len(), "derived view");
    out
}

/// Filter selections currently applied to the list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewCriteria {
    pub category: CategoryFilter,
    pub status: StatusFilter,
}

impl ViewCriteria {
    pub fn derive(&self, tasks: &[Task]) -> Vec<Task> {
        derive_view(tasks, &self.category, &self.status)
    }

    /// Text shown in place of an empty list.
    pub fn empty_message(&self) -> String {
        let base = match self.category {
            CategoryFilter::All => "No tasks found",
            CategoryFilter::Only(_) => "No tasks in this category",
        };
        match self.status {
            StatusFilter::All => base.to_string(),
            StatusFilter::Only(status) => format!("{base} with status \"{status}\""),
        }
    }

    /// Heading for the list, e.g. `All Tasks` or the category name.
    pub fn title(&self, categories: &Categories) -> String {
        match &self.category {
            CategoryFilter::All => "All Tasks".to_string(),
            CategoryFilter::Only(id) => categories
                .get(id)
                .map_or_else(|| "Tasks".to_string(), |c| c.name.clone()),
        }
    }
}
