//! Errors raised by the task store and the edit session.

/// Failure of a single store or session operation.
///
/// None of these are fatal: the operation is rejected as a whole and the
/// collection is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// A required field failed validation.
    #[error("{field} cannot be empty")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The referenced task is no longer in the collection.
    #[error("task not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// Two tasks in a seed collection share an id.
    #[error("duplicate task id: {id}")]
    DuplicateId {
        /// The colliding id.
        id: String,
    },

    /// A session operation was invoked from a state that does not allow it.
    #[error("cannot {op} while session is {state}")]
    InvalidTransition {
        /// The rejected operation.
        op: &'static str,
        /// The state the session was in.
        state: &'static str,
    },
}

impl TaskError {
    pub(crate) fn empty_title() -> Self {
        Self::Validation { field: "task title" }
    }

    pub(crate) fn not_found(id: &str) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// Message shown to the user through the notification sink.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { field } => {
                let mut chars = field.chars();
                match chars.next() {
                    Some(first) => {
                        format!("{}{} cannot be empty", first.to_ascii_uppercase(), chars.as_str())
                    }
                    None => "Value cannot be empty".to_string(),
                }
            }
            Self::NotFound { .. } => "Task not found".to_string(),
            other => other.to_string(),
        }
    }
}
