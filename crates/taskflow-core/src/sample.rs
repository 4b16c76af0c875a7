use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::task::{Priority, Status, Task};

/// The starter list shown on a fresh session, due dates relative to `today`.
pub fn sample_tasks(today: NaiveDate, now: DateTime<Utc>) -> Vec<Task> {
    let plus = |days: u64| today.checked_add_days(Days::new(days)).unwrap_or(today);
    let minus = |days: u64| today.checked_sub_days(Days::new(days)).unwrap_or(today);

    let task = |id: &str,
                title: &str,
                description: &str,
                status: Status,
                priority: Priority,
                due_date: NaiveDate,
                category_id: &str| Task {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        status,
        priority,
        due_date,
        category_id: category_id.to_string(),
        created_at: now,
    };

    vec![
        task(
            "1",
            "Complete project proposal",
            "Write and submit the project proposal for client review",
            Status::NotStarted,
            Priority::High,
            plus(2),
            "2",
        ),
        task(
            "2",
            "Go for a run",
            "Morning jog in the park for 30 minutes",
            Status::InProgress,
            Priority::Medium,
            plus(1),
            "3",
        ),
        task(
            "3",
            "Read book chapter",
            "Read chapter 5 of Clean Code",
            Status::Completed,
            Priority::Low,
            minus(1),
            "4",
        ),
        task(
            "4",
            "Grocery shopping",
            "Buy vegetables, fruits, and milk",
            Status::NotStarted,
            Priority::Medium,
            plus(3),
            "1",
        ),
    ]
}
