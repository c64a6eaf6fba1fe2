//! Due-date classification.
//!
//! # Invariants
//! - Completed tasks are always `Completed`, whatever their due date.
//! - Undated open tasks are never overdue or due soon.

use crate::model::task::Task;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Display category of a task relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Completed,
    /// Open task without a due date. Labelled `None` in the table.
    Undated,
    VeryOverdue,
    Overdue,
    DueSoon,
    Upcoming,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::Undated => "None",
            Self::VeryOverdue => "Very Overdue",
            Self::Overdue => "Overdue",
            Self::DueSoon => "Due Soon",
            Self::Upcoming => "Upcoming",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Signed day distance from `today` to the task's due date.
pub fn days_until_due(task: &Task, today: NaiveDate) -> Option<i64> {
    task.due_date.map(|due| (due - today).num_days())
}

/// Classifies one task.
///
/// Due today or yesterday counts as `Overdue`; one to three days ahead is
/// `DueSoon`.
pub fn classify(task: &Task, today: NaiveDate) -> Category {
    if task.is_completed() {
        return Category::Completed;
    }
    match days_until_due(task, today) {
        None => Category::Undated,
        Some(days) if days < -1 => Category::VeryOverdue,
        Some(-1 | 0) => Category::Overdue,
        Some(1..=3) => Category::DueSoon,
        Some(_) => Category::Upcoming,
    }
}
