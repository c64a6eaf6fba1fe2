//! Search filtering and column sorting for the task table.
//!
//! # Responsibility
//! - Keep tasks whose text fields contain the query (case-insensitive).
//! - Order the kept tasks by one table column.
//!
//! # Invariants
//! - Sorting is stable: ties keep input order in both directions.
//! - Tasks without a due date sort last in both directions.
//! - Same input and arguments always yield the same sequence.

use crate::model::task::Task;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Sortable table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    Title,
    Priority,
    Status,
    DueDate,
    Notes,
}

impl SortKey {
    pub const ALL: [SortKey; 5] = [
        SortKey::Title,
        SortKey::Priority,
        SortKey::Status,
        SortKey::DueDate,
        SortKey::Notes,
    ];

    /// Column identifier used by table headers.
    pub fn column(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Priority => "priority",
            Self::Status => "status",
            Self::DueDate => "due_date",
            Self::Notes => "notes",
        }
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// A column name outside the fixed header set. Indicates a caller bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort key `{0}`; expected title|priority|status|due_date|notes")]
pub struct UnknownSortKey(pub String);

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.column() == value)
            .ok_or_else(|| UnknownSortKey(value.to_string()))
    }
}

/// Produces the visible, ordered task sequence.
///
/// An empty (or whitespace-only) query keeps every task.
pub fn view<'a>(tasks: &'a [Task], query: &str, key: SortKey, descending: bool) -> Vec<&'a Task> {
    let needle = query.trim().to_lowercase();
    let mut visible = tasks
        .iter()
        .filter(|task| needle.is_empty() || matches_needle(task, &needle))
        .collect::<Vec<_>>();
    visible.sort_by(|a, b| compare(key, a, b, descending));
    visible
}

/// `needle` is already trimmed and lowercased.
fn matches_needle(task: &Task, needle: &str) -> bool {
    task.title.to_lowercase().contains(needle)
        || task.priority.label().to_lowercase().contains(needle)
        || task.status.label().to_lowercase().contains(needle)
        || task
            .notes
            .as_deref()
            .is_some_and(|notes| notes.to_lowercase().contains(needle))
}

fn compare(key: SortKey, a: &Task, b: &Task, descending: bool) -> Ordering {
    let directed = |ordering: Ordering| {
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    };

    match key {
        SortKey::Title => directed(compare_text(&a.title, &b.title)),
        SortKey::Priority => directed(a.priority.cmp(&b.priority)),
        SortKey::Status => directed(a.status.cmp(&b.status)),
        SortKey::Notes => directed(compare_text(
            a.notes.as_deref().unwrap_or_default(),
            b.notes.as_deref().unwrap_or_default(),
        )),
        SortKey::DueDate => match (a.due_date, b.due_date) {
            (Some(left), Some(right)) => directed(left.cmp(&right)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}
