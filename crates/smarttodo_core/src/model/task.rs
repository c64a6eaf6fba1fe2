//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical todo record shared by store, manager and views.
//! - Parse user/store text into the closed priority and status sets.
//! - Describe creation input (`NewTask`) and partial edits (`TaskPatch`).
//!
//! # Invariants
//! - `id` is never nil and never reused for another task.
//! - `title` is never blank after trimming.
//! - `priority` and `status` are always one of the enumerated values.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Stable identifier assigned by the task store.
pub type TaskId = Uuid;

const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Validation failures for task input and persisted task state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskValidationError {
    #[error("task title cannot be empty")]
    EmptyTitle,
    #[error("task id cannot be nil")]
    NilId,
    #[error("unknown priority `{0}`; expected Low|Medium|High|Critical")]
    UnknownPriority(String),
    #[error("unknown status `{0}`; expected Open|Completed")]
    UnknownStatus(String),
    #[error("due date `{0}` must use YYYY-MM-DD")]
    InvalidDueDate(String),
    #[error("snoozing by {days} day(s) overflows the calendar")]
    SnoozeOverflow { days: u32 },
}

/// Ordered task priority. Ordering follows urgency, not label text.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    /// Display and storage label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }

    /// Weight used by urgency scoring.
    pub fn weight(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Priority {
    type Err = TaskValidationError;

    /// Case-insensitive; `normal` is accepted as a legacy spelling of `Medium`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "normal" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(TaskValidationError::UnknownPriority(value.to_string())),
        }
    }
}

/// Task lifecycle state. Snoozing changes the due date, never the status.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TaskStatus {
    #[default]
    Open,
    Completed,
}

impl TaskStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Completed => "Completed",
        }
    }

    /// Returns the opposite state, used by the status toggle action.
    pub fn toggled(self) -> Self {
        match self {
            Self::Open => Self::Completed,
            Self::Completed => Self::Open,
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskValidationError;

    /// Case-insensitive; `pending` is accepted as a legacy spelling of `Open`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" | "pending" => Ok(Self::Open),
            "completed" => Ok(Self::Completed),
            _ => Err(TaskValidationError::UnknownStatus(value.to_string())),
        }
    }
}

/// Logical task attributes that can be written to a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskField {
    Title,
    Priority,
    Status,
    DueDate,
    Notes,
}

impl TaskField {
    pub const ALL: [TaskField; 5] = [
        TaskField::Title,
        TaskField::Priority,
        TaskField::Status,
        TaskField::DueDate,
        TaskField::Notes,
    ];

    /// Canonical attribute name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Priority => "priority",
            Self::Status => "status",
            Self::DueDate => "due_date",
            Self::Notes => "notes",
        }
    }
}

impl Display for TaskField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Canonical todo record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: Option<i64>,
    /// Unix epoch milliseconds.
    pub updated_at: Option<i64>,
}

impl Task {
    /// Creates a task under a caller-provided identity.
    ///
    /// Used by stores and by the offline fallback path where the identity is
    /// already known.
    pub fn with_id(id: TaskId, title: impl Into<String>) -> Result<Self, TaskValidationError> {
        let task = Self {
            id,
            title: title.into().trim().to_string(),
            priority: Priority::default(),
            status: TaskStatus::default(),
            due_date: None,
            notes: None,
            created_at: None,
            updated_at: None,
        };
        task.validate()?;
        Ok(task)
    }

    /// Builds a local record from creation input under a fresh identity.
    pub fn from_new(input: &NewTask) -> Result<Self, TaskValidationError> {
        let now = now_epoch_ms();
        let mut task = Self::with_id(Uuid::new_v4(), input.title.as_str())?;
        task.priority = input.priority;
        task.status = input.status;
        task.due_date = input.due_date;
        task.notes = normalize_notes(input.notes.clone());
        task.created_at = Some(now);
        task.updated_at = Some(now);
        Ok(task)
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.id.is_nil() {
            return Err(TaskValidationError::NilId);
        }
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Encodes one attribute as store text. `None` means SQL/JSON null.
    pub fn column_value(&self, field: TaskField) -> Option<String> {
        match field {
            TaskField::Title => Some(self.title.clone()),
            TaskField::Priority => Some(self.priority.label().to_string()),
            TaskField::Status => Some(self.status.label().to_string()),
            TaskField::DueDate => self.due_date.map(format_due_date),
            TaskField::Notes => self.notes.clone(),
        }
    }

    /// Copies one attribute from `other` into `self`.
    pub fn copy_field_from(&mut self, other: &Task, field: TaskField) {
        match field {
            TaskField::Title => self.title = other.title.clone(),
            TaskField::Priority => self.priority = other.priority,
            TaskField::Status => self.status = other.status,
            TaskField::DueDate => self.due_date = other.due_date,
            TaskField::Notes => self.notes = other.notes.clone(),
        }
    }

    /// Compares user-visible content, ignoring identity and timestamps.
    pub fn same_content(&self, other: &Task) -> bool {
        self.same_fields(other, &TaskField::ALL)
    }

    pub fn same_fields(&self, other: &Task, fields: &[TaskField]) -> bool {
        fields
            .iter()
            .all(|field| self.column_value(*field) == other.column_value(*field))
    }
}

/// Creation input for a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        Ok(())
    }

    /// Attributes that carry a value worth persisting on create.
    pub fn persisted_fields(&self) -> Vec<TaskField> {
        let mut fields = vec![TaskField::Title, TaskField::Priority, TaskField::Status];
        if self.due_date.is_some() {
            fields.push(TaskField::DueDate);
        }
        if normalize_notes(self.notes.clone()).is_some() {
            fields.push(TaskField::Notes);
        }
        fields
    }
}

/// Partial edit. `None` leaves the attribute untouched; for the optional
/// attributes `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<Option<NaiveDate>>,
    pub notes: Option<Option<String>>,
}

impl TaskPatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn notes(mut self, notes: Option<String>) -> Self {
        self.notes = Some(notes);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        match &self.title {
            Some(title) if title.trim().is_empty() => Err(TaskValidationError::EmptyTitle),
            _ => Ok(()),
        }
    }

    /// Attributes touched by this patch, in canonical order.
    pub fn fields(&self) -> Vec<TaskField> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push(TaskField::Title);
        }
        if self.priority.is_some() {
            fields.push(TaskField::Priority);
        }
        if self.status.is_some() {
            fields.push(TaskField::Status);
        }
        if self.due_date.is_some() {
            fields.push(TaskField::DueDate);
        }
        if self.notes.is_some() {
            fields.push(TaskField::Notes);
        }
        fields
    }

    /// Applies the patch in place. Call [`TaskPatch::validate`] first.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.trim().to_string();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(notes) = &self.notes {
            task.notes = normalize_notes(notes.clone());
        }
    }
}

/// Parses a user-entered due date. Blank input means "no due date".
///
/// Accepts `YYYY-MM-DD` and ISO date-times (`YYYY-MM-DDTHH:MM:SS`), keeping
/// only the calendar date.
pub fn parse_due_date(value: &str) -> Result<Option<NaiveDate>, TaskValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DUE_DATE_FORMAT) {
        return Ok(Some(date));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .map(|value| Some(value.date()))
        .map_err(|_| TaskValidationError::InvalidDueDate(trimmed.to_string()))
}

pub fn format_due_date(date: NaiveDate) -> String {
    date.format(DUE_DATE_FORMAT).to_string()
}

pub(crate) fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes.filter(|value| !value.trim().is_empty())
}
