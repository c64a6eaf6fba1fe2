//! Core domain logic for Smart To-Do.
//! This crate is the single source of truth for task invariants.

pub mod analytics;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod view;

pub use analytics::{completed_per_day, priority_distribution, summarize, CompletionSummary};
pub use config::{ConfigError, FieldAliases, TodoConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::task::{
    parse_due_date, NewTask, Priority, Task, TaskField, TaskId, TaskPatch, TaskStatus,
    TaskValidationError,
};
pub use repo::snapshot::{load_snapshot, save_snapshot, SnapshotError};
pub use repo::task_repo::{ColumnWrite, SqliteTaskStore, StoreError, StoreResult, TaskStore};
pub use service::task_manager::{
    BulkFailure, BulkReport, ManagerError, ManagerResult, MutationOutcome, SyncSummary,
    TaskManager, TaskMutation,
};
pub use view::classify::{classify, Category};
pub use view::filter_sort::{view, SortKey, UnknownSortKey};
pub use view::queries::{
    overdue_tasks, sorted_by_urgency, tasks_by_priority, upcoming_deadlines, urgency_score,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
