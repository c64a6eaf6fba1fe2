//! Task manager: in-memory mirror synchronized with a task store.
//!
//! # Responsibility
//! - Own the in-memory task collection shown by the presentation layer.
//! - Push every mutation to the store, trying configured column aliases in
//!   order, and fall back to in-memory-only state when the store refuses.
//! - Run bulk actions best-effort, collecting per-id failures.
//! - Reconcile the mirror with the store on demand.
//!
//! # Invariants
//! - The mirror reflects every accepted user action (last write wins), even
//!   when persistence fails.
//! - Validation and not-found errors surface to callers; store failures are
//!   logged and reported through [`MutationOutcome`].
//! - Task ids never change once a task is in the mirror.

use crate::config::FieldAliases;
use crate::model::task::{
    now_epoch_ms, NewTask, Priority, Task, TaskField, TaskId, TaskPatch, TaskStatus,
    TaskValidationError,
};
use crate::repo::snapshot::{load_snapshot, save_snapshot, SnapshotError};
use crate::repo::task_repo::{ColumnWrite, StoreError, StoreResult, TaskStore};
use chrono::{Days, NaiveDate};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

pub type ManagerResult<T> = Result<T, ManagerError>;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Validation(#[from] TaskValidationError),
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("task store failure: {0}")]
    Persistence(#[from] StoreError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Where a mutation landed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    /// Every touched attribute was accepted by the store.
    pub applied_to_store: bool,
    pub applied_in_memory: bool,
    /// Attributes the store refused under every alias; kept in memory only.
    pub rejected_fields: Vec<TaskField>,
    /// Store failure that stopped persistence, if any.
    pub store_error: Option<String>,
}

impl MutationOutcome {
    fn durable() -> Self {
        Self {
            applied_to_store: true,
            applied_in_memory: true,
            ..Self::default()
        }
    }

    fn memory_only(rejected_fields: Vec<TaskField>, store_error: Option<String>) -> Self {
        Self {
            applied_to_store: false,
            applied_in_memory: true,
            rejected_fields,
            store_error,
        }
    }

    /// User-facing status line derived from the outcome alone.
    pub fn message(&self) -> String {
        match (self.applied_in_memory, self.applied_to_store) {
            (false, _) => "Change was not applied.".to_string(),
            (true, true) => "Saved.".to_string(),
            (true, false) if self.store_error.is_none() && !self.rejected_fields.is_empty() => {
                let fields = self
                    .rejected_fields
                    .iter()
                    .map(|field| field.name())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Saved; {fields} kept on this device only.")
            }
            (true, false) => "Saved on this device only; the task store is unavailable.".to_string(),
        }
    }
}

/// Result of a single-task mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMutation {
    /// Task state after the mutation (for deletes, the removed task).
    pub task: Task,
    pub outcome: MutationOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkFailure {
    /// The id is not in the mirror.
    NotFound(TaskId),
    /// Applied in memory but the store did not accept it.
    NotPersisted { id: TaskId, reason: String },
}

impl BulkFailure {
    pub fn id(&self) -> TaskId {
        match self {
            Self::NotFound(id) | Self::NotPersisted { id, .. } => *id,
        }
    }
}

/// Per-id results of a bulk action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub succeeded: Vec<TaskId>,
    pub failed: Vec<BulkFailure>,
}

impl BulkReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<TaskId> {
        self.failed.iter().map(BulkFailure::id).collect()
    }

    fn record(&mut self, id: TaskId, result: ManagerResult<TaskMutation>) {
        match result {
            Ok(mutation) if mutation.outcome.applied_to_store => self.succeeded.push(id),
            Ok(mutation) => {
                let reason = mutation
                    .outcome
                    .store_error
                    .clone()
                    .unwrap_or_else(|| mutation.outcome.message());
                self.failed.push(BulkFailure::NotPersisted { id, reason });
            }
            Err(ManagerError::NotFound(_)) => self.failed.push(BulkFailure::NotFound(id)),
            Err(err) => self.failed.push(BulkFailure::NotPersisted {
                id,
                reason: err.to_string(),
            }),
        }
    }
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Mirror-only tasks written to the store.
    pub pushed: usize,
    /// Store-only tasks added to the mirror.
    pub pulled: usize,
    /// Mirror tasks overwritten by differing store rows.
    pub updated: usize,
}

/// Alias cursor per attribute while writing one row.
struct WritePlan<'a> {
    aliases: &'a FieldAliases,
    entries: Vec<(TaskField, usize)>,
    dropped: Vec<TaskField>,
}

impl<'a> WritePlan<'a> {
    fn new(aliases: &'a FieldAliases, fields: &[TaskField]) -> Self {
        Self {
            aliases,
            entries: fields.iter().map(|field| (*field, 0)).collect(),
            dropped: Vec::new(),
        }
    }

    fn writes(&self, task: &Task) -> Vec<ColumnWrite> {
        self.entries
            .iter()
            .map(|(field, index)| {
                ColumnWrite::new(
                    self.aliases.for_field(*field)[*index].clone(),
                    task.column_value(*field),
                )
            })
            .collect()
    }

    /// Moves the attribute written as `column` to its next alias, or drops it.
    ///
    /// Returns `false` when the row cannot be written at all: the column is
    /// not part of this plan, or the title ran out of aliases.
    fn advance(&mut self, column: &str) -> bool {
        let Some(position) = self
            .entries
            .iter()
            .position(|(field, index)| self.aliases.for_field(*field)[*index] == column)
        else {
            return false;
        };

        let (field, index) = &mut self.entries[position];
        *index += 1;
        if *index < self.aliases.for_field(*field).len() {
            return true;
        }
        if *field == TaskField::Title {
            return false;
        }
        let (field, _) = self.entries.remove(position);
        self.dropped.push(field);
        true
    }
}

/// In-memory task cache coordinating the presentation layer and a store.
pub struct TaskManager<S: TaskStore> {
    store: S,
    aliases: FieldAliases,
    tasks: Vec<Task>,
    snapshot_path: Option<PathBuf>,
}

impl<S: TaskStore> TaskManager<S> {
    /// Creates a manager with an empty mirror. Call [`TaskManager::load`]
    /// to populate it.
    pub fn new(store: S, aliases: FieldAliases) -> Self {
        Self {
            store,
            aliases,
            tasks: Vec::new(),
            snapshot_path: None,
        }
    }

    /// Mirrors every mutation into a JSON snapshot at `path`.
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read-only view of the mirror in creation order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Replaces the mirror with the store contents.
    ///
    /// Snapshot tasks the store does not know yet (created while offline) are
    /// kept after the store rows so the next sync can push them. When the
    /// store is unreachable and a snapshot is configured, the snapshot is
    /// loaded instead; otherwise the store error is returned.
    pub fn load(&mut self) -> ManagerResult<usize> {
        match self.store.list() {
            Ok(tasks) => {
                self.tasks = tasks;
                let pending = self.merge_snapshot_only();
                info!(
                    "event=tasks_load module=manager status=ok source=store count={} pending={pending}",
                    self.tasks.len()
                );
                self.write_snapshot();
                Ok(self.tasks.len())
            }
            Err(err) => {
                let Some(path) = self.snapshot_path.as_deref() else {
                    warn!("event=tasks_load module=manager status=error source=store error={err}");
                    return Err(err.into());
                };
                warn!(
                    "event=tasks_load module=manager status=fallback source=snapshot error={err}"
                );
                self.tasks = load_snapshot(path)?;
                Ok(self.tasks.len())
            }
        }
    }

    /// Creates a task, persisting whatever attributes the store accepts.
    ///
    /// # Errors
    /// - `Validation` when the title is blank.
    pub fn add_task(&mut self, input: NewTask) -> ManagerResult<TaskMutation> {
        input.validate()?;
        let local = Task::from_new(&input)?;
        let fields = input.persisted_fields();

        let (stored, dropped) =
            self.write_row(&local, &fields, |writes| self.store.create(writes));
        let (task, outcome) = match stored {
            Ok(mut task) => {
                for field in &dropped {
                    task.copy_field_from(&local, *field);
                }
                if !dropped.is_empty() {
                    warn!(
                        "event=task_create module=manager status=partial task_id={} rejected_fields={}",
                        task.id,
                        field_list(&dropped)
                    );
                }
                let outcome = if dropped.is_empty() {
                    MutationOutcome::durable()
                } else {
                    MutationOutcome::memory_only(dropped, None)
                };
                (task, outcome)
            }
            Err(err) => {
                warn!(
                    "event=task_create module=manager status=fallback task_id={} error={err}",
                    local.id
                );
                (local, MutationOutcome::memory_only(dropped, Some(err.to_string())))
            }
        };

        self.tasks.push(task.clone());
        self.write_snapshot();
        Ok(TaskMutation { task, outcome })
    }

    /// Applies a partial edit to one task.
    ///
    /// The mirror is updated first; each touched attribute is then written
    /// under its aliases until one is accepted.
    ///
    /// # Errors
    /// - `Validation` when the patch would blank the title.
    /// - `NotFound` when `id` is not in the mirror.
    pub fn update_task(&mut self, id: TaskId, patch: TaskPatch) -> ManagerResult<TaskMutation> {
        patch.validate()?;
        let index = self.position(id)?;

        let task = &mut self.tasks[index];
        patch.apply_to(task);
        task.updated_at = Some(now_epoch_ms());
        let task = task.clone();

        let outcome = self.persist_fields(&task, &patch.fields());
        self.write_snapshot();
        Ok(TaskMutation { task, outcome })
    }

    pub fn set_priority(&mut self, id: TaskId, priority: Priority) -> ManagerResult<TaskMutation> {
        self.update_task(id, TaskPatch::default().priority(priority))
    }

    pub fn complete_task(&mut self, id: TaskId) -> ManagerResult<TaskMutation> {
        self.update_task(id, TaskPatch::default().status(TaskStatus::Completed))
    }

    /// Flips Open and Completed.
    pub fn toggle_status(&mut self, id: TaskId) -> ManagerResult<TaskMutation> {
        let status = self.tasks[self.position(id)?].status.toggled();
        self.update_task(id, TaskPatch::default().status(status))
    }

    /// Pushes the due date `days` forward, starting from `today` when the
    /// task has no due date.
    pub fn snooze(&mut self, id: TaskId, days: u32, today: NaiveDate) -> ManagerResult<TaskMutation> {
        let base = self.tasks[self.position(id)?].due_date.unwrap_or(today);
        let due = base
            .checked_add_days(Days::new(u64::from(days)))
            .ok_or(TaskValidationError::SnoozeOverflow { days })?;
        self.update_task(id, TaskPatch::default().due_date(Some(due)))
    }

    /// Removes a task from the store, then from the mirror.
    ///
    /// The mirror entry is dropped even when the store delete fails.
    pub fn delete_task(&mut self, id: TaskId) -> ManagerResult<TaskMutation> {
        let index = self.position(id)?;
        let store_result = self.store.delete(id);
        let task = self.tasks.remove(index);

        let outcome = match store_result {
            Ok(()) => MutationOutcome::durable(),
            Err(err) => {
                warn!("event=task_delete module=manager status=fallback task_id={id} error={err}");
                MutationOutcome::memory_only(Vec::new(), Some(err.to_string()))
            }
        };
        self.write_snapshot();
        Ok(TaskMutation { task, outcome })
    }

    /// Deletes each id independently; failures never stop the remaining ids.
    pub fn bulk_delete(&mut self, ids: &[TaskId]) -> BulkReport {
        let mut report = BulkReport::default();
        for id in ids {
            let result = self.delete_task(*id);
            report.record(*id, result);
        }
        log_bulk("bulk_delete", &report);
        report
    }

    /// Marks each id completed through the update path.
    pub fn bulk_complete(&mut self, ids: &[TaskId]) -> BulkReport {
        let mut report = BulkReport::default();
        for id in ids {
            let result = self.complete_task(*id);
            report.record(*id, result);
        }
        log_bulk("bulk_complete", &report);
        report
    }

    /// Reconciles the mirror with the store.
    ///
    /// Store-only rows are pulled in. Rows present on both sides are
    /// overwritten from the store only when `prefer_local` is false, and only
    /// in the attributes the store has columns for. Mirror-only
    /// tasks are pushed under their existing ids; push failures are logged and
    /// skipped.
    ///
    /// # Errors
    /// - `Persistence` when the store cannot be listed.
    pub fn sync_with_store(&mut self, prefer_local: bool) -> ManagerResult<SyncSummary> {
        let remote = self.store.list()?;
        let remote_ids = remote.iter().map(|task| task.id).collect::<HashSet<_>>();
        let storable = self.storable_fields();
        let mut summary = SyncSummary::default();

        for row in remote {
            match self.tasks.iter_mut().find(|task| task.id == row.id) {
                Some(local) => {
                    if !prefer_local && !local.same_fields(&row, &storable) {
                        for field in &storable {
                            local.copy_field_from(&row, *field);
                        }
                        local.updated_at = row.updated_at;
                        summary.updated += 1;
                    }
                }
                None => {
                    self.tasks.push(row);
                    summary.pulled += 1;
                }
            }
        }

        let local_only = self
            .tasks
            .iter()
            .filter(|task| !remote_ids.contains(&task.id))
            .cloned()
            .collect::<Vec<_>>();
        for task in local_only {
            let fields = persisted_fields_of(&task);
            let (stored, dropped) =
                self.write_row(&task, &fields, |writes| self.store.import(&task, writes));
            match stored {
                Ok(_) => {
                    summary.pushed += 1;
                    if !dropped.is_empty() {
                        debug!(
                            "event=task_push module=manager status=partial task_id={} rejected_fields={}",
                            task.id,
                            field_list(&dropped)
                        );
                    }
                }
                Err(err) => warn!(
                    "event=task_push module=manager status=error task_id={} error={err}",
                    task.id
                ),
            }
        }

        info!(
            "event=tasks_sync module=manager status=ok prefer_local={prefer_local} pushed={} pulled={} updated={}",
            summary.pushed, summary.pulled, summary.updated
        );
        self.write_snapshot();
        Ok(summary)
    }

    /// Appends snapshot tasks whose ids are missing from the mirror. An
    /// unreadable snapshot is logged and skipped.
    fn merge_snapshot_only(&mut self) -> usize {
        let Some(path) = self.snapshot_path.as_deref() else {
            return 0;
        };
        let saved = match load_snapshot(path) {
            Ok(saved) => saved,
            Err(err) => {
                warn!("event=snapshot_read module=manager status=error error={err}");
                return 0;
            }
        };
        let known = self.tasks.iter().map(|task| task.id).collect::<HashSet<_>>();
        let before = self.tasks.len();
        self.tasks
            .extend(saved.into_iter().filter(|task| !known.contains(&task.id)));
        self.tasks.len() - before
    }

    /// Attributes the store has a column for under at least one alias.
    /// The rest live in the mirror only.
    fn storable_fields(&self) -> Vec<TaskField> {
        TaskField::ALL
            .into_iter()
            .filter(|field| {
                self.aliases
                    .for_field(*field)
                    .iter()
                    .any(|column| self.store.accepts_column(column))
            })
            .collect()
    }

    fn position(&self, id: TaskId) -> ManagerResult<usize> {
        self.tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(ManagerError::NotFound(id))
    }

    /// Writes a whole row, retrying under the next alias whenever the store
    /// rejects a column. Returns the store result and the attributes dropped
    /// after exhausting their aliases.
    fn write_row(
        &self,
        task: &Task,
        fields: &[TaskField],
        write: impl Fn(&[ColumnWrite]) -> StoreResult<Task>,
    ) -> (StoreResult<Task>, Vec<TaskField>) {
        let mut plan = WritePlan::new(&self.aliases, fields);
        loop {
            match write(&plan.writes(task)) {
                Err(StoreError::RejectedField { column }) => {
                    debug!("event=store_write module=manager status=rejected column={column}");
                    if !plan.advance(&column) {
                        return (Err(StoreError::RejectedField { column }), plan.dropped);
                    }
                }
                result => return (result, plan.dropped),
            }
        }
    }

    /// Persists the listed attributes of an already-mirrored task one at a
    /// time, so one refused attribute does not block the others.
    fn persist_fields(&self, task: &Task, fields: &[TaskField]) -> MutationOutcome {
        let mut rejected = Vec::new();

        for field in fields {
            let value = task.column_value(*field);
            let mut accepted = false;
            for alias in self.aliases.for_field(*field) {
                match self
                    .store
                    .update(task.id, &[ColumnWrite::new(alias.as_str(), value.clone())])
                {
                    Ok(_) => {
                        accepted = true;
                        break;
                    }
                    Err(StoreError::RejectedField { column }) => {
                        debug!(
                            "event=task_update module=manager status=rejected task_id={} field={field} column={column}",
                            task.id
                        );
                    }
                    Err(err) => {
                        warn!(
                            "event=task_update module=manager status=fallback task_id={} field={field} error={err}",
                            task.id
                        );
                        return MutationOutcome::memory_only(rejected, Some(err.to_string()));
                    }
                }
            }
            if !accepted {
                warn!(
                    "event=task_update module=manager status=fallback task_id={} field={field} error=all_aliases_rejected",
                    task.id
                );
                rejected.push(*field);
            }
        }

        if rejected.is_empty() {
            MutationOutcome::durable()
        } else {
            MutationOutcome::memory_only(rejected, None)
        }
    }

    fn write_snapshot(&self) {
        let Some(path) = self.snapshot_path.as_deref() else {
            return;
        };
        if let Err(err) = save_snapshot(path, &self.tasks) {
            warn!("event=snapshot_save module=manager status=error error={err}");
        }
    }
}

fn persisted_fields_of(task: &Task) -> Vec<TaskField> {
    TaskField::ALL
        .into_iter()
        .filter(|field| task.column_value(*field).is_some())
        .collect()
}

fn field_list(fields: &[TaskField]) -> String {
    fields
        .iter()
        .map(|field| field.name())
        .collect::<Vec<_>>()
        .join(",")
}

fn log_bulk(action: &str, report: &BulkReport) {
    if report.is_complete() {
        info!(
            "event={action} module=manager status=ok succeeded={}",
            report.succeeded.len()
        );
    } else {
        warn!(
            "event={action} module=manager status=partial succeeded={} failed={}",
            report.succeeded.len(),
            report.failed.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{MutationOutcome, WritePlan};
    use crate::config::FieldAliases;
    use crate::model::task::TaskField;

    #[test]
    fn write_plan_walks_priority_aliases_then_drops_the_field() {
        let aliases = FieldAliases::default();
        let mut plan = WritePlan::new(&aliases, &[TaskField::Title, TaskField::Priority]);

        assert!(plan.advance("priority"));
        assert!(plan.advance("priority_level"));
        assert_eq!(plan.dropped, vec![TaskField::Priority]);
        assert_eq!(plan.entries, vec![(TaskField::Title, 0)]);
    }

    #[test]
    fn write_plan_gives_up_when_title_is_rejected() {
        let aliases = FieldAliases::default();
        let mut plan = WritePlan::new(&aliases, &[TaskField::Title]);
        assert!(!plan.advance("title"));
        assert!(!plan.advance("colour"));
    }

    #[test]
    fn outcome_message_names_fields_kept_locally() {
        let outcome = MutationOutcome::memory_only(vec![TaskField::Notes], None);
        assert_eq!(outcome.message(), "Saved; notes kept on this device only.");
        assert_eq!(MutationOutcome::durable().message(), "Saved.");
    }
}
