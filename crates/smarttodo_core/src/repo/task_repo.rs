//! Task store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/get/list/update/delete over the canonical `tasks` table.
//! - Reject writes naming columns the connected schema does not have.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - The store assigns task identities on `create`; `import` keeps a known one.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Writes only touch columns discovered from `PRAGMA table_info`.

use crate::config::FieldAliases;
use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::task::{
    now_epoch_ms, Priority, Task, TaskField, TaskId, TaskStatus, TaskValidationError,
};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

const TASKS_TABLE: &str = "tasks";
const KEY_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

pub type StoreResult<T> = Result<T, StoreError>;

/// Store error for task persistence and query operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] TaskValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("task already exists: {0}")]
    AlreadyExists(TaskId),
    #[error("store rejected field `{column}`")]
    RejectedField { column: String },
    #[error("invalid persisted task data: {0}")]
    InvalidData(String),
    #[error(
        "connection schema is not initialized: expected version {expected_version}, found {actual_version}"
    )]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("required table `{0}` is missing")]
    MissingRequiredTable(&'static str),
    #[error("required column `{table}.{column}` is missing")]
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One physical column write. `value = None` stores null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnWrite {
    pub column: String,
    pub value: Option<String>,
}

impl ColumnWrite {
    pub fn new(column: impl Into<String>, value: Option<String>) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// Task persistence contract.
///
/// Implementations may reject columns they do not know with
/// [`StoreError::RejectedField`]; callers are expected to fall back to an
/// alternate alias or to in-memory state.
pub trait TaskStore {
    fn create(&self, columns: &[ColumnWrite]) -> StoreResult<Task>;
    /// Inserts a row under an identity that already exists elsewhere.
    fn import(&self, task: &Task, columns: &[ColumnWrite]) -> StoreResult<Task>;
    fn get(&self, id: TaskId) -> StoreResult<Option<Task>>;
    /// Lists every task in creation order.
    fn list(&self) -> StoreResult<Vec<Task>>;
    fn update(&self, id: TaskId, columns: &[ColumnWrite]) -> StoreResult<Task>;
    fn delete(&self, id: TaskId) -> StoreResult<()>;

    /// Returns whether writes to `column` would be accepted.
    fn accepts_column(&self, _column: &str) -> bool {
        true
    }
}

/// Physical columns resolved against the connected schema.
#[derive(Debug, Clone)]
struct ColumnLayout {
    writable: HashSet<String>,
    title: String,
    status: String,
    priority: Option<String>,
    due_date: Option<String>,
    notes: Option<String>,
}

impl ColumnLayout {
    fn select_sql(&self) -> String {
        format!(
            "SELECT
                id,
                {} AS title,
                {} AS status,
                {} AS priority,
                {} AS due_date,
                {} AS notes,
                created_at,
                updated_at
            FROM {TASKS_TABLE}",
            quote_ident(&self.title),
            quote_ident(&self.status),
            optional_column_sql(self.priority.as_deref()),
            optional_column_sql(self.due_date.as_deref()),
            optional_column_sql(self.notes.as_deref()),
        )
    }
}

/// SQLite-backed task store.
pub struct SqliteTaskStore {
    conn: Connection,
    layout: ColumnLayout,
    select_sql: String,
}

impl SqliteTaskStore {
    /// Wraps a migrated connection after validating its schema.
    ///
    /// Optional attributes (priority under any alias, due date, notes) may be
    /// missing; writes naming them are then rejected.
    pub fn try_new(conn: Connection, aliases: &FieldAliases) -> StoreResult<Self> {
        let actual_version = current_user_version(&conn)?;
        let expected_version = latest_version();
        if actual_version == 0 {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        if actual_version > expected_version {
            return Err(StoreError::Db(DbError::UnsupportedSchemaVersion {
                db_version: actual_version,
                latest_supported: expected_version,
            }));
        }

        let table_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [TASKS_TABLE],
            |row| row.get(0),
        )?;
        if !table_exists {
            return Err(StoreError::MissingRequiredTable(TASKS_TABLE));
        }

        let columns = table_columns(&conn)?;
        for required in KEY_COLUMNS {
            if !columns.contains(required) {
                return Err(StoreError::MissingRequiredColumn {
                    table: TASKS_TABLE,
                    column: required,
                });
            }
        }

        let resolve = |field: TaskField| {
            aliases
                .for_field(field)
                .iter()
                .find(|alias| columns.contains(alias.as_str()))
                .cloned()
        };
        let title = resolve(TaskField::Title).ok_or(StoreError::MissingRequiredColumn {
            table: TASKS_TABLE,
            column: "title",
        })?;
        let status = resolve(TaskField::Status).ok_or(StoreError::MissingRequiredColumn {
            table: TASKS_TABLE,
            column: "status",
        })?;

        let layout = ColumnLayout {
            writable: columns
                .iter()
                .filter(|column| !KEY_COLUMNS.contains(&column.as_str()))
                .cloned()
                .collect(),
            title,
            status,
            priority: resolve(TaskField::Priority),
            due_date: resolve(TaskField::DueDate),
            notes: resolve(TaskField::Notes),
        };
        let select_sql = layout.select_sql();

        Ok(Self {
            conn,
            layout,
            select_sql,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn check_columns(&self, columns: &[ColumnWrite]) -> StoreResult<()> {
        match columns
            .iter()
            .find(|write| !self.accepts_column(write.column.as_str()))
        {
            Some(write) => Err(StoreError::RejectedField {
                column: write.column.clone(),
            }),
            None => Ok(()),
        }
    }

    fn insert_row(
        &self,
        id: TaskId,
        created_at: i64,
        updated_at: i64,
        columns: &[ColumnWrite],
    ) -> StoreResult<Task> {
        self.check_columns(columns)?;

        let mut names = vec![
            "id".to_string(),
            "created_at".to_string(),
            "updated_at".to_string(),
        ];
        let mut values = vec![
            Value::Text(id.to_string()),
            Value::Integer(created_at),
            Value::Integer(updated_at),
        ];
        for write in columns {
            names.push(quote_ident(&write.column));
            values.push(text_value(write.value.as_deref()));
        }
        let placeholders = (1..=values.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");

        self.conn.execute(
            &format!(
                "INSERT INTO {TASKS_TABLE} ({}) VALUES ({placeholders});",
                names.join(", ")
            ),
            params_from_iter(values),
        )?;

        self.get(id)?.ok_or(StoreError::InvalidData(format!(
            "inserted task {id} missing on read-back"
        )))
    }
}

impl TaskStore for SqliteTaskStore {
    fn create(&self, columns: &[ColumnWrite]) -> StoreResult<Task> {
        let now = now_epoch_ms();
        self.insert_row(Uuid::new_v4(), now, now, columns)
    }

    fn import(&self, task: &Task, columns: &[ColumnWrite]) -> StoreResult<Task> {
        task.validate()?;
        if self.get(task.id)?.is_some() {
            return Err(StoreError::AlreadyExists(task.id));
        }
        let now = now_epoch_ms();
        let created_at = task.created_at.unwrap_or(now);
        self.insert_row(
            task.id,
            created_at,
            task.updated_at.unwrap_or(created_at),
            columns,
        )
    }

    fn get(&self, id: TaskId) -> StoreResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE id = ?1;", self.select_sql))?;
        let row = stmt
            .query_row([id.to_string()], |row| Ok(parse_task_row(row)))
            .optional()?;
        row.transpose()
    }

    fn list(&self) -> StoreResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} ORDER BY created_at ASC, rowid ASC;",
            self.select_sql
        ))?;
        let mut rows = stmt.query([])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn update(&self, id: TaskId, columns: &[ColumnWrite]) -> StoreResult<Task> {
        self.check_columns(columns)?;

        let mut assignments = columns
            .iter()
            .enumerate()
            .map(|(index, write)| format!("{} = ?{}", quote_ident(&write.column), index + 1))
            .collect::<Vec<_>>();
        assignments.push("updated_at = (strftime('%s', 'now') * 1000)".to_string());

        let mut values = columns
            .iter()
            .map(|write| text_value(write.value.as_deref()))
            .collect::<Vec<_>>();
        values.push(Value::Text(id.to_string()));

        let changed = self.conn.execute(
            &format!(
                "UPDATE {TASKS_TABLE} SET {} WHERE id = ?{};",
                assignments.join(", "),
                values.len()
            ),
            params_from_iter(values),
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }

        self.get(id)?.ok_or(StoreError::NotFound(id))
    }

    fn delete(&self, id: TaskId) -> StoreResult<()> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {TASKS_TABLE} WHERE id = ?1;"),
            params![id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn accepts_column(&self, column: &str) -> bool {
        self.layout.writable.contains(column)
    }
}

fn table_columns(conn: &Connection) -> StoreResult<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({TASKS_TABLE});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = HashSet::new();
    while let Some(row) = rows.next()? {
        columns.insert(row.get::<_, String>("name")?);
    }
    Ok(columns)
}

fn parse_task_row(row: &Row<'_>) -> StoreResult<Task> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid value `{id_text}` in tasks.id"))
    })?;

    let status_text: String = row.get("status")?;
    let status = status_text
        .parse::<TaskStatus>()
        .map_err(|err| StoreError::InvalidData(err.to_string()))?;

    let priority: Priority = match row.get::<_, Option<String>>("priority")? {
        Some(value) => value
            .parse()
            .map_err(|err: TaskValidationError| StoreError::InvalidData(err.to_string()))?,
        None => Priority::default(),
    };

    let due_date = match row.get::<_, Option<String>>("due_date")? {
        Some(value) if value.trim().is_empty() => None,
        Some(value) => Some(parse_stored_date(&value)?),
        None => None,
    };

    let mut task = Task::with_id(id, row.get::<_, String>("title")?)?;
    task.priority = priority;
    task.status = status;
    task.due_date = due_date;
    task.notes = row.get("notes")?;
    task.created_at = row.get("created_at")?;
    task.updated_at = row.get("updated_at")?;
    Ok(task)
}

fn parse_stored_date(value: &str) -> StoreResult<NaiveDate> {
    // Older rows may carry a full ISO timestamp.
    let date_part = value.split('T').next().unwrap_or(value);
    NaiveDate::parse_from_str(date_part.trim(), "%Y-%m-%d").map_err(|_| {
        StoreError::InvalidData(format!("invalid due date `{value}` in tasks.due_date"))
    })
}

fn text_value(value: Option<&str>) -> Value {
    match value {
        Some(text) => Value::Text(text.to_string()),
        None => Value::Null,
    }
}

fn optional_column_sql(column: Option<&str>) -> String {
    column.map_or_else(|| "NULL".to_string(), quote_ident)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
