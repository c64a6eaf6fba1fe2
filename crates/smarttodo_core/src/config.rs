//! Runtime configuration for core callers.
//!
//! # Responsibility
//! - Load database, snapshot and logging settings from TOML.
//! - Describe accepted store column aliases per logical task attribute.
//!
//! # Invariants
//! - Every attribute has at least one non-blank alias.
//! - Aliases are tried in declaration order; the first accepted one wins.

use crate::model::task::TaskField;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the configured database path.
pub const DB_PATH_ENV: &str = "SMARTTODO_DB_PATH";

const DEFAULT_DB_FILE_NAME: &str = "smarttodo.sqlite3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("field `{field}` needs at least one column alias")]
    EmptyAliasList { field: &'static str },
    #[error("field `{field}` has a blank column alias")]
    BlankAlias { field: &'static str },
}

/// Ordered column aliases per logical attribute.
///
/// The default accepts both `priority` and `priority_level` for priority,
/// covering stores created before and after the column rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldAliases {
    pub title: Vec<String>,
    pub priority: Vec<String>,
    pub status: Vec<String>,
    pub due_date: Vec<String>,
    pub notes: Vec<String>,
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self {
            title: vec!["title".to_string()],
            priority: vec!["priority".to_string(), "priority_level".to_string()],
            status: vec!["status".to_string()],
            due_date: vec!["due_date".to_string()],
            notes: vec!["notes".to_string()],
        }
    }
}

impl FieldAliases {
    pub fn for_field(&self, field: TaskField) -> &[String] {
        match field {
            TaskField::Title => &self.title,
            TaskField::Priority => &self.priority,
            TaskField::Status => &self.status,
            TaskField::DueDate => &self.due_date,
            TaskField::Notes => &self.notes,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for field in TaskField::ALL {
            let aliases = self.for_field(field);
            if aliases.is_empty() {
                return Err(ConfigError::EmptyAliasList {
                    field: field.name(),
                });
            }
            if aliases.iter().any(|alias| alias.trim().is_empty()) {
                return Err(ConfigError::BlankAlias {
                    field: field.name(),
                });
            }
        }
        Ok(())
    }
}

/// Top-level configuration file shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TodoConfig {
    pub db_path: Option<PathBuf>,
    pub snapshot_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub fields: FieldAliases,
}

impl TodoConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.fields.validate()?;
        Ok(config)
    }

    /// Loads a config file. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Resolves the database path: env override, then config, then temp dir.
    pub fn resolve_db_path(&self) -> PathBuf {
        if let Ok(raw) = std::env::var(DB_PATH_ENV) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }
        self.db_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME))
    }
}
