//! JSON snapshot of the in-memory task mirror.
//!
//! # Responsibility
//! - Persist the manager's mirror to a local file after mutations.
//! - Restore the mirror when the task store is unreachable at startup.
//!
//! # Invariants
//! - Writes go through a sibling temp file and a rename, so a crash never
//!   leaves a truncated snapshot behind.
//! - A missing snapshot file reads as an empty task list.

use crate::model::task::Task;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to access snapshot `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot `{path}` is not valid task JSON: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn save_snapshot(path: &Path, tasks: &[Task]) -> Result<(), SnapshotError> {
    let io_error = |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }

    let json = serde_json::to_vec_pretty(tasks).map_err(|source| SnapshotError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json).map_err(io_error)?;
    std::fs::rename(&tmp_path, path).map_err(io_error)?;
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<Vec<Task>, SnapshotError> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&raw).map_err(|source| SnapshotError::Format {
        path: path.to_path_buf(),
        source,
    })
}
