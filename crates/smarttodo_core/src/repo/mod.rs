//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the task store contract used by the manager.
//! - Isolate SQLite query details from service orchestration.
//! - Keep the local JSON snapshot format in one place.
//!
//! # Invariants
//! - Store APIs return semantic errors (`NotFound`, `RejectedField`) in
//!   addition to DB transport errors.

pub mod snapshot;
pub mod task_repo;
