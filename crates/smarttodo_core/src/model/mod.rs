//! Domain model for todo tasks.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - Priority and status never hold free text.

pub mod task;
