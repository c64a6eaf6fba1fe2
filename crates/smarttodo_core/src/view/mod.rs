//! Read-only projections over the task list.
//!
//! # Responsibility
//! - Classify tasks by due-date proximity for row coloring.
//! - Filter and sort the visible task sequence.
//! - Rank tasks by urgency and answer deadline queries.
//!
//! # Invariants
//! - Nothing in this module mutates its input.
//! - Every function is deterministic for a given `today`.

pub mod classify;
pub mod filter_sort;
pub mod queries;
