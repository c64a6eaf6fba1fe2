//! Productivity analytics over the task mirror.
//!
//! # Responsibility
//! - Count completions per day inside a trailing window.
//! - Report how tasks spread across priorities.
//! - Summarize completion counts for the analytics panel.
//!
//! # Invariants
//! - Completion day is derived from `updated_at` in UTC.
//! - Days without completions are absent from the per-day map.

use crate::model::task::{Priority, Task};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Descriptive statistics over per-day completion counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompletionSummary {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub total: u32,
}

/// Completed tasks per day for the `days_back` days ending at `today`.
pub fn completed_per_day(
    tasks: &[Task],
    today: NaiveDate,
    days_back: u32,
) -> BTreeMap<NaiveDate, u32> {
    let mut counts = BTreeMap::new();
    if days_back == 0 {
        return counts;
    }
    let start = today
        .checked_sub_days(Days::new(u64::from(days_back - 1)))
        .unwrap_or(NaiveDate::MIN);

    for task in tasks.iter().filter(|task| task.is_completed()) {
        let Some(day) = task
            .updated_at
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|stamp| stamp.date_naive())
        else {
            continue;
        };
        if start <= day && day <= today {
            *counts.entry(day).or_insert(0) += 1;
        }
    }
    counts
}

/// Task count per priority. Every priority is present, possibly with zero.
pub fn priority_distribution(tasks: &[Task]) -> BTreeMap<Priority, usize> {
    let mut distribution = Priority::ALL
        .into_iter()
        .map(|priority| (priority, 0))
        .collect::<BTreeMap<_, _>>();
    for task in tasks {
        *distribution.entry(task.priority).or_insert(0) += 1;
    }
    distribution
}

/// Returns `None` when there is no completion data.
pub fn summarize(counts: &BTreeMap<NaiveDate, u32>) -> Option<CompletionSummary> {
    if counts.is_empty() {
        return None;
    }

    let mut values = counts.values().copied().collect::<Vec<_>>();
    values.sort_unstable();
    let len = values.len() as f64;
    let total = values.iter().sum::<u32>();
    let mean = f64::from(total) / len;

    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        (f64::from(values[mid - 1]) + f64::from(values[mid])) / 2.0
    } else {
        f64::from(values[mid])
    };

    let variance = values
        .iter()
        .map(|value| (f64::from(*value) - mean).powi(2))
        .sum::<f64>()
        / len;

    Some(CompletionSummary {
        mean,
        median,
        std_dev: variance.sqrt(),
        total,
    })
}
