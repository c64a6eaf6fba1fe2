//! Deadline queries and urgency ranking.

use crate::model::task::{Priority, Task};
use crate::view::classify::days_until_due;
use chrono::{Days, NaiveDate};

/// Deadlines further out than this contribute nothing to urgency.
const URGENCY_WINDOW_DAYS: f64 = 30.0;

/// Open tasks whose due date is strictly before `today`.
pub fn overdue_tasks(tasks: &[Task], today: NaiveDate) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|task| !task.is_completed() && task.due_date.is_some_and(|due| due < today))
        .collect()
}

/// Open tasks due within `days` days of `today` (inclusive), soonest first.
pub fn upcoming_deadlines(tasks: &[Task], today: NaiveDate, days: u32) -> Vec<&Task> {
    let end = today
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX);
    let mut upcoming = tasks
        .iter()
        .filter(|task| {
            !task.is_completed()
                && task
                    .due_date
                    .is_some_and(|due| today <= due && due <= end)
        })
        .collect::<Vec<_>>();
    upcoming.sort_by_key(|task| task.due_date);
    upcoming
}

pub fn tasks_by_priority(tasks: &[Task], priority: Priority) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|task| task.priority == priority)
        .collect()
}

/// Priority weight scaled by deadline proximity; higher is more urgent.
///
/// `weight * (1 + factor)` where factor is 1 for tasks due today or earlier,
/// shrinks linearly to 0 over the next 30 days, and is 0 for undated tasks.
/// Rounded to three decimals.
pub fn urgency_score(task: &Task, today: NaiveDate) -> f64 {
    let weight = f64::from(task.priority.weight());
    let Some(days) = days_until_due(task, today) else {
        return weight;
    };
    let factor = if days <= 0 {
        1.0
    } else {
        ((URGENCY_WINDOW_DAYS - days as f64) / URGENCY_WINDOW_DAYS).max(0.0)
    };
    (weight * (1.0 + factor) * 1000.0).round() / 1000.0
}

/// All tasks ordered by descending urgency; ties keep input order.
pub fn sorted_by_urgency(tasks: &[Task], today: NaiveDate) -> Vec<&Task> {
    let mut ranked = tasks
        .iter()
        .map(|task| (urgency_score(task, today), task))
        .collect::<Vec<_>>();
    ranked.sort_by(|(left, _), (right, _)| right.total_cmp(left));
    ranked.into_iter().map(|(_, task)| task).collect()
}
