use chrono::NaiveDate;
use smarttodo_core::{classify, view, Category, Priority, SortKey, Task, TaskStatus};
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn task(title: &str) -> Task {
    Task::with_id(Uuid::new_v4(), title).unwrap()
}

fn due(title: &str, due_date: Option<NaiveDate>) -> Task {
    let mut task = task(title);
    task.due_date = due_date;
    task
}

fn titles(tasks: &[&Task]) -> Vec<String> {
    tasks.iter().map(|task| task.title.clone()).collect()
}

#[test]
fn classify_thresholds_around_today() {
    let today = date(2024, 1, 10);
    let cases = [
        (date(2024, 1, 7), Category::VeryOverdue),
        (date(2024, 1, 8), Category::VeryOverdue),
        (date(2024, 1, 9), Category::Overdue),
        (date(2024, 1, 10), Category::Overdue),
        (date(2024, 1, 11), Category::DueSoon),
        (date(2024, 1, 13), Category::DueSoon),
        (date(2024, 1, 14), Category::Upcoming),
    ];

    for (due_date, expected) in cases {
        assert_eq!(
            classify(&due("t", Some(due_date)), today),
            expected,
            "due {due_date}"
        );
    }
}

#[test]
fn completed_wins_over_any_due_date() {
    let today = date(2024, 1, 10);
    for due_date in [None, Some(date(2023, 1, 1)), Some(date(2024, 1, 11))] {
        let mut done = due("done", due_date);
        done.status = TaskStatus::Completed;
        assert_eq!(classify(&done, today), Category::Completed);
    }
}

#[test]
fn undated_open_task_is_labelled_none() {
    let category = classify(&task("someday"), date(2024, 1, 10));
    assert_eq!(category, Category::Undated);
    assert_eq!(category.label(), "None");
    assert_eq!(
        serde_json::to_value(category).unwrap(),
        serde_json::json!("Undated")
    );
}

#[test]
fn empty_query_keeps_every_task() {
    let tasks = vec![task("b"), task("a"), task("c")];
    for query in ["", "   "] {
        assert_eq!(
            titles(&view(&tasks, query, SortKey::Title, false)),
            ["a", "b", "c"]
        );
        // Every task is Open, so the status sort must keep input order.
        assert_eq!(
            titles(&view(&tasks, query, SortKey::Status, false)),
            ["b", "a", "c"]
        );
        assert_eq!(
            titles(&view(&tasks, query, SortKey::Status, true)),
            ["b", "a", "c"]
        );
    }
}

#[test]
fn query_matches_title_notes_and_labels_case_insensitively() {
    let mut shopping = task("Buy MILK");
    shopping.notes = Some("Corner shop".to_string());
    let mut urgent = task("file taxes");
    urgent.priority = Priority::Critical;
    let tasks = vec![shopping, urgent, task("walk dog")];

    assert_eq!(
        titles(&view(&tasks, " milk ", SortKey::Title, false)),
        ["Buy MILK"]
    );
    assert_eq!(
        titles(&view(&tasks, "CORNER", SortKey::Title, false)),
        ["Buy MILK"]
    );
    assert_eq!(
        titles(&view(&tasks, "critical", SortKey::Title, false)),
        ["file taxes"]
    );
    assert!(view(&tasks, "zzz", SortKey::Title, false).is_empty());
}

#[test]
fn view_is_idempotent() {
    let tasks = vec![
        due("b", Some(date(2024, 1, 3))),
        due("a", None),
        due("c", Some(date(2024, 1, 1))),
    ];
    let first = view(&tasks, "", SortKey::DueDate, true);
    let again = view(&tasks, "", SortKey::DueDate, true);
    assert_eq!(first, again);
}

#[test]
fn priority_sorts_by_rank_not_by_label() {
    let mut tasks = Vec::new();
    for priority in [Priority::Low, Priority::Critical, Priority::Medium] {
        let mut entry = task(priority.label());
        entry.priority = priority;
        tasks.push(entry);
    }

    let ascending = view(&tasks, "", SortKey::Priority, false)
        .iter()
        .map(|task| task.priority)
        .collect::<Vec<_>>();
    assert_eq!(
        ascending,
        [Priority::Low, Priority::Medium, Priority::Critical]
    );

    let descending = view(&tasks, "", SortKey::Priority, true)
        .iter()
        .map(|task| task.priority)
        .collect::<Vec<_>>();
    assert_eq!(
        descending,
        [Priority::Critical, Priority::Medium, Priority::Low]
    );
}

#[test]
fn undated_tasks_sort_last_in_both_directions() {
    let tasks = vec![
        due("none-1", None),
        due("late", Some(date(2024, 3, 1))),
        due("none-2", None),
        due("early", Some(date(2024, 1, 1))),
    ];

    assert_eq!(
        titles(&view(&tasks, "", SortKey::DueDate, false)),
        ["early", "late", "none-1", "none-2"]
    );
    assert_eq!(
        titles(&view(&tasks, "", SortKey::DueDate, true)),
        ["late", "early", "none-1", "none-2"]
    );
}

#[test]
fn ties_keep_input_order_when_descending() {
    let tasks = vec![task("same"), task("same"), task("same")];
    let ids = tasks.iter().map(|task| task.id).collect::<Vec<_>>();

    let sorted = view(&tasks, "", SortKey::Title, true)
        .iter()
        .map(|task| task.id)
        .collect::<Vec<_>>();
    assert_eq!(sorted, ids);
}

#[test]
fn sort_key_parses_column_names_only() {
    assert_eq!("due_date".parse::<SortKey>().unwrap(), SortKey::DueDate);
    let err = "colour".parse::<SortKey>().unwrap_err();
    assert_eq!(err.0, "colour");
}
