//! CLI entry point for manual task checks without the Flutter shell.
//!
//! # Responsibility
//! - Drive `smarttodo_core` use cases from a terminal.
//! - Keep output deterministic for quick local sanity checks.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use smarttodo_core::db::open_db;
use smarttodo_core::{
    classify, completed_per_day, default_log_level, init_logging, parse_due_date,
    priority_distribution, summarize, urgency_score, view, BulkReport, MutationOutcome, NewTask,
    Priority, SortKey, SqliteTaskStore, TaskId, TaskManager, TodoConfig,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "smarttodo", version, about = "Smart To-Do task manager")]
struct Cli {
    /// TOML config file; missing files fall back to defaults.
    #[arg(short, long, global = true, default_value = "smarttodo.toml")]
    config: PathBuf,

    /// Database path, overriding config and SMARTTODO_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tasks, filtered and sorted like the task table.
    List(ListArgs),
    /// Add a task.
    Add(AddArgs),
    /// Mark tasks completed.
    Done { ids: Vec<String> },
    /// Flip a task between Open and Completed.
    Toggle { id: String },
    /// Push a due date forward.
    Snooze {
        id: String,
        #[arg(short, long, default_value_t = 1)]
        days: u32,
    },
    /// Change a task's priority.
    Priority { id: String, priority: Priority },
    /// Delete tasks.
    Rm { ids: Vec<String> },
    /// Completion and priority statistics.
    Stats {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Reconcile the local snapshot with the task store.
    Sync {
        /// Keep local values when both sides differ.
        #[arg(long)]
        prefer_local: bool,
    },
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Case-insensitive text filter.
    #[arg(short, long, default_value = "")]
    query: String,

    /// Sort column: title, priority, status, due_date or notes.
    #[arg(short, long, default_value = "due_date")]
    sort: SortKey,

    #[arg(long)]
    desc: bool,
}

#[derive(Args, Debug)]
struct AddArgs {
    title: String,

    #[arg(short, long)]
    priority: Option<Priority>,

    /// Due date as YYYY-MM-DD.
    #[arg(short, long)]
    due: Option<String>,

    #[arg(short, long)]
    notes: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = TodoConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    if let Some(log_dir) = &config.log_dir {
        let level = config
            .log_level
            .as_deref()
            .unwrap_or_else(|| default_log_level());
        init_logging(level, log_dir).context("initializing logging")?;
    }

    let mut manager = open_manager(&config, cli.db)?;
    let today = Local::now().date_naive();
    run(cli.command, &mut manager, today)
}

fn open_manager(
    config: &TodoConfig,
    db_override: Option<PathBuf>,
) -> Result<TaskManager<SqliteTaskStore>> {
    let db_path = db_override.unwrap_or_else(|| config.resolve_db_path());
    let conn = open_db(&db_path).with_context(|| format!("opening {}", db_path.display()))?;
    let store = SqliteTaskStore::try_new(conn, &config.fields).context("validating task store")?;

    let mut manager = TaskManager::new(store, config.fields.clone());
    if let Some(snapshot) = &config.snapshot_path {
        manager = manager.with_snapshot(snapshot);
    }
    manager.load().context("loading tasks")?;
    Ok(manager)
}

fn run(
    command: Command,
    manager: &mut TaskManager<SqliteTaskStore>,
    today: NaiveDate,
) -> Result<()> {
    match command {
        Command::List(args) => {
            for task in view(manager.tasks(), &args.query, args.sort, args.desc) {
                println!(
                    "{}  {:<8} {:<9} {:<10} {:<12} {:>6.3}  {}",
                    short_id(task.id),
                    task.priority.label(),
                    task.status.label(),
                    task.due_date
                        .map(|date| date.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    classify(task, today).label(),
                    urgency_score(task, today),
                    task.title
                );
            }
        }
        Command::Add(args) => {
            let mut input = NewTask::new(args.title);
            if let Some(priority) = args.priority {
                input = input.priority(priority);
            }
            if let Some(due) = parse_due_date(args.due.as_deref().unwrap_or_default())? {
                input = input.due_date(due);
            }
            if let Some(notes) = args.notes {
                input = input.notes(notes);
            }
            let mutation = manager.add_task(input)?;
            print_outcome(mutation.task.id, &mutation.outcome);
        }
        Command::Done { ids } => run_bulk(manager, &ids, TaskManager::bulk_complete)?,
        Command::Toggle { id } => {
            let id = resolve_id(manager, &id)?;
            let mutation = manager.toggle_status(id)?;
            print_outcome(id, &mutation.outcome);
        }
        Command::Snooze { id, days } => {
            let id = resolve_id(manager, &id)?;
            let mutation = manager.snooze(id, days, today)?;
            print_outcome(id, &mutation.outcome);
        }
        Command::Priority { id, priority } => {
            let id = resolve_id(manager, &id)?;
            let mutation = manager.set_priority(id, priority)?;
            print_outcome(id, &mutation.outcome);
        }
        Command::Rm { ids } => run_bulk(manager, &ids, TaskManager::bulk_delete)?,
        Command::Stats { days } => {
            let per_day = completed_per_day(manager.tasks(), today, days);
            for (date, count) in &per_day {
                println!("{date}  {count}");
            }
            match summarize(&per_day) {
                Some(summary) => println!(
                    "total={} mean={:.2} median={:.2} std_dev={:.2}",
                    summary.total, summary.mean, summary.median, summary.std_dev
                ),
                None => println!("no completions in the last {days} day(s)"),
            }
            for (priority, count) in priority_distribution(manager.tasks()) {
                println!("{:<8} {count}", priority.label());
            }
        }
        Command::Sync { prefer_local } => {
            let summary = manager.sync_with_store(prefer_local)?;
            println!(
                "pushed={} pulled={} updated={}",
                summary.pushed, summary.pulled, summary.updated
            );
        }
    }
    Ok(())
}

/// Accepts a full id or a unique prefix of one.
fn resolve_id(manager: &TaskManager<SqliteTaskStore>, raw: &str) -> Result<TaskId> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<TaskId>() {
        return Ok(id);
    }
    let mut matches = manager
        .tasks()
        .iter()
        .filter(|task| task.id.to_string().starts_with(raw))
        .map(|task| task.id);
    match (matches.next(), matches.next()) {
        (Some(id), None) => Ok(id),
        (None, _) => Err(anyhow!("no task matches id `{raw}`")),
        (Some(_), Some(_)) => bail!("id prefix `{raw}` is ambiguous"),
    }
}

/// Resolves each id independently. Ids that match no single task come back
/// as error messages instead of aborting the rest.
fn resolve_ids(
    manager: &TaskManager<SqliteTaskStore>,
    raw: &[String],
) -> Result<(Vec<TaskId>, Vec<String>)> {
    if raw.is_empty() {
        bail!("at least one task id is required");
    }
    let mut ids = Vec::with_capacity(raw.len());
    let mut unresolved = Vec::new();
    for id in raw {
        match resolve_id(manager, id) {
            Ok(id) => ids.push(id),
            Err(err) => unresolved.push(err.to_string()),
        }
    }
    Ok((ids, unresolved))
}

/// Runs a bulk action over every resolvable id, then fails if any id was
/// left unresolved.
fn run_bulk(
    manager: &mut TaskManager<SqliteTaskStore>,
    raw: &[String],
    action: impl FnOnce(&mut TaskManager<SqliteTaskStore>, &[TaskId]) -> BulkReport,
) -> Result<()> {
    let (ids, unresolved) = resolve_ids(manager, raw)?;
    for message in &unresolved {
        eprintln!("skipped: {message}");
    }
    print_bulk(&action(manager, &ids));
    if !unresolved.is_empty() {
        bail!("{} id(s) matched no task", unresolved.len());
    }
    Ok(())
}

fn short_id(id: TaskId) -> String {
    id.simple().to_string()[..8].to_string()
}

fn print_outcome(id: TaskId, outcome: &MutationOutcome) {
    println!("{}  {}", short_id(id), outcome.message());
}

fn print_bulk(report: &BulkReport) {
    println!("succeeded={}", report.succeeded.len());
    for failure in &report.failed {
        println!("failed {}  {failure:?}", short_id(failure.id()));
    }
}
