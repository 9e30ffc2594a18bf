use std::io::{self, Write};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::bucket::classify;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::engine::Engine;
use crate::last_run::LastRunCache;
use crate::models::{Bucket, Category, DeletePolicy, NewTemplate, Priority, TaskId, TemplateChanges, TimeBlock};
use crate::recurrence::{render_label, Recurrence};
use crate::storage::JsonTaskStore;

/// Optional template fields shared by `template add` and `template edit`.
#[derive(Debug, Clone, Default)]
pub struct TemplateOptions {
    pub description: Option<String>,
    pub category: Option<Category>,
    pub client: Option<String>,
    pub priority: Option<Priority>,
    pub bucket: Option<Bucket>,
    /// Time block start, `YYYY-MM-DD HH:MM`.
    pub start: Option<String>,
    /// Time block end, `YYYY-MM-DD HH:MM`.
    pub end: Option<String>,
}

fn open_store(silent: bool) -> Option<(Config, JsonTaskStore)> {
    match Config::load() {
        Ok(config) => {
            let store = JsonTaskStore::from_config(&config);
            Some((config, store))
        }
        Err(e) => {
            if !silent { eprintln!("Invalid configuration: {}", e); }
            None
        }
    }
}

fn parse_date(s: &str, silent: bool) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(e) => {
            if !silent { eprintln!("Invalid date '{}': {}. Use YYYY-MM-DD.", s, e); }
            None
        }
    }
}

/// Parses `YYYY-MM-DD HH:MM` (or with a `T` separator) as local time.
fn parse_local_time(s: &str) -> Option<DateTime<Local>> {
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim(), fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

fn parse_time_opt(s: Option<&str>, silent: bool) -> Result<Option<DateTime<Local>>, ()> {
    match s {
        None => Ok(None),
        Some(s) => match parse_local_time(s) {
            Some(t) => Ok(Some(t)),
            None => {
                if !silent { eprintln!("Invalid time '{}'. Use YYYY-MM-DD HH:MM.", s); }
                Err(())
            }
        },
    }
}

/// Runs the recurring task engine and returns how many instances it created.
///
/// With `if_stale`, the run is skipped when the last-run cache says the
/// engine already ran today.
pub fn cmd_run(if_stale: bool, silent: bool) -> usize {
    let Some((config, mut store)) = open_store(silent) else { return 0 };
    let cache = LastRunCache::new(&config.data_dir);
    let clock = SystemClock;

    if if_stale && cache.ran_on(clock.today()) {
        if !silent { println!("Already ran today; nothing to do."); }
        return 0;
    }
    if config.owner.is_none() && !silent {
        eprintln!("No owner configured (set CADENCE_OWNER); nothing generated.");
    }

    let report = Engine::new(config.engine_config()).run(&mut store, &clock);
    if report.authenticated {
        if let Err(e) = cache.record(report.ran_at) {
            if !silent { eprintln!("Failed to record last run: {}", e); }
        }
    }

    if !silent {
        match report.created() {
            0 => println!("No new recurring tasks."),
            1 => println!("Created 1 recurring task."),
            n => println!("Created {} recurring tasks.", n),
        }
        for i in &report.instances {
            println!("  #{} {} (due {}, {})", i.id, i.title, i.due_date, i.status);
        }
        if report.malformed > 0 {
            eprintln!("{} template(s) have an unrecognised recurrence rule.", report.malformed);
        }
        if report.failed > 0 {
            eprintln!("{} template(s) could not be processed; they will be retried next run.", report.failed);
        }
    }
    report.created()
}

/// Adds a one-off task.
pub fn cmd_add(title: String, due: String, bucket: Option<Bucket>, silent: bool) {
    let Some(due_date) = parse_date(&due, silent) else { return };
    let Some((_, mut store)) = open_store(silent) else { return };
    let bucket = bucket.unwrap_or_else(|| classify(due_date, SystemClock.today()));
    match store.add_task(title, due_date, bucket) {
        Ok(t) => { if !silent { println!("Task added (id = {})", t.id); } }
        Err(e) => { if !silent { eprintln!("Failed to add task: {}", e); } }
    }
}

/// Lists task instances sorted by due date.
///
/// Done tasks are hidden unless `all` is true; `bucket` restricts to one bucket.
pub fn cmd_list(all: bool, bucket: Option<Bucket>) {
    let Some((config, store)) = open_store(false) else { return };
    let mut tasks = match store.load_tasks() {
        Ok(tasks) => tasks,
        Err(e) => {
            eprintln!("Failed to load tasks: {}", e);
            return;
        }
    };
    if let Some(owner) = &config.owner {
        tasks.retain(|t| &t.owner == owner);
    }
    if !all {
        tasks.retain(|t| !t.is_done());
    }
    if let Some(b) = bucket {
        tasks.retain(|t| t.status == b);
    }
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }
    tasks.sort_by_key(|t| (t.due_date, t.id));

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Due").add_attribute(Attribute::Bold),
            Cell::new("Bucket").add_attribute(Attribute::Bold),
            Cell::new("Priority").add_attribute(Attribute::Bold),
            Cell::new("Category").add_attribute(Attribute::Bold),
            Cell::new("Recurring").add_attribute(Attribute::Bold),
        ]);

    let today = SystemClock.today();
    for t in tasks {
        let overdue = t.due_date < today && !t.is_done();
        let bucket_color = match t.status {
            Bucket::Done => Color::Green,
            Bucket::Today => Color::Red,
            Bucket::Tomorrow => Color::Yellow,
            _ => Color::Reset,
        };
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(&t.title),
            Cell::new(t.due_date).fg(if overdue { Color::Red } else { Color::Reset }),
            Cell::new(t.status).fg(bucket_color),
            Cell::new(t.priority).fg(if t.priority == Priority::Urgent { Color::Red } else { Color::Reset }),
            Cell::new(t.category.map(|c| c.to_string()).unwrap_or_default()),
            Cell::new(t.parent_task_id.map(|p| format!("#{}", p)).unwrap_or_default()),
        ]);
    }

    println!("{table}");
}

/// Marks a task as done.
pub fn cmd_complete(id: TaskId, silent: bool) {
    let Some((_, store)) = open_store(silent) else { return };
    match store.complete_task(id) {
        Ok(_) => { if !silent { println!("Task {} marked as complete.", id); } }
        Err(e) => { if !silent { eprintln!("Failed to complete task {}: {}", id, e); } }
    }
}

/// Removes a task instance.
pub fn cmd_remove(id: TaskId, silent: bool) {
    let Some((_, store)) = open_store(silent) else { return };
    match store.remove_task(id) {
        Ok(()) => { if !silent { println!("Task {} removed.", id); } }
        Err(e) => { if !silent { eprintln!("Failed to remove task {}: {}", id, e); } }
    }
}

/// Adds a recurring template.
pub fn cmd_template_add(title: String, rule: String, opts: TemplateOptions, silent: bool) {
    let Some((_, store)) = open_store(silent) else { return };
    let Ok(start) = parse_time_opt(opts.start.as_deref(), silent) else { return };
    let Ok(end) = parse_time_opt(opts.end.as_deref(), silent) else { return };
    let new = NewTemplate {
        title,
        description: opts.description,
        category: opts.category,
        client_id: opts.client,
        priority: opts.priority.unwrap_or_default(),
        recurrence_rule: rule,
        status: opts.bucket.unwrap_or(Bucket::Today),
        time_block: TimeBlock { start, end },
    };
    match store.add_template(new) {
        Ok(t) => {
            if !silent {
                println!("Recurring task added (id = {}, {})", t.id, render_label(&t.recurrence_rule));
            }
        }
        Err(e) => { if !silent { eprintln!("Failed to add recurring task: {}", e); } }
    }
}

/// Lists all recurring templates.
pub fn cmd_template_list() {
    let Some((config, store)) = open_store(false) else { return };
    let mut templates = match store.load_templates() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to load recurring tasks: {}", e);
            return;
        }
    };
    if let Some(owner) = &config.owner {
        templates.retain(|t| &t.owner == owner);
    }
    if templates.is_empty() {
        println!("No recurring tasks found.");
        return;
    }
    let today = SystemClock.today();
    let engine_config = config.engine_config();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["ID", "Title", "Repeats", "Next Due", "Priority", "State"]);
    for t in templates {
        let next = Recurrence::parse(&t.recurrence_rule)
            .ok()
            .and_then(|r| r.next_on_or_after(today, engine_config.monthly_fallback))
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into());
        let state = if t.is_paused { Cell::new("paused").fg(Color::Grey) } else { Cell::new("active").fg(Color::Green) };
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(&t.title),
            Cell::new(render_label(&t.recurrence_rule)),
            Cell::new(next),
            Cell::new(t.priority),
            state,
        ]);
    }
    println!("{table}");
}

/// Edits a recurring template.
pub fn cmd_template_edit(id: TaskId, title: Option<String>, rule: Option<String>, opts: TemplateOptions, silent: bool) {
    let Some((_, store)) = open_store(silent) else { return };
    let Ok(time_block_start) = parse_time_opt(opts.start.as_deref(), silent) else { return };
    let Ok(time_block_end) = parse_time_opt(opts.end.as_deref(), silent) else { return };
    let changes = TemplateChanges {
        title,
        description: opts.description,
        category: opts.category,
        client_id: opts.client,
        priority: opts.priority,
        recurrence_rule: rule,
        status: opts.bucket,
        time_block_start,
        time_block_end,
    };
    match store.edit_template(id, changes) {
        Ok(_) => { if !silent { println!("Recurring task {} updated.", id); } }
        Err(e) => { if !silent { eprintln!("Failed to update recurring task {}: {}", id, e); } }
    }
}

/// Pauses (`paused = true`) or resumes a recurring template.
pub fn cmd_template_pause(id: TaskId, paused: bool, silent: bool) {
    let Some((_, store)) = open_store(silent) else { return };
    match store.set_paused(id, paused) {
        Ok(_) => {
            if !silent {
                println!("Recurring task {} {}.", id, if paused { "paused" } else { "resumed" });
            }
        }
        Err(e) => { if !silent { eprintln!("Failed to update recurring task {}: {}", id, e); } }
    }
}

/// Removes a recurring template.
///
/// `cascade` removes its generated tasks too; otherwise the configured
/// delete policy decides.
pub fn cmd_template_remove(id: TaskId, cascade: bool, silent: bool) {
    let Some((config, store)) = open_store(silent) else { return };
    let policy = if cascade { DeletePolicy::Cascade } else { config.delete_policy };
    match store.remove_template(id, policy) {
        Ok(affected) => {
            if !silent {
                let what = match policy {
                    DeletePolicy::Cascade => "removed",
                    DeletePolicy::Orphan => "kept as one-off tasks",
                };
                println!("Recurring task {} removed ({} generated task(s) {}).", id, affected, what);
            }
        }
        Err(e) => { if !silent { eprintln!("Failed to remove recurring task {}: {}", id, e); } }
    }
}

/// Shows how a rule reads and when it fires next.
pub fn cmd_preview(rule: String, from: Option<String>, count: usize) {
    let from = match from {
        Some(s) => match parse_date(&s, false) {
            Some(d) => d,
            None => return,
        },
        None => SystemClock.today(),
    };
    let recurrence = match Recurrence::parse(&rule) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Invalid recurrence rule '{}': {}", rule, e);
            return;
        }
    };
    let fallback = Config::load().map(|c| c.monthly_fallback).unwrap_or_default();

    println!("{} ({})", recurrence.label(), recurrence);
    println!("Fires on {}: {}", from, if recurrence.occurs_on(from, fallback) { "yes" } else { "no" });
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Due", "Weekday", "Bucket"]);
    for d in recurrence.upcoming(from, count, fallback) {
        table.add_row(vec![
            d.to_string(),
            d.format("%A").to_string(),
            classify(d, from).to_string(),
        ]);
    }
    println!("{table}");
}

/// Resets the database by deleting all tasks, templates and the last-run record.
pub fn cmd_reset(force: bool) {
    if !force {
        print!("Are you sure you want to delete all tasks and recurring tasks? This cannot be undone. [y/N] ");
        let mut input = String::new();
        if io::stdout().flush().is_err() || io::stdin().read_line(&mut input).is_err() {
            return;
        }
        if input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return;
        }
    }

    let Some((config, store)) = open_store(false) else { return };
    let result = store
        .delete_database()
        .and_then(|_| LastRunCache::new(&config.data_dir).clear());
    if let Err(e) = result {
        eprintln!("Failed to reset database: {}", e);
    } else {
        println!("Database reset successfully.");
    }
}
