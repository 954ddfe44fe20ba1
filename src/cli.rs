use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::database::{Database, DatabaseError};
use crate::models::{EventType, HabitFrequency, Priority, TaskStatus};
use crate::services::events::NewEvent;
use crate::services::habits::NewHabit;
use crate::services::notes::NewNote;
use crate::services::routines::NewRoutine;
use crate::services::settings::SettingKey;
use crate::services::tasks::{DateFilter, NewTask, TaskPatch};
use crate::services::transfer::TransferError;
use crate::sql;
use crate::statement::Statement;
use crate::utils::{get_current_date_string, parse_date};

#[derive(Parser)]
#[command(name = "daybook")]
#[command(about = "Tasks, notes, events, habits and routines kept in a tiny local store")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/storage)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new task
    AddTask {
        /// Task title
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// low, medium or high
        #[arg(long)]
        priority: Option<Priority>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },
    /// List tasks
    Tasks {
        /// today, week or month
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        /// incomplete or complete
        #[arg(long)]
        status: Option<TaskStatus>,
        /// Substring to look for in title or description
        #[arg(long)]
        search: Option<String>,
    },
    /// Mark a task complete
    CompleteTask { id: String },
    /// Delete a task and its subtasks
    DeleteTask { id: String },
    /// Add a subtask to a task
    AddSubtask { task_id: String, title: String },
    /// Add a new note
    AddNote {
        /// Note title
        title: String,
        #[arg(long)]
        content: Option<String>,
        /// Defaults to the configured note folder
        #[arg(long)]
        folder: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// List notes
    Notes {
        #[arg(long)]
        folder: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Add a calendar event
    AddEvent {
        title: String,
        /// Start time (ISO-8601)
        start: String,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        location: Option<String>,
        /// work, personal, health or other
        #[arg(long = "type")]
        event_type: Option<EventType>,
    },
    /// List events, optionally within a range
    Events {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Add a habit to track
    AddHabit {
        name: String,
        /// daily or weekly
        #[arg(long)]
        frequency: Option<HabitFrequency>,
    },
    /// Log a habit for a day
    LogHabit {
        habit_id: String,
        /// Day to log (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Record the day as missed
        #[arg(long)]
        missed: bool,
    },
    /// List habits with their current streak
    Habits,
    /// Add a weekly routine
    AddRoutine {
        title: String,
        /// Start time (HH:MM)
        start: String,
        /// End time (HH:MM)
        end: String,
        /// Comma-separated weekday names
        #[arg(long)]
        days: String,
    },
    /// List routines
    Routines {
        /// Only routines on this weekday
        #[arg(long)]
        day: Option<String>,
    },
    /// Show settings
    Settings,
    /// Change a setting (theme, colorScheme)
    SetSetting { key: SettingKey, value: String },
    /// Write every table to a JSON file
    Export { path: String },
    /// Replace all data with the contents of an export file
    Import { path: String },
    /// Run a raw statement and print the result as JSON
    Query {
        sql: String,
        /// Positional parameters as a JSON array
        #[arg(long)]
        params: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Transfer error: {0}")]
    TransferError(#[from] TransferError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

fn check_date(date: &str) -> Result<(), CliError> {
    parse_date(date)
        .map(|_| ())
        .map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", date, e)))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn print_json(value: &impl serde::Serialize) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::InvalidArgument(format!("Failed to render JSON: {}", e)))?;
    println!("{}", text);
    Ok(())
}

/// Handle the add-task command
pub fn handle_add_task(
    title: String,
    description: Option<String>,
    priority: Option<Priority>,
    due: Option<String>,
    db: &mut Database,
) -> Result<(), CliError> {
    if let Some(due) = &due {
        check_date(due)?;
    }

    let task = db.tasks().create(NewTask {
        description,
        priority: priority.unwrap_or_default(),
        due_date: due,
        ..NewTask::new(title)
    })?;
    println!("Task created successfully (ID: {})", task.id);

    Ok(())
}

/// Handle the tasks command. Only the first given filter applies.
pub fn handle_list_tasks(
    due: Option<String>,
    priority: Option<Priority>,
    status: Option<TaskStatus>,
    search: Option<String>,
    db: &mut Database,
) -> Result<(), CliError> {
    let tasks = db.tasks();
    let found = if let Some(window) = due {
        let filter = match window.as_str() {
            "today" => DateFilter::Today,
            "week" => DateFilter::Week,
            "month" => DateFilter::Month,
            other => {
                return Err(CliError::InvalidArgument(format!(
                    "unknown due window '{}' (expected today, week or month)",
                    other
                )));
            }
        };
        tasks.filter_by_date(filter)?
    } else if let Some(priority) = priority {
        tasks.filter_by_priority(priority)?
    } else if let Some(status) = status {
        tasks.filter_by_status(status)?
    } else if let Some(query) = search {
        tasks.search(&query)?
    } else {
        tasks.all()?
    };

    if found.is_empty() {
        println!("No tasks");
    }
    for task in found {
        let mark = if task.status == TaskStatus::Complete { "x" } else { " " };
        let due = task.due_date.as_deref().unwrap_or("-");
        println!(
            "[{}] {}  {} ({}, due {})",
            mark,
            task.id,
            task.title,
            task.priority.as_str(),
            due
        );
        for subtask in task.subtasks {
            let mark = if subtask.completed { "x" } else { " " };
            println!("      [{}] {}", mark, subtask.title);
        }
    }

    Ok(())
}

pub fn handle_complete_task(id: String, db: &mut Database) -> Result<(), CliError> {
    let patch = TaskPatch {
        status: Some(TaskStatus::Complete),
        ..TaskPatch::default()
    };
    match db.tasks().update(&id, patch)? {
        Some(task) => println!("Completed: {}", task.title),
        None => println!("No task with ID {}", id),
    }
    Ok(())
}

pub fn handle_delete_task(id: String, db: &mut Database) -> Result<(), CliError> {
    if db.tasks().delete(&id)? {
        println!("Task deleted");
    } else {
        println!("No task with ID {}", id);
    }
    Ok(())
}

pub fn handle_add_subtask(task_id: String, title: String, db: &mut Database) -> Result<(), CliError> {
    if db.tasks().get(&task_id)?.is_none() {
        return Err(CliError::InvalidArgument(format!("no task with ID {}", task_id)));
    }
    let subtask = db.tasks().add_subtask(&task_id, &title)?;
    println!("Subtask created successfully (ID: {})", subtask.id);
    Ok(())
}

/// Handle the add-note command
pub fn handle_add_note(
    title: String,
    content: Option<String>,
    folder: String,
    tags: Option<String>,
    db: &mut Database,
) -> Result<(), CliError> {
    let note = db.notes().create(NewNote {
        content: content.unwrap_or_default(),
        folder,
        tags: tags.as_deref().map(split_list).unwrap_or_default(),
        ..NewNote::new(title)
    })?;
    println!("Note created successfully (ID: {})", note.id);

    Ok(())
}

pub fn handle_list_notes(
    folder: Option<String>,
    search: Option<String>,
    db: &mut Database,
) -> Result<(), CliError> {
    let notes = db.notes();
    let found = match (folder, search) {
        (_, Some(query)) => notes.search(&query)?,
        (Some(folder), None) => notes.by_folder(&folder)?,
        (None, None) => notes.all()?,
    };

    if found.is_empty() {
        println!("No notes");
    }
    for note in found {
        let tags = if note.tags.is_empty() {
            String::new()
        } else {
            format!("  #{}", note.tags.join(" #"))
        };
        println!("{}  [{}] {}{}", note.id, note.folder, note.title, tags);
    }
    Ok(())
}

pub fn handle_add_event(
    title: String,
    start: String,
    end: Option<String>,
    location: Option<String>,
    event_type: Option<EventType>,
    db: &mut Database,
) -> Result<(), CliError> {
    let event = db.events().create(NewEvent {
        end_time: end,
        location,
        event_type: event_type.unwrap_or_default(),
        ..NewEvent::new(title, start)
    })?;
    println!("Event created successfully (ID: {})", event.id);
    Ok(())
}

pub fn handle_list_events(
    from: Option<String>,
    to: Option<String>,
    db: &mut Database,
) -> Result<(), CliError> {
    let events = db.events();
    let found = match (from, to) {
        (Some(from), Some(to)) => events.by_date_range(&from, &to)?,
        (None, None) => events.all()?,
        _ => {
            return Err(CliError::InvalidArgument(
                "--from and --to must be given together".to_string(),
            ));
        }
    };

    if found.is_empty() {
        println!("No events");
    }
    for event in found {
        let end = event.end_time.as_deref().unwrap_or("");
        println!(
            "{}  {} - {}  {} ({})",
            event.id,
            event.start_time,
            end,
            event.title,
            event.event_type.as_str()
        );
    }
    Ok(())
}

pub fn handle_add_habit(
    name: String,
    frequency: Option<HabitFrequency>,
    db: &mut Database,
) -> Result<(), CliError> {
    let habit = db.habits().create(NewHabit {
        frequency: frequency.unwrap_or_default(),
        ..NewHabit::new(name)
    })?;
    println!("Habit created successfully (ID: {})", habit.id);
    Ok(())
}

pub fn handle_log_habit(
    habit_id: String,
    date: Option<String>,
    missed: bool,
    db: &mut Database,
) -> Result<(), CliError> {
    let date = date.unwrap_or_else(get_current_date_string);
    check_date(&date)?;

    let mut habits = db.habits();
    if habits.get(&habit_id)?.is_none() {
        return Err(CliError::InvalidArgument(format!("no habit with ID {}", habit_id)));
    }
    let log = habits.log(&habit_id, &date, !missed)?;
    let streak = habits.streak(&habit_id)?;
    println!(
        "Logged {} as {} (streak: {})",
        log.date,
        if log.completed { "done" } else { "missed" },
        streak
    );
    Ok(())
}

pub fn handle_list_habits(db: &mut Database) -> Result<(), CliError> {
    let habits = db.habits();
    let all = habits.all()?;
    if all.is_empty() {
        println!("No habits");
    }
    for habit in all {
        let streak = habits.streak(&habit.id)?;
        let rate = habits.success_rate(&habit.id, 30)?;
        println!(
            "{}  {} ({})  streak {}  30d {}%",
            habit.id,
            habit.name,
            habit.frequency.as_str(),
            streak,
            rate
        );
    }
    Ok(())
}

pub fn handle_add_routine(
    title: String,
    start: String,
    end: String,
    days: String,
    db: &mut Database,
) -> Result<(), CliError> {
    let days = split_list(&days);
    if days.is_empty() {
        return Err(CliError::InvalidArgument("--days needs at least one weekday".to_string()));
    }
    let routine = db.routines().create(NewRoutine::new(title, start, end, days))?;
    println!("Routine created successfully (ID: {})", routine.id);
    Ok(())
}

pub fn handle_list_routines(day: Option<String>, db: &mut Database) -> Result<(), CliError> {
    let routines = db.routines();
    let found = match day {
        Some(day) => routines.for_day(&day)?,
        None => routines.all()?,
    };
    if found.is_empty() {
        println!("No routines");
    }
    for routine in found {
        println!(
            "{}  {}-{}  {} [{}]",
            routine.id,
            routine.start_time,
            routine.end_time,
            routine.title,
            routine.days.join(", ")
        );
    }
    Ok(())
}

pub fn handle_show_settings(db: &mut Database) -> Result<(), CliError> {
    for (key, value) in db.settings().entries()? {
        println!("{} = {}", key, value);
    }
    Ok(())
}

pub fn handle_set_setting(key: SettingKey, value: String, db: &mut Database) -> Result<(), CliError> {
    db.settings().set(key, &value)?;
    println!("{} = {}", key, value);
    Ok(())
}

pub fn handle_export(path: &Path, db: &mut Database) -> Result<(), CliError> {
    let json = db.transfer().export_json()?;
    fs::write(path, json)?;
    println!("Exported to {}", path.display());
    Ok(())
}

pub fn handle_import(path: &Path, db: &mut Database) -> Result<(), CliError> {
    let json = fs::read_to_string(path)?;
    let restored = db.transfer().import_json(&json)?;
    println!("Imported {} rows from {}", restored, path.display());
    Ok(())
}

/// Handle the query command: SELECTs print their rows, anything else prints the affected count
pub fn handle_query(sql_text: String, params: Option<String>, db: &mut Database) -> Result<(), CliError> {
    let params: Vec<Value> = match params {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| CliError::InvalidArgument(format!("--params must be a JSON array: {}", e)))?,
        None => Vec::new(),
    };

    let statement = sql::parse(&sql_text, &params).map_err(DatabaseError::from)?;
    match statement {
        Statement::Select(select) => print_json(&db.query(&select)?),
        other => {
            let affected = db.apply(&other)?;
            print_json(&serde_json::json!({ "affected": affected }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_trims_and_drops_empty() {
        assert_eq!(split_list(" work, ideas ,,"), ["work", "ideas"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from(["daybook", "--dev", "add-task", "Ship", "--priority", "high"]).unwrap();
        assert!(cli.dev);
        assert!(matches!(
            cli.command,
            Commands::AddTask { priority: Some(Priority::High), .. }
        ));

        let cli = Cli::try_parse_from(["daybook", "set-setting", "colorScheme", "green"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::SetSetting { key: SettingKey::ColorScheme, .. }
        ));

        assert!(Cli::try_parse_from(["daybook", "add-task", "x", "--priority", "urgent"]).is_err());
    }

    #[test]
    fn test_add_task_rejects_bad_due_date() {
        let mut db = Database::in_memory().unwrap();
        let result = handle_add_task("x".to_string(), None, None, Some("tomorrow".to_string()), &mut db);
        assert!(matches!(result, Err(CliError::DateParseError(_))));
        assert!(db.tasks().all().unwrap().is_empty());
    }

    #[test]
    fn test_query_rejects_non_array_params() {
        let mut db = Database::in_memory().unwrap();
        let result = handle_query(
            "SELECT * FROM tasks WHERE id = ?".to_string(),
            Some("{\"id\": 1}".to_string()),
            &mut db,
        );
        assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    }
}
