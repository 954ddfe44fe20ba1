use clap::Parser;
use color_eyre::Result;
use daybook::{
    Config, Database, Profile,
    cli::{self, Cli, Commands},
};
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    // --config overrides the profile's config file
    let config = match &cli.config {
        Some(path) => Config::load_from(Path::new(path))?,
        None => Config::load_with_profile(profile)?,
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    let storage_path = config.get_storage_path();
    tracing::debug!(path = %storage_path.display(), ?profile, "opening store");
    let mut db = Database::new(
        storage_path
            .to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Storage path contains invalid UTF-8"))?,
    )?;
    let db = &mut db;

    match cli.command {
        Commands::AddTask {
            title,
            description,
            priority,
            due,
        } => cli::handle_add_task(title, description, priority, due, db)?,
        Commands::Tasks {
            due,
            priority,
            status,
            search,
        } => cli::handle_list_tasks(due, priority, status, search, db)?,
        Commands::CompleteTask { id } => cli::handle_complete_task(id, db)?,
        Commands::DeleteTask { id } => cli::handle_delete_task(id, db)?,
        Commands::AddSubtask { task_id, title } => cli::handle_add_subtask(task_id, title, db)?,
        Commands::AddNote {
            title,
            content,
            folder,
            tags,
        } => {
            let folder = folder.unwrap_or_else(|| config.default_note_folder.clone());
            cli::handle_add_note(title, content, folder, tags, db)?
        }
        Commands::Notes { folder, search } => cli::handle_list_notes(folder, search, db)?,
        Commands::AddEvent {
            title,
            start,
            end,
            location,
            event_type,
        } => cli::handle_add_event(title, start, end, location, event_type, db)?,
        Commands::Events { from, to } => cli::handle_list_events(from, to, db)?,
        Commands::AddHabit { name, frequency } => cli::handle_add_habit(name, frequency, db)?,
        Commands::LogHabit {
            habit_id,
            date,
            missed,
        } => cli::handle_log_habit(habit_id, date, missed, db)?,
        Commands::Habits => cli::handle_list_habits(db)?,
        Commands::AddRoutine {
            title,
            start,
            end,
            days,
        } => cli::handle_add_routine(title, start, end, days, db)?,
        Commands::Routines { day } => cli::handle_list_routines(day, db)?,
        Commands::Settings => cli::handle_show_settings(db)?,
        Commands::SetSetting { key, value } => cli::handle_set_setting(key, value, db)?,
        Commands::Export { path } => cli::handle_export(Path::new(&path), db)?,
        Commands::Import { path } => cli::handle_import(Path::new(&path), db)?,
        Commands::Query { sql, params } => cli::handle_query(sql, params, db)?,
    }

    Ok(())
}
