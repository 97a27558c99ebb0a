mod args;
mod config;
mod dirs;

use std::io;

use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracker_app::{
    ApiError, AppPaths, AppState, StatsParams, SyncMode, default_claude_home,
    ensure_app_data_dir, projects_dir,
};

use crate::args::{Cli, Command};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = config::load_or_create().map_err(io::Error::other)?;
    init_logging(&config.config.log_level);
    if config.created {
        info!(file = %config.file.display(), "created default config");
    }

    let data_dir = match cli.data_dir.clone().or(config.config.data_dir.clone()) {
        Some(dir) => dir,
        None => dirs::data_dir().map_err(io::Error::other)?,
    };
    let claude_home = cli
        .claude_home
        .clone()
        .or(config.config.claude_home.clone())
        .unwrap_or_else(default_claude_home);

    let paths = AppPaths::new(data_dir);
    ensure_app_data_dir(&paths).map_err(|err| io::Error::other(err.to_string()))?;
    let app_state = AppState::new(paths.db_path, projects_dir(&claude_home));
    app_state
        .setup_db()
        .map_err(|err| io::Error::other(format!("failed to initialize database: {}", err)))?;

    if let Err(err) = run(&app_state, cli.command) {
        let api_error = ApiError::from(err);
        eprintln!("{}", serde_json::to_string(&api_error)?);
        std::process::exit(exit_code(&api_error));
    }
    Ok(())
}

/// Bad input exits with 2, a missing session or transcript with 3.
fn exit_code(error: &ApiError) -> i32 {
    match error.status {
        400 => 2,
        404 => 3,
        _ => 1,
    }
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(app_state: &AppState, command: Command) -> tracker_app::Result<()> {
    let services = &app_state.services;
    match command {
        Command::Sync { path, full } => {
            let mode = if full {
                SyncMode::Full
            } else {
                SyncMode::Incremental
            };
            print_json(&services.ingest.sync_file_with_mode(&path, mode)?)
        }
        Command::SyncAll => {
            let result = services.ingest.sync_all()?;
            if !result.issues.is_empty() {
                warn!(count = result.issues.len(), "some transcripts failed to sync");
            }
            print_json(&result)
        }
        Command::Summary(filter) => print_json(&services.stats.summary(&StatsParams::from(filter))?),
        Command::Sessions(filter) => {
            print_json(&services.stats.sessions(&StatsParams::from(filter))?)
        }
        Command::Daily(filter) => print_json(&services.stats.daily(&StatsParams::from(filter))?),
        Command::Monthly(filter) => {
            print_json(&services.stats.monthly(&StatsParams::from(filter))?)
        }
        Command::Subagents { session_id } => print_json(&services.stats.subagents(session_id)?),
        Command::Durations { session_id } => print_json(&services.stats.durations(session_id)?),
        Command::Projects => print_json(&services.stats.projects()?),
        Command::Titles => print_json(&services.stats.custom_titles()?),
        Command::Title { session_id, title } => {
            services.stats.set_title(session_id, title.as_deref())?;
            print_json(&serde_json::json!({ "ok": true, "session_id": session_id }))
        }
        Command::DeleteSession { session_id } => {
            services.stats.delete_session(session_id)?;
            print_json(&serde_json::json!({ "ok": true, "session_id": session_id }))
        }
        Command::Settings(settings) => {
            if settings.clear_subscription_start_date {
                services.settings.set_subscription_start_date(None)?;
            } else if let Some(date) = settings.subscription_start_date.as_deref() {
                services.settings.set_subscription_start_date(Some(date))?;
            }
            print_json(&services.settings.get()?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> tracker_app::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
