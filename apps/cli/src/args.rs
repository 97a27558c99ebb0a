use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracker_app::StatsParams;

/// Token usage and cost tracker for Claude Code transcripts.
#[derive(Debug, Parser)]
#[command(name = "claude-tracker", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the tracker database (overrides the config file).
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
    /// Claude config directory containing `projects/` (overrides the config file).
    #[arg(long, global = true, value_name = "DIR")]
    pub claude_home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sync one transcript file and its sub-agent transcripts.
    Sync {
        path: PathBuf,
        /// Drop what this file stored before and rebuild it from scratch.
        #[arg(long)]
        full: bool,
    },
    /// Rebuild usage data from every transcript under the projects directory.
    SyncAll,
    /// Token and cost totals.
    Summary(FilterArgs),
    /// Per-session totals, newest first.
    Sessions(FilterArgs),
    /// Per-day totals, newest first.
    Daily(FilterArgs),
    /// Per-month costs, oldest first.
    Monthly(FilterArgs),
    /// Sub-agents spawned by a session.
    Subagents { session_id: i64 },
    /// Wall-clock and active time per session.
    Durations { session_id: Option<i64> },
    /// Known project paths.
    Projects,
    /// Known custom session titles.
    Titles,
    /// Set a session title, or clear it when no title is given.
    Title {
        session_id: i64,
        title: Option<String>,
    },
    /// Delete a session with its sub-agents, usage records and turns.
    DeleteSession { session_id: i64 },
    /// Show settings, or change the subscription start date.
    Settings(SettingsArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Preset: today, last7days, last30days, thismonth, alltime.
    #[arg(long)]
    pub range: Option<String>,
    /// First day to include (YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<String>,
    /// Last day to include (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<String>,
    #[arg(long)]
    pub project: Option<String>,
    #[arg(long)]
    pub title: Option<String>,
}

impl From<FilterArgs> for StatsParams {
    fn from(args: FilterArgs) -> Self {
        Self {
            range: args.range,
            from: args.from,
            to: args.to,
            project: args.project,
            custom_title: args.title,
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct SettingsArgs {
    /// Day the subscription renews from (YYYY-MM-DD).
    #[arg(long, value_name = "DATE", conflicts_with = "clear_subscription_start_date")]
    pub subscription_start_date: Option<String>,
    #[arg(long)]
    pub clear_subscription_start_date: bool,
}
