pub mod app;
pub mod config;
pub mod error;
pub mod services;
pub mod startup;
pub mod util;

pub use app::{AppConfig, AppState};
pub use config::StatsParams;
pub use error::{ApiError, AppError, Result};
pub use services::{AppServices, SettingsSnapshot};
pub use startup::{AppPaths, ensure_app_data_dir};
pub use util::time::{BillingPeriod, billing_period, parse_date, resolve_filter};
pub use ingest::{SyncMode, default_claude_home, projects_dir};
