mod ingest;
mod settings;
mod stats;

use std::sync::Arc;

use crate::app::AppConfig;
use crate::error::Result;
use tracker_db::Db;

pub use ingest::IngestService;
pub use settings::{SUBSCRIPTION_START_DATE, SettingsService, SettingsSnapshot};
pub use stats::StatsService;

type SharedConfig = Arc<AppConfig>;

/// Service registry for app-level operations.
#[derive(Clone)]
pub struct AppServices {
    pub stats: StatsService,
    pub ingest: IngestService,
    pub settings: SettingsService,
}

impl AppServices {
    pub fn new(config: &AppConfig) -> Self {
        let shared = Arc::new(config.clone());
        Self {
            stats: StatsService::new(shared.clone()),
            ingest: IngestService::new(shared.clone()),
            settings: SettingsService::new(shared),
        }
    }
}

fn open_db(config: &SharedConfig) -> Result<Db> {
    Ok(Db::open(&config.db_path)?)
}
