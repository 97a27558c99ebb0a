use chrono::Utc;
use serde::Serialize;

use crate::error::Result;
use crate::services::{SharedConfig, open_db};
use crate::util::time::{BillingPeriod, billing_period, format_date, parse_date};
use tracker_db::Db;

pub const SUBSCRIPTION_START_DATE: &str = "subscription_start_date";

/// Snapshot of user-configurable settings stored in the DB.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsSnapshot {
    pub subscription_start_date: Option<String>,
    pub billing_period: Option<BillingPeriod>,
}

#[derive(Clone)]
pub struct SettingsService {
    config: SharedConfig,
}

impl SettingsService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    pub fn get(&self) -> Result<SettingsSnapshot> {
        let db = self.db()?;
        let subscription_start_date = db.get_setting(SUBSCRIPTION_START_DATE)?;
        let billing_period = match subscription_start_date.as_deref() {
            Some(value) => Some(billing_period(
                parse_date(value)?,
                Utc::now().date_naive(),
            )?),
            None => None,
        };
        Ok(SettingsSnapshot {
            subscription_start_date,
            billing_period,
        })
    }

    /// Stores the date in canonical form; `None` or a blank string clears it.
    pub fn set_subscription_start_date(&self, date: Option<&str>) -> Result<Option<String>> {
        let date = date
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(parse_date)
            .transpose()?
            .map(format_date);
        self.db()?
            .set_setting(SUBSCRIPTION_START_DATE, date.as_deref())?;
        Ok(date)
    }
}
