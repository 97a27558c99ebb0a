use crate::config::StatsParams;
use crate::error::{AppError, Result};
use crate::services::{SharedConfig, open_db};
use crate::util::time::resolve_filter;
use tracker_core::{
    DailyStats, MonthlyCost, SessionDuration, SessionStats, SubagentStats, Summary,
};
use tracker_db::Db;
use tracing::info;

#[derive(Clone)]
pub struct StatsService {
    config: SharedConfig,
}

impl StatsService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    pub fn sessions(&self, params: &StatsParams) -> Result<Vec<SessionStats>> {
        let filter = resolve_filter(params)?;
        Ok(self.db()?.session_stats(&filter)?)
    }

    pub fn subagents(&self, session_id: i64) -> Result<Vec<SubagentStats>> {
        let db = self.db()?;
        require_session(&db, session_id)?;
        Ok(db.subagent_stats(session_id)?)
    }

    pub fn daily(&self, params: &StatsParams) -> Result<Vec<DailyStats>> {
        let filter = resolve_filter(params)?;
        Ok(self.db()?.daily_stats(&filter)?)
    }

    pub fn monthly(&self, params: &StatsParams) -> Result<Vec<MonthlyCost>> {
        let filter = resolve_filter(params)?;
        Ok(self.db()?.monthly_costs(&filter)?)
    }

    pub fn summary(&self, params: &StatsParams) -> Result<Summary> {
        let filter = resolve_filter(params)?;
        Ok(self.db()?.summary(&filter)?)
    }

    pub fn projects(&self) -> Result<Vec<String>> {
        Ok(self.db()?.projects()?)
    }

    pub fn custom_titles(&self) -> Result<Vec<String>> {
        Ok(self.db()?.custom_titles()?)
    }

    pub fn durations(&self, session_id: Option<i64>) -> Result<Vec<SessionDuration>> {
        let db = self.db()?;
        if let Some(session_id) = session_id {
            require_session(&db, session_id)?;
        }
        Ok(db.session_durations(session_id)?)
    }

    /// Blank titles clear the stored one.
    pub fn set_title(&self, session_id: i64, title: Option<&str>) -> Result<()> {
        let title = title.map(str::trim).filter(|value| !value.is_empty());
        Ok(self.db()?.update_session_custom_title(session_id, title)?)
    }

    pub fn delete_session(&self, session_id: i64) -> Result<()> {
        self.db()?.delete_session(session_id)?;
        info!(session_id, "deleted session");
        Ok(())
    }
}

fn require_session(db: &Db, session_id: i64) -> Result<()> {
    match db.get_session(session_id)? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!(
            "session {} not found",
            session_id
        ))),
    }
}
