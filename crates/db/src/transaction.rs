use rusqlite::Transaction;
use tracker_core::{Exchange, NewSession, NewSubagent, UsageRecord};

use crate::error::Result;
use crate::{exchanges, sessions, sync_state, usage};

/// Writes for one transcript pass. Nothing is visible to other readers until
/// [`SyncTx::commit`]; dropping the value rolls everything back.
pub struct SyncTx<'a> {
    tx: Transaction<'a>,
}

impl<'a> SyncTx<'a> {
    pub(crate) fn new(tx: Transaction<'a>) -> Self {
        Self { tx }
    }

    pub fn upsert_session(&self, session: &NewSession) -> Result<i64> {
        sessions::upsert_session(&self.tx, session)
    }

    pub fn upsert_subagent(&self, subagent: &NewSubagent) -> Result<i64> {
        sessions::upsert_subagent(&self.tx, subagent)
    }

    pub fn session_id_by_external_id(&self, external_id: &str) -> Result<Option<i64>> {
        sessions::session_id_by_external_id(&self.tx, external_id)
    }

    pub fn subagent_id_by_external_id(&self, external_id: &str) -> Result<Option<i64>> {
        sessions::subagent_id_by_external_id(&self.tx, external_id)
    }

    pub fn upsert_usage_records(&self, records: &[UsageRecord]) -> Result<usize> {
        usage::upsert_usage_records(&self.tx, records)
    }

    pub fn upsert_exchanges(&self, exchanges: &[Exchange]) -> Result<usize> {
        exchanges::upsert_exchanges(&self.tx, exchanges)
    }

    /// Clears what a main transcript produced for its session: its own usage
    /// records and every exchange.
    pub fn clear_main_file_rows(&self, session_id: i64) -> Result<()> {
        usage::clear_session_usage(&self.tx, session_id)?;
        exchanges::clear_session_exchanges(&self.tx, session_id)?;
        Ok(())
    }

    pub fn clear_subagent_rows(&self, subagent_id: i64) -> Result<()> {
        usage::clear_subagent_usage(&self.tx, subagent_id)?;
        Ok(())
    }

    pub fn update_sync_state(&self, file_path: &str, last_offset: u64) -> Result<()> {
        sync_state::update_sync_state(&self.tx, file_path, last_offset)
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}
