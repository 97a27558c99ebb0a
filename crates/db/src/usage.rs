use rusqlite::{Connection, params};
use tracker_core::UsageRecord;

use crate::Db;
use crate::error::Result;

/// Writes records keyed by their external id. An existing record takes the
/// incoming token counts and timestamp; its owner does not change.
pub(crate) fn upsert_usage_records(conn: &Connection, records: &[UsageRecord]) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO usage_records (
          external_id, session_id, subagent_id, timestamp, model,
          input_tokens, output_tokens, cache_creation_input_tokens, cache_read_input_tokens
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(external_id) DO UPDATE SET
          timestamp = excluded.timestamp,
          model = COALESCE(excluded.model, usage_records.model),
          input_tokens = excluded.input_tokens,
          output_tokens = excluded.output_tokens,
          cache_creation_input_tokens = excluded.cache_creation_input_tokens,
          cache_read_input_tokens = excluded.cache_read_input_tokens
        "#,
    )?;
    let mut written = 0usize;
    for record in records {
        written += stmt.execute(params![
            record.external_id,
            record.session_id,
            record.subagent_id,
            record.timestamp,
            record.model,
            to_sql_count(record.tokens.input_tokens),
            to_sql_count(record.tokens.output_tokens),
            to_sql_count(record.tokens.cache_creation_input_tokens),
            to_sql_count(record.tokens.cache_read_input_tokens),
        ])?;
    }
    Ok(written)
}

/// Deletes the records a main transcript contributed to its session. Records
/// attributed through sub-agents are left alone.
pub(crate) fn clear_session_usage(conn: &Connection, session_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM usage_records WHERE session_id = ?1 AND subagent_id IS NULL",
        [session_id],
    )?)
}

pub(crate) fn clear_subagent_usage(conn: &Connection, subagent_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM usage_records WHERE subagent_id = ?1",
        [subagent_id],
    )?)
}

fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl Db {
    pub fn upsert_usage_records(&mut self, records: &[UsageRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let written = upsert_usage_records(&tx, records)?;
        tx.commit()?;
        Ok(written)
    }

    pub fn usage_record_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM usage_records", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
