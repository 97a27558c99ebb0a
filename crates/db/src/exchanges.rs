use rusqlite::{Connection, params};
use tracker_core::Exchange;

use crate::Db;
use crate::error::Result;
use crate::helpers::{EXCHANGE_COLUMNS, row_to_exchange};

/// Exchanges are keyed by `(session_id, user_timestamp)`; a repeated turn is
/// updated in place.
pub(crate) fn upsert_exchanges(conn: &Connection, exchanges: &[Exchange]) -> Result<usize> {
    if exchanges.is_empty() {
        return Ok(0);
    }
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO exchanges (
          session_id, user_message_id, user_timestamp, assistant_message_id,
          assistant_timestamp, duration_seconds, user_content
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(session_id, user_timestamp) DO UPDATE SET
          user_message_id = COALESCE(excluded.user_message_id, exchanges.user_message_id),
          assistant_message_id = excluded.assistant_message_id,
          assistant_timestamp = excluded.assistant_timestamp,
          duration_seconds = excluded.duration_seconds,
          user_content = COALESCE(excluded.user_content, exchanges.user_content)
        "#,
    )?;
    let mut written = 0usize;
    for exchange in exchanges {
        written += stmt.execute(params![
            exchange.session_id,
            exchange.user_message_id,
            exchange.user_timestamp,
            exchange.assistant_message_id,
            exchange.assistant_timestamp,
            exchange.duration_seconds,
            exchange.user_content,
        ])?;
    }
    Ok(written)
}

pub(crate) fn clear_session_exchanges(conn: &Connection, session_id: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM exchanges WHERE session_id = ?1", [session_id])?)
}

impl Db {
    /// Turns of one session in start order.
    pub fn list_exchanges(&self, session_id: i64) -> Result<Vec<Exchange>> {
        let sql = format!(
            "SELECT {EXCHANGE_COLUMNS} FROM exchanges WHERE session_id = ?1 ORDER BY user_timestamp ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([session_id], row_to_exchange)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn exchange_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM exchanges", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
