use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::Db;
use crate::error::Result;
use crate::helpers::row_to_checkpoint;
use crate::types::SyncCheckpoint;

pub(crate) fn update_sync_state(conn: &Connection, file_path: &str, last_offset: u64) -> Result<()> {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    conn.execute(
        r#"
        INSERT INTO sync_state (file_path, last_offset, last_synced)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(file_path) DO UPDATE SET
          last_offset = excluded.last_offset,
          last_synced = excluded.last_synced
        "#,
        params![file_path, i64::try_from(last_offset).unwrap_or(i64::MAX), now],
    )?;
    Ok(())
}

impl Db {
    pub fn get_sync_state(&self, file_path: &str) -> Result<Option<SyncCheckpoint>> {
        Ok(self
            .conn
            .query_row(
                "SELECT file_path, last_offset, last_synced FROM sync_state WHERE file_path = ?1",
                [file_path],
                row_to_checkpoint,
            )
            .optional()?)
    }

    pub fn update_sync_state(&self, file_path: &str, last_offset: u64) -> Result<()> {
        update_sync_state(&self.conn, file_path, last_offset)
    }
}
