use std::path::Path;

use rusqlite::Connection;

mod error;
mod exchanges;
mod helpers;
mod migrations;
mod sessions;
mod settings;
mod stats;
mod sync_state;
mod transaction;
mod types;
mod usage;

pub use error::{DbError, Result};
pub use transaction::SyncTx;
pub use types::SyncCheckpoint;

/// Storage context over one SQLite connection.
///
/// Read and one-off write operations live on `Db`; multi-row writes for a
/// single transcript go through [`SyncTx`].
pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    /// Fresh migrated store that lives only as long as the handle.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Starts the write transaction used to persist one file's pass.
    pub fn begin(&mut self) -> Result<SyncTx<'_>> {
        Ok(SyncTx::new(self.conn.transaction()?))
    }
}
