use rusqlite::Connection;

use crate::Db;
use crate::error::Result;

const MIGRATION_0001: &str = include_str!("../migrations/0001_init.sql");
const MIGRATION_0002: &str = include_str!("../migrations/0002_add_custom_title.sql");
const MIGRATION_0003: &str = include_str!("../migrations/0003_add_exchanges.sql");
const MIGRATION_0004: &str = include_str!("../migrations/0004_add_settings.sql");

const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_init", MIGRATION_0001),
    ("0002_add_custom_title", MIGRATION_0002),
    ("0003_add_exchanges", MIGRATION_0003),
    ("0004_add_settings", MIGRATION_0004),
];

impl Db {
    /// Applies every migration. Safe to run on each start: table creation is
    /// conditional and column additions are skipped when already present.
    pub fn migrate(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for (name, sql) in MIGRATIONS {
            if *name == "0002_add_custom_title"
                && table_has_column(&tx, "sessions", "custom_title")?
            {
                continue;
            }
            tx.execute_batch(sql)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
