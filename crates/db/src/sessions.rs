use rusqlite::{Connection, OptionalExtension, params};
use tracker_core::{NewSession, NewSubagent, Session, Subagent};

use crate::Db;
use crate::error::{DbError, Result};
use crate::helpers::{SESSION_COLUMNS, SUBAGENT_COLUMNS, row_to_session, row_to_subagent};

/// Inserts the session or widens the stored one: the time range grows to the
/// union of both and null columns are filled, but set columns are kept.
pub(crate) fn upsert_session(conn: &Connection, session: &NewSession) -> Result<i64> {
    let id = conn.query_row(
        r#"
        INSERT INTO sessions (external_id, project, start_time, end_time, model, version, custom_title)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(external_id) DO UPDATE SET
          project = COALESCE(sessions.project, excluded.project),
          start_time = CASE
            WHEN excluded.start_time IS NULL THEN sessions.start_time
            WHEN sessions.start_time IS NULL THEN excluded.start_time
            ELSE MIN(sessions.start_time, excluded.start_time)
          END,
          end_time = CASE
            WHEN excluded.end_time IS NULL THEN sessions.end_time
            WHEN sessions.end_time IS NULL THEN excluded.end_time
            ELSE MAX(sessions.end_time, excluded.end_time)
          END,
          model = COALESCE(sessions.model, excluded.model),
          version = COALESCE(sessions.version, excluded.version),
          custom_title = COALESCE(sessions.custom_title, excluded.custom_title)
        RETURNING id
        "#,
        params![
            session.external_id,
            session.project,
            session.start_time,
            session.end_time,
            session.model,
            session.version,
            session.custom_title,
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Same widening rules as [`upsert_session`]. The owning session of an
/// existing sub-agent never changes.
pub(crate) fn upsert_subagent(conn: &Connection, subagent: &NewSubagent) -> Result<i64> {
    let id = conn.query_row(
        r#"
        INSERT INTO subagents (external_id, session_id, agent_type, start_time, end_time)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(external_id) DO UPDATE SET
          agent_type = COALESCE(subagents.agent_type, excluded.agent_type),
          start_time = CASE
            WHEN excluded.start_time IS NULL THEN subagents.start_time
            WHEN subagents.start_time IS NULL THEN excluded.start_time
            ELSE MIN(subagents.start_time, excluded.start_time)
          END,
          end_time = CASE
            WHEN excluded.end_time IS NULL THEN subagents.end_time
            WHEN subagents.end_time IS NULL THEN excluded.end_time
            ELSE MAX(subagents.end_time, excluded.end_time)
          END
        RETURNING id
        "#,
        params![
            subagent.external_id,
            subagent.session_id,
            subagent.agent_type,
            subagent.start_time,
            subagent.end_time,
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub(crate) fn session_id_by_external_id(conn: &Connection, external_id: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM sessions WHERE external_id = ?1",
            [external_id],
            |row| row.get(0),
        )
        .optional()?)
}

pub(crate) fn subagent_id_by_external_id(
    conn: &Connection,
    external_id: &str,
) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM subagents WHERE external_id = ?1",
            [external_id],
            |row| row.get(0),
        )
        .optional()?)
}

impl Db {
    pub fn upsert_session(&self, session: &NewSession) -> Result<i64> {
        upsert_session(&self.conn, session)
    }

    pub fn upsert_subagent(&self, subagent: &NewSubagent) -> Result<i64> {
        upsert_subagent(&self.conn, subagent)
    }

    pub fn session_id_by_external_id(&self, external_id: &str) -> Result<Option<i64>> {
        session_id_by_external_id(&self.conn, external_id)
    }

    pub fn subagent_id_by_external_id(&self, external_id: &str) -> Result<Option<i64>> {
        subagent_id_by_external_id(&self.conn, external_id)
    }

    pub fn get_session(&self, session_id: i64) -> Result<Option<Session>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [session_id], row_to_session)
            .optional()?)
    }

    pub fn get_session_by_external_id(&self, external_id: &str) -> Result<Option<Session>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE external_id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [external_id], row_to_session)
            .optional()?)
    }

    pub fn list_subagents(&self, session_id: i64) -> Result<Vec<Subagent>> {
        let sql = format!(
            "SELECT {SUBAGENT_COLUMNS} FROM subagents WHERE session_id = ?1 ORDER BY start_time ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([session_id], row_to_subagent)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Replaces the title outright; `None` clears it.
    pub fn update_session_custom_title(&self, session_id: i64, title: Option<&str>) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE sessions SET custom_title = ?1 WHERE id = ?2",
            params![title, session_id],
        )?;
        if updated == 0 {
            return Err(DbError::SessionNotFound(session_id));
        }
        Ok(())
    }

    /// Removes a session together with its usage records, exchanges and
    /// sub-agents.
    pub fn delete_session(&mut self, session_id: i64) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM usage_records WHERE session_id = ?1", [session_id])?;
        tx.execute("DELETE FROM exchanges WHERE session_id = ?1", [session_id])?;
        tx.execute("DELETE FROM subagents WHERE session_id = ?1", [session_id])?;
        let deleted = tx.execute("DELETE FROM sessions WHERE id = ?1", [session_id])?;
        if deleted == 0 {
            return Err(DbError::SessionNotFound(session_id));
        }
        tx.commit()?;
        Ok(())
    }

    /// Drops sessions that were stored under a sub-agent transcript name, along
    /// with everything attached to them. Returns the number of sessions removed.
    pub fn cleanup_orphaned_subagent_sessions(&mut self) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let orphaned = "SELECT id FROM sessions WHERE external_id LIKE 'agent-%'";
        tx.execute(
            &format!("DELETE FROM usage_records WHERE session_id IN ({orphaned})"),
            [],
        )?;
        tx.execute(
            &format!("DELETE FROM exchanges WHERE session_id IN ({orphaned})"),
            [],
        )?;
        tx.execute(
            &format!("DELETE FROM subagents WHERE session_id IN ({orphaned})"),
            [],
        )?;
        let removed = tx.execute("DELETE FROM sessions WHERE external_id LIKE 'agent-%'", [])?;
        tx.commit()?;
        Ok(removed)
    }
}
