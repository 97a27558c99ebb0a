use rusqlite::Row;
use tracker_core::{Exchange, Session, Subagent, TokenCounts};

use crate::types::{SyncCheckpoint, TurnRow, UsageRow};

pub(crate) const SESSION_COLUMNS: &str =
    "id, external_id, project, start_time, end_time, model, version, custom_title, created_at";

pub(crate) const SUBAGENT_COLUMNS: &str =
    "id, external_id, session_id, agent_type, start_time, end_time";

pub(crate) const EXCHANGE_COLUMNS: &str = "session_id, user_message_id, user_timestamp, \
     assistant_message_id, assistant_timestamp, duration_seconds, user_content";

pub(crate) fn row_to_session(row: &Row<'_>) -> std::result::Result<Session, rusqlite::Error> {
    Ok(Session {
        id: row.get(0)?,
        external_id: row.get(1)?,
        project: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        model: row.get(5)?,
        version: row.get(6)?,
        custom_title: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub(crate) fn row_to_subagent(row: &Row<'_>) -> std::result::Result<Subagent, rusqlite::Error> {
    Ok(Subagent {
        id: row.get(0)?,
        external_id: row.get(1)?,
        session_id: row.get(2)?,
        agent_type: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
    })
}

pub(crate) fn row_to_exchange(row: &Row<'_>) -> std::result::Result<Exchange, rusqlite::Error> {
    Ok(Exchange {
        session_id: row.get(0)?,
        user_message_id: row.get(1)?,
        user_timestamp: row.get(2)?,
        assistant_message_id: row.get(3)?,
        assistant_timestamp: row.get(4)?,
        duration_seconds: row.get(5)?,
        user_content: row.get(6)?,
    })
}

pub(crate) fn row_to_checkpoint(
    row: &Row<'_>,
) -> std::result::Result<SyncCheckpoint, rusqlite::Error> {
    Ok(SyncCheckpoint {
        file_path: row.get(0)?,
        last_offset: row.get::<_, i64>(1)?.max(0) as u64,
        last_synced: row.get(2)?,
    })
}

/// Expects `session_id, subagent_id, timestamp, model` followed by the four
/// token columns.
pub(crate) fn row_to_usage_row(row: &Row<'_>) -> std::result::Result<UsageRow, rusqlite::Error> {
    Ok(UsageRow {
        session_id: row.get(0)?,
        subagent_id: row.get(1)?,
        timestamp: row.get(2)?,
        model: row.get(3)?,
        tokens: tokens_from_row(row, 4)?,
    })
}

pub(crate) fn row_to_turn_row(row: &Row<'_>) -> std::result::Result<TurnRow, rusqlite::Error> {
    Ok(TurnRow {
        session_id: row.get(0)?,
        user_timestamp: row.get(1)?,
        assistant_timestamp: row.get(2)?,
        duration_seconds: row.get(3)?,
    })
}

pub(crate) fn tokens_from_row(
    row: &Row<'_>,
    start: usize,
) -> std::result::Result<TokenCounts, rusqlite::Error> {
    Ok(TokenCounts {
        input_tokens: row.get::<_, i64>(start)?.max(0) as u64,
        output_tokens: row.get::<_, i64>(start + 1)?.max(0) as u64,
        cache_creation_input_tokens: row.get::<_, i64>(start + 2)?.max(0) as u64,
        cache_read_input_tokens: row.get::<_, i64>(start + 3)?.max(0) as u64,
    })
}
