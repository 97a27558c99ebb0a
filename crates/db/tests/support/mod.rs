#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension};

use tempfile::TempDir;
use tracker_core::{Exchange, NewSession, NewSubagent, TokenCounts, UsageRecord};
use tracker_db::Db;

pub struct TestDb {
    pub _dir: TempDir,
    pub db: Db,
    pub path: PathBuf,
}

pub fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("test.sqlite");
    let mut db = Db::open(&path).expect("open db");
    db.migrate().expect("migrate db");
    TestDb {
        _dir: dir,
        db,
        path,
    }
}

/// Number of session rows, read through a second connection.
pub fn session_count(db_path: &Path) -> usize {
    let conn = Connection::open(db_path).expect("open db");
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
        .expect("count sessions");
    count as usize
}

/// Stored token counts for the record with this assistant message id.
pub fn stored_tokens(db_path: &Path, message_id: &str) -> Option<TokenCounts> {
    let conn = Connection::open(db_path).expect("open db");
    conn.query_row(
        "SELECT input_tokens, output_tokens, cache_creation_input_tokens, cache_read_input_tokens
         FROM usage_records WHERE external_id = ?1",
        [message_id],
        |row| {
            Ok(TokenCounts {
                input_tokens: row.get::<_, i64>(0)? as u64,
                output_tokens: row.get::<_, i64>(1)? as u64,
                cache_creation_input_tokens: row.get::<_, i64>(2)? as u64,
                cache_read_input_tokens: row.get::<_, i64>(3)? as u64,
            })
        },
    )
    .optional()
    .expect("load tokens")
}

pub fn tokens(input: u64, output: u64, cache_write: u64, cache_read: u64) -> TokenCounts {
    TokenCounts {
        input_tokens: input,
        output_tokens: output,
        cache_creation_input_tokens: cache_write,
        cache_read_input_tokens: cache_read,
    }
}

pub fn make_session(external_id: &str, project: &str, start: &str, end: &str) -> NewSession {
    NewSession {
        external_id: external_id.to_string(),
        project: Some(project.to_string()),
        start_time: Some(start.to_string()),
        end_time: Some(end.to_string()),
        model: Some("claude-sonnet-4-20250514".to_string()),
        version: Some("2.0.0".to_string()),
        custom_title: None,
    }
}

pub fn insert_session(db: &Db, external_id: &str, project: &str, start: &str, end: &str) -> i64 {
    db.upsert_session(&make_session(external_id, project, start, end))
        .expect("upsert session")
}

pub fn insert_subagent(db: &Db, external_id: &str, session_id: i64, start: &str) -> i64 {
    db.upsert_subagent(&NewSubagent {
        external_id: external_id.to_string(),
        session_id,
        agent_type: None,
        start_time: Some(start.to_string()),
        end_time: Some(start.to_string()),
    })
    .expect("upsert subagent")
}

pub fn make_record(
    external_id: &str,
    session_id: i64,
    subagent_id: Option<i64>,
    timestamp: &str,
    model: &str,
    tokens: TokenCounts,
) -> UsageRecord {
    UsageRecord {
        external_id: external_id.to_string(),
        session_id,
        subagent_id,
        timestamp: timestamp.to_string(),
        model: Some(model.to_string()),
        tokens,
    }
}

pub fn insert_records(db: &mut Db, records: Vec<UsageRecord>) {
    db.upsert_usage_records(&records).expect("insert records");
}

pub fn make_exchange(session_id: i64, start: &str, end: &str, duration: f64) -> Exchange {
    Exchange {
        session_id,
        user_message_id: None,
        user_timestamp: start.to_string(),
        assistant_message_id: Some(format!("msg-{start}")),
        assistant_timestamp: Some(end.to_string()),
        duration_seconds: Some(duration),
        user_content: None,
    }
}

pub fn insert_exchanges(db: &mut Db, exchanges: Vec<Exchange>) {
    let tx = db.begin().expect("begin");
    tx.upsert_exchanges(&exchanges).expect("insert exchanges");
    tx.commit().expect("commit");
}
