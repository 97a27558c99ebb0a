#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use tempfile::TempDir;
use tracker_core::TokenCounts;
use tracker_db::Db;

pub const PROJECT_DIR: &str = "-Users-dev-app";

/// A temporary Claude home with a migrated database next to it.
pub struct Workspace {
    pub _dir: TempDir,
    pub db: Db,
    pub db_path: PathBuf,
    pub projects_root: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("usage.sqlite");
        let mut db = Db::open(&db_path).expect("open db");
        db.migrate().expect("migrate db");
        let projects_root = dir.path().join(".claude").join("projects");
        fs::create_dir_all(projects_root.join(PROJECT_DIR)).expect("create project dir");
        Self {
            _dir: dir,
            db,
            db_path,
            projects_root,
        }
    }

    /// Number of session rows, read through a second connection.
    pub fn session_count(&self) -> usize {
        let count: i64 = self
            .inspect()
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .expect("count sessions");
        count as usize
    }

    /// Stored token counts for the record with this assistant message id.
    pub fn stored_tokens(&self, message_id: &str) -> Option<TokenCounts> {
        self.inspect()
            .query_row(
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

    fn inspect(&self) -> Connection {
        Connection::open(&self.db_path).expect("open db")
    }

    pub fn main_path(&self, session: &str) -> PathBuf {
        self.projects_root
            .join(PROJECT_DIR)
            .join(format!("{session}.jsonl"))
    }

    pub fn subagent_path(&self, session: &str, agent: &str) -> PathBuf {
        self.projects_root
            .join(PROJECT_DIR)
            .join(session)
            .join("subagents")
            .join(format!("{agent}.jsonl"))
    }

    pub fn write_main(&self, session: &str, lines: &[String]) -> PathBuf {
        let path = self.main_path(session);
        write_lines(&path, lines);
        path
    }

    pub fn write_subagent(&self, session: &str, agent: &str, lines: &[String]) -> PathBuf {
        let path = self.subagent_path(session, agent);
        write_lines(&path, lines);
        path
    }
}

pub fn write_lines(path: &Path, lines: &[String]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create transcript dir");
    }
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(path, body).expect("write transcript");
}

pub fn user_line(uuid: &str, timestamp: &str, text: &str) -> String {
    json!({
        "type": "user",
        "uuid": uuid,
        "timestamp": timestamp,
        "version": "2.0.14",
        "message": { "role": "user", "content": text }
    })
    .to_string()
}

pub fn tool_result_line(timestamp: &str) -> String {
    json!({
        "type": "user",
        "timestamp": timestamp,
        "message": {
            "role": "user",
            "content": [{ "type": "tool_result", "tool_use_id": "toolu_1", "content": "ok" }]
        }
    })
    .to_string()
}

pub fn meta_user_line(timestamp: &str, text: &str) -> String {
    json!({
        "type": "user",
        "isMeta": true,
        "timestamp": timestamp,
        "message": { "role": "user", "content": text }
    })
    .to_string()
}

pub fn assistant_line(
    message_id: &str,
    timestamp: &str,
    model: Option<&str>,
    usage: [u64; 4],
) -> String {
    let mut message = json!({
        "id": message_id,
        "role": "assistant",
        "content": [{ "type": "text", "text": "..." }],
        "usage": {
            "input_tokens": usage[0],
            "output_tokens": usage[1],
            "cache_creation_input_tokens": usage[2],
            "cache_read_input_tokens": usage[3]
        }
    });
    if let Some(model) = model {
        message["model"] = json!(model);
    }
    json!({
        "type": "assistant",
        "timestamp": timestamp,
        "message": message
    })
    .to_string()
}

pub fn title_line(title: &str) -> String {
    json!({ "type": "custom-title", "customTitle": title }).to_string()
}

pub fn snapshot_line(timestamp: &str) -> String {
    json!({
        "type": "file-history-snapshot",
        "timestamp": timestamp,
        "snapshot": { "trackedFileBackups": {} }
    })
    .to_string()
}

pub const SONNET: &str = "claude-sonnet-4-20250514";

/// Three answered prompts taking 12s, 15s and 30s.
pub fn multi_turn_transcript() -> Vec<String> {
    vec![
        user_line("u1", "2025-01-15T10:00:00.000Z", "What is 2+2?"),
        assistant_line("msg-m1", "2025-01-15T10:00:05.000Z", Some(SONNET), [100, 20, 100, 200]),
        assistant_line("msg-m1", "2025-01-15T10:00:12.000Z", Some(SONNET), [100, 50, 100, 200]),
        user_line("u2", "2025-01-15T10:01:00.000Z", "What is the capital of France?"),
        tool_result_line("2025-01-15T10:01:05.000Z"),
        assistant_line("msg-m2", "2025-01-15T10:01:15.000Z", Some(SONNET), [50, 30, 0, 300]),
        user_line("u3", "2025-01-15T10:02:00.000Z", "Tell me a joke."),
        assistant_line("msg-m3", "2025-01-15T10:02:30.000Z", Some(SONNET), [40, 60, 0, 400]),
    ]
}
