use tracker_core::TokenCounts;

/// Byte offset consumed from one transcript file by its last sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCheckpoint {
    pub file_path: String,
    pub last_offset: u64,
    pub last_synced: String,
}

#[derive(Debug, Clone)]
pub(crate) struct UsageRow {
    pub session_id: i64,
    pub subagent_id: Option<i64>,
    pub timestamp: String,
    pub model: Option<String>,
    pub tokens: TokenCounts,
}

#[derive(Debug, Clone)]
pub(crate) struct TurnRow {
    pub session_id: i64,
    pub user_timestamp: String,
    pub assistant_timestamp: Option<String>,
    pub duration_seconds: Option<f64>,
}
