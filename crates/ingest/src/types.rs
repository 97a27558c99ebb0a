use serde::Serialize;
use std::io;
use std::path::PathBuf;

/// Outcome of syncing one transcript (plus, for a main transcript, its
/// sub-agent transcripts).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileSyncResult {
    pub session_external_id: String,
    pub usage_records_imported: usize,
    pub exchanges_imported: usize,
    pub project: Option<String>,
}

/// Totals returned by a sync over the whole projects tree.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FullSyncResult {
    pub sessions_imported: usize,
    pub usage_records_imported: usize,
    pub files_scanned: usize,
    pub orphaned_sessions_removed: usize,
    pub issues: Vec<SyncIssue>,
}

/// A file that failed during a batch sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncIssue {
    pub file_path: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Skip files whose checkpoint already covers their current size.
    Incremental,
    /// Clear the rows a file produced and rebuild them from byte zero.
    Full,
}

/// Errors emitted by the sync pipeline.
#[derive(Debug)]
pub enum IngestError {
    Io(io::Error),
    Db(tracker_db::DbError),
    FileNotFound(PathBuf),
    MissingParent(PathBuf),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Db(err) => write!(f, "db error: {}", err),
            Self::FileNotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::MissingParent(path) => write!(
                f,
                "cannot derive parent session from sub-agent path: {}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::FileNotFound(_) | Self::MissingParent(_) => None,
        }
    }
}

impl From<io::Error> for IngestError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<tracker_db::DbError> for IngestError {
    fn from(err: tracker_db::DbError) -> Self {
        Self::Db(err)
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
