mod parser;
mod paths;
mod pipeline;
mod resolver;
mod types;

pub use parser::{
    ExtractedTranscript, FileKind, ParsedTurn, ParsedUsage, extract_transcript, parse_json_line,
};
pub use paths::{
    default_claude_home, default_projects_dir, is_subagent_file, parent_external_id,
    project_from_path, projects_dir, session_external_id,
};
pub use pipeline::{sync_all, sync_file};
pub use types::{FileSyncResult, FullSyncResult, IngestError, Result, SyncIssue, SyncMode};
