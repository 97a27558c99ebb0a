use std::path::{Path, PathBuf};
use std::time::{Duration as StdDuration, Instant};
use std::{env, fs, io};

use tracing::{debug, info, warn};
use tracker_core::{Exchange, UsageRecord};
use tracker_db::Db;
use walkdir::WalkDir;

use crate::parser::{ExtractedTranscript, FileKind, extract_transcript};
use crate::paths::{
    is_subagent_file, is_transcript_path, project_from_path, session_external_id, subagents_dir,
};
use crate::resolver::{RecordOwner, TranscriptIdentity, clear_previous_rows, resolve_owner};
use crate::types::{FileSyncResult, FullSyncResult, IngestError, Result, SyncIssue, SyncMode};

const TIMING_ENV: &str = "CLAUDE_TRACKER_INGEST_TIMING";

fn timing_enabled() -> bool {
    env::var(TIMING_ENV).is_ok()
}

/// Syncs one transcript. A main transcript also pulls in every sub-agent
/// transcript stored under `<dir>/<stem>/subagents/`, counting their records
/// in the returned total.
pub fn sync_file(
    db: &mut Db,
    projects_root: &Path,
    path: &Path,
    mode: SyncMode,
) -> Result<FileSyncResult> {
    let mut result = sync_transcript(db, projects_root, path, mode)?;
    if is_subagent_file(path) {
        return Ok(result);
    }
    for subagent_path in subagent_transcripts(path) {
        match sync_transcript(db, projects_root, &subagent_path, mode) {
            Ok(sub) => result.usage_records_imported += sub.usage_records_imported,
            Err(err) => warn!(
                file = %subagent_path.display(),
                error = %err,
                "failed to sync sub-agent transcript"
            ),
        }
    }
    Ok(result)
}

/// Full rebuild of every transcript under `projects_root`. Main transcripts are
/// processed before sub-agent transcripts. Failures on single files are
/// logged and collected; only database-wide failures abort the run.
pub fn sync_all(db: &mut Db, projects_root: &Path) -> Result<FullSyncResult> {
    let started = Instant::now();
    let mut stats = FullSyncResult {
        orphaned_sessions_removed: db.cleanup_orphaned_subagent_sessions()?,
        ..FullSyncResult::default()
    };
    if stats.orphaned_sessions_removed > 0 {
        info!(
            removed = stats.orphaned_sessions_removed,
            "removed sessions created from sub-agent files"
        );
    }
    if !projects_root.is_dir() {
        warn!(root = %projects_root.display(), "projects directory does not exist");
        return Ok(stats);
    }

    let mut files = discover_transcripts(projects_root, &mut stats.issues);
    files.sort_by_key(|path| is_subagent_file(path));

    for path in files {
        stats.files_scanned += 1;
        match sync_transcript(db, projects_root, &path, SyncMode::Full) {
            Ok(result) => {
                if result.usage_records_imported > 0 {
                    stats.sessions_imported += 1;
                    stats.usage_records_imported += result.usage_records_imported;
                }
            }
            Err(err) => {
                warn!(file = %path.display(), error = %err, "failed to sync transcript");
                stats.issues.push(SyncIssue {
                    file_path: path.to_string_lossy().into_owned(),
                    message: err.to_string(),
                });
            }
        }
    }

    info!(
        files = stats.files_scanned,
        sessions = stats.sessions_imported,
        records = stats.usage_records_imported,
        issues = stats.issues.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "full sync finished"
    );
    Ok(stats)
}

fn discover_transcripts(root: &Path, issues: &mut Vec<SyncIssue>) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_transcript_path(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Err(err) => {
                let file_path = err
                    .path()
                    .map(|path| path.to_string_lossy().into_owned())
                    .unwrap_or_default();
                warn!(file = %file_path, error = %err, "failed to read projects directory entry");
                issues.push(SyncIssue {
                    file_path,
                    message: err.to_string(),
                });
            }
        }
    }
    files
}

fn subagent_transcripts(main_path: &Path) -> Vec<PathBuf> {
    let Some(dir) = subagents_dir(main_path) else {
        return Vec::new();
    };
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_transcript_path(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// One file, one transaction: rows and the checkpoint land together or not at
/// all.
fn sync_transcript(
    db: &mut Db,
    projects_root: &Path,
    path: &Path,
    mode: SyncMode,
) -> Result<FileSyncResult> {
    let file_start = Instant::now();
    let external_id = session_external_id(path);
    let project = project_from_path(path, projects_root);
    let mut result = FileSyncResult {
        session_external_id: external_id.clone(),
        project: project.clone(),
        ..FileSyncResult::default()
    };

    let metadata = match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return Err(IngestError::FileNotFound(path.to_path_buf())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(IngestError::FileNotFound(path.to_path_buf()));
        }
        Err(err) => return Err(err.into()),
    };
    let file_key = path.to_string_lossy().into_owned();

    if mode == SyncMode::Incremental
        && let Some(checkpoint) = db.get_sync_state(&file_key)?
        && checkpoint.last_offset >= metadata.len()
    {
        debug!(file = %file_key, offset = checkpoint.last_offset, "transcript unchanged");
        return Ok(result);
    }

    let kind = if is_subagent_file(path) {
        FileKind::Subagent
    } else {
        FileKind::Main
    };
    let identity = TranscriptIdentity {
        path,
        kind,
        external_id: &external_id,
        project: project.as_deref(),
    };

    let bytes = fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    let extracted = extract_transcript(&content, kind);
    let parse_duration = file_start.elapsed();
    if extracted.malformed_lines > 0 {
        debug!(file = %file_key, lines = extracted.malformed_lines, "skipped malformed lines");
    }

    let db_start = Instant::now();
    let tx = db.begin()?;
    if mode == SyncMode::Full {
        clear_previous_rows(&tx, &identity)?;
    }
    if !extracted.usage.is_empty() {
        let owner = resolve_owner(&tx, &identity, &extracted)?;
        result.usage_records_imported = tx.upsert_usage_records(&usage_records(&extracted, owner))?;
        if kind == FileKind::Main {
            result.exchanges_imported =
                tx.upsert_exchanges(&exchanges(&extracted, owner.session_id))?;
        }
    }
    tx.update_sync_state(&file_key, bytes.len() as u64)?;
    tx.commit()?;

    if kind == FileKind::Main && !extracted.usage.is_empty() && extracted.turns.is_empty() {
        warn!(
            file = %file_key,
            records = extracted.usage.len(),
            "transcript has usage but no user turns; the transcript format may have changed"
        );
    }
    log_file_timing(&file_key, &result, parse_duration, db_start.elapsed());
    Ok(result)
}

fn usage_records(extracted: &ExtractedTranscript, owner: RecordOwner) -> Vec<UsageRecord> {
    extracted
        .usage
        .iter()
        .map(|usage| UsageRecord {
            external_id: usage.external_id.clone(),
            session_id: owner.session_id,
            subagent_id: owner.subagent_id,
            timestamp: usage.timestamp.clone(),
            model: usage.model.clone(),
            tokens: usage.tokens,
        })
        .collect()
}

fn exchanges(extracted: &ExtractedTranscript, session_id: i64) -> Vec<Exchange> {
    extracted
        .turns
        .iter()
        .map(|turn| Exchange {
            session_id,
            user_message_id: turn.user_message_id.clone(),
            user_timestamp: turn.user_timestamp.clone(),
            assistant_message_id: turn.assistant_message_id.clone(),
            assistant_timestamp: Some(turn.assistant_timestamp.clone()),
            duration_seconds: turn.duration_seconds,
            user_content: turn.user_content.clone(),
        })
        .collect()
}

fn log_file_timing(
    file_key: &str,
    result: &FileSyncResult,
    parse_duration: StdDuration,
    db_duration: StdDuration,
) {
    if timing_enabled() {
        info!(
            file = %file_key,
            records = result.usage_records_imported,
            exchanges = result.exchanges_imported,
            read_ms = parse_duration.as_millis() as u64,
            db_ms = db_duration.as_millis() as u64,
            "sync file timing"
        );
    } else {
        debug!(
            file = %file_key,
            records = result.usage_records_imported,
            exchanges = result.exchanges_imported,
            "synced transcript"
        );
    }
}
