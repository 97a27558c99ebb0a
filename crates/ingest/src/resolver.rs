use std::path::Path;

use tracker_core::{NewSession, NewSubagent};
use tracker_db::SyncTx;

use crate::parser::{ExtractedTranscript, FileKind};
use crate::paths::parent_external_id;
use crate::types::{IngestError, Result};

/// Where a transcript's usage records are filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordOwner {
    pub session_id: i64,
    pub subagent_id: Option<i64>,
}

/// Identity of a transcript as derived from its path.
#[derive(Debug, Clone)]
pub(crate) struct TranscriptIdentity<'a> {
    pub path: &'a Path,
    pub kind: FileKind,
    pub external_id: &'a str,
    pub project: Option<&'a str>,
}

impl TranscriptIdentity<'_> {
    fn parent_external_id(&self) -> Result<String> {
        parent_external_id(self.path).ok_or_else(|| IngestError::MissingParent(self.path.to_path_buf()))
    }
}

/// Creates or widens the rows the transcript belongs to and returns the ids
/// its records should carry. A sub-agent whose parent has not been seen yet
/// gets a placeholder parent session.
pub(crate) fn resolve_owner(
    tx: &SyncTx<'_>,
    identity: &TranscriptIdentity<'_>,
    extracted: &ExtractedTranscript,
) -> Result<RecordOwner> {
    match identity.kind {
        FileKind::Main => {
            let session_id = tx.upsert_session(&NewSession {
                external_id: identity.external_id.to_string(),
                project: identity.project.map(str::to_string),
                start_time: extracted.first_timestamp.clone(),
                end_time: extracted.last_timestamp.clone(),
                model: extracted.model.clone(),
                version: extracted.version.clone(),
                custom_title: extracted.custom_title.clone(),
            })?;
            Ok(RecordOwner {
                session_id,
                subagent_id: None,
            })
        }
        FileKind::Subagent => {
            let parent = identity.parent_external_id()?;
            let session_id = match tx.session_id_by_external_id(&parent)? {
                Some(id) => id,
                None => tx.upsert_session(&NewSession::placeholder(
                    &parent,
                    identity.project.map(str::to_string),
                ))?,
            };
            let subagent_id = tx.upsert_subagent(&NewSubagent {
                external_id: identity.external_id.to_string(),
                session_id,
                agent_type: extracted.model.clone(),
                start_time: extracted.first_timestamp.clone(),
                end_time: extracted.last_timestamp.clone(),
            })?;
            Ok(RecordOwner {
                session_id,
                subagent_id: Some(subagent_id),
            })
        }
    }
}

/// Removes what an earlier pass over this transcript stored, without creating
/// anything. Used before a full rebuild.
pub(crate) fn clear_previous_rows(
    tx: &SyncTx<'_>,
    identity: &TranscriptIdentity<'_>,
) -> Result<()> {
    match identity.kind {
        FileKind::Main => {
            if let Some(session_id) = tx.session_id_by_external_id(identity.external_id)? {
                tx.clear_main_file_rows(session_id)?;
            }
        }
        FileKind::Subagent => {
            if let Some(subagent_id) = tx.subagent_id_by_external_id(identity.external_id)? {
                tx.clear_subagent_rows(subagent_id)?;
            }
        }
    }
    Ok(())
}
