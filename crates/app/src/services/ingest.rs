use std::path::Path;

use crate::error::Result;
use crate::services::{SharedConfig, open_db};
use ingest::{FileSyncResult, FullSyncResult, SyncMode};
use tracker_db::Db;

#[derive(Clone)]
pub struct IngestService {
    config: SharedConfig,
}

impl IngestService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    /// Incremental sync of one transcript and its sub-agents.
    pub fn sync_file(&self, path: &Path) -> Result<FileSyncResult> {
        self.sync_file_with_mode(path, SyncMode::Incremental)
    }

    pub fn sync_file_with_mode(&self, path: &Path, mode: SyncMode) -> Result<FileSyncResult> {
        let mut db = self.db()?;
        Ok(ingest::sync_file(
            &mut db,
            &self.config.projects_root,
            path,
            mode,
        )?)
    }

    pub fn sync_all(&self) -> Result<FullSyncResult> {
        let mut db = self.db()?;
        Ok(ingest::sync_all(&mut db, &self.config.projects_root)?)
    }
}
