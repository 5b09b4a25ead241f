use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;

/// Resume cursor for one acquisition source: the last fully processed page
/// and the natural keys of every item already extracted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceCursor {
    pub last_page: u32,
    pub processed_keys: BTreeSet<String>,
}

/// On-disk shape: one JSON object keyed by source name, so several scrapers
/// can share a checkpoint file as long as each source has a single writer.
type CheckpointFile = BTreeMap<String, SourceCursor>;

/// Crash-safe `(last_page, processed_keys)` store for one named source.
///
/// Marks are buffered in memory; `flush()` rewrites the file atomically, so
/// anything flushed survives a crash and anything after the last flush is
/// re-done on restart. Duplicate marks are no-ops, which makes the re-doing
/// harmless.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    source: String,
    entries: CheckpointFile,
}

impl CheckpointStore {
    /// Opens the checkpoint file and binds this handle to `source`.
    ///
    /// A missing file starts a fresh cursor. A file that exists but cannot
    /// be parsed is fatal: the operator decides whether to discard it.
    pub fn open(path: impl Into<PathBuf>, source: &str) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckpointFile::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            source: source.to_string(),
            entries,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_page(&self) -> u32 {
        self.cursor().map(|c| c.last_page).unwrap_or(0)
    }

    pub fn is_processed(&self, key: &str) -> bool {
        self.cursor()
            .map(|c| c.processed_keys.contains(key))
            .unwrap_or(false)
    }

    pub fn processed_count(&self) -> usize {
        self.cursor().map(|c| c.processed_keys.len()).unwrap_or(0)
    }

    /// Records a processed key. Returns `false` when the key was already
    /// present (the duplicate mark is a no-op).
    pub fn mark_processed(&mut self, key: &str) -> bool {
        self.cursor_mut().processed_keys.insert(key.to_string())
    }

    pub fn set_last_page(&mut self, page: u32) {
        self.cursor_mut().last_page = page;
    }

    /// Atomically rewrites the whole file (write to a sibling temp path,
    /// then rename). After this returns, a crash loses nothing.
    pub fn flush(&self) -> Result<(), StoreError> {
        let payload = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(
            source = %self.source,
            last_page = self.last_page(),
            processed = self.processed_count(),
            "checkpoint flushed"
        );
        Ok(())
    }

    fn cursor(&self) -> Option<&SourceCursor> {
        self.entries.get(&self.source)
    }

    fn cursor_mut(&mut self) -> &mut SourceCursor {
        self.entries.entry(self.source.clone()).or_default()
    }
}
