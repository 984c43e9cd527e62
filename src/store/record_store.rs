// src/store/record_store.rs

//! The persisted record list and the lock that guards it.
//!
//! Every mutation goes through `lock -> load -> mutate -> save -> unlock`;
//! [`RecordStore::update`] packages that cycle.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::dag::DependencyGraph;
use crate::errors::{Result, SequencerError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::store::codec::RecordCodec;
use crate::store::record::JobRecord;

/// Shared job record store.
///
/// The lock is process-wide for all holders of the same `RecordStore`
/// (share it through an `Arc`). Nothing else may touch the file while the
/// sequencer runs.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    codec: RecordCodec,
    fs: Arc<dyn FileSystem>,
    lock: Mutex<()>,
}

/// Exclusive access to the store. Dropping the guard unlocks.
pub struct StoreGuard<'a> {
    store: &'a RecordStore,
    _guard: MutexGuard<'a, ()>,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>, codec: RecordCodec) -> Self {
        Self::with_fs(path, codec, Arc::new(RealFileSystem))
    }

    pub fn with_fs(path: impl Into<PathBuf>, codec: RecordCodec, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            codec,
            fs,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn codec(&self) -> &RecordCodec {
        &self.codec
    }

    /// Wait for exclusive access.
    pub async fn lock(&self) -> StoreGuard<'_> {
        let guard = self.lock.lock().await;
        trace!(path = ?self.path, "store locked");
        StoreGuard {
            store: self,
            _guard: guard,
        }
    }

    /// Lock, load, apply `f`, save if anything changed, unlock.
    ///
    /// When `f` fails nothing is written.
    pub async fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<JobRecord>) -> Result<T>,
    {
        let guard = self.lock().await;
        let original = guard.load()?;
        let mut records = original.clone();

        let value = f(&mut records)?;

        if records != original {
            guard.save(&records)?;
        } else {
            trace!(path = ?self.path, "store unchanged; skipping write");
        }
        Ok(value)
    }

    /// Locked read of the whole list.
    pub async fn snapshot(&self) -> Result<Vec<JobRecord>> {
        self.lock().await.load()
    }

    /// Load and check store-level invariants: duplicate ids are fatal,
    /// dependencies on unknown ids only produce a warning (those jobs can
    /// never become ready).
    pub async fn validate(&self) -> Result<Vec<JobRecord>> {
        if !self.fs.exists(&self.path) {
            return Err(SequencerError::ConfigError(format!(
                "record store {:?} does not exist",
                self.path
            )));
        }
        let records = self.snapshot().await?;

        let mut ids = HashSet::new();
        for record in &records {
            if !ids.insert(record.id) {
                return Err(SequencerError::DuplicateId(record.id));
            }
        }

        for (job_id, dependency) in DependencyGraph::from_records(&records).dangling() {
            warn!(
                job_id,
                dependency, "job depends on an id missing from the store; it will wait forever"
            );
        }

        Ok(records)
    }
}

impl StoreGuard<'_> {
    /// Read and decode the full list.
    pub fn load(&self) -> Result<Vec<JobRecord>> {
        let text = self.store.fs.read_to_string(&self.store.path)?;
        let records = self.store.codec.decode_all(&text)?;
        debug!(path = ?self.store.path, count = records.len(), "store loaded");
        Ok(records)
    }

    /// Truncate and rewrite the full list.
    pub fn save(&self, records: &[JobRecord]) -> Result<()> {
        let text = self.store.codec.encode_all(records);
        self.store.fs.write(&self.store.path, text.as_bytes())?;
        debug!(path = ?self.store.path, count = records.len(), "store saved");
        Ok(())
    }
}
