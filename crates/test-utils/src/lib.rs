pub mod builders;
pub mod fake_dispatcher;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use tempfile::TempDir;
use tracing_subscriber::{EnvFilter, fmt};

use cmdseq::config::ConfigFile;
use cmdseq::store::{JobRecord, RecordCodec, RecordStore};
use cmdseq::types::{JobId, JobState};

use crate::builders::ConfigFileBuilder;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 10-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}

/// A store file and BACKGROUND work dir inside a temp directory, plus a
/// config pointing at both.
pub struct TempStore {
    dir: TempDir,
    path: PathBuf,
}

impl TempStore {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("jobs.txt");
        std::fs::write(&path, "").expect("create store file");
        Self { dir, path }
    }

    /// Create a store holding `records`.
    pub fn with_records(records: &[JobRecord]) -> Self {
        let store = Self::new();
        store.write(records);
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Builder preset with this store and a work dir under the temp dir.
    pub fn config_builder(&self) -> ConfigFileBuilder {
        ConfigFileBuilder::new()
            .store(&self.path)
            .work_dir(&self.dir.path().join("work"))
    }

    pub fn config(&self) -> ConfigFile {
        self.config_builder().build()
    }

    /// Overwrite the file with `records` in the default line format.
    pub fn write(&self, records: &[JobRecord]) {
        let text = RecordCodec::default().encode_all(records);
        std::fs::write(&self.path, text).expect("write store file");
    }

    pub fn write_raw(&self, text: &str) {
        std::fs::write(&self.path, text).expect("write store file");
    }

    pub fn read_raw(&self) -> String {
        std::fs::read_to_string(&self.path).expect("read store file")
    }

    /// Decode the file in the default line format.
    pub fn read(&self) -> Vec<JobRecord> {
        RecordCodec::default()
            .decode_all(&self.read_raw())
            .expect("decode store file")
    }

    /// Like [`TempStore::read`], but `None` while a concurrent rewrite has
    /// left the file half written.
    pub fn try_read(&self) -> Option<Vec<JobRecord>> {
        let text = std::fs::read_to_string(&self.path).ok()?;
        RecordCodec::default().decode_all(&text).ok()
    }

    /// Poll until job `id` is in `state`; gives up after 10 seconds.
    pub async fn wait_for_state(&self, id: JobId, state: JobState) {
        with_timeout(async {
            loop {
                let reached = self
                    .try_read()
                    .is_some_and(|records| records.iter().any(|r| r.id == id && r.state == state));
                if reached {
                    return;
                }
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
        })
        .await
    }

    /// Shared store handle using `cfg`'s line format.
    pub fn open(&self, cfg: &ConfigFile) -> Arc<RecordStore> {
        Arc::new(RecordStore::new(
            self.path.clone(),
            RecordCodec::new(cfg.format.clone()),
        ))
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Send one raw payload to a listener, the way the notifier does.
pub async fn send_payload(addr: SocketAddr, payload: &str) {
    let dial = cmdseq::protocol::dial_addr(addr);
    cmdseq::protocol::send(&dial.ip().to_string(), dial.port(), payload)
        .await
        .expect("send payload to listener");
}
