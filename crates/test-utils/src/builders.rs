#![allow(dead_code)]

use std::path::Path;

use cmdseq::config::{ConfigFile, RawConfigFile};
use cmdseq::store::{JobRecord, RemoteTarget};
use cmdseq::types::{ExecMode, FailurePropagation, JobId, JobState};

/// Builder for `JobRecord`; starts as a PENDING SYNC job.
pub struct RecordBuilder {
    record: JobRecord,
}

impl RecordBuilder {
    pub fn new(id: JobId, command: &str) -> Self {
        Self {
            record: JobRecord::new(id, command),
        }
    }

    pub fn after(mut self, dep: JobId) -> Self {
        self.record.dependencies.push(dep);
        self
    }

    pub fn mode(mut self, mode: ExecMode) -> Self {
        self.record.mode = mode;
        self
    }

    pub fn background(self) -> Self {
        self.mode(ExecMode::Background)
    }

    pub fn remote(mut self, host: &str, user: &str, credential: &str) -> Self {
        self.record.mode = ExecMode::Remote;
        self.record.remote = RemoteTarget {
            host: host.to_string(),
            user: user.to_string(),
            credential: credential.to_string(),
        };
        self
    }

    pub fn fail_fast(mut self, val: bool) -> Self {
        self.record.fail_fast = val;
        self
    }

    pub fn state(mut self, state: JobState) -> Self {
        self.record.state = state;
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.record.label = label.to_string();
        self
    }

    pub fn build(self) -> JobRecord {
        self.record
    }
}

/// Builder for `ConfigFile` to simplify test setup.
///
/// Defaults differ from production where tests need them to: the listener
/// binds an ephemeral port and passes re-scan every 50ms.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.sequencer.port = 0;
        config.sequencer.poll_interval_ms = 50;
        Self { config }
    }

    pub fn store(mut self, path: &Path) -> Self {
        self.config.sequencer.store = path.to_path_buf();
        self
    }

    pub fn work_dir(mut self, path: &Path) -> Self {
        self.config.background.work_dir = path.to_path_buf();
        self
    }

    pub fn notify_program(mut self, program: &str) -> Self {
        self.config.background.notify_program = Some(program.into());
        self
    }

    pub fn failure_propagation(mut self, policy: FailurePropagation) -> Self {
        self.config.sequencer.failure_propagation = policy;
        self
    }

    pub fn running_timeout_secs(mut self, secs: u64) -> Self {
        self.config.sequencer.running_timeout_secs = Some(secs);
        self
    }

    pub fn shutdown_sentinel(mut self, sentinel: &str) -> Self {
        self.config.sequencer.shutdown_sentinel = sentinel.to_string();
        self
    }

    pub fn ping_program(mut self, program: &str) -> Self {
        self.config.remote.ping_program = program.to_string();
        self
    }

    pub fn ssh_program(mut self, program: &str) -> Self {
        self.config.remote.ssh_program = program.to_string();
        self
    }

    pub fn sshpass_program(mut self, program: &str) -> Self {
        self.config.remote.sshpass_program = program.to_string();
        self
    }

    pub fn remote_dir(mut self, dir: &Path) -> Self {
        self.config.remote.remote_dir = dir.to_string_lossy().into_owned();
        self
    }

    pub fn remote_notify_program(mut self, program: &str) -> Self {
        self.config.remote.notify_program = program.to_string();
        self
    }

    pub fn remote_callback_host(mut self, host: &str) -> Self {
        self.config.remote.callback_host = Some(host.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
