// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::FailurePropagation;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [sequencer]
/// store = "jobs.txt"
/// bind = "0.0.0.0"
/// port = 5555
///
/// [format]
/// separator = ";"
///
/// [format.states]
/// done = "DONE"
///
/// [background]
/// work_dir = ".cmdseq"
///
/// [remote]
/// callback_host = "10.0.0.5"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub sequencer: SequencerSection,

    #[serde(default)]
    pub format: FormatSection,

    #[serde(default)]
    pub background: BackgroundSection,

    #[serde(default)]
    pub remote: RemoteSection,
}

/// Validated configuration. Only obtainable through
/// `ConfigFile::try_from(RawConfigFile)` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub sequencer: SequencerSection,
    pub format: FormatSection,
    pub background: BackgroundSection,
    pub remote: RemoteSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            sequencer: raw.sequencer,
            format: raw.format,
            background: raw.background,
            remote: raw.remote,
        }
    }
}

/// `[sequencer]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SequencerSection {
    /// Path of the job record store.
    #[serde(default = "default_store")]
    pub store: PathBuf,

    /// Address the completion listener binds to.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Completion listener port. `0` picks an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Payload that makes the listener stop accepting connections.
    #[serde(default = "default_shutdown_sentinel")]
    pub shutdown_sentinel: String,

    /// Upper bound on the idle wait between passes; callbacks wake the
    /// loop earlier.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub failure_propagation: FailurePropagation,

    /// RUNNING jobs older than this are marked FAILED. Unset means they
    /// wait for their callback forever.
    #[serde(default)]
    pub running_timeout_secs: Option<u64>,
}

fn default_store() -> PathBuf {
    PathBuf::from("jobs.txt")
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5555
}

fn default_shutdown_sentinel() -> String {
    "SHUTDOWN".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for SequencerSection {
    fn default() -> Self {
        Self {
            store: default_store(),
            bind: default_bind(),
            port: default_port(),
            shutdown_sentinel: default_shutdown_sentinel(),
            poll_interval_ms: default_poll_interval_ms(),
            failure_propagation: FailurePropagation::default(),
            running_timeout_secs: None,
        }
    }
}

/// `[format]` section: the tokens of the on-disk line format.
#[derive(Debug, Clone, Deserialize)]
pub struct FormatSection {
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Separator between ids inside the dependencies field.
    #[serde(default = "default_dependency_separator")]
    pub dependency_separator: String,

    #[serde(default)]
    pub states: StateTokens,

    #[serde(default)]
    pub modes: ModeTokens,

    #[serde(default)]
    pub flags: FlagTokens,
}

fn default_separator() -> String {
    ";".to_string()
}

fn default_dependency_separator() -> String {
    ",".to_string()
}

impl Default for FormatSection {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            dependency_separator: default_dependency_separator(),
            states: StateTokens::default(),
            modes: ModeTokens::default(),
            flags: FlagTokens::default(),
        }
    }
}

/// `[format.states]`. The `done` and `failed` tokens double as the
/// `<STATE>` part of completion callbacks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateTokens {
    pub pending: String,
    pub waiting: String,
    pub running: String,
    pub done: String,
    pub failed: String,
    pub blocked: String,
}

impl Default for StateTokens {
    fn default() -> Self {
        Self {
            pending: "PENDING".to_string(),
            waiting: "WAITING".to_string(),
            running: "RUNNING".to_string(),
            done: "DONE".to_string(),
            failed: "FAILED".to_string(),
            blocked: "BLOCKED".to_string(),
        }
    }
}

/// `[format.modes]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModeTokens {
    pub sync: String,
    pub background: String,
    pub remote: String,
}

impl Default for ModeTokens {
    fn default() -> Self {
        Self {
            sync: "SYNC".to_string(),
            background: "BACKGROUND".to_string(),
            remote: "REMOTE".to_string(),
        }
    }
}

/// `[format.flags]`: how the `failFast` boolean is written.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlagTokens {
    pub yes: String,
    pub no: String,
}

impl Default for FlagTokens {
    fn default() -> Self {
        Self {
            yes: "1".to_string(),
            no: "0".to_string(),
        }
    }
}

/// `[background]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BackgroundSection {
    /// Directory for wrapper scripts and per-job log files.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Interpreter used for SYNC commands and wrapper scripts.
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Program the wrapper calls to report completion. Defaults to the
    /// `cmdseq-notify` binary installed next to `cmdseq`.
    #[serde(default)]
    pub notify_program: Option<PathBuf>,

    /// Host local wrapper scripts connect to.
    #[serde(default = "default_callback_host")]
    pub callback_host: String,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".cmdseq")
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_callback_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for BackgroundSection {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            shell: default_shell(),
            notify_program: None,
            callback_host: default_callback_host(),
        }
    }
}

/// `[remote]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSection {
    #[serde(default = "default_ping_program")]
    pub ping_program: String,

    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,

    #[serde(default = "default_ssh_program")]
    pub ssh_program: String,

    /// Used to feed a password credential to `ssh`.
    #[serde(default = "default_sshpass_program")]
    pub sshpass_program: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Directory on the remote host for wrapper scripts and logs.
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,

    /// Notifier program path on the remote host.
    #[serde(default = "default_remote_notify_program")]
    pub notify_program: String,

    /// Address remote hosts use to reach the listener. REMOTE jobs fail to
    /// dispatch while this is unset.
    #[serde(default)]
    pub callback_host: Option<String>,
}

fn default_ping_program() -> String {
    "ping".to_string()
}

fn default_ping_timeout_secs() -> u64 {
    2
}

fn default_ssh_program() -> String {
    "ssh".to_string()
}

fn default_sshpass_program() -> String {
    "sshpass".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_remote_dir() -> String {
    "/tmp".to_string()
}

fn default_remote_notify_program() -> String {
    "cmdseq-notify".to_string()
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            ping_program: default_ping_program(),
            ping_timeout_secs: default_ping_timeout_secs(),
            ssh_program: default_ssh_program(),
            sshpass_program: default_sshpass_program(),
            connect_timeout_secs: default_connect_timeout_secs(),
            remote_dir: default_remote_dir(),
            notify_program: default_remote_notify_program(),
            callback_host: None,
        }
    }
}
