// src/store/record.rs

//! The job record and its state transitions.

use std::fmt;

use chrono::NaiveDateTime;

use crate::errors::{Result, SequencerError};
use crate::types::{ExecMode, JobId, JobState};

/// On-disk timestamp format for `startedAt` / `finishedAt`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time, truncated to whole seconds so it survives a
/// save/load round trip unchanged.
pub fn now() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    NaiveDateTime::parse_from_str(&now.format(TIMESTAMP_FORMAT).to_string(), TIMESTAMP_FORMAT)
        .unwrap_or(now)
}

/// Where and as whom a REMOTE job runs. All fields are empty for local jobs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RemoteTarget {
    pub host: String,
    pub user: String,
    pub credential: String,
}

impl RemoteTarget {
    /// `user@host`, or just `host` when no user is set.
    pub fn destination(&self) -> String {
        if self.user.is_empty() {
            self.host.clone()
        } else {
            format!("{}@{}", self.user, self.host)
        }
    }
}

// The credential never reaches logs.
impl fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTarget")
            .field("host", &self.host)
            .field("user", &self.user)
            .field(
                "credential",
                &if self.credential.is_empty() { "" } else { "<redacted>" },
            )
            .finish()
    }
}

/// One line of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub id: JobId,
    pub state: JobState,
    /// Ids that must reach DONE before this job may run, in file order.
    pub dependencies: Vec<JobId>,
    /// Opaque consumer metadata, carried through unchanged.
    pub label: String,
    pub mode: ExecMode,
    pub fail_fast: bool,
    pub remote: RemoteTarget,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
    /// Opaque shell command.
    pub command: String,
}

impl JobRecord {
    /// A fresh PENDING SYNC record with no dependencies.
    pub fn new(id: JobId, command: impl Into<String>) -> Self {
        Self {
            id,
            state: JobState::Pending,
            dependencies: Vec::new(),
            label: String::new(),
            mode: ExecMode::Sync,
            fail_fast: false,
            remote: RemoteTarget::default(),
            started_at: None,
            finished_at: None,
            command: command.into(),
        }
    }

    /// Move to `to`, stamping `startedAt` on RUNNING and `finishedAt` on
    /// DONE/FAILED. Illegal transitions leave the record untouched.
    pub fn transition(&mut self, to: JobState, at: NaiveDateTime) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(SequencerError::InvalidTransition {
                id: self.id,
                from: self.state,
                to,
            });
        }

        match to {
            JobState::Running => self.started_at = Some(at),
            JobState::Done | JobState::Failed => self.finished_at = Some(at),
            _ => {}
        }
        self.state = to;
        Ok(())
    }
}

/// Index of the record with `id`, by linear scan.
pub fn position_of(records: &[JobRecord], id: JobId) -> Option<usize> {
    records.iter().position(|r| r.id == id)
}

/// Whether any record is not yet terminal.
pub fn any_unfinished(records: &[JobRecord]) -> bool {
    records.iter().any(|r| !r.state.is_terminal())
}
