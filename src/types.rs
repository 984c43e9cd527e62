// src/types.rs

//! Small shared enums: job states, execution modes and the failure
//! propagation policy.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Identifier of a job record, unique within a store.
pub type JobId = u64;

/// Lifecycle state of a job record.
///
/// `Done`, `Failed` and `Blocked` are terminal: nothing ever leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Pending,
    Waiting,
    Running,
    Done,
    Failed,
    Blocked,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed | JobState::Blocked)
    }

    /// Still eligible for a resolver decision (`Pending` or `Waiting`).
    pub fn is_schedulable(self) -> bool {
        matches!(self, JobState::Pending | JobState::Waiting)
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        match self {
            JobState::Pending | JobState::Waiting => matches!(
                next,
                JobState::Waiting | JobState::Running | JobState::Blocked
            ),
            JobState::Running => matches!(next, JobState::Done | JobState::Failed),
            JobState::Done | JobState::Failed | JobState::Blocked => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "PENDING",
            JobState::Waiting => "WAITING",
            JobState::Running => "RUNNING",
            JobState::Done => "DONE",
            JobState::Failed => "FAILED",
            JobState::Blocked => "BLOCKED",
        };
        f.write_str(s)
    }
}

/// Execution strategy for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecMode {
    /// Run in the foreground; the outcome is known when the process exits.
    Sync,
    /// Detached local wrapper script reporting back over TCP.
    Background,
    /// Wrapper script started over SSH on `host`, reporting back over TCP.
    Remote,
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecMode::Sync => "SYNC",
            ExecMode::Background => "BACKGROUND",
            ExecMode::Remote => "REMOTE",
        };
        f.write_str(s)
    }
}

/// Outcome of a finished job process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failed(i32),
}

impl JobOutcome {
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            JobOutcome::Success
        } else {
            JobOutcome::Failed(code)
        }
    }

    /// Terminal state this outcome maps to.
    pub fn state(self) -> JobState {
        match self {
            JobOutcome::Success => JobState::Done,
            JobOutcome::Failed(_) => JobState::Failed,
        }
    }
}

/// How a `FAILED` dependency affects its dependents.
///
/// - `Strict`: any failed dependency blocks dependents (default).
/// - `Lenient`: a failed dependency whose `failFast` flag is off counts as
///   done; failed `failFast` dependencies still block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePropagation {
    #[default]
    Strict,
    Lenient,
}

impl FromStr for FailurePropagation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(FailurePropagation::Strict),
            "lenient" => Ok(FailurePropagation::Lenient),
            other => Err(format!(
                "invalid failure_propagation: {other} (expected \"strict\" or \"lenient\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_final() {
        for from in [JobState::Done, JobState::Failed, JobState::Blocked] {
            for to in [
                JobState::Pending,
                JobState::Waiting,
                JobState::Running,
                JobState::Done,
                JobState::Failed,
                JobState::Blocked,
            ] {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn running_only_reaches_done_or_failed() {
        assert!(JobState::Running.can_transition_to(JobState::Done));
        assert!(JobState::Running.can_transition_to(JobState::Failed));
        assert!(!JobState::Running.can_transition_to(JobState::Blocked));
        assert!(!JobState::Running.can_transition_to(JobState::Waiting));
    }

    #[test]
    fn pending_cannot_finish_without_running() {
        assert!(!JobState::Pending.can_transition_to(JobState::Done));
        assert!(!JobState::Waiting.can_transition_to(JobState::Failed));
        assert!(JobState::Pending.can_transition_to(JobState::Blocked));
    }

    #[test]
    fn failure_propagation_parses_case_insensitively() {
        assert_eq!(
            " Lenient ".parse::<FailurePropagation>(),
            Ok(FailurePropagation::Lenient)
        );
        assert!("sometimes".parse::<FailurePropagation>().is_err());
    }
}
