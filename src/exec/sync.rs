// src/exec/sync.rs

//! Foreground execution of SYNC jobs.

use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::Result;
use crate::store::JobRecord;
use crate::types::{JobId, JobOutcome};

/// Runs a command through the shell and waits for it.
#[derive(Debug, Clone)]
pub struct SyncRunner {
    shell: String,
}

impl SyncRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Run `record.command` to completion. Exit code 0 is success; a
    /// signal-terminated process counts as exit code -1.
    pub async fn run(&self, record: &JobRecord) -> Result<JobOutcome> {
        info!(
            job_id = record.id,
            cmd = %record.command,
            "starting SYNC job"
        );

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&record.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for job {}", record.id))?;

        // Always consume output so pipes don't fill; log at debug.
        if let Some(stdout) = child.stdout.take() {
            forward_lines(record.id, "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(record.id, "stderr", stderr);
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of job {}", record.id))?;

        let code = status.code().unwrap_or(-1);
        info!(
            job_id = record.id,
            exit_code = code,
            success = status.success(),
            "SYNC job exited"
        );

        Ok(JobOutcome::from_exit_code(code))
    }
}

fn forward_lines<R>(job_id: JobId, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(job_id, stream, "{}", line);
        }
    });
}
