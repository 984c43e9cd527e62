// src/exec/background.rs

//! Detached local execution of BACKGROUND jobs.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{Result, SequencerError};
use crate::exec::script::{
    NotifyTarget, WrapperScript, script_name, stderr_log_name, stdout_log_name,
};
use crate::store::JobRecord;

/// File name of the notifier binary.
pub const NOTIFY_BINARY: &str = "cmdseq-notify";

/// Writes a wrapper script into the work directory and starts it without
/// waiting. The outcome arrives later through the completion listener.
#[derive(Debug, Clone)]
pub struct BackgroundLauncher {
    work_dir: PathBuf,
    shell: String,
    notify: NotifyTarget,
}

impl BackgroundLauncher {
    pub fn new(work_dir: impl Into<PathBuf>, shell: impl Into<String>, notify: NotifyTarget) -> Self {
        Self {
            work_dir: work_dir.into(),
            shell: shell.into(),
            notify,
        }
    }

    pub async fn launch(&self, record: &JobRecord) -> Result<()> {
        self.launch_inner(record)
            .await
            .map_err(|e| SequencerError::Dispatch {
                id: record.id,
                reason: format!("{e:#}"),
            })
    }

    async fn launch_inner(&self, record: &JobRecord) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .with_context(|| format!("creating work dir {:?}", self.work_dir))?;
        let work_dir = tokio::fs::canonicalize(&self.work_dir)
            .await
            .with_context(|| format!("canonicalizing {:?}", self.work_dir))?;

        let script_path = work_dir.join(script_name(record.id));
        let script = WrapperScript {
            id: record.id,
            command: &record.command,
            stdout_log: path_string(&work_dir.join(stdout_log_name(record.id))),
            stderr_log: path_string(&work_dir.join(stderr_log_name(record.id))),
            notify: &self.notify,
        }
        .render();

        tokio::fs::write(&script_path, script)
            .await
            .with_context(|| format!("writing wrapper script {:?}", script_path))?;
        debug!(job_id = record.id, script = ?script_path, "wrapper script written");

        let mut cmd = Command::new(&self.shell);
        cmd.arg(&script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // Own process group: an interrupt of the sequencer leaves it running.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .with_context(|| format!("starting wrapper script {:?}", script_path))?;

        info!(
            job_id = record.id,
            pid = child.id(),
            script = ?script_path,
            "BACKGROUND job started"
        );
        Ok(())
    }
}

/// The notifier configured in `[background].notify_program`, else the
/// binary installed next to the running executable, else a `PATH` lookup.
pub fn resolve_notify_program(configured: Option<&Path>) -> String {
    if let Some(path) = configured {
        return path_string(path);
    }

    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(NOTIFY_BINARY)))
        .filter(|candidate| candidate.is_file())
        .map(|candidate| path_string(&candidate))
        .unwrap_or_else(|| NOTIFY_BINARY.to_string())
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
