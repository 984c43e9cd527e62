// src/exec/remote.rs

//! REMOTE jobs: reachability probe, then an SSH session that uploads the
//! wrapper script on stdin and starts it detached on the remote host.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::model::RemoteSection;
use crate::errors::{Result, SequencerError};
use crate::exec::script::{
    NotifyTarget, WrapperScript, script_name, shell_quote, stderr_log_name, stdout_log_name,
};
use crate::store::JobRecord;

/// Launches wrapper scripts on other hosts.
#[derive(Debug, Clone)]
pub struct RemoteLauncher {
    cfg: RemoteSection,
    /// `None` when `[remote].callback_host` is unset.
    notify: Option<NotifyTarget>,
}

impl RemoteLauncher {
    pub fn new(cfg: RemoteSection, notify: Option<NotifyTarget>) -> Self {
        Self { cfg, notify }
    }

    pub async fn launch(&self, record: &JobRecord) -> Result<()> {
        let fail = |reason: String| SequencerError::Dispatch {
            id: record.id,
            reason,
        };

        let host = record.remote.host.trim();
        if host.is_empty() {
            return Err(fail("REMOTE job has no host".to_string()));
        }
        let notify = self.notify.as_ref().ok_or_else(|| {
            fail("[remote].callback_host is not configured; remote jobs cannot report back".to_string())
        })?;

        if !self.probe(host).await {
            return Err(fail(format!("host {host} is unreachable")));
        }

        let dir = self.cfg.remote_dir.trim_end_matches('/');
        let remote_script = format!("{dir}/{}", script_name(record.id));
        let script = WrapperScript {
            id: record.id,
            command: &record.command,
            stdout_log: format!("{dir}/{}", stdout_log_name(record.id)),
            stderr_log: format!("{dir}/{}", stderr_log_name(record.id)),
            notify,
        }
        .render();

        let quoted = shell_quote(&remote_script);
        // Only the detached run goes to the background; a background list gets
        // /dev/null as stdin and `cat` would read nothing.
        let remote_cmd =
            format!("cat > {quoted} && {{ nohup sh {quoted} </dev/null >/dev/null 2>&1 & }}");

        let destination = record.remote.destination();
        let mut cmd = self.ssh_command(&record.remote.credential);
        cmd.arg("-o")
            .arg(format!("ConnectTimeout={}", self.cfg.connect_timeout_secs))
            .arg("-o")
            .arg("StrictHostKeyChecking=accept-new")
            .arg(&destination)
            .arg(&remote_cmd)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| fail(format!("starting {}: {e}", self.cfg.ssh_program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A session rejected during authentication closes stdin early;
            // the exit status below carries the real error.
            if let Err(e) = stdin.write_all(script.as_bytes()).await {
                debug!(job_id = record.id, error = %e, "could not upload wrapper script");
            }
        }

        // Generous bound: connect, authenticate, upload, detach.
        let limit = Duration::from_secs(self.cfg.connect_timeout_secs.saturating_mul(3).max(1));
        let output = tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| fail(format!("ssh session to {destination} timed out")))?
            .map_err(|e| fail(format!("waiting for ssh session: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!(
                "ssh to {destination} failed with exit code {} (authentication or connection failure): {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        info!(
            job_id = record.id,
            host,
            script = %remote_script,
            "REMOTE job started"
        );
        Ok(())
    }

    /// One ICMP echo via the configured ping program.
    async fn probe(&self, host: &str) -> bool {
        let status = Command::new(&self.cfg.ping_program)
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(self.cfg.ping_timeout_secs.to_string())
            .arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(s) => s.success(),
            Err(e) => {
                debug!(host, error = %e, "reachability probe could not run");
                false
            }
        }
    }

    /// `ssh`, or `sshpass -e ssh` with the password in `SSHPASS` when a
    /// credential is present. Without one, key/agent auth in batch mode.
    fn ssh_command(&self, credential: &str) -> Command {
        if credential.is_empty() {
            let mut cmd = Command::new(&self.cfg.ssh_program);
            cmd.arg("-o").arg("BatchMode=yes");
            cmd
        } else {
            let mut cmd = Command::new(&self.cfg.sshpass_program);
            cmd.arg("-e")
                .arg(&self.cfg.ssh_program)
                .env("SSHPASS", credential);
            cmd
        }
    }
}
