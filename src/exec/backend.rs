// src/exec/backend.rs

//! Pluggable dispatcher abstraction.
//!
//! The sequencer talks to a `Dispatcher` instead of spawning processes
//! itself. Production uses [`CommandDispatcher`], which picks one strategy
//! per [`ExecMode`]; tests can provide a dispatcher that records which jobs
//! were started and returns canned outcomes.

use std::future::Future;
use std::pin::Pin;

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::exec::background::{BackgroundLauncher, resolve_notify_program};
use crate::exec::remote::RemoteLauncher;
use crate::exec::script::NotifyTarget;
use crate::exec::sync::SyncRunner;
use crate::store::JobRecord;
use crate::types::{ExecMode, JobOutcome};

/// What the sequencer learns right after dispatching a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The job already finished (SYNC).
    Finished(JobOutcome),
    /// The job runs on its own; its outcome arrives as a callback.
    Detached,
}

/// Trait abstracting how a ready job is executed.
///
/// An `Err` means the job could not be started at all; the sequencer
/// records it as FAILED without waiting for a callback.
pub trait Dispatcher: Send {
    fn dispatch<'a>(
        &'a mut self,
        record: &'a JobRecord,
    ) -> Pin<Box<dyn Future<Output = Result<DispatchOutcome>> + Send + 'a>>;
}

/// Production dispatcher: one strategy per execution mode.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    sync: SyncRunner,
    background: BackgroundLauncher,
    remote: RemoteLauncher,
}

impl CommandDispatcher {
    pub fn new(sync: SyncRunner, background: BackgroundLauncher, remote: RemoteLauncher) -> Self {
        Self {
            sync,
            background,
            remote,
        }
    }

    /// Wire all three strategies from config. `listener_port` is the port
    /// the completion listener actually bound.
    pub fn from_config(cfg: &ConfigFile, listener_port: u16) -> Self {
        let states = &cfg.format.states;
        let local_notify = NotifyTarget {
            program: resolve_notify_program(cfg.background.notify_program.as_deref()),
            host: cfg.background.callback_host.clone(),
            port: listener_port,
            done_token: states.done.clone(),
            failed_token: states.failed.clone(),
        };
        let remote_notify = cfg.remote.callback_host.as_ref().map(|host| NotifyTarget {
            program: cfg.remote.notify_program.clone(),
            host: host.clone(),
            port: listener_port,
            done_token: states.done.clone(),
            failed_token: states.failed.clone(),
        });

        Self::new(
            SyncRunner::new(cfg.background.shell.clone()),
            BackgroundLauncher::new(
                cfg.background.work_dir.clone(),
                cfg.background.shell.clone(),
                local_notify,
            ),
            RemoteLauncher::new(cfg.remote.clone(), remote_notify),
        )
    }
}

impl Dispatcher for CommandDispatcher {
    fn dispatch<'a>(
        &'a mut self,
        record: &'a JobRecord,
    ) -> Pin<Box<dyn Future<Output = Result<DispatchOutcome>> + Send + 'a>> {
        Box::pin(async move {
            match record.mode {
                ExecMode::Sync => Ok(DispatchOutcome::Finished(self.sync.run(record).await?)),
                ExecMode::Background => {
                    self.background.launch(record).await?;
                    Ok(DispatchOutcome::Detached)
                }
                ExecMode::Remote => {
                    self.remote.launch(record).await?;
                    Ok(DispatchOutcome::Detached)
                }
            }
        })
    }
}
