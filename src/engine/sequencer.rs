// src/engine/sequencer.rs

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::dag::pass::abort_culprit;
use crate::dag::{PassOptions, PassPlan, Readiness, Resolver, plan_pass};
use crate::errors::{Result, SequencerError};
use crate::exec::{DispatchOutcome, Dispatcher};
use crate::protocol::{self, Protocol};
use crate::store::record::{now, position_of};
use crate::store::{JobRecord, RecordStore};
use crate::types::{JobId, JobState};

/// Knobs for the sequencer loop.
#[derive(Debug, Clone)]
pub struct SequencerOptions {
    pub resolver: Resolver,
    /// Fallback re-scan interval when no callback wakes the loop.
    pub poll_interval: Duration,
    pub running_timeout_secs: Option<u64>,
    /// Where the completion listener is bound; the sentinel goes here.
    pub listener_addr: SocketAddr,
    pub shutdown_sentinel: String,
}

impl SequencerOptions {
    pub fn from_config(cfg: &ConfigFile, listener_addr: SocketAddr) -> Self {
        let s = &cfg.sequencer;
        Self {
            resolver: Resolver::new(s.failure_propagation),
            poll_interval: Duration::from_millis(s.poll_interval_ms),
            running_timeout_secs: s.running_timeout_secs,
            listener_addr,
            shutdown_sentinel: Protocol::from_config(cfg).sentinel().to_string(),
        }
    }
}

/// Final tally once every record is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub done: usize,
    pub failed: usize,
    pub blocked: usize,
    /// Jobs this run moved to RUNNING.
    pub dispatched: usize,
}

impl RunSummary {
    pub fn from_records(records: &[JobRecord], dispatched: usize) -> Self {
        let count = |state: JobState| records.iter().filter(|r| r.state == state).count();
        Self {
            done: count(JobState::Done),
            failed: count(JobState::Failed),
            blocked: count(JobState::Blocked),
            dispatched,
        }
    }

    /// True when no job ended FAILED or BLOCKED.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.blocked == 0
    }
}

/// Drives the store to a fully terminal state.
///
/// Each iteration runs one pass over a freshly loaded store, then starts
/// the ready jobs one by one. Every start re-loads the store under the lock
/// and re-checks readiness, so a callback applied between the pass and the
/// start is never lost. SYNC outcomes are written back immediately;
/// detached jobs are settled by the completion listener, which wakes this
/// loop through a shared [`Notify`].
pub struct Sequencer<D: Dispatcher> {
    store: Arc<RecordStore>,
    dispatcher: D,
    wake: Arc<Notify>,
    options: SequencerOptions,
}

impl<D: Dispatcher> fmt::Debug for Sequencer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("store", &self.store.path())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<D: Dispatcher> Sequencer<D> {
    pub fn new(
        store: Arc<RecordStore>,
        dispatcher: D,
        wake: Arc<Notify>,
        options: SequencerOptions,
    ) -> Self {
        Self {
            store,
            dispatcher,
            wake,
            options,
        }
    }

    /// Run until every record is terminal, then send the shutdown sentinel
    /// to the listener. The sentinel is sent on error too, so the listener
    /// never outlives the loop.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!(store = %self.store.path().display(), "sequencer started");

        let result = self.drive().await;
        self.stop_listener().await;

        match &result {
            Ok(summary) => info!(
                done = summary.done,
                failed = summary.failed,
                blocked = summary.blocked,
                dispatched = summary.dispatched,
                "all jobs terminal; sequencer finished"
            ),
            Err(e) => warn!(error = %e, "sequencer aborted"),
        }
        result
    }

    async fn drive(&mut self) -> Result<RunSummary> {
        let mut dispatched = 0;
        let mut stall_reported = false;

        loop {
            let opts = PassOptions {
                resolver: self.options.resolver,
                running_timeout_secs: self.options.running_timeout_secs,
                now: now(),
            };
            let mut plan = self
                .store
                .update(|records| plan_pass(records, &opts))
                .await?;
            log_plan(&plan);

            let mut started = 0;
            while let Some(id) = plan.ready.pop_front() {
                if self.start(id).await? {
                    started += 1;
                }
            }
            dispatched += started;

            // A start may have unlocked dependents; rescan right away.
            if started > 0 {
                continue;
            }

            if plan.all_terminal() {
                break;
            }

            if plan.is_stalled() {
                if !stall_reported {
                    warn!(
                        unfinished = plan.unfinished,
                        "nothing running and nothing ready; remaining jobs wait on a cycle or a missing id"
                    );
                    stall_reported = true;
                }
            } else {
                stall_reported = false;
            }

            debug!(
                running = plan.running,
                unfinished = plan.unfinished,
                "waiting for completion callbacks"
            );
            tokio::select! {
                _ = self.wake.notified() => debug!("woken by completion listener"),
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }

        let records = self.store.snapshot().await?;
        Ok(RunSummary::from_records(&records, dispatched))
    }

    /// Move `id` to RUNNING if it is still ready, then dispatch it.
    /// Returns false when the job was skipped.
    async fn start(&mut self, id: JobId) -> Result<bool> {
        let resolver = self.options.resolver;
        let claimed = self
            .store
            .update(|records| {
                let Some(idx) = position_of(records, id) else {
                    return Ok(None);
                };
                if !records[idx].state.is_schedulable()
                    || abort_culprit(records).is_some()
                    || resolver.resolve(records, &records[idx]) != Readiness::Ready
                {
                    return Ok(None);
                }
                records[idx].transition(JobState::Running, now())?;
                Ok(Some(records[idx].clone()))
            })
            .await?;

        let Some(record) = claimed else {
            debug!(job_id = id, "job no longer ready; skipped");
            return Ok(false);
        };

        info!(
            job_id = id,
            mode = %record.mode,
            label = %record.label,
            "job RUNNING"
        );

        match self.dispatcher.dispatch(&record).await {
            Ok(DispatchOutcome::Finished(outcome)) => {
                self.finish(id, outcome.state()).await?;
            }
            Ok(DispatchOutcome::Detached) => {
                debug!(job_id = id, "job detached; awaiting callback");
            }
            Err(e) => {
                warn!(job_id = id, error = %e, "dispatch failed; marking job FAILED");
                self.finish(id, JobState::Failed).await?;
            }
        }

        Ok(true)
    }

    async fn finish(&self, id: JobId, state: JobState) -> Result<()> {
        let applied = self
            .store
            .update(|records| {
                let idx = position_of(records, id).ok_or(SequencerError::JobNotFound(id))?;
                records[idx].transition(state, now())
            })
            .await;

        match applied {
            Ok(()) => {
                info!(job_id = id, state = %state, "job finished");
                Ok(())
            }
            Err(e @ (SequencerError::InvalidTransition { .. } | SequencerError::JobNotFound(_))) => {
                warn!(job_id = id, error = %e, "could not record job outcome");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn stop_listener(&self) {
        let addr = protocol::dial_addr(self.options.listener_addr);
        let host = addr.ip().to_string();
        match protocol::send(&host, addr.port(), &self.options.shutdown_sentinel).await {
            Ok(()) => debug!(%addr, "shutdown sentinel sent"),
            Err(e) => debug!(%addr, error = %e, "could not reach completion listener"),
        }
    }
}

fn log_plan(plan: &PassPlan) {
    if !plan.newly_blocked.is_empty() {
        match plan.aborted_by {
            Some(culprit) => warn!(
                culprit,
                blocked = ?plan.newly_blocked,
                "failFast job failed; aborting remaining jobs"
            ),
            None => info!(jobs = ?plan.newly_blocked, "jobs BLOCKED by failed dependencies"),
        }
    }
    if !plan.newly_waiting.is_empty() {
        debug!(jobs = ?plan.newly_waiting, "jobs WAITING on dependencies");
    }
    if !plan.reaped.is_empty() {
        warn!(jobs = ?plan.reaped, "jobs FAILED by running timeout");
    }
}
