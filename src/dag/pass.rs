// src/dag/pass.rs

//! One scan over the whole store.
//!
//! A pass is pure: it takes the freshly loaded record list, applies the
//! transitions that need no process (PENDING -> WAITING, -> BLOCKED, stale
//! RUNNING -> FAILED) and returns the ready queue. Starting the ready jobs is
//! left to the sequencer, which re-validates each one against a fresh load.

use std::collections::VecDeque;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::{debug, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::resolver::{Readiness, Resolver};
use crate::errors::Result;
use crate::store::JobRecord;
use crate::types::{JobId, JobState};

/// Inputs of a pass besides the records themselves.
#[derive(Debug, Clone, Copy)]
pub struct PassOptions {
    pub resolver: Resolver,
    /// RUNNING jobs started longer ago than this are marked FAILED.
    pub running_timeout_secs: Option<u64>,
    pub now: NaiveDateTime,
}

/// Structured result of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassPlan {
    /// Ready jobs in file order.
    pub ready: VecDeque<JobId>,
    /// Jobs moved from PENDING to WAITING in this pass.
    pub newly_waiting: Vec<JobId>,
    /// Jobs moved to BLOCKED in this pass, including transitive dependents.
    pub newly_blocked: Vec<JobId>,
    /// RUNNING jobs failed by the timeout.
    pub reaped: Vec<JobId>,
    /// A failed `failFast` job that aborts the run, if any.
    pub aborted_by: Option<JobId>,
    /// Jobs RUNNING after the pass.
    pub running: usize,
    /// Jobs not in a terminal state after the pass.
    pub unfinished: usize,
}

impl PassPlan {
    pub fn all_terminal(&self) -> bool {
        self.unfinished == 0
    }

    /// Nothing ready, nothing running, yet unfinished jobs remain: only a
    /// dependency cycle or a dangling reference can cause this.
    pub fn is_stalled(&self) -> bool {
        self.ready.is_empty() && self.running == 0 && self.unfinished > 0
    }
}

/// Scan `records` in file order and apply every transition a pass can make.
pub fn plan_pass(records: &mut [JobRecord], opts: &PassOptions) -> Result<PassPlan> {
    let graph = DependencyGraph::from_records(records);
    let mut plan = PassPlan::default();

    if let Some(secs) = opts.running_timeout_secs {
        reap_stale_running(records, secs, opts.now, &mut plan)?;
    }

    plan.aborted_by = abort_culprit(records);

    if let Some(culprit) = plan.aborted_by {
        for record in records.iter_mut().filter(|r| r.state.is_schedulable()) {
            record.transition(JobState::Blocked, opts.now)?;
            debug!(job_id = record.id, culprit, "blocked: failFast job failed");
            plan.newly_blocked.push(record.id);
        }
    }

    for idx in 0..records.len() {
        if !records[idx].state.is_schedulable() {
            continue;
        }

        match opts.resolver.resolve(records, &records[idx]) {
            Readiness::Ready => plan.ready.push_back(records[idx].id),
            Readiness::StillWaiting => {
                if records[idx].state == JobState::Pending {
                    records[idx].transition(JobState::Waiting, opts.now)?;
                    plan.newly_waiting.push(records[idx].id);
                }
            }
            Readiness::Blocked => {
                let id = records[idx].id;
                records[idx].transition(JobState::Blocked, opts.now)?;
                debug!(job_id = id, "blocked by failed dependency");
                plan.newly_blocked.push(id);
                propagate_block(records, &graph, id, opts, &mut plan)?;
            }
        }
    }

    // A job may have been marked WAITING and then blocked by propagation.
    let settled: &[JobRecord] = records;
    plan.newly_waiting
        .retain(|id| state_of(settled, &graph, *id) == Some(JobState::Waiting));

    plan.running = records
        .iter()
        .filter(|r| r.state == JobState::Running)
        .count();
    plan.unfinished = records.iter().filter(|r| !r.state.is_terminal()).count();

    Ok(plan)
}

/// The first FAILED job flagged `failFast`; its failure aborts the run.
pub fn abort_culprit(records: &[JobRecord]) -> Option<JobId> {
    records
        .iter()
        .find(|r| r.state == JobState::Failed && r.fail_fast)
        .map(|r| r.id)
}

/// Block every schedulable transitive dependent of `root` that the resolver
/// now reports as blocked, so a whole chain settles within one pass.
fn propagate_block(
    records: &mut [JobRecord],
    graph: &DependencyGraph,
    root: JobId,
    opts: &PassOptions,
    plan: &mut PassPlan,
) -> Result<()> {
    let mut stack: Vec<JobId> = graph.dependents_of(root).to_vec();

    while let Some(id) = stack.pop() {
        let Some(idx) = graph.index_of(id) else {
            continue;
        };
        if !records[idx].state.is_schedulable() {
            continue;
        }
        if opts.resolver.resolve(records, &records[idx]) != Readiness::Blocked {
            continue;
        }

        records[idx].transition(JobState::Blocked, opts.now)?;
        debug!(job_id = id, upstream = root, "blocked transitively");
        plan.newly_blocked.push(id);
        stack.extend_from_slice(graph.dependents_of(id));
    }

    Ok(())
}

fn reap_stale_running(
    records: &mut [JobRecord],
    timeout_secs: u64,
    now: NaiveDateTime,
    plan: &mut PassPlan,
) -> Result<()> {
    let timeout = i64::try_from(timeout_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX);

    for record in records.iter_mut() {
        if record.state != JobState::Running {
            continue;
        }
        let Some(started) = record.started_at else {
            continue;
        };
        if now.signed_duration_since(started) > timeout {
            warn!(
                job_id = record.id,
                started = %started,
                timeout_secs,
                "job exceeded running timeout without a completion callback; marking FAILED"
            );
            record.transition(JobState::Failed, now)?;
            plan.reaped.push(record.id);
        }
    }

    Ok(())
}

fn state_of(records: &[JobRecord], graph: &DependencyGraph, id: JobId) -> Option<JobState> {
    graph.index_of(id).map(|idx| records[idx].state)
}
