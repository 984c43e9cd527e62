// src/dag/resolver.rs

//! Readiness decision for a single PENDING/WAITING job.

use crate::store::JobRecord;
use crate::store::record::position_of;
use crate::types::{FailurePropagation, JobState};

/// What the resolver decided for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Every dependency is satisfied.
    Ready,
    /// At least one dependency is still unfinished (or unknown).
    StillWaiting,
    /// A dependency failed or was itself blocked; this job can never run.
    Blocked,
}

/// Decides readiness from the states of a job's dependencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    policy: FailurePropagation,
}

impl Resolver {
    pub fn new(policy: FailurePropagation) -> Self {
        Self { policy }
    }

    /// Look up every dependency of `candidate` in `records`.
    ///
    /// Blocked wins over waiting: one failed dependency is enough, whatever
    /// the others are doing. Unknown ids never resolve.
    pub fn resolve(&self, records: &[JobRecord], candidate: &JobRecord) -> Readiness {
        let mut all_satisfied = true;

        for dep_id in &candidate.dependencies {
            let Some(idx) = position_of(records, *dep_id) else {
                all_satisfied = false;
                continue;
            };
            let dep = &records[idx];

            match dep.state {
                JobState::Done => {}
                JobState::Failed if self.failure_is_tolerated(dep) => {}
                JobState::Failed | JobState::Blocked => return Readiness::Blocked,
                JobState::Pending | JobState::Waiting | JobState::Running => {
                    all_satisfied = false;
                }
            }
        }

        if all_satisfied {
            Readiness::Ready
        } else {
            Readiness::StillWaiting
        }
    }

    fn failure_is_tolerated(&self, dep: &JobRecord) -> bool {
        self.policy == FailurePropagation::Lenient && !dep.fail_fast
    }
}
