use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use cmdseq::errors::{Result, SequencerError};
use cmdseq::exec::{DispatchOutcome, Dispatcher};
use cmdseq::store::JobRecord;
use cmdseq::types::{ExecMode, JobId, JobOutcome};

/// A fake dispatcher that:
/// - records which jobs were dispatched, in order
/// - finishes SYNC jobs with a canned outcome (success unless configured)
/// - reports every other mode as detached, leaving the callback to the test
/// - refuses to start selected jobs.
#[derive(Debug, Clone, Default)]
pub struct FakeDispatcher {
    dispatched: Arc<Mutex<Vec<JobId>>>,
    outcomes: HashMap<JobId, JobOutcome>,
    refused: HashSet<JobId>,
}

impl FakeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(mut self, id: JobId, outcome: JobOutcome) -> Self {
        self.outcomes.insert(id, outcome);
        self
    }

    pub fn refusing(mut self, id: JobId) -> Self {
        self.refused.insert(id);
        self
    }

    /// Shared log of dispatched ids; clone it before handing the
    /// dispatcher to the sequencer.
    pub fn dispatched_handle(&self) -> Arc<Mutex<Vec<JobId>>> {
        Arc::clone(&self.dispatched)
    }
}

impl Dispatcher for FakeDispatcher {
    fn dispatch<'a>(
        &'a mut self,
        record: &'a JobRecord,
    ) -> Pin<Box<dyn Future<Output = Result<DispatchOutcome>> + Send + 'a>> {
        Box::pin(async move {
            self.dispatched.lock().unwrap().push(record.id);

            if self.refused.contains(&record.id) {
                return Err(SequencerError::Dispatch {
                    id: record.id,
                    reason: "refused by fake dispatcher".to_string(),
                });
            }

            match record.mode {
                ExecMode::Sync => {
                    let outcome = self
                        .outcomes
                        .get(&record.id)
                        .copied()
                        .unwrap_or(JobOutcome::Success);
                    Ok(DispatchOutcome::Finished(outcome))
                }
                ExecMode::Background | ExecMode::Remote => Ok(DispatchOutcome::Detached),
            }
        })
    }
}
