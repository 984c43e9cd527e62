// src/engine/mod.rs

//! Orchestration engine.
//!
//! Two cooperating tasks share one [`RecordStore`](crate::store::RecordStore):
//! - [`sequencer`] repeatedly scans the store and starts ready jobs;
//! - [`listener`] applies completion callbacks from detached jobs and wakes
//!   the sequencer.
//!
//! [`run_with_listener`] wires the two together for a single run.

use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::Result;
use crate::exec::Dispatcher;

pub mod listener;
pub mod sequencer;

pub use listener::{CompletionListener, CompletionReport, ListenerStats, apply_completion};
pub use sequencer::{RunSummary, Sequencer, SequencerOptions};

/// How long to wait for the listener after the sentinel was sent.
const LISTENER_GRACE: Duration = Duration::from_secs(5);

/// Spawn `listener`, run the sequencer to completion on the current task,
/// then wait for the listener to acknowledge the shutdown sentinel.
pub async fn run_with_listener<D: Dispatcher>(
    listener: CompletionListener,
    dispatcher: D,
    options: SequencerOptions,
) -> Result<RunSummary> {
    let store = listener.store();
    let wake = listener.wake_handle();
    let mut handle = tokio::spawn(listener.run());

    let summary = Sequencer::new(store, dispatcher, wake, options).run().await;

    match tokio::time::timeout(LISTENER_GRACE, &mut handle).await {
        Ok(Ok(Ok(stats))) => debug!(?stats, "listener joined"),
        Ok(Ok(Err(e))) => warn!(error = %e, "listener exited with error"),
        Ok(Err(join)) => warn!(error = %join, "listener task panicked"),
        Err(_) => {
            warn!("listener ignored shutdown sentinel; aborting it");
            handle.abort();
        }
    }

    summary
}
