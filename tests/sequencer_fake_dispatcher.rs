// tests/sequencer_fake_dispatcher.rs

use cmdseq::config::ConfigFile;
use cmdseq::engine::{CompletionListener, RunSummary, SequencerOptions, run_with_listener};
use cmdseq::protocol::Protocol;
use cmdseq::types::{FailurePropagation, JobOutcome, JobState};
use cmdseq_test_utils::builders::RecordBuilder;
use cmdseq_test_utils::fake_dispatcher::FakeDispatcher;
use cmdseq_test_utils::{TempStore, init_tracing, send_payload, with_timeout};

async fn bind(temp: &TempStore, cfg: &ConfigFile) -> CompletionListener {
    CompletionListener::bind(
        &cfg.sequencer.bind,
        cfg.sequencer.port,
        temp.open(cfg),
        Protocol::from_config(cfg),
    )
    .await
    .expect("bind listener")
}

async fn run(temp: &TempStore, cfg: &ConfigFile, dispatcher: FakeDispatcher) -> RunSummary {
    let listener = bind(temp, cfg).await;
    let options = SequencerOptions::from_config(cfg, listener.local_addr().unwrap());
    with_timeout(run_with_listener(listener, dispatcher, options))
        .await
        .expect("run completes")
}

#[tokio::test]
async fn chain_runs_in_dependency_order() {
    init_tracing();
    // Listed in reverse so file order alone would get it wrong.
    let temp = TempStore::with_records(&[
        RecordBuilder::new(3, "echo c").after(2).build(),
        RecordBuilder::new(2, "echo b").after(1).build(),
        RecordBuilder::new(1, "echo a").build(),
    ]);
    let cfg = temp.config();
    let dispatcher = FakeDispatcher::new();
    let dispatched = dispatcher.dispatched_handle();

    let summary = run(&temp, &cfg, dispatcher).await;

    assert_eq!(*dispatched.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(summary.done, 3);
    assert!(summary.is_clean());

    let records = temp.read();
    assert!(records.iter().all(|r| r.state == JobState::Done));
    assert!(
        records
            .iter()
            .all(|r| r.started_at.is_some() && r.finished_at.is_some())
    );
}

#[tokio::test]
async fn failure_blocks_dependents_but_not_unrelated_jobs() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(1, "exit 1").build(),
        RecordBuilder::new(2, "echo b").after(1).build(),
        RecordBuilder::new(4, "echo d").after(2).build(),
        RecordBuilder::new(3, "echo c").build(),
    ]);
    let cfg = temp.config();
    let dispatcher = FakeDispatcher::new().with_outcome(1, JobOutcome::Failed(1));
    let dispatched = dispatcher.dispatched_handle();

    let summary = run(&temp, &cfg, dispatcher).await;

    assert_eq!(*dispatched.lock().unwrap(), vec![1, 3]);
    assert_eq!(
        summary,
        RunSummary {
            done: 1,
            failed: 1,
            blocked: 2,
            dispatched: 2,
        }
    );

    let records = temp.read();
    assert_eq!(records[1].state, JobState::Blocked);
    assert_eq!(records[1].started_at, None);
    assert_eq!(records[2].state, JobState::Blocked);
}

#[tokio::test]
async fn fail_fast_failure_aborts_remaining_jobs() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(1, "exit 1").fail_fast(true).build(),
        RecordBuilder::new(2, "echo b").build(),
        RecordBuilder::new(3, "echo c").after(2).build(),
    ]);
    let cfg = temp.config();
    let dispatcher = FakeDispatcher::new().with_outcome(1, JobOutcome::Failed(1));
    let dispatched = dispatcher.dispatched_handle();

    let summary = run(&temp, &cfg, dispatcher).await;

    assert_eq!(*dispatched.lock().unwrap(), vec![1]);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.blocked, 2);
}

#[tokio::test]
async fn lenient_policy_runs_dependents_of_soft_failures() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(1, "exit 1").build(),
        RecordBuilder::new(2, "echo b").after(1).build(),
    ]);
    let cfg = temp
        .config_builder()
        .failure_propagation(FailurePropagation::Lenient)
        .build();
    let dispatcher = FakeDispatcher::new().with_outcome(1, JobOutcome::Failed(1));

    let summary = run(&temp, &cfg, dispatcher).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.done, 1);
    assert_eq!(summary.blocked, 0);
}

#[tokio::test]
async fn dispatch_error_marks_the_job_failed() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(1, "echo a").build(),
        RecordBuilder::new(2, "echo b").after(1).build(),
    ]);
    let cfg = temp.config();

    let summary = run(&temp, &cfg, FakeDispatcher::new().refusing(1)).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.blocked, 1);
    let records = temp.read();
    assert_eq!(records[0].state, JobState::Failed);
    assert!(records[0].finished_at.is_some());
}

#[tokio::test]
async fn terminal_store_finishes_without_dispatching() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(1, "echo a").state(JobState::Done).build(),
        RecordBuilder::new(2, "echo b").state(JobState::Blocked).build(),
    ]);
    let cfg = temp.config();
    let dispatcher = FakeDispatcher::new();
    let dispatched = dispatcher.dispatched_handle();

    let summary = run(&temp, &cfg, dispatcher).await;

    assert!(dispatched.lock().unwrap().is_empty());
    assert_eq!(summary.dispatched, 0);
    assert_eq!(summary.done, 1);
    assert_eq!(summary.blocked, 1);
}

#[tokio::test]
async fn detached_job_completes_through_a_callback() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(10, "sleep 1").background().build(),
        RecordBuilder::new(20, "echo after").after(10).build(),
    ]);
    let cfg = temp.config();
    let listener = bind(&temp, &cfg).await;
    let addr = listener.local_addr().unwrap();
    let options = SequencerOptions::from_config(&cfg, addr);
    let dispatcher = FakeDispatcher::new();
    let dispatched = dispatcher.dispatched_handle();

    let run = tokio::spawn(run_with_listener(listener, dispatcher, options));

    temp.wait_for_state(10, JobState::Running).await;
    assert_eq!(temp.read()[1].state, JobState::Waiting);

    // An id that is not in the store changes nothing.
    send_payload(addr, "DONE=99").await;
    send_payload(addr, "DONE=10").await;

    let summary = with_timeout(run).await.unwrap().unwrap();

    assert_eq!(*dispatched.lock().unwrap(), vec![10, 20]);
    assert_eq!(summary.done, 2);
    assert_eq!(temp.read().len(), 2);
}

#[tokio::test]
async fn failed_callback_blocks_dependents() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(1, "remote job").remote("10.0.0.9", "ops", "").build(),
        RecordBuilder::new(2, "echo after").after(1).build(),
    ]);
    let cfg = temp.config();
    let listener = bind(&temp, &cfg).await;
    let addr = listener.local_addr().unwrap();
    let options = SequencerOptions::from_config(&cfg, addr);

    let run = tokio::spawn(run_with_listener(listener, FakeDispatcher::new(), options));

    temp.wait_for_state(1, JobState::Running).await;
    send_payload(addr, "FAILED=1").await;

    let summary = with_timeout(run).await.unwrap().unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.blocked, 1);
}

#[tokio::test]
async fn silent_detached_job_is_reaped_by_running_timeout() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(1, "never reports").background().build(),
        RecordBuilder::new(2, "echo after").after(1).build(),
    ]);
    let cfg = temp.config_builder().running_timeout_secs(1).build();

    let summary = run(&temp, &cfg, FakeDispatcher::new()).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.blocked, 1);
}

#[tokio::test]
async fn padded_sentinel_still_stops_the_listener() {
    init_tracing();
    let temp = TempStore::with_records(&[RecordBuilder::new(1, "echo a").build()]);
    let cfg = temp.config_builder().shutdown_sentinel("  BYE ").build();
    let listener = bind(&temp, &cfg).await;
    let options = SequencerOptions::from_config(&cfg, listener.local_addr().unwrap());
    assert_eq!(options.shutdown_sentinel, "BYE");

    let summary = with_timeout(run_with_listener(listener, FakeDispatcher::new(), options))
        .await
        .unwrap();
    assert_eq!(summary.done, 1);
}
