// tests/local_execution.rs
//
// End-to-end runs with real processes: SYNC jobs through `sh`, BACKGROUND
// jobs reporting back through the `cmdseq-notify` binary.

#![cfg(unix)]

use std::path::Path;
use std::time::Duration;

use cmdseq::run_config;
use cmdseq::types::JobState;
use cmdseq_test_utils::builders::RecordBuilder;
use cmdseq_test_utils::{TempStore, init_tracing, with_timeout};

const NOTIFY: &str = env!("CARGO_BIN_EXE_cmdseq-notify");

async fn wait_until_gone(path: &Path) -> bool {
    for _ in 0..100 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn independent_sync_jobs_settle_by_exit_code() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(1, "exit 0").build(),
        RecordBuilder::new(2, "exit 1").build(),
    ]);

    let summary = with_timeout(run_config(&temp.config())).await.unwrap();

    assert_eq!(summary.done, 1);
    assert_eq!(summary.failed, 1);
    let records = temp.read();
    assert_eq!(records[0].state, JobState::Done);
    assert_eq!(records[1].state, JobState::Failed);
}

#[tokio::test]
async fn job_with_one_failed_dependency_is_blocked_and_never_runs() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(1, "exit 0").build(),
        RecordBuilder::new(2, "exit 1").build(),
        RecordBuilder::new(3, "true").after(1).after(2).build(),
    ]);

    let summary = with_timeout(run_config(&temp.config())).await.unwrap();

    assert_eq!(summary.dispatched, 2);
    let records = temp.read();
    assert_eq!(records[0].state, JobState::Done);
    assert_eq!(records[1].state, JobState::Failed);
    assert_eq!(records[2].state, JobState::Blocked);
    assert_eq!(records[2].started_at, None);
}

#[tokio::test]
async fn sync_jobs_follow_exit_codes() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(1, "true").build(),
        RecordBuilder::new(2, "echo failing >&2; exit 3").after(1).build(),
        RecordBuilder::new(3, "true").after(2).build(),
        RecordBuilder::new(4, "echo unrelated").build(),
    ]);
    let cfg = temp.config();

    let summary = with_timeout(run_config(&cfg)).await.unwrap();

    assert_eq!(summary.done, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.blocked, 1);

    let states: Vec<_> = temp.read().iter().map(|r| r.state).collect();
    assert_eq!(
        states,
        vec![
            JobState::Done,
            JobState::Failed,
            JobState::Blocked,
            JobState::Done,
        ]
    );
}

#[tokio::test]
async fn sync_job_sees_its_predecessors_output() {
    init_tracing();
    let temp = TempStore::new();
    let marker = temp.dir().join("marker");
    let marker = marker.to_string_lossy();
    temp.write(&[
        RecordBuilder::new(2, &format!("test -f '{marker}'")).after(1).build(),
        RecordBuilder::new(1, &format!("touch '{marker}'")).build(),
    ]);

    let summary = with_timeout(run_config(&temp.config())).await.unwrap();

    assert_eq!(summary.done, 2);
    assert!(summary.is_clean());
}

#[tokio::test]
async fn background_job_reports_back_through_the_notifier() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(1, "echo hello from the background")
            .background()
            .build(),
        RecordBuilder::new(2, "true").after(1).build(),
    ]);
    let cfg = temp.config_builder().notify_program(NOTIFY).build();

    let summary = with_timeout(run_config(&cfg)).await.unwrap();

    assert_eq!(summary.done, 2);
    assert_eq!(summary.dispatched, 2);

    let work = temp.dir().join("work");
    let out = std::fs::read_to_string(work.join("job_1.out")).unwrap();
    assert_eq!(out.trim(), "hello from the background");
    assert!(wait_until_gone(&work.join("job_1.sh")).await);
}

#[tokio::test]
async fn failing_background_job_blocks_its_dependents() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(1, "echo broken >&2; exit 4")
            .background()
            .build(),
        RecordBuilder::new(2, "true").after(1).build(),
    ]);
    let cfg = temp.config_builder().notify_program(NOTIFY).build();

    let summary = with_timeout(run_config(&cfg)).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.blocked, 1);

    let err = std::fs::read_to_string(temp.dir().join("work").join("job_1.err")).unwrap();
    assert_eq!(err.trim(), "broken");
}

#[tokio::test]
async fn unreachable_remote_host_fails_the_job() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(1, "hostname")
            .remote("host.invalid", "ops", "")
            .build(),
        RecordBuilder::new(2, "true").after(1).build(),
    ]);
    let cfg = temp
        .config_builder()
        .ping_program("false")
        .remote_callback_host("127.0.0.1")
        .build();

    let summary = with_timeout(run_config(&cfg)).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.blocked, 1);
    assert_eq!(temp.read()[0].state, JobState::Failed);
}

#[tokio::test]
async fn remote_job_uploads_its_wrapper_and_reports_back() {
    init_tracing();
    let temp = TempStore::with_records(&[
        RecordBuilder::new(1, "echo ran remotely")
            .remote("10.0.0.9", "ops", "secret")
            .build(),
        RecordBuilder::new(2, "true").after(1).build(),
    ]);

    // Stands in for `ssh`: runs the remote command (the last argument)
    // on this host, with the uploaded script on stdin.
    let fake_ssh = temp.dir().join("fake_ssh");
    std::fs::write(&fake_ssh, "for last; do :; done\nexec sh -c \"$last\"\n").unwrap();
    let remote_dir = temp.dir().join("remote");
    std::fs::create_dir_all(&remote_dir).unwrap();

    // With a credential the launcher runs `<sshpass> -e <ssh> ...`, which
    // `sh -e <script> ...` matches without needing an executable file.
    let cfg = temp
        .config_builder()
        .ping_program("true")
        .sshpass_program("sh")
        .ssh_program(&fake_ssh.to_string_lossy())
        .remote_dir(&remote_dir)
        .remote_notify_program(NOTIFY)
        .remote_callback_host("127.0.0.1")
        .build();

    let summary = with_timeout(run_config(&cfg)).await.unwrap();

    assert_eq!(summary.done, 2);
    assert!(summary.is_clean());

    let out = std::fs::read_to_string(remote_dir.join("job_1.out")).unwrap();
    assert_eq!(out.trim(), "ran remotely");
    assert!(wait_until_gone(&remote_dir.join("job_1.sh")).await);
}

#[tokio::test]
async fn rejected_ssh_session_fails_the_job() {
    init_tracing();
    let temp = TempStore::with_records(&[RecordBuilder::new(1, "hostname")
        .remote("10.0.0.9", "ops", "")
        .build()]);
    let cfg = temp
        .config_builder()
        .ping_program("true")
        .ssh_program("false")
        .remote_callback_host("127.0.0.1")
        .build();

    let summary = with_timeout(run_config(&cfg)).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert!(temp.read()[0].finished_at.is_some());
}

#[tokio::test]
async fn remote_job_without_callback_host_fails_to_dispatch() {
    init_tracing();
    let temp = TempStore::with_records(&[RecordBuilder::new(1, "hostname")
        .remote("10.0.0.9", "", "")
        .build()]);
    let cfg = temp.config_builder().ping_program("true").build();

    let summary = with_timeout(run_config(&cfg)).await.unwrap();

    assert_eq!(summary.failed, 1);
}
