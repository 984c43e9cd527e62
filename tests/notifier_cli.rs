// tests/notifier_cli.rs

use tokio::process::Command;

use cmdseq::engine::CompletionListener;
use cmdseq::protocol::Protocol;
use cmdseq::types::JobState;
use cmdseq_test_utils::builders::RecordBuilder;
use cmdseq_test_utils::{TempStore, init_tracing, send_payload, with_timeout};

const NOTIFY: &str = env!("CARGO_BIN_EXE_cmdseq-notify");

#[tokio::test]
async fn notifier_delivers_a_completion() {
    init_tracing();
    let temp = TempStore::with_records(&[RecordBuilder::new(8, "sleep 1")
        .background()
        .state(JobState::Running)
        .build()]);
    let cfg = temp.config();
    let listener = CompletionListener::bind("127.0.0.1", 0, temp.open(&cfg), Protocol::default())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(listener.run());

    let status = Command::new(NOTIFY)
        .arg("127.0.0.1")
        .arg(addr.port().to_string())
        .arg("DONE")
        .arg("8")
        .status()
        .await
        .unwrap();
    assert!(status.success());

    send_payload(addr, "SHUTDOWN").await;
    let stats = with_timeout(handle).await.unwrap().unwrap();

    assert_eq!(stats.applied, 1);
    assert_eq!(temp.read()[0].state, JobState::Done);
}

#[tokio::test]
async fn notifier_exits_non_zero_when_nobody_listens() {
    // Bind and drop to get a port that is very likely closed.
    let port = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };

    let output = Command::new(NOTIFY)
        .args(["127.0.0.1", port.to_string().as_str(), "FAILED", "3"])
        .output()
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("FAILED=3"));
}

#[tokio::test]
async fn notifier_rejects_a_non_numeric_id() {
    let output = Command::new(NOTIFY)
        .args(["127.0.0.1", "5555", "DONE", "abc"])
        .output()
        .await
        .unwrap();

    assert!(!output.status.success());
}
