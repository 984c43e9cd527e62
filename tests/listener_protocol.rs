// tests/listener_protocol.rs

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use cmdseq::engine::{CompletionListener, ListenerStats};
use cmdseq::protocol::Protocol;
use cmdseq::types::JobState;
use cmdseq_test_utils::builders::RecordBuilder;
use cmdseq_test_utils::{TempStore, init_tracing, send_payload, with_timeout};

fn store_with_running_job() -> TempStore {
    TempStore::with_records(&[
        RecordBuilder::new(1, "sleep 5")
            .background()
            .state(JobState::Running)
            .build(),
        RecordBuilder::new(2, "echo b").after(1).build(),
    ])
}

async fn bind(temp: &TempStore, protocol: Protocol) -> CompletionListener {
    let cfg = temp.config();
    CompletionListener::bind("127.0.0.1", 0, temp.open(&cfg), protocol)
        .await
        .expect("bind listener")
}

#[tokio::test]
async fn bad_callbacks_are_dropped_and_the_listener_keeps_serving() {
    init_tracing();
    let temp = store_with_running_job();
    let listener = bind(&temp, Protocol::default()).await;
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(listener.run());

    send_payload(addr, "garbage").await;
    send_payload(addr, "DONE=abc").await;
    send_payload(addr, "RESTART=1").await;
    send_payload(addr, "DONE=42").await;
    // PENDING -> DONE is not a legal transition.
    send_payload(addr, "DONE=2").await;
    send_payload(addr, "DONE=1\n").await;
    send_payload(addr, "SHUTDOWN").await;

    let stats = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(
        stats,
        ListenerStats {
            applied: 1,
            rejected: 5,
        }
    );

    let records = temp.read();
    assert_eq!(records[0].state, JobState::Done);
    assert!(records[0].finished_at.is_some());
    assert_eq!(records[1].state, JobState::Pending);
}

#[tokio::test]
async fn duplicate_callback_is_rejected() {
    init_tracing();
    let temp = store_with_running_job();
    let listener = bind(&temp, Protocol::default()).await;
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(listener.run());

    send_payload(addr, "FAILED=1").await;
    send_payload(addr, "DONE=1").await;
    send_payload(addr, "SHUTDOWN").await;

    let stats = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(temp.read()[0].state, JobState::Failed);
}

#[tokio::test]
async fn empty_connection_stops_the_listener() {
    init_tracing();
    let temp = store_with_running_job();
    let listener = bind(&temp, Protocol::default()).await;
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(listener.run());

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.shutdown().await.unwrap();
    drop(stream);

    let stats = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(stats, ListenerStats::default());
    assert_eq!(temp.read()[0].state, JobState::Running);
}

#[tokio::test]
async fn custom_tokens_and_sentinel_are_honoured() {
    init_tracing();
    let temp = store_with_running_job();
    let protocol = Protocol::new("OK", "KO", "BYE");
    let listener = bind(&temp, protocol).await;
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(listener.run());

    // The default sentinel means nothing here.
    send_payload(addr, "SHUTDOWN").await;
    send_payload(addr, "KO=1").await;
    send_payload(addr, "BYE").await;

    let stats = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(temp.read()[0].state, JobState::Failed);
}
