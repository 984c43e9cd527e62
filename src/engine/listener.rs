// src/engine/listener.rs

//! Completion listener: a TCP service applying `STATE=id` callbacks from
//! detached jobs to the record store.
//!
//! Connections are served one at a time; callback volume is low and each
//! one is a single short write.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::errors::{Result, SequencerError};
use crate::protocol::{Completion, MAX_PAYLOAD, Message, Protocol};
use crate::store::RecordStore;
use crate::store::record::{any_unfinished, now, position_of};

/// Upper bound for a client to deliver its payload.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Counters returned when the listener stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub applied: usize,
    pub rejected: usize,
}

/// Result of applying one callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionReport {
    /// Whether any record is still not terminal after the update.
    pub work_remains: bool,
}

pub struct CompletionListener {
    listener: TcpListener,
    store: Arc<RecordStore>,
    protocol: Protocol,
    wake: Arc<Notify>,
}

impl CompletionListener {
    /// Bind `host:port`. Port 0 picks an ephemeral port; see
    /// [`CompletionListener::local_addr`].
    pub async fn bind(
        host: &str,
        port: u16,
        store: Arc<RecordStore>,
        protocol: Protocol,
    ) -> Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        Ok(Self {
            listener,
            store,
            protocol,
            wake: Arc::new(Notify::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn store(&self) -> Arc<RecordStore> {
        Arc::clone(&self.store)
    }

    /// Signalled after every applied callback.
    pub fn wake_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    /// Serve until the shutdown sentinel (or an empty payload) arrives.
    ///
    /// Bad payloads, unknown ids and illegal transitions are logged and
    /// dropped; they never stop the listener.
    pub async fn run(self) -> Result<ListenerStats> {
        let mut stats = ListenerStats::default();
        info!(addr = ?self.listener.local_addr().ok(), "completion listener started");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    // e.g. EMFILE; back off instead of spinning.
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let payload = match read_payload(stream).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(%peer, error = %e, "dropping callback connection");
                    stats.rejected += 1;
                    continue;
                }
            };
            debug!(%peer, payload = %payload.trim(), "callback received");

            match self.protocol.parse(&payload) {
                Ok(Message::Shutdown) => {
                    info!(%peer, "shutdown requested; listener stopping");
                    break;
                }
                Ok(Message::Completion(completion)) => {
                    match apply_completion(&self.store, completion).await {
                        Ok(report) => {
                            stats.applied += 1;
                            info!(
                                job_id = completion.id,
                                state = %completion.state,
                                work_remains = report.work_remains,
                                "completion applied"
                            );
                            self.wake.notify_one();
                        }
                        Err(e) => {
                            stats.rejected += 1;
                            warn!(%peer, job_id = completion.id, error = %e, "callback rejected");
                        }
                    }
                }
                Err(e) => {
                    stats.rejected += 1;
                    warn!(%peer, error = %e, "malformed callback");
                }
            }
        }

        info!(
            applied = stats.applied,
            rejected = stats.rejected,
            "completion listener stopped"
        );
        Ok(stats)
    }
}

/// Apply a callback through the full lock -> load -> transition -> save
/// cycle. Unknown ids and illegal transitions leave the store untouched.
pub async fn apply_completion(
    store: &RecordStore,
    completion: Completion,
) -> Result<CompletionReport> {
    store
        .update(|records| {
            let idx = position_of(records, completion.id)
                .ok_or(SequencerError::JobNotFound(completion.id))?;
            records[idx].transition(completion.state, now())?;
            Ok(CompletionReport {
                work_remains: any_unfinished(records),
            })
        })
        .await
}

async fn read_payload(stream: TcpStream) -> Result<String> {
    let mut buf = Vec::with_capacity(MAX_PAYLOAD);
    let mut limited = stream.take(MAX_PAYLOAD as u64);

    tokio::time::timeout(READ_TIMEOUT, limited.read_to_end(&mut buf))
        .await
        .map_err(|_| SequencerError::Protocol("timed out reading callback".to_string()))??;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}
