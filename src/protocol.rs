// src/protocol.rs

//! Completion callback wire protocol.
//!
//! Plaintext over TCP, one message per connection, no reply:
//! - `DONE=<id>` / `FAILED=<id>` (state tokens come from `[format.states]`)
//! - the shutdown sentinel, or an empty payload, stops the listener.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::ConfigFile;
use crate::errors::{Result, SequencerError};
use crate::types::{JobId, JobState};

/// Largest payload the listener reads from one connection.
pub const MAX_PAYLOAD: usize = 255;

/// A decoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Completion(Completion),
    Shutdown,
}

/// Reported outcome of a detached job. `state` is `Done` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub state: JobState,
    pub id: JobId,
}

/// Tokens both ends of the protocol agree on.
#[derive(Debug, Clone)]
pub struct Protocol {
    done: String,
    failed: String,
    sentinel: String,
}

impl Default for Protocol {
    fn default() -> Self {
        Self::new("DONE", "FAILED", "SHUTDOWN")
    }
}

impl Protocol {
    pub fn new(
        done: impl Into<String>,
        failed: impl Into<String>,
        sentinel: impl Into<String>,
    ) -> Self {
        Self {
            done: done.into(),
            failed: failed.into(),
            sentinel: sentinel.into(),
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(
            cfg.format.states.done.clone(),
            cfg.format.states.failed.clone(),
            cfg.sequencer.shutdown_sentinel.trim(),
        )
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Decode one payload. Surrounding whitespace (e.g. a trailing newline
    /// from `echo`) is ignored.
    pub fn parse(&self, payload: &str) -> Result<Message> {
        let payload = payload.trim();
        if payload.is_empty() || payload == self.sentinel {
            return Ok(Message::Shutdown);
        }

        let (state, id) = payload.split_once('=').ok_or_else(|| {
            SequencerError::Protocol(format!("expected <STATE>=<id>, got '{payload}'"))
        })?;

        let state = match state.trim() {
            s if s == self.done => JobState::Done,
            s if s == self.failed => JobState::Failed,
            other => {
                return Err(SequencerError::Protocol(format!(
                    "unknown callback state '{other}'"
                )));
            }
        };

        let id = id
            .trim()
            .parse::<JobId>()
            .map_err(|_| SequencerError::Protocol(format!("invalid job id '{}'", id.trim())))?;

        Ok(Message::Completion(Completion { state, id }))
    }
}

/// `STATE=id` without any token validation (used by the notifier binary,
/// which receives the token from its wrapper script).
pub fn encode_raw(state: &str, id: JobId) -> String {
    format!("{state}={id}")
}

/// The address a local client should dial to reach a listener bound to
/// `addr`; wildcard binds are reached over loopback.
pub fn dial_addr(addr: SocketAddr) -> SocketAddr {
    let mut addr = addr;
    if addr.ip().is_unspecified() {
        addr.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    addr
}

/// Open a connection, write `payload`, close.
pub async fn send(host: &str, port: u16, payload: &str) -> Result<()> {
    let mut stream = TcpStream::connect((host, port)).await?;
    stream.write_all(payload.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_done_and_failed() {
        let p = Protocol::default();
        assert_eq!(
            p.parse("DONE=12").unwrap(),
            Message::Completion(Completion { state: JobState::Done, id: 12 })
        );
        assert_eq!(
            p.parse("FAILED=3\n").unwrap(),
            Message::Completion(Completion { state: JobState::Failed, id: 3 })
        );
    }

    #[test]
    fn splits_on_first_equals_only() {
        let err = Protocol::default().parse("DONE=1=2").unwrap_err();
        assert!(matches!(err, SequencerError::Protocol(_)));
    }

    #[test]
    fn sentinel_and_empty_payload_mean_shutdown() {
        let p = Protocol::default();
        assert_eq!(p.parse("SHUTDOWN").unwrap(), Message::Shutdown);
        assert_eq!(p.parse("").unwrap(), Message::Shutdown);
        assert_eq!(p.parse("  \n").unwrap(), Message::Shutdown);
    }

    #[test]
    fn rejects_unknown_state_and_bad_id() {
        let p = Protocol::default();
        assert!(p.parse("RUNNING=1").is_err());
        assert!(p.parse("DONE=abc").is_err());
        assert!(p.parse("DONE").is_err());
    }

    #[test]
    fn notifier_payload_parses_with_configured_tokens() {
        let p = Protocol::new("ok", "ko", "bye");
        let msg = encode_raw("ko", 8);
        assert_eq!(msg, "ko=8");
        assert_eq!(
            p.parse(&msg).unwrap(),
            Message::Completion(Completion { state: JobState::Failed, id: 8 })
        );
    }

    #[test]
    fn wildcard_bind_is_dialled_over_loopback() {
        let wildcard: SocketAddr = "0.0.0.0:5555".parse().unwrap();
        assert_eq!(dial_addr(wildcard), "127.0.0.1:5555".parse::<SocketAddr>().unwrap());

        let fixed: SocketAddr = "10.0.0.2:5555".parse().unwrap();
        assert_eq!(dial_addr(fixed), fixed);
    }
}
