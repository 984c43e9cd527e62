// src/bin/notify.rs

//! `cmdseq-notify <host> <port> <STATE> <id>`
//!
//! Reports the outcome of a detached job to the sequencer's completion
//! listener. Invoked by the generated wrapper scripts.

use anyhow::Context;
use clap::Parser;

use cmdseq::protocol;
use cmdseq::types::JobId;

#[derive(Debug, Parser)]
#[command(
    name = "cmdseq-notify",
    version,
    about = "Send a job completion callback to a running cmdseq."
)]
struct NotifyArgs {
    /// Listener host.
    host: String,

    /// Listener port.
    port: u16,

    /// State token, e.g. DONE or FAILED.
    state: String,

    /// Job id.
    id: JobId,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("cmdseq-notify error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = NotifyArgs::parse();
    let payload = protocol::encode_raw(&args.state, args.id);

    protocol::send(&args.host, args.port, &payload)
        .await
        .with_context(|| format!("sending '{payload}' to {}:{}", args.host, args.port))?;

    Ok(())
}
