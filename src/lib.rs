// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod protocol;
pub mod store;
pub mod types;

use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_or_default};
use crate::dag::Resolver;
use crate::engine::{CompletionListener, RunSummary, SequencerOptions, run_with_listener};
use crate::exec::CommandDispatcher;
use crate::protocol::Protocol;
use crate::store::{RecordCodec, RecordStore};
use crate::types::ExecMode;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the record store
/// - completion listener + sequencer
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<RunSummary> {
    let mut cfg = load_or_default(args.config.as_deref())?;
    apply_overrides(&mut cfg, &args);

    if args.dry_run {
        print_dry_run(&cfg).await?;
        return Ok(RunSummary::default());
    }

    run_config(&cfg).await
}

/// Run the store named by `cfg` until every job is terminal.
pub async fn run_config(cfg: &ConfigFile) -> Result<RunSummary> {
    let store = Arc::new(open_store(cfg));
    let records = store.validate().await?;
    info!(
        store = %store.path().display(),
        jobs = records.len(),
        "record store loaded"
    );

    let listener = CompletionListener::bind(
        &cfg.sequencer.bind,
        cfg.sequencer.port,
        store,
        Protocol::from_config(cfg),
    )
    .await?;
    let addr = listener.local_addr()?;

    let dispatcher = CommandDispatcher::from_config(cfg, addr.port());
    let options = SequencerOptions::from_config(cfg, addr);
    let sentinel = options.shutdown_sentinel.clone();

    // Ctrl-C stops the loop. Detached jobs keep running; their callbacks
    // will find no listener.
    tokio::select! {
        summary = run_with_listener(listener, dispatcher, options) => Ok(summary?),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            warn!("interrupted; stopping sequencer");
            let dial = protocol::dial_addr(addr);
            match protocol::send(&dial.ip().to_string(), dial.port(), &sentinel).await {
                Ok(()) => debug!(addr = %dial, "shutdown sentinel sent"),
                Err(e) => debug!(addr = %dial, error = %e, "could not reach completion listener"),
            }
            bail!("interrupted before all jobs finished")
        }
    }
}

pub fn open_store(cfg: &ConfigFile) -> RecordStore {
    RecordStore::new(
        cfg.sequencer.store.clone(),
        RecordCodec::new(cfg.format.clone()),
    )
}

fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) {
    if let Some(store) = &args.store {
        cfg.sequencer.store = store.clone();
    }
    if let Some(port) = args.port {
        cfg.sequencer.port = port;
    }
}

/// Print config highlights and every job with its current readiness.
/// Nothing is written back.
async fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    let store = open_store(cfg);
    let records = store.validate().await?;
    let resolver = Resolver::new(cfg.sequencer.failure_propagation);

    println!("cmdseq dry-run");
    println!("  store = {}", cfg.sequencer.store.display());
    println!(
        "  listener = {}:{}",
        cfg.sequencer.bind, cfg.sequencer.port
    );
    println!(
        "  failure_propagation = {:?}",
        cfg.sequencer.failure_propagation
    );
    println!();

    println!("jobs ({}):", records.len());
    for record in &records {
        println!("  - {} [{}] {}", record.id, record.state, record.label);
        println!("      mode: {}", record.mode);
        println!("      cmd: {}", record.command);
        if !record.dependencies.is_empty() {
            println!("      after: {:?}", record.dependencies);
        }
        if record.fail_fast {
            println!("      fail_fast: true");
        }
        if record.mode == ExecMode::Remote {
            println!("      remote: {}", record.remote.destination());
        }
        if record.state.is_schedulable() {
            println!("      readiness: {:?}", resolver.resolve(&records, record));
        }
    }

    info!("dry-run complete (no execution)");
    Ok(())
}
