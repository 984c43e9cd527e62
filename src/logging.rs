// src/logging.rs

//! Logging setup for `cmdseq` using `tracing` + `tracing-subscriber`.
//!
//! Filter selection:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `CMDSEQ_LOG`, any `EnvFilter` directive list (e.g. `debug` or
//!    `info,cmdseq::engine=trace`)
//! 3. default to `info`
//!
//! Logs go to STDERR. SYNC job output is captured and re-logged at debug.

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "CMDSEQ_LOG";

/// Initialise global logging subscriber. Fails if called twice.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = build_filter(cli_level, env.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("initialising logging: {e}"))?;

    Ok(())
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(directive(level)));
    }

    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(spec) => EnvFilter::try_new(spec)
            .with_context(|| format!("invalid {LOG_ENV} value '{spec}'")),
        None => Ok(EnvFilter::new("info")),
    }
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
