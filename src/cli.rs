// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `cmdseq`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "cmdseq",
    version,
    about = "Run a store of dependent shell jobs until every job is finished.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// When the default `Cmdseq.toml` does not exist, built-in defaults are
    /// used. An explicitly given path must exist.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to the job record store (overrides `[sequencer].store`).
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Completion listener port (overrides `[sequencer].port`).
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CMDSEQ_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load config and store, print every job with its readiness, but don't
    /// execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
