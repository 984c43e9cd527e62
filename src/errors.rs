// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::{JobId, JobState};

#[derive(Error, Debug)]
pub enum SequencerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A persisted line does not fit the fixed 12-field layout. Fatal.
    #[error("Store corrupt at line {line}: {reason}")]
    StoreCorrupt { line: usize, reason: String },

    #[error("Duplicate job id in store: {0}")]
    DuplicateId(JobId),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobState,
        to: JobState,
    },

    /// The job could not even be started (unreachable host, auth failure,
    /// wrapper script could not be written, ...).
    #[error("Dispatch failed for job {id}: {reason}")]
    Dispatch { id: JobId, reason: String },

    /// Malformed completion callback payload.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SequencerError>;
