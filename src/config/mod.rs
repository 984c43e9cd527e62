// src/config/mod.rs

//! Configuration loading and validation for cmdseq.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants like distinct format tokens (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    BackgroundSection, ConfigFile, FlagTokens, FormatSection, ModeTokens, RawConfigFile,
    RemoteSection, SequencerSection, StateTokens,
};
