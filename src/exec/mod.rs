// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs the command of a ready job with `tokio::process::Command` and tells
//! the sequencer whether the outcome is already known.
//!
//! - [`backend`] provides the `Dispatcher` trait and the production
//!   `CommandDispatcher`, which tests can replace with a fake.
//! - [`sync`] runs SYNC jobs in the foreground.
//! - [`background`] starts detached local wrapper scripts.
//! - [`remote`] starts wrapper scripts on other hosts over SSH.
//! - [`script`] renders the self-reporting wrapper scripts.

pub mod backend;
pub mod background;
pub mod remote;
pub mod script;
pub mod sync;

pub use backend::{CommandDispatcher, DispatchOutcome, Dispatcher};
pub use background::BackgroundLauncher;
pub use remote::RemoteLauncher;
pub use script::NotifyTarget;
pub use sync::SyncRunner;
