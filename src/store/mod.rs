// src/store/mod.rs

//! Job record store.
//!
//! - [`record`] defines `JobRecord` and its state transitions.
//! - [`codec`] maps records to and from the delimited line format.
//! - [`record_store`] owns the persisted file and the lock guarding it.

pub mod codec;
pub mod record;
pub mod record_store;

pub use codec::RecordCodec;
pub use record::{JobRecord, RemoteTarget};
pub use record_store::{RecordStore, StoreGuard};
