// src/dag/mod.rs

//! Dependency structure and readiness.
//!
//! - [`graph`] holds the id adjacency built from a loaded store.
//! - [`resolver`] decides Ready / StillWaiting / Blocked for one job.
//! - [`pass`] runs the resolver over a whole store and applies the
//!   resulting WAITING/BLOCKED transitions.

pub mod graph;
pub mod pass;
pub mod resolver;

pub use graph::DependencyGraph;
pub use pass::{PassOptions, PassPlan, plan_pass};
pub use resolver::{Readiness, Resolver};
