//! Shared energy pool for a changing set of storage nodes, with a
//! scenario-driven simulator around it.

#[cfg(feature = "api")]
pub mod api;
pub mod config;
/// Simulated grid members: cells, machines, generators and emitters.
pub mod devices;
pub mod error;
pub mod grid;
pub mod io;
/// Simulation engine, clock, churn and run summary.
pub mod sim;
