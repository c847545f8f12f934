//! placenet CLI crate
//!
//! Library view of the `placenet` binary, so commands can be driven from
//! tests without spawning a process.
//!
//! Commands (see [commands]):
//! - init: write the default `placenet.toml`.
//! - run: drive the network from the configured scenario, optionally paced in
//!   real time, and export the trace and the latest snapshot.
//! - topology: export the lattice adjacency, weights and readout directions.

pub mod commands;
pub mod config;
pub mod error;
pub mod scenario;

pub use commands::PlacenetCli;
