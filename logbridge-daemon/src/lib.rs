//! logbridge daemon library.
//!
//! This library exposes internal modules for integration testing.
//! In production, the daemon is used as the `log-forwarder` binary (main.rs).

pub mod cli;
pub mod daemon;
pub mod logging;
pub mod metrics_server;

pub use daemon::{Daemon, load_config};
