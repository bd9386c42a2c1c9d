//! # smoothie-driver
//!
//! A controller driver for a Smoothieware CNC/laser machine: streams G-code
//! programs under a character-counting flow-control protocol, interleaves
//! realtime status/parser-state queries, and manages the idle/running/paused
//! workflow that a client session observes and drives.
//!
//! The driver itself lives in two crates:
//!
//! - `smoothie_core` — controller trait, data model (position, machine
//!   status), the event bus, and the error hierarchy every layer shares.
//! - `smoothie_comm` — transports (serial/TCP) and the Smoothieware
//!   firmware driver: Sender, Feeder, Workflow, line preprocessor, response
//!   parser, and command dispatcher.
//!
//! This root crate wires the two together into a small command-line entry
//! point; embedding applications typically depend on `smoothie-comm`
//! directly instead.

#![allow(dead_code)]

pub use smoothie_comm as comm;
pub use smoothie_core as core;

pub use smoothie_comm::{
    ConnectionDriver, ConnectionParams, Dispatcher, SerialTransport, SmoothiewareController,
    TcpTransport, Transport,
};
pub use smoothie_core::{ControllerState, ControllerStatus, ControllerTrait, Error, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time by `build.rs`).
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize structured logging for the binary entry point.
///
/// The core driver crates never call `tracing_subscriber::init` themselves —
/// only this top-level binary wiring does, so embedding applications can
/// install their own subscriber instead.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let fmt_layer = fmt::layer().with_target(true).with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
