//! # Vitaminder Entry Point
//!
//! Usage: `vitaminder [CONFIG]`. Without an argument `vitaminder.toml` in the
//! working directory is used. The process runs until an EXIT event is
//! processed (from the optional run-time limit) and exits 0; a bad
//! configuration or an unopenable serial port aborts startup.

use anyhow::Context;
use std::env;
use tracing::{info, Level};
use vitaminder_lib::config::{Config, DEFAULT_CONFIG_PATH};
use vitaminder_lib::schedule::SystemClock;
use vitaminder_lib::{serial_link, Daemon};

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    let (path, defaulted) = match env::args().nth(1) {
        Some(path) => (path, false),
        None => (DEFAULT_CONFIG_PATH.to_string(), true),
    };

    // Config warnings are emitted before the configured level is known
    let bootstrap = tracing_subscriber::fmt().with_max_level(Level::INFO).finish();
    let config = tracing::subscriber::with_default(bootstrap, || Config::load_from_path(&path))
        .with_context(|| format!("loading configuration from {path}"))?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_thread_names(true)
        .init();
    if defaulted {
        info!(path = %path, "no config file specified, using default");
    }

    info!(port = %config.link.port, baud = config.link.baud_rate, "connecting");
    let (reader, writer) = serial_link::open(&config.link).context("opening serial link")?;
    info!("connected");

    let daemon =
        Daemon::start(config, reader, writer, SystemClock).context("starting worker threads")?;
    daemon.join();

    info!("all done");
    Ok(())
}
