//! # Reverie Engine
//!
//! Command-line driver for the Reverie audio controller.
//!
//! Loads `reverie.toml` (or the path given as the first argument), the sound
//! catalog and the level list, then plays the configured level tour on a
//! fixed tick.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;
mod config;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::EngineConfig;

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("reverie=info".parse()?))
        .init();

    info!("Reverie starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    };
    config.validate();

    let summary = app::run(&config)?;
    info!(
        "Tour finished: {} ticks, {} level changes, {} cues, {} songs cached",
        summary.ticks, summary.level_changes, summary.cues_played, summary.songs_cached
    );

    info!("Reverie shutdown complete");
    Ok(())
}
