//! # Reverie Audio
//!
//! Level-driven music, ambience and one-shot sound playback.
//!
//! This crate provides:
//! - Sound catalog entries with random variations
//! - A playback service that configures and starts handles on a backend
//! - Volume fades driven by a per-frame tick
//! - Periodic environment event sounds per level
//! - A controller that crossfades music and switches ambience on level changes
//! - A headless backend for tests and tools, and a rodio device backend
//!
//! ## Update Model
//!
//! Nothing here spawns threads. Fades and event loops are cooperative tasks
//! that advance when the owner calls `update`/`tick` with the frame delta.
//! Every task returns a [`TaskHandle`](task::TaskHandle) whose cancellation is
//! idempotent and takes effect before the task's next step.
//!
//! ## Backends
//!
//! Playback goes through the [`AudioBackend`](backend::AudioBackend) and
//! [`PlaybackHandle`](backend::PlaybackHandle) traits:
//! - [`HeadlessBackend`](headless::HeadlessBackend) simulates playback and
//!   records state for inspection
//! - `RodioBackend` (feature `rodio`) plays through the default output device

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod backend;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod env_events;
pub mod fader;
pub mod headless;
pub mod level;
pub mod playback;
#[cfg(feature = "rodio")]
pub mod rodio_backend;
pub mod sound;
pub mod task;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::backend::*;
    pub use crate::catalog::*;
    pub use crate::config::*;
    pub use crate::controller::*;
    pub use crate::env_events::*;
    pub use crate::fader::*;
    pub use crate::headless::*;
    pub use crate::level::*;
    pub use crate::playback::*;
    #[cfg(feature = "rodio")]
    pub use crate::rodio_backend::*;
    pub use crate::sound::*;
    pub use crate::task::*;
}

pub use prelude::*;
