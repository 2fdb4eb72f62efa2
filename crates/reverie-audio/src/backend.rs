//! Playback collaborator interface.
//!
//! The audio device is not part of this crate. Everything above it talks to
//! the device through two traits:
//!
//! - [`AudioBackend`]: creates named playback handles and runs the device's
//!   own timers (delayed starts, self-destruction).
//! - [`PlaybackHandle`]: one positioned, volume-controlled audio emitter.
//!
//! ```text
//! ┌──────────────────────┐   create_handle   ┌──────────────────┐
//! │ SoundPlaybackService │ ────────────────▶ │   AudioBackend   │
//! │ Fader / Controller   │                   │ (headless/rodio) │
//! └──────────┬───────────┘                   └────────┬─────────┘
//!            │  set_volume / play_now / ...           │ owns
//!            ▼                                        ▼
//!      SharedHandle ─────────────────────────▶ PlaybackHandle
//! ```
//!
//! Handles become invalid once destroyed. Every setter on an invalid handle
//! is a silent no-op, so callers never need to check validity just to
//! avoid a fault.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::Vec3;
use reverie_common::NodeId;

use crate::sound::ClipRef;

/// Unique identifier of a playback handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    /// Create a handle ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// Handle ID generator shared by backends.
#[derive(Debug)]
pub struct HandleGenerator {
    next_id: AtomicU64,
}

impl Default for HandleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleGenerator {
    /// Create a new handle generator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Generate a new unique handle ID.
    pub fn next(&self) -> HandleId {
        HandleId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// An active audio emitter owned by the backend.
pub trait PlaybackHandle: Send + Sync + fmt::Debug {
    /// Unique id of this handle.
    fn id(&self) -> HandleId;

    /// Name given at creation.
    fn name(&self) -> String;

    /// Assign the clip to play. `None` clears it.
    fn set_clip(&self, clip: Option<ClipRef>);

    /// Set whether playback loops.
    fn set_looping(&self, looping: bool);

    /// Current volume.
    fn volume(&self) -> f32;

    /// Set the volume.
    fn set_volume(&self, volume: f32);

    /// Distance within which the sound plays at full volume.
    fn set_min_distance(&self, distance: f32);

    /// Blend between 2D (0.0) and fully spatialized (1.0) playback.
    fn set_spatial_blend(&self, blend: f32);

    /// Set the world position.
    fn set_position(&self, position: Vec3);

    /// Attach the handle to a scene node so it follows that node.
    fn attach_to(&self, parent: NodeId);

    /// Start playback immediately, restarting the clip.
    fn play_now(&self);

    /// Start playback after `delay` seconds without blocking the caller.
    fn play_after(&self, delay: f32);

    /// Destroy the handle after `seconds`. Zero destroys it on the next update.
    fn destroy_after(&self, seconds: f32);

    /// Whether the handle still refers to a live emitter.
    fn is_valid(&self) -> bool;
}

/// Shared reference to a playback handle.
pub type SharedHandle = Arc<dyn PlaybackHandle>;

/// Factory and timer driver for playback handles.
pub trait AudioBackend {
    /// Create a new, silent, stopped handle.
    fn create_handle(&self, name: &str) -> SharedHandle;

    /// Advance the backend's timers by `delta` seconds.
    fn update(&self, delta: f32);
}
