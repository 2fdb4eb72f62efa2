//! Headless playback backend.
//!
//! Simulates the device side of playback without producing sound: handles
//! keep their full state, and [`HeadlessBackend::update`] advances delayed
//! starts, clip ends and destruction timers. Used by tests and by the
//! engine binary when no output device is requested.

use std::sync::Arc;

use glam::Vec3;
use parking_lot::Mutex;
use reverie_common::NodeId;
use tracing::trace;

use crate::backend::{AudioBackend, HandleGenerator, HandleId, PlaybackHandle, SharedHandle};
use crate::sound::ClipRef;

/// Playback progress of a headless handle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum HeadlessPlayback {
    /// Never started, or stopped by destruction.
    #[default]
    Stopped,
    /// Waiting for a delayed start.
    Pending {
        /// Seconds until playback starts.
        remaining: f32,
    },
    /// Playing.
    Playing {
        /// Seconds since playback started.
        elapsed: f32,
    },
    /// Reached the end of a non-looping clip.
    Finished,
}

/// Snapshot of everything set on a headless handle.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessHandleState {
    /// Assigned clip.
    pub clip: Option<ClipRef>,
    /// Loop flag.
    pub looping: bool,
    /// Volume.
    pub volume: f32,
    /// Full-volume distance.
    pub min_distance: f32,
    /// 2D/3D blend.
    pub spatial_blend: f32,
    /// World position.
    pub position: Vec3,
    /// Parent node, if attached.
    pub parent: Option<NodeId>,
    /// Playback progress.
    pub playback: HeadlessPlayback,
    /// Number of `play_now`/`play_after` calls.
    pub starts: u32,
    /// Seconds until destruction, if scheduled.
    pub destroy_in: Option<f32>,
    /// Whether the handle has been destroyed.
    pub destroyed: bool,
}

impl Default for HeadlessHandleState {
    fn default() -> Self {
        Self {
            clip: None,
            looping: false,
            volume: 1.0,
            min_distance: 1.0,
            spatial_blend: 0.0,
            position: Vec3::ZERO,
            parent: None,
            playback: HeadlessPlayback::Stopped,
            starts: 0,
            destroy_in: None,
            destroyed: false,
        }
    }
}

/// A simulated playback handle.
#[derive(Debug)]
pub struct HeadlessHandle {
    id: HandleId,
    name: String,
    state: Mutex<HeadlessHandleState>,
}

impl HeadlessHandle {
    fn new(id: HandleId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            state: Mutex::new(HeadlessHandleState::default()),
        }
    }

    /// Copy of the current state.
    #[must_use]
    pub fn state(&self) -> HeadlessHandleState {
        self.state.lock().clone()
    }

    /// Whether the clip is audible right now.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        matches!(self.state.lock().playback, HeadlessPlayback::Playing { .. })
    }

    /// Apply a change unless the handle has been destroyed.
    fn modify(&self, f: impl FnOnce(&mut HeadlessHandleState)) {
        let mut state = self.state.lock();
        if !state.destroyed {
            f(&mut state);
        }
    }

    fn advance(&self, delta: f32) {
        let mut state = self.state.lock();
        if state.destroyed {
            return;
        }

        if let Some(remaining) = state.destroy_in {
            let remaining = remaining - delta;
            if remaining <= 0.0 {
                state.destroy_in = None;
                state.destroyed = true;
                state.playback = HeadlessPlayback::Stopped;
                trace!("Destroyed {} '{}'", self.id, self.name);
                return;
            }
            state.destroy_in = Some(remaining);
        }

        state.playback = match state.playback {
            HeadlessPlayback::Pending { remaining } if remaining - delta <= 0.0 => {
                HeadlessPlayback::Playing {
                    elapsed: delta - remaining,
                }
            },
            HeadlessPlayback::Pending { remaining } => HeadlessPlayback::Pending {
                remaining: remaining - delta,
            },
            HeadlessPlayback::Playing { elapsed } => {
                let elapsed = elapsed + delta;
                let length = state.clip.as_ref().and_then(|clip| clip.length);
                match length {
                    Some(length) if !state.looping && elapsed >= length => {
                        HeadlessPlayback::Finished
                    },
                    _ => HeadlessPlayback::Playing { elapsed },
                }
            },
            other => other,
        };
    }
}

impl PlaybackHandle for HeadlessHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn set_clip(&self, clip: Option<ClipRef>) {
        self.modify(|s| s.clip = clip);
    }

    fn set_looping(&self, looping: bool) {
        self.modify(|s| s.looping = looping);
    }

    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn set_volume(&self, volume: f32) {
        self.modify(|s| s.volume = volume);
    }

    fn set_min_distance(&self, distance: f32) {
        self.modify(|s| s.min_distance = distance);
    }

    fn set_spatial_blend(&self, blend: f32) {
        self.modify(|s| s.spatial_blend = blend);
    }

    fn set_position(&self, position: Vec3) {
        self.modify(|s| s.position = position);
    }

    fn attach_to(&self, parent: NodeId) {
        self.modify(|s| s.parent = Some(parent));
    }

    fn play_now(&self) {
        self.modify(|s| {
            s.playback = HeadlessPlayback::Playing { elapsed: 0.0 };
            s.starts += 1;
        });
    }

    fn play_after(&self, delay: f32) {
        self.modify(|s| {
            s.playback = HeadlessPlayback::Pending { remaining: delay };
            s.starts += 1;
        });
    }

    fn destroy_after(&self, seconds: f32) {
        self.modify(|s| s.destroy_in = Some(seconds.max(0.0)));
    }

    fn is_valid(&self) -> bool {
        !self.state.lock().destroyed
    }
}

#[derive(Debug, Default)]
struct HeadlessInner {
    generator: HandleGenerator,
    handles: Mutex<Vec<Arc<HeadlessHandle>>>,
    created: Mutex<u64>,
    clock: Mutex<f32>,
}

/// In-memory backend. Clones share the same handle set.
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    inner: Arc<HeadlessInner>,
}

impl HeadlessBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Live (not yet destroyed) handles, in creation order.
    #[must_use]
    pub fn handles(&self) -> Vec<Arc<HeadlessHandle>> {
        self.inner.handles.lock().clone()
    }

    /// Most recently created live handle with the given name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Arc<HeadlessHandle>> {
        self.inner
            .handles
            .lock()
            .iter()
            .rev()
            .find(|h| h.name == name)
            .cloned()
    }

    /// Live handle with the given id.
    #[must_use]
    pub fn get(&self, id: HandleId) -> Option<Arc<HeadlessHandle>> {
        self.inner
            .handles
            .lock()
            .iter()
            .find(|h| h.id == id)
            .cloned()
    }

    /// Number of live handles.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner.handles.lock().len()
    }

    /// Number of handles created since construction.
    #[must_use]
    pub fn created_count(&self) -> u64 {
        *self.inner.created.lock()
    }

    /// Seconds simulated so far.
    #[must_use]
    pub fn elapsed(&self) -> f32 {
        *self.inner.clock.lock()
    }
}

impl AudioBackend for HeadlessBackend {
    fn create_handle(&self, name: &str) -> SharedHandle {
        let handle = Arc::new(HeadlessHandle::new(self.inner.generator.next(), name));
        self.inner.handles.lock().push(Arc::clone(&handle));
        *self.inner.created.lock() += 1;
        trace!("Created {} '{}'", handle.id, name);
        handle
    }

    fn update(&self, delta: f32) {
        *self.inner.clock.lock() += delta;

        let mut handles = self.inner.handles.lock();
        for handle in handles.iter() {
            handle.advance(delta);
        }
        handles.retain(|h| h.is_valid());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_find() {
        let backend = HeadlessBackend::new();
        let handle = backend.create_handle("Ambient sound");

        let found = backend.find("Ambient sound").expect("handle registered");
        assert_eq!(found.id(), handle.id());
        assert_eq!(backend.live_count(), 1);
        assert_eq!(backend.created_count(), 1);
    }

    #[test]
    fn test_delayed_start() {
        let backend = HeadlessBackend::new();
        let handle = backend.create_handle("delayed");
        handle.play_after(0.5);

        let headless = backend.get(handle.id()).expect("live handle");
        backend.update(0.25);
        assert!(!headless.is_playing());
        backend.update(0.3);
        assert!(headless.is_playing());
    }

    #[test]
    fn test_destroy_timer() {
        let backend = HeadlessBackend::new();
        let handle = backend.create_handle("one-shot");
        handle.destroy_after(1.0);

        backend.update(0.9);
        assert!(handle.is_valid());
        backend.update(0.2);
        assert!(!handle.is_valid());
        assert_eq!(backend.live_count(), 0);
    }

    #[test]
    fn test_setters_ignored_after_destroy() {
        let backend = HeadlessBackend::new();
        let handle = backend.create_handle("gone");
        let headless = backend.get(handle.id()).expect("live handle");
        handle.set_volume(0.3);
        handle.destroy_after(0.0);
        backend.update(0.0);

        handle.set_volume(0.9);
        handle.play_now();
        let state = headless.state();
        assert!(state.destroyed);
        assert!((state.volume - 0.3).abs() < f32::EPSILON);
        assert_eq!(state.starts, 0);
    }

    #[test]
    fn test_non_looping_clip_finishes() {
        let backend = HeadlessBackend::new();
        let handle = backend.create_handle("short");
        handle.set_clip(Some(ClipRef::new("short.wav").with_length(1.0)));
        handle.play_now();

        let headless = backend.get(handle.id()).expect("live handle");
        backend.update(1.5);
        assert_eq!(headless.state().playback, HeadlessPlayback::Finished);

        handle.set_looping(true);
        handle.play_now();
        backend.update(5.0);
        assert!(headless.is_playing());
    }
}
