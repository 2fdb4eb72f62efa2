//! Sound playback service.
//!
//! Turns sound cues into live playback handles. This is the general-purpose
//! entry point for one-shot effects as well as the building block the level
//! controller uses for music and ambience.
//!
//! Every operation degrades to silence on missing data: an absent cue, an
//! unknown id or a variation without a clip returns `None` and creates no
//! handle.

use glam::Vec3;
use reverie_common::NodeId;
use tracing::{debug, trace};

use crate::backend::{AudioBackend, SharedHandle};
use crate::catalog::SoundCatalog;
use crate::config::AudioConfig;
use crate::sound::{SoundCatalogEntry, UNSET_VOLUME};

/// Optional overrides for a single playback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    /// Seconds to wait before playback starts.
    pub delay: f32,
    /// Volume override. Negative means "use the sound's volume".
    pub volume: f32,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            delay: 0.0,
            volume: UNSET_VOLUME,
        }
    }
}

impl PlayOptions {
    /// Set the start delay.
    #[must_use]
    pub const fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay;
        self
    }

    /// Override the volume.
    #[must_use]
    pub const fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }
}

/// Resolves sound cues and plays them on backend handles.
#[derive(Debug)]
pub struct SoundPlaybackService<B: AudioBackend> {
    backend: B,
    rng: fastrand::Rng,
    min_distance: f32,
    destroy_padding: f32,
    max_variation_depth: usize,
}

impl<B: AudioBackend> SoundPlaybackService<B> {
    /// Create a service on top of `backend`.
    pub fn new(backend: B, config: &AudioConfig) -> Self {
        let rng = config
            .rng_seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);

        Self {
            backend,
            rng,
            min_distance: config.min_distance,
            destroy_padding: config.destroy_padding,
            max_variation_depth: config.max_variation_depth,
        }
    }

    /// The playback backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Create a stopped handle with the standard emitter settings.
    pub fn create(&self, name: &str) -> SharedHandle {
        let handle = self.backend.create_handle(name);
        handle.set_min_distance(self.min_distance);
        handle
    }

    /// Play a cue by catalog id.
    pub fn play_by_id(&mut self, catalog: &SoundCatalog, id: &str) -> Option<SharedHandle> {
        self.play(catalog.find(id), PlayOptions::default())
    }

    /// Play a cue on a fresh, non-spatial handle.
    ///
    /// Non-looping playback destroys its handle once the resolved clip has
    /// played, plus a small padding. Without a known clip length the handle
    /// is destroyed right away.
    pub fn play(
        &mut self,
        sound: Option<&SoundCatalogEntry>,
        options: PlayOptions,
    ) -> Option<SharedHandle> {
        let sound = sound?;
        let resolved = sound.resolve(&mut self.rng, self.max_variation_depth)?;

        let handle = self.create(&format!("Sound {}", sound.id));
        Self::apply(resolved, &handle, options);

        if !resolved.looping {
            let lifetime = resolved
                .clip_length()
                .map_or(0.0, |length| length + self.destroy_padding);
            handle.destroy_after(lifetime);
            trace!("{} self-destructs in {:.2}s", handle.id(), lifetime);
        }

        Some(handle)
    }

    /// Play a cue at a world position, fully spatialized.
    pub fn play_at(
        &mut self,
        sound: Option<&SoundCatalogEntry>,
        position: Vec3,
        options: PlayOptions,
    ) -> Option<SharedHandle> {
        let handle = self.play(sound, options)?;
        handle.set_position(position);
        handle.set_spatial_blend(1.0);
        Some(handle)
    }

    /// Play a cue attached to a scene node, fully spatialized.
    pub fn play_attached(
        &mut self,
        sound: Option<&SoundCatalogEntry>,
        parent: NodeId,
        options: PlayOptions,
    ) -> Option<SharedHandle> {
        let handle = self.play(sound, options)?;
        handle.attach_to(parent);
        handle.set_spatial_blend(1.0);
        Some(handle)
    }

    /// Play a cue on an existing handle.
    ///
    /// Returns the entry actually played (after variation resolution), or
    /// `None` if nothing was changed on the handle.
    pub fn configure<'a>(
        &mut self,
        sound: Option<&'a SoundCatalogEntry>,
        handle: &SharedHandle,
        options: PlayOptions,
    ) -> Option<&'a SoundCatalogEntry> {
        let resolved = sound?.resolve(&mut self.rng, self.max_variation_depth)?;
        Self::apply(resolved, handle, options);
        Some(resolved)
    }

    fn apply(sound: &SoundCatalogEntry, handle: &SharedHandle, options: PlayOptions) {
        handle.set_clip(sound.clip.clone());
        handle.set_looping(sound.looping);
        handle.set_volume(if options.volume >= 0.0 {
            options.volume
        } else {
            sound.volume
        });

        if options.delay > 0.0 {
            handle.play_after(options.delay);
        } else {
            handle.play_now();
        }

        debug!(
            "Playing '{}' on {} (delay {:.2}s)",
            sound.id,
            handle.id(),
            options.delay.max(0.0)
        );
    }
}
