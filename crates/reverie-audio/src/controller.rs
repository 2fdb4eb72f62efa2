//! Level-driven music and ambience.
//!
//! [`LevelAudioController`] reacts to level changes:
//!
//! 1. The previous level's song fades out over the crossfade duration.
//! 2. The new level's song handle is looked up, or created silent on the
//!    first visit and cached for the controller's lifetime.
//! 3. The new song fades in (instantly when there was no previous level).
//! 4. The single shared ambience handle is switched to the new ambience.
//! 5. The environment event loop is replaced by one for the new level.
//!
//! Notifications arrive through a listener registered on the
//! [`LevelDirectory`] and are queued; [`LevelAudioController::update`]
//! drains the queue, so all transitions run on the caller's thread in the
//! order they happened.

use std::collections::HashMap;

use crossbeam_channel::{unbounded, Receiver};
use reverie_common::{LevelId, SubscriptionId};
use tracing::{debug, info, warn};

use crate::backend::{AudioBackend, SharedHandle};
use crate::config::AudioConfig;
use crate::env_events::EnvironmentEventScheduler;
use crate::fader::Fader;
use crate::level::{LevelChanged, LevelDirectory, LevelSource};
use crate::playback::{PlayOptions, SoundPlaybackService};
use crate::task::{CancellationToken, TaskHandle};

/// Name of the shared ambience handle.
pub const AMBIENT_HANDLE_NAME: &str = "Ambient sound";

/// Orchestrates music crossfades, ambience and environment events.
#[derive(Debug)]
pub struct LevelAudioController<B: AudioBackend> {
    service: SoundPlaybackService<B>,
    fader: Fader,
    events: EnvironmentEventScheduler,
    /// Song handle per visited level.
    music: HashMap<LevelId, SharedHandle>,
    /// Fade currently driving each cached song.
    music_fades: HashMap<LevelId, TaskHandle>,
    ambient: Option<SharedHandle>,
    event_task: Option<TaskHandle>,
    changes: Receiver<LevelChanged>,
    subscription: Option<SubscriptionId>,
    lifetime: CancellationToken,
    crossfade_duration: f32,
}

impl<B: AudioBackend> LevelAudioController<B> {
    /// Create a controller and register it with `levels`.
    ///
    /// A controller dropped without [`detach`](Self::detach) is unregistered
    /// by the next level change.
    pub fn new(
        service: SoundPlaybackService<B>,
        levels: &mut LevelDirectory,
        config: &AudioConfig,
    ) -> Self {
        let (sender, changes) = unbounded();
        // Sending fails once the controller, and with it the receiver, is gone.
        let subscription = levels.subscribe(move |change| sender.send(*change).is_ok());

        info!(
            "Level audio controller attached (crossfade {:.1}s)",
            config.crossfade_duration
        );

        Self {
            service,
            fader: Fader::new(),
            events: EnvironmentEventScheduler::new(),
            music: HashMap::new(),
            music_fades: HashMap::new(),
            ambient: None,
            event_task: None,
            changes,
            subscription: Some(subscription),
            lifetime: CancellationToken::new(),
            crossfade_duration: config.crossfade_duration,
        }
    }

    /// Unregister from `levels` and stop the environment event loop.
    ///
    /// Cached music and ambience are left as they are.
    pub fn detach(&mut self, levels: &mut LevelDirectory) {
        if let Some(subscription) = self.subscription.take() {
            levels.unsubscribe(subscription);
        }
        self.lifetime.cancel();
        self.stop_event_loop();
        info!("Level audio controller detached");
    }

    /// Advance the controller by `delta` seconds.
    ///
    /// Runs fades first, then event loops, then queued level changes. A
    /// pending level change cancels the old event loop before it is
    /// advanced, and loops started by the change take their first step on
    /// the next update, like the fades they start.
    pub fn update(&mut self, delta: f32, levels: &dyn LevelSource) {
        self.fader.tick(delta);

        let changes: Vec<LevelChanged> = self.changes.try_iter().collect();
        if !changes.is_empty() {
            self.stop_event_loop();
        }

        self.events.tick(delta, levels, &mut self.service);

        for change in changes {
            self.on_level_change(change, levels);
        }
    }

    /// Apply one level transition.
    pub fn on_level_change(&mut self, change: LevelChanged, levels: &dyn LevelSource) {
        debug!("Level change {:?} -> {:?}", change.previous, change.current);

        if let Some(previous) = change.previous {
            self.fade_out(previous, levels);
        }

        let env = change
            .current
            .and_then(|current| levels.environment(current).map(|env| (current, env)));
        if change.current.is_some() && env.is_none() {
            warn!("No sound environment for {:?}", change.current);
        }

        if let Some((current, env)) = env {
            let crossfade = if change.previous.is_some() {
                self.crossfade_duration
            } else {
                0.0
            };
            if let Some(song) = self.song_handle(current, levels) {
                self.start_fade(current, &song, 0.0, env.song_volume(), crossfade);
            }

            let service = &mut self.service;
            let ambient = self
                .ambient
                .get_or_insert_with(|| service.create(AMBIENT_HANDLE_NAME));
            service.configure(env.day_ambience.as_ref(), ambient, PlayOptions::default());
        }

        self.stop_event_loop();
        if let Some((current, env)) = env {
            let task = self.events.start(current, env, self.lifetime.clone());
            self.event_task = Some(task);
        }
    }

    fn fade_out(&mut self, level: LevelId, levels: &dyn LevelSource) {
        let Some(song) = self.music.get(&level).cloned() else {
            return;
        };
        let from = levels
            .environment(level)
            .map_or_else(|| song.volume(), |env| env.song_volume());
        self.start_fade(level, &song, from, 0.0, self.crossfade_duration);
    }

    /// Cached song handle for `level`, created silent on first use.
    fn song_handle(&mut self, level: LevelId, levels: &dyn LevelSource) -> Option<SharedHandle> {
        if let Some(song) = self.music.get(&level).filter(|song| song.is_valid()) {
            debug!("Reusing {} for {}", song.id(), level);
            return Some(SharedHandle::clone(song));
        }

        let env = levels.environment(level)?;
        let song = self
            .service
            .play(env.song.as_ref(), PlayOptions::default().with_volume(0.0))?;
        debug!("Created {} for {}", song.id(), level);
        self.music.insert(level, SharedHandle::clone(&song));
        Some(song)
    }

    fn start_fade(
        &mut self,
        level: LevelId,
        song: &SharedHandle,
        from: f32,
        to: f32,
        duration: f32,
    ) {
        if let Some(running) = self.music_fades.remove(&level) {
            running.cancel();
        }
        let task = self.fader.fade(song, from, to, duration);
        if task.is_running() {
            self.music_fades.insert(level, task);
        }
    }

    fn stop_event_loop(&mut self) {
        if let Some(task) = self.event_task.take() {
            self.events.cancel(&task);
        }
    }

    /// Playback service, for one-shot effects.
    #[must_use]
    pub fn service(&self) -> &SoundPlaybackService<B> {
        &self.service
    }

    /// Mutable playback service, for one-shot effects.
    pub fn service_mut(&mut self) -> &mut SoundPlaybackService<B> {
        &mut self.service
    }

    /// Cached song handle of a level.
    #[must_use]
    pub fn music_handle(&self, level: LevelId) -> Option<&SharedHandle> {
        self.music.get(&level)
    }

    /// Number of levels with a cached song.
    #[must_use]
    pub fn cached_songs(&self) -> usize {
        self.music.len()
    }

    /// The shared ambience handle, once created.
    #[must_use]
    pub fn ambient_handle(&self) -> Option<&SharedHandle> {
        self.ambient.as_ref()
    }

    /// The running environment event loop.
    #[must_use]
    pub fn event_task(&self) -> Option<&TaskHandle> {
        self.event_task.as_ref()
    }

    /// Number of running fades.
    #[must_use]
    pub fn active_fades(&self) -> usize {
        self.fader.active_count()
    }

    /// Whether the controller is still registered with a level model.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessBackend;
    use crate::level::LevelInfo;
    use crate::sound::{ClipRef, SoundCatalogEntry, SoundEnvironment};

    fn level(id: u32, volume: f32) -> LevelInfo {
        let song = SoundCatalogEntry::new(format!("song_{id}"))
            .with_clip(ClipRef::new(format!("music/{id}.ogg")).with_length(120.0))
            .with_looping(true)
            .with_volume(volume);
        LevelInfo::new(
            LevelId::new(id),
            format!("Level {id}"),
            SoundEnvironment {
                song: Some(song),
                event_delay: 30.0,
                ..SoundEnvironment::default()
            },
        )
    }

    fn controller(
        backend: &HeadlessBackend,
        levels: &mut LevelDirectory,
    ) -> LevelAudioController<HeadlessBackend> {
        let config = AudioConfig::default();
        let service = SoundPlaybackService::new(backend.clone(), &config);
        LevelAudioController::new(service, levels, &config)
    }

    #[test]
    fn test_new_registers_listener_and_detach_removes_it() {
        let mut levels = LevelDirectory::new();
        levels.insert(level(1, 0.5)).expect("new level");

        let mut controller = controller(&HeadlessBackend::new(), &mut levels);
        assert_eq!(levels.listener_count(), 1);
        assert!(controller.is_attached());

        controller.detach(&mut levels);
        assert_eq!(levels.listener_count(), 0);
        assert!(!controller.is_attached());
    }

    #[test]
    fn test_level_without_song_still_gets_ambience() {
        let mut levels = LevelDirectory::new();
        let ambience = SoundCatalogEntry::new("wind")
            .with_clip(ClipRef::new("wind.ogg"))
            .with_looping(true)
            .with_volume(0.3);
        levels
            .insert(LevelInfo::new(
                LevelId::new(5),
                "Ridge",
                SoundEnvironment {
                    day_ambience: Some(ambience),
                    event_delay: 10.0,
                    ..SoundEnvironment::default()
                },
            ))
            .expect("new level");

        let mut controller = controller(&HeadlessBackend::new(), &mut levels);

        levels.change_level(Some(LevelId::new(5))).expect("known level");
        controller.update(0.0, &levels);

        assert_eq!(controller.cached_songs(), 0);
        let ambient = controller.ambient_handle().expect("ambience created");
        assert!((ambient.volume() - 0.3).abs() < f32::EPSILON);
        assert!(controller.event_task().is_some_and(TaskHandle::is_running));
    }

    #[test]
    fn test_rapid_return_cancels_pending_fade_out() {
        let mut levels = LevelDirectory::new();
        levels.insert(level(1, 0.8)).expect("new level");
        levels.insert(level(2, 0.6)).expect("new level");

        let mut controller = controller(&HeadlessBackend::new(), &mut levels);

        levels.change_level(Some(LevelId::new(1))).expect("known level");
        controller.update(0.0, &levels);
        levels.change_level(Some(LevelId::new(2))).expect("known level");
        controller.update(0.0, &levels);
        controller.update(2.0, &levels);

        levels.change_level(Some(LevelId::new(1))).expect("known level");
        controller.update(0.0, &levels);

        // One fade per song: level 1 fading in, level 2 fading out.
        assert_eq!(controller.active_fades(), 2);

        for _ in 0..20 {
            controller.update(1.0, &levels);
        }
        let song = controller.music_handle(LevelId::new(1)).expect("cached");
        assert!((song.volume() - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_new_event_loop_waits_a_full_delay() {
        let mut levels = LevelDirectory::new();
        let owl = SoundCatalogEntry::new("owl").with_clip(ClipRef::new("owl.ogg").with_length(1.0));
        levels
            .insert(LevelInfo::new(
                LevelId::new(3),
                "Grove",
                SoundEnvironment {
                    day_event: Some(owl),
                    event_delay: 5.0,
                    ..SoundEnvironment::default()
                },
            ))
            .expect("new level");

        let backend = HeadlessBackend::new();
        let mut controller = controller(&backend, &mut levels);

        levels.change_level(Some(LevelId::new(3))).expect("known level");
        controller.update(5.0, &levels);
        assert!(backend.find("Sound owl").is_none());

        controller.update(5.0, &levels);
        assert!(backend.find("Sound owl").is_some());
    }

    #[test]
    fn test_song_without_clip_is_never_cached() {
        let mut levels = LevelDirectory::new();
        levels.insert(level(1, 0.5)).expect("new level");
        levels
            .insert(LevelInfo::new(
                LevelId::new(2),
                "Hush",
                SoundEnvironment {
                    song: Some(SoundCatalogEntry::new("hush").with_looping(true)),
                    event_delay: 30.0,
                    ..SoundEnvironment::default()
                },
            ))
            .expect("new level");

        let backend = HeadlessBackend::new();
        let mut controller = controller(&backend, &mut levels);

        for _ in 0..5 {
            for id in [1, 2] {
                levels.change_level(Some(LevelId::new(id))).expect("known level");
                controller.update(0.0, &levels);
            }
        }

        assert_eq!(controller.cached_songs(), 1);
        assert!(controller.music_handle(LevelId::new(2)).is_none());
        assert!(backend.find("Sound hush").is_none());
        // One song and the shared ambience handle.
        assert_eq!(backend.created_count(), 2);
    }

    #[test]
    fn test_dropped_controller_is_unregistered_on_next_change() {
        let mut levels = LevelDirectory::new();
        levels.insert(level(1, 0.5)).expect("new level");

        drop(controller(&HeadlessBackend::new(), &mut levels));
        assert_eq!(levels.listener_count(), 1);

        levels.change_level(Some(LevelId::new(1))).expect("known level");
        assert_eq!(levels.listener_count(), 0);
    }
}
