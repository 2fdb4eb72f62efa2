//! Tour runner.
//!
//! Builds the audio stack on a backend and steps it on a fixed tick while
//! replaying the configured level changes and cues.

use std::time::Duration;

use anyhow::{Context, Result};
use reverie_audio::{
    AudioBackend, HeadlessBackend, LevelAudioController, LevelDirectory, SoundCatalog,
    SoundPlaybackService,
};
use reverie_common::LevelId;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;

/// What happened during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Ticks simulated
    pub ticks: u64,
    /// Level changes applied
    pub level_changes: u32,
    /// Cues that produced a sound
    pub cues_played: u32,
    /// Levels with a cached song at the end
    pub songs_cached: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Enter(Option<LevelId>),
    Cue(String),
}

/// Tour and cue steps merged in time order.
#[derive(Debug)]
struct Script {
    steps: Vec<(f32, Action)>,
    cursor: usize,
}

impl Script {
    fn new(config: &EngineConfig) -> Self {
        let mut steps: Vec<(f32, Action)> = config
            .tour
            .iter()
            .map(|step| (step.at, Action::Enter(step.level)))
            .chain(
                config
                    .cues
                    .iter()
                    .map(|cue| (cue.at, Action::Cue(cue.sound.clone()))),
            )
            .collect();
        steps.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { steps, cursor: 0 }
    }

    /// Actions scheduled before `until`.
    fn due(&mut self, until: f32) -> Vec<Action> {
        let start = self.cursor;
        while self.cursor < self.steps.len() && self.steps[self.cursor].0 < until {
            self.cursor += 1;
        }
        self.steps[start..self.cursor]
            .iter()
            .map(|(_, action)| action.clone())
            .collect()
    }
}

/// Load data and run the tour on the configured backend.
pub fn run(config: &EngineConfig) -> Result<RunSummary> {
    let catalog = SoundCatalog::load(config.sounds_path())
        .with_context(|| format!("loading {}", config.sounds_path().display()))?;
    let levels = LevelDirectory::load(config.levels_path())
        .with_context(|| format!("loading {}", config.levels_path().display()))?;

    if config.device {
        #[cfg(feature = "device")]
        {
            let backend = reverie_audio::RodioBackend::new(&config.asset_root)?;
            return Ok(drive(backend, config, &catalog, levels));
        }
        #[cfg(not(feature = "device"))]
        warn!("Built without the `device` feature, running headless");
    }

    Ok(drive(HeadlessBackend::new(), config, &catalog, levels))
}

/// Step the audio stack through the configured script.
pub fn drive<B: AudioBackend>(
    backend: B,
    config: &EngineConfig,
    catalog: &SoundCatalog,
    mut levels: LevelDirectory,
) -> RunSummary {
    let service = SoundPlaybackService::new(backend, &config.audio);
    let mut controller = LevelAudioController::new(service, &mut levels, &config.audio);
    let mut script = Script::new(config);

    let dt = config.fixed_dt();
    let ticks = (config.run_seconds * config.tick_rate as f32).ceil() as u64;
    let mut summary = RunSummary {
        ticks,
        ..RunSummary::default()
    };

    info!(
        "Running {} ticks at {} Hz ({} levels, {} sounds)",
        ticks,
        config.tick_rate,
        levels.len(),
        catalog.len()
    );

    for tick in 0..ticks {
        let clock = tick as f32 * dt;
        for action in script.due(clock + dt) {
            match action {
                Action::Enter(level) => match levels.change_level(level) {
                    Ok(Some(_)) => summary.level_changes += 1,
                    Ok(None) => debug!("Already in {level:?}"),
                    Err(e) => warn!("Tour step skipped: {e}"),
                },
                Action::Cue(id) => {
                    if controller.service_mut().play_by_id(catalog, &id).is_some() {
                        summary.cues_played += 1;
                    } else {
                        warn!("Cue '{id}' produced no sound");
                    }
                },
            }
        }

        controller.update(dt, &levels);
        controller.service().backend().update(dt);

        if config.realtime {
            std::thread::sleep(Duration::from_secs_f32(dt));
        }
    }

    summary.songs_cached = controller.cached_songs();
    controller.detach(&mut levels);
    summary
}
