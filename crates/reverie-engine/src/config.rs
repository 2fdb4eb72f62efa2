//! Engine configuration.
//!
//! Tick rate, data file locations, the `[audio]` tunables and the scripted
//! tour. Loaded from `reverie.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use reverie_audio::AudioConfig;
use reverie_common::LevelId;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Configuration file name.
const CONFIG_FILE: &str = "reverie.toml";

/// A scheduled level change. An omitted level leaves all levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourStep {
    /// Seconds since start
    pub at: f32,
    /// Level to enter
    #[serde(default)]
    pub level: Option<LevelId>,
}

/// A scheduled one-shot sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueStep {
    /// Seconds since start
    pub at: f32,
    /// Catalog id of the sound
    pub sound: String,
}

/// Engine configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Timing ===
    /// Updates per simulated second
    pub tick_rate: u32,
    /// Length of the run in seconds
    pub run_seconds: f32,
    /// Sleep between ticks so the run takes wall-clock time
    pub realtime: bool,
    /// Play through the output device (needs the `device` feature)
    pub device: bool,

    // === Data ===
    /// Directory clip paths and data files are relative to
    pub asset_root: PathBuf,
    /// Sound catalog file, relative to `asset_root`
    pub sounds_file: PathBuf,
    /// Level list file, relative to `asset_root`
    pub levels_file: PathBuf,

    // === Audio ===
    /// Playback and crossfade tunables
    pub audio: AudioConfig,

    // === Script ===
    /// Level changes over time
    pub tour: Vec<TourStep>,
    /// One-shot sounds over time
    pub cues: Vec<CueStep>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            run_seconds: 60.0,
            realtime: false,
            device: false,

            asset_root: PathBuf::from("assets"),
            sounds_file: PathBuf::from("sounds.ron"),
            levels_file: PathBuf::from("levels.ron"),

            audio: AudioConfig::default(),

            tour: Vec::new(),
            cues: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `reverie.toml` in the working directory.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("Failed to parse config file: {e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read config file: {e}");
                Self::default()
            },
        }
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.tick_rate = self.tick_rate.clamp(1, 1000);
        self.run_seconds = self.run_seconds.max(0.0);
        self.audio.crossfade_duration = self.audio.crossfade_duration.max(0.0);
        self.audio.destroy_padding = self.audio.destroy_padding.max(0.0);
        self.audio.max_variation_depth = self.audio.max_variation_depth.max(1);
    }

    /// Seconds per tick.
    #[must_use]
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Full path of the sound catalog.
    #[must_use]
    pub fn sounds_path(&self) -> PathBuf {
        self.asset_root.join(&self.sounds_file)
    }

    /// Full path of the level list.
    #[must_use]
    pub fn levels_path(&self) -> PathBuf {
        self.asset_root.join(&self.levels_file)
    }
}
