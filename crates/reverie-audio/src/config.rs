//! Audio configuration.
//!
//! Tunables for the playback service and the level controller. Loaded from
//! TOML, usually as the `[audio]` table of the engine config.

use std::fs;
use std::path::Path;

use reverie_common::{ReverieError, ReverieResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::sound::DEFAULT_MAX_VARIATION_DEPTH;

/// Default crossfade between level songs, in seconds.
pub const DEFAULT_CROSSFADE_DURATION: f32 = 10.0;

/// Default extra lifetime of one-shot handles past their clip, in seconds.
pub const DEFAULT_DESTROY_PADDING: f32 = 0.1;

/// Default full-volume distance of created handles.
pub const DEFAULT_MIN_DISTANCE: f32 = 1.5;

/// Audio configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Seconds over which level songs cross-fade.
    pub crossfade_duration: f32,
    /// Seconds a one-shot handle outlives its clip.
    pub destroy_padding: f32,
    /// Full-volume distance applied to every created handle.
    pub min_distance: f32,
    /// Maximum nesting of variation lists.
    pub max_variation_depth: usize,
    /// Seed for variation picks (None = random)
    pub rng_seed: Option<u64>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            crossfade_duration: DEFAULT_CROSSFADE_DURATION,
            destroy_padding: DEFAULT_DESTROY_PADDING,
            min_distance: DEFAULT_MIN_DISTANCE,
            max_variation_depth: DEFAULT_MAX_VARIATION_DEPTH,
            rng_seed: None,
        }
    }
}

impl AudioConfig {
    /// Parse a configuration from TOML.
    pub fn from_toml_str(source: &str) -> ReverieResult<Self> {
        toml::from_str(source).map_err(|e| ReverieError::parse("<inline>", e))
    }

    /// Load configuration from a file.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Audio config not found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded audio config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("Failed to parse audio config: {e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read audio config: {e}");
                Self::default()
            },
        }
    }

    /// Set the crossfade duration.
    #[must_use]
    pub const fn with_crossfade(mut self, seconds: f32) -> Self {
        self.crossfade_duration = seconds;
        self
    }

    /// Fix the variation seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}
