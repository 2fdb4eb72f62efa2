//! Sound descriptors and per-level sound environments.
//!
//! A [`SoundCatalogEntry`] describes one logical sound cue: the clip to play,
//! whether it loops, its base volume, and optionally a list of alternate
//! variations. Playing a cue with variations plays exactly one of them,
//! picked uniformly at random.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Volume value meaning "use the sound's own volume".
pub const UNSET_VOLUME: f32 = -1.0;

/// Default limit for resolving variations that themselves have variations.
pub const DEFAULT_MAX_VARIATION_DEPTH: usize = 4;

/// Reference to decoded or decodable audio data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRef {
    /// Asset path of the clip.
    pub path: String,
    /// Clip length in seconds, if known.
    #[serde(default)]
    pub length: Option<f32>,
}

impl ClipRef {
    /// Create a clip reference with unknown length.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            length: None,
        }
    }

    /// Set the clip length in seconds.
    #[must_use]
    pub fn with_length(mut self, seconds: f32) -> Self {
        self.length = Some(seconds);
        self
    }
}

/// A playable sound cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundCatalogEntry {
    /// Catalog id, also used to name created handles.
    pub id: String,
    /// Clip to play.
    pub clip: Option<ClipRef>,
    /// Whether playback loops.
    #[serde(rename = "loop")]
    pub looping: bool,
    /// Base volume (0.0-1.0).
    pub volume: f32,
    /// Alternate versions of this cue; one is picked per playback.
    pub variations: Option<Vec<SoundCatalogEntry>>,
}

impl Default for SoundCatalogEntry {
    fn default() -> Self {
        Self {
            id: String::new(),
            clip: None,
            looping: false,
            volume: 1.0,
            variations: None,
        }
    }
}

impl SoundCatalogEntry {
    /// Create an entry with no clip and full volume.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Set the clip.
    #[must_use]
    pub fn with_clip(mut self, clip: ClipRef) -> Self {
        self.clip = Some(clip);
        self
    }

    /// Set whether the sound loops.
    #[must_use]
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Set the base volume.
    #[must_use]
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// Set the variations.
    #[must_use]
    pub fn with_variations(mut self, variations: Vec<SoundCatalogEntry>) -> Self {
        self.variations = Some(variations);
        self
    }

    /// Whether playback picks from a variation list.
    #[must_use]
    pub fn has_variations(&self) -> bool {
        self.variations.as_ref().is_some_and(|v| !v.is_empty())
    }

    /// Clip length in seconds, if a clip with known length is set.
    #[must_use]
    pub fn clip_length(&self) -> Option<f32> {
        self.clip.as_ref().and_then(|clip| clip.length)
    }

    /// Resolve the entry that will actually be played.
    ///
    /// Entries without variations resolve to themselves. Otherwise one
    /// variation is picked uniformly and resolved in turn, up to
    /// `max_depth` levels. Returns `None` when the resolved entry has no
    /// clip or the depth limit is exceeded.
    pub fn resolve<'a>(&'a self, rng: &mut fastrand::Rng, max_depth: usize) -> Option<&'a Self> {
        let mut sound = self;
        let mut depth = 0;

        while let Some(variations) = sound.variations.as_deref().filter(|v| !v.is_empty()) {
            if depth >= max_depth {
                debug!("Sound '{}' nests variations deeper than {}", self.id, max_depth);
                return None;
            }
            sound = &variations[rng.usize(..variations.len())];
            depth += 1;
        }

        if sound.clip.is_none() {
            debug!("Sound '{}' resolved to '{}', which has no clip", self.id, sound.id);
            return None;
        }
        Some(sound)
    }
}

/// Sound configuration of one level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundEnvironment {
    /// Background music.
    pub song: Option<SoundCatalogEntry>,
    /// Looping daytime ambience bed.
    pub day_ambience: Option<SoundCatalogEntry>,
    /// Periodic environment event (bird call, distant thunder, ...).
    pub day_event: Option<SoundCatalogEntry>,
    /// Seconds between environment events.
    pub event_delay: f32,
}

impl SoundEnvironment {
    /// Configured volume of the song, or 0 when the level has no song.
    #[must_use]
    pub fn song_volume(&self) -> f32 {
        self.song.as_ref().map_or(0.0, |song| song.volume)
    }
}
