//! Output device backend using rodio.
//!
//! Each playback handle owns one rodio `Sink`. Clips are decoded once and
//! kept in memory, keyed by path. Delayed starts use `Source::delay`;
//! self-destruction timers are advanced by [`RodioBackend::update`].
//!
//! Spatial settings (position, parent, blend, min distance) are recorded on
//! the handle but not rendered.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use parking_lot::Mutex;
use reverie_common::{NodeId, ReverieError, ReverieResult};
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info, trace, warn};

use crate::backend::{AudioBackend, HandleGenerator, HandleId, PlaybackHandle, SharedHandle};
use crate::sound::ClipRef;

/// Decoded samples of one clip.
#[derive(Debug)]
struct DecodedClip {
    channels: u16,
    sample_rate: u32,
    samples: Arc<Vec<f32>>,
}

/// Decoded clips by path. Failed decodes are remembered as `None`.
#[derive(Debug)]
struct ClipCache {
    root: PathBuf,
    clips: Mutex<HashMap<String, Option<Arc<DecodedClip>>>>,
}

impl ClipCache {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            clips: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, clip: &ClipRef) -> Option<Arc<DecodedClip>> {
        let mut clips = self.clips.lock();
        if let Some(cached) = clips.get(&clip.path) {
            return cached.clone();
        }

        let decoded = Self::decode(&self.root.join(&clip.path)).map(Arc::new);
        clips.insert(clip.path.clone(), decoded.clone());
        decoded
    }

    fn decode(path: &Path) -> Option<DecodedClip> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Failed to open clip {}: {e}", path.display());
                return None;
            },
        };
        let decoder = match Decoder::new(BufReader::new(file)) {
            Ok(decoder) => decoder,
            Err(e) => {
                warn!("Failed to decode clip {}: {e}", path.display());
                return None;
            },
        };

        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        let samples: Vec<f32> = decoder.convert_samples::<f32>().collect();
        debug!("Decoded {} ({} samples)", path.display(), samples.len());

        Some(DecodedClip {
            channels,
            sample_rate,
            samples: Arc::new(samples),
        })
    }
}

struct RodioHandleState {
    sink: Sink,
    clip: Option<ClipRef>,
    looping: bool,
    volume: f32,
    min_distance: f32,
    spatial_blend: f32,
    position: Vec3,
    parent: Option<NodeId>,
    destroy_in: Option<f32>,
    destroyed: bool,
}

/// Playback handle backed by a rodio sink.
pub struct RodioHandle {
    id: HandleId,
    name: String,
    clips: Arc<ClipCache>,
    state: Mutex<RodioHandleState>,
}

impl std::fmt::Debug for RodioHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RodioHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("clip", &state.clip)
            .field("looping", &state.looping)
            .field("volume", &state.volume)
            .field("min_distance", &state.min_distance)
            .field("spatial_blend", &state.spatial_blend)
            .field("position", &state.position)
            .field("parent", &state.parent)
            .field("destroyed", &state.destroyed)
            .finish_non_exhaustive()
    }
}

impl RodioHandle {
    fn modify(&self, f: impl FnOnce(&mut RodioHandleState)) {
        let mut state = self.state.lock();
        if !state.destroyed {
            f(&mut state);
        }
    }

    fn start(&self, delay: f32) {
        let mut state = self.state.lock();
        if state.destroyed {
            return;
        }

        state.sink.clear();
        let Some(clip) = state.clip.as_ref().and_then(|clip| self.clips.get(clip)) else {
            trace!("{} has nothing to play", self.id);
            return;
        };

        let source = SamplesBuffer::new(clip.channels, clip.sample_rate, (*clip.samples).clone());
        let delay = Duration::from_secs_f32(delay.max(0.0));
        if state.looping {
            state.sink.append(source.repeat_infinite().delay(delay));
        } else {
            state.sink.append(source.delay(delay));
        }
        state.sink.play();
    }

    /// Advance the destruction timer. Returns `false` once destroyed.
    fn advance(&self, delta: f32) -> bool {
        let mut state = self.state.lock();
        if state.destroyed {
            return false;
        }
        if let Some(remaining) = state.destroy_in {
            let remaining = remaining - delta;
            if remaining <= 0.0 {
                state.sink.stop();
                state.destroy_in = None;
                state.destroyed = true;
                trace!("Destroyed {} '{}'", self.id, self.name);
                return false;
            }
            state.destroy_in = Some(remaining);
        }
        true
    }
}

impl PlaybackHandle for RodioHandle {
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
        self.modify(|s| {
            s.volume = volume;
            s.sink.set_volume(volume.max(0.0));
        });
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
        self.start(0.0);
    }

    fn play_after(&self, delay: f32) {
        self.start(delay);
    }

    fn destroy_after(&self, seconds: f32) {
        self.modify(|s| s.destroy_in = Some(seconds.max(0.0)));
    }

    fn is_valid(&self) -> bool {
        !self.state.lock().destroyed
    }
}

/// Backend playing through the default output device.
pub struct RodioBackend {
    /// The output stream (must be kept alive).
    _stream: OutputStream,
    /// Handle for creating sinks.
    stream_handle: OutputStreamHandle,
    clips: Arc<ClipCache>,
    generator: HandleGenerator,
    handles: Mutex<Vec<Arc<RodioHandle>>>,
}

impl std::fmt::Debug for RodioBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioBackend")
            .field("asset_root", &self.clips.root)
            .field("handles", &self.handles.lock().len())
            .finish_non_exhaustive()
    }
}

impl RodioBackend {
    /// Open the default output device. Clip paths resolve against `asset_root`.
    pub fn new(asset_root: impl Into<PathBuf>) -> ReverieResult<Self> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| ReverieError::Device(e.to_string()))?;

        info!("Audio device initialized");

        Ok(Self {
            _stream: stream,
            stream_handle,
            clips: Arc::new(ClipCache::new(asset_root.into())),
            generator: HandleGenerator::new(),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Number of live handles.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.handles.lock().len()
    }
}

impl AudioBackend for RodioBackend {
    fn create_handle(&self, name: &str) -> SharedHandle {
        let sink = Sink::try_new(&self.stream_handle).unwrap_or_else(|e| {
            warn!("Failed to create audio sink for '{name}': {e}");
            // A sink that is not connected to the device stays silent.
            Sink::new_idle().0
        });

        let handle = Arc::new(RodioHandle {
            id: self.generator.next(),
            name: name.to_string(),
            clips: Arc::clone(&self.clips),
            state: Mutex::new(RodioHandleState {
                sink,
                clip: None,
                looping: false,
                volume: 1.0,
                min_distance: 1.0,
                spatial_blend: 0.0,
                position: Vec3::ZERO,
                parent: None,
                destroy_in: None,
                destroyed: false,
            }),
        });
        self.handles.lock().push(Arc::clone(&handle));
        handle
    }

    fn update(&self, delta: f32) {
        self.handles.lock().retain(|handle| handle.advance(delta));
    }
}
