//! Periodic environment event sounds.
//!
//! While a level is active, an event loop waits the level's `event_delay`,
//! plays the `day_event` of whatever level is current at that moment, and
//! waits again. Loops run until cancelled through their [`TaskHandle`] or
//! until their owner token is cancelled.
//!
//! ```text
//! start ──▶ Running ──(cancel / owner gone / no current level)──▶ Stopped
//!              │  ▲
//!   delay done │  │ wait event_delay
//!              ▼  │
//!          play day_event
//! ```

use reverie_common::LevelId;
use tracing::{debug, trace};

use crate::backend::AudioBackend;
use crate::level::LevelSource;
use crate::playback::{PlayOptions, SoundPlaybackService};
use crate::sound::SoundEnvironment;
use crate::task::{CancellationToken, TaskHandle};

#[derive(Debug)]
struct EventLoop {
    level: LevelId,
    remaining: f32,
    task: TaskHandle,
    owner: CancellationToken,
}

impl EventLoop {
    fn is_live(&self) -> bool {
        !self.task.is_cancelled() && !self.owner.is_cancelled()
    }

    /// Advance by `delta`. Returns `false` once the loop has stopped.
    fn step<B: AudioBackend>(
        &mut self,
        delta: f32,
        levels: &dyn LevelSource,
        service: &mut SoundPlaybackService<B>,
    ) -> bool {
        if !self.is_live() {
            return false;
        }

        self.remaining -= delta;
        while self.remaining <= 0.0 {
            let Some(current) = levels.current_level() else {
                trace!("Event loop {} has no current level", self.task.id());
                return false;
            };
            let Some(env) = levels.environment(current) else {
                return false;
            };

            if current != self.level {
                debug!(
                    "Event loop {} for {} fired while {} is current",
                    self.task.id(),
                    self.level,
                    current
                );
            }

            service.play(env.day_event.as_ref(), PlayOptions::default());

            if env.event_delay <= 0.0 {
                // At most one event per tick when the level has no delay.
                self.remaining = 0.0;
                break;
            }
            self.remaining += env.event_delay;
        }
        true
    }
}

/// Runs environment event loops.
#[derive(Debug, Default)]
pub struct EnvironmentEventScheduler {
    loops: Vec<EventLoop>,
}

impl EnvironmentEventScheduler {
    /// Create a scheduler with no loops.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a loop for `level`, first firing after `env.event_delay`.
    ///
    /// The loop stops on its own once `owner` is cancelled.
    pub fn start(
        &mut self,
        level: LevelId,
        env: &SoundEnvironment,
        owner: CancellationToken,
    ) -> TaskHandle {
        let task = TaskHandle::new();
        debug!(
            "Event loop {} started for {} (every {:.1}s)",
            task.id(),
            level,
            env.event_delay
        );
        self.loops.push(EventLoop {
            level,
            remaining: env.event_delay,
            task: task.clone(),
            owner,
        });
        task
    }

    /// Stop a loop. Events already played are not affected.
    pub fn cancel(&mut self, task: &TaskHandle) {
        task.cancel();
        self.loops.retain(|event_loop| {
            let keep = event_loop.task.id() != task.id();
            if !keep {
                event_loop.task.finish();
                debug!("Event loop {} cancelled", task.id());
            }
            keep
        });
    }

    /// Advance every loop by `delta` seconds, playing due events.
    pub fn tick<B: AudioBackend>(
        &mut self,
        delta: f32,
        levels: &dyn LevelSource,
        service: &mut SoundPlaybackService<B>,
    ) {
        self.loops.retain_mut(|event_loop| {
            let running = event_loop.step(delta, levels, service);
            if !running {
                event_loop.task.finish();
                trace!("Event loop {} stopped", event_loop.task.id());
            }
            running
        });
    }

    /// Number of loops still running.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.loops.len()
    }
}
