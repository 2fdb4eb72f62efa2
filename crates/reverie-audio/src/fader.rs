//! Time-based volume ramps.
//!
//! A fade drives a handle's volume linearly from a start to an end value
//! over a duration, advancing once per [`Fader::tick`]. When the duration has
//! elapsed the handle is left exactly at the end volume.

use tracing::{debug, trace};

use crate::backend::{HandleId, SharedHandle};
use crate::task::TaskHandle;

/// Volume at `elapsed` seconds into a linear fade.
#[must_use]
pub fn fade_volume(from: f32, to: f32, elapsed: f32, duration: f32) -> f32 {
    if duration <= 0.0 || elapsed >= duration {
        return to;
    }
    let t = (elapsed / duration).max(0.0);
    from + (to - from) * t
}

#[derive(Debug)]
struct FadeTask {
    handle: SharedHandle,
    from: f32,
    to: f32,
    duration: f32,
    elapsed: f32,
    task: TaskHandle,
}

impl FadeTask {
    /// Advance by `delta`. Returns `false` once the fade is over.
    fn step(&mut self, delta: f32) -> bool {
        if self.task.is_cancelled() {
            trace!("Fade {} on {} cancelled", self.task.id(), self.handle.id());
            return false;
        }
        if !self.handle.is_valid() {
            trace!("Fade {} lost {}", self.task.id(), self.handle.id());
            return false;
        }

        self.elapsed += delta;
        if self.elapsed >= self.duration {
            self.handle.set_volume(self.to);
            return false;
        }

        let volume = fade_volume(self.from, self.to, self.elapsed, self.duration);
        self.handle.set_volume(volume);
        true
    }
}

/// Driver for all running fades.
#[derive(Debug, Default)]
pub struct Fader {
    fades: Vec<FadeTask>,
}

impl Fader {
    /// Create a fader with no running fades.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start fading `handle` from `from` to `to` over `duration` seconds.
    ///
    /// The handle is set to `from` right away. A non-positive duration sets
    /// `to` instead and returns an already finished task.
    pub fn fade(&mut self, handle: &SharedHandle, from: f32, to: f32, duration: f32) -> TaskHandle {
        if duration <= 0.0 {
            handle.set_volume(to);
            return TaskHandle::completed();
        }

        handle.set_volume(from);
        let task = TaskHandle::new();
        debug!(
            "Fade {} on {}: {:.2} -> {:.2} over {:.2}s",
            task.id(),
            handle.id(),
            from,
            to,
            duration
        );
        self.fades.push(FadeTask {
            handle: SharedHandle::clone(handle),
            from,
            to,
            duration,
            elapsed: 0.0,
            task: task.clone(),
        });
        task
    }

    /// Advance every running fade by `delta` seconds.
    pub fn tick(&mut self, delta: f32) {
        self.fades.retain_mut(|fade| {
            let running = fade.step(delta);
            if !running {
                fade.task.finish();
            }
            running
        });
    }

    /// Number of fades still running.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.fades
            .iter()
            .filter(|fade| !fade.task.is_cancelled())
            .count()
    }

    /// Whether a running fade targets the given handle.
    #[must_use]
    pub fn is_fading(&self, handle: HandleId) -> bool {
        self.fades
            .iter()
            .any(|fade| fade.handle.id() == handle && !fade.task.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AudioBackend;
    use crate::headless::HeadlessBackend;
    use proptest::prelude::*;

    fn handle() -> (HeadlessBackend, SharedHandle) {
        let backend = HeadlessBackend::new();
        let handle = backend.create_handle("music");
        (backend, handle)
    }

    #[test]
    fn test_zero_duration_is_immediate() {
        let (_backend, handle) = handle();
        let mut fader = Fader::new();

        let task = fader.fade(&handle, 0.0, 0.8, 0.0);
        assert!((handle.volume() - 0.8).abs() < f32::EPSILON);
        assert!(task.is_finished());
        assert_eq!(fader.active_count(), 0);
    }

    #[test]
    fn test_linear_ramp() {
        let (_backend, handle) = handle();
        let mut fader = Fader::new();

        let task = fader.fade(&handle, 0.0, 1.0, 2.0);
        assert!(handle.volume().abs() < f32::EPSILON);

        fader.tick(0.5);
        assert!((handle.volume() - 0.25).abs() < 1e-5);
        fader.tick(0.5);
        assert!((handle.volume() - 0.5).abs() < 1e-5);
        assert!(task.is_running());

        fader.tick(1.0);
        assert!((handle.volume() - 1.0).abs() < f32::EPSILON);
        assert!(task.is_finished());
        assert_eq!(fader.active_count(), 0);
    }

    #[test]
    fn test_overshooting_tick_clamps_to_target() {
        let (_backend, handle) = handle();
        let mut fader = Fader::new();

        fader.fade(&handle, 0.6, 0.0, 1.0);
        fader.tick(5.0);
        assert!(handle.volume().abs() < f32::EPSILON);
    }

    #[test]
    fn test_cancelled_fade_stops_moving() {
        let (_backend, handle) = handle();
        let mut fader = Fader::new();

        let task = fader.fade(&handle, 1.0, 0.0, 4.0);
        fader.tick(1.0);
        let volume = handle.volume();
        task.cancel();
        fader.tick(1.0);

        assert!((handle.volume() - volume).abs() < f32::EPSILON);
        assert!(task.is_finished());
        assert!(!fader.is_fading(handle.id()));
        task.cancel();
    }

    #[test]
    fn test_destroyed_handle_ends_fade_silently() {
        let (backend, handle) = handle();
        let mut fader = Fader::new();

        let task = fader.fade(&handle, 1.0, 0.0, 4.0);
        handle.destroy_after(0.0);
        backend.update(0.0);
        fader.tick(1.0);

        assert!(task.is_finished());
        assert_eq!(fader.active_count(), 0);
    }

    #[test]
    fn test_independent_fades() {
        let backend = HeadlessBackend::new();
        let a = backend.create_handle("a");
        let b = backend.create_handle("b");
        let mut fader = Fader::new();

        fader.fade(&a, 1.0, 0.0, 1.0);
        fader.fade(&b, 0.0, 1.0, 2.0);
        fader.tick(1.0);

        assert!(a.volume().abs() < f32::EPSILON);
        assert!((b.volume() - 0.5).abs() < 1e-5);
        assert!(fader.is_fading(b.id()));
        assert!(!fader.is_fading(a.id()));
    }

    proptest! {
        #[test]
        fn prop_fade_is_monotonic_and_ends_exactly(
            from in 0.0_f32..1.0,
            to in 0.0_f32..1.0,
            duration in 0.1_f32..20.0,
            steps in proptest::collection::vec(0.001_f32..0.5, 1..200),
        ) {
            let (_backend, handle) = handle();
            let mut fader = Fader::new();
            fader.fade(&handle, from, to, duration);
            prop_assert!((handle.volume() - from).abs() < 1e-6);

            let mut previous = handle.volume();
            for delta in steps {
                fader.tick(delta);
                let volume = handle.volume();
                if to >= from {
                    prop_assert!(volume >= previous - 1e-6);
                } else {
                    prop_assert!(volume <= previous + 1e-6);
                }
                previous = volume;
            }

            fader.tick(duration);
            prop_assert_eq!(handle.volume(), to);
        }
    }
}
