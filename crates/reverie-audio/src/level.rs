//! Level model with change notifications.
//!
//! [`LevelDirectory`] owns the known levels and the current one. Listeners
//! register with [`LevelDirectory::subscribe`] and are called synchronously,
//! in registration order, on every level change. A listener that returns
//! `false` is unregistered.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use reverie_common::{LevelId, ReverieError, ReverieResult, SubscriptionId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::sound::SoundEnvironment;

/// A level and its sound configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelInfo {
    /// Level id.
    pub id: LevelId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Music, ambience and environment events.
    #[serde(default)]
    pub sound_env: SoundEnvironment,
}

impl LevelInfo {
    /// Create a level.
    #[must_use]
    pub fn new(id: LevelId, name: impl Into<String>, sound_env: SoundEnvironment) -> Self {
        Self {
            id,
            name: name.into(),
            sound_env,
        }
    }
}

/// Notification sent when the current level changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChanged {
    /// Level that was current before the change.
    pub previous: Option<LevelId>,
    /// Level that is current now.
    pub current: Option<LevelId>,
}

/// Read-only view of the level model.
pub trait LevelSource {
    /// The level currently active, if any.
    fn current_level(&self) -> Option<LevelId>;

    /// Sound configuration of a level.
    fn environment(&self, id: LevelId) -> Option<&SoundEnvironment>;
}

type Listener = Box<dyn FnMut(&LevelChanged) -> bool + Send>;

/// Registry of levels and the currently active one.
#[derive(Default)]
pub struct LevelDirectory {
    levels: HashMap<LevelId, LevelInfo>,
    current: Option<LevelId>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl fmt::Debug for LevelDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelDirectory")
            .field("levels", &self.levels.len())
            .field("current", &self.current)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl LevelDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse levels from a RON list of [`LevelInfo`].
    pub fn from_ron_str(source: &str) -> ReverieResult<Self> {
        Self::parse(source, "<inline>")
    }

    /// Load levels from a RON file.
    pub fn load(path: impl AsRef<Path>) -> ReverieResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        let directory = Self::parse(&source, &path.display().to_string())?;
        info!("Loaded {} levels from {}", directory.len(), path.display());
        Ok(directory)
    }

    fn parse(source: &str, source_name: &str) -> ReverieResult<Self> {
        let levels: Vec<LevelInfo> =
            ron::from_str(source).map_err(|e| ReverieError::parse(source_name, e))?;

        let mut directory = Self::new();
        for level in levels {
            directory.insert(level)?;
        }
        Ok(directory)
    }

    /// Register a level. Fails if the id is already taken.
    pub fn insert(&mut self, level: LevelInfo) -> ReverieResult<()> {
        if self.levels.contains_key(&level.id) {
            return Err(ReverieError::DuplicateLevel(level.id));
        }
        self.levels.insert(level.id, level);
        Ok(())
    }

    /// Look up a level.
    #[must_use]
    pub fn get(&self, id: LevelId) -> Option<&LevelInfo> {
        self.levels.get(&id)
    }

    /// Number of registered levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether no levels are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// The current level.
    #[must_use]
    pub fn current(&self) -> Option<&LevelInfo> {
        self.current.and_then(|id| self.levels.get(&id))
    }

    /// Register a level-change listener.
    ///
    /// The listener stays registered for as long as it returns `true`.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&LevelChanged) -> bool + Send + 'static,
    {
        self.next_subscription += 1;
        let id = SubscriptionId::new(self.next_subscription);
        self.listeners.push((id, Box::new(listener)));
        debug!("Level listener {} registered", id.raw());
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = self.listeners.len() != before;
        if removed {
            debug!("Level listener {} removed", id.raw());
        }
        removed
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Make `next` the current level and notify listeners.
    ///
    /// Returns `Ok(None)` without notifying when `next` is already current.
    pub fn change_level(&mut self, next: Option<LevelId>) -> ReverieResult<Option<LevelChanged>> {
        if let Some(id) = next {
            if !self.levels.contains_key(&id) {
                return Err(ReverieError::UnknownLevel(id));
            }
        }
        if next == self.current {
            return Ok(None);
        }

        let change = LevelChanged {
            previous: self.current,
            current: next,
        };
        self.current = next;

        match self.current() {
            Some(level) => info!("Entering {} '{}'", level.id, level.name),
            None => info!("Leaving all levels"),
        }

        self.listeners.retain_mut(|(id, listener)| {
            let keep = listener(&change);
            if !keep {
                debug!("Level listener {} dropped", id.raw());
            }
            keep
        });
        Ok(Some(change))
    }
}

impl LevelSource for LevelDirectory {
    fn current_level(&self) -> Option<LevelId> {
        self.current
    }

    fn environment(&self, id: LevelId) -> Option<&SoundEnvironment> {
        self.levels.get(&id).map(|level| &level.sound_env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    const LEVELS: &str = r#"[
        (id: 1, name: "Meadow", sound_env: (
            song: Some((id: "meadow_theme",
                clip: Some((path: "music/meadow.ogg")),
                loop: true,
                volume: 0.7,
            )),
            event_delay: 12.0,
        )),
        (id: 2, name: "Cave"),
    ]"#;

    fn directory() -> LevelDirectory {
        LevelDirectory::from_ron_str(LEVELS).expect("valid levels")
    }

    #[test]
    fn test_parse_levels() {
        let levels = directory();
        assert_eq!(levels.len(), 2);

        let meadow = levels.get(LevelId::new(1)).expect("meadow");
        assert_eq!(meadow.name, "Meadow");
        assert!((meadow.sound_env.song_volume() - 0.7).abs() < f32::EPSILON);
        assert!((meadow.sound_env.event_delay - 12.0).abs() < f32::EPSILON);

        let cave = levels.environment(LevelId::new(2)).expect("cave");
        assert!(cave.song.is_none());
    }

    #[test]
    fn test_duplicate_level_is_rejected() {
        let result = LevelDirectory::from_ron_str("[(id: 4), (id: 4)]");
        assert!(matches!(result, Err(ReverieError::DuplicateLevel(id)) if id == LevelId::new(4)));
    }

    #[test]
    fn test_listeners_receive_changes_in_order() {
        let mut levels = directory();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        levels.subscribe(move |change| {
            sink.lock().push(*change);
            true
        });

        levels.change_level(Some(LevelId::new(1))).expect("known level");
        levels.change_level(Some(LevelId::new(2))).expect("known level");
        levels.change_level(None).expect("leaving is allowed");

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                LevelChanged {
                    previous: None,
                    current: Some(LevelId::new(1)),
                },
                LevelChanged {
                    previous: Some(LevelId::new(1)),
                    current: Some(LevelId::new(2)),
                },
                LevelChanged {
                    previous: Some(LevelId::new(2)),
                    current: None,
                },
            ]
        );
    }

    #[test]
    fn test_same_level_is_not_a_change() {
        let mut levels = directory();
        levels.change_level(Some(LevelId::new(1))).expect("known level");
        let change = levels.change_level(Some(LevelId::new(1))).expect("known level");
        assert!(change.is_none());
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        let mut levels = directory();
        let result = levels.change_level(Some(LevelId::new(99)));
        assert!(matches!(result, Err(ReverieError::UnknownLevel(_))));
        assert_eq!(levels.current_level(), None);
    }

    #[test]
    fn test_unsubscribe() {
        let mut levels = directory();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let id = levels.subscribe(move |_| {
            *counter.lock() += 1;
            true
        });

        levels.change_level(Some(LevelId::new(1))).expect("known level");
        assert!(levels.unsubscribe(id));
        assert!(!levels.unsubscribe(id));
        levels.change_level(Some(LevelId::new(2))).expect("known level");

        assert_eq!(*calls.lock(), 1);
        assert_eq!(levels.listener_count(), 0);
    }

    #[test]
    fn test_listener_returning_false_is_dropped() {
        let mut levels = directory();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        levels.subscribe(move |_| {
            *counter.lock() += 1;
            false
        });
        levels.subscribe(|_| true);

        levels.change_level(Some(LevelId::new(1))).expect("known level");
        levels.change_level(Some(LevelId::new(2))).expect("known level");

        assert_eq!(*calls.lock(), 1);
        assert_eq!(levels.listener_count(), 1);
    }
}
