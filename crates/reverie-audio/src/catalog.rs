//! Sound catalog: lookup of sound cues by id.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use reverie_common::{ReverieError, ReverieResult};
use tracing::{debug, info};

use crate::sound::SoundCatalogEntry;

/// Registry of sound cues, keyed by their id.
#[derive(Debug, Clone, Default)]
pub struct SoundCatalog {
    entries: HashMap<String, SoundCatalogEntry>,
}

impl SoundCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from a RON list of entries.
    pub fn from_ron_str(source: &str) -> ReverieResult<Self> {
        Self::parse(source, "<inline>")
    }

    /// Load a catalog from a RON file.
    pub fn load(path: impl AsRef<Path>) -> ReverieResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        let catalog = Self::parse(&source, &path.display().to_string())?;
        info!("Loaded {} sounds from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    fn parse(source: &str, source_name: &str) -> ReverieResult<Self> {
        let entries: Vec<SoundCatalogEntry> =
            ron::from_str(source).map_err(|e| ReverieError::parse(source_name, e))?;

        let mut catalog = Self::new();
        for entry in entries {
            catalog.insert(entry)?;
        }
        Ok(catalog)
    }

    /// Register an entry. Fails if the id is already taken.
    pub fn insert(&mut self, entry: SoundCatalogEntry) -> ReverieResult<()> {
        if self.entries.contains_key(&entry.id) {
            return Err(ReverieError::DuplicateSound(entry.id));
        }
        self.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    /// Find an entry by id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&SoundCatalogEntry> {
        let entry = self.entries.get(id);
        if entry.is_none() {
            debug!("Sound '{}' not in catalog", id);
        }
        entry
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over registered ids.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
