use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{RegistryError, Result};
use crate::normalize::{normalize, CanonicalKey};

/// The catalogs artist records are harvested from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Spotify,
    Songkick,
    Soundcloud,
    Discogs,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Spotify => "spotify",
            Source::Songkick => "songkick",
            Source::Soundcloud => "soundcloud",
            Source::Discogs => "discogs",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One artist as seen by one source, plus whatever other sources it has
/// been linked to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub source: Source,
    pub source_id: String,
    pub raw_name: String,
    pub canonical_key: CanonicalKey,
    pub popularity: u64,
    #[serde(default)]
    pub cross_refs: BTreeMap<Source, String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ArtistRecord {
    /// Builds a record, normalizing its name. This is the only place a
    /// record's key is computed.
    pub fn new(source: Source, source_id: impl Into<String>, raw_name: impl Into<String>, popularity: u64) -> Self {
        let raw_name = raw_name.into();
        let canonical_key = normalize(&raw_name);
        Self {
            source,
            source_id: source_id.into(),
            raw_name,
            canonical_key,
            popularity,
            cross_refs: BTreeMap::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// Returns a copy carrying a cross reference to `source`.
    pub fn linked_to(&self, source: Source, foreign_id: impl Into<String>) -> Self {
        let mut linked = self.clone();
        linked.cross_refs.insert(source, foreign_id.into());
        linked
    }
}

/// Exactly one record per canonical key, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ArtistRecord>", into = "Vec<ArtistRecord>")]
pub struct Registry {
    records: Vec<ArtistRecord>,
    index: HashMap<CanonicalKey, usize>,
}

impl Registry {
    /// Builds a registry from records that are already unique by key.
    ///
    /// Use [`crate::dedupe::deduplicate`] first; a repeated key here means
    /// a stage was skipped.
    pub fn from_unique(records: Vec<ArtistRecord>) -> Result<Self> {
        let mut index = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            if index.insert(record.canonical_key.clone(), position).is_some() {
                return Err(RegistryError::Precondition(format!(
                    "duplicate canonical key '{}' in registry input",
                    record.canonical_key
                )));
            }
        }
        Ok(Self { records, index })
    }

    pub fn get(&self, key: &CanonicalKey) -> Option<&ArtistRecord> {
        self.index.get(key).map(|&position| &self.records[position])
    }

    pub fn contains(&self, key: &CanonicalKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArtistRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<ArtistRecord> {
        self.records
    }
}

impl From<Vec<ArtistRecord>> for Registry {
    /// Used when reading a dump back; the first record wins on a repeated key.
    fn from(records: Vec<ArtistRecord>) -> Self {
        let mut unique = Vec::with_capacity(records.len());
        let mut index = HashMap::with_capacity(records.len());
        for record in records {
            if !index.contains_key(&record.canonical_key) {
                index.insert(record.canonical_key.clone(), unique.len());
                unique.push(record);
            }
        }
        Self { records: unique, index }
    }
}

impl From<Registry> for Vec<ArtistRecord> {
    fn from(registry: Registry) -> Self {
        registry.records
    }
}

/// Outcome counts reported by the batch stages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub processed: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub failed: usize,
}

impl BatchProgress {
    /// True when `processed` has just crossed a multiple of `every`.
    pub fn should_report(&self, every: usize) -> bool {
        every > 0 && self.processed > 0 && self.processed % every == 0
    }
}

impl fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} matched={} unmatched={} failed={}",
            self.processed, self.matched, self.unmatched, self.failed
        )
    }
}

/// A collaborator call that failed for one artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedLookup {
    pub artist: String,
    pub reason: String,
}
