//! Precomputed key sets for notability tagging.
//!
//! Each set is built once from a flat list of names (award winners, sales
//! certifications, press lists, touring artists), normalized at build time,
//! and only read afterwards. Queries must use keys from the same
//! normalizer; a raw name passed as a key will usually miss.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{RegistryError, Result};
use crate::normalize::{normalize, CanonicalKey};
use crate::types::ArtistRecord;

/// A named set of canonical keys
#[derive(Debug, Clone, Default)]
pub struct MembershipSet {
    name: String,
    keys: HashSet<CanonicalKey>,
}

impl MembershipSet {
    /// Normalizes every name once and keeps the keys.
    pub fn build<I, S>(name: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = names.into_iter().map(|n| normalize(n.as_ref())).collect();
        Self { name: name.into(), keys }
    }

    /// Reads one name per line. Blank lines and lines starting with `#`
    /// are skipped.
    pub fn from_file(name: impl Into<String>, path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RegistryError::Config(format!("Failed to read name list '{}': {}", path.display(), e))
        })?;
        let names = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));
        let set = Self::build(name, names);
        info!("Loaded membership set '{}' with {} keys", set.name, set.len());
        Ok(set)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, key: &CanonicalKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// One award an artist received
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub award: String,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Canonical key -> awards
#[derive(Debug, Clone, Default)]
pub struct AwardIndex {
    awards: HashMap<CanonicalKey, Vec<Award>>,
}

impl AwardIndex {
    /// Names that collide after normalization have their awards concatenated
    /// in iteration order.
    pub fn build<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<Award>)>,
        S: AsRef<str>,
    {
        let mut awards: HashMap<CanonicalKey, Vec<Award>> = HashMap::new();
        for (name, list) in entries {
            awards.entry(normalize(name.as_ref())).or_default().extend(list);
        }
        Self { awards }
    }

    /// Reads `{ "Artist Name": [{ "award": ..., "year": ..., "category": ... }] }`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RegistryError::Config(format!("Failed to read awards file '{}': {}", path.display(), e))
        })?;
        let raw: BTreeMap<String, Vec<Award>> = serde_json::from_str(&content)?;
        let index = Self::build(raw);
        info!("Loaded awards for {} artists", index.len());
        Ok(index)
    }

    pub fn lookup(&self, key: &CanonicalKey) -> Option<&[Award]> {
        self.awards.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.awards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.awards.is_empty()
    }
}

/// Every set used to annotate records in one run
#[derive(Debug, Clone, Default)]
pub struct NotabilityIndex {
    sets: Vec<MembershipSet>,
    awards: Option<AwardIndex>,
}

impl NotabilityIndex {
    pub fn new(sets: Vec<MembershipSet>, awards: Option<AwardIndex>) -> Self {
        Self { sets, awards }
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty() && self.awards.is_none()
    }

    /// Returns a copy of `record` with a `notable_<set>` flag per set and
    /// an `awards` list when the award index has the artist.
    pub fn annotate(&self, record: &ArtistRecord) -> ArtistRecord {
        let mut annotated = record.clone();
        for set in &self.sets {
            let flag = set.contains(&record.canonical_key);
            annotated
                .attributes
                .insert(format!("notable_{}", set.name()), Value::Bool(flag));
        }
        if let Some(awards) = self.awards.as_ref().and_then(|index| index.lookup(&record.canonical_key)) {
            annotated.attributes.insert("awards".to_string(), json!(awards));
            debug!("{} has {} awards", record.raw_name, awards.len());
        }
        annotated
    }
}
