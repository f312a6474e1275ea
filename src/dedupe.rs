//! One record per canonical key within a single source.
//!
//! Records with no popularity are dropped as inactive. When several records
//! share a key, the most popular one stays and the rest are discarded, even
//! if they are different people with the same name. Ties go to the record
//! seen first.

use std::collections::HashMap;
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::normalize::CanonicalKey;
use crate::types::ArtistRecord;

/// What deduplication removed, for logging and metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub input: usize,
    pub kept: usize,
    pub dropped_inactive: usize,
    pub dropped_ambiguous: usize,
    /// Keys that had more than one active record, in first-seen order
    pub ambiguous_keys: Vec<CanonicalKey>,
}

/// Keeps one record per canonical key. See the module docs for the policy.
///
/// The input is not modified; surviving records keep their relative order.
pub fn deduplicate(records: &[ArtistRecord]) -> Result<Vec<ArtistRecord>> {
    deduplicate_with_report(records).map(|(kept, _)| kept)
}

/// Same as [`deduplicate`], also returning what was dropped.
pub fn deduplicate_with_report(records: &[ArtistRecord]) -> Result<(Vec<ArtistRecord>, DedupReport)> {
    if records.is_empty() {
        return Err(RegistryError::Precondition(
            "deduplicate called with no records; run a harvest first".to_string(),
        ));
    }

    let mut report = DedupReport { input: records.len(), ..DedupReport::default() };

    // key -> (index of current winner, number of active records with this key)
    let mut winners: HashMap<&CanonicalKey, (usize, usize)> = HashMap::new();

    for (position, record) in records.iter().enumerate() {
        if record.popularity == 0 {
            report.dropped_inactive += 1;
            continue;
        }
        match winners.get_mut(&record.canonical_key) {
            None => {
                winners.insert(&record.canonical_key, (position, 1));
            }
            Some((winner, count)) => {
                *count += 1;
                if *count == 2 {
                    report.ambiguous_keys.push(record.canonical_key.clone());
                }
                // Strictly greater only; an equal score leaves the earlier record
                if record.popularity > records[*winner].popularity {
                    *winner = position;
                }
            }
        }
    }

    let kept: Vec<ArtistRecord> = records
        .iter()
        .enumerate()
        .filter(|(position, record)| {
            winners
                .get(&record.canonical_key)
                .is_some_and(|(winner, _)| winner == position)
        })
        .map(|(_, record)| record.clone())
        .collect();

    report.kept = kept.len();
    report.dropped_ambiguous = report.input - report.dropped_inactive - report.kept;

    debug!(
        "Deduplicated {} records: kept {}, inactive {}, ambiguous {} across {} keys",
        report.input,
        report.kept,
        report.dropped_inactive,
        report.dropped_ambiguous,
        report.ambiguous_keys.len()
    );

    Ok((kept, report))
}
