//! Batch drivers that feed collaborator results through the registry core.
//!
//! Each stage takes its inputs by reference and returns new values; nothing
//! here mutates a registry in place. Per-item failures are collected and the
//! batch keeps going.

use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::apis::spotify::genre_query;
use crate::apis::{ArtistSearchApi, TourListingApi};
use crate::config::{Config, MembershipConfig, SpotifyConfig};
use crate::dedupe::{deduplicate_with_report, DedupReport};
use crate::error::Result;
use crate::linker::{LinkOutcome, Linker};
use crate::membership::{AwardIndex, MembershipSet, NotabilityIndex};
use crate::metrics;
use crate::storage::CheckpointStore;
use crate::types::{ArtistRecord, BatchProgress, FailedLookup, Registry};

/// A genre whose harvest stopped on an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedGenre {
    pub genre: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct HarvestReport {
    pub records: Vec<ArtistRecord>,
    pub failed: Vec<FailedGenre>,
    pub skipped_non_ascii: usize,
    pub skipped_seen: usize,
}

/// Pages through every genre and collects each artist once.
///
/// A failing page ends that genre only; what was collected before the
/// failure is kept.
#[instrument(skip_all, fields(genres = genres.len()))]
pub async fn harvest_by_genre<A: ArtistSearchApi>(
    api: &A,
    genres: &[String],
    config: &SpotifyConfig,
) -> HarvestReport {
    let started = Instant::now();
    let page_size = config.page_size.max(1);
    let mut report = HarvestReport::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (position, genre) in genres.iter().enumerate() {
        let query = genre_query(genre);
        let before = report.records.len();
        let mut offset = 0;

        while offset < config.max_results_per_genre {
            let page_started = Instant::now();
            let page = match api.search(&query, page_size, offset).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Harvest of genre '{}' stopped at offset {}: {}", genre, offset, e);
                    metrics::harvest::genre_error();
                    report.failed.push(FailedGenre { genre: genre.clone(), reason: e.to_string() });
                    break;
                }
            };
            metrics::harvest::page_duration(page_started.elapsed().as_secs_f64());

            let page_len = page.len();
            for record in page {
                if config.ascii_names_only && !record.raw_name.is_ascii() {
                    report.skipped_non_ascii += 1;
                    metrics::harvest::skipped("non_ascii");
                    continue;
                }
                if !seen.insert(record.source_id.clone()) {
                    report.skipped_seen += 1;
                    metrics::harvest::skipped("seen");
                    continue;
                }
                report.records.push(record);
            }

            if page_len < page_size as usize {
                break;
            }
            offset += page_size;
        }

        let added = report.records.len() - before;
        metrics::harvest::records(genre, added as u64);
        info!(
            "Genre {}/{} '{}': {} new artists, {} total, {:.1}s elapsed",
            position + 1,
            genres.len(),
            genre,
            added,
            report.records.len(),
            started.elapsed().as_secs_f64()
        );
    }

    report
}

/// Deduplicates harvested records into a registry.
pub fn build_registry(records: &[ArtistRecord]) -> Result<(Registry, DedupReport)> {
    let (kept, report) = deduplicate_with_report(records)?;
    metrics::dedupe::report(&report);
    info!(
        "Deduplicated {} records: kept {}, dropped {} inactive and {} ambiguous ({} shared keys)",
        report.input,
        report.kept,
        report.dropped_inactive,
        report.dropped_ambiguous,
        report.ambiguous_keys.len()
    );
    let registry = Registry::from_unique(kept)?;
    Ok((registry, report))
}

#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub report_every: usize,
    pub checkpoint_every: usize,
    pub fetch_gigography: bool,
}

impl LinkOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            report_every: config.progress.report_every,
            checkpoint_every: config.checkpoint.every,
            fetch_gigography: config.songkick.fetch_gigography,
        }
    }
}

#[derive(Debug)]
pub struct LinkReport {
    pub registry: Registry,
    pub progress: BatchProgress,
    pub failed: Vec<FailedLookup>,
    /// References returned by the checkpoint store, oldest first
    pub checkpoints: Vec<String>,
}

/// Links every registry record to the tour-listing source.
///
/// Unmatched and failed records stay in the output without a cross
/// reference. A gigography failure keeps the link and is recorded in
/// `failed` without changing the counts.
#[instrument(skip_all, fields(records = registry.len(), source = %api.source()))]
pub async fn link_tour_listings<T: TourListingApi>(
    registry: &Registry,
    api: &T,
    options: &LinkOptions,
    checkpoint: Option<&dyn CheckpointStore>,
) -> Result<LinkReport> {
    let linker = Linker::new(registry)?;
    let run_id = Uuid::new_v4();
    let source = api.source();
    let mut progress = BatchProgress::default();
    let mut failed = Vec::new();
    let mut checkpoints = Vec::new();
    let mut linked: Vec<ArtistRecord> = Vec::with_capacity(registry.len());

    info!("Starting link run {} over {} records", run_id, registry.len());

    for record in registry.iter() {
        let started = Instant::now();
        let outcome = linker.resolve(api, &record.raw_name).await;
        metrics::link::lookup_duration(started.elapsed().as_secs_f64());
        if let Ok(outcome) = &outcome {
            metrics::link::outcome(outcome);
        }

        match outcome {
            Ok(LinkOutcome::Confirmed(foreign_id)) => {
                progress.matched += 1;
                let mut record = record.linked_to(source, foreign_id.clone());
                if options.fetch_gigography {
                    match api.gigography(&foreign_id).await {
                        Ok(gigs) => {
                            metrics::link::gigs_fetched(gigs.len() as u64);
                            record = record.with_attribute("gigs", json!(gigs));
                        }
                        Err(e) => {
                            warn!("Gigography for '{}' failed: {}", record.raw_name, e);
                            failed.push(FailedLookup {
                                artist: record.raw_name.clone(),
                                reason: format!("gigography: {}", e),
                            });
                        }
                    }
                }
                linked.push(record);
            }
            Ok(_) => {
                progress.unmatched += 1;
                linked.push(record.clone());
            }
            Err(e) => {
                metrics::link::failed();
                error!("Lookup for '{}' failed: {}", record.raw_name, e);
                progress.failed += 1;
                failed.push(FailedLookup { artist: record.raw_name.clone(), reason: e.to_string() });
                linked.push(record.clone());
            }
        }
        progress.processed += 1;

        if progress.should_report(options.report_every) {
            info!("Link progress: {}", progress);
        }
        if let Some(store) = checkpoint {
            if options.checkpoint_every > 0 && progress.processed % options.checkpoint_every == 0 {
                if let Some(reference) = write_checkpoint(store, run_id, &progress, &linked).await {
                    checkpoints.push(reference);
                }
            }
        }
    }

    info!("Link run {} finished: {}", run_id, progress);
    let registry = Registry::from_unique(linked)?;
    Ok(LinkReport { registry, progress, failed, checkpoints })
}

/// Writes the records processed so far. Failures are logged and counted.
async fn write_checkpoint(
    store: &dyn CheckpointStore,
    run_id: Uuid,
    progress: &BatchProgress,
    records: &[ArtistRecord],
) -> Option<String> {
    let body = json!({
        "run_id": run_id,
        "progress": progress,
        "records": records,
    });
    let bytes = match serde_json::to_vec(&body) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Could not serialize checkpoint: {}", e);
            metrics::checkpoint::write_error();
            return None;
        }
    };
    match store.put(&bytes).await {
        Ok(reference) => {
            metrics::checkpoint::write_success(bytes.len());
            info!("Checkpoint after {} records: {}", progress.processed, reference);
            Some(reference)
        }
        Err(e) => {
            metrics::checkpoint::write_error();
            warn!("Checkpoint after {} records failed: {}", progress.processed, e);
            None
        }
    }
}

/// Loads every configured name list and the award index.
pub fn load_notability(config: &MembershipConfig) -> Result<NotabilityIndex> {
    let sets = config
        .lists
        .iter()
        .map(|list| MembershipSet::from_file(list.name.clone(), &list.path))
        .collect::<Result<Vec<_>>>()?;
    let awards = config.awards.as_deref().map(AwardIndex::from_file).transpose()?;
    Ok(NotabilityIndex::new(sets, awards))
}

/// Returns a registry whose records carry the notability attributes.
pub fn annotate_registry(registry: &Registry, index: &NotabilityIndex) -> Registry {
    if index.is_empty() {
        debug!("No membership sets configured, nothing to annotate");
    }
    let annotated: Vec<ArtistRecord> = registry
        .iter()
        .map(|record| {
            let annotated = index.annotate(record);
            let notable = annotated.attributes.iter().any(|(name, value)| {
                (name.starts_with("notable_") && value.as_bool() == Some(true)) || name == "awards"
            });
            metrics::annotate::record(notable);
            annotated
        })
        .collect();
    Registry::from(annotated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::{ArtistLookup, Gig};
    use crate::error::RegistryError;
    use crate::linker::LookupHit;
    use crate::types::Source;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct PagedSearch {
        pages: HashMap<(String, u32), Vec<ArtistRecord>>,
        failing: HashSet<String>,
    }

    #[async_trait]
    impl ArtistSearchApi for PagedSearch {
        fn source(&self) -> Source {
            Source::Spotify
        }

        async fn search(&self, query: &str, _limit: u32, offset: u32) -> Result<Vec<ArtistRecord>> {
            if self.failing.contains(query) {
                return Err(RegistryError::Api { message: "rate limited".to_string() });
            }
            Ok(self.pages.get(&(query.to_string(), offset)).cloned().unwrap_or_default())
        }
    }

    fn spotify(id: &str, name: &str, popularity: u64) -> ArtistRecord {
        ArtistRecord::new(Source::Spotify, id, name, popularity)
    }

    fn small_pages() -> SpotifyConfig {
        SpotifyConfig { page_size: 2, max_results_per_genre: 6, ..SpotifyConfig::default() }
    }

    #[tokio::test]
    async fn test_harvest_pages_until_short_page() {
        let mut pages = HashMap::new();
        pages.insert(("genre:poprap".to_string(), 0), vec![spotify("1", "Drake", 95), spotify("2", "J. Cole", 90)]);
        pages.insert(("genre:poprap".to_string(), 2), vec![spotify("3", "Björk", 70)]);
        pages.insert(("genre:rock".to_string(), 0), vec![spotify("1", "Drake", 95)]);
        let api = PagedSearch { pages, failing: HashSet::new() };

        let genres = vec!["pop rap".to_string(), "rock".to_string()];
        let report = harvest_by_genre(&api, &genres, &small_pages()).await;

        let ids: Vec<&str> = report.records.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(report.skipped_non_ascii, 1);
        assert_eq!(report.skipped_seen, 1);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_harvest_continues_after_failed_genre() {
        let mut pages = HashMap::new();
        pages.insert(("genre:rock".to_string(), 0), vec![spotify("9", "Moby", 40)]);
        let failing = HashSet::from(["genre:pop".to_string()]);
        let api = PagedSearch { pages, failing };

        let genres = vec!["pop".to_string(), "rock".to_string()];
        let report = harvest_by_genre(&api, &genres, &small_pages()).await;

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].genre, "pop");
    }

    #[test]
    fn test_build_registry_rejects_empty_input() {
        assert!(matches!(build_registry(&[]), Err(RegistryError::Precondition(_))));
    }

    #[test]
    fn test_build_registry_keeps_most_popular() {
        let records = vec![spotify("1", "drake", 80), spotify("2", "Drake", 95), spotify("3", "Moby", 0)];
        let (registry, report) = build_registry(&records).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.iter().next().unwrap().source_id, "2");
        assert_eq!(report.dropped_inactive, 1);
    }

    struct FakeTourListing {
        hits: HashMap<String, LookupHit>,
        broken: HashSet<String>,
        gigs: Vec<Gig>,
        gig_calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ArtistLookup for FakeTourListing {
        fn source(&self) -> Source {
            Source::Songkick
        }

        async fn top_match(&self, name: &str) -> Result<Option<LookupHit>> {
            if self.broken.contains(name) {
                return Err(RegistryError::Api { message: "503".to_string() });
            }
            Ok(self.hits.get(name).cloned())
        }
    }

    #[async_trait]
    impl TourListingApi for FakeTourListing {
        async fn gigography(&self, artist_id: &str) -> Result<Vec<Gig>> {
            self.gig_calls.lock().unwrap().push(artist_id.to_string());
            Ok(self.gigs.clone())
        }
    }

    struct MemoryStore {
        blobs: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl CheckpointStore for MemoryStore {
        async fn put(&self, bytes: &[u8]) -> Result<String> {
            let mut blobs = self.blobs.lock().unwrap();
            blobs.push(bytes.to_vec());
            Ok(format!("mem:{}", blobs.len()))
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl CheckpointStore for BrokenStore {
        async fn put(&self, _bytes: &[u8]) -> Result<String> {
            Err(RegistryError::Api { message: "bucket missing".to_string() })
        }
    }

    fn tour_listing() -> FakeTourListing {
        let mut hits = HashMap::new();
        hits.insert(
            "Sedayne".to_string(),
            LookupHit { id: "sk-1".to_string(), display_name: Some("Sedayne ".to_string()) },
        );
        hits.insert(
            "Moby".to_string(),
            LookupHit { id: "sk-2".to_string(), display_name: Some("Mobyrocks".to_string()) },
        );
        FakeTourListing {
            hits,
            broken: HashSet::from(["Drake".to_string()]),
            gigs: vec![Gig {
                id: "g1".to_string(),
                date: None,
                venue: Some("The Lexington".to_string()),
                city: Some("London".to_string()),
                country: Some("UK".to_string()),
            }],
            gig_calls: Mutex::new(Vec::new()),
        }
    }

    fn registry() -> Registry {
        Registry::from_unique(vec![
            spotify("sp-1", "Sedayne", 12),
            spotify("sp-2", "Moby", 40),
            spotify("sp-3", "Drake", 95),
            spotify("sp-4", "Aphex Twin", 60),
        ])
        .unwrap()
    }

    fn options(checkpoint_every: usize) -> LinkOptions {
        LinkOptions { report_every: 2, checkpoint_every, fetch_gigography: true }
    }

    #[tokio::test]
    async fn test_link_counts_every_outcome() {
        let api = tour_listing();
        let report = link_tour_listings(&registry(), &api, &options(0), None).await.unwrap();

        assert_eq!(
            report.progress,
            BatchProgress { processed: 4, matched: 1, unmatched: 2, failed: 1 }
        );
        assert_eq!(report.failed, vec![FailedLookup { artist: "Drake".to_string(), reason: "API error: 503".to_string() }]);
        assert_eq!(report.registry.len(), 4);

        let sedayne = report.registry.iter().next().unwrap();
        assert_eq!(sedayne.cross_refs.get(&Source::Songkick).map(String::as_str), Some("sk-1"));
        assert_eq!(sedayne.attributes["gigs"][0]["venue"], json!("The Lexington"));
        assert!(report.registry.iter().skip(1).all(|r| r.cross_refs.is_empty()));
        assert_eq!(*api.gig_calls.lock().unwrap(), vec!["sk-1".to_string()]);
    }

    #[tokio::test]
    async fn test_link_skips_gigography_when_disabled() {
        let api = tour_listing();
        let options = LinkOptions { fetch_gigography: false, ..options(0) };
        let report = link_tour_listings(&registry(), &api, &options, None).await.unwrap();
        assert!(api.gig_calls.lock().unwrap().is_empty());
        assert!(!report.registry.iter().next().unwrap().attributes.contains_key("gigs"));
    }

    #[tokio::test]
    async fn test_link_writes_checkpoints() {
        let api = tour_listing();
        let store = MemoryStore { blobs: Mutex::new(Vec::new()) };
        let report = link_tour_listings(&registry(), &api, &options(2), Some(&store)).await.unwrap();

        assert_eq!(report.checkpoints, vec!["mem:1".to_string(), "mem:2".to_string()]);
        let blobs = store.blobs.lock().unwrap();
        let first: serde_json::Value = serde_json::from_slice(&blobs[0]).unwrap();
        assert_eq!(first["records"].as_array().unwrap().len(), 2);
        assert_eq!(first["progress"]["processed"], json!(2));
    }

    #[tokio::test]
    async fn test_checkpoint_failure_is_not_fatal() {
        let api = tour_listing();
        let report = link_tour_listings(&registry(), &api, &options(1), Some(&BrokenStore)).await.unwrap();
        assert!(report.checkpoints.is_empty());
        assert_eq!(report.progress.processed, 4);
    }

    #[tokio::test]
    async fn test_link_rejects_empty_registry() {
        let api = tour_listing();
        let result = link_tour_listings(&Registry::default(), &api, &options(0), None).await;
        assert!(matches!(result, Err(RegistryError::Precondition(_))));
    }

    #[test]
    fn test_annotate_registry() {
        let index = NotabilityIndex::new(vec![MembershipSet::build("platinum", ["The Drake"])], None);
        let annotated = annotate_registry(&registry(), &index);
        let flags: Vec<bool> = annotated
            .iter()
            .map(|r| r.attributes["notable_platinum"].as_bool().unwrap())
            .collect();
        assert_eq!(flags, vec![false, false, true, false]);
    }

    #[test]
    fn test_load_notability_without_lists() {
        let index = load_notability(&MembershipConfig::default()).unwrap();
        assert!(index.is_empty());
    }
}
