//! Prometheus metrics for the registry stages.
//!
//! Names live in one enum so every stage records against the same strings.
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use std::fmt;
use std::net::SocketAddr;
use tracing::{info, warn};

pub const METRICS_PORT_ENV: &str = "ARTIST_REGISTRY_METRICS_PORT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Harvest
    HarvestRecords,
    HarvestSkipped,
    HarvestGenreErrors,
    HarvestPageDuration,

    // Dedupe
    DedupeInput,
    DedupeKept,
    DedupeDroppedInactive,
    DedupeDroppedAmbiguous,

    // Link
    LinkConfirmed,
    LinkRejected,
    LinkNotFound,
    LinkFailed,
    LinkLookupDuration,
    LinkGigsFetched,

    // Annotate
    AnnotateRecords,
    AnnotateNotable,

    // Checkpoint
    CheckpointWritesSuccess,
    CheckpointWritesError,
    CheckpointBytes,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::HarvestRecords => "artist_registry_harvest_records_total",
            MetricName::HarvestSkipped => "artist_registry_harvest_skipped_total",
            MetricName::HarvestGenreErrors => "artist_registry_harvest_genre_errors_total",
            MetricName::HarvestPageDuration => "artist_registry_harvest_page_duration_seconds",

            MetricName::DedupeInput => "artist_registry_dedupe_input_total",
            MetricName::DedupeKept => "artist_registry_dedupe_kept_total",
            MetricName::DedupeDroppedInactive => "artist_registry_dedupe_dropped_inactive_total",
            MetricName::DedupeDroppedAmbiguous => "artist_registry_dedupe_dropped_ambiguous_total",

            MetricName::LinkConfirmed => "artist_registry_link_confirmed_total",
            MetricName::LinkRejected => "artist_registry_link_rejected_total",
            MetricName::LinkNotFound => "artist_registry_link_not_found_total",
            MetricName::LinkFailed => "artist_registry_link_failed_total",
            MetricName::LinkLookupDuration => "artist_registry_link_lookup_duration_seconds",
            MetricName::LinkGigsFetched => "artist_registry_link_gigs_fetched_total",

            MetricName::AnnotateRecords => "artist_registry_annotate_records_total",
            MetricName::AnnotateNotable => "artist_registry_annotate_notable_total",

            MetricName::CheckpointWritesSuccess => "artist_registry_checkpoint_writes_success_total",
            MetricName::CheckpointWritesError => "artist_registry_checkpoint_writes_error_total",
            MetricName::CheckpointBytes => "artist_registry_checkpoint_bytes",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installs the Prometheus exporter on `port`. Failure is logged, not fatal.
pub fn init_metrics(port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
        Err(e) => warn!("Prometheus exporter install failed: {}", e),
    }
}

/// Port from `ARTIST_REGISTRY_METRICS_PORT`, if set and valid.
pub fn metrics_port_from_env() -> Option<u16> {
    std::env::var(METRICS_PORT_ENV).ok().and_then(|s| s.parse().ok())
}

pub mod harvest {
    use super::MetricName;

    pub fn records(genre: &str, count: u64) {
        ::metrics::counter!(MetricName::HarvestRecords.as_str(), "genre" => genre.to_string()).increment(count);
    }

    pub fn skipped(reason: &'static str) {
        ::metrics::counter!(MetricName::HarvestSkipped.as_str(), "reason" => reason).increment(1);
    }

    pub fn genre_error() {
        ::metrics::counter!(MetricName::HarvestGenreErrors.as_str()).increment(1);
    }

    pub fn page_duration(secs: f64) {
        ::metrics::histogram!(MetricName::HarvestPageDuration.as_str()).record(secs);
    }
}

pub mod dedupe {
    use super::MetricName;
    use crate::dedupe::DedupReport;

    pub fn report(report: &DedupReport) {
        ::metrics::counter!(MetricName::DedupeInput.as_str()).increment(report.input as u64);
        ::metrics::counter!(MetricName::DedupeKept.as_str()).increment(report.kept as u64);
        ::metrics::counter!(MetricName::DedupeDroppedInactive.as_str()).increment(report.dropped_inactive as u64);
        ::metrics::counter!(MetricName::DedupeDroppedAmbiguous.as_str()).increment(report.dropped_ambiguous as u64);
    }
}

pub mod link {
    use super::MetricName;
    use crate::linker::LinkOutcome;

    pub fn outcome(outcome: &LinkOutcome) {
        let name = match outcome {
            LinkOutcome::Confirmed(_) => MetricName::LinkConfirmed,
            LinkOutcome::Rejected { .. } => MetricName::LinkRejected,
            LinkOutcome::NotFound | LinkOutcome::NotInRegistry => MetricName::LinkNotFound,
        };
        ::metrics::counter!(name.as_str()).increment(1);
    }

    pub fn failed() {
        ::metrics::counter!(MetricName::LinkFailed.as_str()).increment(1);
    }

    pub fn lookup_duration(secs: f64) {
        ::metrics::histogram!(MetricName::LinkLookupDuration.as_str()).record(secs);
    }

    pub fn gigs_fetched(count: u64) {
        ::metrics::counter!(MetricName::LinkGigsFetched.as_str()).increment(count);
    }
}

pub mod annotate {
    use super::MetricName;

    pub fn record(notable: bool) {
        ::metrics::counter!(MetricName::AnnotateRecords.as_str()).increment(1);
        if notable {
            ::metrics::counter!(MetricName::AnnotateNotable.as_str()).increment(1);
        }
    }
}

pub mod checkpoint {
    use super::MetricName;

    pub fn write_success(bytes: usize) {
        ::metrics::counter!(MetricName::CheckpointWritesSuccess.as_str()).increment(1);
        ::metrics::histogram!(MetricName::CheckpointBytes.as_str()).record(bytes as f64);
    }

    pub fn write_error() {
        ::metrics::counter!(MetricName::CheckpointWritesError.as_str()).increment(1);
    }
}
