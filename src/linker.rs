//! Cross-source linking by exact key round trip.
//!
//! A foreign source is asked for its single best match to an artist name.
//! The match is accepted only when the name it returns normalizes to the
//! same key as the name that was asked for. A near miss is a miss.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::apis::ArtistLookup;
use crate::error::{RegistryError, Result};
use crate::normalize::normalize;
use crate::types::Registry;

/// The top hit a foreign source returned for a name query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupHit {
    pub id: String,
    pub display_name: Option<String>,
}

/// How one candidate fared against a foreign source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Round trip matched; carries the foreign id
    Confirmed(String),
    /// The source answered with a name that normalizes differently, or with no name
    Rejected { returned: Option<String> },
    /// The source had nothing for this name
    NotFound,
    /// The candidate's key is not in the registry, so nothing was asked
    NotInRegistry,
}

impl LinkOutcome {
    pub fn foreign_id(&self) -> Option<&str> {
        match self {
            LinkOutcome::Confirmed(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, LinkOutcome::Confirmed(_))
    }
}

/// Accepts `hit` for `candidate_name` only on an exact key round trip.
pub fn confirm(candidate_name: &str, hit: Option<&LookupHit>) -> Option<String> {
    let hit = hit?;
    let display_name = hit.display_name.as_deref()?;
    (normalize(display_name) == normalize(candidate_name)).then(|| hit.id.clone())
}

/// Links candidates against a read-only registry.
pub struct Linker<'a> {
    registry: &'a Registry,
}

impl<'a> Linker<'a> {
    /// Fails when the registry is empty: linking before a registry has been
    /// built means the pipeline ran out of order.
    pub fn new(registry: &'a Registry) -> Result<Self> {
        if registry.is_empty() {
            return Err(RegistryError::Precondition(
                "link called with an empty registry; run dedupe first".to_string(),
            ));
        }
        Ok(Self { registry })
    }

    /// Asks `lookup` for `candidate_name` and decides whether to link.
    ///
    /// Errors from the source are returned as-is so the caller can record
    /// them against the artist and move on.
    #[instrument(skip(self, lookup), fields(source = %lookup.source()))]
    pub async fn resolve(&self, lookup: &dyn ArtistLookup, candidate_name: &str) -> Result<LinkOutcome> {
        if !self.registry.contains(&normalize(candidate_name)) {
            return Ok(LinkOutcome::NotInRegistry);
        }

        let Some(hit) = lookup.top_match(candidate_name).await? else {
            debug!("No match returned for '{}'", candidate_name);
            return Ok(LinkOutcome::NotFound);
        };

        match confirm(candidate_name, Some(&hit)) {
            Some(id) => Ok(LinkOutcome::Confirmed(id)),
            None => {
                debug!(
                    "Rejected '{}' for '{}'",
                    hit.display_name.as_deref().unwrap_or("<no name>"),
                    candidate_name
                );
                Ok(LinkOutcome::Rejected { returned: hit.display_name })
            }
        }
    }
}

/// Returns the foreign id for `candidate_name`, or `None` when the link is
/// not confirmed.
pub async fn link(registry: &Registry, lookup: &dyn ArtistLookup, candidate_name: &str) -> Result<Option<String>> {
    let outcome = Linker::new(registry)?.resolve(lookup, candidate_name).await?;
    Ok(outcome.foreign_id().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::ArtistLookup;
    use crate::types::{ArtistRecord, Source};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn hit(id: &str, name: Option<&str>) -> LookupHit {
        LookupHit { id: id.to_string(), display_name: name.map(str::to_string) }
    }

    struct FixedLookup {
        answer: Option<LookupHit>,
        calls: AtomicUsize,
    }

    impl FixedLookup {
        fn new(answer: Option<LookupHit>) -> Self {
            Self { answer, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl ArtistLookup for FixedLookup {
        fn source(&self) -> Source {
            Source::Songkick
        }

        async fn top_match(&self, _name: &str) -> Result<Option<LookupHit>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    fn registry() -> Registry {
        Registry::from_unique(vec![ArtistRecord::new(Source::Spotify, "sp-1", "Sedayne", 12)]).unwrap()
    }

    #[test]
    fn test_confirm_accepts_trailing_whitespace() {
        assert_eq!(confirm("Sedayne", Some(&hit("42", Some("Sedayne ")))), Some("42".to_string()));
    }

    #[test]
    fn test_confirm_rejects_near_miss() {
        assert_eq!(confirm("Sedayne", Some(&hit("42", Some("The Sedaynes")))), None);
    }

    #[test]
    fn test_confirm_rejects_missing_name_or_hit() {
        assert_eq!(confirm("Sedayne", Some(&hit("42", None))), None);
        assert_eq!(confirm("Sedayne", None), None);
    }

    #[test]
    fn test_confirm_uses_full_normalization() {
        assert_eq!(
            confirm("Twenty One Pilots", Some(&hit("7", Some("twenty-one pilots")))),
            Some("7".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_confirms_and_is_repeatable() {
        let registry = registry();
        let linker = Linker::new(&registry).unwrap();
        let lookup = FixedLookup::new(Some(hit("sk-1", Some("Sedayne "))));
        let first = linker.resolve(&lookup, "Sedayne").await.unwrap();
        let second = linker.resolve(&lookup, "Sedayne").await.unwrap();
        assert_eq!(first, LinkOutcome::Confirmed("sk-1".to_string()));
        assert_eq!(first, second);
        assert_eq!(registry.get(&normalize("sedayne")).unwrap().cross_refs.len(), 0);
    }

    #[tokio::test]
    async fn test_resolve_rejects_different_name() {
        let registry = registry();
        let lookup = FixedLookup::new(Some(hit("sk-2", Some("The Sedaynes"))));
        let outcome = Linker::new(&registry).unwrap().resolve(&lookup, "Sedayne").await.unwrap();
        assert_eq!(outcome, LinkOutcome::Rejected { returned: Some("The Sedaynes".to_string()) });
        assert!(link(&registry, &lookup, "Sedayne").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_skips_names_outside_registry() {
        let registry = registry();
        let lookup = FixedLookup::new(Some(hit("sk-3", Some("Moby"))));
        let outcome = Linker::new(&registry).unwrap().resolve(&lookup, "Moby").await.unwrap();
        assert_eq!(outcome, LinkOutcome::NotInRegistry);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolve_not_found() {
        let registry = registry();
        let lookup = FixedLookup::new(None);
        let outcome = Linker::new(&registry).unwrap().resolve(&lookup, "Sedayne").await.unwrap();
        assert_eq!(outcome, LinkOutcome::NotFound);
    }

    #[test]
    fn test_empty_registry_is_a_precondition_error() {
        let empty = Registry::default();
        assert!(matches!(Linker::new(&empty), Err(RegistryError::Precondition(_))));
    }
}
