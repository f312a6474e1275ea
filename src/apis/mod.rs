//! Clients for the external catalogs.
//!
//! The registry core never calls these directly; the pipeline drives them
//! and hands their parsed results to the core as [`ArtistRecord`]s and
//! [`LookupHit`]s.

pub mod everynoise;
pub mod songkick;
pub mod spotify;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{RegistryError, Result};
use crate::linker::LookupHit;
use crate::types::{ArtistRecord, Source};

/// A catalog that can be searched for artists, page by page
#[async_trait::async_trait]
pub trait ArtistSearchApi: Send + Sync {
    fn source(&self) -> Source;

    /// One page of artist results for `query`
    async fn search(&self, query: &str, limit: u32, offset: u32) -> Result<Vec<ArtistRecord>>;
}

/// A catalog that can name its single best match for an artist name
#[async_trait::async_trait]
pub trait ArtistLookup: Send + Sync {
    fn source(&self) -> Source;

    /// `Ok(None)` when the catalog has nothing for `name`
    async fn top_match(&self, name: &str) -> Result<Option<LookupHit>>;
}

/// A tour-listing catalog: artist lookup plus past and upcoming gigs
#[async_trait::async_trait]
pub trait TourListingApi: ArtistLookup {
    async fn gigography(&self, artist_id: &str) -> Result<Vec<Gig>>;
}

/// One concert from a tour listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gig {
    pub id: String,
    pub date: Option<NaiveDate>,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// Reads a JSON credentials file. Any failure names the file.
pub fn load_credentials<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| RegistryError::Credentials {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| RegistryError::Credentials {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
