use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::apis::{load_credentials, ArtistLookup, Gig, TourListingApi};
use crate::config::SongkickConfig;
use crate::error::{RegistryError, Result};
use crate::linker::LookupHit;
use crate::rate_limiter::{Limits, RateLimiter};
use crate::types::Source;

pub const CREDENTIALS_FILE: &str = "songkick.json";

#[derive(Debug, Clone, Deserialize)]
pub struct SongkickCredentials {
    pub api_key: String,
}

impl SongkickCredentials {
    pub fn load(path: &Path) -> Result<Self> {
        load_credentials(path)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    results_page: ResultsPage<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultsPage<T> {
    status: String,
    results: Option<T>,
    #[serde(default)]
    total_entries: u32,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct ArtistResults {
    #[serde(default)]
    artist: Vec<SongkickArtist>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SongkickArtist {
    id: u64,
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EventResults {
    #[serde(default)]
    event: Vec<SongkickEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SongkickEvent {
    id: u64,
    start: Option<EventStart>,
    venue: Option<SongkickVenue>,
    location: Option<EventLocation>,
}

#[derive(Debug, Deserialize)]
struct EventStart {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SongkickVenue {
    display_name: Option<String>,
    metro_area: Option<MetroArea>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetroArea {
    display_name: Option<String>,
    country: Option<Country>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Country {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventLocation {
    city: Option<String>,
}

fn unwrap_page<T>(body: &str) -> Result<ResultsPage<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    let page = envelope.results_page;
    if page.status != "ok" {
        let message = page
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| format!("status '{}'", page.status));
        return Err(RegistryError::Api { message: format!("Songkick: {}", message) });
    }
    Ok(page)
}

/// Parses `/search/artists.json`; the first artist is the best match.
pub fn parse_artist_search(body: &str) -> Result<Option<LookupHit>> {
    let page = unwrap_page::<ArtistResults>(body)?;
    let hit = page
        .results
        .unwrap_or_default()
        .artist
        .into_iter()
        .next()
        .map(|artist| LookupHit { id: artist.id.to_string(), display_name: artist.display_name });
    Ok(hit)
}

/// Parses one `/artists/{id}/gigography.json` page. Returns the gigs and
/// the total number of entries across all pages.
pub fn parse_gigography_page(body: &str) -> Result<(Vec<Gig>, u32)> {
    let page = unwrap_page::<EventResults>(body)?;
    let total = page.total_entries;
    let gigs = page
        .results
        .unwrap_or_default()
        .event
        .into_iter()
        .map(|event| {
            let date = event
                .start
                .and_then(|s| s.date)
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok());
            let (venue, metro, country) = match event.venue {
                Some(v) => {
                    let (metro, country) = match v.metro_area {
                        Some(m) => (m.display_name, m.country.and_then(|c| c.display_name)),
                        None => (None, None),
                    };
                    (v.display_name, metro, country)
                }
                None => (None, None, None),
            };
            let city = metro.or_else(|| event.location.and_then(|l| l.city));
            Gig { id: event.id.to_string(), date, venue, city, country }
        })
        .collect();
    Ok((gigs, total))
}

pub struct SongkickClient {
    client: reqwest::Client,
    config: SongkickConfig,
    credentials: SongkickCredentials,
    limiter: RateLimiter,
}

impl SongkickClient {
    pub fn new(config: SongkickConfig, credentials: SongkickCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let limiter = RateLimiter::new(Limits {
            requests_per_min: Some(config.requests_per_min),
            concurrency: Some(config.concurrency),
        });
        Ok(Self { client, config, credentials, limiter })
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let _permit = self.limiter.acquire().await;
        let url = format!("{}/{}", self.config.api_url.trim_end_matches('/'), path);
        let resp = self
            .client
            .get(&url)
            .query(&[("apikey", self.credentials.api_key.as_str())])
            .query(query)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(RegistryError::Api {
                message: format!("Songkick GET {} failed: {}", path, status),
            });
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl ArtistLookup for SongkickClient {
    fn source(&self) -> Source {
        Source::Songkick
    }

    #[instrument(skip(self))]
    async fn top_match(&self, name: &str) -> Result<Option<LookupHit>> {
        let body = self.get("search/artists.json", &[("query", name), ("per_page", "1")]).await?;
        parse_artist_search(&body)
    }
}

#[async_trait::async_trait]
impl TourListingApi for SongkickClient {
    #[instrument(skip(self))]
    async fn gigography(&self, artist_id: &str) -> Result<Vec<Gig>> {
        let path = format!("artists/{}/gigography.json", artist_id);
        let per_page = self.config.gigography_page_size.max(1).to_string();
        let mut gigs = Vec::new();
        let mut page_number: u32 = 1;
        loop {
            let page = page_number.to_string();
            let body = self
                .get(&path, &[("page", page.as_str()), ("per_page", per_page.as_str())])
                .await?;
            let (mut batch, total) = parse_gigography_page(&body)?;
            let empty = batch.is_empty();
            gigs.append(&mut batch);
            if empty || gigs.len() as u32 >= total {
                break;
            }
            page_number += 1;
        }
        debug!("Collected {} gigs for Songkick artist {}", gigs.len(), artist_id);
        Ok(gigs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_artist_search_takes_first() {
        let body = r#"{"resultsPage": {"status": "ok", "totalEntries": 2, "perPage": 50, "page": 1,
            "results": {"artist": [
                {"id": 253846, "displayName": "Sedayne ", "uri": "http://www.songkick.com/artists/253846"},
                {"id": 1, "displayName": "The Sedaynes"}
            ]}}}"#;
        let hit = parse_artist_search(body).unwrap().unwrap();
        assert_eq!(hit.id, "253846");
        assert_eq!(hit.display_name.as_deref(), Some("Sedayne "));
    }

    #[test]
    fn test_parse_artist_search_without_results() {
        let body = r#"{"resultsPage": {"status": "ok", "results": {}, "totalEntries": 0}}"#;
        assert!(parse_artist_search(body).unwrap().is_none());
    }

    #[test]
    fn test_parse_error_status() {
        let body = r#"{"resultsPage": {"status": "error", "error": {"message": "Invalid or missing apikey"}}}"#;
        let err = parse_artist_search(body).unwrap_err();
        assert!(err.to_string().contains("Invalid or missing apikey"));
    }

    #[test]
    fn test_parse_gigography_page() {
        let body = r#"{"resultsPage": {"status": "ok", "totalEntries": 3, "perPage": 2, "page": 1,
            "results": {"event": [
                {"id": 11, "displayName": "Sedayne at The Lexington", "type": "Concert",
                 "start": {"date": "2019-05-06", "time": null},
                 "venue": {"displayName": "The Lexington",
                           "metroArea": {"displayName": "London", "country": {"displayName": "UK"}}},
                 "location": {"city": "London, UK"}},
                {"id": 12, "start": {"date": "not a date"}, "location": {"city": "Leeds, UK"}}
            ]}}}"#;
        let (gigs, total) = parse_gigography_page(body).unwrap();
        assert_eq!(total, 3);
        assert_eq!(gigs.len(), 2);
        assert_eq!(gigs[0].date, NaiveDate::from_ymd_opt(2019, 5, 6));
        assert_eq!(gigs[0].venue.as_deref(), Some("The Lexington"));
        assert_eq!(gigs[0].city.as_deref(), Some("London"));
        assert_eq!(gigs[0].country.as_deref(), Some("UK"));
        assert_eq!(gigs[1].date, None);
        assert_eq!(gigs[1].city.as_deref(), Some("Leeds, UK"));
    }
}
