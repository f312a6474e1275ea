use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::apis::{load_credentials, ArtistSearchApi};
use crate::config::SpotifyConfig;
use crate::error::{RegistryError, Result};
use crate::rate_limiter::{Limits, RateLimiter};
use crate::types::{ArtistRecord, Source};

pub const CREDENTIALS_FILE: &str = "spotify.json";

/// Client-credentials pair read from `credentials/spotify.json`
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl SpotifyCredentials {
    pub fn load(path: &Path) -> Result<Self> {
        load_credentials(path)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    artists: ArtistPage,
}

#[derive(Debug, Deserialize)]
struct ArtistPage {
    #[serde(default)]
    items: Vec<SpotifyArtist>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    id: String,
    name: String,
    #[serde(default)]
    popularity: u64,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    images: Vec<SpotifyImage>,
    followers: Option<Followers>,
    external_urls: Option<ExternalUrls>,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
    height: Option<u32>,
    width: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Followers {
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

/// Search query for all artists tagged with `genre`
pub fn genre_query(genre: &str) -> String {
    format!("genre:{}", genre.replace(' ', ""))
}

/// Parses one page of `/v1/search?type=artist` into records.
pub fn parse_search_page(body: &str) -> Result<Vec<ArtistRecord>> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response.artists.items.into_iter().map(into_record).collect())
}

fn into_record(artist: SpotifyArtist) -> ArtistRecord {
    let images: Vec<_> = artist
        .images
        .iter()
        .map(|image| json!({ "url": image.url, "height": image.height, "width": image.width }))
        .collect();
    let mut record = ArtistRecord::new(Source::Spotify, artist.id, artist.name, artist.popularity)
        .with_attribute("genres", json!(artist.genres))
        .with_attribute("images", json!(images));
    if let Some(total) = artist.followers.and_then(|f| f.total) {
        record = record.with_attribute("followers", json!(total));
    }
    if let Some(url) = artist.external_urls.and_then(|u| u.spotify) {
        record = record.with_attribute("spotify_url", json!(url));
    }
    record
}

pub struct SpotifyClient {
    client: reqwest::Client,
    config: SpotifyConfig,
    credentials: SpotifyCredentials,
    token: Mutex<Option<AccessToken>>,
    limiter: RateLimiter,
}

impl SpotifyClient {
    pub fn new(config: SpotifyConfig, credentials: SpotifyCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let limiter = RateLimiter::new(Limits {
            requests_per_min: Some(config.requests_per_min),
            concurrency: None,
        });
        Ok(Self {
            client,
            config,
            credentials,
            token: Mutex::new(None),
            limiter,
        })
    }

    /// Returns a cached token, refreshing it a minute before expiry.
    async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if let Some(current) = token.as_ref() {
            if current.expires_at > Instant::now() {
                return Ok(current.value.clone());
            }
        }

        debug!("Requesting Spotify access token");
        let _permit = self.limiter.acquire().await;
        let resp = self
            .client
            .post(&self.config.token_url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RegistryError::Api {
                message: format!("Spotify token request failed: {} - {}", status, body),
            });
        }
        let granted: TokenResponse = resp.json().await?;
        let lifetime = Duration::from_secs(granted.expires_in.saturating_sub(60));
        *token = Some(AccessToken {
            value: granted.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(granted.access_token)
    }
}

#[async_trait::async_trait]
impl ArtistSearchApi for SpotifyClient {
    fn source(&self) -> Source {
        Source::Spotify
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str, limit: u32, offset: u32) -> Result<Vec<ArtistRecord>> {
        let token = self.access_token().await?;
        let _permit = self.limiter.acquire().await;
        let url = format!("{}/search", self.config.api_url.trim_end_matches('/'));
        let limit = limit.to_string();
        let offset = offset.to_string();
        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("q", query), ("type", "artist"), ("limit", limit.as_str()), ("offset", offset.as_str())])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(RegistryError::Api {
                message: format!("Spotify search '{}' failed: {} - {}", query, status, body),
            });
        }
        let records = parse_search_page(&body)?;
        info!("Spotify returned {} artists for '{}' at offset {}", records.len(), query, offset);
        Ok(records)
    }
}
