//! Record dumps and checkpoint stores.
//!
//! Checkpoints are content addressed: the same bytes always land at the
//! same `sha256/xx/yy/<hex>` path and come back as `cas:sha256:<hex>`.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::apis::load_credentials;
use crate::config::{CheckpointBackend, CheckpointConfig, ObjectStoreConfig};
use crate::error::{RegistryError, Result};
use crate::types::ArtistRecord;

pub const OBJECT_STORE_CREDENTIALS_FILE: &str = "object_store.json";

/// Opaque blob sink for partially processed batches
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Stores `bytes` and returns a reference to them.
    async fn put(&self, bytes: &[u8]) -> Result<String>;
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn cas_path(hex: &str) -> String {
    format!("sha256/{}/{}/{}", &hex[0..2], &hex[2..4], hex)
}

fn cas_ref(hex: &str) -> String {
    format!("cas:sha256:{}", hex)
}

/// Content-addressed store on local disk
pub struct FsCheckpointStore {
    root: PathBuf,
}

impl FsCheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where the blob for `reference` lives, if it is a CAS reference.
    pub fn path_for(&self, reference: &str) -> Option<PathBuf> {
        let hex = reference.strip_prefix("cas:sha256:")?;
        if hex.len() < 4 {
            return None;
        }
        Some(self.root.join(cas_path(hex)))
    }
}

#[async_trait]
impl CheckpointStore for FsCheckpointStore {
    async fn put(&self, bytes: &[u8]) -> Result<String> {
        let hex = sha256_hex(bytes);
        let path = self.root.join(cas_path(&hex));
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        if !tokio::fs::try_exists(&path).await? {
            tokio::fs::write(&path, bytes).await?;
        }
        debug!("Wrote checkpoint {}", path.display());
        Ok(cas_ref(&hex))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreCredentials {
    pub service_key: String,
}

/// Content-addressed store in a Supabase-style storage bucket
pub struct ObjectStoreCheckpoint {
    client: reqwest::Client,
    config: ObjectStoreConfig,
    credentials: ObjectStoreCredentials,
}

impl ObjectStoreCheckpoint {
    pub fn new(config: ObjectStoreConfig, credentials: ObjectStoreCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client, config, credentials })
    }

    fn object_path(&self, hex: &str) -> String {
        let prefix = self.config.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            cas_path(hex)
        } else {
            format!("{}/{}", prefix, cas_path(hex))
        }
    }

    fn endpoint(&self, hex: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url.trim_end_matches('/'),
            self.config.bucket,
            self.object_path(hex)
        )
    }
}

#[async_trait]
impl CheckpointStore for ObjectStoreCheckpoint {
    async fn put(&self, bytes: &[u8]) -> Result<String> {
        let hex = sha256_hex(bytes);
        let key = &self.credentials.service_key;
        // upsert keeps repeated writes of the same content idempotent
        let resp = self
            .client
            .put(self.endpoint(&hex))
            .bearer_auth(key)
            .header("apikey", key.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .query(&[("upsert", "true")])
            .body(bytes.to_vec())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RegistryError::Api {
                message: format!("Checkpoint upload failed: {} - {}", status, body),
            });
        }
        Ok(cas_ref(&hex))
    }
}

/// Builds the store selected in config, or `None` when checkpointing is off.
pub fn checkpoint_store(
    config: &CheckpointConfig,
    credentials_dir: &Path,
) -> Result<Option<Box<dyn CheckpointStore>>> {
    let store: Box<dyn CheckpointStore> = match config.backend {
        CheckpointBackend::Disabled => return Ok(None),
        CheckpointBackend::Filesystem => Box::new(FsCheckpointStore::new(&config.root)),
        CheckpointBackend::ObjectStore => {
            let credentials: ObjectStoreCredentials =
                load_credentials(&credentials_dir.join(OBJECT_STORE_CREDENTIALS_FILE))?;
            Box::new(ObjectStoreCheckpoint::new(config.object_store.clone(), credentials)?)
        }
    };
    Ok(Some(store))
}

/// Writes `records` as pretty JSON. An empty collection is not written.
pub fn save_records(path: &Path, records: &[ArtistRecord]) -> Result<bool> {
    if records.is_empty() {
        warn!("No records to save to {}, skipping", path.display());
        return Ok(false);
    }
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)?;
    info!("Saved {} records to {}", records.len(), path.display());
    Ok(true)
}

pub fn load_records(path: &Path) -> Result<Vec<ArtistRecord>> {
    let content = std::fs::read_to_string(path)?;
    let records: Vec<ArtistRecord> = serde_json::from_str(&content)?;
    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}
