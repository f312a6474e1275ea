use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "ARTIST_REGISTRY_CONFIG";

/// Run configuration. Every section is optional in `config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub credentials_dir: PathBuf,
    pub progress: ProgressConfig,
    pub spotify: SpotifyConfig,
    pub songkick: SongkickConfig,
    pub checkpoint: CheckpointConfig,
    pub membership: MembershipConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Log running counts every this many records
    pub report_every: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub api_url: String,
    pub token_url: String,
    pub page_size: u32,
    pub max_results_per_genre: u32,
    pub requests_per_min: u64,
    pub timeout_seconds: u64,
    /// Names with characters outside ASCII are skipped at harvest time
    pub ascii_names_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SongkickConfig {
    pub api_url: String,
    pub requests_per_min: u64,
    pub concurrency: u32,
    pub timeout_seconds: u64,
    pub fetch_gigography: bool,
    pub gigography_page_size: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointBackend {
    Disabled,
    Filesystem,
    ObjectStore,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub backend: CheckpointBackend,
    /// Write a checkpoint every this many processed records
    pub every: usize,
    pub root: PathBuf,
    pub object_store: ObjectStoreConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ObjectStoreConfig {
    /// e.g. https://xyzcompany.supabase.co
    pub url: String,
    pub bucket: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MembershipConfig {
    pub lists: Vec<NameListConfig>,
    pub awards: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NameListConfig {
    pub name: String,
    pub path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            credentials_dir: PathBuf::from("credentials"),
            progress: ProgressConfig::default(),
            spotify: SpotifyConfig::default(),
            songkick: SongkickConfig::default(),
            checkpoint: CheckpointConfig::default(),
            membership: MembershipConfig::default(),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self { report_every: 100 }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.spotify.com/v1".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            page_size: 50,
            max_results_per_genre: 2000,
            requests_per_min: 120,
            timeout_seconds: 30,
            ascii_names_only: true,
        }
    }
}

impl Default for SongkickConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.songkick.com/api/3.0".to_string(),
            requests_per_min: 60,
            concurrency: 1,
            timeout_seconds: 30,
            fetch_gigography: true,
            gigography_page_size: 50,
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: CheckpointBackend::Filesystem,
            every: 500,
            root: PathBuf::from("data/checkpoints"),
            object_store: ObjectStoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads `config.toml`, or the file named by `ARTIST_REGISTRY_CONFIG`.
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_path(Path::new(&path)),
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_path(Path::new(DEFAULT_CONFIG_PATH))
            }
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            RegistryError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::parse(&config_content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.spotify.page_size == 0 || self.spotify.page_size > 50 {
            return Err(RegistryError::Config(format!(
                "spotify.page_size must be between 1 and 50, got {}",
                self.spotify.page_size
            )));
        }
        if self.checkpoint.backend == CheckpointBackend::ObjectStore
            && (self.checkpoint.object_store.url.is_empty() || self.checkpoint.object_store.bucket.is_empty())
        {
            return Err(RegistryError::Config(
                "checkpoint.object_store needs both url and bucket".to_string(),
            ));
        }
        Ok(())
    }

    pub fn credentials_path(&self, file_name: &str) -> PathBuf {
        self.credentials_dir.join(file_name)
    }
}
