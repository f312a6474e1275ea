use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not read credentials from '{path}': {message}")]
    Credentials { path: String, message: String },

    #[error("API error: {message}")]
    Api { message: String },

    /// A stage was invoked out of order, e.g. on an empty collection.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
