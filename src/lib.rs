pub mod apis;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod linker;
pub mod logging;
pub mod membership;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod rate_limiter;
pub mod storage;
pub mod types;

pub use error::{RegistryError, Result};
pub use normalize::{normalize, CanonicalKey};
