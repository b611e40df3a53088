use std::hash::Hash;

use recordindex_error::{ErrorCodes, RecordIndexError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod nop;
mod unbounded;

pub use nop::NopCache;
pub use unbounded::{UnboundedCache, UnboundedCacheConfig};

/// Failures of stores that can fail. The in-process stores of this crate
/// never do; stores backed by something remote report through this.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache is unavailable: {0}")]
    Unavailable(String),
}

impl RecordIndexError for CacheError {
    fn code(&self) -> ErrorCodes {
        match self {
            CacheError::Unavailable(_) => ErrorCodes::Unavailable,
        }
    }
}

/// Configuration for the schema cache. Deserializes from either
/// `unbounded: {}` or `nop`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheConfig {
    Unbounded(UnboundedCacheConfig),
    Nop,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::Unbounded(UnboundedCacheConfig::default())
    }
}

/// A cache keyed on `K` holding cloned copies of `V`. Callers never hold a
/// reference into the cache; every read hands back an owned value.
#[async_trait::async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<V>, CacheError>;
    async fn insert(&self, key: K, value: V);
    async fn remove(&self, key: &K);
    async fn clear(&self) -> Result<(), CacheError>;
}

pub fn from_config<K, V>(config: &CacheConfig) -> Box<dyn Cache<K, V>>
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + 'static,
{
    match config {
        CacheConfig::Unbounded(config) => Box::new(config.build::<K, V>()),
        CacheConfig::Nop => Box::new(NopCache),
    }
}
