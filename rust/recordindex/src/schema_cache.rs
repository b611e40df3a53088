use recordindex_cache::{Cache, CacheConfig};
use recordindex_types::Schema;

/// The last schema this process saw confirmed for each collection, keyed by
/// qualified collection name.
///
/// Reads and writes may come from any number of tasks at once. Entries for
/// different collections never block each other; two writers of the same
/// entry race and the last one wins. Nothing is atomic across entries. The
/// store is advisory: a collection changed by another process leaves a stale
/// entry until it is invalidated.
pub struct SchemaCache {
    cache: Box<dyn Cache<String, Schema>>,
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache").finish_non_exhaustive()
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        SchemaCache::new(&CacheConfig::default())
    }
}

impl SchemaCache {
    pub fn new(config: &CacheConfig) -> Self {
        SchemaCache {
            cache: recordindex_cache::from_config(config),
        }
    }

    /// Uses a store other than the in-process ones, for instance one shared
    /// between processes.
    pub fn with_store(cache: Box<dyn Cache<String, Schema>>) -> Self {
        SchemaCache { cache }
    }

    /// A failing store reads as a miss.
    pub async fn get(&self, collection: &str) -> Option<Schema> {
        match self.cache.get(&collection.to_string()).await {
            Ok(schema) => schema,
            Err(err) => {
                tracing::warn!(collection, error = %err, "Schema cache lookup failed");
                None
            }
        }
    }

    pub async fn put(&self, collection: &str, schema: Schema) {
        self.cache.insert(collection.to_string(), schema).await;
    }

    pub async fn remove(&self, collection: &str) {
        self.cache.remove(&collection.to_string()).await;
    }

    pub async fn clear(&self) {
        if let Err(err) = self.cache.clear().await {
            tracing::warn!(error = %err, "Failed to clear schema cache");
        }
    }
}
