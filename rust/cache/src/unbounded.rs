use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

use super::CacheError;

/// A zero-configuration cache that doesn't evict.
#[derive(Debug, Default, Clone, serde::Deserialize, serde::Serialize)]
pub struct UnboundedCacheConfig {}

impl UnboundedCacheConfig {
    pub fn build<K, V>(&self) -> UnboundedCache<K, V>
    where
        K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
        V: Clone + Send + Sync + 'static,
    {
        UnboundedCache::new(self)
    }
}

/// A zero-configuration cache that doesn't evict.
///
/// Entries live in a sharded map: writers on different keys do not block each
/// other, writers on the same key are last-writer-wins, and nothing is atomic
/// across keys.
pub struct UnboundedCache<K, V>
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + 'static,
{
    cache: Arc<DashMap<K, V>>,
}

impl<K, V> UnboundedCache<K, V>
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(_: &UnboundedCacheConfig) -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[async_trait::async_trait]
impl<K, V> super::Cache<K, V> for UnboundedCache<K, V>
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<V>, CacheError> {
        Ok(self.cache.get(key).map(|entry| entry.value().clone()))
    }

    async fn insert(&self, key: K, value: V) {
        self.cache.insert(key, value);
    }

    async fn remove(&self, key: &K) {
        self.cache.remove(key);
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.cache.clear();
        self.cache.shrink_to_fit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cache;

    #[tokio::test]
    async fn test_insert_overwrites_and_clear_empties() {
        let cache = UnboundedCacheConfig::default().build::<String, String>();
        cache.insert("k".to_string(), "v1".to_string()).await;
        cache.insert("k".to_string(), "v2".to_string()).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get(&"k".to_string()).await.unwrap(),
            Some("v2".to_string())
        );

        cache.clear().await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let cache = Arc::new(UnboundedCacheConfig::default().build::<u32, u32>());
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.insert(i, i * 2).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.len(), 16);
        assert_eq!(cache.get(&7).await.unwrap(), Some(14));
    }
}
