use crate::core::cache::Cache;
use crate::core::error::Result;
use crate::core::model::{Holding, HoldingId};
use crate::core::ports::{HoldingsBatch, HoldingsStore};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

struct CacheValue<V> {
    value: V,
    expires_at: Option<Instant>,
}

/// In-memory cache with optional per-entry expiry.
pub struct MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<K, CacheValue<V>>>>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for MemoryCache<K, V>
where
    K: Eq + Hash + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.inner.lock().await;
        let expired = match cache.get(key) {
            Some(entry) => entry.expires_at.is_some_and(|expiry| expiry <= Instant::now()),
            None => {
                debug!("Cache MISS for key: {:?}", key);
                return None;
            }
        };
        if expired {
            debug!("Cache entry expired for key: {:?}", key);
            cache.remove(key);
            return None;
        }
        debug!("Cache HIT for key: {:?}", key);
        cache.get(key).map(|entry| entry.value.clone())
    }

    async fn put(&self, key: K, value: V, ttl: Option<Duration>) {
        let expires_at = ttl.map(|duration| Instant::now() + duration);
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {:?}", key);
        cache.insert(key, CacheValue { value, expires_at });
    }

    async fn remove(&self, key: &K) {
        let mut cache = self.inner.lock().await;
        cache.remove(key);
        debug!("Cache REMOVE for key: {:?}", key);
    }

    async fn clear(&self) {
        let mut cache = self.inner.lock().await;
        cache.clear();
        debug!("Cache CLEAR");
    }
}

/// Holdings kept in process memory. Batches are applied under one write lock.
#[derive(Default)]
pub struct MemoryHoldingsStore {
    holdings: RwLock<BTreeMap<HoldingId, Holding>>,
}

impl MemoryHoldingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with holdings as given, versions included.
    pub fn with_holdings(holdings: Vec<Holding>) -> Self {
        Self {
            holdings: RwLock::new(holdings.into_iter().map(|h| (h.id.clone(), h)).collect()),
        }
    }

    async fn filtered(&self, predicate: impl Fn(&Holding) -> bool) -> Vec<Holding> {
        self.holdings
            .read()
            .await
            .values()
            .filter(|h| predicate(h))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HoldingsStore for MemoryHoldingsStore {
    async fn find(&self, id: &str) -> Result<Option<Holding>> {
        Ok(self.holdings.read().await.get(id).cloned())
    }

    async fn find_all_by_crypto(&self, crypto_id: &str) -> Result<Vec<Holding>> {
        Ok(self.filtered(|h| h.crypto_id == crypto_id).await)
    }

    async fn find_all_by_platform(&self, platform_id: &str) -> Result<Vec<Holding>> {
        Ok(self.filtered(|h| h.platform_id == platform_id).await)
    }

    async fn find_all(&self) -> Result<Vec<Holding>> {
        Ok(self.filtered(|_| true).await)
    }

    async fn find_by_crypto_and_platform(
        &self,
        crypto_id: &str,
        platform_id: &str,
    ) -> Result<Option<Holding>> {
        Ok(self
            .filtered(|h| h.crypto_id == crypto_id && h.platform_id == platform_id)
            .await
            .into_iter()
            .next())
    }

    async fn apply(&self, batch: HoldingsBatch) -> Result<()> {
        let mut holdings = self.holdings.write().await;
        let next = super::apply_batch(&holdings, &batch)?;
        debug!(
            upserts = batch.upserts.len(),
            deletes = batch.deletes.len(),
            "Applied holdings batch"
        );
        *holdings = next;
        Ok(())
    }
}
