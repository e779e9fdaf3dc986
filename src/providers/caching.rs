use crate::core::cache::Cache;
use crate::core::error::{EngineError, Result};
use crate::core::model::PriceSnapshot;
use crate::core::ports::{CacheInvalidator, CacheScope, PriceSnapshotProvider, top_gainer};
use crate::store::memory::MemoryCache;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Keeps snapshots per crypto id for `ttl`, fetching only the misses.
pub struct CachingPriceProvider {
    inner: Arc<dyn PriceSnapshotProvider>,
    cache: MemoryCache<String, PriceSnapshot>,
    ttl: Duration,
}

impl CachingPriceProvider {
    pub fn new(inner: Arc<dyn PriceSnapshotProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: MemoryCache::new(),
            ttl,
        }
    }
}

#[async_trait]
impl PriceSnapshotProvider for CachingPriceProvider {
    async fn by_ids(&self, ids: &[String]) -> Result<Vec<PriceSnapshot>> {
        let mut snapshots = Vec::with_capacity(ids.len());
        let mut misses = Vec::new();
        for id in ids {
            match self.cache.get(id).await {
                Some(snapshot) => snapshots.push(snapshot),
                None => misses.push(id.clone()),
            }
        }

        if !misses.is_empty() {
            debug!(misses = misses.len(), "Fetching uncached snapshots");
            for snapshot in self.inner.by_ids(&misses).await? {
                self.cache
                    .put(snapshot.id.clone(), snapshot.clone(), Some(self.ttl))
                    .await;
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }

    async fn top_gainer_24h(&self, ids: &[String]) -> Result<PriceSnapshot> {
        top_gainer(self.by_ids(ids).await?)
            .ok_or_else(|| EngineError::not_found("Crypto", ids.join(",")))
    }
}

#[async_trait]
impl CacheInvalidator for CachingPriceProvider {
    async fn invalidate(&self, scope: CacheScope) {
        if scope == CacheScope::PriceSnapshots {
            self.cache.clear().await;
        }
    }
}
