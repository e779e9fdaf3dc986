//! Collaborators the engine reads from and the write path persists through.

use crate::core::error::{EngineError, Result};
use crate::core::model::{Holding, HoldingId, Platform, PriceSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Holdings to write and delete together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoldingsBatch {
    pub upserts: Vec<Holding>,
    pub deletes: Vec<Holding>,
}

impl HoldingsBatch {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// Persistent holdings storage.
///
/// Lists are returned ordered by holding id.
#[async_trait]
pub trait HoldingsStore: Send + Sync {
    async fn find(&self, id: &str) -> Result<Option<Holding>>;

    async fn find_all_by_crypto(&self, crypto_id: &str) -> Result<Vec<Holding>>;

    async fn find_all_by_platform(&self, platform_id: &str) -> Result<Vec<Holding>>;

    async fn find_all(&self) -> Result<Vec<Holding>>;

    async fn find_by_crypto_and_platform(
        &self,
        crypto_id: &str,
        platform_id: &str,
    ) -> Result<Option<Holding>>;

    /// Writes every upsert and delete, or none of them.
    ///
    /// Each holding's `version` must match the stored version (zero for a holding
    /// that must not exist yet), otherwise the whole batch fails with
    /// `EngineError::Conflict`. Written holdings get their version incremented.
    async fn apply(&self, batch: HoldingsBatch) -> Result<()>;

    async fn save_all(&self, holdings: Vec<Holding>) -> Result<()> {
        self.apply(HoldingsBatch {
            upserts: holdings,
            deletes: Vec::new(),
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let holding = self
            .find(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Holding", id))?;
        self.apply(HoldingsBatch {
            upserts: Vec::new(),
            deletes: vec![holding],
        })
        .await
    }
}

#[async_trait]
pub trait PlatformDirectory: Send + Sync {
    /// Fails with `NotFound` for an unknown id.
    async fn by_id(&self, id: &str) -> Result<Platform>;

    async fn by_ids(&self, ids: &[String]) -> Result<Vec<Platform>>;

    async fn all(&self) -> Result<Vec<Platform>>;
}

#[async_trait]
pub trait PriceSnapshotProvider: Send + Sync {
    /// Snapshots for the known ids. Unknown ids are omitted.
    async fn by_ids(&self, ids: &[String]) -> Result<Vec<PriceSnapshot>>;

    /// The snapshot with the highest 24h change among `ids`.
    async fn top_gainer_24h(&self, ids: &[String]) -> Result<PriceSnapshot>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheScope {
    Insights,
    PriceSnapshots,
}

#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, scope: CacheScope);
}

/// Picks the highest 24h change among `snapshots`, ties going to the lowest id.
pub(crate) fn top_gainer(snapshots: Vec<PriceSnapshot>) -> Option<PriceSnapshot> {
    snapshots.into_iter().max_by(|a, b| {
        a.change_24h
            .cmp(&b.change_24h)
            .then_with(|| b.id.cmp(&a.id))
    })
}
