use crate::core::error::Result;
use crate::core::model::{Holding, HoldingId};
use crate::core::ports::{HoldingsBatch, HoldingsStore};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

const HOLDINGS_PARTITION: &str = "holdings";

/// Holdings persisted in a fjall keyspace, one JSON value per holding id.
pub struct DiskHoldingsStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
    write_lock: Mutex<()>,
}

impl DiskHoldingsStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .map_err(|e| crate::core::EngineError::Storage(e.to_string()))?;

        let keyspace = fjall::Config::new(path.join("holdings_db")).open()?;
        let partition =
            keyspace.open_partition(HOLDINGS_PARTITION, PartitionCreateOptions::default())?;
        debug!(path = %path.display(), "Opened holdings store");

        Ok(Self {
            keyspace,
            partition,
            write_lock: Mutex::new(()),
        })
    }

    fn load_all(&self) -> Result<BTreeMap<HoldingId, Holding>> {
        let mut holdings = BTreeMap::new();
        for item in self.partition.iter() {
            let (_, value) = item?;
            let holding: Holding = serde_json::from_slice(&value)?;
            holdings.insert(holding.id.clone(), holding);
        }
        Ok(holdings)
    }

    fn filtered(&self, predicate: impl Fn(&Holding) -> bool) -> Result<Vec<Holding>> {
        Ok(self
            .load_all()?
            .into_values()
            .filter(|h| predicate(h))
            .collect())
    }
}

#[async_trait]
impl HoldingsStore for DiskHoldingsStore {
    async fn find(&self, id: &str) -> Result<Option<Holding>> {
        match self.partition.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    async fn find_all_by_crypto(&self, crypto_id: &str) -> Result<Vec<Holding>> {
        self.filtered(|h| h.crypto_id == crypto_id)
    }

    async fn find_all_by_platform(&self, platform_id: &str) -> Result<Vec<Holding>> {
        self.filtered(|h| h.platform_id == platform_id)
    }

    async fn find_all(&self) -> Result<Vec<Holding>> {
        self.filtered(|_| true)
    }

    async fn find_by_crypto_and_platform(
        &self,
        crypto_id: &str,
        platform_id: &str,
    ) -> Result<Option<Holding>> {
        Ok(self
            .filtered(|h| h.crypto_id == crypto_id && h.platform_id == platform_id)?
            .into_iter()
            .next())
    }

    async fn apply(&self, batch: HoldingsBatch) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let stored = self.load_all()?;
        let next = super::apply_batch(&stored, &batch)?;

        let mut write = self.keyspace.batch();
        for holding in &batch.deletes {
            write.remove(&self.partition, holding.id.as_str());
        }
        for holding in &batch.upserts {
            let written = &next[&holding.id];
            write.insert(&self.partition, holding.id.as_str(), serde_json::to_vec(written)?);
        }
        write.commit()?;
        self.keyspace.persist(PersistMode::SyncAll)?;

        debug!(
            upserts = batch.upserts.len(),
            deletes = batch.deletes.len(),
            "Committed holdings batch"
        );
        Ok(())
    }
}
