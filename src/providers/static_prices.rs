use crate::core::error::{EngineError, Result};
use crate::core::model::PriceSnapshot;
use crate::core::ports::{PriceSnapshotProvider, top_gainer};
use async_trait::async_trait;

/// Serves price snapshots from configuration.
pub struct StaticPriceProvider {
    snapshots: Vec<PriceSnapshot>,
}

impl StaticPriceProvider {
    pub fn new(snapshots: Vec<PriceSnapshot>) -> Self {
        Self { snapshots }
    }
}

#[async_trait]
impl PriceSnapshotProvider for StaticPriceProvider {
    async fn by_ids(&self, ids: &[String]) -> Result<Vec<PriceSnapshot>> {
        Ok(self
            .snapshots
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn top_gainer_24h(&self, ids: &[String]) -> Result<PriceSnapshot> {
        top_gainer(self.by_ids(ids).await?)
            .ok_or_else(|| EngineError::not_found("Crypto", ids.join(",")))
    }
}
