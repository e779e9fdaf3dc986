//! Write path for holdings and transfers, plus cached reads of every insight view.

use crate::core::cache::Cache;
use crate::core::config::InsightsConfig;
use crate::core::error::{EngineError, Result};
use crate::core::insights::{
    CryptoInsights, CryptosBreakdown, CryptosPage, InsightsComposer, PlatformInsights,
    PlatformsBreakdown, PortfolioOverview, SortBy, SortDirection,
};
use crate::core::model::{Holding, Platform};
use crate::core::ports::{
    CacheInvalidator, CacheScope, HoldingsStore, PlatformDirectory, PriceSnapshotProvider,
};
use crate::core::transfer::{TransferLedgerEngine, TransferOutcome, TransferRequest};
use crate::store::memory::MemoryCache;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum InsightKey {
    Crypto(String),
    CryptosBreakdown,
    Platform(String),
    PlatformsBreakdown,
    CryptosPage {
        page: usize,
        sort_by: SortBy,
        direction: SortDirection,
    },
    Overview,
}

#[derive(Debug, Clone)]
enum CachedInsight {
    Crypto(Option<CryptoInsights>),
    CryptosBreakdown(Option<CryptosBreakdown>),
    Platform(Option<PlatformInsights>),
    PlatformsBreakdown(Option<PlatformsBreakdown>),
    CryptosPage(Option<CryptosPage>),
    Overview(Option<PortfolioOverview>),
}

pub struct PortfolioService {
    holdings: Arc<dyn HoldingsStore>,
    platforms: Arc<dyn PlatformDirectory>,
    prices: Arc<dyn PriceSnapshotProvider>,
    composer: InsightsComposer,
    engine: TransferLedgerEngine,
    insights_cache: MemoryCache<InsightKey, CachedInsight>,
    invalidators: Vec<Arc<dyn CacheInvalidator>>,
}

impl PortfolioService {
    pub fn new(
        holdings: Arc<dyn HoldingsStore>,
        platforms: Arc<dyn PlatformDirectory>,
        prices: Arc<dyn PriceSnapshotProvider>,
        config: InsightsConfig,
    ) -> Self {
        Self {
            composer: InsightsComposer::new(
                holdings.clone(),
                platforms.clone(),
                prices.clone(),
                config,
            ),
            engine: TransferLedgerEngine::new(holdings.clone(), platforms.clone()),
            holdings,
            platforms,
            prices,
            insights_cache: MemoryCache::new(),
            invalidators: Vec::new(),
        }
    }

    /// Registers another cache to be invalidated alongside the insights cache.
    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidators.push(invalidator);
        self
    }

    async fn cached<T, F, Fut>(
        &self,
        key: InsightKey,
        wrap: fn(Option<T>) -> CachedInsight,
        unwrap: fn(CachedInsight) -> Option<Option<T>>,
        compute: F,
    ) -> Result<Option<T>>
    where
        T: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        if let Some(hit) = self.insights_cache.get(&key).await.and_then(unwrap) {
            return Ok(hit);
        }
        let view = compute().await?;
        self.insights_cache.put(key, wrap(view.clone()), None).await;
        Ok(view)
    }

    pub async fn crypto_insights(&self, crypto_id: &str) -> Result<Option<CryptoInsights>> {
        self.cached(
            InsightKey::Crypto(crypto_id.to_string()),
            CachedInsight::Crypto,
            |cached| match cached {
                CachedInsight::Crypto(view) => Some(view),
                _ => None,
            },
            || self.composer.crypto_insights(crypto_id),
        )
        .await
    }

    pub async fn cryptos_breakdown(&self) -> Result<Option<CryptosBreakdown>> {
        self.cached(
            InsightKey::CryptosBreakdown,
            CachedInsight::CryptosBreakdown,
            |cached| match cached {
                CachedInsight::CryptosBreakdown(view) => Some(view),
                _ => None,
            },
            || self.composer.cryptos_breakdown(),
        )
        .await
    }

    pub async fn platform_insights(&self, platform_id: &str) -> Result<Option<PlatformInsights>> {
        self.cached(
            InsightKey::Platform(platform_id.to_string()),
            CachedInsight::Platform,
            |cached| match cached {
                CachedInsight::Platform(view) => Some(view),
                _ => None,
            },
            || self.composer.platform_insights(platform_id),
        )
        .await
    }

    pub async fn platforms_breakdown(&self) -> Result<Option<PlatformsBreakdown>> {
        self.cached(
            InsightKey::PlatformsBreakdown,
            CachedInsight::PlatformsBreakdown,
            |cached| match cached {
                CachedInsight::PlatformsBreakdown(view) => Some(view),
                _ => None,
            },
            || self.composer.platforms_breakdown(),
        )
        .await
    }

    pub async fn cryptos_page(
        &self,
        page: usize,
        sort_by: SortBy,
        direction: SortDirection,
    ) -> Result<Option<CryptosPage>> {
        self.cached(
            InsightKey::CryptosPage {
                page,
                sort_by,
                direction,
            },
            CachedInsight::CryptosPage,
            |cached| match cached {
                CachedInsight::CryptosPage(view) => Some(view),
                _ => None,
            },
            || self.composer.cryptos_page(page, sort_by, direction),
        )
        .await
    }

    pub async fn overview(&self) -> Result<Option<PortfolioOverview>> {
        self.cached(
            InsightKey::Overview,
            CachedInsight::Overview,
            |cached| match cached {
                CachedInsight::Overview(view) => Some(view),
                _ => None,
            },
            || self.composer.overview(),
        )
        .await
    }

    pub async fn holdings(&self) -> Result<Vec<Holding>> {
        self.holdings.find_all().await
    }

    pub async fn platforms(&self) -> Result<Vec<Platform>> {
        self.platforms.all().await
    }

    /// Records a new holding. Each (crypto, platform) pair may be held only once.
    #[instrument(name = "AddHolding", skip(self))]
    pub async fn add_holding(
        &self,
        crypto_id: &str,
        platform_id: &str,
        quantity: Decimal,
    ) -> Result<Holding> {
        ensure_positive(quantity)?;
        let platform = self.platforms.by_id(platform_id).await?;
        let known = self.prices.by_ids(&[crypto_id.to_string()]).await?;
        if !known.iter().any(|snapshot| snapshot.id == crypto_id) {
            return Err(EngineError::not_found("Crypto", crypto_id));
        }
        if self
            .holdings
            .find_by_crypto_and_platform(crypto_id, &platform.id)
            .await?
            .is_some()
        {
            return Err(EngineError::Duplicate {
                entity: "Holding",
                key: format!("{crypto_id}@{}", platform.id),
            });
        }

        let holding = Holding::new(crypto_id, &platform.id, quantity);
        self.holdings.save_all(vec![holding.clone()]).await?;
        self.invalidate(CacheScope::Insights).await;
        info!(id = %holding.id, "Holding added");
        self.stored(&holding.id).await
    }

    #[instrument(name = "UpdateHolding", skip(self))]
    pub async fn update_holding(&self, id: &str, quantity: Decimal) -> Result<Holding> {
        ensure_positive(quantity)?;
        let holding = self.stored(id).await?;
        self.holdings
            .save_all(vec![Holding {
                quantity,
                ..holding
            }])
            .await?;
        self.invalidate(CacheScope::Insights).await;
        info!("Holding updated");
        self.stored(id).await
    }

    #[instrument(name = "RemoveHolding", skip(self))]
    pub async fn remove_holding(&self, id: &str) -> Result<()> {
        self.holdings.delete(id).await?;
        self.invalidate(CacheScope::Insights).await;
        info!("Holding removed");
        Ok(())
    }

    /// Plans the transfer and applies its writes as one batch.
    ///
    /// A concurrent write to either holding between planning and applying
    /// surfaces as `EngineError::Conflict` and nothing is written.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        let outcome = self.engine.transfer(request).await?;
        self.holdings.apply(outcome.batch()).await?;
        self.invalidate(CacheScope::Insights).await;
        info!(
            destination = outcome.destination_holding_id(),
            credited = %outcome.quantity_credited,
            "Transfer applied"
        );
        Ok(outcome)
    }

    async fn stored(&self, id: &str) -> Result<Holding> {
        self.holdings
            .find(id)
            .await?
            .ok_or_else(|| EngineError::not_found("Holding", id))
    }
}

fn ensure_positive(quantity: Decimal) -> Result<()> {
    if quantity <= Decimal::ZERO {
        return Err(EngineError::Validation(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    Ok(())
}

#[async_trait]
impl CacheInvalidator for PortfolioService {
    async fn invalidate(&self, scope: CacheScope) {
        debug!(?scope, "Invalidating caches");
        if scope == CacheScope::Insights {
            self.insights_cache.clear().await;
        }
        for invalidator in &self.invalidators {
            invalidator.invalidate(scope).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::balance::tests::snapshot;
    use crate::core::transfer::LedgerEffect;
    use crate::providers::caching::CachingPriceProvider;
    use crate::providers::directory::ConfigPlatformDirectory;
    use crate::providers::static_prices::StaticPriceProvider;
    use crate::store::memory::MemoryHoldingsStore;
    use crate::core::model::PriceSnapshot;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn service() -> (Arc<MemoryHoldingsStore>, PortfolioService) {
        let store = Arc::new(MemoryHoldingsStore::new());
        let mut bitcoin = snapshot("bitcoin", dec!(30000), dec!(27000), dec!(1));
        bitcoin.name = "Bitcoin".to_string();
        let mut ethereum = snapshot("ethereum", dec!(2000), dec!(1800), dec!(0.0666666));
        ethereum.name = "Ethereum".to_string();
        let service = PortfolioService::new(
            store.clone(),
            Arc::new(ConfigPlatformDirectory::new(vec![
                Platform {
                    id: "binance".to_string(),
                    name: "Binance".to_string(),
                },
                Platform {
                    id: "ledger".to_string(),
                    name: "Ledger".to_string(),
                },
            ])),
            Arc::new(StaticPriceProvider::new(vec![bitcoin, ethereum])),
            InsightsConfig::default(),
        );
        (store, service)
    }

    #[tokio::test]
    async fn test_add_holding() {
        let (_, service) = service();
        let holding = service
            .add_holding("bitcoin", "binance", dec!(0.25))
            .await
            .unwrap();

        assert_eq!(holding.version, 1);
        assert_eq!(holding.quantity, dec!(0.25));
        assert_eq!(service.holdings().await.unwrap(), vec![holding]);
    }

    #[tokio::test]
    async fn test_add_holding_rejections() {
        let (_, service) = service();
        service
            .add_holding("bitcoin", "binance", dec!(1))
            .await
            .unwrap();

        assert!(matches!(
            service.add_holding("bitcoin", "binance", dec!(2)).await,
            Err(EngineError::Duplicate { .. })
        ));
        assert_eq!(
            service.add_holding("bitcoin", "kraken", dec!(1)).await,
            Err(EngineError::not_found("Platform", "kraken"))
        );
        assert_eq!(
            service.add_holding("dogecoin", "ledger", dec!(1)).await,
            Err(EngineError::not_found("Crypto", "dogecoin"))
        );
        assert!(matches!(
            service.add_holding("ethereum", "ledger", dec!(0)).await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_remove_holding() {
        let (_, service) = service();
        let holding = service
            .add_holding("ethereum", "ledger", dec!(3))
            .await
            .unwrap();

        let updated = service.update_holding(&holding.id, dec!(4.5)).await.unwrap();
        assert_eq!(updated.quantity, dec!(4.5));
        assert_eq!(updated.version, 2);

        service.remove_holding(&holding.id).await.unwrap();
        assert!(service.holdings().await.unwrap().is_empty());
        assert_eq!(
            service.update_holding(&holding.id, dec!(1)).await,
            Err(EngineError::not_found("Holding", holding.id.as_str()))
        );
    }

    #[tokio::test]
    async fn test_views_refresh_after_write() {
        let (_, service) = service();
        assert!(service.cryptos_breakdown().await.unwrap().is_none());

        service
            .add_holding("bitcoin", "binance", dec!(0.1))
            .await
            .unwrap();
        let breakdown = service.cryptos_breakdown().await.unwrap().unwrap();
        assert_eq!(breakdown.balances.usd, dec!(3000.00));

        service
            .add_holding("ethereum", "ledger", dec!(1))
            .await
            .unwrap();
        let breakdown = service.cryptos_breakdown().await.unwrap().unwrap();
        assert_eq!(breakdown.balances.usd, dec!(5000.00));
        assert_eq!(breakdown.cryptos[0].id, "bitcoin");
        assert_eq!(breakdown.cryptos[0].percentage, 60.0);
    }

    #[tokio::test]
    async fn test_cached_view_ignores_writes_behind_its_back() {
        let (store, service) = service();
        service
            .add_holding("bitcoin", "binance", dec!(0.1))
            .await
            .unwrap();
        let before = service.overview().await.unwrap().unwrap();

        // Written straight to the store, so nothing invalidates the cache
        store
            .save_all(vec![Holding::new("ethereum", "ledger", dec!(1))])
            .await
            .unwrap();
        assert_eq!(service.overview().await.unwrap().unwrap(), before);

        service.invalidate(CacheScope::Insights).await;
        assert_ne!(service.overview().await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_transfer_is_applied() {
        let (_, service) = service();
        let source = service
            .add_holding("bitcoin", "binance", dec!(2.375321283))
            .await
            .unwrap();

        let outcome = service
            .transfer(&TransferRequest {
                source_holding_id: source.id.clone(),
                destination_platform_id: "ledger".to_string(),
                quantity_to_transfer: dec!(0.51),
                network_fee: dec!(0.0005),
                send_full_quantity: true,
            })
            .await
            .unwrap();
        assert!(matches!(outcome.effect, LedgerEffect::PartialToNew { .. }));

        let insights = service.crypto_insights("bitcoin").await.unwrap().unwrap();
        assert_eq!(insights.quantity, dec!(2.374821283));
        let ledger = insights
            .platforms
            .iter()
            .find(|row| row.id == "ledger")
            .unwrap();
        assert_eq!(ledger.quantity, Some(dec!(0.51)));
        let binance = insights
            .platforms
            .iter()
            .find(|row| row.id == "binance")
            .unwrap();
        assert_eq!(binance.quantity, Some(dec!(1.864821283)));
    }

    #[tokio::test]
    async fn test_failed_transfer_writes_nothing() {
        let (_, service) = service();
        let source = service
            .add_holding("bitcoin", "binance", dec!(0.1))
            .await
            .unwrap();

        let result = service
            .transfer(&TransferRequest {
                source_holding_id: source.id.clone(),
                destination_platform_id: "ledger".to_string(),
                quantity_to_transfer: dec!(0.1),
                network_fee: dec!(0.001),
                send_full_quantity: true,
            })
            .await;
        assert_eq!(
            result,
            Err(EngineError::InsufficientBalance {
                requested: dec!(0.101),
                available: dec!(0.1),
            })
        );
        assert_eq!(service.holdings().await.unwrap(), vec![source]);
    }

    // Counts the ids that reach the configured static prices
    struct CountingPrices {
        inner: StaticPriceProvider,
        requested: AtomicUsize,
    }

    #[async_trait]
    impl PriceSnapshotProvider for CountingPrices {
        async fn by_ids(&self, ids: &[String]) -> Result<Vec<PriceSnapshot>> {
            self.requested.fetch_add(ids.len(), Ordering::SeqCst);
            self.inner.by_ids(ids).await
        }

        async fn top_gainer_24h(&self, ids: &[String]) -> Result<PriceSnapshot> {
            self.inner.top_gainer_24h(ids).await
        }
    }

    #[tokio::test]
    async fn test_price_invalidation_reaches_registered_invalidators() {
        let counting = Arc::new(CountingPrices {
            inner: StaticPriceProvider::new(vec![snapshot(
                "bitcoin",
                dec!(30000),
                dec!(27000),
                dec!(1),
            )]),
            requested: AtomicUsize::new(0),
        });
        let prices = Arc::new(CachingPriceProvider::new(
            counting.clone(),
            Duration::from_secs(60),
        ));
        let service = PortfolioService::new(
            Arc::new(MemoryHoldingsStore::new()),
            Arc::new(ConfigPlatformDirectory::new(vec![Platform {
                id: "binance".to_string(),
                name: "Binance".to_string(),
            }])),
            prices.clone(),
            InsightsConfig::default(),
        )
        .with_invalidator(prices);

        service
            .add_holding("bitcoin", "binance", dec!(1))
            .await
            .unwrap();
        service.overview().await.unwrap();
        let fetched = counting.requested.load(Ordering::SeqCst);
        assert!(fetched > 0);

        // Clearing the views alone keeps the prices cached
        service.invalidate(CacheScope::Insights).await;
        service.overview().await.unwrap();
        assert_eq!(counting.requested.load(Ordering::SeqCst), fetched);

        service.invalidate(CacheScope::PriceSnapshots).await;
        service.invalidate(CacheScope::Insights).await;
        let overview = service.overview().await.unwrap().unwrap();
        assert!(counting.requested.load(Ordering::SeqCst) > fetched);
        assert_eq!(overview.balances.usd, dec!(30000.00));
        assert_eq!(overview.top_gainer.crypto.id, "bitcoin");
    }
}
