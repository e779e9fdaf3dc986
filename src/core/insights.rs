//! Read-side valuation views over the user's holdings.
//!
//! Every view loads holdings, price snapshots and platforms first and then
//! computes purely. An empty holdings set yields `None`, never an error.
//!
//! Rows are ordered by their primary key and then by entity id ascending, so
//! views are reproducible when percentages tie. The synthetic "Others" row is
//! always last.

use crate::core::balance::{rows_total, single_balance, total_balances};
use crate::core::config::InsightsConfig;
use crate::core::error::{EngineError, Result};
use crate::core::model::{Holding, InsightRow, MultiCurrencyBalance, Platform, PriceSnapshot};
use crate::core::percentage::percentage;
use crate::core::ports::{HoldingsStore, PlatformDirectory, PriceSnapshotProvider};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

pub const OTHERS_ID: &str = "others";
pub const OTHERS_LABEL: &str = "Others";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoInfo {
    pub id: String,
    pub name: String,
    pub symbol: String,
}

impl From<&PriceSnapshot> for CryptoInfo {
    fn from(snapshot: &PriceSnapshot) -> Self {
        CryptoInfo {
            id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            symbol: snapshot.symbol.clone(),
        }
    }
}

/// One crypto split across the platforms holding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoInsights {
    pub crypto: CryptoInfo,
    pub quantity: Decimal,
    pub balances: MultiCurrencyBalance,
    pub platforms: Vec<InsightRow>,
}

/// Every crypto's share of the whole portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptosBreakdown {
    pub balances: MultiCurrencyBalance,
    pub cryptos: Vec<InsightRow>,
}

/// One platform split across the cryptos it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformInsights {
    pub platform: Platform,
    pub balances: MultiCurrencyBalance,
    pub cryptos: Vec<InsightRow>,
}

/// Every platform's share of the whole portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformsBreakdown {
    pub balances: MultiCurrencyBalance,
    pub platforms: Vec<InsightRow>,
}

/// A crypto aggregated across all platforms, with its market data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoHoldingRow {
    pub snapshot: PriceSnapshot,
    pub quantity: Decimal,
    /// Names of the platforms holding this crypto, alphabetical.
    pub platforms: Vec<String>,
    pub balances: MultiCurrencyBalance,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptosPage {
    pub page: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub balances: MultiCurrencyBalance,
    pub cryptos: Vec<CryptoHoldingRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopGainer {
    pub crypto: CryptoInfo,
    pub change_24h: Decimal,
    pub balances: MultiCurrencyBalance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioOverview {
    pub balances: MultiCurrencyBalance,
    pub top_gainer: TopGainer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortBy {
    Percentage,
    Quantity,
    CurrentPrice,
    MaxSupply,
    Change24h,
    Change7d,
    Change30d,
}

impl Display for SortBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SortBy::Percentage => "percentage",
                SortBy::Quantity => "quantity",
                SortBy::CurrentPrice => "price",
                SortBy::MaxSupply => "max-supply",
                SortBy::Change24h => "24h",
                SortBy::Change7d => "7d",
                SortBy::Change30d => "30d",
            }
        )
    }
}

impl FromStr for SortBy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "percentage" => Ok(SortBy::Percentage),
            "quantity" => Ok(SortBy::Quantity),
            "price" | "current-price" => Ok(SortBy::CurrentPrice),
            "max-supply" => Ok(SortBy::MaxSupply),
            "24h" => Ok(SortBy::Change24h),
            "7d" => Ok(SortBy::Change7d),
            "30d" => Ok(SortBy::Change30d),
            _ => Err(EngineError::Validation(format!("Invalid sort key: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortBy {
    fn compare(&self, a: &CryptoHoldingRow, b: &CryptoHoldingRow) -> Ordering {
        match self {
            SortBy::Percentage => a.percentage.total_cmp(&b.percentage),
            SortBy::Quantity => a.quantity.cmp(&b.quantity),
            SortBy::CurrentPrice => a.snapshot.usd.cmp(&b.snapshot.usd),
            SortBy::MaxSupply => a.snapshot.max_supply.cmp(&b.snapshot.max_supply),
            SortBy::Change24h => a.snapshot.change_24h.cmp(&b.snapshot.change_24h),
            SortBy::Change7d => a.snapshot.change_7d.cmp(&b.snapshot.change_7d),
            SortBy::Change30d => a.snapshot.change_30d.cmp(&b.snapshot.change_30d),
        }
    }
}

fn sort_by_percentage(rows: &mut [InsightRow]) {
    rows.sort_by(|a, b| {
        b.percentage
            .total_cmp(&a.percentage)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Keeps the first `threshold` rows and merges the rest into one "Others" row.
///
/// The merged percentage is computed from the summed balance, not by adding up
/// the merged rows' rounded percentages.
fn collapse_into_others(
    mut rows: Vec<InsightRow>,
    threshold: usize,
    total: &MultiCurrencyBalance,
) -> Result<Vec<InsightRow>> {
    if rows.len() <= threshold {
        return Ok(rows);
    }

    let merged = rows.split_off(threshold);
    debug!(merged = merged.len(), "Collapsing rows into Others");
    let balances = merged
        .iter()
        .fold(MultiCurrencyBalance::zero(), |acc, row| acc.add(&row.balances));

    rows.push(InsightRow {
        id: OTHERS_ID.to_string(),
        label: OTHERS_LABEL.to_string(),
        quantity: None,
        percentage: percentage(balances.usd, total.usd)?,
        balances,
    });
    Ok(rows)
}

fn quantities_by_crypto<'a>(holdings: impl IntoIterator<Item = &'a Holding>) -> HashMap<String, Decimal> {
    holdings
        .into_iter()
        .fold(HashMap::new(), |mut quantities, holding| {
            *quantities
                .entry(holding.crypto_id.clone())
                .or_insert(Decimal::ZERO) += holding.quantity;
            quantities
        })
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

/// Builds every insight view from the holdings, platform and price collaborators.
pub struct InsightsComposer {
    holdings: Arc<dyn HoldingsStore>,
    platforms: Arc<dyn PlatformDirectory>,
    prices: Arc<dyn PriceSnapshotProvider>,
    config: InsightsConfig,
}

impl InsightsComposer {
    pub fn new(
        holdings: Arc<dyn HoldingsStore>,
        platforms: Arc<dyn PlatformDirectory>,
        prices: Arc<dyn PriceSnapshotProvider>,
        config: InsightsConfig,
    ) -> Self {
        Self {
            holdings,
            platforms,
            prices,
            config,
        }
    }

    /// Snapshots for `crypto_ids`, failing if any of them has no price data.
    async fn snapshots_for(&self, crypto_ids: &[String]) -> Result<HashMap<String, PriceSnapshot>> {
        let snapshots: HashMap<String, PriceSnapshot> = self
            .prices
            .by_ids(crypto_ids)
            .await?
            .into_iter()
            .map(|snapshot| (snapshot.id.clone(), snapshot))
            .collect();

        if let Some(missing) = crypto_ids.iter().find(|id| !snapshots.contains_key(*id)) {
            return Err(EngineError::not_found("Crypto", missing.as_str()));
        }
        Ok(snapshots)
    }

    async fn platforms_for(&self, platform_ids: &[String]) -> Result<HashMap<String, Platform>> {
        let platforms: HashMap<String, Platform> = self
            .platforms
            .by_ids(platform_ids)
            .await?
            .into_iter()
            .map(|platform| (platform.id.clone(), platform))
            .collect();

        if let Some(missing) = platform_ids.iter().find(|id| !platforms.contains_key(*id)) {
            return Err(EngineError::not_found("Platform", missing.as_str()));
        }
        Ok(platforms)
    }

    #[instrument(name = "CryptoInsights", skip(self))]
    pub async fn crypto_insights(&self, crypto_id: &str) -> Result<Option<CryptoInsights>> {
        let holdings = self.holdings.find_all_by_crypto(crypto_id).await?;
        if holdings.is_empty() {
            debug!("No holdings for crypto");
            return Ok(None);
        }

        let mut snapshots = self.snapshots_for(&[crypto_id.to_string()]).await?;
        let snapshot = snapshots
            .remove(crypto_id)
            .ok_or_else(|| EngineError::not_found("Crypto", crypto_id))?;
        let platform_ids: Vec<String> = holdings.iter().map(|h| h.platform_id.clone()).collect();
        let platforms = self.platforms_for(&platform_ids).await?;

        let quantity: Decimal = holdings.iter().map(|h| h.quantity).sum();
        let row_balances: Vec<MultiCurrencyBalance> = holdings
            .iter()
            .map(|holding| single_balance(&snapshot, holding.quantity))
            .collect();
        let balances = rows_total(&row_balances, snapshot.btc * quantity);

        let mut rows = holdings
            .iter()
            .zip(row_balances)
            .map(|(holding, row_balances)| {
                Ok(InsightRow {
                    id: holding.platform_id.clone(),
                    label: platforms[&holding.platform_id].name.clone(),
                    quantity: Some(holding.quantity),
                    percentage: percentage(row_balances.usd, balances.usd)?,
                    balances: row_balances,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        sort_by_percentage(&mut rows);

        Ok(Some(CryptoInsights {
            crypto: CryptoInfo::from(&snapshot),
            quantity,
            balances,
            platforms: rows,
        }))
    }

    #[instrument(name = "CryptosBreakdown", skip(self))]
    pub async fn cryptos_breakdown(&self) -> Result<Option<CryptosBreakdown>> {
        let holdings = self.holdings.find_all().await?;
        if holdings.is_empty() {
            return Ok(None);
        }

        let quantities = quantities_by_crypto(&holdings);
        let snapshots = self.snapshots_for(&sorted_keys(&quantities)).await?;
        let all: Vec<PriceSnapshot> = snapshots.values().cloned().collect();
        let balances = total_balances(&all, &quantities);

        let mut rows = quantities
            .iter()
            .map(|(crypto_id, quantity)| {
                let snapshot = &snapshots[crypto_id];
                let row_balances = single_balance(snapshot, *quantity);
                Ok(InsightRow {
                    id: crypto_id.clone(),
                    label: snapshot.name.clone(),
                    quantity: Some(*quantity),
                    percentage: percentage(row_balances.usd, balances.usd)?,
                    balances: row_balances,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        sort_by_percentage(&mut rows);
        let cryptos = collapse_into_others(rows, self.config.others_threshold, &balances)?;

        Ok(Some(CryptosBreakdown { balances, cryptos }))
    }

    #[instrument(name = "PlatformInsights", skip(self))]
    pub async fn platform_insights(&self, platform_id: &str) -> Result<Option<PlatformInsights>> {
        let holdings = self.holdings.find_all_by_platform(platform_id).await?;
        if holdings.is_empty() {
            debug!("No holdings on platform");
            return Ok(None);
        }

        let platform = self.platforms.by_id(platform_id).await?;
        let quantities = quantities_by_crypto(&holdings);
        let snapshots = self.snapshots_for(&sorted_keys(&quantities)).await?;
        let all: Vec<PriceSnapshot> = snapshots.values().cloned().collect();
        let balances = total_balances(&all, &quantities);

        let mut rows = quantities
            .iter()
            .map(|(crypto_id, quantity)| {
                let snapshot = &snapshots[crypto_id];
                let row_balances = single_balance(snapshot, *quantity);
                Ok(InsightRow {
                    id: crypto_id.clone(),
                    label: snapshot.name.clone(),
                    quantity: Some(*quantity),
                    percentage: percentage(row_balances.usd, balances.usd)?,
                    balances: row_balances,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        sort_by_percentage(&mut rows);

        Ok(Some(PlatformInsights {
            platform,
            balances,
            cryptos: rows,
        }))
    }

    #[instrument(name = "PlatformsBreakdown", skip(self))]
    pub async fn platforms_breakdown(&self) -> Result<Option<PlatformsBreakdown>> {
        let holdings = self.holdings.find_all().await?;
        if holdings.is_empty() {
            return Ok(None);
        }

        let by_platform: HashMap<String, Vec<&Holding>> =
            holdings.iter().fold(HashMap::new(), |mut groups, holding| {
                groups
                    .entry(holding.platform_id.clone())
                    .or_insert_with(Vec::new)
                    .push(holding);
                groups
            });
        let quantities = quantities_by_crypto(&holdings);
        let snapshots = self.snapshots_for(&sorted_keys(&quantities)).await?;
        let platforms = self.platforms_for(&sorted_keys(&by_platform)).await?;
        let all: Vec<PriceSnapshot> = snapshots.values().cloned().collect();
        let platform_balances: Vec<(&String, MultiCurrencyBalance)> = by_platform
            .iter()
            .map(|(platform_id, platform_holdings)| {
                let platform_quantities = quantities_by_crypto(platform_holdings.iter().copied());
                (platform_id, total_balances(&all, &platform_quantities))
            })
            .collect();
        let balances = rows_total(
            platform_balances.iter().map(|(_, row_balances)| row_balances),
            total_balances(&all, &quantities).btc,
        );

        let mut rows = platform_balances
            .into_iter()
            .map(|(platform_id, row_balances)| {
                Ok(InsightRow {
                    id: platform_id.clone(),
                    label: platforms[platform_id].name.clone(),
                    quantity: None,
                    percentage: percentage(row_balances.usd, balances.usd)?,
                    balances: row_balances,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        sort_by_percentage(&mut rows);
        let platforms = collapse_into_others(rows, self.config.others_threshold, &balances)?;

        Ok(Some(PlatformsBreakdown {
            balances,
            platforms,
        }))
    }

    /// Cryptos aggregated across platforms, sorted and cut into zero-based pages.
    ///
    /// A page past the end is returned empty rather than as an error.
    #[instrument(name = "CryptosPage", skip(self))]
    pub async fn cryptos_page(
        &self,
        page: usize,
        sort_by: SortBy,
        direction: SortDirection,
    ) -> Result<Option<CryptosPage>> {
        let holdings = self.holdings.find_all().await?;
        if holdings.is_empty() {
            return Ok(None);
        }

        let quantities = quantities_by_crypto(&holdings);
        let platform_ids: HashMap<String, BTreeSet<String>> =
            holdings.iter().fold(HashMap::new(), |mut ids, holding| {
                ids.entry(holding.crypto_id.clone())
                    .or_default()
                    .insert(holding.platform_id.clone());
                ids
            });
        let snapshots = self.snapshots_for(&sorted_keys(&quantities)).await?;
        let distinct_platforms: Vec<String> = holdings
            .iter()
            .map(|h| h.platform_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let platforms = self.platforms_for(&distinct_platforms).await?;
        let all: Vec<PriceSnapshot> = snapshots.values().cloned().collect();
        let balances = total_balances(&all, &quantities);

        let mut rows = quantities
            .iter()
            .map(|(crypto_id, quantity)| {
                let snapshot = &snapshots[crypto_id];
                let row_balances = single_balance(snapshot, *quantity);
                let mut names: Vec<String> = platform_ids[crypto_id]
                    .iter()
                    .map(|id| platforms[id].name.clone())
                    .collect();
                names.sort();
                Ok(CryptoHoldingRow {
                    snapshot: snapshot.clone(),
                    quantity: *quantity,
                    platforms: names,
                    percentage: percentage(row_balances.usd, balances.usd)?,
                    balances: row_balances,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        rows.sort_by(|a, b| {
            let ordering = sort_by.compare(a, b);
            let ordering = match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            ordering.then_with(|| a.snapshot.id.cmp(&b.snapshot.id))
        });

        let page_size = self.config.page_size.max(1);
        let total_pages = rows.len().div_ceil(page_size);
        let start = page.saturating_mul(page_size);
        let cryptos = if start >= rows.len() {
            debug!(start, rows = rows.len(), "Requested page is past the end");
            Vec::new()
        } else {
            rows.into_iter().skip(start).take(page_size).collect()
        };

        Ok(Some(CryptosPage {
            page,
            total_pages,
            has_next_page: page + 1 < total_pages,
            balances,
            cryptos,
        }))
    }

    /// Total portfolio value and the held crypto with the best 24h change.
    #[instrument(name = "Overview", skip(self))]
    pub async fn overview(&self) -> Result<Option<PortfolioOverview>> {
        let holdings = self.holdings.find_all().await?;
        if holdings.is_empty() {
            return Ok(None);
        }

        let quantities = quantities_by_crypto(&holdings);
        let crypto_ids = sorted_keys(&quantities);
        let snapshots = self.snapshots_for(&crypto_ids).await?;
        let all: Vec<PriceSnapshot> = snapshots.values().cloned().collect();
        let balances = total_balances(&all, &quantities);

        let gainer = self.prices.top_gainer_24h(&crypto_ids).await?;
        let quantity = quantities
            .get(&gainer.id)
            .copied()
            .ok_or_else(|| EngineError::not_found("Holding", gainer.id.as_str()))?;

        Ok(Some(PortfolioOverview {
            balances,
            top_gainer: TopGainer {
                crypto: CryptoInfo::from(&gainer),
                change_24h: gainer.change_24h,
                balances: single_balance(&gainer, quantity),
            },
        }))
    }
}
