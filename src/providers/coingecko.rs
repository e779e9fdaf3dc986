use crate::core::error::{EngineError, Result};
use crate::core::model::PriceSnapshot;
use crate::core::ports::{PriceSnapshotProvider, top_gainer};
use crate::providers::util::with_retry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::try_join;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

const RETRIES: usize = 2;
const RETRY_DELAY: Duration = Duration::from_millis(500);

// Numbers go through their shortest decimal form, so 0.1 stays 0.1
#[derive(Deserialize, Debug)]
struct MarketItem {
    id: String,
    symbol: String,
    name: String,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    current_price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    circulating_supply: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    max_supply: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    price_change_percentage_24h: Option<Decimal>,
    #[serde(
        default,
        rename = "price_change_percentage_7d_in_currency",
        with = "rust_decimal::serde::float_option"
    )]
    change_7d: Option<Decimal>,
    #[serde(
        default,
        rename = "price_change_percentage_30d_in_currency",
        with = "rust_decimal::serde::float_option"
    )]
    change_30d: Option<Decimal>,
    last_updated: Option<DateTime<Utc>>,
}

/// Price snapshots from the CoinGecko markets endpoint.
///
/// Each vs-currency is a separate request, sent concurrently. The USD response
/// carries the market data and the EUR and BTC responses only contribute their prices.
pub struct CoingeckoProvider {
    base_url: String,
    client: reqwest::Client,
}

impl CoingeckoProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("cryptofolio/0.1")
            .build()
            .map_err(|e| EngineError::Provider(e.to_string()))?;
        Ok(CoingeckoProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn fetch_markets(&self, vs_currency: &str, ids: &[String]) -> Result<Vec<MarketItem>> {
        let url = format!(
            "{}/api/v3/coins/markets?vs_currency={}&ids={}&price_change_percentage=7d,30d",
            self.base_url,
            vs_currency,
            ids.join(",")
        );
        debug!("Requesting market data from {}", url);

        let client = &self.client;
        let url = url.as_str();
        let response = with_retry(
            move || async move { client.get(url).send().await?.error_for_status() },
            RETRIES,
            RETRY_DELAY,
        )
        .await
        .map_err(|e| EngineError::Provider(format!("Request error: {e} for URL: {url}")))?;

        response.json::<Vec<MarketItem>>().await.map_err(|e| {
            EngineError::Provider(format!("Failed to parse JSON response for {vs_currency}: {e}"))
        })
    }

    async fn prices_in(&self, vs_currency: &str, ids: &[String]) -> Result<HashMap<String, Decimal>> {
        Ok(self
            .fetch_markets(vs_currency, ids)
            .await?
            .into_iter()
            .filter_map(|item| item.current_price.map(|price| (item.id, price)))
            .collect())
    }
}

#[async_trait]
impl PriceSnapshotProvider for CoingeckoProvider {
    #[instrument(name = "CoingeckoFetch", skip(self), fields(count = ids.len()))]
    async fn by_ids(&self, ids: &[String]) -> Result<Vec<PriceSnapshot>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let (markets, eur_prices, btc_prices) = try_join!(
            self.fetch_markets("usd", ids),
            self.prices_in("eur", ids),
            self.prices_in("btc", ids)
        )?;

        let snapshots = markets
            .into_iter()
            .filter_map(|item| {
                let (Some(usd), Some(eur), Some(btc)) = (
                    item.current_price,
                    eur_prices.get(&item.id).copied(),
                    btc_prices.get(&item.id).copied(),
                ) else {
                    debug!(id = %item.id, "Incomplete price data, skipping");
                    return None;
                };
                Some(PriceSnapshot {
                    name: item.name,
                    symbol: item.symbol,
                    usd,
                    eur,
                    btc,
                    circulating_supply: item.circulating_supply.unwrap_or_default(),
                    max_supply: item.max_supply,
                    change_24h: item.price_change_percentage_24h.unwrap_or_default(),
                    change_7d: item.change_7d.unwrap_or_default(),
                    change_30d: item.change_30d.unwrap_or_default(),
                    last_updated: item.last_updated,
                    id: item.id,
                })
            })
            .collect();
        Ok(snapshots)
    }

    async fn top_gainer_24h(&self, ids: &[String]) -> Result<PriceSnapshot> {
        top_gainer(self.by_ids(ids).await?)
            .ok_or_else(|| EngineError::not_found("Crypto", ids.join(",")))
    }
}
