//! Domain types shared by the insights and transfer paths.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type HoldingId = String;

/// Market data for a single crypto, as supplied by a price provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub usd: Decimal,
    pub eur: Decimal,
    pub btc: Decimal,
    #[serde(default)]
    pub circulating_supply: Decimal,
    #[serde(default)]
    pub max_supply: Option<Decimal>,
    #[serde(default)]
    pub change_24h: Decimal,
    #[serde(default)]
    pub change_7d: Decimal,
    #[serde(default)]
    pub change_30d: Decimal,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// A quantity of one crypto held on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub id: HoldingId,
    pub crypto_id: String,
    pub quantity: Decimal,
    pub platform_id: String,
    /// Version last read from the store. Zero for a holding that was never persisted.
    #[serde(default)]
    pub version: u64,
}

impl Holding {
    /// Creates a holding that has not been persisted yet.
    pub fn new(crypto_id: &str, platform_id: &str, quantity: Decimal) -> Self {
        Holding {
            id: uuid::Uuid::new_v4().to_string(),
            crypto_id: crypto_id.to_string(),
            quantity,
            platform_id: platform_id.to_string(),
            version: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub id: String,
    pub name: String,
}

/// A value expressed in every supported quote currency.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MultiCurrencyBalance {
    pub usd: Decimal,
    pub eur: Decimal,
    pub btc: Decimal,
}

impl MultiCurrencyBalance {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Adds two balances without re-rounding. Both sides are already rounded,
    /// so the sum keeps their scales.
    pub fn add(&self, other: &MultiCurrencyBalance) -> MultiCurrencyBalance {
        MultiCurrencyBalance {
            usd: self.usd + other.usd,
            eur: self.eur + other.eur,
            btc: (self.btc + other.btc).normalize(),
        }
    }
}

/// One labelled line of an insight view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRow {
    pub id: String,
    pub label: String,
    /// Absent when the row mixes several cryptos (platform rows, "Others").
    pub quantity: Option<Decimal>,
    pub balances: MultiCurrencyBalance,
    pub percentage: f64,
}
