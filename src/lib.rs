pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::insights::{SortBy, SortDirection};
use crate::core::ports::{PlatformDirectory, PriceSnapshotProvider};
use crate::core::service::PortfolioService;
use crate::core::transfer::TransferRequest;
use crate::providers::caching::CachingPriceProvider;
use crate::providers::coingecko::CoingeckoProvider;
use crate::providers::directory::ConfigPlatformDirectory;
use crate::providers::static_prices::StaticPriceProvider;
use crate::store::disk::DiskHoldingsStore;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationBy {
    Crypto,
    Platform,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldingCommand {
    Add {
        crypto_id: String,
        platform_id: String,
        quantity: Decimal,
    },
    Update {
        id: String,
        quantity: Decimal,
    },
    Remove {
        id: String,
    },
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Overview,
    Allocation(AllocationBy),
    Crypto(String),
    Platform(String),
    /// Zero-based page of the per-crypto table.
    Cryptos {
        page: usize,
        sort_by: SortBy,
        direction: SortDirection,
    },
    Holding(HoldingCommand),
    Transfer(TransferRequest),
}

/// Builds the service from configuration: fjall holdings under the data path,
/// platforms from config, and CoinGecko prices when configured, static ones otherwise.
pub fn build_service(config: &AppConfig) -> Result<PortfolioService> {
    let data_path = config.default_data_path()?;
    let holdings = Arc::new(
        DiskHoldingsStore::open(&data_path)
            .with_context(|| format!("Failed to open holdings store at {}", data_path.display()))?,
    );
    let platforms: Arc<dyn PlatformDirectory> =
        Arc::new(ConfigPlatformDirectory::new(config.platforms.clone()));

    let service = match &config.providers.coingecko {
        Some(coingecko) => {
            debug!(base_url = %coingecko.base_url, "Using CoinGecko prices");
            let live = Arc::new(
                CoingeckoProvider::new(&coingecko.base_url)
                    .context("Failed to create CoinGecko provider")?,
            );
            let prices = Arc::new(CachingPriceProvider::new(
                live,
                Duration::from_secs(coingecko.cache_ttl_secs),
            ));
            PortfolioService::new(holdings, platforms, prices.clone(), config.insights)
                .with_invalidator(prices)
        }
        None => {
            debug!(count = config.prices.len(), "Using static prices");
            let prices: Arc<dyn PriceSnapshotProvider> =
                Arc::new(StaticPriceProvider::new(config.prices.clone()));
            PortfolioService::new(holdings, platforms, prices, config.insights)
        }
    };
    Ok(service)
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("cryptofolio starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let service = build_service(&config)?;

    match command {
        AppCommand::Overview => cli::insights::overview(&service).await,
        AppCommand::Allocation(AllocationBy::Crypto) => {
            cli::insights::cryptos_breakdown(&service).await
        }
        AppCommand::Allocation(AllocationBy::Platform) => {
            cli::insights::platforms_breakdown(&service).await
        }
        AppCommand::Crypto(id) => cli::insights::crypto(&service, &id).await,
        AppCommand::Platform(id) => cli::insights::platform(&service, &id).await,
        AppCommand::Cryptos {
            page,
            sort_by,
            direction,
        } => cli::insights::cryptos(&service, page, sort_by, direction).await,
        AppCommand::Holding(HoldingCommand::Add {
            crypto_id,
            platform_id,
            quantity,
        }) => cli::holdings::add(&service, &crypto_id, &platform_id, quantity).await,
        AppCommand::Holding(HoldingCommand::Update { id, quantity }) => {
            cli::holdings::update(&service, &id, quantity).await
        }
        AppCommand::Holding(HoldingCommand::Remove { id }) => {
            cli::holdings::remove(&service, &id).await
        }
        AppCommand::Holding(HoldingCommand::List) => cli::holdings::list(&service).await,
        AppCommand::Transfer(request) => cli::transfer::run(&service, &request).await,
    }
}
