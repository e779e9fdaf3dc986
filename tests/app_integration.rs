use cryptofolio::core::config::AppConfig;
use cryptofolio::core::insights::{SortBy, SortDirection};
use cryptofolio::core::ports::{CacheInvalidator, CacheScope};
use cryptofolio::core::transfer::{LedgerEffect, TransferRequest};
use cryptofolio::{AllocationBy, AppCommand, HoldingCommand};
use rust_decimal_macros::dec;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tracing::info;

mod test_utils {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_coingecko_mock_server() -> MockServer {
        let mock_server = MockServer::start().await;
        let responses = [
            (
                "usd",
                r#"[{"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 60000.0,
                     "circulating_supply": 19700000.0, "max_supply": 21000000.0,
                     "price_change_percentage_24h": 1.5,
                     "price_change_percentage_7d_in_currency": 3.0,
                     "price_change_percentage_30d_in_currency": -2.0},
                    {"id": "ethereum", "symbol": "eth", "name": "Ethereum", "current_price": 3000.0,
                     "circulating_supply": 120000000.0, "max_supply": null,
                     "price_change_percentage_24h": 4.0}]"#,
            ),
            (
                "eur",
                r#"[{"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 55000.0},
                    {"id": "ethereum", "symbol": "eth", "name": "Ethereum", "current_price": 2750.0}]"#,
            ),
            (
                "btc",
                r#"[{"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 1.0},
                    {"id": "ethereum", "symbol": "eth", "name": "Ethereum", "current_price": 0.05}]"#,
            ),
        ];

        for (vs_currency, body) in responses {
            Mock::given(method("GET"))
                .and(path("/api/v3/coins/markets"))
                .and(query_param("vs_currency", vs_currency))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&mock_server)
                .await;
        }
        mock_server
    }
}

const PLATFORMS: &str = r#"
platforms:
  - id: binance
    name: Binance
  - id: ledger
    name: Ledger
"#;

fn write_config(dir: &TempDir, body: &str) -> String {
    let data_path = dir.path().join("data");
    let config_path = dir.path().join("config.yaml");
    let content = format!("{PLATFORMS}{body}\ndata_path: {}\n", data_path.display());
    fs::write(&config_path, content).expect("Failed to write config file");
    config_path.to_str().unwrap().to_string()
}

fn static_prices_config(dir: &TempDir) -> String {
    write_config(
        dir,
        r#"
prices:
  - id: bitcoin
    name: Bitcoin
    symbol: btc
    usd: 30000
    eur: 27000
    btc: 1
    change_24h: 1.2
  - id: ethereum
    name: Ethereum
    symbol: eth
    usd: 2000
    eur: 1800
    btc: 0.0666666
    change_24h: 5.5
"#,
    )
}

async fn run(command: AppCommand, config_path: &str) {
    let result = cryptofolio::run_command(command, Some(config_path)).await;
    assert!(result.is_ok(), "Command failed with: {:?}", result.err());
}

fn load(config_path: &str) -> AppConfig {
    AppConfig::load_from_path(Path::new(config_path)).unwrap()
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_static_prices() {
    let dir = TempDir::new().unwrap();
    let config_path = static_prices_config(&dir);

    // Views on an empty portfolio print a hint instead of failing
    run(AppCommand::Overview, &config_path).await;

    run(
        AppCommand::Holding(HoldingCommand::Add {
            crypto_id: "bitcoin".to_string(),
            platform_id: "binance".to_string(),
            quantity: dec!(2.375321283),
        }),
        &config_path,
    )
    .await;
    run(
        AppCommand::Holding(HoldingCommand::Add {
            crypto_id: "ethereum".to_string(),
            platform_id: "ledger".to_string(),
            quantity: dec!(3),
        }),
        &config_path,
    )
    .await;

    let service = cryptofolio::build_service(&load(&config_path)).unwrap();
    let holdings = service.holdings().await.unwrap();
    assert_eq!(holdings.len(), 2);
    let bitcoin = holdings
        .iter()
        .find(|h| h.crypto_id == "bitcoin")
        .unwrap()
        .clone();
    // Release the fjall keyspace before the next command reopens it
    drop(service);

    run(
        AppCommand::Transfer(TransferRequest {
            source_holding_id: bitcoin.id.clone(),
            destination_platform_id: "ledger".to_string(),
            quantity_to_transfer: dec!(0.51),
            network_fee: dec!(0.0005),
            send_full_quantity: true,
        }),
        &config_path,
    )
    .await;

    for command in [
        AppCommand::Overview,
        AppCommand::Allocation(AllocationBy::Crypto),
        AppCommand::Allocation(AllocationBy::Platform),
        AppCommand::Crypto("bitcoin".to_string()),
        AppCommand::Platform("ledger".to_string()),
        AppCommand::Cryptos {
            page: 0,
            sort_by: SortBy::Change24h,
            direction: SortDirection::Descending,
        },
        AppCommand::Holding(HoldingCommand::List),
    ] {
        info!(?command, "Running command");
        run(command, &config_path).await;
    }

    let service = cryptofolio::build_service(&load(&config_path)).unwrap();
    let insights = service.crypto_insights("bitcoin").await.unwrap().unwrap();
    assert_eq!(insights.quantity, dec!(2.374821283));
    assert_eq!(insights.platforms.len(), 2);
    let source = service
        .holdings()
        .await
        .unwrap()
        .into_iter()
        .find(|h| h.id == bitcoin.id)
        .unwrap();
    assert_eq!(source.quantity, dec!(1.864821283));
}

#[test_log::test(tokio::test)]
async fn test_full_transfer_merges_into_existing_holding() {
    let dir = TempDir::new().unwrap();
    let config_path = static_prices_config(&dir);
    let service = cryptofolio::build_service(&load(&config_path)).unwrap();

    let source = service
        .add_holding("ethereum", "binance", dec!(1.5))
        .await
        .unwrap();
    let destination = service
        .add_holding("ethereum", "ledger", dec!(0.5))
        .await
        .unwrap();

    let outcome = service
        .transfer(&TransferRequest {
            source_holding_id: source.id.clone(),
            destination_platform_id: "ledger".to_string(),
            quantity_to_transfer: dec!(1.5),
            network_fee: dec!(0.01),
            send_full_quantity: false,
        })
        .await
        .unwrap();

    assert!(matches!(outcome.effect, LedgerEffect::FullToExisting { .. }));
    let holdings = service.holdings().await.unwrap();
    assert_eq!(holdings.len(), 1);
    assert_eq!(holdings[0].id, destination.id);
    assert_eq!(holdings[0].quantity, dec!(1.99));
}

#[test_log::test(tokio::test)]
async fn test_failed_command_reports_error() {
    let dir = TempDir::new().unwrap();
    let config_path = static_prices_config(&dir);

    let result = cryptofolio::run_command(
        AppCommand::Holding(HoldingCommand::Add {
            crypto_id: "bitcoin".to_string(),
            platform_id: "kraken".to_string(),
            quantity: dec!(1),
        }),
        Some(&config_path),
    )
    .await;

    let error = result.unwrap_err();
    assert!(format!("{error:#}").contains("Platform not found: kraken"));
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_coingecko_mock() {
    let mock_server = test_utils::create_coingecko_mock_server().await;
    let dir = TempDir::new().unwrap();
    let config_path = write_config(
        &dir,
        &format!(
            r#"
providers:
  coingecko:
    base_url: {}
    cache_ttl_secs: 60
"#,
            mock_server.uri()
        ),
    );

    let service = cryptofolio::build_service(&load(&config_path)).unwrap();
    service
        .add_holding("bitcoin", "binance", dec!(0.1))
        .await
        .unwrap();
    service
        .add_holding("ethereum", "ledger", dec!(2))
        .await
        .unwrap();

    let overview = service.overview().await.unwrap().unwrap();
    assert_eq!(overview.balances.usd, dec!(12000.00));
    assert_eq!(overview.balances.eur, dec!(11000.00));
    assert_eq!(overview.balances.btc, dec!(0.2));
    assert_eq!(overview.top_gainer.crypto.id, "ethereum");

    let breakdown = service.platforms_breakdown().await.unwrap().unwrap();
    assert_eq!(breakdown.platforms[0].id, "binance");
    assert_eq!(breakdown.platforms[0].percentage, 50.0);
    assert_eq!(breakdown.platforms[1].id, "ledger");

    // Prices come from the cache until it is invalidated
    let requests_before = mock_server.received_requests().await.unwrap().len();
    service.cryptos_breakdown().await.unwrap();
    assert_eq!(
        mock_server.received_requests().await.unwrap().len(),
        requests_before
    );

    service.invalidate(CacheScope::PriceSnapshots).await;
    service.invalidate(CacheScope::Insights).await;
    service.cryptos_breakdown().await.unwrap();
    assert!(mock_server.received_requests().await.unwrap().len() > requests_before);
    drop(service);

    run(
        AppCommand::Cryptos {
            page: 0,
            sort_by: SortBy::MaxSupply,
            direction: SortDirection::Ascending,
        },
        &config_path,
    )
    .await;
}
