use super::ui;
use crate::core::insights::{
    CryptoInsights, CryptosBreakdown, CryptosPage, PlatformInsights, PlatformsBreakdown,
    PortfolioOverview, SortBy, SortDirection,
};
use crate::core::model::{InsightRow, MultiCurrencyBalance};
use crate::core::service::PortfolioService;
use anyhow::Result;
use comfy_table::Cell;

const NO_HOLDINGS: &str = "No holdings to show. Add one with `cryptofolio holding add`.";

fn rows_table(first_column: &str, rows: &[InsightRow]) -> String {
    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell(first_column), ui::header_cell("Quantity")];
    header.extend(ui::balance_headers());
    header.push(ui::header_cell("Share"));
    table.set_header(header);

    for row in rows {
        let mut cells = vec![
            Cell::new(&row.label),
            ui::format_optional_cell(row.quantity, |q| q.to_string()),
        ];
        cells.extend(ui::balance_cells(&row.balances));
        cells.push(ui::percentage_cell(row.percentage));
        table.add_row(cells);
    }
    table.to_string()
}

fn total_line(label: &str, balances: &MultiCurrencyBalance) -> String {
    format!(
        "{} {}",
        ui::style_text(label, ui::StyleType::TotalLabel),
        ui::style_text(&ui::format_balances(balances), ui::StyleType::TotalValue)
    )
}

impl CryptosBreakdown {
    pub fn display_as_table(&self) -> String {
        format!(
            "{}\n{}",
            rows_table("Crypto", &self.cryptos),
            total_line("Total:", &self.balances)
        )
    }
}

impl PlatformsBreakdown {
    pub fn display_as_table(&self) -> String {
        format!(
            "{}\n{}",
            rows_table("Platform", &self.platforms),
            total_line("Total:", &self.balances)
        )
    }
}

impl CryptoInsights {
    pub fn display_as_table(&self) -> String {
        format!(
            "{} ({})\n{}\n{}",
            ui::style_text(&self.crypto.name, ui::StyleType::Title),
            self.crypto.symbol.to_uppercase(),
            rows_table("Platform", &self.platforms),
            total_line(&format!("Total ({}):", self.quantity), &self.balances)
        )
    }
}

impl PlatformInsights {
    pub fn display_as_table(&self) -> String {
        format!(
            "{}\n{}\n{}",
            ui::style_text(&self.platform.name, ui::StyleType::Title),
            rows_table("Crypto", &self.cryptos),
            total_line("Total:", &self.balances)
        )
    }
}

impl CryptosPage {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Crypto"),
            ui::header_cell("Price (USD)"),
            ui::header_cell("24h"),
            ui::header_cell("7d"),
            ui::header_cell("30d"),
            ui::header_cell("Max Supply"),
            ui::header_cell("Quantity"),
            ui::header_cell("Value (USD)"),
            ui::header_cell("Share"),
            ui::header_cell("Platforms"),
        ]);

        for row in &self.cryptos {
            table.add_row(vec![
                Cell::new(format!(
                    "{} ({})",
                    row.snapshot.name,
                    row.snapshot.symbol.to_uppercase()
                )),
                ui::amount_cell(row.snapshot.usd),
                ui::change_cell(row.snapshot.change_24h),
                ui::change_cell(row.snapshot.change_7d),
                ui::change_cell(row.snapshot.change_30d),
                ui::format_optional_cell(row.snapshot.max_supply, |s| s.to_string()),
                ui::amount_cell(row.quantity),
                ui::amount_cell(row.balances.usd),
                ui::percentage_cell(row.percentage),
                Cell::new(row.platforms.join(", ")),
            ]);
        }

        let footer = if self.has_next_page {
            format!(
                "Page {} of {} (next: --page {})",
                self.page + 1,
                self.total_pages,
                self.page + 2
            )
        } else {
            format!("Page {} of {}", self.page + 1, self.total_pages)
        };
        format!(
            "{table}\n{}\n{}",
            ui::style_text(&footer, ui::StyleType::Subtle),
            total_line("Total:", &self.balances)
        )
    }
}

impl PortfolioOverview {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        let mut header = vec![ui::header_cell("")];
        header.extend(ui::balance_headers());
        header.push(ui::header_cell("24h"));
        table.set_header(header);

        let mut total = vec![Cell::new("Portfolio")];
        total.extend(ui::balance_cells(&self.balances));
        total.push(Cell::new(""));
        table.add_row(total);

        let gainer = &self.top_gainer;
        let mut row = vec![Cell::new(format!(
            "Top gainer: {} ({})",
            gainer.crypto.name,
            gainer.crypto.symbol.to_uppercase()
        ))];
        row.extend(ui::balance_cells(&gainer.balances));
        row.push(ui::change_cell(gainer.change_24h));
        table.add_row(row);

        table.to_string()
    }
}

fn print_view(view: Option<String>) {
    match view {
        Some(table) => println!("{table}"),
        None => println!("{}", ui::style_text(NO_HOLDINGS, ui::StyleType::Subtle)),
    }
}

pub async fn overview(service: &PortfolioService) -> Result<()> {
    let spinner = ui::new_spinner("Fetching prices...");
    let view = service.overview().await;
    spinner.finish_and_clear();
    print_view(view?.map(|v| v.display_as_table()));
    Ok(())
}

pub async fn cryptos_breakdown(service: &PortfolioService) -> Result<()> {
    let spinner = ui::new_spinner("Calculating allocation...");
    let view = service.cryptos_breakdown().await;
    spinner.finish_and_clear();
    print_view(view?.map(|v| v.display_as_table()));
    Ok(())
}

pub async fn platforms_breakdown(service: &PortfolioService) -> Result<()> {
    let spinner = ui::new_spinner("Calculating allocation...");
    let view = service.platforms_breakdown().await;
    spinner.finish_and_clear();
    print_view(view?.map(|v| v.display_as_table()));
    Ok(())
}

pub async fn crypto(service: &PortfolioService, crypto_id: &str) -> Result<()> {
    let spinner = ui::new_spinner("Fetching prices...");
    let view = service.crypto_insights(crypto_id).await;
    spinner.finish_and_clear();
    print_view(view?.map(|v| v.display_as_table()));
    Ok(())
}

pub async fn platform(service: &PortfolioService, platform_id: &str) -> Result<()> {
    let spinner = ui::new_spinner("Fetching prices...");
    let view = service.platform_insights(platform_id).await;
    spinner.finish_and_clear();
    print_view(view?.map(|v| v.display_as_table()));
    Ok(())
}

pub async fn cryptos(
    service: &PortfolioService,
    page: usize,
    sort_by: SortBy,
    direction: SortDirection,
) -> Result<()> {
    let spinner = ui::new_spinner("Fetching prices...");
    let view = service.cryptos_page(page, sort_by, direction).await;
    spinner.finish_and_clear();
    print_view(view?.map(|v| v.display_as_table()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::insights::{CryptoInfo, OTHERS_ID, OTHERS_LABEL, TopGainer};
    use rust_decimal_macros::dec;

    fn balances(usd: rust_decimal::Decimal) -> MultiCurrencyBalance {
        MultiCurrencyBalance {
            usd,
            eur: usd,
            btc: dec!(0.1),
        }
    }

    #[test]
    fn test_breakdown_table_lists_rows_and_total() {
        let breakdown = CryptosBreakdown {
            balances: balances(dec!(8450.00)),
            cryptos: vec![
                InsightRow {
                    id: "bitcoin".to_string(),
                    label: "Bitcoin".to_string(),
                    quantity: Some(dec!(0.2)),
                    balances: balances(dec!(6000.00)),
                    percentage: 71.01,
                },
                InsightRow {
                    id: OTHERS_ID.to_string(),
                    label: OTHERS_LABEL.to_string(),
                    quantity: None,
                    balances: balances(dec!(2450.00)),
                    percentage: 28.99,
                },
            ],
        };

        let output = breakdown.display_as_table();
        assert!(output.contains("Bitcoin"));
        assert!(output.contains("71.01%"));
        assert!(output.contains("Others"));
        assert!(output.contains("N/A"));
        assert!(output.contains("8450.00"));
    }

    #[test]
    fn test_overview_table_shows_top_gainer() {
        let overview = PortfolioOverview {
            balances: balances(dec!(100.00)),
            top_gainer: TopGainer {
                crypto: CryptoInfo {
                    id: "ethereum".to_string(),
                    name: "Ethereum".to_string(),
                    symbol: "eth".to_string(),
                },
                change_24h: dec!(5.5),
                balances: balances(dec!(40.00)),
            },
        };

        let output = overview.display_as_table();
        assert!(output.contains("Top gainer: Ethereum (ETH)"));
        assert!(output.contains("5.50%"));
    }

    #[test]
    fn test_page_footer_points_to_next_page() {
        let page = CryptosPage {
            page: 0,
            total_pages: 2,
            has_next_page: true,
            balances: balances(dec!(1.00)),
            cryptos: Vec::new(),
        };
        assert!(page.display_as_table().contains("Page 1 of 2 (next: --page 2)"));
    }
}
