use super::ui;
use crate::core::model::{Holding, Platform};
use crate::core::service::PortfolioService;
use anyhow::{Context, Result};
use comfy_table::Cell;
use rust_decimal::Decimal;
use std::collections::HashMap;

fn holdings_table(holdings: &[Holding], platforms: &[Platform]) -> String {
    let names: HashMap<&str, &str> = platforms
        .iter()
        .map(|p| (p.id.as_str(), p.name.as_str()))
        .collect();

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Id"),
        ui::header_cell("Crypto"),
        ui::header_cell("Platform"),
        ui::header_cell("Quantity"),
    ]);
    for holding in holdings {
        table.add_row(vec![
            Cell::new(ui::style_text(&holding.id, ui::StyleType::Subtle)),
            Cell::new(&holding.crypto_id),
            Cell::new(
                names
                    .get(holding.platform_id.as_str())
                    .copied()
                    .unwrap_or(holding.platform_id.as_str()),
            ),
            ui::amount_cell(holding.quantity),
        ]);
    }
    table.to_string()
}

pub async fn list(service: &PortfolioService) -> Result<()> {
    let holdings = service.holdings().await?;
    if holdings.is_empty() {
        println!(
            "{}",
            ui::style_text("No holdings recorded yet.", ui::StyleType::Subtle)
        );
        return Ok(());
    }
    let platforms = service.platforms().await?;
    println!("{}", holdings_table(&holdings, &platforms));
    Ok(())
}

pub async fn add(
    service: &PortfolioService,
    crypto_id: &str,
    platform_id: &str,
    quantity: Decimal,
) -> Result<()> {
    let holding = service
        .add_holding(crypto_id, platform_id, quantity)
        .await
        .with_context(|| format!("Failed to add {crypto_id} on {platform_id}"))?;
    println!(
        "Added {} {} on {} ({})",
        holding.quantity,
        holding.crypto_id,
        holding.platform_id,
        ui::style_text(&holding.id, ui::StyleType::Subtle)
    );
    Ok(())
}

pub async fn update(service: &PortfolioService, id: &str, quantity: Decimal) -> Result<()> {
    let holding = service
        .update_holding(id, quantity)
        .await
        .with_context(|| format!("Failed to update holding {id}"))?;
    println!(
        "Updated {} on {} to {}",
        holding.crypto_id, holding.platform_id, holding.quantity
    );
    Ok(())
}

pub async fn remove(service: &PortfolioService, id: &str) -> Result<()> {
    service
        .remove_holding(id)
        .await
        .with_context(|| format!("Failed to remove holding {id}"))?;
    println!("Removed holding {id}");
    Ok(())
}
