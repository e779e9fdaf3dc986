use super::ui;
use crate::core::service::PortfolioService;
use crate::core::transfer::{LedgerEffect, TransferOutcome, TransferRequest};
use anyhow::{Context, Result};
use comfy_table::Cell;

impl TransferOutcome {
    pub fn display_as_table(&self) -> String {
        let action = match &self.effect {
            LedgerEffect::PartialToExisting { .. } => "Credited existing holding",
            LedgerEffect::PartialToNew { .. } => "Created holding at destination",
            LedgerEffect::FullToExisting { .. } => "Merged into existing holding, source removed",
            LedgerEffect::FullToNew { .. } => "Moved holding to destination",
        };

        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Transfer"), ui::header_cell("Quantity")]);
        table.add_row(vec![
            Cell::new("Remaining at source"),
            ui::amount_cell(self.remaining_at_source),
        ]);
        table.add_row(vec![Cell::new("Network fee"), ui::amount_cell(self.fee)]);
        table.add_row(vec![
            Cell::new("Credited"),
            ui::amount_cell(self.quantity_credited),
        ]);
        table.add_row(vec![
            Cell::new("Now at destination"),
            ui::amount_cell(self.destination_quantity),
        ]);

        format!(
            "{}\n{table}\n{}",
            ui::style_text(action, ui::StyleType::Title),
            ui::style_text(
                &format!("Destination holding: {}", self.destination_holding_id()),
                ui::StyleType::Subtle
            )
        )
    }
}

pub async fn run(service: &PortfolioService, request: &TransferRequest) -> Result<()> {
    let outcome = service.transfer(request).await.with_context(|| {
        format!(
            "Failed to transfer from holding {} to {}",
            request.source_holding_id, request.destination_platform_id
        )
    })?;
    println!("{}", outcome.display_as_table());
    Ok(())
}
