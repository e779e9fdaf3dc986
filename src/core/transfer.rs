//! Moves a holding's balance from one platform to another.
//!
//! The engine reads the source holding and whatever the destination already
//! holds of the same crypto, then hands back the exact set of holdings the
//! caller has to write. It never persists anything itself.

use crate::core::error::{EngineError, Result};
use crate::core::model::{Holding, HoldingId};
use crate::core::ports::{HoldingsBatch, HoldingsStore, PlatformDirectory};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source_holding_id: HoldingId,
    pub destination_platform_id: String,
    pub quantity_to_transfer: Decimal,
    pub network_fee: Decimal,
    /// When set, the fee is taken from the source on top of the transferred
    /// quantity and the destination receives the full quantity. Otherwise the
    /// fee is deducted from what the destination receives.
    pub send_full_quantity: bool,
}

/// The holdings a transfer produces, one variant per combination of
/// "source keeps a remainder" and "destination already holds this crypto".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEffect {
    PartialToExisting {
        source: Holding,
        destination: Holding,
    },
    PartialToNew {
        source: Holding,
        destination: Holding,
    },
    FullToExisting {
        removed_source: Holding,
        destination: Holding,
    },
    /// The source holding itself moves to the destination platform, keeping its id.
    FullToNew { moved: Holding },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub remaining_at_source: Decimal,
    pub quantity_credited: Decimal,
    pub destination_quantity: Decimal,
    pub fee: Decimal,
    pub effect: LedgerEffect,
}

impl TransferOutcome {
    /// Id of the holding that now sits at the destination platform.
    pub fn destination_holding_id(&self) -> &str {
        match &self.effect {
            LedgerEffect::PartialToExisting { destination, .. }
            | LedgerEffect::PartialToNew { destination, .. }
            | LedgerEffect::FullToExisting { destination, .. } => &destination.id,
            LedgerEffect::FullToNew { moved } => &moved.id,
        }
    }

    /// The writes that must be applied atomically to realise this transfer.
    pub fn batch(&self) -> HoldingsBatch {
        match &self.effect {
            LedgerEffect::PartialToExisting {
                source,
                destination,
            }
            | LedgerEffect::PartialToNew {
                source,
                destination,
            } => HoldingsBatch {
                upserts: vec![source.clone(), destination.clone()],
                deletes: Vec::new(),
            },
            LedgerEffect::FullToExisting {
                removed_source,
                destination,
            } => HoldingsBatch {
                upserts: vec![destination.clone()],
                deletes: vec![removed_source.clone()],
            },
            LedgerEffect::FullToNew { moved } => HoldingsBatch {
                upserts: vec![moved.clone()],
                deletes: Vec::new(),
            },
        }
    }
}

/// Decides the outcome of a transfer from already loaded holdings.
///
/// `destination` is the holding of the same crypto at the destination platform,
/// if there is one.
pub fn plan_transfer(
    source: &Holding,
    destination: Option<&Holding>,
    request: &TransferRequest,
) -> Result<TransferOutcome> {
    let quantity = request.quantity_to_transfer;
    let fee = request.network_fee;

    if quantity <= Decimal::ZERO {
        return Err(EngineError::Validation(format!(
            "quantity to transfer must be positive, got {quantity}"
        )));
    }
    if fee < Decimal::ZERO {
        return Err(EngineError::Validation(format!(
            "network fee must not be negative, got {fee}"
        )));
    }
    if !request.send_full_quantity && fee >= quantity {
        return Err(EngineError::Validation(format!(
            "network fee {fee} leaves nothing to credit from {quantity}"
        )));
    }

    if request.destination_platform_id == source.platform_id {
        return Err(EngineError::SamePlatform {
            platform_id: source.platform_id.clone(),
        });
    }

    let available = source.quantity;
    let total_to_subtract = if request.send_full_quantity {
        quantity + fee
    } else {
        quantity
    };
    if total_to_subtract > available {
        return Err(EngineError::InsufficientBalance {
            requested: total_to_subtract,
            available,
        });
    }

    let remaining_at_source = available - total_to_subtract;
    let quantity_credited = if request.send_full_quantity {
        quantity
    } else {
        quantity - fee
    };

    let effect = match (remaining_at_source > Decimal::ZERO, destination) {
        (true, Some(existing)) => LedgerEffect::PartialToExisting {
            source: with_quantity(source, remaining_at_source),
            destination: with_quantity(existing, existing.quantity + quantity_credited),
        },
        (true, None) => LedgerEffect::PartialToNew {
            source: with_quantity(source, remaining_at_source),
            destination: Holding::new(
                &source.crypto_id,
                &request.destination_platform_id,
                quantity_credited,
            ),
        },
        (false, Some(existing)) => LedgerEffect::FullToExisting {
            removed_source: source.clone(),
            destination: with_quantity(existing, existing.quantity + quantity_credited),
        },
        (false, None) => LedgerEffect::FullToNew {
            moved: Holding {
                platform_id: request.destination_platform_id.clone(),
                ..with_quantity(source, quantity_credited)
            },
        },
    };

    let destination_quantity = destination.map_or(Decimal::ZERO, |d| d.quantity) + quantity_credited;
    debug!(
        %remaining_at_source,
        %quantity_credited,
        %destination_quantity,
        "Planned transfer"
    );

    Ok(TransferOutcome {
        remaining_at_source,
        quantity_credited,
        destination_quantity,
        fee,
        effect,
    })
}

fn with_quantity(holding: &Holding, quantity: Decimal) -> Holding {
    Holding {
        quantity,
        ..holding.clone()
    }
}

/// Loads the holdings a transfer touches and plans it.
pub struct TransferLedgerEngine {
    holdings: Arc<dyn HoldingsStore>,
    platforms: Arc<dyn PlatformDirectory>,
}

impl TransferLedgerEngine {
    pub fn new(holdings: Arc<dyn HoldingsStore>, platforms: Arc<dyn PlatformDirectory>) -> Self {
        Self {
            holdings,
            platforms,
        }
    }

    #[instrument(
        name = "Transfer",
        skip(self, request),
        fields(source = %request.source_holding_id, destination = %request.destination_platform_id)
    )]
    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        let source = self
            .holdings
            .find(&request.source_holding_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Holding", &request.source_holding_id))?;

        if request.destination_platform_id == source.platform_id {
            return Err(EngineError::SamePlatform {
                platform_id: source.platform_id,
            });
        }

        let platform = self.platforms.by_id(&request.destination_platform_id).await?;
        let destination = self
            .holdings
            .find_by_crypto_and_platform(&source.crypto_id, &platform.id)
            .await?;
        debug!(
            existing_destination = destination.is_some(),
            "Loaded transfer holdings"
        );

        plan_transfer(&source, destination.as_ref(), request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn holding(id: &str, platform: &str, quantity: Decimal) -> Holding {
        Holding {
            id: id.to_string(),
            crypto_id: "bitcoin".to_string(),
            quantity,
            platform_id: platform.to_string(),
            version: 3,
        }
    }

    fn request(quantity: Decimal, fee: Decimal, send_full_quantity: bool) -> TransferRequest {
        TransferRequest {
            source_holding_id: "src".to_string(),
            destination_platform_id: "ledger".to_string(),
            quantity_to_transfer: quantity,
            network_fee: fee,
            send_full_quantity,
        }
    }

    fn assert_conserved(source: &Holding, outcome: &TransferOutcome) {
        assert_eq!(
            outcome.remaining_at_source + outcome.quantity_credited + outcome.fee,
            source.quantity
        );
        assert!(outcome.remaining_at_source >= Decimal::ZERO);
    }

    #[test]
    fn test_send_full_quantity_to_new_platform() {
        let source = holding("src", "binance", dec!(2.375321283));
        let outcome = plan_transfer(&source, None, &request(dec!(0.51), dec!(0.0005), true)).unwrap();

        assert_eq!(outcome.remaining_at_source, dec!(1.864821283));
        assert_eq!(outcome.quantity_credited, dec!(0.51));
        assert_eq!(outcome.destination_quantity, dec!(0.51));
        assert_conserved(&source, &outcome);

        match &outcome.effect {
            LedgerEffect::PartialToNew {
                source: updated,
                destination,
            } => {
                assert_eq!(updated.id, "src");
                assert_eq!(updated.quantity, dec!(1.864821283));
                assert_eq!(updated.version, 3);
                assert_ne!(destination.id, "src");
                assert_eq!(destination.platform_id, "ledger");
                assert_eq!(destination.crypto_id, "bitcoin");
                assert_eq!(destination.quantity, dec!(0.51));
                assert_eq!(destination.version, 0);
            }
            other => panic!("Expected PartialToNew, got {other:?}"),
        }
        assert_eq!(outcome.batch().upserts.len(), 2);
        assert!(outcome.batch().deletes.is_empty());
    }

    #[test]
    fn test_fee_deducted_from_credited_side() {
        let source = holding("src", "binance", dec!(2.375321283));
        let outcome =
            plan_transfer(&source, None, &request(dec!(0.51), dec!(0.0005), false)).unwrap();

        assert_eq!(outcome.remaining_at_source, dec!(1.865321283));
        assert_eq!(outcome.quantity_credited, dec!(0.5095));
        assert_conserved(&source, &outcome);
    }

    #[test]
    fn test_partial_to_existing_destination() {
        let source = holding("src", "binance", dec!(1));
        let existing = holding("dst", "ledger", dec!(0.25));
        let outcome = plan_transfer(
            &source,
            Some(&existing),
            &request(dec!(0.5), dec!(0.1), false),
        )
        .unwrap();

        assert_eq!(outcome.destination_quantity, dec!(0.65));
        assert_conserved(&source, &outcome);
        assert_eq!(
            outcome.effect,
            LedgerEffect::PartialToExisting {
                source: holding("src", "binance", dec!(0.5)),
                destination: holding("dst", "ledger", dec!(0.65)),
            }
        );
        assert_eq!(outcome.destination_holding_id(), "dst");
    }

    #[test]
    fn test_full_to_existing_destination_removes_source() {
        let source = holding("src", "binance", dec!(1.5));
        let existing = holding("dst", "ledger", dec!(2));
        let outcome =
            plan_transfer(&source, Some(&existing), &request(dec!(1.4), dec!(0.1), true)).unwrap();

        assert_eq!(outcome.remaining_at_source, Decimal::ZERO);
        assert_conserved(&source, &outcome);
        assert_eq!(
            outcome.effect,
            LedgerEffect::FullToExisting {
                removed_source: source.clone(),
                destination: holding("dst", "ledger", dec!(3.4)),
            }
        );
        let batch = outcome.batch();
        assert_eq!(batch.deletes, vec![source]);
        assert_eq!(batch.upserts.len(), 1);
    }

    #[test]
    fn test_full_to_new_destination_reuses_source_holding() {
        let source = holding("src", "binance", dec!(1.5));
        let outcome = plan_transfer(&source, None, &request(dec!(1.5), dec!(0.01), false)).unwrap();

        assert_eq!(outcome.remaining_at_source, Decimal::ZERO);
        assert_conserved(&source, &outcome);
        assert_eq!(
            outcome.effect,
            LedgerEffect::FullToNew {
                moved: holding("src", "ledger", dec!(1.49)),
            }
        );
        assert_eq!(outcome.destination_holding_id(), "src");
    }

    #[test]
    fn test_insufficient_balance() {
        let source = holding("src", "binance", dec!(1));
        let result = plan_transfer(&source, None, &request(dec!(1), dec!(0.0001), true));
        assert_eq!(
            result,
            Err(EngineError::InsufficientBalance {
                requested: dec!(1.0001),
                available: dec!(1),
            })
        );

        // The same amount fits when the fee comes out of the credited side
        assert!(plan_transfer(&source, None, &request(dec!(1), dec!(0.0001), false)).is_ok());
    }

    #[test]
    fn test_same_platform_rejected() {
        let source = holding("src", "ledger", dec!(1));
        assert_eq!(
            plan_transfer(&source, None, &request(dec!(0.5), dec!(0), true)),
            Err(EngineError::SamePlatform {
                platform_id: "ledger".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_quantities_rejected() {
        let source = holding("src", "binance", dec!(1));
        for req in [
            request(dec!(0), dec!(0), true),
            request(dec!(0.5), dec!(-0.1), true),
            request(dec!(0.5), dec!(0.5), false),
        ] {
            assert!(matches!(
                plan_transfer(&source, None, &req),
                Err(EngineError::Validation(_))
            ));
        }
    }
}
