//! Multi-currency valuation of crypto quantities.
//!
//! Fiat amounts are rounded per item (half-up, 2 decimals) and then summed, so
//! every displayed row adds up to the displayed total. BTC amounts are summed
//! at full precision and rounded once (half-to-even, 12 decimals) to avoid
//! accumulating error over many small holdings.

use crate::core::model::{MultiCurrencyBalance, PriceSnapshot};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;

const FIAT_SCALE: u32 = 2;
const BTC_SCALE: u32 = 12;

pub(crate) fn round_fiat(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(FIAT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(FIAT_SCALE);
    rounded
}

pub(crate) fn round_btc(amount: Decimal) -> Decimal {
    amount
        .round_dp_with_strategy(BTC_SCALE, RoundingStrategy::MidpointNearestEven)
        .normalize()
}

/// Total value of `quantities` (keyed by crypto id) priced with `snapshots`.
///
/// Snapshots without a matching quantity do not contribute.
pub fn total_balances(
    snapshots: &[PriceSnapshot],
    quantities: &HashMap<String, Decimal>,
) -> MultiCurrencyBalance {
    let priced: Vec<(&PriceSnapshot, Decimal)> = snapshots
        .iter()
        .filter_map(|snapshot| quantities.get(&snapshot.id).map(|q| (snapshot, *q)))
        .collect();

    let (usd, eur) = priced
        .iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(usd, eur), (snapshot, quantity)| {
            (
                usd + round_fiat(snapshot.usd * quantity),
                eur + round_fiat(snapshot.eur * quantity),
            )
        });

    let btc = priced
        .iter()
        .fold(Decimal::ZERO, |btc, (snapshot, quantity)| btc + snapshot.btc * quantity);

    MultiCurrencyBalance {
        usd: round_fiat(usd),
        eur: round_fiat(eur),
        btc: round_btc(btc),
    }
}

/// Whole of a view whose rows were valued separately.
///
/// Fiat is the sum of the rows' rounded amounts, so every row's share stays
/// within the whole. `btc` is the view's unrounded BTC value, rounded once here.
pub fn rows_total<'a>(
    rows: impl IntoIterator<Item = &'a MultiCurrencyBalance>,
    btc: Decimal,
) -> MultiCurrencyBalance {
    let (usd, eur) = rows
        .into_iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(usd, eur), row| {
            (usd + row.usd, eur + row.eur)
        });

    MultiCurrencyBalance {
        usd: round_fiat(usd),
        eur: round_fiat(eur),
        btc: round_btc(btc),
    }
}

/// Value of a single quantity of one crypto.
pub fn single_balance(snapshot: &PriceSnapshot, quantity: Decimal) -> MultiCurrencyBalance {
    MultiCurrencyBalance {
        usd: round_fiat(snapshot.usd * quantity),
        eur: round_fiat(snapshot.eur * quantity),
        btc: round_btc(snapshot.btc * quantity),
    }
}
