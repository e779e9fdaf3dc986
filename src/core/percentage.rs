use crate::core::error::{EngineError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Share of `part` in `whole`, as a percentage rounded half-up to 2 decimals.
pub fn percentage(part: Decimal, whole: Decimal) -> Result<f64> {
    if whole.is_zero() {
        return Err(EngineError::DivisionByZero);
    }

    let share = (part * Decimal::ONE_HUNDRED / whole)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    share.to_f64().ok_or(EngineError::DivisionByZero)
}
