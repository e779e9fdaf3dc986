pub mod disk;
pub mod memory;

use crate::core::error::{EngineError, Result};
use crate::core::model::{Holding, HoldingId};
use crate::core::ports::HoldingsBatch;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Applies `batch` to a copy of `stored` and returns the resulting holdings.
///
/// Fails without touching `stored` when a version does not match, a deleted
/// holding is missing, or two holdings would share a (crypto, platform) pair.
/// Written holdings come out with their version incremented.
pub(crate) fn apply_batch(
    stored: &BTreeMap<HoldingId, Holding>,
    batch: &HoldingsBatch,
) -> Result<BTreeMap<HoldingId, Holding>> {
    let mut next = stored.clone();

    for holding in &batch.deletes {
        match stored.get(&holding.id) {
            Some(current) if current.version == holding.version => {
                next.remove(&holding.id);
            }
            Some(_) => return Err(EngineError::Conflict { id: holding.id.clone() }),
            None => return Err(EngineError::not_found("Holding", holding.id.as_str())),
        }
    }

    for holding in &batch.upserts {
        let stored_version = stored.get(&holding.id).map(|h| h.version).unwrap_or(0);
        if stored_version != holding.version {
            debug!(
                id = %holding.id,
                expected = holding.version,
                found = stored_version,
                "Version mismatch"
            );
            return Err(EngineError::Conflict { id: holding.id.clone() });
        }
        if holding.quantity <= rust_decimal::Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "holding {} must have a positive quantity",
                holding.id
            )));
        }
        next.insert(
            holding.id.clone(),
            Holding {
                version: holding.version + 1,
                ..holding.clone()
            },
        );
    }

    let mut pairs = HashSet::new();
    for holding in next.values() {
        if !pairs.insert((holding.crypto_id.as_str(), holding.platform_id.as_str())) {
            return Err(EngineError::Duplicate {
                entity: "Holding",
                key: format!("{}@{}", holding.crypto_id, holding.platform_id),
            });
        }
    }

    Ok(next)
}
