//! Yarn catalog entry as seen by the inventory domain.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loomerp_core::YarnId;

/// The slice of a yarn catalog record the ledger needs: identity, display
/// name, and the procurement threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YarnCatalogEntry {
    pub id: YarnId,
    pub yarn_name: String,
    /// Zero or negative disables threshold-based status.
    pub min_quantity: Decimal,
}

impl YarnCatalogEntry {
    pub fn new(id: YarnId, yarn_name: impl Into<String>, min_quantity: Decimal) -> Self {
        Self {
            id,
            yarn_name: yarn_name.into(),
            min_quantity,
        }
    }
}
