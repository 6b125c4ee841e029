//! Display shape for ledger listings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loomerp_core::YarnId;

use crate::evaluator::InventoryStatus;
use crate::ledger::YarnLedger;
use crate::metrics::StockMetrics;

/// Ledger as presented to listing consumers.
///
/// Each tier's `net_weight` has `blocked_net_weight` folded back in. This is a
/// read-side transform only; the stored ledger keeps `total = long_term + short_term`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerView {
    pub yarn: YarnId,
    pub yarn_name: String,
    pub long_term: StockMetrics,
    pub short_term: StockMetrics,
    pub total: StockMetrics,
    pub blocked_net_weight: Decimal,
    pub available_net_weight: Decimal,
    pub inventory_status: InventoryStatus,
    pub overbooked: bool,
    pub updated_at: DateTime<Utc>,
}

/// Saturates at the `Decimal` bounds; the view never fails to render.
fn fold_blocked(mut tier: StockMetrics, blocked: Decimal) -> StockMetrics {
    tier.net_weight = tier.net_weight.saturating_add(blocked);
    tier
}

impl From<&YarnLedger> for LedgerView {
    fn from(ledger: &YarnLedger) -> Self {
        let blocked = ledger.blocked_net_weight();
        Self {
            yarn: ledger.yarn(),
            yarn_name: ledger.yarn_name().to_string(),
            long_term: fold_blocked(*ledger.long_term(), blocked),
            short_term: fold_blocked(*ledger.short_term(), blocked),
            total: fold_blocked(*ledger.total(), blocked),
            blocked_net_weight: blocked,
            available_net_weight: ledger.available_net_weight(),
            inventory_status: ledger.inventory_status(),
            overbooked: ledger.overbooked(),
            updated_at: ledger.updated_at(),
        }
    }
}
