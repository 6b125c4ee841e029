//! Bucket mutation per transaction kind.
//!
//! | Kind          | Effect                                                        |
//! |---------------|---------------------------------------------------------------|
//! | `issued`      | `short_term -= delta`, `blocked_net_weight -= delta.net`      |
//! | `blocked`     | `blocked_net_weight += delta.net` (no bucket touched)         |
//! | `stocked`     | `long_term += delta`                                          |
//! | `transferred` | `long_term -= delta`, `short_term += delta`                   |
//! | `returned`    | `short_term += delta`                                         |
//!
//! Nothing is clamped: tiers and reservations may go negative. A delta that
//! would push any field out of the `Decimal` range is rejected as a validation
//! error and leaves the ledger untouched. `total` is left stale on purpose; the
//! caller must follow up with
//! [`YarnLedger::recompute_total`](crate::ledger::YarnLedger::recompute_total).

use loomerp_core::{DomainError, DomainResult};

use crate::ledger::YarnLedger;
use crate::metrics::StockMetrics;
use crate::transaction::TransactionKind;

/// Apply one transaction delta to the ledger's buckets.
pub fn apply(
    ledger: &mut YarnLedger,
    kind: TransactionKind,
    delta: &StockMetrics,
) -> DomainResult<()> {
    let mut long_term = ledger.long_term;
    let mut short_term = ledger.short_term;
    let mut blocked = ledger.blocked_net_weight;

    match kind {
        TransactionKind::Issued => {
            short_term = short_term.checked_sub(delta).ok_or_else(|| out_of_range(kind))?;
            blocked = blocked
                .checked_sub(delta.net_weight)
                .ok_or_else(|| out_of_range(kind))?;
        }
        TransactionKind::Blocked => {
            blocked = blocked
                .checked_add(delta.net_weight)
                .ok_or_else(|| out_of_range(kind))?;
        }
        TransactionKind::Stocked => {
            long_term = long_term.checked_add(delta).ok_or_else(|| out_of_range(kind))?;
        }
        TransactionKind::Transferred => {
            long_term = long_term.checked_sub(delta).ok_or_else(|| out_of_range(kind))?;
            short_term = short_term.checked_add(delta).ok_or_else(|| out_of_range(kind))?;
        }
        TransactionKind::Returned => {
            short_term = short_term.checked_add(delta).ok_or_else(|| out_of_range(kind))?;
        }
    }

    ledger.long_term = long_term;
    ledger.short_term = short_term;
    ledger.blocked_net_weight = blocked;
    Ok(())
}

fn out_of_range(kind: TransactionKind) -> DomainError {
    DomainError::validation(format!(
        "{} transaction would overflow the ledger's decimal range",
        kind.as_str()
    ))
}
