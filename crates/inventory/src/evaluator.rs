//! Stock-health status and procurement signals.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loomerp_core::{DomainError, DomainResult};

use crate::catalog::YarnCatalogEntry;
use crate::ledger::YarnLedger;
use crate::requisition::{AlertStatus, RequisitionSignal};

/// Derived stock-health status of a yarn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryStatus {
    #[default]
    InStock,
    LowStock,
    SoonToBeLow,
}

impl InventoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryStatus::InStock => "in_stock",
            InventoryStatus::LowStock => "low_stock",
            InventoryStatus::SoonToBeLow => "soon_to_be_low",
        }
    }

    /// Low or approaching low; both raise a requisition.
    pub fn needs_replenishment(&self) -> bool {
        matches!(self, InventoryStatus::LowStock | InventoryStatus::SoonToBeLow)
    }
}

impl core::fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InventoryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "in_stock" => Ok(InventoryStatus::InStock),
            "low_stock" => Ok(InventoryStatus::LowStock),
            "soon_to_be_low" => Ok(InventoryStatus::SoonToBeLow),
            other => Err(DomainError::validation(format!("unknown inventory status '{other}'"))),
        }
    }
}

/// Threshold tuning for status derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockThresholds {
    /// Multiple of `min_quantity` below which stock is "soon to be low".
    pub soon_to_be_low_factor: Decimal,
}

impl Default for StockThresholds {
    fn default() -> Self {
        Self {
            soon_to_be_low_factor: Decimal::new(12, 1),
        }
    }
}

impl StockThresholds {
    pub fn new(soon_to_be_low_factor: Decimal) -> DomainResult<Self> {
        if soon_to_be_low_factor < Decimal::ONE {
            return Err(DomainError::validation(format!(
                "soon_to_be_low_factor must be >= 1 (got {soon_to_be_low_factor})"
            )));
        }
        Ok(Self {
            soon_to_be_low_factor,
        })
    }

    /// Classify a total net weight against a minimum quantity.
    ///
    /// A soon-to-be-low band too large for `Decimal` covers every value above
    /// the minimum.
    pub fn classify(&self, total_net: Decimal, min_quantity: Decimal) -> InventoryStatus {
        if min_quantity <= Decimal::ZERO {
            InventoryStatus::InStock
        } else if total_net <= min_quantity {
            InventoryStatus::LowStock
        } else if min_quantity
            .checked_mul(self.soon_to_be_low_factor)
            .is_none_or(|band| total_net <= band)
        {
            InventoryStatus::SoonToBeLow
        } else {
            InventoryStatus::InStock
        }
    }
}

/// Outcome of assessing a settled ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockAssessment {
    pub available_net: Decimal,
    pub overbooked: bool,
    pub status: InventoryStatus,
}

/// Assess a ledger whose total has already been recomputed.
///
/// Status is judged on `total.net_weight`, not on the unreserved remainder.
pub fn assess(
    ledger: &YarnLedger,
    min_quantity: Decimal,
    thresholds: &StockThresholds,
) -> StockAssessment {
    let total_net = ledger.total.net_weight;
    StockAssessment {
        available_net: ledger.available_net_weight(),
        overbooked: ledger.blocked_net_weight > total_net,
        status: thresholds.classify(total_net, min_quantity),
    }
}

/// Record status and overbooking on the ledger and decide whether procurement
/// must hear about it.
///
/// Returns a signal when the ledger is overbooked, low or soon-to-be-low, or
/// when the caller forces it with `overbooked_trigger`. A `None` result means
/// no requisition may be touched.
pub fn evaluate(
    ledger: &mut YarnLedger,
    entry: &YarnCatalogEntry,
    thresholds: &StockThresholds,
    overbooked_trigger: bool,
) -> Option<RequisitionSignal> {
    let assessment = assess(ledger, entry.min_quantity, thresholds);
    ledger.inventory_status = assessment.status;
    ledger.overbooked = assessment.overbooked;

    let raise =
        assessment.overbooked || assessment.status.needs_replenishment() || overbooked_trigger;
    if !raise {
        return None;
    }

    let alert_status = if assessment.overbooked || overbooked_trigger {
        AlertStatus::Overbooked
    } else {
        AlertStatus::BelowMinimum
    };

    Some(RequisitionSignal {
        yarn: ledger.yarn,
        yarn_name: ledger.yarn_name.clone(),
        min_qty: entry.min_quantity,
        available_qty: assessment.available_net,
        blocked_qty: ledger.blocked_net_weight,
        alert_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use loomerp_core::YarnId;
    use rust_decimal_macros::dec;

    use crate::applier::apply;
    use crate::metrics::StockMetrics;
    use crate::transaction::TransactionKind;

    fn ledger_with(entry: &YarnCatalogEntry, net: Decimal, blocked: Decimal) -> YarnLedger {
        let mut ledger = YarnLedger::new(entry.id, entry.yarn_name.clone(), Utc::now());
        apply(
            &mut ledger,
            TransactionKind::Stocked,
            &StockMetrics::new(net, Decimal::ZERO, net, Decimal::ZERO),
        )
        .unwrap();
        apply(
            &mut ledger,
            TransactionKind::Blocked,
            &StockMetrics::new(blocked, Decimal::ZERO, blocked, Decimal::ZERO),
        )
        .unwrap();
        ledger.recompute_total().unwrap();
        ledger
    }

    fn entry(min: Decimal) -> YarnCatalogEntry {
        YarnCatalogEntry::new(YarnId::new(), "Viscose 2/30", min)
    }

    #[test]
    fn classification_boundaries() {
        let t = StockThresholds::default();
        assert_eq!(t.classify(dec!(50), dec!(50)), InventoryStatus::LowStock);
        assert_eq!(t.classify(dec!(50.01), dec!(50)), InventoryStatus::SoonToBeLow);
        assert_eq!(t.classify(dec!(60), dec!(50)), InventoryStatus::SoonToBeLow);
        assert_eq!(t.classify(dec!(60.01), dec!(50)), InventoryStatus::InStock);
        assert_eq!(t.classify(dec!(-10), dec!(0)), InventoryStatus::InStock);
        assert_eq!(t.classify(dec!(-10), dec!(-5)), InventoryStatus::InStock);
    }

    #[test]
    fn huge_minimum_classifies_without_overflow() {
        let t = StockThresholds::default();
        let min = Decimal::MAX - dec!(1);
        assert_eq!(t.classify(Decimal::MAX, min), InventoryStatus::SoonToBeLow);
        assert_eq!(t.classify(min, min), InventoryStatus::LowStock);

        let entry = entry(min);
        let mut ledger = ledger_with(&entry, Decimal::MAX, Decimal::MIN);
        let signal = evaluate(&mut ledger, &entry, &t, false).unwrap();
        assert_eq!(ledger.inventory_status(), InventoryStatus::SoonToBeLow);
        assert_eq!(signal.available_qty, Decimal::MAX);
    }

    #[test]
    fn low_stock_raises_below_minimum() {
        let entry = entry(dec!(50));
        let mut ledger = ledger_with(&entry, dec!(40), dec!(0));

        let signal = evaluate(&mut ledger, &entry, &StockThresholds::default(), false).unwrap();

        assert_eq!(ledger.inventory_status(), InventoryStatus::LowStock);
        assert!(!ledger.overbooked());
        assert_eq!(signal.alert_status, AlertStatus::BelowMinimum);
        assert_eq!(signal.min_qty, dec!(50));
        assert_eq!(signal.available_qty, dec!(40));
        assert_eq!(signal.blocked_qty, dec!(0));
    }

    #[test]
    fn overbooking_wins_regardless_of_minimum() {
        let entry = entry(dec!(0));
        let mut ledger = ledger_with(&entry, dec!(100), dec!(120));

        let signal = evaluate(&mut ledger, &entry, &StockThresholds::default(), false).unwrap();

        assert!(ledger.overbooked());
        assert_eq!(ledger.inventory_status(), InventoryStatus::InStock);
        assert_eq!(signal.alert_status, AlertStatus::Overbooked);
        assert_eq!(signal.available_qty, Decimal::ZERO);
        assert_eq!(signal.blocked_qty, dec!(120));
    }

    #[test]
    fn blocked_equal_to_total_is_not_overbooked() {
        let entry = entry(dec!(0));
        let mut ledger = ledger_with(&entry, dec!(100), dec!(100));
        assert!(evaluate(&mut ledger, &entry, &StockThresholds::default(), false).is_none());
        assert!(!ledger.overbooked());
    }

    #[test]
    fn healthy_stock_raises_nothing() {
        let entry = entry(dec!(50));
        let mut ledger = ledger_with(&entry, dec!(100), dec!(30));
        assert!(evaluate(&mut ledger, &entry, &StockThresholds::default(), false).is_none());
        assert_eq!(ledger.inventory_status(), InventoryStatus::InStock);
    }

    #[test]
    fn external_trigger_forces_overbooked_signal() {
        let entry = entry(dec!(50));
        let mut ledger = ledger_with(&entry, dec!(100), dec!(0));

        let signal = evaluate(&mut ledger, &entry, &StockThresholds::default(), true).unwrap();

        assert!(!ledger.overbooked());
        assert_eq!(signal.alert_status, AlertStatus::Overbooked);
    }

    #[test]
    fn status_uses_total_not_available() {
        // 100 total, 90 reserved: only 10 available but total is well above minimum.
        let entry = entry(dec!(50));
        let mut ledger = ledger_with(&entry, dec!(100), dec!(90));
        assert!(evaluate(&mut ledger, &entry, &StockThresholds::default(), false).is_none());
        assert_eq!(ledger.inventory_status(), InventoryStatus::InStock);
    }

    #[test]
    fn factor_below_one_is_rejected() {
        assert!(StockThresholds::new(dec!(0.9)).is_err());
        assert!(StockThresholds::new(dec!(1.5)).is_ok());
    }
}
