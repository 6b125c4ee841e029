//! Procurement requisitions.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loomerp_core::{DomainError, DomainResult, Entity, RequisitionId, YarnId};

/// Why a requisition was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    BelowMinimum,
    Overbooked,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::BelowMinimum => "below_minimum",
            AlertStatus::Overbooked => "overbooked",
        }
    }
}

impl core::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "below_minimum" => Ok(AlertStatus::BelowMinimum),
            "overbooked" => Ok(AlertStatus::Overbooked),
            other => Err(DomainError::validation(format!("unknown alert status '{other}'"))),
        }
    }
}

/// Snapshot produced by the evaluator when a yarn needs procurement attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionSignal {
    pub yarn: YarnId,
    pub yarn_name: String,
    pub min_qty: Decimal,
    pub available_qty: Decimal,
    pub blocked_qty: Decimal,
    pub alert_status: AlertStatus,
}

/// Requisition row. At most one per yarn has `po_sent == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requisition {
    pub id: RequisitionId,
    pub yarn: YarnId,
    pub yarn_name: String,
    pub min_qty: Decimal,
    pub available_qty: Decimal,
    pub blocked_qty: Decimal,
    pub alert_status: AlertStatus,
    pub po_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Requisition {
    /// New pending requisition from a signal.
    pub fn raise(signal: &RequisitionSignal, now: DateTime<Utc>) -> Self {
        Self {
            id: RequisitionId::new(),
            yarn: signal.yarn,
            yarn_name: signal.yarn_name.clone(),
            min_qty: signal.min_qty,
            available_qty: signal.available_qty,
            blocked_qty: signal.blocked_qty,
            alert_status: signal.alert_status,
            po_sent: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the snapshots of a pending requisition (last writer wins).
    pub fn refresh(&mut self, signal: &RequisitionSignal, now: DateTime<Utc>) -> DomainResult<()> {
        if self.po_sent {
            return Err(DomainError::conflict(format!(
                "requisition {} is closed and cannot be refreshed",
                self.id
            )));
        }
        if signal.yarn != self.yarn {
            return Err(DomainError::validation(format!(
                "signal for yarn {} cannot refresh requisition of yarn {}",
                signal.yarn, self.yarn
            )));
        }
        self.yarn_name = signal.yarn_name.clone();
        self.min_qty = signal.min_qty;
        self.available_qty = signal.available_qty;
        self.blocked_qty = signal.blocked_qty;
        self.alert_status = signal.alert_status;
        self.updated_at = now;
        Ok(())
    }

    /// Close the requisition once a purchase order has gone out. Idempotent.
    pub fn mark_po_sent(&mut self, now: DateTime<Utc>) {
        if !self.po_sent {
            self.po_sent = true;
            self.updated_at = now;
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.po_sent
    }
}

impl Entity for Requisition {
    type Id = RequisitionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn signal(yarn: YarnId, alert_status: AlertStatus, available: Decimal) -> RequisitionSignal {
        RequisitionSignal {
            yarn,
            yarn_name: "Nylon 70D".to_string(),
            min_qty: dec!(50),
            available_qty: available,
            blocked_qty: dec!(0),
            alert_status,
        }
    }

    #[test]
    fn refresh_overwrites_snapshots_in_place() {
        let yarn = YarnId::new();
        let t0 = Utc::now();
        let mut req = Requisition::raise(&signal(yarn, AlertStatus::BelowMinimum, dec!(40)), t0);
        let id = req.id;

        req.refresh(&signal(yarn, AlertStatus::Overbooked, dec!(0)), t0).unwrap();

        assert_eq!(req.id, id);
        assert_eq!(req.alert_status, AlertStatus::Overbooked);
        assert_eq!(req.available_qty, dec!(0));
        assert!(req.is_pending());
    }

    #[test]
    fn closed_requisitions_cannot_be_refreshed() {
        let yarn = YarnId::new();
        let mut req =
            Requisition::raise(&signal(yarn, AlertStatus::BelowMinimum, dec!(40)), Utc::now());
        req.mark_po_sent(Utc::now());
        req.mark_po_sent(Utc::now());

        assert!(!req.is_pending());
        let err = req
            .refresh(&signal(yarn, AlertStatus::BelowMinimum, dec!(10)), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(req.available_qty, dec!(40));
    }

    #[test]
    fn refresh_rejects_foreign_yarn() {
        let mut req = Requisition::raise(
            &signal(YarnId::new(), AlertStatus::BelowMinimum, dec!(40)),
            Utc::now(),
        );
        let err = req
            .refresh(&signal(YarnId::new(), AlertStatus::BelowMinimum, dec!(1)), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
