//! Transaction kinds and the immutable journal entry.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loomerp_core::{DomainError, Entity, TransactionId, YarnId};

use crate::metrics::StockMetrics;
use crate::normalizer::NormalizedTransaction;

/// The five stock-moving operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Physical exit from short-term storage; releases the matching reservation.
    Issued,
    /// Reservation only; no bucket is touched.
    Blocked,
    /// Receipt into long-term storage.
    Stocked,
    /// Internal move from long-term to short-term storage.
    Transferred,
    /// Returned yarn re-entering short-term storage.
    Returned,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 5] = [
        TransactionKind::Issued,
        TransactionKind::Blocked,
        TransactionKind::Stocked,
        TransactionKind::Transferred,
        TransactionKind::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Issued => "issued",
            TransactionKind::Blocked => "blocked",
            TransactionKind::Stocked => "stocked",
            TransactionKind::Transferred => "transferred",
            TransactionKind::Returned => "returned",
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        TransactionKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DomainError::validation(format!("unknown transaction type '{wanted}'")))
    }
}

/// Journal entry. Written once per commit; never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YarnTransaction {
    pub id: TransactionId,
    pub yarn: YarnId,
    pub yarn_name: String,
    #[serde(rename = "transaction_type")]
    pub kind: TransactionKind,
    pub transaction_date: DateTime<Utc>,
    pub net_weight: Decimal,
    pub total_weight: Decimal,
    pub tear_weight: Decimal,
    pub number_of_cones: Decimal,
    pub order_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl YarnTransaction {
    /// Build the journal entry for a normalized request.
    ///
    /// The transaction date defaults to `now` when the request carried none.
    pub fn record(
        txn: &NormalizedTransaction,
        yarn_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            yarn: txn.yarn,
            yarn_name: yarn_name.into(),
            kind: txn.kind,
            transaction_date: txn.transaction_date.unwrap_or(now),
            net_weight: txn.metrics.net_weight,
            total_weight: txn.metrics.total_weight,
            tear_weight: txn.metrics.tear_weight,
            number_of_cones: txn.metrics.number_of_cones,
            order_ref: txn.order_ref.clone(),
            created_at: now,
        }
    }

    pub fn metrics(&self) -> StockMetrics {
        StockMetrics {
            total_weight: self.total_weight,
            tear_weight: self.tear_weight,
            net_weight: self.net_weight,
            number_of_cones: self.number_of_cones,
        }
    }
}

impl Entity for YarnTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_case_insensitively() {
        assert_eq!("Stocked".parse::<TransactionKind>().unwrap(), TransactionKind::Stocked);
        assert_eq!(" issued ".parse::<TransactionKind>().unwrap(), TransactionKind::Issued);
        for kind in TransactionKind::ALL {
            assert_eq!(kind.as_str().parse::<TransactionKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_a_validation_error() {
        let err = "consumed".parse::<TransactionKind>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("consumed")));
    }

    #[test]
    fn kind_serializes_as_its_lowercase_name() {
        let json = serde_json::to_value(TransactionKind::Transferred).unwrap();
        assert_eq!(json, serde_json::json!("transferred"));
    }
}
