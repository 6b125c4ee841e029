//! Per-yarn inventory ledger: two storage tiers plus a derived total.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loomerp_core::{AggregateRoot, DomainError, DomainResult, YarnId};

use crate::catalog::YarnCatalogEntry;
use crate::evaluator::InventoryStatus;
use crate::metrics::StockMetrics;

/// Aggregate root: one ledger per yarn, created lazily on the first transaction.
///
/// `total` is never written directly. It only changes through
/// [`YarnLedger::recompute_total`], which the commit pipeline must call after
/// every bucket mutation and before persisting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YarnLedger {
    pub(crate) yarn: YarnId,
    pub(crate) yarn_name: String,
    pub(crate) long_term: StockMetrics,
    pub(crate) short_term: StockMetrics,
    pub(crate) total: StockMetrics,
    pub(crate) blocked_net_weight: Decimal,
    pub(crate) inventory_status: InventoryStatus,
    pub(crate) overbooked: bool,
    pub(crate) version: u64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl YarnLedger {
    /// Zeroed ledger for a yarn that has never been transacted.
    pub fn new(yarn: YarnId, yarn_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            yarn,
            yarn_name: yarn_name.into(),
            long_term: StockMetrics::ZERO,
            short_term: StockMetrics::ZERO,
            total: StockMetrics::ZERO,
            blocked_net_weight: Decimal::ZERO,
            inventory_status: InventoryStatus::InStock,
            overbooked: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a ledger from a stored row, coercing missing numbers to zero.
    ///
    /// The stored `total` is ignored and recomputed from the two tiers; a row
    /// whose tiers cannot be summed is rejected.
    pub fn from_record(record: LedgerRecord) -> DomainResult<Self> {
        let created_at = record.created_at.unwrap_or_else(Utc::now);
        let mut ledger = Self {
            yarn: record.yarn,
            yarn_name: record.yarn_name.unwrap_or_default(),
            long_term: record.long_term.coerce(),
            short_term: record.short_term.coerce(),
            total: StockMetrics::ZERO,
            blocked_net_weight: record.blocked_net_weight.unwrap_or_default(),
            inventory_status: record.inventory_status.unwrap_or_default(),
            overbooked: record.overbooked.unwrap_or(false),
            version: record.version,
            created_at,
            updated_at: record.updated_at.unwrap_or(created_at),
        };
        ledger.recompute_total()?;
        Ok(ledger)
    }

    /// Row shape written back to storage.
    pub fn to_record(&self) -> LedgerRecord {
        LedgerRecord {
            yarn: self.yarn,
            yarn_name: Some(self.yarn_name.clone()),
            long_term: BucketRecord::from(self.long_term),
            short_term: BucketRecord::from(self.short_term),
            total: BucketRecord::from(self.total),
            blocked_net_weight: Some(self.blocked_net_weight),
            inventory_status: Some(self.inventory_status),
            overbooked: Some(self.overbooked),
            version: self.version,
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        }
    }

    /// Set `total = long_term + short_term` for all four metrics.
    ///
    /// Fails without touching `total` if the sum leaves the `Decimal` range.
    pub fn recompute_total(&mut self) -> DomainResult<()> {
        self.total = self.long_term.checked_add(&self.short_term).ok_or_else(|| {
            DomainError::validation(format!(
                "total for yarn {} would overflow the decimal range",
                self.yarn
            ))
        })?;
        Ok(())
    }

    /// True when the stored total matches the sum of both tiers.
    pub fn total_is_consistent(&self) -> bool {
        self.long_term.checked_add(&self.short_term) == Some(self.total)
    }

    pub fn yarn(&self) -> YarnId {
        self.yarn
    }

    pub fn yarn_name(&self) -> &str {
        &self.yarn_name
    }

    pub fn long_term(&self) -> &StockMetrics {
        &self.long_term
    }

    pub fn short_term(&self) -> &StockMetrics {
        &self.short_term
    }

    pub fn total(&self) -> &StockMetrics {
        &self.total
    }

    pub fn blocked_net_weight(&self) -> Decimal {
        self.blocked_net_weight
    }

    pub fn inventory_status(&self) -> InventoryStatus {
        self.inventory_status
    }

    pub fn overbooked(&self) -> bool {
        self.overbooked
    }

    /// Net weight not earmarked by reservations, floored at zero.
    pub fn available_net_weight(&self) -> Decimal {
        self.total
            .net_weight
            .saturating_sub(self.blocked_net_weight)
            .max(Decimal::ZERO)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Advance the persisted version; called by stores on a successful save.
    pub fn mark_saved(&mut self) {
        self.version += 1;
    }
}

impl AggregateRoot for YarnLedger {
    type Id = YarnId;

    fn id(&self) -> &Self::Id {
        &self.yarn
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Load the ledger for `entry`, or initialize a zeroed one if none exists yet.
///
/// The denormalized `yarn_name` is refreshed from the catalog on every load.
pub fn ensure_ledger(
    record: Option<LedgerRecord>,
    entry: &YarnCatalogEntry,
    now: DateTime<Utc>,
) -> DomainResult<YarnLedger> {
    match record {
        Some(record) => {
            let mut ledger = YarnLedger::from_record(record)?;
            ledger.yarn_name = entry.yarn_name.clone();
            Ok(ledger)
        }
        None => Ok(YarnLedger::new(entry.id, entry.yarn_name.clone(), now)),
    }
}

/// One storage tier as persisted. Any field may be missing on legacy rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BucketRecord {
    pub total_weight: Option<Decimal>,
    pub tear_weight: Option<Decimal>,
    pub net_weight: Option<Decimal>,
    pub number_of_cones: Option<Decimal>,
}

impl BucketRecord {
    pub fn coerce(&self) -> StockMetrics {
        StockMetrics {
            total_weight: self.total_weight.unwrap_or_default(),
            tear_weight: self.tear_weight.unwrap_or_default(),
            net_weight: self.net_weight.unwrap_or_default(),
            number_of_cones: self.number_of_cones.unwrap_or_default(),
        }
    }
}

impl From<StockMetrics> for BucketRecord {
    fn from(m: StockMetrics) -> Self {
        Self {
            total_weight: Some(m.total_weight),
            tear_weight: Some(m.tear_weight),
            net_weight: Some(m.net_weight),
            number_of_cones: Some(m.number_of_cones),
        }
    }
}

/// Ledger row as it sits in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub yarn: YarnId,
    pub yarn_name: Option<String>,
    pub long_term: BucketRecord,
    pub short_term: BucketRecord,
    pub total: BucketRecord,
    pub blocked_net_weight: Option<Decimal>,
    pub inventory_status: Option<InventoryStatus>,
    pub overbooked: Option<bool>,
    pub version: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LedgerRecord {
    /// A row with nothing but its key, as left behind by partial writes.
    pub fn bare(yarn: YarnId) -> Self {
        Self {
            yarn,
            yarn_name: None,
            long_term: BucketRecord::default(),
            short_term: BucketRecord::default(),
            total: BucketRecord::default(),
            blocked_net_weight: None,
            inventory_status: None,
            overbooked: None,
            version: 0,
            created_at: None,
            updated_at: None,
        }
    }
}
