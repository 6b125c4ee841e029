//! Read-side filters and pagination.
//!
//! Reads are not serialized against writers; they observe the last committed
//! state. Each filter carries an in-process `matches` used by the in-memory
//! store; the Postgres store expresses the same predicates in SQL.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loomerp_core::YarnId;
use loomerp_inventory::{
    AlertStatus, InventoryStatus, Requisition, TransactionKind, YarnLedger, YarnTransaction,
};

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Pagination parameters for ledger listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of rows to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self::with_default_limit(limit, offset, DEFAULT_PAGE_LIMIT)
    }

    /// Like [`Pagination::new`] with a caller-chosen fallback limit.
    pub fn with_default_limit(limit: Option<u32>, offset: Option<u32>, default_limit: u32) -> Self {
        Self {
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    /// Slice an already filtered and ordered result set.
    pub fn apply<T>(&self, rows: Vec<T>) -> Page<T> {
        let total = rows.len() as u64;
        let items: Vec<T> = rows
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect();
        Page::new(items, total, *self)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows matching the filter across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let has_more = total > u64::from(pagination.offset) + u64::from(pagination.limit);
        Self {
            items,
            total,
            pagination,
            has_more,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            pagination: self.pagination,
            has_more: self.has_more,
        }
    }
}

/// Journal filter. Every field is optional; all present fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    #[serde(alias = "type")]
    pub kind: Option<TransactionKind>,
    pub yarn_id: Option<YarnId>,
    /// Case-insensitive substring of the yarn name.
    pub yarn_name: Option<String>,
    /// Exact order reference.
    pub order_ref: Option<String>,
    /// Inclusive lower bound on `transaction_date`.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `transaction_date`.
    pub date_to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn for_yarn(yarn: YarnId) -> Self {
        Self {
            yarn_id: Some(yarn),
            ..Default::default()
        }
    }

    pub fn matches(&self, tx: &YarnTransaction) -> bool {
        self.kind.is_none_or(|k| tx.kind == k)
            && self.yarn_id.is_none_or(|y| tx.yarn == y)
            && self
                .yarn_name
                .as_deref()
                .is_none_or(|needle| contains_ignore_case(&tx.yarn_name, needle))
            && self
                .order_ref
                .as_deref()
                .is_none_or(|r| tx.order_ref.as_deref() == Some(r))
            && self.date_from.is_none_or(|from| tx.transaction_date >= from)
            && self.date_to.is_none_or(|to| tx.transaction_date <= to)
    }
}

/// Ledger listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub yarn_id: Option<YarnId>,
    /// Case-insensitive substring of the yarn name.
    pub yarn_name: Option<String>,
    pub status: Option<InventoryStatus>,
    pub overbooked: Option<bool>,
}

impl LedgerFilter {
    pub fn matches(&self, ledger: &YarnLedger) -> bool {
        self.yarn_id.is_none_or(|y| ledger.yarn() == y)
            && self
                .yarn_name
                .as_deref()
                .is_none_or(|needle| contains_ignore_case(ledger.yarn_name(), needle))
            && self.status.is_none_or(|s| ledger.inventory_status() == s)
            && self.overbooked.is_none_or(|o| ledger.overbooked() == o)
    }
}

/// Requisition filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionFilter {
    pub yarn_id: Option<YarnId>,
    pub po_sent: Option<bool>,
    pub alert_status: Option<AlertStatus>,
}

impl RequisitionFilter {
    pub fn pending_for(yarn: YarnId) -> Self {
        Self {
            yarn_id: Some(yarn),
            po_sent: Some(false),
            alert_status: None,
        }
    }

    pub fn matches(&self, req: &Requisition) -> bool {
        self.yarn_id.is_none_or(|y| req.yarn == y)
            && self.po_sent.is_none_or(|p| req.po_sent == p)
            && self.alert_status.is_none_or(|a| req.alert_status == a)
    }
}

/// Journal order: newest `transaction_date`, then newest creation, then id.
pub(crate) fn journal_order(a: &YarnTransaction, b: &YarnTransaction) -> Ordering {
    b.transaction_date
        .cmp(&a.transaction_date)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.as_uuid().cmp(a.id.as_uuid()))
}

/// Ledger listing order: yarn name, then yarn id.
pub(crate) fn ledger_order(a: &YarnLedger, b: &YarnLedger) -> Ordering {
    a.yarn_name()
        .cmp(b.yarn_name())
        .then_with(|| a.yarn().as_uuid().cmp(b.yarn().as_uuid()))
}

/// Requisition order: most recently updated first.
pub(crate) fn requisition_order(a: &Requisition, b: &Requisition) -> Ordering {
    b.updated_at
        .cmp(&a.updated_at)
        .then_with(|| b.id.as_uuid().cmp(a.id.as_uuid()))
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_caps() {
        assert_eq!(Pagination::new(None, None), Pagination::default());
        assert_eq!(Pagination::new(Some(5000), Some(3)).limit, MAX_PAGE_LIMIT);
        assert_eq!(Pagination::new(Some(0), None).limit, 1);
        assert_eq!(Pagination::with_default_limit(None, None, 20).limit, 20);
    }

    #[test]
    fn apply_slices_and_reports_more() {
        let page = Pagination::new(Some(2), Some(1)).apply(vec![1, 2, 3, 4]);
        assert_eq!(page.items, vec![2, 3]);
        assert_eq!(page.total, 4);
        assert!(page.has_more);

        let last = Pagination::new(Some(2), Some(2)).apply(vec![1, 2, 3, 4]);
        assert!(!last.has_more);
    }

    #[test]
    fn name_match_is_case_insensitive_substring() {
        assert!(contains_ignore_case("Cotton Combed 40s", "combed"));
        assert!(!contains_ignore_case("Cotton Combed 40s", "viscose"));
    }

    #[test]
    fn transaction_filter_accepts_type_as_kind() {
        let filter: TransactionFilter = serde_json::from_str(r#"{"type":"blocked"}"#).unwrap();
        assert_eq!(filter.kind, Some(TransactionKind::Blocked));

        let filter: TransactionFilter =
            serde_json::from_str(r#"{"kind":"issued","order_ref":"PO-9"}"#).unwrap();
        assert_eq!(filter.kind, Some(TransactionKind::Issued));
        assert_eq!(filter.order_ref.as_deref(), Some("PO-9"));
    }
}
