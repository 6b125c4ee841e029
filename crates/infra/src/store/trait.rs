use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use loomerp_core::{ExpectedVersion, RequisitionId, YarnId};
use loomerp_inventory::{LedgerRecord, Requisition, RequisitionSignal, YarnLedger, YarnTransaction};

use super::query::{LedgerFilter, Page, Pagination, RequisitionFilter, TransactionFilter};

/// Inventory storage operation error.
///
/// These are infrastructure errors, as opposed to the deterministic domain
/// errors raised by `loomerp-inventory`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Concurrent write detected on the same yarn (version mismatch, lost
    /// lock race, serialization failure).
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Anything the backing store could not do (IO, decoding, closed pool).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Rebuild a ledger aggregate from its stored row.
pub(crate) fn restore_ledger(record: LedgerRecord) -> Result<YarnLedger, StoreError> {
    let yarn = record.yarn;
    YarnLedger::from_record(record)
        .map_err(|e| StoreError::Backend(format!("stored ledger for yarn {yarn} is invalid: {e}")))
}

/// Per-yarn atomic write scope.
///
/// Everything written through a scope becomes visible together on
/// [`LedgerScope::commit`], or not at all. Dropping the scope without
/// committing discards every staged write. While a scope is open, no other
/// scope can be opened on the same yarn.
#[async_trait]
pub trait LedgerScope: Send {
    /// The yarn this scope is bound to.
    fn yarn(&self) -> YarnId;

    /// Current stored ledger row, if the yarn has ever been transacted.
    async fn load_ledger(&mut self) -> Result<Option<LedgerRecord>, StoreError>;

    /// Stage a new immutable journal row.
    async fn append_transaction(&mut self, transaction: &YarnTransaction) -> Result<(), StoreError>;

    /// Keyed find-or-create on `(yarn, po_sent = false)`.
    ///
    /// Creates a pending requisition if none exists, otherwise overwrites the
    /// snapshots on the existing pending row (last writer wins). Returns the
    /// row as it will be after commit.
    async fn upsert_pending_requisition(
        &mut self,
        signal: &RequisitionSignal,
    ) -> Result<Requisition, StoreError>;

    /// Stage the ledger write, checked against the version that was loaded.
    ///
    /// On success `ledger` carries its new version.
    async fn save_ledger(
        &mut self,
        ledger: &mut YarnLedger,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError>;

    /// Make every staged write visible atomically and release the yarn.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Storage boundary for yarn ledgers, the transaction journal and requisitions.
///
/// Writes go exclusively through [`InventoryStore::begin`]. Reads are not
/// serialized against writers and observe the last committed state.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Open the atomic scope for one yarn, waiting for any scope already open
    /// on the same yarn to finish. Scopes on different yarns never wait on
    /// each other.
    async fn begin(&self, yarn: YarnId) -> Result<Box<dyn LedgerScope>, StoreError>;

    async fn get_ledger(&self, yarn: YarnId) -> Result<Option<YarnLedger>, StoreError>;

    /// Journal rows matching `filter`, newest `transaction_date` first.
    async fn query_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<YarnTransaction>, StoreError>;

    /// Ledgers matching `filter`, ordered by yarn name.
    async fn query_ledgers(
        &self,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> Result<Page<YarnLedger>, StoreError>;

    /// Requisitions matching `filter`, most recently updated first.
    async fn query_requisitions(
        &self,
        filter: &RequisitionFilter,
    ) -> Result<Vec<Requisition>, StoreError>;

    /// Close a requisition. Idempotent; `NotFound` if the id is unknown.
    async fn mark_po_sent(&self, id: RequisitionId) -> Result<Requisition, StoreError>;
}

#[async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn begin(&self, yarn: YarnId) -> Result<Box<dyn LedgerScope>, StoreError> {
        (**self).begin(yarn).await
    }

    async fn get_ledger(&self, yarn: YarnId) -> Result<Option<YarnLedger>, StoreError> {
        (**self).get_ledger(yarn).await
    }

    async fn query_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<YarnTransaction>, StoreError> {
        (**self).query_transactions(filter).await
    }

    async fn query_ledgers(
        &self,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> Result<Page<YarnLedger>, StoreError> {
        (**self).query_ledgers(filter, pagination).await
    }

    async fn query_requisitions(
        &self,
        filter: &RequisitionFilter,
    ) -> Result<Vec<Requisition>, StoreError> {
        (**self).query_requisitions(filter).await
    }

    async fn mark_po_sent(&self, id: RequisitionId) -> Result<Requisition, StoreError> {
        (**self).mark_po_sent(id).await
    }
}
