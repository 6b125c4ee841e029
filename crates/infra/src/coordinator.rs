//! Atomic commit pipeline for yarn inventory transactions.
//!
//! ```text
//! RawTransactionRequest
//!   ↓
//! 1. Normalize (kind, yarn, metrics)
//!   ↓
//! 2. Resolve the yarn in the catalog (NotFound fails fast)
//!   ↓
//! 3. Open the yarn's atomic scope, load or initialize the ledger
//!   ↓
//! 4. Journal the transaction
//!   ↓
//! 5. Apply the bucket mutation, recompute the total
//!   ↓
//! 6. Evaluate status, upsert the pending requisition if raised
//!   ↓
//! 7. Save the ledger (version-checked) and commit
//! ```
//!
//! Any error drops the scope before commit, so nothing from steps 3-7 becomes
//! visible. No step is retried here; the caller decides.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Span, debug, field, info, instrument, warn};

use loomerp_core::{AggregateRoot, DomainError, ExpectedVersion, RequisitionId, YarnId};
use loomerp_inventory::{
    LedgerView, RawTransactionRequest, Requisition, StockThresholds, YarnLedger, YarnTransaction,
    apply, ensure_ledger, evaluate, normalize,
};

use crate::catalog::{CatalogError, YarnCatalog};
use crate::store::{
    InventoryStore, LedgerFilter, Page, Pagination, RequisitionFilter, StoreError,
    TransactionFilter,
};

/// Caller-facing error taxonomy.
///
/// Low stock and overbooking are never errors; they surface through the
/// ledger flags and the requisition in [`CommitOutcome`].
#[derive(Debug, Error)]
pub enum CommitError {
    /// Unknown transaction type, missing yarn reference, malformed number.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The yarn (or requisition) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Concurrent write detected on the same yarn.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The storage or catalog backend failed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<DomainError> for CommitError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                CommitError::Validation(msg)
            }
            DomainError::NotFound(msg) => CommitError::NotFound(msg),
            DomainError::Conflict(msg) => CommitError::Conflict(msg),
        }
    }
}

impl From<StoreError> for CommitError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => CommitError::Conflict(msg),
            StoreError::NotFound(msg) => CommitError::NotFound(msg),
            other => CommitError::Store(other),
        }
    }
}

impl From<CatalogError> for CommitError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::Backend(msg) => CommitError::Store(StoreError::Backend(msg)),
        }
    }
}

/// Result of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub transaction: YarnTransaction,
    pub ledger: YarnLedger,
    /// The requisition raised or refreshed by this commit, if any.
    pub requisition: Option<Requisition>,
}

/// Runs the commit pipeline and exposes the read surface.
#[derive(Debug)]
pub struct TransactionCoordinator<S, C> {
    store: S,
    catalog: C,
    thresholds: StockThresholds,
    page_limit: u32,
}

impl<S, C> TransactionCoordinator<S, C> {
    pub fn new(store: S, catalog: C) -> Self {
        Self {
            store,
            catalog,
            thresholds: StockThresholds::default(),
            page_limit: crate::store::query::DEFAULT_PAGE_LIMIT,
        }
    }

    pub fn with_thresholds(mut self, thresholds: StockThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn thresholds(&self) -> &StockThresholds {
        &self.thresholds
    }

    /// Pagination with this coordinator's default page size.
    pub fn pagination(&self, limit: Option<u32>, offset: Option<u32>) -> Pagination {
        Pagination::with_default_limit(limit, offset, self.page_limit)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn into_parts(self) -> (S, C) {
        (self.store, self.catalog)
    }
}

impl<S, C> TransactionCoordinator<S, C>
where
    S: InventoryStore,
    C: YarnCatalog,
{
    /// Normalize, journal and apply one transaction as a single atomic unit.
    #[instrument(
        skip(self, raw),
        fields(
            yarn_id = field::Empty,
            kind = field::Empty,
            transaction_id = field::Empty
        )
    )]
    pub async fn create_transaction(
        &self,
        raw: &RawTransactionRequest,
    ) -> Result<CommitOutcome, CommitError> {
        let result = self.commit(raw).await;
        if let Err(err) = &result {
            warn!(error = %err, "inventory commit aborted");
        }
        result
    }

    async fn commit(&self, raw: &RawTransactionRequest) -> Result<CommitOutcome, CommitError> {
        let span = Span::current();
        let txn = normalize(raw)?;
        span.record("yarn_id", field::display(txn.yarn));
        span.record("kind", txn.kind.as_str());
        debug!("inventory commit started");

        let entry = self
            .catalog
            .find(txn.yarn)
            .await?
            .ok_or_else(|| CommitError::NotFound(format!("yarn {}", txn.yarn)))?;

        let mut scope = self.store.begin(txn.yarn).await?;
        let now = Utc::now();

        let mut ledger = ensure_ledger(scope.load_ledger().await?, &entry, now)?;
        let loaded_version = ledger.version();

        let transaction = YarnTransaction::record(&txn, entry.yarn_name.clone(), now);
        span.record("transaction_id", field::display(transaction.id));
        scope.append_transaction(&transaction).await?;

        // Out-of-range results drop the scope, discarding the staged journal row.
        apply(&mut ledger, transaction.kind, &transaction.metrics())?;
        ledger.recompute_total()?;

        let requisition = match evaluate(
            &mut ledger,
            &entry,
            &self.thresholds,
            txn.overbooked_trigger,
        ) {
            Some(signal) => {
                let requisition = scope.upsert_pending_requisition(&signal).await?;
                info!(
                    requisition_id = %requisition.id,
                    alert_status = %requisition.alert_status,
                    available_qty = %requisition.available_qty,
                    blocked_qty = %requisition.blocked_qty,
                    "requisition raised"
                );
                Some(requisition)
            }
            None => None,
        };

        ledger.touch(now);
        scope
            .save_ledger(&mut ledger, ExpectedVersion::Exact(loaded_version))
            .await?;
        scope.commit().await?;

        info!(
            status = %ledger.inventory_status(),
            overbooked = ledger.overbooked(),
            total_net_weight = %ledger.total().net_weight,
            blocked_net_weight = %ledger.blocked_net_weight(),
            version = ledger.version(),
            "inventory commit succeeded"
        );

        Ok(CommitOutcome {
            transaction,
            ledger,
            requisition,
        })
    }

    /// Journal rows, newest `transaction_date` first.
    pub async fn query_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<YarnTransaction>, CommitError> {
        Ok(self.store.query_transactions(filter).await?)
    }

    /// Ledgers reshaped for display, ordered by yarn name.
    pub async fn query_ledgers(
        &self,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> Result<Page<LedgerView>, CommitError> {
        let page = self.store.query_ledgers(filter, pagination).await?;
        Ok(page.map(|ledger| LedgerView::from(&ledger)))
    }

    pub async fn get_ledger(&self, yarn: YarnId) -> Result<Option<YarnLedger>, CommitError> {
        Ok(self.store.get_ledger(yarn).await?)
    }

    pub async fn query_requisitions(
        &self,
        filter: &RequisitionFilter,
    ) -> Result<Vec<Requisition>, CommitError> {
        Ok(self.store.query_requisitions(filter).await?)
    }

    /// Close a requisition once procurement has issued the purchase order.
    #[instrument(skip(self), fields(requisition_id = %id), err)]
    pub async fn mark_po_sent(&self, id: RequisitionId) -> Result<Requisition, CommitError> {
        let requisition = self.store.mark_po_sent(id).await?;
        info!(yarn_id = %requisition.yarn, "requisition closed");
        Ok(requisition)
    }
}
