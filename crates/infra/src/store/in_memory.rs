use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use loomerp_core::{ExpectedVersion, RequisitionId, YarnId};
use loomerp_inventory::{LedgerRecord, Requisition, RequisitionSignal, YarnLedger, YarnTransaction};

use super::query::{
    LedgerFilter, Page, Pagination, RequisitionFilter, TransactionFilter, journal_order,
    ledger_order, requisition_order,
};
use super::r#trait::{InventoryStore, LedgerScope, StoreError, restore_ledger};

#[derive(Debug, Default)]
struct StoreState {
    ledgers: HashMap<YarnId, LedgerRecord>,
    journal: Vec<YarnTransaction>,
    requisitions: Vec<Requisition>,
}

impl StoreState {
    fn ledger_version(&self, yarn: YarnId) -> u64 {
        self.ledgers.get(&yarn).map(|r| r.version).unwrap_or(0)
    }

    fn pending_requisition(&self, yarn: YarnId) -> Option<&Requisition> {
        self.requisitions.iter().find(|r| r.yarn == yarn && r.is_pending())
    }
}

/// In-memory inventory store.
///
/// Intended for tests/dev. Same-yarn scopes serialize on a per-yarn async
/// mutex held for the scope's lifetime; staged writes are applied under a
/// single write lock on commit.
#[derive(Debug, Default, Clone)]
pub struct InMemoryInventoryStore {
    state: Arc<RwLock<StoreState>>,
    locks: Arc<Mutex<HashMap<YarnId, Arc<AsyncMutex<()>>>>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a raw ledger row, bypassing the commit pipeline.
    ///
    /// Used to stage legacy or partially written rows.
    pub fn seed_ledger_record(&self, record: LedgerRecord) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.ledgers.insert(record.yarn, record);
        Ok(())
    }

    fn yarn_lock(&self, yarn: YarnId) -> Result<Arc<AsyncMutex<()>>, StoreError> {
        let mut locks = self.locks.lock().map_err(|_| poisoned())?;
        Ok(locks.entry(yarn).or_default().clone())
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn begin(&self, yarn: YarnId) -> Result<Box<dyn LedgerScope>, StoreError> {
        let lock = self.yarn_lock(yarn)?;
        let guard = lock.lock_owned().await;
        Ok(Box::new(InMemoryLedgerScope {
            yarn,
            state: self.state.clone(),
            _guard: guard,
            journal: Vec::new(),
            requisition: None,
            ledger: None,
        }))
    }

    async fn get_ledger(&self, yarn: YarnId) -> Result<Option<YarnLedger>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state.ledgers.get(&yarn).cloned().map(restore_ledger).transpose()
    }

    async fn query_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<YarnTransaction>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut rows: Vec<YarnTransaction> = state
            .journal
            .iter()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect();
        rows.sort_by(journal_order);
        Ok(rows)
    }

    async fn query_ledgers(
        &self,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> Result<Page<YarnLedger>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut rows = state
            .ledgers
            .values()
            .cloned()
            .map(restore_ledger)
            .collect::<Result<Vec<_>, _>>()?;
        rows.retain(|l| filter.matches(l));
        rows.sort_by(ledger_order);
        Ok(pagination.apply(rows))
    }

    async fn query_requisitions(
        &self,
        filter: &RequisitionFilter,
    ) -> Result<Vec<Requisition>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut rows: Vec<Requisition> = state
            .requisitions
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rows.sort_by(requisition_order);
        Ok(rows)
    }

    async fn mark_po_sent(&self, id: RequisitionId) -> Result<Requisition, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let req = state
            .requisitions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("requisition {id}")))?;
        req.mark_po_sent(Utc::now());
        Ok(req.clone())
    }
}

/// Scope over [`InMemoryInventoryStore`]. Holds the yarn's lock until dropped.
struct InMemoryLedgerScope {
    yarn: YarnId,
    state: Arc<RwLock<StoreState>>,
    _guard: OwnedMutexGuard<()>,
    journal: Vec<YarnTransaction>,
    requisition: Option<Requisition>,
    ledger: Option<(LedgerRecord, ExpectedVersion)>,
}

impl InMemoryLedgerScope {
    fn ensure_own_yarn(&self, yarn: YarnId) -> Result<(), StoreError> {
        if yarn == self.yarn {
            Ok(())
        } else {
            Err(StoreError::Backend(format!(
                "scope for yarn {} cannot write yarn {yarn}",
                self.yarn
            )))
        }
    }
}

#[async_trait]
impl LedgerScope for InMemoryLedgerScope {
    fn yarn(&self) -> YarnId {
        self.yarn
    }

    async fn load_ledger(&mut self) -> Result<Option<LedgerRecord>, StoreError> {
        if let Some((record, _)) = &self.ledger {
            return Ok(Some(record.clone()));
        }
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.ledgers.get(&self.yarn).cloned())
    }

    async fn append_transaction(
        &mut self,
        transaction: &YarnTransaction,
    ) -> Result<(), StoreError> {
        self.ensure_own_yarn(transaction.yarn)?;
        self.journal.push(transaction.clone());
        Ok(())
    }

    async fn upsert_pending_requisition(
        &mut self,
        signal: &RequisitionSignal,
    ) -> Result<Requisition, StoreError> {
        self.ensure_own_yarn(signal.yarn)?;
        let now = Utc::now();

        let existing = match self.requisition.take() {
            Some(staged) => Some(staged),
            None => {
                let state = self.state.read().map_err(|_| poisoned())?;
                state.pending_requisition(self.yarn).cloned()
            }
        };

        let requisition = match existing {
            Some(mut pending) => {
                pending
                    .refresh(signal, now)
                    .map_err(|e| StoreError::Conflict(e.to_string()))?;
                pending
            }
            None => Requisition::raise(signal, now),
        };

        self.requisition = Some(requisition.clone());
        Ok(requisition)
    }

    async fn save_ledger(
        &mut self,
        ledger: &mut YarnLedger,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError> {
        self.ensure_own_yarn(ledger.yarn())?;
        let current = match &self.ledger {
            Some((record, _)) => record.version,
            None => self.state.read().map_err(|_| poisoned())?.ledger_version(self.yarn),
        };
        if !expected_version.matches(current) {
            return Err(StoreError::Conflict(format!(
                "ledger {}: expected {expected_version:?}, found {current}",
                self.yarn
            )));
        }

        // The staged row remembers the version it must replace at commit time.
        let base = match &self.ledger {
            Some((_, base)) => *base,
            None => ExpectedVersion::Exact(current),
        };
        ledger.mark_saved();
        self.ledger = Some((ledger.to_record(), base));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let scope = *self;
        let mut state = scope.state.write().map_err(|_| poisoned())?;

        // Validate everything before touching state so a failure leaves it intact.
        if let Some((_, base)) = &scope.ledger {
            let current = state.ledger_version(scope.yarn);
            if !base.matches(current) {
                return Err(StoreError::Conflict(format!(
                    "ledger {} moved to version {current} during the scope",
                    scope.yarn
                )));
            }
        }
        if let Some(req) = &scope.requisition {
            match state.requisitions.iter().find(|r| r.id == req.id) {
                Some(stored) if !stored.is_pending() => {
                    return Err(StoreError::Conflict(format!(
                        "requisition {} was closed during the scope",
                        req.id
                    )));
                }
                Some(_) => {}
                None => {
                    if state.pending_requisition(scope.yarn).is_some() {
                        return Err(StoreError::Conflict(format!(
                            "yarn {} already has a pending requisition",
                            scope.yarn
                        )));
                    }
                }
            }
        }

        state.journal.extend(scope.journal);
        if let Some(req) = scope.requisition {
            match state.requisitions.iter_mut().find(|r| r.id == req.id) {
                Some(stored) => *stored = req,
                None => state.requisitions.push(req),
            }
        }
        if let Some((record, _)) = scope.ledger {
            state.ledgers.insert(scope.yarn, record);
        }
        Ok(())
    }
}
