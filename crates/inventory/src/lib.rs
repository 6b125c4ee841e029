//! Yarn inventory domain.
//!
//! This crate contains the business rules for yarn stock, implemented purely as
//! deterministic domain logic (no IO, no storage). Storage, catalog lookups and
//! the atomic commit pipeline live in `loomerp-infra`.
//!
//! A commit flows through the modules in this order:
//! `normalizer` → `ledger` (load/init) → `applier` → `ledger::recompute_total`
//! → `evaluator` (status + requisition signal).

pub mod applier;
pub mod catalog;
pub mod evaluator;
pub mod ledger;
pub mod metrics;
pub mod normalizer;
pub mod requisition;
pub mod transaction;
pub mod view;

pub use applier::apply;
pub use catalog::YarnCatalogEntry;
pub use evaluator::{InventoryStatus, StockAssessment, StockThresholds, assess, evaluate};
pub use ledger::{BucketRecord, LedgerRecord, YarnLedger, ensure_ledger};
pub use metrics::StockMetrics;
pub use normalizer::{NormalizedTransaction, RawTransactionRequest, normalize};
pub use requisition::{AlertStatus, Requisition, RequisitionSignal};
pub use transaction::{TransactionKind, YarnTransaction};
pub use view::LedgerView;
