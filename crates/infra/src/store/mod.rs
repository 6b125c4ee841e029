//! Inventory storage boundary.
//!
//! The write path is a per-yarn atomic scope ([`LedgerScope`]) opened through
//! [`InventoryStore::begin`]: ledger, journal and requisition writes inside one
//! scope commit together or not at all. Reads go straight to the store and see
//! the last committed state.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use query::{LedgerFilter, Page, Pagination, RequisitionFilter, TransactionFilter};
pub use r#trait::{InventoryStore, LedgerScope, StoreError};
