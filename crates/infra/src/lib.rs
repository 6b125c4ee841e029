//! Infrastructure layer: storage, catalog lookups, the atomic commit pipeline
//! and configuration.

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod services;
pub mod store;

pub use catalog::{CatalogError, InMemoryYarnCatalog, PostgresYarnCatalog, YarnCatalog};
pub use config::{ConfigError, InventoryConfig, StorageBackend};
pub use coordinator::{CommitError, CommitOutcome, TransactionCoordinator};
pub use services::{CatalogHandle, InventoryCoordinator, InventoryServices, build_services};
pub use store::{
    InMemoryInventoryStore, InventoryStore, LedgerFilter, LedgerScope, Page, Pagination,
    PostgresInventoryStore, RequisitionFilter, StoreError, TransactionFilter,
};
