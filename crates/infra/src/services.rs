//! Backend selection and wiring.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::info;

use loomerp_inventory::YarnCatalogEntry;

use crate::catalog::{CatalogError, InMemoryYarnCatalog, PostgresYarnCatalog, YarnCatalog};
use crate::config::{InventoryConfig, StorageBackend};
use crate::coordinator::TransactionCoordinator;
use crate::store::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, StoreError};

pub type InventoryCoordinator =
    TransactionCoordinator<Arc<dyn InventoryStore>, Arc<dyn YarnCatalog>>;

/// Write access to whichever catalog backs the coordinator.
#[derive(Debug, Clone)]
pub enum CatalogHandle {
    InMemory(Arc<InMemoryYarnCatalog>),
    Postgres(Arc<PostgresYarnCatalog>),
}

impl CatalogHandle {
    pub async fn register(&self, entry: YarnCatalogEntry) -> Result<(), CatalogError> {
        match self {
            CatalogHandle::InMemory(catalog) => catalog.upsert(entry),
            CatalogHandle::Postgres(catalog) => catalog.upsert(&entry).await,
        }
    }
}

pub struct InventoryServices {
    pub coordinator: InventoryCoordinator,
    pub catalog: CatalogHandle,
}

/// Wire store, catalog and coordinator for the configured backend.
///
/// The Postgres path applies the schema before returning.
pub async fn build_services(config: &InventoryConfig) -> Result<InventoryServices, StoreError> {
    let (store, catalog, handle): (Arc<dyn InventoryStore>, Arc<dyn YarnCatalog>, CatalogHandle) =
        match &config.backend {
            StorageBackend::InMemory => {
                info!("using in-memory inventory store");
                let store: Arc<dyn InventoryStore> = Arc::new(InMemoryInventoryStore::new());
                let catalog = Arc::new(InMemoryYarnCatalog::new());
                let lookup: Arc<dyn YarnCatalog> = catalog.clone();
                (store, lookup, CatalogHandle::InMemory(catalog))
            }
            StorageBackend::Postgres {
                database_url,
                max_connections,
            } => {
                info!(max_connections = *max_connections, "using postgres inventory store");
                let pool = PgPoolOptions::new()
                    .max_connections(*max_connections)
                    .connect(database_url)
                    .await
                    .map_err(|e| {
                        StoreError::Backend(format!("failed to connect to postgres: {e}"))
                    })?;

                let postgres = PostgresInventoryStore::new(pool.clone());
                postgres.migrate().await?;
                let store: Arc<dyn InventoryStore> = Arc::new(postgres);
                let catalog = Arc::new(PostgresYarnCatalog::new(pool));
                let lookup: Arc<dyn YarnCatalog> = catalog.clone();
                (store, lookup, CatalogHandle::Postgres(catalog))
            }
        };

    let coordinator = TransactionCoordinator::new(store, catalog)
        .with_thresholds(config.thresholds)
        .with_page_limit(config.page_limit);

    Ok(InventoryServices {
        coordinator,
        catalog: handle,
    })
}
