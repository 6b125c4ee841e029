//! Yarn catalog collaborator.
//!
//! The ledger only needs three facts from the catalog: that a yarn exists, its
//! display name and its procurement minimum.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use loomerp_core::YarnId;
use loomerp_inventory::YarnCatalogEntry;

pub use in_memory::InMemoryYarnCatalog;
pub use postgres::PostgresYarnCatalog;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog backend error: {0}")]
    Backend(String),
}

/// Lookup-by-reference into the yarn catalog.
#[async_trait]
pub trait YarnCatalog: Send + Sync {
    /// `None` when the yarn does not exist.
    async fn find(&self, yarn: YarnId) -> Result<Option<YarnCatalogEntry>, CatalogError>;
}

#[async_trait]
impl<C> YarnCatalog for Arc<C>
where
    C: YarnCatalog + ?Sized,
{
    async fn find(&self, yarn: YarnId) -> Result<Option<YarnCatalogEntry>, CatalogError> {
        (**self).find(yarn).await
    }
}
