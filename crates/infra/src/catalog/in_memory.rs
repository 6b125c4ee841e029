use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use loomerp_core::YarnId;
use loomerp_inventory::YarnCatalogEntry;

use super::{CatalogError, YarnCatalog};

/// In-memory yarn catalog. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryYarnCatalog {
    entries: RwLock<HashMap<YarnId, YarnCatalogEntry>>,
}

impl InMemoryYarnCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry (renames and threshold changes included).
    pub fn upsert(&self, entry: YarnCatalogEntry) -> Result<(), CatalogError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CatalogError::Backend("lock poisoned".to_string()))?;
        entries.insert(entry.id, entry);
        Ok(())
    }
}

#[async_trait]
impl YarnCatalog for InMemoryYarnCatalog {
    async fn find(&self, yarn: YarnId) -> Result<Option<YarnCatalogEntry>, CatalogError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CatalogError::Backend("lock poisoned".to_string()))?;
        Ok(entries.get(&yarn).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn upsert_replaces_existing_entry() {
        let catalog = InMemoryYarnCatalog::new();
        let id = YarnId::new();
        catalog.upsert(YarnCatalogEntry::new(id, "Cotton 30s", dec!(10))).unwrap();
        catalog.upsert(YarnCatalogEntry::new(id, "Cotton 30s Combed", dec!(25))).unwrap();

        let entry = catalog.find(id).await.unwrap().unwrap();
        assert_eq!(entry.yarn_name, "Cotton 30s Combed");
        assert_eq!(entry.min_quantity, dec!(25));
        assert!(catalog.find(YarnId::new()).await.unwrap().is_none());
    }
}
