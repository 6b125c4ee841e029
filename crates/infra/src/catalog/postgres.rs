use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use tracing::instrument;

use loomerp_core::YarnId;
use loomerp_inventory::YarnCatalogEntry;

use super::{CatalogError, YarnCatalog};

/// Yarn catalog backed by the `yarns` table.
#[derive(Debug, Clone)]
pub struct PostgresYarnCatalog {
    pool: Arc<PgPool>,
}

impl PostgresYarnCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip(self, entry), fields(yarn_id = %entry.id), err)]
    pub async fn upsert(&self, entry: &YarnCatalogEntry) -> Result<(), CatalogError> {
        sqlx::query(
            r#"
            INSERT INTO yarns (id, yarn_name, min_quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                yarn_name = EXCLUDED.yarn_name,
                min_quantity = EXCLUDED.min_quantity
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(&entry.yarn_name)
        .bind(entry.min_quantity)
        .execute(&*self.pool)
        .await
        .map_err(|e| CatalogError::Backend(format!("upsert yarn: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl YarnCatalog for PostgresYarnCatalog {
    #[instrument(skip(self), fields(yarn_id = %yarn), err)]
    async fn find(&self, yarn: YarnId) -> Result<Option<YarnCatalogEntry>, CatalogError> {
        let row = sqlx::query("SELECT id, yarn_name, min_quantity FROM yarns WHERE id = $1")
            .bind(yarn.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| CatalogError::Backend(format!("find yarn: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let decode = || -> Result<YarnCatalogEntry, sqlx::Error> {
            let name: String = row.try_get("yarn_name")?;
            let min: Decimal = row.try_get("min_quantity")?;
            Ok(YarnCatalogEntry::new(YarnId::from_uuid(row.try_get("id")?), name, min))
        };
        decode()
            .map(Some)
            .map_err(|e| CatalogError::Backend(format!("failed to decode yarn row: {e}")))
    }
}
