//! Postgres-backed inventory store.
//!
//! Each [`LedgerScope`] is one database transaction. On open it takes a
//! transaction-scoped advisory lock keyed by the yarn id, so two scopes on the
//! same yarn serialize even before the yarn has a ledger row; the ledger row
//! itself is then read `FOR UPDATE`. Dropping the scope rolls the transaction
//! back.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Second pending requisition, concurrent first insert of a ledger |
//! | Database (serialization failure) | `40001` | `Conflict` | Concurrent write under serializable isolation |
//! | Database (deadlock detected) | `40P01` | `Conflict` | Lock cycle between scopes |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed | N/A | `Backend` | Connection pool was closed |
//! | Other | N/A | `Backend` | Network errors, connection failures, etc. |

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use loomerp_core::{ExpectedVersion, RequisitionId, TransactionId, YarnId};
use loomerp_inventory::{
    AlertStatus, BucketRecord, InventoryStatus, LedgerRecord, Requisition, RequisitionSignal,
    TransactionKind, YarnLedger, YarnTransaction,
};

use super::query::{LedgerFilter, Page, Pagination, RequisitionFilter, TransactionFilter};
use super::r#trait::{InventoryStore, LedgerScope, StoreError, restore_ledger};

/// Idempotent schema for ledgers, journal, requisitions and the yarn catalog.
pub const SCHEMA: &str = include_str!("../../migrations/0001_yarn_inventory.sql");

const LEDGER_COLUMNS: &str = r#"
    yarn_id, yarn_name,
    long_total_weight, long_tear_weight, long_net_weight, long_number_of_cones,
    short_total_weight, short_tear_weight, short_net_weight, short_number_of_cones,
    total_total_weight, total_tear_weight, total_net_weight, total_number_of_cones,
    blocked_net_weight, inventory_status, overbooked, version, created_at, updated_at
"#;

const TRANSACTION_COLUMNS: &str = r#"
    id, yarn_id, yarn_name, transaction_type, transaction_date,
    net_weight, total_weight, tear_weight, number_of_cones, order_ref, created_at
"#;

const REQUISITION_COLUMNS: &str = r#"
    id, yarn_id, yarn_name, min_qty, available_qty, blocked_qty,
    alert_status, po_sent, created_at, updated_at
"#;

/// Postgres-backed inventory store.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Apply [`SCHEMA`]. Safe to run on every start.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self), fields(yarn_id = %yarn), err)]
    async fn begin(&self, yarn: YarnId) -> Result<Box<dyn LedgerScope>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(yarn.as_uuid().to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_yarn", e))?;

        Ok(Box::new(PostgresLedgerScope { yarn, tx }))
    }

    #[instrument(skip(self), fields(yarn_id = %yarn), err)]
    async fn get_ledger(&self, yarn: YarnId) -> Result<Option<YarnLedger>, StoreError> {
        let sql = format!("SELECT {LEDGER_COLUMNS} FROM yarn_ledgers WHERE yarn_id = $1");
        let row = sqlx::query(&sql)
            .bind(yarn.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_ledger", e))?;

        row.map(|r| decode_ledger(&r).and_then(restore_ledger)).transpose()
    }

    #[instrument(skip(self, filter), fields(row_count = tracing::field::Empty), err)]
    async fn query_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<YarnTransaction>, StoreError> {
        let sql = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM yarn_transactions
            WHERE ($1::text IS NULL OR transaction_type = $1)
                AND ($2::uuid IS NULL OR yarn_id = $2)
                AND ($3::text IS NULL OR yarn_name ILIKE $3 ESCAPE '\')
                AND ($4::text IS NULL OR order_ref = $4)
                AND ($5::timestamptz IS NULL OR transaction_date >= $5)
                AND ($6::timestamptz IS NULL OR transaction_date <= $6)
            ORDER BY transaction_date DESC, created_at DESC, id DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(filter.kind.map(|k| k.as_str()))
            .bind(filter.yarn_id.map(|y| *y.as_uuid()))
            .bind(filter.yarn_name.as_deref().map(like_pattern))
            .bind(filter.order_ref.as_deref())
            .bind(filter.date_from)
            .bind(filter.date_to)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("query_transactions", e))?;

        Span::current().record("row_count", rows.len());
        rows.iter().map(decode_transaction).collect()
    }

    #[instrument(skip(self, filter), fields(limit = pagination.limit, offset = pagination.offset), err)]
    async fn query_ledgers(
        &self,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> Result<Page<YarnLedger>, StoreError> {
        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR yarn_id = $1)
                AND ($2::text IS NULL OR yarn_name ILIKE $2 ESCAPE '\')
                AND ($3::text IS NULL OR COALESCE(inventory_status, 'in_stock') = $3)
                AND ($4::boolean IS NULL OR COALESCE(overbooked, false) = $4)
        "#;
        let yarn_id = filter.yarn_id.map(|y| *y.as_uuid());
        let name = filter.yarn_name.as_deref().map(like_pattern);
        let status = filter.status.map(|s| s.as_str());

        let count_sql = format!("SELECT COUNT(*) AS total FROM yarn_ledgers {WHERE}");
        let count_row = sqlx::query(&count_sql)
            .bind(yarn_id)
            .bind(name.as_deref())
            .bind(status)
            .bind(filter.overbooked)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_ledgers", e))?;
        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| StoreError::Backend(format!("failed to read count: {e}")))?;

        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM yarn_ledgers {WHERE} \
             ORDER BY COALESCE(yarn_name, ''), yarn_id LIMIT $5 OFFSET $6"
        );
        let rows = sqlx::query(&sql)
            .bind(yarn_id)
            .bind(name.as_deref())
            .bind(status)
            .bind(filter.overbooked)
            .bind(i64::from(pagination.limit))
            .bind(i64::from(pagination.offset))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("query_ledgers", e))?;

        let items = rows
            .iter()
            .map(|r| decode_ledger(r).and_then(restore_ledger))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total.max(0) as u64, pagination))
    }

    #[instrument(skip(self, filter), err)]
    async fn query_requisitions(
        &self,
        filter: &RequisitionFilter,
    ) -> Result<Vec<Requisition>, StoreError> {
        let sql = format!(
            r#"
            SELECT {REQUISITION_COLUMNS}
            FROM yarn_requisitions
            WHERE ($1::uuid IS NULL OR yarn_id = $1)
                AND ($2::boolean IS NULL OR po_sent = $2)
                AND ($3::text IS NULL OR alert_status = $3)
            ORDER BY updated_at DESC, id DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(filter.yarn_id.map(|y| *y.as_uuid()))
            .bind(filter.po_sent)
            .bind(filter.alert_status.map(|a| a.as_str()))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("query_requisitions", e))?;

        rows.iter().map(decode_requisition).collect()
    }

    #[instrument(skip(self), fields(requisition_id = %id), err)]
    async fn mark_po_sent(&self, id: RequisitionId) -> Result<Requisition, StoreError> {
        let sql = format!(
            r#"
            UPDATE yarn_requisitions
            SET updated_at = CASE WHEN po_sent THEN updated_at ELSE $2 END,
                po_sent = true
            WHERE id = $1
            RETURNING {REQUISITION_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(Utc::now())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("mark_po_sent", e))?;

        match row {
            Some(row) => decode_requisition(&row),
            None => Err(StoreError::NotFound(format!("requisition {id}"))),
        }
    }
}

/// One open database transaction holding the yarn's advisory lock.
struct PostgresLedgerScope {
    yarn: YarnId,
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerScope for PostgresLedgerScope {
    fn yarn(&self) -> YarnId {
        self.yarn
    }

    async fn load_ledger(&mut self) -> Result<Option<LedgerRecord>, StoreError> {
        let sql =
            format!("SELECT {LEDGER_COLUMNS} FROM yarn_ledgers WHERE yarn_id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(self.yarn.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_ledger", e))?;

        row.map(|r| decode_ledger(&r)).transpose()
    }

    async fn append_transaction(
        &mut self,
        transaction: &YarnTransaction,
    ) -> Result<(), StoreError> {
        if transaction.yarn != self.yarn {
            return Err(StoreError::Backend(format!(
                "scope for yarn {} cannot write yarn {}",
                self.yarn, transaction.yarn
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO yarn_transactions (
                id, yarn_id, yarn_name, transaction_type, transaction_date,
                net_weight, total_weight, tear_weight, number_of_cones, order_ref, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.yarn.as_uuid())
        .bind(&transaction.yarn_name)
        .bind(transaction.kind.as_str())
        .bind(transaction.transaction_date)
        .bind(transaction.net_weight)
        .bind(transaction.total_weight)
        .bind(transaction.tear_weight)
        .bind(transaction.number_of_cones)
        .bind(transaction.order_ref.as_deref())
        .bind(transaction.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_transaction", e))?;

        Ok(())
    }

    async fn upsert_pending_requisition(
        &mut self,
        signal: &RequisitionSignal,
    ) -> Result<Requisition, StoreError> {
        let now = Utc::now();
        let sql = format!(
            "SELECT {REQUISITION_COLUMNS} FROM yarn_requisitions \
             WHERE yarn_id = $1 AND po_sent = false FOR UPDATE"
        );
        let existing = sqlx::query(&sql)
            .bind(signal.yarn.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_pending_requisition", e))?
            .map(|r| decode_requisition(&r))
            .transpose()?;

        match existing {
            Some(mut pending) => {
                pending
                    .refresh(signal, now)
                    .map_err(|e| StoreError::Conflict(e.to_string()))?;
                sqlx::query(
                    r#"
                    UPDATE yarn_requisitions
                    SET yarn_name = $2, min_qty = $3, available_qty = $4,
                        blocked_qty = $5, alert_status = $6, updated_at = $7
                    WHERE id = $1 AND po_sent = false
                    "#,
                )
                .bind(pending.id.as_uuid())
                .bind(&pending.yarn_name)
                .bind(pending.min_qty)
                .bind(pending.available_qty)
                .bind(pending.blocked_qty)
                .bind(pending.alert_status.as_str())
                .bind(pending.updated_at)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("refresh_requisition", e))?;
                Ok(pending)
            }
            None => {
                let req = Requisition::raise(signal, now);
                sqlx::query(
                    r#"
                    INSERT INTO yarn_requisitions (
                        id, yarn_id, yarn_name, min_qty, available_qty, blocked_qty,
                        alert_status, po_sent, created_at, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, false, $8, $9)
                    "#,
                )
                .bind(req.id.as_uuid())
                .bind(req.yarn.as_uuid())
                .bind(&req.yarn_name)
                .bind(req.min_qty)
                .bind(req.available_qty)
                .bind(req.blocked_qty)
                .bind(req.alert_status.as_str())
                .bind(req.created_at)
                .bind(req.updated_at)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("raise_requisition", e))?;
                Ok(req)
            }
        }
    }

    async fn save_ledger(
        &mut self,
        ledger: &mut YarnLedger,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError> {
        if ledger.yarn() != self.yarn {
            return Err(StoreError::Backend(format!(
                "scope for yarn {} cannot write yarn {}",
                self.yarn,
                ledger.yarn()
            )));
        }

        let expected = match expected_version {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(v as i64),
        };
        let mut saved = ledger.clone();
        saved.mark_saved();
        let record = saved.to_record();

        let result = sqlx::query(
            r#"
            INSERT INTO yarn_ledgers (
                yarn_id, yarn_name,
                long_total_weight, long_tear_weight, long_net_weight, long_number_of_cones,
                short_total_weight, short_tear_weight, short_net_weight, short_number_of_cones,
                total_total_weight, total_tear_weight, total_net_weight, total_number_of_cones,
                blocked_net_weight, inventory_status, overbooked, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20)
            ON CONFLICT (yarn_id) DO UPDATE SET
                yarn_name = EXCLUDED.yarn_name,
                long_total_weight = EXCLUDED.long_total_weight,
                long_tear_weight = EXCLUDED.long_tear_weight,
                long_net_weight = EXCLUDED.long_net_weight,
                long_number_of_cones = EXCLUDED.long_number_of_cones,
                short_total_weight = EXCLUDED.short_total_weight,
                short_tear_weight = EXCLUDED.short_tear_weight,
                short_net_weight = EXCLUDED.short_net_weight,
                short_number_of_cones = EXCLUDED.short_number_of_cones,
                total_total_weight = EXCLUDED.total_total_weight,
                total_tear_weight = EXCLUDED.total_tear_weight,
                total_net_weight = EXCLUDED.total_net_weight,
                total_number_of_cones = EXCLUDED.total_number_of_cones,
                blocked_net_weight = EXCLUDED.blocked_net_weight,
                inventory_status = EXCLUDED.inventory_status,
                overbooked = EXCLUDED.overbooked,
                version = EXCLUDED.version,
                created_at = COALESCE(yarn_ledgers.created_at, EXCLUDED.created_at),
                updated_at = EXCLUDED.updated_at
            WHERE $21::bigint IS NULL OR yarn_ledgers.version = $21
            "#,
        )
        .bind(self.yarn.as_uuid())
        .bind(record.yarn_name.as_deref())
        .bind(record.long_term.total_weight)
        .bind(record.long_term.tear_weight)
        .bind(record.long_term.net_weight)
        .bind(record.long_term.number_of_cones)
        .bind(record.short_term.total_weight)
        .bind(record.short_term.tear_weight)
        .bind(record.short_term.net_weight)
        .bind(record.short_term.number_of_cones)
        .bind(record.total.total_weight)
        .bind(record.total.tear_weight)
        .bind(record.total.net_weight)
        .bind(record.total.number_of_cones)
        .bind(record.blocked_net_weight)
        .bind(record.inventory_status.map(|s| s.as_str()))
        .bind(record.overbooked)
        .bind(record.version as i64)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(expected)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_ledger", e))?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Conflict(format!(
                "ledger {}: expected {expected_version:?}, stored version differs",
                self.yarn
            )));
        }

        *ledger = saved;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let scope = *self;
        scope
            .tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

/// `%needle%` with LIKE metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn decode_error(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("failed to decode {what} row: {err}"))
}

fn bucket(row: &PgRow, prefix: &str) -> Result<BucketRecord, sqlx::Error> {
    let col = |name: &str| row.try_get::<Option<Decimal>, _>(format!("{prefix}_{name}").as_str());
    Ok(BucketRecord {
        total_weight: col("total_weight")?,
        tear_weight: col("tear_weight")?,
        net_weight: col("net_weight")?,
        number_of_cones: col("number_of_cones")?,
    })
}

fn decode_ledger(row: &PgRow) -> Result<LedgerRecord, StoreError> {
    let decode = || -> Result<LedgerRecord, sqlx::Error> {
        let status: Option<String> = row.try_get("inventory_status")?;
        let inventory_status = status
            .map(|s| InventoryStatus::from_str(&s))
            .transpose()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let version: i64 = row.try_get("version")?;
        Ok(LedgerRecord {
            yarn: YarnId::from_uuid(row.try_get("yarn_id")?),
            yarn_name: row.try_get("yarn_name")?,
            long_term: bucket(row, "long")?,
            short_term: bucket(row, "short")?,
            total: bucket(row, "total")?,
            blocked_net_weight: row.try_get("blocked_net_weight")?,
            inventory_status,
            overbooked: row.try_get("overbooked")?,
            version: version.max(0) as u64,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    };
    decode().map_err(|e| decode_error("ledger", e))
}

fn decode_transaction(row: &PgRow) -> Result<YarnTransaction, StoreError> {
    let decode = || -> Result<YarnTransaction, sqlx::Error> {
        let kind: String = row.try_get("transaction_type")?;
        Ok(YarnTransaction {
            id: TransactionId::from_uuid(row.try_get("id")?),
            yarn: YarnId::from_uuid(row.try_get("yarn_id")?),
            yarn_name: row.try_get("yarn_name")?,
            kind: TransactionKind::from_str(&kind).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            transaction_date: row.try_get("transaction_date")?,
            net_weight: row.try_get("net_weight")?,
            total_weight: row.try_get("total_weight")?,
            tear_weight: row.try_get("tear_weight")?,
            number_of_cones: row.try_get("number_of_cones")?,
            order_ref: row.try_get("order_ref")?,
            created_at: row.try_get("created_at")?,
        })
    };
    decode().map_err(|e| decode_error("transaction", e))
}

fn decode_requisition(row: &PgRow) -> Result<Requisition, StoreError> {
    let decode = || -> Result<Requisition, sqlx::Error> {
        let alert: String = row.try_get("alert_status")?;
        Ok(Requisition {
            id: RequisitionId::from_uuid(row.try_get("id")?),
            yarn: YarnId::from_uuid(row.try_get("yarn_id")?),
            yarn_name: row.try_get("yarn_name")?,
            min_qty: row.try_get("min_qty")?,
            available_qty: row.try_get("available_qty")?,
            blocked_qty: row.try_get("blocked_qty")?,
            alert_status: AlertStatus::from_str(&alert)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            po_sent: row.try_get("po_sent")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    };
    decode().map_err(|e| decode_error("requisition", e))
}
