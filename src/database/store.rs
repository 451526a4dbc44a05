use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;
use tracing::debug;

use crate::database::manager::StoreError;
use crate::database::query_builder::QueryBuilder;
use crate::entities::EntityKind;

/// Generic record access, keyed by entity kind and a JSON filter.
///
/// This is the seam the cascade executor runs against: the engine never
/// touches SQL itself, so tests drive it with an instrumented in-memory
/// implementation and production code uses [`PgStore`] or, for an atomic
/// cascade, [`PgTransactionStore`].
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Resolve the ids of all records matching `filter`.
    async fn find_ids(&self, kind: EntityKind, filter: &Value) -> Result<Vec<i64>, StoreError>;

    /// Count records matching `filter`.
    async fn count(&self, kind: EntityKind, filter: &Value) -> Result<u64, StoreError>;

    /// Hard-delete records matching `filter`, returning rows affected.
    async fn destroy(&self, kind: EntityKind, filter: &Value) -> Result<u64, StoreError>;

    /// Apply `patch` to records matching `filter`, returning rows affected.
    async fn update(&self, kind: EntityKind, filter: &Value, patch: &Value)
        -> Result<u64, StoreError>;
}

/// Pool-backed store. Each operation runs on its own connection; a cascade
/// executed against this store is not atomic.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a transaction-backed store. Commit or roll back explicitly;
    /// dropping it without committing rolls back.
    pub async fn begin(&self) -> Result<PgTransactionStore, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgTransactionStore { tx: Mutex::new(tx) })
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn find_ids(&self, kind: EntityKind, filter: &Value) -> Result<Vec<i64>, StoreError> {
        QueryBuilder::new(kind.table_name(), filter)
            .select_ids(&self.pool)
            .await
    }

    async fn count(&self, kind: EntityKind, filter: &Value) -> Result<u64, StoreError> {
        QueryBuilder::new(kind.table_name(), filter)
            .count(&self.pool)
            .await
    }

    async fn destroy(&self, kind: EntityKind, filter: &Value) -> Result<u64, StoreError> {
        let affected = QueryBuilder::new(kind.table_name(), filter)
            .delete(&self.pool)
            .await?;
        debug!(kind = %kind, affected, "destroyed records");
        Ok(affected)
    }

    async fn update(
        &self,
        kind: EntityKind,
        filter: &Value,
        patch: &Value,
    ) -> Result<u64, StoreError> {
        let affected = QueryBuilder::new(kind.table_name(), filter)
            .update(patch, &self.pool)
            .await?;
        debug!(kind = %kind, affected, "updated records");
        Ok(affected)
    }
}

/// Store bound to a single transaction, so a whole cascade commits or rolls
/// back as one unit. The legacy service committed each step separately and
/// could leave half-cascaded state behind on failure.
pub struct PgTransactionStore {
    tx: Mutex<Transaction<'static, Postgres>>,
}

impl PgTransactionStore {
    pub async fn commit(self) -> Result<(), StoreError> {
        self.tx.into_inner().commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), StoreError> {
        self.tx.into_inner().rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for PgTransactionStore {
    async fn find_ids(&self, kind: EntityKind, filter: &Value) -> Result<Vec<i64>, StoreError> {
        let mut tx = self.tx.lock().await;
        QueryBuilder::new(kind.table_name(), filter)
            .select_ids(&mut **tx)
            .await
    }

    async fn count(&self, kind: EntityKind, filter: &Value) -> Result<u64, StoreError> {
        let mut tx = self.tx.lock().await;
        QueryBuilder::new(kind.table_name(), filter)
            .count(&mut **tx)
            .await
    }

    async fn destroy(&self, kind: EntityKind, filter: &Value) -> Result<u64, StoreError> {
        let mut tx = self.tx.lock().await;
        QueryBuilder::new(kind.table_name(), filter)
            .delete(&mut **tx)
            .await
    }

    async fn update(
        &self,
        kind: EntityKind,
        filter: &Value,
        patch: &Value,
    ) -> Result<u64, StoreError> {
        let mut tx = self.tx.lock().await;
        QueryBuilder::new(kind.table_name(), filter)
            .update(patch, &mut **tx)
            .await
    }
}
