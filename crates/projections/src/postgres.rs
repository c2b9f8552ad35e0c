use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use crate::Result;
use crate::read_model::{FieldFilter, ReadModelStore, with_id};

/// PostgreSQL-backed read model store.
///
/// Documents live in the `read_models` table as `jsonb`; `find` is a
/// containment query (`@>`), which for a flat filter object is exactly
/// field equality on the top-level keys.
#[derive(Clone)]
pub struct PostgresReadModelStore {
    pool: PgPool,
}

impl PostgresReadModelStore {
    /// Creates a new store over an already migrated database.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ReadModelStore for PostgresReadModelStore {
    async fn save(&self, collection: &str, id: &str, data: Value) -> Result<()> {
        let document = Value::Object(with_id(collection, id, data)?);

        sqlx::query(
            r#"
            INSERT INTO read_models (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(document)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let data: Option<Value> =
            sqlx::query_scalar("SELECT data FROM read_models WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(data)
    }

    async fn find(&self, collection: &str, filter: &FieldFilter) -> Result<Vec<Value>> {
        let rows: Vec<Value> =
            sqlx::query_scalar("SELECT data FROM read_models WHERE collection = $1 AND data @> $2")
                .bind(collection)
                .bind(filter.to_json())
                .fetch_all(&self.pool)
                .await?;

        // Containment also matches array elements and nested objects; keep exact equality
        Ok(rows.into_iter().filter(|doc| filter.matches(doc)).collect())
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        sqlx::query("DELETE FROM read_models WHERE collection = $1")
            .bind(collection)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM read_models WHERE collection = $1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
