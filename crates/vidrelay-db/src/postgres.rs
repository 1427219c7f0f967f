use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};

use crate::kv::{Key, KeyValueStore, KvEntry, KvResult, ListOptions};

/// PostgreSQL-backed store over the `kv_entries` table.
#[derive(Clone)]
pub struct PostgresKv {
    pool: PgPool,
}

impl PostgresKv {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn list_query(reverse: bool) -> &'static str {
    // ORDER BY direction cannot be bound; LIMIT NULL means no limit.
    if reverse {
        r#"
        SELECT key, value
        FROM kv_entries
        WHERE starts_with(key, $1)
        ORDER BY key DESC
        LIMIT $2
        "#
    } else {
        r#"
        SELECT key, value
        FROM kv_entries
        WHERE starts_with(key, $1)
        ORDER BY key ASC
        LIMIT $2
        "#
    }
}

#[async_trait]
impl KeyValueStore for PostgresKv {
    async fn get(&self, key: &Key) -> KvResult<Option<Value>> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE key = $1")
            .bind(key.render())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<Value, _>("value")))
    }

    async fn set(&self, key: &Key, value: Value) -> KvResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key.render())
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &Key) -> KvResult<()> {
        sqlx::query("DELETE FROM kv_entries WHERE key = $1")
            .bind(key.render())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list(&self, prefix: &Key, options: ListOptions) -> KvResult<Vec<KvEntry>> {
        let limit = options
            .limit
            .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX));

        let rows = sqlx::query(list_query(options.reverse))
            .bind(prefix.list_prefix())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| KvEntry {
                key: row.get("key"),
                value: row.get("value"),
            })
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn check_connection(&self) -> KvResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
