use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::error::StoreError;

/// Layer-1 (database) configuration entry, keyed by `(namespace, key)`
/// (spec §3 "Config entry", §4.5).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub namespace: String,
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

const CONFIG_COLUMNS: &str = "namespace, key, value, updated_at";

impl ConfigEntry {
    pub async fn get(pool: &SqlitePool, namespace: &str, key: &str) -> Result<Option<Self>, StoreError> {
        let sql = format!("SELECT {CONFIG_COLUMNS} FROM config_entries WHERE namespace = ? AND key = ?");
        let entry = sqlx::query_as::<_, ConfigEntry>(&sql)
            .bind(namespace)
            .bind(key)
            .fetch_optional(pool)
            .await?;
        Ok(entry)
    }

    pub async fn list_namespace(pool: &SqlitePool, namespace: &str) -> Result<Vec<Self>, StoreError> {
        let sql = format!("SELECT {CONFIG_COLUMNS} FROM config_entries WHERE namespace = ? ORDER BY key ASC");
        let entries = sqlx::query_as::<_, ConfigEntry>(&sql)
            .bind(namespace)
            .fetch_all(pool)
            .await?;
        Ok(entries)
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Self>, StoreError> {
        let sql = format!("SELECT {CONFIG_COLUMNS} FROM config_entries ORDER BY namespace ASC, key ASC");
        let entries = sqlx::query_as::<_, ConfigEntry>(&sql).fetch_all(pool).await?;
        Ok(entries)
    }

    /// Upsert layer-1 value for `(namespace, key)`. Callers invalidate any
    /// in-memory cache themselves (spec §4.5 "Mutation").
    pub async fn put(pool: &SqlitePool, namespace: &str, key: &str, value: &str) -> Result<Self, StoreError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO config_entries (namespace, key, value, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(namespace)
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            updated_at: now,
        })
    }

    /// Remove a layer-1 entry, reverting lookups to layer 2/built-in.
    pub async fn delete(pool: &SqlitePool, namespace: &str, key: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM config_entries WHERE namespace = ? AND key = ?")
            .bind(namespace)
            .bind(key)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("config_entry", format!("{namespace}/{key}")));
        }
        Ok(())
    }
}

/// Projection row for the `tools` table (spec §3 "Auxiliary").
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ToolRow {
    pub name: String,
    pub task_class: String,
    pub description: Option<String>,
}

/// Projection row for the `task_classes` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskClassRow {
    pub name: String,
    pub timeout: i64,
    pub description: Option<String>,
}

/// Projection row for the `prompts` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PromptRow {
    pub name: String,
    pub content: String,
    pub description: Option<String>,
}

impl ToolRow {
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Self>, StoreError> {
        let rows = sqlx::query_as::<_, ToolRow>("SELECT name, task_class, description FROM tools ORDER BY name")
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    pub async fn get(pool: &SqlitePool, name: &str) -> Result<Option<Self>, StoreError> {
        let row = sqlx::query_as::<_, ToolRow>("SELECT name, task_class, description FROM tools WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, StoreError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tools")
            .fetch_one(pool)
            .await?;
        Ok(n)
    }

    /// Atomically rewrite the whole projection to match a `tools.all` write
    /// (spec §4.5 "Mutation"). The config table remains the source of truth.
    pub async fn replace_all(pool: &SqlitePool, rows: &[ToolRow]) -> Result<(), StoreError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM tools").execute(&mut *tx).await?;
        for row in rows {
            sqlx::query("INSERT INTO tools (name, task_class, description) VALUES (?, ?, ?)")
                .bind(&row.name)
                .bind(&row.task_class)
                .bind(&row.description)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

impl TaskClassRow {
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Self>, StoreError> {
        let rows =
            sqlx::query_as::<_, TaskClassRow>("SELECT name, timeout, description FROM task_classes ORDER BY name")
                .fetch_all(pool)
                .await?;
        Ok(rows)
    }

    pub async fn get(pool: &SqlitePool, name: &str) -> Result<Option<Self>, StoreError> {
        let row = sqlx::query_as::<_, TaskClassRow>(
            "SELECT name, timeout, description FROM task_classes WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, StoreError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM task_classes")
            .fetch_one(pool)
            .await?;
        Ok(n)
    }

    pub async fn replace_all(pool: &SqlitePool, rows: &[TaskClassRow]) -> Result<(), StoreError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM task_classes").execute(&mut *tx).await?;
        for row in rows {
            sqlx::query("INSERT INTO task_classes (name, timeout, description) VALUES (?, ?, ?)")
                .bind(&row.name)
                .bind(row.timeout)
                .bind(&row.description)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Used by `DELETE task_classes/{name}` to enforce spec §8 B3: a task
    /// class referenced by any tool cannot be removed.
    pub async fn is_referenced_by_any_tool(pool: &SqlitePool, name: &str) -> Result<bool, StoreError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tools WHERE task_class = ?")
            .bind(name)
            .fetch_one(pool)
            .await?;
        Ok(n > 0)
    }
}

impl PromptRow {
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Self>, StoreError> {
        let rows = sqlx::query_as::<_, PromptRow>("SELECT name, content, description FROM prompts ORDER BY name")
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, StoreError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM prompts")
            .fetch_one(pool)
            .await?;
        Ok(n)
    }

    pub async fn replace_all(pool: &SqlitePool, rows: &[PromptRow]) -> Result<(), StoreError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM prompts").execute(&mut *tx).await?;
        for row in rows {
            sqlx::query("INSERT INTO prompts (name, content, description) VALUES (?, ?, ?)")
                .bind(&row.name)
                .bind(&row.content)
                .bind(&row.description)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::connect_in_memory;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let pool = connect_in_memory().await.expect("pool");
        ConfigEntry::put(&pool, "purge.config", "older_than_days", "3")
            .await
            .expect("put");
        let entry = ConfigEntry::get(&pool, "purge.config", "older_than_days")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(entry.value, "3");
    }

    #[tokio::test]
    async fn put_twice_upserts() {
        let pool = connect_in_memory().await.expect("pool");
        ConfigEntry::put(&pool, "ns", "k", "1").await.expect("first");
        ConfigEntry::put(&pool, "ns", "k", "2").await.expect("second");
        let entry = ConfigEntry::get(&pool, "ns", "k").await.expect("get").expect("present");
        assert_eq!(entry.value, "2");
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let pool = connect_in_memory().await.expect("pool");
        let err = ConfigEntry::delete(&pool, "ns", "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn task_class_referenced_by_tool_is_detected() {
        let pool = connect_in_memory().await.expect("pool");
        TaskClassRow::replace_all(
            &pool,
            &[TaskClassRow {
                name: "FAST_SCRIPT".into(),
                timeout: 120,
                description: None,
            }],
        )
        .await
        .expect("seed class");
        ToolRow::replace_all(
            &pool,
            &[ToolRow {
                name: "run-bash".into(),
                task_class: "FAST_SCRIPT".into(),
                description: None,
            }],
        )
        .await
        .expect("seed tool");

        assert!(
            TaskClassRow::is_referenced_by_any_tool(&pool, "FAST_SCRIPT")
                .await
                .expect("check")
        );
        assert!(
            !TaskClassRow::is_referenced_by_any_tool(&pool, "MEDIUM_SCRIPT")
                .await
                .expect("check")
        );
    }
}
