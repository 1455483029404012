use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use strum::{Display, EnumString};

use crate::error::StoreError;
use crate::ids;

/// A FIFO container of tasks within one session (spec §3 "Queue").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Active,
    Ended,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Queue {
    pub id: String,
    pub session_id: String,
    pub name: String,
    pub instructions: Option<String>,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Queue {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            name: row.try_get("name")?,
            instructions: row.try_get("instructions")?,
            status: status
                .parse()
                .map_err(|_| sqlx::Error::Decode(format!("invalid queue status: {status}").into()))?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Per-queue task counts, computed live (spec §4.3 "Stats" — no caching).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: i64,
    pub done: i64,
    pub running: i64,
    pub queued: i64,
}

const QUEUE_COLUMNS: &str = "id, session_id, name, instructions, status, created_at, updated_at";

impl Queue {
    pub async fn create(
        pool: &SqlitePool,
        session_id: &str,
        name: &str,
        instructions: Option<&str>,
    ) -> Result<Self, StoreError> {
        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM queues WHERE name = ?")
            .bind(name)
            .fetch_one(pool)
            .await?;
        if existing > 0 {
            return Err(StoreError::Validation(format!(
                "queue name '{name}' already exists"
            )));
        }

        let id = ids::queue_id();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO queues (id, session_id, name, instructions, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'active', ?, ?)",
        )
        .bind(&id)
        .bind(session_id)
        .bind(name)
        .bind(instructions)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StoreError::not_found("session", session_id)
            }
            _ => StoreError::Database(e),
        })?;

        Self::find_by_id(pool, &id)
            .await?
            .ok_or_else(|| StoreError::not_found("queue", id))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Self>, StoreError> {
        let sql = format!("SELECT {QUEUE_COLUMNS} FROM queues WHERE id = ?");
        let queue = sqlx::query_as::<_, Queue>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(queue)
    }

    pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Self>, StoreError> {
        let sql = format!("SELECT {QUEUE_COLUMNS} FROM queues WHERE name = ?");
        let queue = sqlx::query_as::<_, Queue>(&sql)
            .bind(name)
            .fetch_optional(pool)
            .await?;
        Ok(queue)
    }

    pub async fn list(
        pool: &SqlitePool,
        session_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, StoreError> {
        let queues = if let Some(session_id) = session_id {
            let sql = format!(
                "SELECT {QUEUE_COLUMNS} FROM queues WHERE session_id = ? ORDER BY created_at ASC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, Queue>(&sql)
                .bind(session_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
        } else {
            let sql =
                format!("SELECT {QUEUE_COLUMNS} FROM queues ORDER BY created_at ASC LIMIT ? OFFSET ?");
            sqlx::query_as::<_, Queue>(&sql)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await?
        };
        Ok(queues)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        name: Option<&str>,
        instructions: Option<&str>,
    ) -> Result<Self, StoreError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("queue", id))?;

        if let Some(new_name) = name
            && new_name != existing.name
        {
            let collision =
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM queues WHERE name = ? AND id != ?")
                    .bind(new_name)
                    .bind(id)
                    .fetch_one(pool)
                    .await?;
            if collision > 0 {
                return Err(StoreError::Validation(format!(
                    "queue name '{new_name}' already exists"
                )));
            }
        }

        let name = name.unwrap_or(&existing.name);
        let instructions = instructions.or(existing.instructions.as_deref());
        let now = Utc::now();

        sqlx::query("UPDATE queues SET name = ?, instructions = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(instructions)
            .bind(now)
            .bind(id)
            .execute(pool)
            .await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("queue", id))
    }

    /// Transition `active -> ended`. Does not cancel running tasks (spec §4.3).
    pub async fn end(pool: &SqlitePool, id: &str) -> Result<Self, StoreError> {
        Self::set_status(pool, id, QueueStatus::Ended).await
    }

    /// Transition `active -> archived`.
    pub async fn archive(pool: &SqlitePool, id: &str) -> Result<Self, StoreError> {
        Self::set_status(pool, id, QueueStatus::Archived).await
    }

    /// Transition `archived -> active`.
    pub async fn unarchive(pool: &SqlitePool, id: &str) -> Result<Self, StoreError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("queue", id))?;
        if existing.status != QueueStatus::Archived {
            return Err(StoreError::Conflict(format!(
                "queue {id} is {} and cannot be unarchived",
                existing.status
            )));
        }
        Self::set_status(pool, id, QueueStatus::Active).await
    }

    async fn set_status(pool: &SqlitePool, id: &str, status: QueueStatus) -> Result<Self, StoreError> {
        let now = Utc::now();
        let result = sqlx::query("UPDATE queues SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(now)
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("queue", id));
        }
        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("queue", id))
    }

    /// Cascade-delete the queue and its tasks via FK `ON DELETE CASCADE`.
    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM queues WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("queue", id));
        }
        Ok(())
    }

    /// Live per-status task counts for this queue (spec §4.3 "Stats").
    pub async fn stats(pool: &SqlitePool, id: &str) -> Result<QueueStats, StoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) as n FROM tasks WHERE queue_id = ? GROUP BY status")
            .bind(id)
            .fetch_all(pool)
            .await?;

        let mut stats = QueueStats::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let n: i64 = row.try_get("n")?;
            stats.total += n;
            match status.as_str() {
                "queued" => stats.queued = n,
                "running" => stats.running = n,
                "succeeded" | "failed" => stats.done += n,
                _ => {}
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::Project;
    use crate::models::session::Session;
    use crate::pool::connect_in_memory;

    async fn setup() -> (SqlitePool, Session) {
        let pool = connect_in_memory().await.expect("pool");
        let project = Project::get_or_create(&pool, "demo", "/repo").await.expect("project");
        let session = Session::create(&pool, &project.id, "s1", None).await.expect("session");
        (pool, session)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let (pool, session) = setup().await;
        let queue = Queue::create(&pool, &session.id, "q1", Some("run bash"))
            .await
            .expect("create");
        let fetched = Queue::find_by_id(&pool, &queue.id).await.expect("get").expect("present");
        assert_eq!(fetched.name, "q1");
        assert_eq!(fetched.status, QueueStatus::Active);
    }

    #[tokio::test]
    async fn duplicate_name_across_project_is_rejected() {
        let (pool, session) = setup().await;
        Queue::create(&pool, &session.id, "dup", None).await.expect("first");
        let err = Queue::create(&pool, &session.id, "dup", None).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn archive_then_unarchive_round_trips() {
        let (pool, session) = setup().await;
        let queue = Queue::create(&pool, &session.id, "q2", None).await.expect("create");
        let archived = Queue::archive(&pool, &queue.id).await.expect("archive");
        assert_eq!(archived.status, QueueStatus::Archived);
        let active = Queue::unarchive(&pool, &queue.id).await.expect("unarchive");
        assert_eq!(active.status, QueueStatus::Active);
    }

    #[tokio::test]
    async fn unarchive_non_archived_is_conflict() {
        let (pool, session) = setup().await;
        let queue = Queue::create(&pool, &session.id, "q3", None).await.expect("create");
        let err = Queue::unarchive(&pool, &queue.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
