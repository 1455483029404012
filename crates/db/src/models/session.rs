use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use strum::{Display, EnumString};

use crate::error::StoreError;
use crate::ids;

/// A human-scoped grouping of queues (spec §3 "Session").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Session {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            status: status
                .parse()
                .map_err(|_| sqlx::Error::Decode(format!("invalid session status: {status}").into()))?,
            started_at: row.try_get("started_at")?,
            ended_at: row.try_get("ended_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

const SESSION_COLUMNS: &str =
    "id, project_id, name, description, status, started_at, ended_at, created_at, updated_at";

impl Session {
    pub async fn create(
        pool: &SqlitePool,
        project_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Self, StoreError> {
        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions WHERE name = ?")
            .bind(name)
            .fetch_one(pool)
            .await?;
        if existing > 0 {
            return Err(StoreError::Validation(format!(
                "session name '{name}' already exists"
            )));
        }

        let id = ids::session_id();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO sessions (id, project_id, name, description, status, started_at, ended_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'active', ?, NULL, ?, ?)",
        )
        .bind(&id)
        .bind(project_id)
        .bind(name)
        .bind(description)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StoreError::not_found("project", project_id)
            }
            _ => StoreError::Database(e),
        })?;

        Self::find_by_id(pool, &id)
            .await?
            .ok_or_else(|| StoreError::not_found("session", id))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Self>, StoreError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?");
        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(session)
    }

    pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Self>, StoreError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE name = ?");
        let session = sqlx::query_as::<_, Session>(&sql)
            .bind(name)
            .fetch_optional(pool)
            .await?;
        Ok(session)
    }

    pub async fn list(
        pool: &SqlitePool,
        project_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, StoreError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE project_id = ? ORDER BY created_at ASC LIMIT ? OFFSET ?"
        );
        let sessions = sqlx::query_as::<_, Session>(&sql)
            .bind(project_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;
        Ok(sessions)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Self, StoreError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("session", id))?;

        if let Some(new_name) = name
            && new_name != existing.name
        {
            let collision = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM sessions WHERE name = ? AND id != ?",
            )
            .bind(new_name)
            .bind(id)
            .fetch_one(pool)
            .await?;
            if collision > 0 {
                return Err(StoreError::Validation(format!(
                    "session name '{new_name}' already exists"
                )));
            }
        }

        let name = name.unwrap_or(&existing.name);
        let description = description.or(existing.description.as_deref());
        let now = Utc::now();

        sqlx::query(
            "UPDATE sessions SET name = ?, description = ?, updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(description)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("session", id))
    }

    /// Mark the session ended. Advisory only — does not cascade to queues.
    pub async fn end(pool: &SqlitePool, id: &str) -> Result<Self, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE sessions SET status = 'ended', ended_at = ?, updated_at = ? WHERE id = ? AND status = 'active'",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            let existing = Self::find_by_id(pool, id)
                .await?
                .ok_or_else(|| StoreError::not_found("session", id))?;
            if existing.status == SessionStatus::Ended {
                return Ok(existing);
            }
        }

        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("session", id))
    }

    /// Delete the session, cascading to its queues and their tasks via FK
    /// `ON DELETE CASCADE` (spec §9 "Cascade semantics").
    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("session", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::Project;
    use crate::pool::connect_in_memory;

    async fn setup() -> (SqlitePool, Project) {
        let pool = connect_in_memory().await.expect("pool");
        let project = Project::get_or_create(&pool, "demo", "/repo").await.expect("project");
        (pool, project)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let (pool, project) = setup().await;
        let session = Session::create(&pool, &project.id, "demo", None).await.expect("create");
        let fetched = Session::find_by_id(&pool, &session.id).await.expect("get").expect("present");
        assert_eq!(fetched.name, "demo");
        assert_eq!(fetched.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let (pool, project) = setup().await;
        Session::create(&pool, &project.id, "dup", None).await.expect("first");
        let err = Session::create(&pool, &project.id, "dup", None).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_cascades_to_queues_and_tasks() {
        use crate::models::queue::Queue;
        use crate::models::task::Task;

        let (pool, project) = setup().await;
        let session = Session::create(&pool, &project.id, "to-delete", None).await.expect("session");
        let queue = Queue::create(&pool, &session.id, "q1", None).await.expect("queue");
        Task::enqueue(&pool, &queue.id, "run-bash", "FAST_SCRIPT", None, None)
            .await
            .expect("task");

        Session::delete(&pool, &session.id).await.expect("delete");

        assert!(Queue::find_by_id(&pool, &queue.id).await.expect("get").is_none());
        let remaining = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(remaining, 0);
    }
}
