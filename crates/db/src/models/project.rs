use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::error::StoreError;
use crate::ids;

/// The singleton identity for the local workspace (spec §3 "Project").
/// Created by setup, never deleted by the core.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub repo_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create the project, or return the existing one if already seeded.
    /// There is exactly one project per deployment; `setup` is idempotent.
    pub async fn get_or_create(
        pool: &SqlitePool,
        name: &str,
        repo_path: &str,
    ) -> Result<Self, StoreError> {
        if let Some(existing) = Self::find_singleton(pool).await? {
            return Ok(existing);
        }

        let id = ids::project_id();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO projects (id, name, repo_path, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(repo_path)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(Self {
            id,
            name: name.to_string(),
            repo_path: repo_path.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn find_singleton(pool: &SqlitePool) -> Result<Option<Self>, StoreError> {
        let project = sqlx::query_as::<_, Project>(
            "SELECT id, name, repo_path, created_at, updated_at FROM projects ORDER BY created_at ASC LIMIT 1",
        )
        .fetch_optional(pool)
        .await?;
        Ok(project)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Self>, StoreError> {
        let project = sqlx::query_as::<_, Project>(
            "SELECT id, name, repo_path, created_at, updated_at FROM projects WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::connect_in_memory;

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let pool = connect_in_memory().await.expect("pool");
        let first = Project::get_or_create(&pool, "demo", "/repo")
            .await
            .expect("create");
        let second = Project::get_or_create(&pool, "demo-again", "/other")
            .await
            .expect("reuse");
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "demo");
    }
}
