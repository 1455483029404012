use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use strum::{Display, EnumString};

use crate::error::StoreError;
use crate::ids;

/// The task lifecycle state machine (spec §4.2 "States").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

/// The unit of work (spec §3 "Task").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub friendly_id: String,
    pub queue_id: String,
    pub tool_name: String,
    pub task_class: String,
    pub payload: Option<String>,
    pub status: TaskStatus,
    pub timeout: i64,
    pub attempts: i64,
    pub result: Option<String>,
    pub result_summary: Option<String>,
    pub error: Option<String>,
    pub error_message: Option<String>,
    pub stale_warned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl FromRow<'_, SqliteRow> for Task {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            friendly_id: row.try_get("friendly_id")?,
            queue_id: row.try_get("queue_id")?,
            tool_name: row.try_get("tool_name")?,
            task_class: row.try_get("task_class")?,
            payload: row.try_get("payload")?,
            status: status
                .parse()
                .map_err(|_| sqlx::Error::Decode(format!("invalid task status: {status}").into()))?,
            timeout: row.try_get("timeout")?,
            attempts: row.try_get("attempts")?,
            result: row.try_get("result")?,
            result_summary: row.try_get("result_summary")?,
            error: row.try_get("error")?,
            error_message: row.try_get("error_message")?,
            stale_warned_at: row.try_get("stale_warned_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
            claimed_at: row.try_get("claimed_at")?,
            completed_at: row.try_get("completed_at")?,
            failed_at: row.try_get("failed_at")?,
        })
    }
}

const TASK_COLUMNS: &str = "id, friendly_id, queue_id, tool_name, task_class, payload, status, timeout, \
    attempts, result, result_summary, error, error_message, stale_warned_at, created_at, updated_at, \
    started_at, finished_at, claimed_at, completed_at, failed_at";

/// Filters accepted by `Task::list` (spec §6 "Operation surface").
#[derive(Debug, Clone, Default)]
pub struct TaskListFilter<'a> {
    pub queue_id: Option<&'a str>,
    pub status: Option<TaskStatus>,
}

/// Derive the presentation-only `friendly_id` from a queue name and task id
/// (spec §3 "Task", §9 "Friendly IDs"). Never used as an identity key.
fn friendly_id(queue_name: &str, task_id: &str) -> String {
    let suffix = &task_id[task_id.len().saturating_sub(4)..];
    format!("{queue_name}-{suffix}")
}

impl Task {
    /// Enqueue a new task (spec §4.2 "Enqueue"). The caller (Lifecycle) has
    /// already resolved `timeout` via the Config Registry; the Store only
    /// persists it and asserts it is positive.
    #[allow(clippy::too_many_arguments)]
    pub async fn enqueue(
        pool: &SqlitePool,
        queue_id: &str,
        queue_name: &str,
        tool_name: &str,
        task_class: &str,
        timeout: i64,
        payload: Option<&str>,
    ) -> Result<Self, StoreError> {
        if timeout <= 0 {
            return Err(StoreError::Validation(format!(
                "timeout must be > 0, got {timeout}"
            )));
        }

        let id = ids::task_id();
        let friendly = friendly_id(queue_name, &id);
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO tasks (id, friendly_id, queue_id, tool_name, task_class, payload, status, \
             timeout, attempts, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 'queued', ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(&friendly)
        .bind(queue_id)
        .bind(tool_name)
        .bind(task_class)
        .bind(payload)
        .bind(timeout)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                StoreError::not_found("queue", queue_id)
            }
            _ => StoreError::Database(e),
        })?;

        Self::find_by_id(pool, &id)
            .await?
            .ok_or_else(|| StoreError::not_found("task", id))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Self>, StoreError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?");
        let task = sqlx::query_as::<_, Task>(&sql).bind(id).fetch_optional(pool).await?;
        Ok(task)
    }

    pub async fn list(
        pool: &SqlitePool,
        filter: TaskListFilter<'_>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, StoreError> {
        let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE 1 = 1");
        if filter.queue_id.is_some() {
            sql.push_str(" AND queue_id = ?");
        }
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        sql.push_str(" ORDER BY created_at ASC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, Task>(&sql);
        if let Some(queue_id) = filter.queue_id {
            query = query.bind(queue_id);
        }
        if let Some(status) = filter.status {
            query = query.bind(status.to_string());
        }
        query = query.bind(limit).bind(offset);

        let tasks = query.fetch_all(pool).await?;
        Ok(tasks)
    }

    /// Partial update of the free-text fields an operator may edit directly.
    /// Lifecycle transitions go through the dedicated operations below, not
    /// this generic path.
    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        tool_name: Option<&str>,
        task_class: Option<&str>,
        payload: Option<&str>,
    ) -> Result<Self, StoreError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("task", id))?;

        let tool_name = tool_name.unwrap_or(&existing.tool_name);
        let task_class = task_class.unwrap_or(&existing.task_class);
        let payload = payload.or(existing.payload.as_deref());
        let now = Utc::now();

        sqlx::query(
            "UPDATE tasks SET tool_name = ?, task_class = ?, payload = ?, updated_at = ? WHERE id = ?",
        )
        .bind(tool_name)
        .bind(task_class)
        .bind(payload)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("task", id))
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("task", id));
        }
        Ok(())
    }

    /// Atomically claim the oldest `queued` task in `queue_id` (spec §4.1
    /// "Transactional contracts"). FIFO tie-break: lower `created_at`, then
    /// lower `id`. Returns `None` if nothing qualifies.
    ///
    /// Runs inside an `IMMEDIATE` transaction so two concurrent callers can
    /// never observe — let alone both claim — the same row (spec §8 P5).
    pub async fn claim_queued_in_queue(pool: &SqlitePool, queue_id: &str) -> Result<Option<Self>, StoreError> {
        let mut tx = pool.begin().await?;

        let candidate = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE queue_id = ? AND status = 'queued' \
             ORDER BY created_at ASC, id ASC LIMIT 1"
        ))
        .bind(queue_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(candidate) = candidate else {
            tx.commit().await?;
            return Ok(None);
        };

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE tasks SET status = 'running', claimed_at = ?, started_at = ?, updated_at = ?, \
             attempts = attempts + 1 WHERE id = ? AND status = 'queued'",
        )
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(&candidate.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Lost the race within our own transaction window — should not
            // happen under IMMEDIATE locking, but fail closed rather than
            // silently returning a stale row.
            tx.rollback().await?;
            return Ok(None);
        }

        let claimed = sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
            .bind(&candidate.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(claimed))
    }

    /// Succeeds only if the row is currently `running` (spec §4.1).
    pub async fn mark_running_to_succeeded(
        pool: &SqlitePool,
        id: &str,
        result_summary: &str,
        result: Option<&str>,
    ) -> Result<Self, StoreError> {
        if result_summary.trim().is_empty() {
            return Err(StoreError::Validation(
                "result_summary is required and must be non-empty".into(),
            ));
        }

        let now = Utc::now();
        let update_result = sqlx::query(
            "UPDATE tasks SET status = 'succeeded', result_summary = ?, result = ?, \
             completed_at = ?, finished_at = ?, updated_at = ? WHERE id = ? AND status = 'running'",
        )
        .bind(result_summary)
        .bind(result)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

        if update_result.rows_affected() == 0 {
            let existing = Self::find_by_id(pool, id)
                .await?
                .ok_or_else(|| StoreError::not_found("task", id))?;
            return Err(StoreError::Conflict(format!(
                "task {id} is {} and cannot be completed (must be running)",
                existing.status
            )));
        }

        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("task", id))
    }

    /// Succeeds for any non-terminal status (spec §4.1): a worker fails a
    /// `running` task, the Watcher auto-fails a `running` task, or a human
    /// explicitly fails a `queued` one.
    pub async fn mark_to_failed(
        pool: &SqlitePool,
        id: &str,
        error_message: &str,
        error_type: Option<&str>,
    ) -> Result<Self, StoreError> {
        if error_message.trim().is_empty() {
            return Err(StoreError::Validation(
                "error_message is required and must be non-empty".into(),
            ));
        }

        let error = match error_type {
            Some(t) if !t.is_empty() => format!("{t}: {error_message}"),
            _ => error_message.to_string(),
        };

        let now = Utc::now();
        let update_result = sqlx::query(
            "UPDATE tasks SET status = 'failed', error = ?, error_message = ?, \
             failed_at = ?, finished_at = ?, updated_at = ? \
             WHERE id = ? AND status IN ('queued', 'running')",
        )
        .bind(&error)
        .bind(error_message)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

        if update_result.rows_affected() == 0 {
            let existing = Self::find_by_id(pool, id)
                .await?
                .ok_or_else(|| StoreError::not_found("task", id))?;
            return Err(StoreError::Conflict(format!(
                "task {id} is {} and cannot be failed (must be queued or running)",
                existing.status
            )));
        }

        Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("task", id))
    }

    /// Set `stale_warned_at` once, on a task crossing the soft deadline
    /// (spec §4.4 "Stale-check pass", step 3). Idempotent: a task already
    /// warned is left untouched by callers that check first.
    pub async fn mark_stale_warned(pool: &SqlitePool, id: &str) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query("UPDATE tasks SET stale_warned_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Clone a terminal task into a fresh `queued` row (spec §4.2
    /// "Requeue"). The original is preserved unchanged for audit (spec §8 P4).
    pub async fn clone_for_requeue(pool: &SqlitePool, id: &str) -> Result<Self, StoreError> {
        let original = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found("task", id))?;

        if !original.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "task {id} is {} and cannot be requeued (must be succeeded or failed)",
                original.status
            )));
        }

        let queue_name: String = sqlx::query_scalar("SELECT name FROM queues WHERE id = ?")
            .bind(&original.queue_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| StoreError::not_found("queue", original.queue_id.clone()))?;

        let new_id = ids::task_id();
        let friendly = friendly_id(&queue_name, &new_id);
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO tasks (id, friendly_id, queue_id, tool_name, task_class, payload, status, \
             timeout, attempts, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 'queued', ?, 0, ?, ?)",
        )
        .bind(&new_id)
        .bind(&friendly)
        .bind(&original.queue_id)
        .bind(&original.tool_name)
        .bind(&original.task_class)
        .bind(&original.payload)
        .bind(original.timeout)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Self::find_by_id(pool, &new_id)
            .await?
            .ok_or_else(|| StoreError::not_found("task", new_id))
    }

    /// All tasks currently `running` with a non-null `started_at`, for the
    /// Watcher's stale-check pass (spec §4.4, step 1).
    pub async fn list_running(pool: &SqlitePool) -> Result<Vec<Self>, StoreError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE status = 'running' AND started_at IS NOT NULL"
        );
        let tasks = sqlx::query_as::<_, Task>(&sql).fetch_all(pool).await?;
        Ok(tasks)
    }

    /// Delete terminal tasks whose `finished_at` predates `cutoff` (spec
    /// §4.4 "Purge pass"). Returns the number of rows removed.
    pub async fn delete_tasks_older_than(pool: &SqlitePool, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM tasks WHERE status IN ('succeeded', 'failed') AND finished_at IS NOT NULL \
             AND finished_at < ?",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Test/backfill helper: set `finished_at` directly, bypassing the
    /// normal complete/fail path, to simulate an aged task (spec §8 Scenario E).
    #[cfg(any(test, feature = "test-support"))]
    pub async fn backdate_finished_at(pool: &SqlitePool, id: &str, finished_at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE tasks SET finished_at = ? WHERE id = ?")
            .bind(finished_at)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Test/backfill helper: backdate `started_at` to simulate elapsed time
    /// for deadline tests (spec §8 Scenario B).
    #[cfg(any(test, feature = "test-support"))]
    pub async fn backdate_started_at(pool: &SqlitePool, id: &str, started_at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE tasks SET started_at = ? WHERE id = ?")
            .bind(started_at)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::Project;
    use crate::models::queue::Queue;
    use crate::models::session::Session;
    use crate::pool::connect_in_memory;
    use chrono::Duration;

    async fn setup() -> (SqlitePool, Queue) {
        let pool = connect_in_memory().await.expect("pool");
        let project = Project::get_or_create(&pool, "demo", "/repo").await.expect("project");
        let session = Session::create(&pool, &project.id, "s1", None).await.expect("session");
        let queue = Queue::create(&pool, &session.id, "default", None).await.expect("queue");
        (pool, queue)
    }

    #[tokio::test]
    async fn enqueue_then_get_round_trips() {
        let (pool, queue) = setup().await;
        let task = Task::enqueue(&pool, &queue.id, &queue.name, "run-bash", "MEDIUM_SCRIPT", 600, None)
            .await
            .expect("enqueue");
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.attempts, 0);
        assert!(task.friendly_id.starts_with("default-"));
    }

    #[tokio::test]
    async fn enqueue_rejects_non_positive_timeout() {
        let (pool, queue) = setup().await;
        let err = Task::enqueue(&pool, &queue.id, &queue.name, "run-bash", "FAST_SCRIPT", 0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn claim_transitions_oldest_queued_task() {
        let (pool, queue) = setup().await;
        let t1 = Task::enqueue(&pool, &queue.id, &queue.name, "a", "FAST_SCRIPT", 120, None)
            .await
            .expect("t1");
        let claimed = Task::claim_queued_in_queue(&pool, &queue.id)
            .await
            .expect("claim")
            .expect("present");
        assert_eq!(claimed.id, t1.id);
        assert_eq!(claimed.status, TaskStatus::Running);
        assert_eq!(claimed.attempts, 1);
        assert!(claimed.started_at.is_some());
    }

    #[tokio::test]
    async fn claim_on_empty_queue_returns_none() {
        let (pool, queue) = setup().await;
        let claimed = Task::claim_queued_in_queue(&pool, &queue.id).await.expect("claim");
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn complete_requires_running_status() {
        let (pool, queue) = setup().await;
        let task = Task::enqueue(&pool, &queue.id, &queue.name, "a", "FAST_SCRIPT", 120, None)
            .await
            .expect("enqueue");
        let err = Task::mark_running_to_succeeded(&pool, &task.id, "ok", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn complete_requires_non_empty_summary() {
        let (pool, queue) = setup().await;
        Task::enqueue(&pool, &queue.id, &queue.name, "a", "FAST_SCRIPT", 120, None)
            .await
            .expect("enqueue");
        let claimed = Task::claim_queued_in_queue(&pool, &queue.id)
            .await
            .expect("claim")
            .expect("present");
        let err = Task::mark_running_to_succeeded(&pool, &claimed.id, "", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn fail_composes_type_and_message() {
        let (pool, queue) = setup().await;
        Task::enqueue(&pool, &queue.id, &queue.name, "a", "FAST_SCRIPT", 1, None)
            .await
            .expect("enqueue");
        let claimed = Task::claim_queued_in_queue(&pool, &queue.id)
            .await
            .expect("claim")
            .expect("present");
        let failed = Task::mark_to_failed(&pool, &claimed.id, "Task timeout (auto-failed)", Some("TIMEOUT"))
            .await
            .expect("fail");
        assert_eq!(failed.error.as_deref(), Some("TIMEOUT: Task timeout (auto-failed)"));
        assert!(failed.completed_at.is_none());
        assert!(failed.failed_at.is_some());
    }

    #[tokio::test]
    async fn requeue_preserves_original_and_resets_new() {
        let (pool, queue) = setup().await;
        let task = Task::enqueue(&pool, &queue.id, &queue.name, "a", "FAST_SCRIPT", 120, Some("{}"))
            .await
            .expect("enqueue");
        let claimed = Task::claim_queued_in_queue(&pool, &queue.id)
            .await
            .expect("claim")
            .expect("present");
        Task::mark_to_failed(&pool, &claimed.id, "boom", None).await.expect("fail");

        let requeued = Task::clone_for_requeue(&pool, &task.id).await.expect("requeue");
        assert_ne!(requeued.id, task.id);
        assert_eq!(requeued.status, TaskStatus::Queued);
        assert_eq!(requeued.attempts, 0);
        assert_eq!(requeued.queue_id, task.queue_id);
        assert_eq!(requeued.tool_name, task.tool_name);
        assert_eq!(requeued.payload, task.payload);

        let original = Task::find_by_id(&pool, &task.id).await.expect("get").expect("present");
        assert_eq!(original.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn requeue_rejects_non_terminal_task() {
        let (pool, queue) = setup().await;
        let task = Task::enqueue(&pool, &queue.id, &queue.name, "a", "FAST_SCRIPT", 120, None)
            .await
            .expect("enqueue");
        let err = Task::clone_for_requeue(&pool, &task.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn purge_removes_only_old_terminal_tasks() {
        let (pool, queue) = setup().await;
        let old = Task::enqueue(&pool, &queue.id, &queue.name, "a", "FAST_SCRIPT", 120, None)
            .await
            .expect("old");
        Task::claim_queued_in_queue(&pool, &queue.id).await.expect("claim").expect("present");
        Task::mark_running_to_succeeded(&pool, &old.id, "ok", None).await.expect("complete");
        Task::backdate_finished_at(&pool, &old.id, Utc::now() - Duration::days(10))
            .await
            .expect("backdate");

        let recent = Task::enqueue(&pool, &queue.id, &queue.name, "b", "FAST_SCRIPT", 120, None)
            .await
            .expect("recent");
        Task::claim_queued_in_queue(&pool, &queue.id).await.expect("claim").expect("present");
        Task::mark_running_to_succeeded(&pool, &recent.id, "ok", None).await.expect("complete");

        let cutoff = Utc::now() - Duration::days(3);
        let removed = Task::delete_tasks_older_than(&pool, cutoff).await.expect("purge");
        assert_eq!(removed, 1);
        assert!(Task::find_by_id(&pool, &old.id).await.expect("get").is_none());
        assert!(Task::find_by_id(&pool, &recent.id).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn purge_never_removes_non_terminal_tasks() {
        let (pool, queue) = setup().await;
        let task = Task::enqueue(&pool, &queue.id, &queue.name, "a", "FAST_SCRIPT", 120, None)
            .await
            .expect("enqueue");
        Task::claim_queued_in_queue(&pool, &queue.id).await.expect("claim").expect("present");
        Task::backdate_started_at(&pool, &task.id, Utc::now() - Duration::days(10))
            .await
            .expect("backdate");

        let cutoff = Utc::now() - Duration::days(3);
        let removed = Task::delete_tasks_older_than(&pool, cutoff).await.expect("purge");
        assert_eq!(removed, 0);
        assert!(Task::find_by_id(&pool, &task.id).await.expect("get").is_some());
    }
}
