use serde::{Deserialize, Serialize};
use sparkq_db::models::{Project, Queue, QueueStats, Session};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::SparkQError;

/// Project-wide totals (spec §6 "Stats").
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProjectStats {
    pub sessions: i64,
    pub queues: i64,
    pub queued: i64,
    pub running: i64,
}

/// Session/queue CRUD, the archive/end/unarchive state machine, and
/// derived statistics (spec §4.3).
pub struct QueueManager {
    pool: SqlitePool,
}

impl QueueManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // --- Sessions ---------------------------------------------------

    pub async fn create_session(
        &self,
        project_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Session, SparkQError> {
        let session = Session::create(&self.pool, project_id, name, description).await?;
        info!(session_id = %session.id, name, "created session");
        Ok(session)
    }

    pub async fn get_session(&self, id: &str) -> Result<Session, SparkQError> {
        Session::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| SparkQError::not_found("session", id))
    }

    pub async fn list_sessions(&self, project_id: &str, limit: i64, offset: i64) -> Result<Vec<Session>, SparkQError> {
        Ok(Session::list(&self.pool, project_id, limit, offset).await?)
    }

    pub async fn update_session(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Session, SparkQError> {
        Ok(Session::update(&self.pool, id, name, description).await?)
    }

    /// Advisory marker only — does not cascade to queues (spec §4.3
    /// "Session states").
    pub async fn end_session(&self, id: &str) -> Result<Session, SparkQError> {
        let session = Session::end(&self.pool, id).await?;
        info!(session_id = %session.id, "ended session");
        Ok(session)
    }

    /// Cascade-deletes queues and their tasks (spec §4.3, §9 "Cascade
    /// semantics").
    pub async fn delete_session(&self, id: &str) -> Result<(), SparkQError> {
        Session::delete(&self.pool, id).await?;
        info!(session_id = id, "deleted session (cascaded to queues and tasks)");
        Ok(())
    }

    // --- Queues -------------------------------------------------------

    pub async fn create_queue(
        &self,
        session_id: &str,
        name: &str,
        instructions: Option<&str>,
    ) -> Result<Queue, SparkQError> {
        let queue = Queue::create(&self.pool, session_id, name, instructions).await?;
        info!(queue_id = %queue.id, name, "created queue");
        Ok(queue)
    }

    pub async fn get_queue(&self, id: &str) -> Result<Queue, SparkQError> {
        Queue::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| SparkQError::not_found("queue", id))
    }

    pub async fn list_queues(
        &self,
        session_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<(Queue, QueueStats)>, SparkQError> {
        let queues = Queue::list(&self.pool, session_id, limit, offset).await?;
        let mut result = Vec::with_capacity(queues.len());
        for queue in queues {
            let stats = Queue::stats(&self.pool, &queue.id).await?;
            result.push((queue, stats));
        }
        Ok(result)
    }

    pub async fn update_queue(
        &self,
        id: &str,
        name: Option<&str>,
        instructions: Option<&str>,
    ) -> Result<Queue, SparkQError> {
        Ok(Queue::update(&self.pool, id, name, instructions).await?)
    }

    /// `active -> ended`. Terminal for the queue; does not retroactively
    /// mutate its tasks (spec §4.3 "Queue states").
    pub async fn end_queue(&self, id: &str) -> Result<Queue, SparkQError> {
        let queue = Queue::end(&self.pool, id).await?;
        info!(queue_id = %queue.id, "ended queue");
        Ok(queue)
    }

    /// `active -> archived`.
    pub async fn archive_queue(&self, id: &str) -> Result<Queue, SparkQError> {
        let queue = Queue::archive(&self.pool, id).await?;
        info!(queue_id = %queue.id, "archived queue");
        Ok(queue)
    }

    /// `archived -> active`.
    pub async fn unarchive_queue(&self, id: &str) -> Result<Queue, SparkQError> {
        let queue = Queue::unarchive(&self.pool, id).await?;
        info!(queue_id = %queue.id, "unarchived queue");
        Ok(queue)
    }

    /// Cascade-deletes the queue's tasks (spec §4.3, §9 "Cascade
    /// semantics").
    pub async fn delete_queue(&self, id: &str) -> Result<(), SparkQError> {
        Queue::delete(&self.pool, id).await?;
        info!(queue_id = id, "deleted queue (cascaded to tasks)");
        Ok(())
    }

    pub async fn queue_stats(&self, id: &str) -> Result<QueueStats, SparkQError> {
        Ok(Queue::stats(&self.pool, id).await?)
    }

    /// Project-wide totals (spec §6 "Stats").
    pub async fn project_stats(&self) -> Result<ProjectStats, SparkQError> {
        let project = Project::find_singleton(&self.pool)
            .await?
            .ok_or_else(|| SparkQError::not_found("project", "singleton"))?;

        let sessions = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions WHERE project_id = ?")
            .bind(&project.id)
            .fetch_one(&self.pool)
            .await?;
        let queues = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM queues q JOIN sessions s ON s.id = q.session_id WHERE s.project_id = ?",
        )
        .bind(&project.id)
        .fetch_one(&self.pool)
        .await?;
        let queued = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tasks t JOIN queues q ON q.id = t.queue_id JOIN sessions s ON s.id = q.session_id \
             WHERE s.project_id = ? AND t.status = 'queued'",
        )
        .bind(&project.id)
        .fetch_one(&self.pool)
        .await?;
        let running = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tasks t JOIN queues q ON q.id = t.queue_id JOIN sessions s ON s.id = q.session_id \
             WHERE s.project_id = ? AND t.status = 'running'",
        )
        .bind(&project.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ProjectStats {
            sessions,
            queues,
            queued,
            running,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparkq_db::models::Task;
    use sparkq_db::pool::connect_in_memory;

    async fn setup() -> (QueueManager, Project) {
        let pool = connect_in_memory().await.expect("pool");
        let project = Project::get_or_create(&pool, "demo", "/repo").await.expect("project");
        (QueueManager::new(pool), project)
    }

    #[tokio::test]
    async fn session_and_queue_round_trip() {
        let (manager, project) = setup().await;
        let session = manager.create_session(&project.id, "s1", None).await.expect("session");
        let queue = manager.create_queue(&session.id, "q1", Some("run bash")).await.expect("queue");
        let fetched = manager.get_queue(&queue.id).await.expect("get");
        assert_eq!(fetched.name, "q1");
    }

    #[tokio::test]
    async fn stats_reflect_live_task_counts() {
        let (manager, project) = setup().await;
        let session = manager.create_session(&project.id, "s1", None).await.expect("session");
        let queue = manager.create_queue(&session.id, "q1", None).await.expect("queue");
        Task::enqueue(&manager.pool, &queue.id, &queue.name, "a", "FAST_SCRIPT", 120, None)
            .await
            .expect("t1");
        Task::enqueue(&manager.pool, &queue.id, &queue.name, "a", "FAST_SCRIPT", 120, None)
            .await
            .expect("t2");
        let claimed = Task::claim_queued_in_queue(&manager.pool, &queue.id)
            .await
            .expect("claim")
            .expect("present");
        Task::mark_running_to_succeeded(&manager.pool, &claimed.id, "ok", None)
            .await
            .expect("complete");

        let stats = manager.queue_stats(&queue.id).await.expect("stats");
        assert_eq!(stats.total, 2);
        assert_eq!(stats.done, 1);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.running, 0);
    }

    #[tokio::test]
    async fn session_end_does_not_cascade_to_queues() {
        let (manager, project) = setup().await;
        let session = manager.create_session(&project.id, "s1", None).await.expect("session");
        let queue = manager.create_queue(&session.id, "q1", None).await.expect("queue");
        manager.end_session(&session.id).await.expect("end");
        let fetched = manager.get_queue(&queue.id).await.expect("get");
        assert_eq!(fetched.status, sparkq_db::models::QueueStatus::Active);
    }

    #[tokio::test]
    async fn session_delete_cascades_to_queues_and_tasks() {
        let (manager, project) = setup().await;
        let session = manager.create_session(&project.id, "s1", None).await.expect("session");
        let queue = manager.create_queue(&session.id, "q1", None).await.expect("queue");
        Task::enqueue(&manager.pool, &queue.id, &queue.name, "a", "FAST_SCRIPT", 120, None)
            .await
            .expect("task");

        manager.delete_session(&session.id).await.expect("delete");
        assert!(manager.get_queue(&queue.id).await.is_err());
    }

    #[tokio::test]
    async fn project_stats_counts_across_sessions() {
        let (manager, project) = setup().await;
        let s1 = manager.create_session(&project.id, "s1", None).await.expect("s1");
        let s2 = manager.create_session(&project.id, "s2", None).await.expect("s2");
        let q1 = manager.create_queue(&s1.id, "q1", None).await.expect("q1");
        manager.create_queue(&s2.id, "q2", None).await.expect("q2");
        Task::enqueue(&manager.pool, &q1.id, &q1.name, "a", "FAST_SCRIPT", 120, None)
            .await
            .expect("task");

        let stats = manager.project_stats().await.expect("stats");
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.queues, 2);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.running, 0);
    }
}
