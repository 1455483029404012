use std::sync::Arc;

use chrono::Utc;
use sparkq_db::models::Task;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{ConfigDefaults, ConfigRegistry};
use crate::error::SparkQError;

/// Deadline enforcement and old-data purge, driven by a timer (spec §4.4).
/// The only component in the core that performs unsolicited writes.
pub struct Watcher {
    pool: SqlitePool,
    config: Arc<ConfigRegistry>,
}

/// Summary of one stale-check pass, returned for logging/testing.
#[derive(Debug, Clone, Default)]
pub struct StaleCheckReport {
    pub auto_failed: Vec<String>,
    pub warned: Vec<String>,
    pub skipped: Vec<String>,
}

impl Watcher {
    pub fn new(pool: SqlitePool, config: Arc<ConfigRegistry>) -> Self {
        Self { pool, config }
    }

    /// Run the stale-check and purge loops until `shutdown` is triggered.
    /// Each concern gets its own timer; neither concern ever runs two
    /// instances of itself concurrently (spec §4.4 "Scheduling model").
    /// Cancellation interrupts any sleep and the loop returns within 1s.
    pub async fn run(&self, shutdown: CancellationToken) {
        let stale_check = self.stale_check_loop(shutdown.clone());
        let purge = self.purge_loop(shutdown);
        tokio::join!(stale_check, purge);
    }

    async fn stale_check_loop(&self, shutdown: CancellationToken) {
        loop {
            let interval = self.config.auto_fail_interval().await;
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("stale-check loop shutting down");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            if let Err(err) = self.stale_check_pass().await {
                error!(error = %err, "stale-check pass failed");
            }
        }
    }

    async fn purge_loop(&self, shutdown: CancellationToken) {
        loop {
            let interval = self.config.purge_interval().await;
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("purge loop shutting down");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            match self.purge_pass().await {
                Ok(removed) if removed > 0 => info!(removed, "purge pass removed old tasks"),
                Ok(_) => {}
                Err(err) => error!(error = %err, "purge pass failed"),
            }
        }
    }

    /// Enumerate `running` tasks and classify each by elapsed time against
    /// its own `timeout` (spec §4.4 "Stale-check pass"). An individual
    /// auto-fail failure is logged and the pass continues (step 5).
    pub async fn stale_check_pass(&self) -> Result<StaleCheckReport, SparkQError> {
        let running = Task::list_running(&self.pool).await?;
        let mut report = StaleCheckReport::default();

        for task in running {
            let Some(started_at) = task.started_at else {
                warn!(task_id = %task.id, "running task missing started_at; skipping stale-check");
                report.skipped.push(task.id);
                continue;
            };

            let timeout = if task.timeout > 0 {
                task.timeout
            } else {
                warn!(task_id = %task.id, "task has invalid timeout; using fallback");
                ConfigDefaults::STALE_TASK_TIMEOUT_FALLBACK_SECONDS
            };

            let elapsed = (Utc::now() - started_at).num_seconds();

            if elapsed >= timeout * 2 {
                match Task::mark_to_failed(&self.pool, &task.id, "Task timeout (auto-failed)", Some("TIMEOUT")).await {
                    Ok(_) => {
                        warn!(task_id = %task.id, elapsed, timeout, "auto-failed stale task");
                        report.auto_failed.push(task.id);
                    }
                    Err(err) => {
                        error!(task_id = %task.id, error = %err, "failed to auto-fail stale task");
                    }
                }
            } else if elapsed >= timeout {
                if task.stale_warned_at.is_none() {
                    if let Err(err) = Task::mark_stale_warned(&self.pool, &task.id).await {
                        error!(task_id = %task.id, error = %err, "failed to record stale warning");
                    } else {
                        warn!(task_id = %task.id, elapsed, timeout, "task crossed soft deadline");
                        report.warned.push(task.id);
                    }
                }
            }
        }

        Ok(report)
    }

    /// Delete terminal tasks older than the configured purge threshold
    /// (spec §4.4 "Purge pass"). Returns the number of rows removed.
    pub async fn purge_pass(&self) -> Result<u64, SparkQError> {
        let days = self.config.purge_older_than_days().await?;
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let removed = Task::delete_tasks_older_than(&self.pool, cutoff).await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sparkq_db::models::{Project, Queue, Session, TaskStatus};
    use sparkq_db::pool::connect_in_memory;

    async fn setup() -> (Watcher, Queue) {
        let pool = connect_in_memory().await.expect("pool");
        let config = Arc::new(ConfigRegistry::new(pool.clone()).await.expect("config"));
        let project = Project::get_or_create(&pool, "demo", "/repo").await.expect("project");
        let session = Session::create(&pool, &project.id, "s1", None).await.expect("session");
        let queue = Queue::create(&pool, &session.id, "default", None).await.expect("queue");
        (Watcher::new(pool, config), queue)
    }

    #[tokio::test]
    async fn stale_check_auto_fails_tasks_past_the_hard_deadline() {
        let (watcher, queue) = setup().await;
        let task = Task::enqueue(&watcher.pool, &queue.id, &queue.name, "a", "FAST_SCRIPT", 1, None)
            .await
            .expect("enqueue");
        Task::claim_queued_in_queue(&watcher.pool, &queue.id).await.expect("claim").expect("present");
        Task::backdate_started_at(&watcher.pool, &task.id, Utc::now() - Duration::seconds(10))
            .await
            .expect("backdate");

        let report = watcher.stale_check_pass().await.expect("pass");
        assert_eq!(report.auto_failed, vec![task.id.clone()]);

        let updated = Task::find_by_id(&watcher.pool, &task.id).await.expect("get").expect("present");
        assert_eq!(updated.status, TaskStatus::Failed);
        assert_eq!(updated.error.as_deref(), Some("TIMEOUT: Task timeout (auto-failed)"));
    }

    #[tokio::test]
    async fn stale_check_warns_once_past_the_soft_deadline() {
        let (watcher, queue) = setup().await;
        let task = Task::enqueue(&watcher.pool, &queue.id, &queue.name, "a", "FAST_SCRIPT", 10, None)
            .await
            .expect("enqueue");
        Task::claim_queued_in_queue(&watcher.pool, &queue.id).await.expect("claim").expect("present");
        Task::backdate_started_at(&watcher.pool, &task.id, Utc::now() - Duration::seconds(15))
            .await
            .expect("backdate");

        let report = watcher.stale_check_pass().await.expect("first pass");
        assert_eq!(report.warned, vec![task.id.clone()]);

        let report2 = watcher.stale_check_pass().await.expect("second pass");
        assert!(report2.warned.is_empty(), "must not re-warn an already-warned task");

        let updated = Task::find_by_id(&watcher.pool, &task.id).await.expect("get").expect("present");
        assert_eq!(updated.status, TaskStatus::Running);
        assert!(updated.stale_warned_at.is_some());
    }

    #[tokio::test]
    async fn stale_check_leaves_fresh_tasks_untouched() {
        let (watcher, queue) = setup().await;
        Task::enqueue(&watcher.pool, &queue.id, &queue.name, "a", "MEDIUM_SCRIPT", 600, None)
            .await
            .expect("enqueue");
        Task::claim_queued_in_queue(&watcher.pool, &queue.id).await.expect("claim").expect("present");

        let report = watcher.stale_check_pass().await.expect("pass");
        assert!(report.auto_failed.is_empty());
        assert!(report.warned.is_empty());
    }

    #[tokio::test]
    async fn purge_pass_removes_old_terminal_tasks_only() {
        let (watcher, queue) = setup().await;
        let old = Task::enqueue(&watcher.pool, &queue.id, &queue.name, "a", "FAST_SCRIPT", 120, None)
            .await
            .expect("enqueue");
        Task::claim_queued_in_queue(&watcher.pool, &queue.id).await.expect("claim").expect("present");
        Task::mark_running_to_succeeded(&watcher.pool, &old.id, "ok", None).await.expect("complete");
        Task::backdate_finished_at(&watcher.pool, &old.id, Utc::now() - Duration::days(10))
            .await
            .expect("backdate");

        let removed = watcher.purge_pass().await.expect("purge");
        assert_eq!(removed, 1);
        assert!(Task::find_by_id(&watcher.pool, &old.id).await.expect("get").is_none());
    }
}
