use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use sparkq_db::models::{Queue, QueueStatus, Task};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::ConfigRegistry;
use crate::error::SparkQError;

/// The task state machine: enqueue, claim, complete, fail, requeue, and the
/// quick-add convenience (spec §4.2).
pub struct Lifecycle {
    pool: SqlitePool,
    config: Arc<ConfigRegistry>,
}

/// A claimed task plus the worker identifier that requested it. Per §9's
/// open question, the identifier is echoed back but never persisted —
/// it exists only to break ties deterministically and for the caller's
/// own bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResult {
    pub task: Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
}

/// The two quick-add shapes (spec §4.2 "Quick-add").
#[derive(Debug, Clone)]
pub enum QuickAdd {
    Llm { prompt: String, tool_name: String },
    Script { script_path: String, script_args: Vec<String> },
}

impl Lifecycle {
    pub fn new(pool: SqlitePool, config: Arc<ConfigRegistry>) -> Self {
        Self { pool, config }
    }

    /// Enqueue a new task onto `queue_id` (spec §4.2 "Enqueue").
    pub async fn enqueue(
        &self,
        queue_id: &str,
        tool_name: &str,
        task_class: &str,
        timeout: Option<i64>,
        payload: Option<&str>,
    ) -> Result<Task, SparkQError> {
        let queue = Queue::find_by_id(&self.pool, queue_id)
            .await?
            .ok_or_else(|| SparkQError::not_found("queue", queue_id))?;

        if queue.status != QueueStatus::Active {
            return Err(SparkQError::conflict(format!(
                "queue {queue_id} is {} and cannot accept new tasks",
                queue.status
            )));
        }

        if self.config.tool(tool_name).await?.is_none() {
            warn!(tool_name, "enqueue referenced an unregistered tool");
        }
        if self.config.task_class(task_class).await?.is_none() {
            warn!(task_class, "enqueue referenced an unregistered task_class");
        }

        let resolved_timeout = self.config.resolve_timeout(timeout, task_class).await?;

        let task = Task::enqueue(
            &self.pool,
            &queue.id,
            &queue.name,
            tool_name,
            task_class,
            resolved_timeout,
            payload,
        )
        .await?;

        info!(task_id = %task.id, friendly_id = %task.friendly_id, queue_id = %queue.id, "enqueued task");
        Ok(task)
    }

    /// Claim the oldest `queued` task in `queue_id` (spec §4.2 "Claim").
    /// FIFO by `created_at`; `worker_id` only breaks equal-timestamp ties
    /// at the database layer and is never itself persisted.
    pub async fn claim(&self, queue_id: &str, worker_id: Option<&str>) -> Result<Option<ClaimResult>, SparkQError> {
        if Queue::find_by_id(&self.pool, queue_id).await?.is_none() {
            return Err(SparkQError::not_found("queue", queue_id));
        }

        let claimed = Task::claim_queued_in_queue(&self.pool, queue_id).await?;
        match claimed {
            Some(task) => {
                info!(task_id = %task.id, queue_id, worker_id, "claimed task");
                Ok(Some(ClaimResult {
                    task,
                    worker_id: worker_id.map(str::to_string),
                }))
            }
            None => Ok(None),
        }
    }

    /// Mark a `running` task `succeeded` (spec §4.2 "Complete").
    pub async fn complete(
        &self,
        task_id: &str,
        result_summary: &str,
        result_data: Option<&str>,
    ) -> Result<Task, SparkQError> {
        let task = Task::mark_running_to_succeeded(&self.pool, task_id, result_summary, result_data).await?;
        info!(task_id = %task.id, "completed task");
        Ok(task)
    }

    /// Mark a non-terminal task `failed` (spec §4.2 "Fail").
    pub async fn fail(
        &self,
        task_id: &str,
        error_message: &str,
        error_type: Option<&str>,
    ) -> Result<Task, SparkQError> {
        let task = Task::mark_to_failed(&self.pool, task_id, error_message, error_type).await?;
        info!(task_id = %task.id, error_type, "failed task");
        Ok(task)
    }

    /// Clone a terminal task into a fresh `queued` row; the original is
    /// left unchanged for audit (spec §4.2 "Requeue").
    pub async fn requeue(&self, task_id: &str) -> Result<Task, SparkQError> {
        let requeued = Task::clone_for_requeue(&self.pool, task_id).await?;
        info!(original_task_id = task_id, new_task_id = %requeued.id, "requeued task");
        Ok(requeued)
    }

    /// Derive a canonical payload and delegate to `enqueue` (spec §4.2
    /// "Quick-add", §9 "Quick-add derivation"). A pure function of its
    /// inputs plus the tool registry, called before `enqueue`.
    pub async fn quick_add(&self, queue_id: &str, quick: QuickAdd) -> Result<Task, SparkQError> {
        let (tool_name, payload) = match &quick {
            QuickAdd::Llm { prompt, tool_name } => (
                tool_name.clone(),
                json!({ "mode": "llm", "prompt": prompt, "tool_name": tool_name }).to_string(),
            ),
            QuickAdd::Script { script_path, script_args } => (
                "run-bash".to_string(),
                json!({
                    "mode": "script",
                    "script_path": script_path,
                    "script_args": script_args,
                })
                .to_string(),
            ),
        };

        let task_class = match self.config.tool(&tool_name).await? {
            Some(def) => def.task_class,
            None => {
                warn!(tool_name, "quick-add referenced an unregistered tool; using fallback task_class");
                "MEDIUM_SCRIPT".to_string()
            }
        };

        self.enqueue(queue_id, &tool_name, &task_class, None, Some(&payload)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparkq_db::models::{Project, Session, TaskStatus};
    use sparkq_db::pool::connect_in_memory;

    async fn setup() -> (Lifecycle, Queue) {
        let pool = connect_in_memory().await.expect("pool");
        let config = Arc::new(ConfigRegistry::new(pool.clone()).await.expect("config"));
        let project = Project::get_or_create(&pool, "demo", "/repo").await.expect("project");
        let session = Session::create(&pool, &project.id, "s1", None).await.expect("session");
        let queue = Queue::create(&pool, &session.id, "default", None).await.expect("queue");
        (Lifecycle::new(pool, config), queue)
    }

    #[tokio::test]
    async fn happy_path_enqueue_claim_complete() {
        let (lifecycle, queue) = setup().await;
        let task = lifecycle
            .enqueue(&queue.id, "run-bash", "MEDIUM_SCRIPT", None, None)
            .await
            .expect("enqueue");
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.timeout, 600);
        assert_eq!(task.attempts, 0);

        let claimed = lifecycle.claim(&queue.id, Some("worker-1")).await.expect("claim").expect("present");
        assert_eq!(claimed.task.id, task.id);
        assert_eq!(claimed.task.status, TaskStatus::Running);
        assert_eq!(claimed.task.attempts, 1);
        assert_eq!(claimed.worker_id.as_deref(), Some("worker-1"));

        let completed = lifecycle.complete(&task.id, "ok", None).await.expect("complete");
        assert_eq!(completed.status, TaskStatus::Succeeded);
        assert!(completed.completed_at.is_some());
    }

    #[tokio::test]
    async fn enqueue_to_archived_queue_is_conflict() {
        let (lifecycle, queue) = setup().await;
        Queue::archive(&lifecycle.pool, &queue.id).await.expect("archive");
        let err = lifecycle
            .enqueue(&queue.id, "run-bash", "MEDIUM_SCRIPT", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SparkQError::Conflict(_)));
    }

    #[tokio::test]
    async fn enqueue_to_missing_queue_is_not_found() {
        let (lifecycle, _queue) = setup().await;
        let err = lifecycle
            .enqueue("que_missing", "run-bash", "MEDIUM_SCRIPT", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SparkQError::NotFound { .. }));
    }

    #[tokio::test]
    async fn enqueue_accepts_unregistered_tool_and_class_with_fallback_timeout() {
        let (lifecycle, queue) = setup().await;
        let task = lifecycle
            .enqueue(&queue.id, "unknown-tool", "UNKNOWN_CLASS", None, None)
            .await
            .expect("enqueue");
        assert_eq!(task.timeout, 300);
    }

    #[tokio::test]
    async fn requeue_preserves_audit_trail() {
        let (lifecycle, queue) = setup().await;
        let task = lifecycle
            .enqueue(&queue.id, "run-bash", "MEDIUM_SCRIPT", None, Some("{}"))
            .await
            .expect("enqueue");
        lifecycle.claim(&queue.id, None).await.expect("claim").expect("present");
        lifecycle.fail(&task.id, "boom", None).await.expect("fail");

        let requeued = lifecycle.requeue(&task.id).await.expect("requeue");
        assert_ne!(requeued.id, task.id);
        assert_eq!(requeued.status, TaskStatus::Queued);
    }

    #[tokio::test]
    async fn quick_add_script_builds_canonical_payload() {
        let (lifecycle, queue) = setup().await;
        let task = lifecycle
            .quick_add(
                &queue.id,
                QuickAdd::Script {
                    script_path: "./deploy.sh".to_string(),
                    script_args: vec!["--prod".to_string()],
                },
            )
            .await
            .expect("quick add");
        assert_eq!(task.tool_name, "run-bash");
        let payload: serde_json::Value = serde_json::from_str(task.payload.as_deref().unwrap()).unwrap();
        assert_eq!(payload["mode"], "script");
        assert_eq!(payload["script_path"], "./deploy.sh");
    }

    #[tokio::test]
    async fn quick_add_llm_derives_task_class_from_tool() {
        let (lifecycle, queue) = setup().await;
        let task = lifecycle
            .quick_add(
                &queue.id,
                QuickAdd::Llm {
                    prompt: "summarize".to_string(),
                    tool_name: "llm-prompt".to_string(),
                },
            )
            .await
            .expect("quick add");
        assert_eq!(task.task_class, "LLM_LITE");
    }
}
