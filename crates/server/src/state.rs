use std::sync::Arc;

use sparkq_core::{ConfigRegistry, Lifecycle, QueueManager};
use sparkq_db::models::Project;
use sqlx::SqlitePool;

/// Shared application state handed to every axum handler via `State`.
/// Cheap to clone — everything inside is an `Arc` or a connection pool.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub project: Project,
    pub config: Arc<ConfigRegistry>,
    pub lifecycle: Arc<Lifecycle>,
    pub queue_manager: Arc<QueueManager>,
}

impl AppState {
    pub async fn new(pool: SqlitePool, project_name: &str, repo_path: &str) -> anyhow::Result<Self> {
        let project = Project::get_or_create(&pool, project_name, repo_path).await?;
        let config = Arc::new(ConfigRegistry::new(pool.clone()).await?);
        let lifecycle = Arc::new(Lifecycle::new(pool.clone(), config.clone()));
        let queue_manager = Arc::new(QueueManager::new(pool.clone()));

        Ok(Self {
            pool,
            project,
            config,
            lifecycle,
            queue_manager,
        })
    }
}
