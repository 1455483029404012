use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sparkq_core::{ConfigDefaults, ConfigRegistry, FileConfig, Lifecycle, QueueManager};
use sparkq_db::models::Project;
use sqlx::SqlitePool;

/// Everything a CLI command needs, assembled once at startup the same way
/// `sparkq-server`'s `AppState` is (spec §6 "thin wrappers over every
/// Lifecycle and Queue Manager operation").
pub struct Context {
    pub pool: SqlitePool,
    pub project: Project,
    pub config: Arc<ConfigRegistry>,
    pub lifecycle: Arc<Lifecycle>,
    pub queue_manager: Arc<QueueManager>,
    db_path: PathBuf,
}

impl Context {
    /// Open the database and construct the core components.
    ///
    /// The database path itself has to come straight from layer 2/3 of the
    /// config document — the Config Registry's own `database_path` accessor
    /// reads layer 1 out of the very database this is opening, so it can't
    /// be used yet.
    pub async fn bootstrap() -> anyhow::Result<Self> {
        let file = FileConfig::load()?;
        let db_path = match &file.database.path {
            Some(p) => file.resolve_relative(p),
            None => file.base_dir.join(ConfigDefaults::DATABASE_FILE),
        };
        let lock_timeout = Duration::from_secs(
            file.database
                .lock_timeout_seconds
                .unwrap_or(ConfigDefaults::LOCK_TIMEOUT_SECONDS),
        );

        let pool = sparkq_db::pool::connect(&db_path, lock_timeout).await?;

        let project_name = file.project.name.clone().unwrap_or_else(|| "default".to_string());
        let repo_path = file
            .project
            .repo_path
            .clone()
            .unwrap_or_else(|| file.base_dir.display().to_string());
        let project = Project::get_or_create(&pool, &project_name, &repo_path).await?;

        let config = Arc::new(ConfigRegistry::new(pool.clone()).await?);
        let lifecycle = Arc::new(Lifecycle::new(pool.clone(), config.clone()));
        let queue_manager = Arc::new(QueueManager::new(pool.clone()));

        Ok(Self {
            pool,
            project,
            config,
            lifecycle,
            queue_manager,
            db_path,
        })
    }

    /// Lockfile lives alongside the database file (spec §5).
    pub fn lockfile_path(&self) -> PathBuf {
        self.db_path.with_extension("pid")
    }

    /// Build the same `AppState` the HTTP adapter uses, reusing the
    /// already-constructed core components instead of bootstrapping again.
    pub fn app_state(&self) -> sparkq_server::AppState {
        sparkq_server::AppState {
            pool: self.pool.clone(),
            project: self.project.clone(),
            config: self.config.clone(),
            lifecycle: self.lifecycle.clone(),
            queue_manager: self.queue_manager.clone(),
        }
    }
}
