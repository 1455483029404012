use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use sparkq_db::models::{ConfigEntry, PromptRow, TaskClassRow, ToolRow};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::defaults::{ConfigDefaults, TaskClassDef, ToolDef};
use super::file::FileConfig;
use crate::error::SparkQError;

pub const NS_PURGE: &str = "purge.config";
pub const NS_QUEUE_RUNNER: &str = "queue_runner.config";
pub const NS_TOOLS: &str = "tools.all";
pub const NS_TASK_CLASSES: &str = "task_classes.all";
pub const NS_FEATURES: &str = "features.flags";
pub const NS_DEFAULTS_QUEUE: &str = "defaults.queue";
pub const NS_UI_BUILD: &str = "ui.build_id";

/// The layered configuration store (spec §4.5): database entries ⊕
/// file-backed document ⊕ built-in defaults, highest-priority-wins.
///
/// Layer 1 (`config_entries`) lives entirely in the Store and is read
/// fresh on every access below — the "cache" the mutation contract talks
/// about invalidating is the in-memory file layer, which only `reload`
/// refreshes.
pub struct ConfigRegistry {
    pool: SqlitePool,
    file: RwLock<FileConfig>,
}

impl ConfigRegistry {
    pub async fn new(pool: SqlitePool) -> Result<Self, SparkQError> {
        let file = FileConfig::load()?;
        let registry = Self {
            pool,
            file: RwLock::new(file),
        };
        registry.seed_if_empty().await?;
        Ok(registry)
    }

    #[cfg(test)]
    pub async fn new_with_file(pool: SqlitePool, file: FileConfig) -> Result<Self, SparkQError> {
        let registry = Self {
            pool,
            file: RwLock::new(file),
        };
        registry.seed_if_empty().await?;
        Ok(registry)
    }

    /// One-time seeding of the `tools`, `task_classes`, `prompts` projection
    /// tables from built-in/file defaults, strictly on empty tables (spec
    /// §4.5 "Seeding rule", §9 "Seeding must be non-destructive").
    async fn seed_if_empty(&self) -> Result<(), SparkQError> {
        // Task classes first: tools seeded below may reference them, and
        // `put`'s validation checks the class exists.
        if TaskClassRow::count(&self.pool).await? == 0 {
            let file = self.file.read().await;
            let source: Vec<(String, TaskClassDef)> = if file.task_classes.is_empty() {
                ConfigDefaults::task_classes().into_iter().collect()
            } else {
                file.task_classes.clone().into_iter().collect()
            };
            drop(file);
            for (name, def) in &source {
                let value = serde_json::to_string(def)?;
                ConfigEntry::put(&self.pool, NS_TASK_CLASSES, name, &value).await?;
            }
            self.rebuild_task_classes_projection().await?;
            info!(count = source.len(), "seeded task classes catalog");
        }

        if ToolRow::count(&self.pool).await? == 0 {
            let file = self.file.read().await;
            let source: Vec<(String, ToolDef)> = if file.tools.is_empty() {
                ConfigDefaults::tools().into_iter().collect()
            } else {
                file.tools.clone().into_iter().collect()
            };
            drop(file);
            for (name, def) in &source {
                let value = serde_json::to_string(def)?;
                ConfigEntry::put(&self.pool, NS_TOOLS, name, &value).await?;
            }
            self.rebuild_tools_projection().await?;
            info!(count = source.len(), "seeded tools catalog");
        }

        if PromptRow::count(&self.pool).await? == 0 {
            // No built-in prompt catalog ships with the core; the prompt
            // template catalog itself is an external collaborator (spec
            // §1). The table exists so it can be populated without a
            // schema migration once that collaborator is wired up.
            PromptRow::replace_all(&self.pool, &[]).await?;
        }

        Ok(())
    }

    /// Re-read layer 2 from disk without restart (spec §4.5 "reload").
    pub async fn reload(&self) -> Result<(), SparkQError> {
        let fresh = FileConfig::load()?;
        *self.file.write().await = fresh;
        Ok(())
    }

    async fn db_value(&self, namespace: &str, key: &str) -> Result<Option<String>, SparkQError> {
        Ok(ConfigEntry::get(&self.pool, namespace, key).await?.map(|e| e.value))
    }

    pub async fn server_bind(&self) -> Result<(String, u16), SparkQError> {
        let host = match self.db_value("server", "host").await? {
            Some(v) => v,
            None => {
                let file = self.file.read().await;
                file.server
                    .host
                    .clone()
                    .unwrap_or_else(|| ConfigDefaults::SERVER_HOST.to_string())
            }
        };
        let port = match self.db_value("server", "port").await? {
            Some(v) => v.parse().map_err(|_| SparkQError::validation(format!("invalid server.port: {v}")))?,
            None => {
                let file = self.file.read().await;
                file.server.port.unwrap_or(ConfigDefaults::SERVER_PORT)
            }
        };
        Ok((host, port))
    }

    pub async fn database_path(&self) -> PathBuf {
        if let Ok(Some(v)) = self.db_value("database", "path").await {
            return PathBuf::from(v);
        }
        let file = self.file.read().await;
        match &file.database.path {
            Some(p) => file.resolve_relative(p),
            None => file.base_dir.join(ConfigDefaults::DATABASE_FILE),
        }
    }

    pub async fn lock_timeout(&self) -> Duration {
        if let Ok(Some(v)) = self.db_value("database", "lock_timeout_seconds").await
            && let Ok(secs) = v.parse()
        {
            return Duration::from_secs(secs);
        }
        let file = self.file.read().await;
        Duration::from_secs(
            file.database
                .lock_timeout_seconds
                .unwrap_or(ConfigDefaults::LOCK_TIMEOUT_SECONDS),
        )
    }

    pub async fn purge_older_than_days(&self) -> Result<i64, SparkQError> {
        if let Some(v) = self.db_value(NS_PURGE, "older_than_days").await? {
            return v
                .parse()
                .map_err(|_| SparkQError::validation(format!("invalid purge.older_than_days: {v}")));
        }
        let file = self.file.read().await;
        Ok(file.purge.older_than_days.unwrap_or(ConfigDefaults::PURGE_OLDER_THAN_DAYS))
    }

    pub async fn purge_interval(&self) -> Duration {
        if let Ok(Some(v)) = self.db_value(NS_PURGE, "interval_seconds").await
            && let Ok(secs) = v.parse()
        {
            return Duration::from_secs(secs);
        }
        let file = self.file.read().await;
        Duration::from_secs(file.purge.interval_seconds.unwrap_or(ConfigDefaults::PURGE_INTERVAL_SECONDS))
    }

    pub async fn auto_fail_interval(&self) -> Duration {
        if let Ok(Some(v)) = self.db_value(NS_QUEUE_RUNNER, "auto_fail_interval_seconds").await
            && let Ok(secs) = v.parse()
        {
            return Duration::from_secs(secs);
        }
        let file = self.file.read().await;
        Duration::from_secs(
            file.queue_runner
                .auto_fail_interval_seconds
                .unwrap_or(ConfigDefaults::AUTO_FAIL_INTERVAL_SECONDS),
        )
    }

    pub async fn default_queue_instructions(&self) -> Option<String> {
        if let Ok(Some(v)) = self.db_value(NS_DEFAULTS_QUEUE, "instructions").await {
            return Some(v);
        }
        self.file.read().await.defaults.queue_instructions.clone()
    }

    pub async fn feature_flag(&self, name: &str) -> bool {
        if let Ok(Some(v)) = self.db_value(NS_FEATURES, name).await {
            return v == "true";
        }
        self.file.read().await.features.get(name).copied().unwrap_or(false)
    }

    /// Look up a task class, db projection first (kept in sync with config
    /// per §4.5), falling back to the file/built-in catalog.
    pub async fn task_class(&self, name: &str) -> Result<Option<TaskClassDef>, SparkQError> {
        if let Some(row) = TaskClassRow::get(&self.pool, name).await? {
            return Ok(Some(TaskClassDef {
                timeout: row.timeout,
                description: row.description,
            }));
        }
        let file = self.file.read().await;
        if let Some(def) = file.task_classes.get(name) {
            return Ok(Some(def.clone()));
        }
        Ok(ConfigDefaults::task_classes().get(name).cloned())
    }

    pub async fn tool(&self, name: &str) -> Result<Option<ToolDef>, SparkQError> {
        if let Some(row) = ToolRow::get(&self.pool, name).await? {
            return Ok(Some(ToolDef {
                task_class: row.task_class,
                description: row.description,
            }));
        }
        let file = self.file.read().await;
        if let Some(def) = file.tools.get(name) {
            return Ok(Some(def.clone()));
        }
        Ok(ConfigDefaults::tools().get(name).cloned())
    }

    /// Resolve a task's timeout at enqueue time (spec §4.2 "Timeout
    /// resolution policy").
    ///
    /// 1. caller-supplied `timeout > 0` wins outright.
    /// 2. else the registered task class's timeout.
    /// 3. else a rough fallback recognized by class name.
    /// 4. else the built-in default (300s).
    pub async fn resolve_timeout(
        &self,
        caller_timeout: Option<i64>,
        task_class: &str,
    ) -> Result<i64, SparkQError> {
        if let Some(t) = caller_timeout
            && t > 0
        {
            return Ok(t);
        }

        if let Some(def) = self.task_class(task_class).await? {
            return Ok(def.timeout);
        }

        warn!(task_class, "unregistered task_class at enqueue; falling back");
        if let Some(t) = ConfigDefaults::timeout_by_rough_class_name(task_class) {
            return Ok(t);
        }

        Ok(ConfigDefaults::FALLBACK_TIMEOUT_SECONDS)
    }

    /// Full resolved config across all three tiers, namespace by namespace
    /// (spec §6 "Config: get full resolved config").
    pub async fn get_full_config(&self) -> Result<serde_json::Value, SparkQError> {
        let (host, port) = self.server_bind().await?;
        let tools = ToolRow::list(&self.pool).await?;
        let task_classes = TaskClassRow::list(&self.pool).await?;
        let db_entries = ConfigEntry::list_all(&self.pool).await?;

        Ok(json!({
            "server": { "host": host, "port": port },
            "database": { "path": self.database_path().await },
            "purge": {
                "older_than_days": self.purge_older_than_days().await?,
                "interval_seconds": self.purge_interval().await.as_secs(),
            },
            "queue_runner": {
                "auto_fail_interval_seconds": self.auto_fail_interval().await.as_secs(),
            },
            "tools": tools,
            "task_classes": task_classes,
            "defaults": { "queue_instructions": self.default_queue_instructions().await },
            "ui": { "build_id": self.db_value(NS_UI_BUILD, "value").await?.unwrap_or_default() },
            "raw_entries": db_entries.into_iter().map(|e| json!({
                "namespace": e.namespace, "key": e.key, "value": e.value,
            })).collect::<Vec<_>>(),
        }))
    }

    /// Write a layer-1 entry. If the namespace is `tools.all` or
    /// `task_classes.all`, the projection table is rewritten atomically to
    /// match every entry currently under that namespace (spec §4.5
    /// "Mutation").
    pub async fn put(&self, namespace: &str, key: &str, value: &str) -> Result<(), SparkQError> {
        self.validate(namespace, key, value).await?;
        ConfigEntry::put(&self.pool, namespace, key, value).await?;

        match namespace {
            NS_TOOLS => self.rebuild_tools_projection().await?,
            NS_TASK_CLASSES => self.rebuild_task_classes_projection().await?,
            _ => {}
        }
        Ok(())
    }

    /// Remove a layer-1 entry, reverting that `(namespace, key)` to the
    /// layer-2/built-in value (spec §4.5 "Mutation").
    pub async fn delete(&self, namespace: &str, key: &str) -> Result<(), SparkQError> {
        if namespace == NS_TASK_CLASSES
            && TaskClassRow::is_referenced_by_any_tool(&self.pool, key).await?
        {
            return Err(SparkQError::conflict(format!(
                "task class '{key}' is referenced by a tool and cannot be deleted"
            )));
        }

        ConfigEntry::delete(&self.pool, namespace, key).await?;

        match namespace {
            NS_TOOLS => self.rebuild_tools_projection().await?,
            NS_TASK_CLASSES => self.rebuild_task_classes_projection().await?,
            _ => {}
        }
        Ok(())
    }

    /// Check a proposed update against constraints without persisting it
    /// (spec §4.5 "validate").
    pub async fn validate(&self, namespace: &str, _key: &str, value: &str) -> Result<(), SparkQError> {
        match namespace {
            NS_TOOLS => {
                let def: ToolDef = serde_json::from_str(value)?;
                if self.task_class(&def.task_class).await?.is_none() {
                    return Err(SparkQError::validation(format!(
                        "tool references unknown task_class '{}'",
                        def.task_class
                    )));
                }
            }
            NS_TASK_CLASSES => {
                let def: TaskClassDef = serde_json::from_str(value)?;
                if def.timeout <= 0 {
                    return Err(SparkQError::validation("task_class timeout must be > 0"));
                }
            }
            NS_FEATURES => {
                if value != "true" && value != "false" {
                    return Err(SparkQError::validation("feature flag value must be 'true' or 'false'"));
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn rebuild_tools_projection(&self) -> Result<(), SparkQError> {
        let entries = ConfigEntry::list_namespace(&self.pool, NS_TOOLS).await?;
        let mut rows = Vec::with_capacity(entries.len());
        for entry in entries {
            let def: ToolDef = serde_json::from_str(&entry.value)?;
            rows.push(ToolRow {
                name: entry.key,
                task_class: def.task_class,
                description: def.description,
            });
        }
        ToolRow::replace_all(&self.pool, &rows).await?;
        Ok(())
    }

    async fn rebuild_task_classes_projection(&self) -> Result<(), SparkQError> {
        let entries = ConfigEntry::list_namespace(&self.pool, NS_TASK_CLASSES).await?;
        let mut rows = Vec::with_capacity(entries.len());
        for entry in entries {
            let def: TaskClassDef = serde_json::from_str(&entry.value)?;
            rows.push(TaskClassRow {
                name: entry.key,
                timeout: def.timeout,
                description: def.description,
            });
        }
        TaskClassRow::replace_all(&self.pool, &rows).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparkq_db::pool::connect_in_memory;

    async fn registry() -> ConfigRegistry {
        let pool = connect_in_memory().await.expect("pool");
        ConfigRegistry::new_with_file(pool, FileConfig::default())
            .await
            .expect("registry")
    }

    #[tokio::test]
    async fn seeding_populates_builtin_task_classes() {
        let registry = registry().await;
        let fast = registry.task_class("FAST_SCRIPT").await.expect("lookup").expect("present");
        assert_eq!(fast.timeout, 120);
    }

    #[tokio::test]
    async fn resolve_timeout_prefers_explicit_value() {
        let registry = registry().await;
        let t = registry
            .resolve_timeout(Some(42), "FAST_SCRIPT")
            .await
            .expect("resolve");
        assert_eq!(t, 42);
    }

    #[tokio::test]
    async fn resolve_timeout_falls_back_for_unknown_class() {
        let registry = registry().await;
        let t = registry.resolve_timeout(None, "TOTALLY_UNKNOWN").await.expect("resolve");
        assert_eq!(t, ConfigDefaults::FALLBACK_TIMEOUT_SECONDS);
    }

    #[tokio::test]
    async fn resolve_timeout_recognizes_rough_class_name_fallback() {
        let registry = registry().await;
        // Delete the seeded registration so only the rough-name fallback applies.
        registry.delete(NS_TASK_CLASSES, "LLM_HEAVY").await.expect("delete seeded entry");
        let t = registry.resolve_timeout(None, "LLM_HEAVY").await.expect("resolve");
        assert_eq!(t, 1200);
    }

    #[tokio::test]
    async fn put_tools_all_validates_task_class_reference() {
        let registry = registry().await;
        let err = registry
            .put(NS_TOOLS, "broken-tool", r#"{"task_class":"NOPE"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, SparkQError::Validation(_)));
    }

    #[tokio::test]
    async fn put_tools_all_rewrites_projection() {
        let registry = registry().await;
        registry
            .put(NS_TOOLS, "custom-tool", r#"{"task_class":"FAST_SCRIPT","description":"demo"}"#)
            .await
            .expect("put");
        let tool = registry.tool("custom-tool").await.expect("lookup").expect("present");
        assert_eq!(tool.task_class, "FAST_SCRIPT");
    }

    #[tokio::test]
    async fn delete_task_class_referenced_by_tool_is_conflict() {
        let registry = registry().await;
        let err = registry.delete(NS_TASK_CLASSES, "MEDIUM_SCRIPT").await.unwrap_err();
        assert!(matches!(err, SparkQError::Conflict(_)));
    }

    #[tokio::test]
    async fn reload_with_unchanged_file_is_a_no_op() {
        let registry = registry().await;
        let before = registry.auto_fail_interval().await;
        registry.reload().await.expect("reload");
        let after = registry.auto_fail_interval().await;
        assert_eq!(before, after);
    }
}
