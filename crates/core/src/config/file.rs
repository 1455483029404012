use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::defaults::{TaskClassDef, ToolDef};
use crate::error::SparkQError;

/// Environment variable that overrides the config-file search (spec §6
/// "Configuration file").
pub const CONFIG_ENV_VAR: &str = "SPARKQ_CONFIG";

pub const CONFIG_FILE_NAME: &str = "sparkq.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProjectSection {
    pub name: Option<String>,
    pub repo_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseSection {
    pub path: Option<String>,
    pub lock_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PurgeSection {
    pub older_than_days: Option<i64>,
    pub interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QueueRunnerSection {
    pub auto_fail_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DefaultsSection {
    pub queue_instructions: Option<String>,
}

/// Layer 2 of the Config Registry: the YAML-like document loaded at
/// startup (spec §4.5). Every field is optional — layer 3 (built-in
/// defaults) fills in anything this layer leaves unset.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub purge: PurgeSection,
    #[serde(default)]
    pub queue_runner: QueueRunnerSection,
    #[serde(default)]
    pub script_dirs: Vec<String>,
    #[serde(default)]
    pub project_script_dirs: Vec<String>,
    #[serde(default)]
    pub task_classes: BTreeMap<String, TaskClassDef>,
    #[serde(default)]
    pub tools: BTreeMap<String, ToolDef>,
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    #[serde(default)]
    pub defaults: DefaultsSection,

    /// Directory this document resolved from; relative paths in other
    /// fields are resolved against it (spec §6 "Relative paths resolve
    /// against the config file's directory"). Not part of the document
    /// itself.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl FileConfig {
    /// Resolve the search path (spec §6: env var → current directory →
    /// repo-root fallback) and load it, or fall back to an empty document
    /// backed by the current directory if nothing is found.
    pub fn load() -> Result<Self, SparkQError> {
        match Self::resolve_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("no sparkq.toml found; using built-in defaults only");
                Ok(Self {
                    base_dir: std::env::current_dir().unwrap_or_default(),
                    ..Default::default()
                })
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SparkQError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&raw)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    fn resolve_path() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(env_path);
            if path.is_file() {
                return Some(path);
            }
            warn!(path = %path.display(), "{CONFIG_ENV_VAR} points at a missing file; ignoring");
        }

        let cwd = std::env::current_dir().ok()?;
        let candidate = cwd.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }

        // Repo-root fallback: walk up from the current directory looking
        // for a `.git` marker alongside the config file name.
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let candidate = parent.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if parent.join(".git").exists() {
                break;
            }
            dir = parent;
        }

        // Last resort: a user-level config directory, for a SparkQ
        // installed once and pointed at many projects.
        if let Some(config_dir) = dirs::config_dir() {
            let candidate = config_dir.join("sparkq").join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        None
    }

    /// Resolve a path from the document against its own directory (spec
    /// §6 "Relative paths resolve against the config file's directory").
    pub fn resolve_relative(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_default_to_empty() {
        let config: FileConfig = toml::from_str("").expect("parse empty doc");
        assert!(config.task_classes.is_empty());
        assert!(config.server.host.is_none());
    }

    #[test]
    fn parses_a_full_document() {
        let doc = r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [purge]
            older_than_days = 7

            [task_classes.FAST_SCRIPT]
            timeout = 90
        "#;
        let config: FileConfig = toml::from_str(doc).expect("parse");
        assert_eq!(config.server.port, Some(9000));
        assert_eq!(config.purge.older_than_days, Some(7));
        assert_eq!(config.task_classes["FAST_SCRIPT"].timeout, 90);
    }
}
