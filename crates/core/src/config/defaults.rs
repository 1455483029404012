use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named handler class (spec GLOSSARY "Tool"). Tools carry a default
/// task class that supplies their timeout band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDef {
    pub task_class: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A named timeout band (spec GLOSSARY "Task class").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskClassDef {
    pub timeout: i64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Built-in defaults compiled into the binary — tier 3 of the Config
/// Registry (spec §4.5). Chosen per §9's open question: the runtime value
/// always comes from the active configuration; these are only the seed.
#[derive(Debug, Clone)]
pub struct ConfigDefaults;

impl ConfigDefaults {
    pub const SERVER_HOST: &'static str = "127.0.0.1";
    pub const SERVER_PORT: u16 = 7878;
    pub const DATABASE_FILE: &'static str = "sparkq.db";
    pub const LOCK_TIMEOUT_SECONDS: u64 = 5;

    /// Fallback used when `task_class` is not registered (spec §4.2
    /// "Timeout resolution policy", step 4).
    pub const FALLBACK_TIMEOUT_SECONDS: i64 = 300;

    pub const PURGE_OLDER_THAN_DAYS: i64 = 3;
    pub const PURGE_INTERVAL_SECONDS: u64 = 3600;
    pub const AUTO_FAIL_INTERVAL_SECONDS: u64 = 30;

    /// `timeout` fallback when a `running` task's own field is missing or
    /// unparsable (spec §4.4 "Stale-check pass", step 2).
    pub const STALE_TASK_TIMEOUT_FALLBACK_SECONDS: i64 = 3600;

    pub fn task_classes() -> BTreeMap<String, TaskClassDef> {
        [
            (
                "FAST_SCRIPT",
                TaskClassDef {
                    timeout: 120,
                    description: Some("short-lived shell scripts".to_string()),
                },
            ),
            (
                "MEDIUM_SCRIPT",
                TaskClassDef {
                    timeout: 600,
                    description: Some("scripts expected to run for minutes".to_string()),
                },
            ),
            (
                "LLM_LITE",
                TaskClassDef {
                    timeout: 480,
                    description: Some("small/cheap model calls".to_string()),
                },
            ),
            (
                "LLM_HEAVY",
                TaskClassDef {
                    timeout: 1200,
                    description: Some("large model calls or agentic loops".to_string()),
                },
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    pub fn tools() -> BTreeMap<String, ToolDef> {
        [
            (
                "run-bash",
                ToolDef {
                    task_class: "MEDIUM_SCRIPT".to_string(),
                    description: Some("execute a shell script".to_string()),
                },
            ),
            (
                "llm-prompt",
                ToolDef {
                    task_class: "LLM_LITE".to_string(),
                    description: Some("invoke an LLM with a prompt".to_string()),
                },
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    /// Rough fallback by task-class name when the class itself is not
    /// registered but its name is recognized (spec §4.2 step 3). Returns
    /// `None` for anything outside the four named bands.
    pub fn timeout_by_rough_class_name(task_class: &str) -> Option<i64> {
        Self::task_classes().get(task_class).map(|c| c.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_task_classes_cover_the_four_named_bands() {
        let classes = ConfigDefaults::task_classes();
        for name in ["FAST_SCRIPT", "MEDIUM_SCRIPT", "LLM_LITE", "LLM_HEAVY"] {
            assert!(classes.contains_key(name), "missing {name}");
        }
    }
}
