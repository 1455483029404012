//! The SparkQ scheduling core: task lifecycle, queue/session containment,
//! the deadline watcher, and the layered config registry (spec §1-§5).

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod queue_manager;
pub mod watcher;

pub use config::{ConfigDefaults, ConfigRegistry, FileConfig};
pub use error::SparkQError;
pub use lifecycle::{ClaimResult, Lifecycle, QuickAdd};
pub use queue_manager::{ProjectStats, QueueManager};
pub use watcher::{StaleCheckReport, Watcher};
