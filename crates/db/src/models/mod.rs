pub mod config_entry;
pub mod project;
pub mod queue;
pub mod session;
pub mod task;

pub use config_entry::{ConfigEntry, PromptRow, TaskClassRow, ToolRow};
pub use project::Project;
pub use queue::{Queue, QueueStats, QueueStatus};
pub use session::{Session, SessionStatus};
pub use task::{Task, TaskListFilter, TaskStatus};
