use uuid::Uuid;

/// Generate a random, collision-resistant ID with an entity-type prefix
/// (spec §4.1 "ID format"). Callers never assemble IDs themselves.
pub fn generate(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::new_v4().simple())
}

pub const PROJECT_PREFIX: &str = "prj_";
pub const SESSION_PREFIX: &str = "ses_";
pub const QUEUE_PREFIX: &str = "que_";
pub const TASK_PREFIX: &str = "tsk_";

pub fn project_id() -> String {
    generate(PROJECT_PREFIX)
}

pub fn session_id() -> String {
    generate(SESSION_PREFIX)
}

pub fn queue_id() -> String {
    generate(QUEUE_PREFIX)
}

pub fn task_id() -> String {
    generate(TASK_PREFIX)
}
