use tracing_subscriber::{EnvFilter, fmt};

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG`, defaulting to `info` for SparkQ's own crates and
/// `warn` for dependencies, matching the teacher's server bootstrap.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=info"));

    let _ = fmt().with_env_filter(filter).try_init();
}
