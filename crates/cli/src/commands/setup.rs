use serde_json::json;
use sparkq_core::SparkQError;

use crate::context::Context;

/// `sparkq setup` — open (creating if needed) the database, run migrations,
/// and seed the config tables (spec §6 "init schema and seed"). Bootstrap
/// already does all of this; this command exists to make it an explicit,
/// idempotent operator action.
pub async fn run(ctx: &Context) -> Result<(), SparkQError> {
    let (host, port) = ctx.config.server_bind().await?;
    println!(
        "{}",
        json!({
            "project_id": ctx.project.id,
            "project_name": ctx.project.name,
            "database_path": ctx.config.database_path().await,
            "server_bind": format!("{host}:{port}"),
        })
    );
    Ok(())
}
