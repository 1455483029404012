use sparkq_core::SparkQError;

use crate::context::Context;

/// `sparkq stats` — project-wide totals of sessions, queues, queued, running
/// (spec §6 "Stats").
pub async fn run(ctx: &Context) -> Result<(), SparkQError> {
    let stats = ctx.queue_manager.project_stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats).expect("serialize stats"));
    Ok(())
}
