use clap::Subcommand;
use serde::Serialize;
use serde_json::json;
use sparkq_core::SparkQError;
use sparkq_db::models::{Queue, QueueStats};

use crate::context::Context;

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// Create a queue under a session.
    Create {
        session_id: String,
        name: String,
        #[arg(long)]
        instructions: Option<String>,
    },
    /// List queues, optionally scoped to one session, with stats.
    List {
        #[arg(long)]
        session_id: Option<String>,
        #[arg(long, default_value_t = 100)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Get a queue by id, with stats.
    Get { id: String },
    /// Update a queue's name and/or instructions.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        instructions: Option<String>,
    },
    /// End a queue.
    End { id: String },
    /// Archive a queue.
    Archive { id: String },
    /// Unarchive a queue back to active.
    Unarchive { id: String },
    /// Delete a queue, cascading to its tasks.
    Delete { id: String },
}

#[derive(Debug, Serialize)]
struct QueueWithStats {
    #[serde(flatten)]
    queue: Queue,
    stats: QueueStats,
}

pub async fn dispatch(ctx: &Context, cmd: QueueCommand) -> Result<(), SparkQError> {
    match cmd {
        QueueCommand::Create { session_id, name, instructions } => {
            let queue = ctx
                .queue_manager
                .create_queue(&session_id, &name, instructions.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&queue).expect("serialize queue"));
        }
        QueueCommand::List { session_id, limit, offset } => {
            let queues = ctx
                .queue_manager
                .list_queues(session_id.as_deref(), limit, offset)
                .await?;
            let out: Vec<QueueWithStats> = queues.into_iter().map(|(queue, stats)| QueueWithStats { queue, stats }).collect();
            println!("{}", serde_json::to_string_pretty(&out).expect("serialize queues"));
        }
        QueueCommand::Get { id } => {
            let queue = ctx.queue_manager.get_queue(&id).await?;
            let stats = ctx.queue_manager.queue_stats(&id).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&QueueWithStats { queue, stats }).expect("serialize queue")
            );
        }
        QueueCommand::Update { id, name, instructions } => {
            let queue = ctx
                .queue_manager
                .update_queue(&id, name.as_deref(), instructions.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&queue).expect("serialize queue"));
        }
        QueueCommand::End { id } => {
            let queue = ctx.queue_manager.end_queue(&id).await?;
            println!("{}", serde_json::to_string_pretty(&queue).expect("serialize queue"));
        }
        QueueCommand::Archive { id } => {
            let queue = ctx.queue_manager.archive_queue(&id).await?;
            println!("{}", serde_json::to_string_pretty(&queue).expect("serialize queue"));
        }
        QueueCommand::Unarchive { id } => {
            let queue = ctx.queue_manager.unarchive_queue(&id).await?;
            println!("{}", serde_json::to_string_pretty(&queue).expect("serialize queue"));
        }
        QueueCommand::Delete { id } => {
            ctx.queue_manager.delete_queue(&id).await?;
            println!("{}", json!({ "deleted": true, "id": id }));
        }
    }
    Ok(())
}
