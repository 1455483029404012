use clap::Subcommand;
use serde_json::json;
use sparkq_core::SparkQError;

use crate::context::Context;

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Create a session.
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List sessions in the project.
    List {
        #[arg(long, default_value_t = 100)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Get a session by id.
    Get { id: String },
    /// Update a session's name and/or description.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// End a session.
    End { id: String },
    /// Delete a session, cascading to its queues and tasks.
    Delete { id: String },
}

pub async fn dispatch(ctx: &Context, cmd: SessionCommand) -> Result<(), SparkQError> {
    match cmd {
        SessionCommand::Create { name, description } => {
            let session = ctx
                .queue_manager
                .create_session(&ctx.project.id, &name, description.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&session).expect("serialize session"));
        }
        SessionCommand::List { limit, offset } => {
            let sessions = ctx.queue_manager.list_sessions(&ctx.project.id, limit, offset).await?;
            println!("{}", serde_json::to_string_pretty(&sessions).expect("serialize sessions"));
        }
        SessionCommand::Get { id } => {
            let session = ctx.queue_manager.get_session(&id).await?;
            println!("{}", serde_json::to_string_pretty(&session).expect("serialize session"));
        }
        SessionCommand::Update { id, name, description } => {
            let session = ctx
                .queue_manager
                .update_session(&id, name.as_deref(), description.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&session).expect("serialize session"));
        }
        SessionCommand::End { id } => {
            let session = ctx.queue_manager.end_session(&id).await?;
            println!("{}", serde_json::to_string_pretty(&session).expect("serialize session"));
        }
        SessionCommand::Delete { id } => {
            ctx.queue_manager.delete_session(&id).await?;
            println!("{}", json!({ "deleted": true, "id": id }));
        }
    }
    Ok(())
}
