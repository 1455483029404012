use clap::Subcommand;
use serde::Serialize;
use serde_json::json;
use sparkq_core::{QuickAdd, SparkQError};
use sparkq_db::models::{Task, TaskListFilter, TaskStatus};

use crate::context::Context;

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    /// Enqueue a task onto a queue.
    Create {
        queue_id: String,
        tool_name: String,
        task_class: String,
        #[arg(long)]
        timeout: Option<i64>,
        #[arg(long)]
        payload: Option<String>,
    },
    /// List tasks, optionally filtered by queue and/or status.
    List {
        #[arg(long)]
        queue_id: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long, default_value_t = 100)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Get a task by id.
    Get { id: String },
    /// Update a task's tool/class/payload.
    Update {
        id: String,
        #[arg(long)]
        tool_name: Option<String>,
        #[arg(long)]
        task_class: Option<String>,
        #[arg(long)]
        payload: Option<String>,
    },
    /// Delete a task outright.
    Delete { id: String },
    /// Claim the oldest queued task in a queue.
    Claim {
        queue_id: String,
        #[arg(long)]
        worker_id: Option<String>,
    },
    /// Mark a running task succeeded.
    Complete {
        id: String,
        result_summary: String,
        #[arg(long)]
        result: Option<String>,
    },
    /// Mark a task failed.
    Fail {
        id: String,
        error_message: String,
        #[arg(long)]
        error_type: Option<String>,
    },
    /// Clone a terminal task back into `queued`.
    Requeue { id: String },
    /// Enqueue via the quick-add convenience shapes.
    QuickAddLlm {
        queue_id: String,
        prompt: String,
        #[arg(long)]
        tool_name: String,
    },
    QuickAddScript {
        queue_id: String,
        script_path: String,
        #[arg(long = "arg")]
        script_args: Vec<String>,
    },
}

#[derive(Debug, Serialize)]
struct ClaimOutput {
    task: Option<Task>,
    worker_id: Option<String>,
}

pub async fn dispatch(ctx: &Context, cmd: TaskCommand) -> Result<(), SparkQError> {
    match cmd {
        TaskCommand::Create { queue_id, tool_name, task_class, timeout, payload } => {
            let task = ctx
                .lifecycle
                .enqueue(&queue_id, &tool_name, &task_class, timeout, payload.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&task).expect("serialize task"));
        }
        TaskCommand::List { queue_id, status, limit, offset } => {
            let filter = TaskListFilter {
                queue_id: queue_id.as_deref(),
                status,
            };
            let tasks = Task::list(&ctx.pool, filter, limit, offset).await?;
            println!("{}", serde_json::to_string_pretty(&tasks).expect("serialize tasks"));
        }
        TaskCommand::Get { id } => {
            let task = Task::find_by_id(&ctx.pool, &id)
                .await?
                .ok_or_else(|| SparkQError::not_found("task", id))?;
            println!("{}", serde_json::to_string_pretty(&task).expect("serialize task"));
        }
        TaskCommand::Update { id, tool_name, task_class, payload } => {
            let task = Task::update(&ctx.pool, &id, tool_name.as_deref(), task_class.as_deref(), payload.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&task).expect("serialize task"));
        }
        TaskCommand::Delete { id } => {
            Task::delete(&ctx.pool, &id).await?;
            println!("{}", json!({ "deleted": true, "id": id }));
        }
        TaskCommand::Claim { queue_id, worker_id } => {
            let result = ctx.lifecycle.claim(&queue_id, worker_id.as_deref()).await?;
            let out = match result {
                Some(r) => ClaimOutput { task: Some(r.task), worker_id: r.worker_id },
                None => ClaimOutput { task: None, worker_id: None },
            };
            println!("{}", serde_json::to_string_pretty(&out).expect("serialize claim"));
        }
        TaskCommand::Complete { id, result_summary, result } => {
            let task = ctx.lifecycle.complete(&id, &result_summary, result.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&task).expect("serialize task"));
        }
        TaskCommand::Fail { id, error_message, error_type } => {
            let task = ctx.lifecycle.fail(&id, &error_message, error_type.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&task).expect("serialize task"));
        }
        TaskCommand::Requeue { id } => {
            let task = ctx.lifecycle.requeue(&id).await?;
            println!("{}", serde_json::to_string_pretty(&task).expect("serialize task"));
        }
        TaskCommand::QuickAddLlm { queue_id, prompt, tool_name } => {
            let task = ctx.lifecycle.quick_add(&queue_id, QuickAdd::Llm { prompt, tool_name }).await?;
            println!("{}", serde_json::to_string_pretty(&task).expect("serialize task"));
        }
        TaskCommand::QuickAddScript { queue_id, script_path, script_args } => {
            let task = ctx
                .lifecycle
                .quick_add(&queue_id, QuickAdd::Script { script_path, script_args })
                .await?;
            println!("{}", serde_json::to_string_pretty(&task).expect("serialize task"));
        }
    }
    Ok(())
}
