use clap::Subcommand;
use sparkq_core::SparkQError;

use crate::context::Context;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the fully resolved configuration across all three tiers.
    Get,
    /// Write a namespaced entry. Catalog namespaces (`tools.all`,
    /// `task_classes.all`) expect a JSON document; plain settings take
    /// their raw value as-is (e.g. `server host 0.0.0.0`).
    Put { namespace: String, key: String, value: String },
    /// Remove a namespaced entry, reverting to the file/built-in value.
    Delete { namespace: String, key: String },
    /// Check a proposed value against constraints without persisting it.
    Validate { namespace: String, key: String, value: String },
}

pub async fn dispatch(ctx: &Context, cmd: ConfigCommand) -> Result<(), SparkQError> {
    match cmd {
        ConfigCommand::Get => {
            let config = ctx.config.get_full_config().await?;
            println!("{}", serde_json::to_string_pretty(&config).expect("serialize config"));
        }
        ConfigCommand::Put { namespace, key, value } => {
            ctx.config.put(&namespace, &key, &value).await?;
            println!("{{\"written\": true}}");
        }
        ConfigCommand::Delete { namespace, key } => {
            ctx.config.delete(&namespace, &key).await?;
            println!("{{\"deleted\": true}}");
        }
        ConfigCommand::Validate { namespace, key, value } => {
            ctx.config.validate(&namespace, &key, &value).await?;
            println!("{{\"valid\": true}}");
        }
    }
    Ok(())
}
