mod commands;
mod context;

use clap::{Parser, Subcommand};
use sparkq_core::SparkQError;

use self::commands::config::ConfigCommand;
use self::commands::queues::QueueCommand;
use self::commands::sessions::SessionCommand;
use self::commands::tasks::TaskCommand;
use self::context::Context;

/// SparkQ: a local-first task queue. `setup`/`run`/`start`/`stop`/`status`/
/// `restart`/`reload` manage the server process; the rest are thin
/// wrappers over the scheduling core (spec §6 "CLI surface").
#[derive(Debug, Parser)]
#[command(name = "sparkq", version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Initialize the database schema and seed config catalogs.
    Setup,
    /// Start the HTTP server and Watcher in the foreground.
    Run,
    /// Start the server as a detached background process.
    Start,
    /// Stop the running background process.
    Stop,
    /// Report whether the server is running.
    Status,
    /// Stop then start the background process.
    Restart,
    /// Re-read the file-backed config layer without restart.
    Reload,
    /// Project-wide totals of sessions, queues, queued, running.
    Stats,
    /// Session operations.
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
    /// Queue operations.
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },
    /// Task operations.
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    /// Config Registry operations.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() {
    sparkq_utils::logging::init();
    let args = Args::parse();

    let exit_code = match run(args.command).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            exit_code_for(&err)
        }
    };
    std::process::exit(exit_code);
}

async fn run(command: Commands) -> anyhow::Result<()> {
    // `start`/`status` don't need a live pool for the *display* half of
    // their work, but bootstrapping is cheap and keeps every command on
    // one code path.
    let ctx = Context::bootstrap().await?;

    match command {
        Commands::Setup => commands::setup::run(&ctx).await?,
        Commands::Run => commands::process::run(&ctx).await?,
        Commands::Start => commands::process::start(&ctx)?,
        Commands::Stop => commands::process::stop(&ctx).await?,
        Commands::Status => commands::process::status(&ctx)?,
        Commands::Restart => commands::process::restart(&ctx).await?,
        Commands::Reload => commands::process::reload(&ctx).await?,
        Commands::Stats => commands::stats::run(&ctx).await?,
        Commands::Session { command } => commands::sessions::dispatch(&ctx, command).await?,
        Commands::Queue { command } => commands::queues::dispatch(&ctx, command).await?,
        Commands::Task { command } => commands::tasks::dispatch(&ctx, command).await?,
        Commands::Config { command } => commands::config::dispatch(&ctx, command).await?,
    }

    Ok(())
}

/// Exit codes per spec §6: 0 success, 2 validation, 3 not-found,
/// 4 conflict, 1 internal (also the fallback for errors this CLI didn't
/// originate, e.g. failure to bootstrap the database connection).
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SparkQError>() {
        Some(SparkQError::Validation(_)) => 2,
        Some(SparkQError::NotFound { .. }) => 3,
        Some(SparkQError::Conflict(_)) => 4,
        Some(SparkQError::Internal(_)) | None => 1,
    }
}
