use std::fs::OpenOptions;
use std::process::{Command, Stdio};
use std::time::Duration;

use serde_json::json;
use sparkq_core::{SparkQError, Watcher};
use sparkq_utils::lockfile::ProcessLock;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::context::Context;

/// `sparkq run` — start the HTTP server and the background Watcher in the
/// foreground, holding the lockfile for as long as the process lives
/// (spec §5, §6 "run (start server foreground)").
pub async fn run(ctx: &Context) -> Result<(), SparkQError> {
    let _lock = ProcessLock::acquire(ctx.lockfile_path())
        .map_err(|e| SparkQError::conflict(format!("cannot start: {e}")))?;

    let (host, port) = ctx.config.server_bind().await?;
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await.map_err(SparkQError::from)?;
    tracing::info!(%addr, "sparkq server listening");

    let shutdown = CancellationToken::new();
    let watcher = Watcher::new(ctx.pool.clone(), ctx.config.clone());
    let watcher_shutdown = shutdown.clone();
    let watcher_handle = tokio::spawn(async move { watcher.run(watcher_shutdown).await });

    let router = sparkq_server::build_router(ctx.app_state());
    let server_shutdown = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            // `stop` signals this process with SIGTERM (spec §5 "Lockfile");
            // without a handler for it the process dies by default
            // disposition and never runs `ProcessLock`'s `Drop`, leaving the
            // lockfile behind for `stop` to poll on forever.
            let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("install SIGTERM handler");
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
            server_shutdown.cancel();
        })
        .await
        .map_err(|e| SparkQError::Internal(e.to_string()))?;

    shutdown.cancel();
    let _ = watcher_handle.await;
    Ok(())
}

/// `sparkq start` — spawn `run` as a detached background process and
/// return immediately, recording its PID in the lockfile.
pub fn start(ctx: &Context) -> Result<(), SparkQError> {
    if ProcessLock::read_pid(ctx.lockfile_path()).is_some() && status_running(ctx) {
        return Err(SparkQError::conflict("sparkq is already running"));
    }

    let exe = std::env::current_exe().map_err(SparkQError::from)?;
    let log_path = ctx.lockfile_path().with_extension("log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(SparkQError::from)?;
    let log_file_err = log_file.try_clone().map_err(SparkQError::from)?;

    let child = Command::new(exe)
        .arg("run")
        .stdin(Stdio::null())
        .stdout(Stdio::from(log_file))
        .stderr(Stdio::from(log_file_err))
        .spawn()
        .map_err(SparkQError::from)?;

    println!("{}", json!({ "started": true, "pid": child.id(), "log": log_path }));
    Ok(())
}

/// `sparkq stop` — signal the running process and wait briefly for the
/// lockfile to clear.
pub async fn stop(ctx: &Context) -> Result<(), SparkQError> {
    let pid = ProcessLock::read_pid(ctx.lockfile_path())
        .ok_or_else(|| SparkQError::not_found("process", "lockfile"))?;

    let result = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
    if result != 0 {
        return Err(SparkQError::Internal(format!("failed to signal pid {pid}")));
    }

    for _ in 0..50 {
        if !ctx.lockfile_path().exists() {
            println!("{}", json!({ "stopped": true, "pid": pid }));
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Err(SparkQError::Internal(format!(
        "pid {pid} did not release the lockfile within 5s"
    )))
}

/// `sparkq status` — report whether a live process currently holds the lock.
pub fn status(ctx: &Context) -> Result<(), SparkQError> {
    let running = status_running(ctx);
    let pid = ProcessLock::read_pid(ctx.lockfile_path());
    println!("{}", json!({ "running": running, "pid": pid }));
    Ok(())
}

/// Probe liveness by attempting to acquire the advisory lock ourselves: a
/// successful acquisition (immediately released) means nobody else holds it.
fn status_running(ctx: &Context) -> bool {
    match ProcessLock::acquire(ctx.lockfile_path()) {
        Ok(lock) => {
            drop(lock);
            false
        }
        Err(_) => true,
    }
}

pub async fn restart(ctx: &Context) -> Result<(), SparkQError> {
    if status_running(ctx) {
        stop(ctx).await?;
    }
    start(ctx)
}

/// `sparkq reload` — tell the *running* server to re-read the file-backed
/// config layer without restart (spec §4.5 "reload"). This CLI invocation
/// constructs its own throwaway `ConfigRegistry`; reloading that one would
/// never touch the long-lived server process's in-memory file layer, so
/// this reaches the daemon over HTTP the same way `stop` reaches it via
/// signal.
pub async fn reload(ctx: &Context) -> Result<(), SparkQError> {
    let (host, port) = ctx.config.server_bind().await?;
    let url = format!("http://{host}:{port}/config/reload");

    let response = reqwest::Client::new()
        .post(&url)
        .send()
        .await
        .map_err(|e| SparkQError::Internal(format!("failed to reach sparkq server at {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(SparkQError::Internal(format!(
            "sparkq server at {url} rejected reload: {}",
            response.status()
        )));
    }

    println!("{}", json!({ "reloaded": true }));
    Ok(())
}
