//! Server bootstrap: binds the listener, starts the background expiration
//! sweeper, and runs the accept loop until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use crate::config::Config;
use crate::connection;
use crate::core::database::now_millis;
use crate::core::state::ServerState;

/// Orchestrates startup: binds the socket, spawns the sweeper, then runs
/// the accept loop until shutdown. Runs until the process is signaled to
/// stop or a background task dies unexpectedly.
pub async fn run(config: Config) -> Result<()> {
    let (listener, state) = bind(config).await?;
    info!("kvemberd listening on {}", listener.local_addr()?);

    let mut background_tasks = JoinSet::new();
    background_tasks.spawn(run_sweeper(state.clone()));

    accept_loop(listener, state, background_tasks).await;
    Ok(())
}

/// Binds the listening socket and constructs the shared server state,
/// without entering the accept loop. Split out from [`run`] so tests can
/// bind to an ephemeral port (`config.port = 0`) and drive `accept_loop`
/// themselves against the address the OS actually chose.
pub async fn bind(config: Config) -> Result<(TcpListener, Arc<ServerState>)> {
    let state = ServerState::new(config);
    let listener = TcpListener::bind(state.config.socket_addr()).await?;
    Ok((listener, state))
}

/// Accepts connections until a shutdown signal arrives or a background
/// task dies. Spawns one `connection::handle_connection` task per socket.
pub async fn accept_loop(listener: TcpListener, state: Arc<ServerState>, mut background_tasks: JoinSet<()>) {
    loop {
        tokio::select! {
            biased;

            _ = await_shutdown_signal() => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }

            Some(res) = background_tasks.join_next() => {
                match res {
                    Ok(()) => warn!("a background task exited unexpectedly"),
                    Err(e) => error!("a background task panicked: {e}"),
                }
            }

            res = listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        let state = state.clone();
                        let session_id = state.next_session_id();
                        tokio::spawn(connection::handle_connection(socket, addr, state, session_id));
                    }
                    Err(e) => warn!("failed to accept connection: {e}"),
                }
            }
        }
    }
}

#[cfg(unix)]
async fn await_shutdown_signal() {
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn await_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Periodically walks every shard evicting keys whose TTL has passed,
/// independent of whether anyone reads them. `DbShard::expire_if_due`
/// already handles expiration lazily on access; this is what catches
/// keys nobody ever looks at again.
async fn run_sweeper(state: Arc<ServerState>) {
    let interval = Duration::from_millis(state.config.sweeper_interval_ms.max(1));
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let now = now_millis();
        for shard_lock in &state.db.shards {
            let mut shard = shard_lock.lock().await;
            let expired: Vec<_> = shard
                .map
                .iter()
                .filter(|(_, v)| v.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in expired {
                shard.map.shift_remove(&key);
                state.watches.notify_deletion(&key);
            }
        }
    }
}
