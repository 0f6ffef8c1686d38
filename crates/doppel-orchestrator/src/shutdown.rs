// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! Installs handlers for SIGTERM and SIGINT (Ctrl+C), triggering a
//! [`CancellationToken`] that every channel task monitors.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        "failed to install SIGTERM handler, listening for Ctrl+C only"
                    );
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Waits up to `grace` for `tasks` to finish, then aborts the rest.
///
/// Returns the number of tasks that had to be aborted.
pub async fn drain_tasks(mut tasks: Vec<JoinHandle<()>>, grace: Duration) -> usize {
    if tasks.is_empty() {
        return 0;
    }
    info!(count = tasks.len(), grace_secs = grace.as_secs(), "waiting for channel tasks to finish");

    let joined = tokio::time::timeout(grace, async {
        for task in tasks.iter_mut() {
            if let Err(e) = task.await
                && e.is_panic()
            {
                warn!(error = %e, "channel task panicked");
            }
        }
    })
    .await;

    if joined.is_ok() {
        info!("all channel tasks stopped");
        return 0;
    }

    let remaining = tasks.iter().filter(|t| !t.is_finished()).count();
    for task in &tasks {
        task.abort();
    }
    warn!(remaining, "grace period elapsed, aborting channel tasks");
    remaining
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_signal_handler_returns_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn finished_tasks_drain_without_abort() {
        let tasks = vec![
            tokio::spawn(async {}),
            tokio::spawn(async { tokio::time::sleep(Duration::from_secs(1)).await }),
        ];
        assert_eq!(drain_tasks(tasks, Duration::from_secs(30)).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_tasks_are_aborted_after_grace() {
        let tasks = vec![
            tokio::spawn(async {}),
            tokio::spawn(async { tokio::time::sleep(Duration::from_secs(3600)).await }),
        ];
        assert_eq!(drain_tasks(tasks, Duration::from_secs(30)).await, 1);
    }
}
