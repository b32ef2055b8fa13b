//! Graceful Shutdown Module
//!
//! Signal handling plus a coordinator that tells tracked tasks to stop and
//! waits a bounded time for them to drain.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Shutdown coordinator for graceful termination
pub struct ShutdownCoordinator {
    shutdown_tx: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            tasks: JoinSet::new(),
        }
    }

    /// Gets a shutdown receiver
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.shutdown_tx.subscribe(),
        }
    }

    /// Signals every subscriber to stop. Idempotent.
    pub fn trigger(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Spawns a tracked task. The task is expected to watch its own
    /// [`ShutdownSignal`] and finish once it fires.
    pub fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(async move {
            future.await;
            info!(task = name, "Task finished");
        });
    }

    /// Waits for SIGINT/SIGTERM, or for a tracked task to exit on its own.
    pub async fn wait(&mut self) {
        tokio::select! {
            () = wait_for_signal() => {}
            Some(result) = self.tasks.join_next() => {
                match result {
                    Ok(()) => warn!("Task exited before shutdown was requested"),
                    Err(e) => error!(error = %e, "Task failed before shutdown was requested"),
                }
            }
        }
    }

    /// Triggers shutdown and waits up to `timeout` for tracked tasks.
    /// Tasks still running at the deadline are aborted.
    pub async fn shutdown(mut self, timeout: Duration) {
        info!("Initiating graceful shutdown");
        self.trigger();

        let drained = tokio::time::timeout(timeout, async {
            while let Some(result) = self.tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Task failed during shutdown");
                }
            }
        })
        .await;

        match drained {
            Ok(()) => info!("All tasks completed gracefully"),
            Err(_) => {
                warn!(
                    remaining = self.tasks.len(),
                    "Shutdown timeout reached, aborting remaining tasks"
                );
                self.tasks.abort_all();
            }
        }

        info!("Shutdown complete");
    }

    /// Returns the number of tracked tasks
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Shutdown signal receiver
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown is triggered, including if it already was.
    pub async fn recv(mut self) {
        // A dropped coordinator also ends the wait
        let _ = self.receiver.wait_for(|triggered| *triggered).await;
    }
}

/// Waits for SIGTERM or SIGINT
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
