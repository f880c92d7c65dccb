//! Explicit lifecycle for long-running tasks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Cloneable stop signal shared by every background task.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signals every holder to stop. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Tasks still running when the shutdown timeout elapsed.
#[derive(Debug, Error)]
#[error("shutdown timed out after {timeout:?}; still running: {pending:?}")]
pub struct ShutdownTimedOut {
    pub timeout: Duration,
    pub pending: Vec<&'static str>,
}

/// Starts named tasks and stops them together.
#[derive(Debug, Default)]
pub struct Supervisor {
    shutdown: Shutdown,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The signal handed to supervised tasks.
    pub fn shutdown_signal(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Spawns a task that is expected to return once the signal fires.
    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(task = name, "Starting task");
        self.tasks.push((name, tokio::spawn(task)));
    }

    /// Number of supervised tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Fires the signal and waits up to `timeout` for every task to finish.
    ///
    /// Tasks still running at the deadline are aborted and reported.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), ShutdownTimedOut> {
        self.shutdown.trigger();

        let (names, handles): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        match tokio::time::timeout(timeout, join_all(handles)).await {
            Ok(results) => {
                for (name, result) in names.iter().zip(results) {
                    match result {
                        Ok(()) => tracing::info!(task = name, "Task stopped"),
                        Err(e) => tracing::error!(task = name, error = %e, "Task failed"),
                    }
                }
                Ok(())
            }
            Err(_) => {
                let pending: Vec<&'static str> = names
                    .iter()
                    .zip(&aborts)
                    .filter(|(_, handle)| !handle.is_finished())
                    .map(|(name, _)| *name)
                    .collect();
                for handle in &aborts {
                    handle.abort();
                }
                tracing::error!(?pending, "Shutdown timed out; aborting tasks");
                Err(ShutdownTimedOut { timeout, pending })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_returns_after_trigger() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());

        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.wait().await })
        };

        shutdown.trigger();
        waiter.await.unwrap();
        assert!(shutdown.is_triggered());

        // Already triggered: returns immediately.
        shutdown.wait().await;
    }

    #[tokio::test]
    async fn test_supervisor_stops_cooperative_tasks() {
        let mut supervisor = Supervisor::new();
        for name in ["a", "b"] {
            let shutdown = supervisor.shutdown_signal();
            supervisor.spawn(name, async move { shutdown.wait().await });
        }
        assert_eq!(supervisor.len(), 2);

        supervisor.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_reports_stuck_tasks() {
        let mut supervisor = Supervisor::new();
        let shutdown = supervisor.shutdown_signal();
        supervisor.spawn("polite", async move { shutdown.wait().await });
        supervisor.spawn("stuck", std::future::pending());

        let err = supervisor
            .shutdown(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.pending, vec!["stuck"]);
    }
}
