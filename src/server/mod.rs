//! Server lifecycle: HTTP listener on a background task, graceful stop,
//! signal handling and diagnostics.

pub mod diagnostics;
pub mod signals;

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use diagnostics::DiagnosticReport;
pub use signals::{Lifecycle, ProcessSignal, forward_os_signals, listen_signals};

use crate::config::{ServerConfig, SystemSettings};
use crate::error::ServerError;
use crate::worker::WorkerQueue;

/// Lifecycle phase of the server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

type ServeHandle = JoinHandle<std::io::Result<()>>;

/// A running HTTP server plus the worker queue it feeds.
pub struct Server {
    addr: SocketAddr,
    config: ServerConfig,
    system: SystemSettings,
    queue: WorkerQueue,
    phase: Mutex<Phase>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    serve: Mutex<Option<ServeHandle>>,
    started_at: Instant,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Server {
    /// Bind `0.0.0.0:{port}` and serve `router` on a spawned task.
    pub async fn start(
        config: ServerConfig,
        system: SystemSettings,
        router: Router,
        queue: WorkerQueue,
    ) -> Result<Self, ServerError> {
        let started_at = Instant::now();
        let bind_addr = config.bind_addr();
        info!(addr = %bind_addr, environment = %system.environment, "Starting server");

        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: bind_addr.clone(),
            source,
        })?;

        let server = Self {
            addr,
            config,
            system,
            queue,
            phase: Mutex::new(Phase::Starting),
            shutdown: Mutex::new(None),
            serve: Mutex::new(None),
            started_at,
        };

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
        });

        *lock(&server.shutdown) = Some(tx);
        *lock(&server.serve) = Some(handle);
        *lock(&server.phase) = Phase::Running;
        info!(addr = %addr, "HTTP server listening");

        Ok(server)
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn phase(&self) -> Phase {
        *lock(&self.phase)
    }

    pub fn queue(&self) -> &WorkerQueue {
        &self.queue
    }

    /// Stop accepting connections, wait for in-flight requests, then drain
    /// the worker queue.
    ///
    /// The queue is drained even when the listener failed to stop cleanly;
    /// the first error is returned.
    pub async fn stop(&self) -> Result<(), ServerError> {
        {
            let mut phase = lock(&self.phase);
            if *phase != Phase::Running {
                return Err(ServerError::InvalidPhase {
                    action: "stop".into(),
                    phase: phase.to_string(),
                });
            }
            *phase = Phase::Stopping;
        }
        info!("Stopping HTTP server");

        if let Some(tx) = lock(&self.shutdown).take() {
            let _ = tx.send(());
        }

        let handle = lock(&self.serve).take();
        let listener = match handle {
            Some(handle) => self.wait_for_listener(handle).await,
            None => Ok(()),
        };

        let drained = self.queue.shutdown().await;
        *lock(&self.phase) = Phase::Stopped;

        listener?;
        drained?;
        info!("Server stopped");
        Ok(())
    }

    async fn wait_for_listener(&self, mut handle: ServeHandle) -> Result<(), ServerError> {
        let timeout = self.config.shutdown_timeout;
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(ServerError::Listener(e.to_string())),
            Ok(Err(e)) => Err(ServerError::Listener(e.to_string())),
            Err(_) => {
                warn!(?timeout, "In-flight requests did not finish in time");
                handle.abort();
                Err(ServerError::ShutdownTimeout { timeout })
            }
        }
    }

    pub fn diagnostics(&self) -> Result<DiagnosticReport, ServerError> {
        DiagnosticReport::collect(&self.system, &self.queue, self.started_at)
    }
}

#[async_trait]
impl Lifecycle for Server {
    async fn stop(&self) -> Result<(), ServerError> {
        Server::stop(self).await
    }

    async fn diagnostics(&self) -> Result<DiagnosticReport, ServerError> {
        Server::diagnostics(self)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::routing::get;

    use super::*;
    use crate::config::WorkerConfig;
    use crate::error::WorkerError;
    use crate::worker::Task;

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 0,
            shutdown_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    async fn start(queue: WorkerQueue) -> Server {
        let router = Router::new().route("/", get(|| async { "ok" }));
        Server::start(test_config(), SystemSettings::default(), router, queue)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn start_then_stop_walks_phases() {
        let server = start(WorkerQueue::start(WorkerConfig::default())).await;
        assert_eq!(server.phase(), Phase::Running);
        assert_ne!(server.local_addr().port(), 0);

        server.stop().await.unwrap();
        assert_eq!(server.phase(), Phase::Stopped);

        let err = server.stop().await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidPhase { .. }));
    }

    #[tokio::test]
    async fn stop_drains_pending_tasks() {
        let queue = WorkerQueue::new(WorkerConfig::default());
        let server = start(queue.clone()).await;
        queue
            .enqueue(Task::new("Idle", |_ctx| async move { Ok(()) }))
            .unwrap();
        queue.spawn_workers();

        server.stop().await.unwrap();
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.stats().completed, 1);
    }

    #[tokio::test]
    async fn stop_reports_abandoned_tasks() {
        // A queue with no workers can never drain.
        let queue = WorkerQueue::new(WorkerConfig::default());
        let server = start(queue.clone()).await;
        queue
            .enqueue(Task::new("Idle", |_ctx| async move { Ok(()) }))
            .unwrap();

        let err = server.stop().await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Drain(WorkerError::NoWorkers { abandoned: 1 })
        ));
        assert_eq!(server.phase(), Phase::Stopped);
    }
}
