//! OS signal forwarding and the blocking signal loop run by `main`.
//!
//! ## Unix
//! - **SIGINT** / **SIGTERM** → [`ProcessSignal::Terminate`]
//! - **SIGUSR1** → [`ProcessSignal::Diagnostic`]
//!
//! ## Other platforms
//! Only Ctrl-C is mapped, to [`ProcessSignal::Terminate`].

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::diagnostics::DiagnosticReport;
use crate::error::ServerError;

const SIGNAL_BUFFER: usize = 8;

/// Signals the process reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    /// Stop gracefully and exit.
    Terminate,
    /// Log a diagnostic report and keep running.
    Diagnostic,
}

/// What the signal loop drives.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    async fn stop(&self) -> Result<(), ServerError>;
    async fn diagnostics(&self) -> Result<DiagnosticReport, ServerError>;
}

/// Register OS signal handlers and forward them as [`ProcessSignal`]s.
///
/// Must be called inside a tokio runtime.
#[cfg(unix)]
pub fn forward_os_signals() -> Result<mpsc::Receiver<ProcessSignal>, ServerError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);

    tokio::spawn(async move {
        loop {
            let signal = tokio::select! {
                Some(()) = sigint.recv() => ProcessSignal::Terminate,
                Some(()) = sigterm.recv() => ProcessSignal::Terminate,
                Some(()) = sigusr1.recv() => ProcessSignal::Diagnostic,
                else => break,
            };
            if tx.send(signal).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

#[cfg(not(unix))]
pub fn forward_os_signals() -> Result<mpsc::Receiver<ProcessSignal>, ServerError> {
    let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);

    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(ProcessSignal::Terminate).await.is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

/// Block on `signals` until the process should exit, and return the exit
/// code: 0 after a clean stop, 1 when stopping failed.
///
/// A closed channel counts as [`ProcessSignal::Terminate`].
pub async fn listen_signals(
    mut signals: mpsc::Receiver<ProcessSignal>,
    lifecycle: &dyn Lifecycle,
) -> i32 {
    loop {
        let signal = signals.recv().await.unwrap_or_else(|| {
            warn!("Signal channel closed, shutting down");
            ProcessSignal::Terminate
        });

        match signal {
            ProcessSignal::Terminate => {
                info!("Received terminate signal, shutting down");
                return match lifecycle.stop().await {
                    Ok(()) => {
                        info!("Shutdown complete");
                        0
                    }
                    Err(e) => {
                        error!(error = %e, "Graceful shutdown failed");
                        1
                    }
                };
            }
            ProcessSignal::Diagnostic => match lifecycle.diagnostics().await {
                Ok(report) => info!("Diagnostic report\n{report}"),
                Err(e) => error!(error = %e, "Failed to build diagnostic report"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use super::*;
    use crate::config::{SystemSettings, WorkerConfig};
    use crate::worker::{Task, WorkerQueue};

    struct FakeLifecycle {
        fail_stop: bool,
        fail_diagnostics: bool,
        queue: WorkerQueue,
        stops: AtomicUsize,
        reports: AtomicUsize,
    }

    impl FakeLifecycle {
        fn new(fail_stop: bool, fail_diagnostics: bool) -> Self {
            Self {
                fail_stop,
                fail_diagnostics,
                queue: WorkerQueue::new(WorkerConfig::default()),
                stops: AtomicUsize::new(0),
                reports: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Lifecycle for FakeLifecycle {
        async fn stop(&self) -> Result<(), ServerError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.fail_stop {
                return Err(ServerError::ShutdownTimeout {
                    timeout: Duration::from_secs(1),
                });
            }
            Ok(())
        }

        async fn diagnostics(&self) -> Result<DiagnosticReport, ServerError> {
            self.reports.fetch_add(1, Ordering::SeqCst);
            if self.fail_diagnostics {
                return Err(ServerError::Diagnostics("unavailable".into()));
            }
            DiagnosticReport::collect(&SystemSettings::default(), &self.queue, Instant::now())
        }
    }

    #[tokio::test]
    async fn terminate_with_clean_stop_exits_zero() {
        let lifecycle = FakeLifecycle::new(false, false);
        let (tx, rx) = mpsc::channel(4);
        tx.send(ProcessSignal::Terminate).await.unwrap();

        assert_eq!(listen_signals(rx, &lifecycle).await, 0);
        assert_eq!(lifecycle.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn terminate_with_failing_stop_exits_one() {
        let lifecycle = FakeLifecycle::new(true, false);
        let (tx, rx) = mpsc::channel(4);
        tx.send(ProcessSignal::Terminate).await.unwrap();

        assert_eq!(listen_signals(rx, &lifecycle).await, 1);
    }

    #[tokio::test]
    async fn diagnostic_keeps_running_and_leaves_queue_alone() {
        let lifecycle = FakeLifecycle::new(false, false);
        lifecycle
            .queue
            .enqueue(Task::new("Idle", |_ctx| async move { Ok(()) }))
            .unwrap();

        let (tx, rx) = mpsc::channel(4);
        tx.send(ProcessSignal::Diagnostic).await.unwrap();
        tx.send(ProcessSignal::Diagnostic).await.unwrap();
        tx.send(ProcessSignal::Terminate).await.unwrap();

        assert_eq!(listen_signals(rx, &lifecycle).await, 0);
        assert_eq!(lifecycle.reports.load(Ordering::SeqCst), 2);
        assert_eq!(lifecycle.queue.len(), 1);
    }

    #[tokio::test]
    async fn failed_diagnostics_are_ignored() {
        let lifecycle = FakeLifecycle::new(false, true);
        let (tx, rx) = mpsc::channel(4);
        tx.send(ProcessSignal::Diagnostic).await.unwrap();
        tx.send(ProcessSignal::Terminate).await.unwrap();

        assert_eq!(listen_signals(rx, &lifecycle).await, 0);
        assert_eq!(lifecycle.reports.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closed_channel_stops() {
        let lifecycle = FakeLifecycle::new(false, false);
        let (tx, rx) = mpsc::channel::<ProcessSignal>(1);
        drop(tx);

        assert_eq!(listen_signals(rx, &lifecycle).await, 0);
        assert_eq!(lifecycle.stops.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    fn raise(signal: &str) {
        let status = std::process::Command::new("kill")
            .arg(format!("-{signal}"))
            .arg(std::process::id().to_string())
            .status()
            .unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn os_signals_map_to_process_signals() {
        let mut rx = forward_os_signals().unwrap();

        for (signal, expected) in [
            ("USR1", ProcessSignal::Diagnostic),
            ("TERM", ProcessSignal::Terminate),
            ("INT", ProcessSignal::Terminate),
        ] {
            raise(signal);
            let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap();
            assert_eq!(received, Some(expected), "SIG{signal}");
        }
    }
}
