//! Process supervisor for long-running services.
//!
//! A [`Runner`] owns a set of named app processes and a set of closers:
//! - every process runs concurrently with a shared cancellation token
//! - SIGINT/SIGTERM, or the first process error, cancels the token
//! - closers always run afterwards, bounded by a timeout
//!
//! `run` reports the first process error instead of exiting, so the binary
//! decides on the exit code.
//!
//! ```no_run
//! use vitalsync_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let outcome = Runner::new()
//!         .with_app_process(|ctx| async move {
//!             ctx.cancelled().await;
//!             Ok(())
//!         })
//!         .with_closer(|| async move { Ok(()) })
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run()
//!         .await;
//!
//!     std::process::exit(if outcome.is_ok() { 0 } else { 1 });
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type BoxedResultFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A long-running unit of work. Receives the shared cancellation token.
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> BoxedResultFuture + Send>;

/// Cleanup hook executed once all app processes have stopped
pub type Closer = Box<dyn FnOnce() -> BoxedResultFuture + Send>;

const DEFAULT_CLOSER_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Runner {
    app_processes: Vec<(String, AppProcess)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: DEFAULT_CLOSER_TIMEOUT,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Add an anonymous process; it is named after its registration index
    pub fn with_app_process<F, Fut>(self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = format!("process_{}", self.app_processes.len());
        self.with_named_process(
            name,
            Box::new(move |token| -> BoxedResultFuture { Box::pin(process(token)) }),
        )
    }

    /// Add a process under a name used in lifecycle logs
    pub fn with_named_process(mut self, name: impl Into<String>, process: AppProcess) -> Self {
        self.app_processes.push((name.into(), process));
        self
    }

    /// Add a closer. Closers run concurrently and a failing closer does not
    /// stop the others.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(move || -> BoxedResultFuture { Box::pin(closer()) }));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Use an externally owned token, so callers can trigger shutdown
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Run every process until shutdown, then the closers.
    ///
    /// Returns the first error reported by a process before cancellation. A
    /// panicking process counts as an error.
    pub async fn run(self) -> anyhow::Result<()> {
        let token = self.cancellation_token;
        let signal_tasks = spawn_signal_handlers(token.clone());

        let mut join_set = JoinSet::new();
        for (name, process) in self.app_processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                info!(process = %name, "starting app process");
                let result = process(process_token).await;
                (name, result)
            });
        }

        let mut first_error = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "app process finished");
                }
                Ok((name, Err(err))) => {
                    if token.is_cancelled() {
                        warn!(process = %name, error = %format!("{:#}", err), "app process failed during shutdown");
                    } else {
                        error!(process = %name, error = %format!("{:#}", err), "app process failed");
                        first_error = Some(err);
                        token.cancel();
                    }
                }
                Err(join_error) => {
                    error!(error = %join_error, "app process panicked");
                    if first_error.is_none() {
                        first_error = Some(anyhow::anyhow!("app process panicked: {}", join_error));
                    }
                    token.cancel();
                }
            }

            if token.is_cancelled() {
                break;
            }
        }

        // Let the remaining processes observe cancellation and wind down
        while let Some(joined) = join_set.join_next().await {
            if let Ok((name, Err(err))) = joined {
                warn!(process = %name, error = %format!("{:#}", err), "app process failed during shutdown");
            }
        }

        for task in signal_tasks {
            task.abort();
        }

        run_closers(self.closers, self.closer_timeout).await;

        match first_error {
            Some(err) => {
                error!(error = %format!("{:#}", err), "runner exiting with error");
                Err(err)
            }
            None => {
                info!("runner exiting normally");
                Ok(())
            }
        }
    }
}

fn spawn_signal_handlers(token: CancellationToken) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();

    let ctrl_c_token = token.clone();
    tasks.push(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(err) => error!(error = %err, "failed to listen for shutdown signal"),
        }
    }));

    #[cfg(unix)]
    tasks.push(tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM");
                token.cancel();
            }
            Err(err) => error!(error = %err, "failed to install SIGTERM handler"),
        }
    }));

    tasks
}

async fn run_closers(closers: Vec<Closer>, timeout: Duration) {
    if closers.is_empty() {
        return;
    }

    info!(timeout = ?timeout, "running closers");

    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }

    let drained = tokio::time::timeout(timeout, async {
        while let Some(joined) = closer_set.join_next().await {
            match joined {
                Ok(Ok(())) => debug!("closer completed"),
                Ok(Err(err)) => error!(error = %format!("{:#}", err), "closer failed"),
                Err(err) => error!(error = %err, "closer panicked"),
            }
        }
    })
    .await;

    match drained {
        Ok(()) => info!("all closers completed"),
        Err(_) => error!(timeout = ?timeout, "closers timed out"),
    }
}
