//! Start/stop toggle for the background run
//!
//! Owns the only handle to the active run; there are no module-level
//! globals. At most one run is active at a time, and a start request while
//! a run is active is a stop request.

use std::future::Future;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of a toggle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started,
    Stopped,
}

impl ToggleOutcome {
    /// Wire value for the control endpoint response.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleOutcome::Started => "started",
            ToggleOutcome::Stopped => "stopped",
        }
    }
}

struct ActiveRun {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Controller for the single background import run.
#[derive(Default)]
pub struct RunController {
    active: Mutex<Option<ActiveRun>>,
}

impl RunController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the run.
    ///
    /// Idle (or previous run finished): spawn `start` with a fresh
    /// cancellation token and report `Started`. Active: cancel the token
    /// and wait for the task to exit before reporting `Stopped` - the
    /// caller blocks until the loop has observed the stop.
    pub async fn toggle<F, Fut>(&self, start: F) -> ToggleOutcome
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut active = self.active.lock().await;

        match active.take() {
            Some(run) if !run.task.is_finished() => {
                info!("stop requested, waiting for run to exit");
                run.cancel.cancel();
                if let Err(e) = run.task.await {
                    warn!(error = %e, "import task ended abnormally");
                }
                ToggleOutcome::Stopped
            },
            _ => {
                let cancel = CancellationToken::new();
                let task = tokio::spawn(start(cancel.clone()));
                *active = Some(ActiveRun { cancel, task });
                info!("import run started");
                ToggleOutcome::Started
            },
        }
    }

    /// True while a run is active.
    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|run| !run.task.is_finished())
    }
}
