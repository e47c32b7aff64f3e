//! Background execution and polling for ingestion runs.
//!
//! Ingestion is spawned onto the runtime and observed by polling its
//! progress tracker. The poller can give up after a timeout, but the
//! background task itself is never aborted; it keeps running to
//! completion and its progress stays observable.

use super::progress::{ProgressSnapshot, ProgressTracker, Stage};
use super::service::VectorizerService;
use super::types::{IngestError, IngestRequest, IngestionOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Interval between progress polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// How long the poller waits before giving up on a run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Handle to one spawned ingestion run.
pub struct IngestionHandle {
    progress: ProgressTracker,
    task: JoinHandle<Result<IngestionOutcome, IngestError>>,
}

impl IngestionHandle {
    /// Tracker observing this run. Cloneable and safe to poll from
    /// anywhere.
    pub fn progress(&self) -> ProgressTracker {
        self.progress.clone()
    }

    /// Whether the background task has exited, successfully or not.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task and return its result. A panicked or cancelled
    /// task surfaces as [`IngestError::Background`].
    pub async fn join(self) -> Result<IngestionOutcome, IngestError> {
        match self.task.await {
            Ok(result) => result,
            Err(error) => Err(IngestError::Background(error.to_string())),
        }
    }
}

/// Spawn an ingestion run with a fresh progress tracker.
///
/// Every run gets its own tracker; trackers are never reused across
/// requests, so concurrent ingestions cannot observe each other's state.
pub fn spawn_ingestion(
    service: Arc<VectorizerService>,
    request: IngestRequest,
) -> IngestionHandle {
    let progress = ProgressTracker::new();
    let task_progress = progress.clone();

    let task = tokio::spawn(async move { service.ingest(&request, &task_progress).await });

    IngestionHandle { progress, task }
}

/// Poll a run until it reaches a terminal stage, invoking `on_event` for
/// every observable transition (stage, page, or step change).
///
/// Two failure shapes are synthesized without the pipeline's involvement:
/// a task that exits without ever reaching a terminal stage is marked as
/// an error on its tracker, and a run still going after `timeout` yields
/// a timeout snapshot while the task keeps running in the background.
pub async fn await_completion(
    handle: &IngestionHandle,
    poll_interval: Duration,
    timeout: Duration,
    mut on_event: impl FnMut(&ProgressSnapshot),
) -> ProgressSnapshot {
    let deadline = Instant::now() + timeout;
    let mut last_observed: Option<(Stage, u32, String)> = None;

    loop {
        let snapshot = handle.progress.get();
        let observed = (
            snapshot.stage,
            snapshot.current_page,
            snapshot.current_step.clone(),
        );
        if last_observed.as_ref() != Some(&observed) {
            on_event(&snapshot);
            last_observed = Some(observed);
        }

        if snapshot.is_terminal() {
            return snapshot;
        }

        if handle.task.is_finished() {
            // The task may have set a terminal stage between our read and
            // the finished check; re-read before declaring a silent death.
            let latest = handle.progress.get();
            if latest.is_terminal() {
                on_event(&latest);
                return latest;
            }

            tracing::error!("Ingestion task exited without reporting completion");
            handle
                .progress
                .set_error("ingestion task exited without reporting completion");
            let synthesized = handle.progress.get();
            on_event(&synthesized);
            return synthesized;
        }

        if Instant::now() >= deadline {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Ingestion still running after timeout; detaching from run"
            );
            // The task owns its tracker; synthesize a local snapshot
            // instead of mutating shared state under an active writer.
            let mut timed_out = snapshot;
            timed_out.stage = Stage::Error;
            timed_out.error = Some(format!(
                "ingestion did not complete within {} seconds",
                timeout.as_secs()
            ));
            on_event(&timed_out);
            return timed_out;
        }

        tokio::time::sleep(poll_interval).await;
    }
}
