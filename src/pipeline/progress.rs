//! Observable progress state for one ingestion request.
//!
//! One tracker is allocated per ingestion call and passed explicitly into
//! the pipeline and the poller; it is never stored on a shared service
//! object. The ingestion task is the single writer; any number of pollers
//! may read snapshots concurrently. The tracker itself performs no I/O.

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};

/// Stages an ingestion run moves through, strictly forward except `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Tracker created, ingestion not yet started.
    Idle,
    /// Resolving the document and deleting stale pages.
    Init,
    /// Parsing the PDF into pages.
    Parsing,
    /// Summarizing and embedding pages.
    Processing,
    /// Upserting the prepared batch into the vector store.
    Storing,
    /// Terminal success.
    Completed,
    /// Terminal failure, reachable from any non-terminal stage.
    Error,
}

/// Immutable progress snapshot handed to observers.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    /// Current stage of the run.
    pub stage: Stage,
    /// Page count reported by the parser; 0 until parsing finishes.
    pub total_pages: u32,
    /// Page currently being processed, 1-based.
    pub current_page: u32,
    /// Overall completion in percent, non-decreasing within a run.
    pub progress_percent: f32,
    /// Human-readable status line.
    pub message: String,
    /// Fine-grained sub-stage label.
    pub current_step: String,
    /// Failure message once `stage` is `Error`.
    pub error: Option<String>,
    /// Stage-specific payload, e.g. per-page byte counts or the final result.
    pub data: Value,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            stage: Stage::Idle,
            total_pages: 0,
            current_page: 0,
            progress_percent: 0.0,
            message: String::new(),
            current_step: String::new(),
            error: None,
            data: Value::Object(Map::new()),
        }
    }
}

impl ProgressSnapshot {
    /// Whether the run reached a terminal stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self.stage, Stage::Completed | Stage::Error)
    }
}

/// Shared handle to the mutable progress state of one ingestion run.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<RwLock<ProgressSnapshot>>,
}

impl ProgressTracker {
    /// Create a fresh tracker in the `idle` stage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an immutable snapshot of the current state.
    pub fn get(&self) -> ProgressSnapshot {
        self.inner.read().expect("progress lock poisoned").clone()
    }

    /// Apply a mutation to the state.
    ///
    /// `progress_percent` is clamped so it never decreases; the fixed
    /// stage allocation already produces monotone values, this codifies
    /// the invariant for observers.
    pub fn update(&self, apply: impl FnOnce(&mut ProgressSnapshot)) {
        let mut state = self.inner.write().expect("progress lock poisoned");
        let floor = state.progress_percent;
        apply(&mut state);
        if state.progress_percent < floor {
            state.progress_percent = floor;
        }
    }

    /// Move to the terminal `error` stage, preserving the message for callers.
    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|state| {
            state.stage = Stage::Error;
            state.error = Some(message.clone());
            state.message = message.clone();
        });
    }

    /// Whether the run completed successfully.
    pub fn is_completed(&self) -> bool {
        self.inner.read().expect("progress lock poisoned").stage == Stage::Completed
    }

    /// Whether the run failed.
    pub fn is_error(&self) -> bool {
        self.inner.read().expect("progress lock poisoned").stage == Stage::Error
    }

    /// Whether the run is in a non-terminal working stage.
    pub fn is_processing(&self) -> bool {
        matches!(
            self.inner.read().expect("progress lock poisoned").stage,
            Stage::Init | Stage::Parsing | Stage::Processing | Stage::Storing
        )
    }
}
