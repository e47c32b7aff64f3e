//! Ingestion orchestration, background execution, and retrieval.

mod mappers;
/// Per-run progress state machine.
pub mod progress;
/// Background spawning and polling of ingestion runs.
pub mod runner;
/// The orchestrating service.
pub mod service;
/// Pipeline request, response, and error types.
pub mod types;

pub use progress::{ProgressSnapshot, ProgressTracker, Stage};
pub use runner::{
    DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, IngestionHandle, await_completion, spawn_ingestion,
};
pub use service::VectorizerService;
pub use types::{
    DocumentSummary, IngestError, IngestRequest, IngestionOutcome, InvalidFieldError,
    InvalidModeError, PageField, PageView, RetrievalError, SearchMatch, SearchMode, SearchRequest,
    SearchResults, VisibilityUpdate,
};
