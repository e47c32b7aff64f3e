//! Qdrant vector store integration.

pub mod client;
pub mod filters;
/// Streaming helpers for Qdrant scroll pagination.
pub mod scroller;
pub mod types;

pub use client::QdrantService;
pub use filters::{document_filter, page_filter, visibility_filter};
pub use scroller::stream_points;
pub use types::{
    PagePayload, PagePoint, QdrantError, ScoredPoint, VectorPath, visibility_flag,
};
