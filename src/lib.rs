#![deny(missing_docs)]

//! Core library for the pdfkb knowledge base.
//!
//! Ingests PDF documents page by page, summarizes and embeds each page
//! along two independent vector paths, persists the result in Qdrant
//! with ownership and visibility metadata, and serves semantic
//! retrieval over the stored pages.

/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and HTTP adapter.
pub mod embedding;
/// Chat-completion client, page summarization, and image description.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// PDF parsing into per-page paragraph lists.
pub mod parser;
/// Ingestion orchestration, progress tracking, and retrieval engine.
pub mod pipeline;
/// Qdrant vector store integration.
pub mod qdrant;
