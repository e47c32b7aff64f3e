//! Request, response, and error types for the ingestion and retrieval pipeline.

use crate::embedding::EmbeddingClientError;
use crate::parser::ParseError;
use crate::qdrant::{QdrantError, VectorPath};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The document could not be parsed into pages.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// An embedding could not be produced for a page.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// The vector store rejected a request.
    #[error(transparent)]
    Store(#[from] QdrantError),
    /// The background ingestion task died without reporting a result.
    #[error("Ingestion task failed: {0}")]
    Background(String),
}

/// Errors raised by read-side operations.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The query text could not be embedded.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// The vector store rejected a request.
    #[error(transparent)]
    Store(#[from] QdrantError),
}

/// A search mode string was not recognized.
#[derive(Debug, Error)]
#[error("Unknown search mode: {0:?} (expected dual, summary, or content)")]
pub struct InvalidModeError(pub String);

/// Which retrieval paths a search runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Query both vector spaces and return both rankings.
    #[default]
    Dual,
    /// Query only summary embeddings.
    Summary,
    /// Query only content embeddings.
    Content,
}

impl SearchMode {
    /// Whether this mode queries the summary vector space.
    pub fn includes_summary(self) -> bool {
        matches!(self, Self::Dual | Self::Summary)
    }

    /// Whether this mode queries the content vector space.
    pub fn includes_content(self) -> bool {
        matches!(self, Self::Dual | Self::Content)
    }
}

impl FromStr for SearchMode {
    type Err = InvalidModeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "dual" => Ok(Self::Dual),
            "summary" => Ok(Self::Summary),
            "content" => Ok(Self::Content),
            _ => Err(InvalidModeError(input.to_string())),
        }
    }
}

/// A page field name was not recognized.
#[derive(Debug, Error)]
#[error("Unknown page field: {0:?}")]
pub struct InvalidFieldError(pub String);

/// Payload fields that can be projected out of a stored page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageField {
    /// Document filename.
    Filename,
    /// 1-based page number.
    PageNumber,
    /// LLM-generated page digest.
    Summary,
    /// Full page text.
    Content,
    /// Ingesting owner.
    Owner,
    /// 0/1 visibility flag.
    IsPublic,
}

impl PageField {
    /// Every projectable field, the default projection.
    pub const ALL: &'static [PageField] = &[
        PageField::Filename,
        PageField::PageNumber,
        PageField::Summary,
        PageField::Content,
        PageField::Owner,
        PageField::IsPublic,
    ];

    /// Key under which the field is stored in the point payload.
    pub fn payload_key(self) -> &'static str {
        match self {
            Self::Filename => "filename",
            Self::PageNumber => "page_number",
            Self::Summary => "summary",
            Self::Content => "content",
            Self::Owner => "owner",
            Self::IsPublic => "is_public",
        }
    }
}

impl FromStr for PageField {
    type Err = InvalidFieldError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "filename" => Ok(Self::Filename),
            "page_number" => Ok(Self::PageNumber),
            "summary" => Ok(Self::Summary),
            "content" => Ok(Self::Content),
            "owner" => Ok(Self::Owner),
            "is_public" => Ok(Self::IsPublic),
            _ => Err(InvalidFieldError(input.to_string())),
        }
    }
}

/// One document ingestion request.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Path of the PDF file on disk.
    pub path: PathBuf,
    /// Identity the stored pages belong to.
    pub owner: String,
    /// Whether the pages are readable by other owners.
    pub is_public: bool,
    /// Stored filename; defaults to the path's file name when `None`.
    pub display_name: Option<String>,
}

/// Result of a completed ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionOutcome {
    /// Filename the pages were stored under.
    pub filename: String,
    /// Owner of the stored pages.
    pub owner: String,
    /// Page count of the source PDF, including empty pages.
    pub total_pages: u32,
    /// Number of non-empty pages actually stored.
    pub processed_pages: usize,
    /// Collection the pages were written to.
    pub collection: String,
}

/// One semantic search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Natural-language query text.
    pub query: String,
    /// Maximum hits per retrieval path.
    pub limit: usize,
    /// Which retrieval paths to run.
    pub mode: SearchMode,
    /// Requesting identity; scopes visibility when present.
    pub owner: Option<String>,
}

/// One search hit from a single retrieval path.
#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    /// 1-based rank within its retrieval path.
    pub rank: usize,
    /// Similarity score reported by the vector store.
    pub score: f32,
    /// Filename of the matched page's document.
    pub filename: String,
    /// 1-based page number of the match.
    pub page_number: u32,
    /// Stored page digest.
    pub summary: String,
    /// Stored page text.
    pub content: String,
    /// Which vector space produced this hit.
    pub retrieval_path: VectorPath,
}

/// Search results, one independent ranking per queried path.
///
/// The two rankings are never merged; a `None` ranking means the mode did
/// not query that path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    /// Hits from the summary vector space, when queried.
    pub summary_results: Option<Vec<SearchMatch>>,
    /// Hits from the content vector space, when queried.
    pub content_results: Option<Vec<SearchMatch>>,
}

/// Projected page payload returned by page fetches; carries only the
/// requested fields.
pub type PageView = Map<String, Value>;

/// Outcome of a visibility update, reported as data instead of an error.
#[derive(Debug, Clone, Serialize)]
pub struct VisibilityUpdate {
    /// Whether any points were updated.
    pub success: bool,
    /// Number of points whose payload was patched.
    pub updated_count: usize,
    /// Document filename the update targeted.
    pub filename: String,
    /// Owner the update was scoped to.
    pub owner: String,
    /// Visibility value that was applied.
    pub is_public: bool,
    /// True when no matching document exists.
    pub not_found: bool,
}

/// Metadata-only description of one stored document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    /// Document filename.
    pub filename: String,
    /// Owner of the document's pages.
    pub owner: String,
    /// Visibility of the document's first seen page.
    pub is_public: bool,
    /// Point id of the first seen page, usable as a stable handle.
    pub point_id: u64,
    /// Number of stored pages for the document.
    pub page_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_modes_parse_case_insensitively() {
        assert_eq!("dual".parse::<SearchMode>().unwrap(), SearchMode::Dual);
        assert_eq!("Summary".parse::<SearchMode>().unwrap(), SearchMode::Summary);
        assert_eq!(" CONTENT ".parse::<SearchMode>().unwrap(), SearchMode::Content);
        assert!("hybrid".parse::<SearchMode>().is_err());
    }

    #[test]
    fn mode_selects_paths() {
        assert!(SearchMode::Dual.includes_summary());
        assert!(SearchMode::Dual.includes_content());
        assert!(SearchMode::Summary.includes_summary());
        assert!(!SearchMode::Summary.includes_content());
        assert!(!SearchMode::Content.includes_summary());
        assert!(SearchMode::Content.includes_content());
    }

    #[test]
    fn page_fields_round_trip_payload_keys() {
        for field in PageField::ALL {
            assert_eq!(
                field.payload_key().parse::<PageField>().unwrap(),
                *field
            );
        }
        assert!("body".parse::<PageField>().is_err());
    }

    #[test]
    fn invalid_inputs_name_the_offender() {
        let mode_error = "fuzzy".parse::<SearchMode>().unwrap_err();
        assert!(mode_error.to_string().contains("fuzzy"));

        let field_error = "pagenum".parse::<PageField>().unwrap_err();
        assert!(field_error.to_string().contains("pagenum"));
    }
}
