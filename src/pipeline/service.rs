//! Ingestion and retrieval orchestration over the parser, LLM clients,
//! and the vector store.

use super::mappers::{collect_documents, project_page, scored_point_to_match};
use super::progress::{ProgressTracker, Stage};
use super::types::{
    DocumentSummary, IngestError, IngestRequest, IngestionOutcome, PageField, PageView,
    RetrievalError, SearchMatch, SearchRequest, SearchResults, VisibilityUpdate,
};
use crate::config::get_config;
use crate::embedding::{EmbeddingClient, HttpEmbeddingClient};
use crate::llm::{OpenAiChatClient, Summarizer};
use crate::metrics::{IngestMetrics, MetricsSnapshot};
use crate::parser::{PdfParser, VisionConfig};
use crate::qdrant::{
    PagePayload, PagePoint, QdrantError, QdrantService, VectorPath, document_filter, page_filter,
    stream_points, visibility_filter,
};
use futures_util::{TryStreamExt, pin_mut};
use serde_json::{Value, json};

// Fixed percent allocation across the ingestion stages. Pages share the
// span between PARSE_DONE and PAGES_DONE linearly.
const DEDUP_PERCENT: f32 = 5.0;
const PARSE_START_PERCENT: f32 = 10.0;
const PARSE_DONE_PERCENT: f32 = 15.0;
const PAGES_DONE_PERCENT: f32 = 85.0;
const STORE_PERCENT: f32 = 90.0;

const STEP_DEDUP: &str = "dedup";
const STEP_PARSE: &str = "parse";
const STEP_SUMMARIZING: &str = "summarizing";
const STEP_SUMMARY_EMBEDDING: &str = "summary-embedding";
const STEP_CONTENT_EMBEDDING: &str = "content-embedding";
const STEP_PAGE_DONE: &str = "page-done";
const STEP_STORE: &str = "store";
const STEP_DONE: &str = "done";

/// Orchestrates the full document lifecycle: ingestion, search, page
/// fetch, visibility updates, and document listing.
pub struct VectorizerService {
    parser: PdfParser,
    embedding: Box<dyn EmbeddingClient>,
    summarizer: Summarizer,
    qdrant: QdrantService,
    collection: String,
    analyze_images: bool,
    metrics: IngestMetrics,
}

impl VectorizerService {
    /// Build the service from global configuration and make sure the
    /// dual-vector collection exists.
    pub async fn new() -> Result<Self, QdrantError> {
        let config = get_config();

        let parser = match &config.vision_model {
            Some(model) => PdfParser::with_vision(VisionConfig {
                client: Box::new(OpenAiChatClient::new(
                    config.llm_base_url.clone(),
                    config.llm_api_key.clone(),
                )?),
                model: model.clone(),
            }),
            None => PdfParser::new(),
        };

        let embedding = Box::new(HttpEmbeddingClient::new(
            config.embedding_url.clone(),
            config.embedding_api_key.clone(),
            config.embedding_model.clone(),
            config.embedding_dimension,
        )?);

        let summarizer = Summarizer::new(
            Box::new(OpenAiChatClient::new(
                config.llm_base_url.clone(),
                config.llm_api_key.clone(),
            )?),
            config.llm_model.clone(),
        );

        let qdrant = QdrantService::new()?;
        qdrant
            .create_collection_if_not_exists(
                &config.qdrant_collection_name,
                config.embedding_dimension as u64,
            )
            .await?;

        Ok(Self {
            parser,
            embedding,
            summarizer,
            qdrant,
            collection: config.qdrant_collection_name.clone(),
            analyze_images: config.analyze_images && config.vision_model.is_some(),
            metrics: IngestMetrics::new(),
        })
    }

    /// Assemble a service from explicit parts. Collection bootstrap is the
    /// caller's responsibility.
    pub fn from_parts(
        parser: PdfParser,
        embedding: Box<dyn EmbeddingClient>,
        summarizer: Summarizer,
        qdrant: QdrantService,
        collection: String,
        analyze_images: bool,
    ) -> Self {
        Self {
            parser,
            embedding,
            summarizer,
            qdrant,
            collection,
            analyze_images,
            metrics: IngestMetrics::new(),
        }
    }

    /// Ingest one PDF document, reporting progress through the tracker.
    ///
    /// Existing pages stored under the same `(filename, owner)` pair are
    /// deleted first, so re-ingesting a document fully replaces it. Any
    /// failure is mirrored into the tracker before being returned.
    pub async fn ingest(
        &self,
        request: &IngestRequest,
        progress: &ProgressTracker,
    ) -> Result<IngestionOutcome, IngestError> {
        let result = self.ingest_inner(request, progress).await;
        if let Err(error) = &result {
            progress.set_error(error.to_string());
        }
        result
    }

    async fn ingest_inner(
        &self,
        request: &IngestRequest,
        progress: &ProgressTracker,
    ) -> Result<IngestionOutcome, IngestError> {
        let filename = resolve_filename(request);
        let owner = request.owner.clone();

        tracing::info!(filename = %filename, owner = %owner, "Starting document ingestion");
        progress.update(|state| {
            state.stage = Stage::Init;
            state.message = format!("Ingesting {filename}");
            state.data = json!({ "filename": filename, "owner": owner });
        });

        progress.update(|state| {
            state.current_step = STEP_DEDUP.into();
            state.progress_percent = DEDUP_PERCENT;
        });
        let removed = self.delete_document(&filename, &owner).await?;
        if removed > 0 {
            tracing::info!(filename = %filename, owner = %owner, removed, "Replaced existing document pages");
        }

        progress.update(|state| {
            state.stage = Stage::Parsing;
            state.current_step = STEP_PARSE.into();
            state.message = format!("Parsing {filename}");
            state.progress_percent = PARSE_START_PERCENT;
        });
        let parsed = self
            .parser
            .parse_file(&request.path, self.analyze_images)
            .await?;
        let total_pages = parsed.total_pages;

        progress.update(|state| {
            state.stage = Stage::Processing;
            state.total_pages = total_pages;
            state.progress_percent = PARSE_DONE_PERCENT;
            state.message = format!("Parsed {total_pages} pages");
        });

        let first_id = self
            .qdrant
            .max_point_id(&self.collection)
            .await?
            .map(|max| max + 1)
            .unwrap_or(0);

        let page_span = if total_pages > 0 {
            (PAGES_DONE_PERCENT - PARSE_DONE_PERCENT) / total_pages as f32
        } else {
            0.0
        };

        let mut points = Vec::new();
        for page in &parsed.pages {
            let content = page.paragraphs.join("\n\n");
            if content.trim().is_empty() {
                tracing::debug!(page_number = page.page_number, "Skipping empty page");
                continue;
            }

            let page_start =
                PARSE_DONE_PERCENT + page_span * page.page_number.saturating_sub(1) as f32;
            progress.update(|state| {
                state.current_page = page.page_number;
                state.current_step = STEP_SUMMARIZING.into();
                state.message = format!("Processing page {}/{total_pages}", page.page_number);
                state.progress_percent = page_start;
                state.data = json!({ "page_number": page.page_number });
            });
            let summary = self.summarizer.summarize(&content, page.page_number).await;

            progress.update(|state| {
                state.current_step = STEP_SUMMARY_EMBEDDING.into();
                state.progress_percent = page_start + page_span * 0.3;
            });
            let summary_vector = self.embedding.embed(&summary).await?;

            progress.update(|state| {
                state.current_step = STEP_CONTENT_EMBEDDING.into();
                state.progress_percent = page_start + page_span * 0.6;
            });
            let content_vector = self.embedding.embed(&content).await?;

            progress.update(|state| {
                state.current_step = STEP_PAGE_DONE.into();
                state.progress_percent = page_start + page_span;
                state.data = json!({
                    "page_number": page.page_number,
                    "summary_length": summary.len(),
                    "content_length": content.len(),
                });
            });

            points.push(PagePoint {
                id: first_id + points.len() as u64,
                summary_vector,
                content_vector,
                payload: PagePayload {
                    owner: owner.clone(),
                    filename: filename.clone(),
                    page_number: page.page_number,
                    summary,
                    content,
                    is_public: request.is_public,
                },
            });
        }

        progress.update(|state| {
            state.stage = Stage::Storing;
            state.current_step = STEP_STORE.into();
            state.message = format!("Storing {} page vectors", points.len());
            state.progress_percent = STORE_PERCENT;
            state.data = json!({ "total_vectors": points.len() });
        });
        let stored = self.qdrant.upsert_pages(&self.collection, points).await?;

        let outcome = IngestionOutcome {
            filename,
            owner,
            total_pages,
            processed_pages: stored,
            collection: self.collection.clone(),
        };
        self.metrics.record_document(stored as u64);
        tracing::info!(
            filename = %outcome.filename,
            owner = %outcome.owner,
            total_pages = outcome.total_pages,
            processed_pages = outcome.processed_pages,
            "Document ingestion completed"
        );

        let final_data = serde_json::to_value(&outcome).unwrap_or(Value::Null);
        progress.update(|state| {
            state.stage = Stage::Completed;
            state.current_step = STEP_DONE.into();
            state.message = "Ingestion completed".into();
            state.progress_percent = 100.0;
            state.data = final_data;
        });

        Ok(outcome)
    }

    /// Delete every stored page of one `(filename, owner)` document.
    ///
    /// Returns the number of removed points; a document with no stored
    /// pages is a no-op, which makes delete-before-insert idempotent.
    pub async fn delete_document(
        &self,
        filename: &str,
        owner: &str,
    ) -> Result<usize, QdrantError> {
        let rows = self
            .qdrant
            .scroll_points(
                &self.collection,
                Value::Bool(false),
                Some(document_filter(filename, owner)),
            )
            .await?;

        let ids: Vec<u64> = rows.into_iter().map(|(id, _)| id).collect();
        let count = ids.len();
        self.qdrant.delete_points(&self.collection, ids).await?;

        Ok(count)
    }

    /// Run a semantic search over one or both retrieval paths.
    ///
    /// The query text is embedded once and reused for every queried path;
    /// each path returns its own independent ranking.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResults, RetrievalError> {
        let query_vector = self.embedding.embed(&request.query).await?;
        let filter = visibility_filter(request.owner.as_deref());

        let mut results = SearchResults::default();
        if request.mode.includes_summary() {
            results.summary_results = Some(
                self.search_path(
                    query_vector.clone(),
                    VectorPath::Summary,
                    filter.clone(),
                    request.limit,
                )
                .await?,
            );
        }
        if request.mode.includes_content() {
            results.content_results = Some(
                self.search_path(query_vector, VectorPath::Content, filter, request.limit)
                    .await?,
            );
        }

        Ok(results)
    }

    async fn search_path(
        &self,
        vector: Vec<f32>,
        path: VectorPath,
        filter: Option<Value>,
        limit: usize,
    ) -> Result<Vec<SearchMatch>, RetrievalError> {
        let hits = self
            .qdrant
            .search_points(&self.collection, vector, path, filter, limit)
            .await?;

        tracing::debug!(path = path.label(), hits = hits.len(), "Search path completed");
        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(index, point)| scored_point_to_match(index + 1, point, path))
            .collect())
    }

    /// Fetch specific pages of a document, projected to the given fields.
    ///
    /// Pages are returned in the order requested; page numbers with no
    /// stored point are silently omitted. `None` fields means the full
    /// projection.
    pub async fn get_pages(
        &self,
        filename: &str,
        page_numbers: &[u32],
        fields: Option<&[PageField]>,
        owner: Option<&str>,
    ) -> Result<Vec<PageView>, RetrievalError> {
        let fields = fields.unwrap_or(PageField::ALL);
        let mut views = Vec::with_capacity(page_numbers.len());

        for &page_number in page_numbers {
            let row = self
                .qdrant
                .scroll_first(&self.collection, page_filter(filename, page_number, owner))
                .await?;

            match row {
                Some((_, payload)) => views.push(project_page(&payload, fields)),
                None => {
                    tracing::debug!(filename, page_number, "Requested page not stored");
                }
            }
        }

        Ok(views)
    }

    /// Change the visibility flag on every page of one document.
    ///
    /// A missing document is reported as a structured non-success result
    /// rather than an error. Points are patched one at a time; a storage
    /// failure partway through leaves earlier points already updated.
    pub async fn update_document_visibility(
        &self,
        filename: &str,
        owner: &str,
        is_public: bool,
    ) -> Result<VisibilityUpdate, RetrievalError> {
        let rows = self
            .qdrant
            .scroll_points(
                &self.collection,
                Value::Bool(false),
                Some(document_filter(filename, owner)),
            )
            .await?;

        if rows.is_empty() {
            tracing::warn!(filename, owner, "Visibility update found no matching document");
            return Ok(VisibilityUpdate {
                success: false,
                updated_count: 0,
                filename: filename.to_string(),
                owner: owner.to_string(),
                is_public,
                not_found: true,
            });
        }

        let flag = crate::qdrant::visibility_flag(is_public);
        let mut updated = 0;
        for (point_id, _) in rows {
            self.qdrant
                .set_payload(&self.collection, point_id, json!({ "is_public": flag }))
                .await?;
            updated += 1;
        }

        tracing::info!(filename, owner, is_public, updated, "Document visibility updated");
        Ok(VisibilityUpdate {
            success: true,
            updated_count: updated,
            filename: filename.to_string(),
            owner: owner.to_string(),
            is_public,
            not_found: false,
        })
    }

    /// List documents visible to an owner, one metadata entry per
    /// filename, sorted by filename. Page text and summaries are never
    /// fetched.
    pub async fn get_document_list(
        &self,
        owner: &str,
    ) -> Result<Vec<DocumentSummary>, RetrievalError> {
        let Some(filter) = visibility_filter(Some(owner)) else {
            return Ok(Vec::new());
        };

        let stream = stream_points(
            &self.qdrant,
            &self.collection,
            json!(["filename", "owner", "is_public"]),
            Some(filter),
        );
        pin_mut!(stream);
        let rows: Vec<_> = stream.try_collect().await?;

        Ok(collect_documents(rows))
    }

    /// Snapshot of ingestion counters since the service was built.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Stored filename for a request: the explicit display name when given,
/// otherwise the path's final component.
fn resolve_filename(request: &IngestRequest) -> String {
    if let Some(name) = &request.display_name
        && !name.trim().is_empty()
    {
        return name.trim().to_string();
    }

    request
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| request.path.to_string_lossy().into_owned())
}
