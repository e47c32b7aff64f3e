//! HTTP client wrapper for interacting with Qdrant.

use crate::config::get_config;
use crate::qdrant::types::{
    PagePoint, QdrantError, QueryResponse, QueryResponseResult, ScoredPoint, ScrollResponse,
    VectorPath, point_id_as_u64,
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value, json};

const SCROLL_PAGE_LIMIT: usize = 512;

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, QdrantError> {
        let config = get_config();
        Self::with_endpoint(&config.qdrant_url, config.qdrant_api_key.clone())
    }

    /// Construct a client against an explicit Qdrant endpoint.
    pub fn with_endpoint(url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("pdfkb/0.1").build()?;
        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %api_key.as_deref().map(|value| !value.is_empty()).unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Create the knowledge-base collection when it is missing from Qdrant.
    ///
    /// The collection carries two independently addressable named vector
    /// spaces of equal dimension; an existing collection is reused as-is.
    pub async fn create_collection_if_not_exists(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        if self.collection_exists(collection_name).await? {
            tracing::debug!(collection = collection_name, "Collection already exists");
            return Ok(());
        }

        let body = json!({
            "vectors": {
                VectorPath::Summary.vector_name(): {
                    "size": vector_size,
                    "distance": "Cosine"
                },
                VectorPath::Content.vector_name(): {
                    "size": vector_size,
                    "distance": "Cosine"
                }
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))?
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                vector_size,
                "Created collection with dual named vectors"
            );
        })
        .await
    }

    /// Upload prepared page points to the given collection in one batch.
    pub async fn upsert_pages(
        &self,
        collection_name: &str,
        points: Vec<PagePoint>,
    ) -> Result<usize, QdrantError> {
        if points.is_empty() {
            return Ok(0);
        }

        let serialized: Vec<_> = points
            .into_iter()
            .map(|point| {
                json!({
                    "id": point.id,
                    "vector": {
                        VectorPath::Summary.vector_name(): point.summary_vector,
                        VectorPath::Content.vector_name(): point.content_vector,
                    },
                    "payload": point.payload.to_value(),
                })
            })
            .collect();

        let point_count = serialized.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Page points upserted"
            );
        })
        .await?;

        Ok(point_count)
    }

    /// Perform a similarity search against one named vector path.
    pub async fn search_points(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        path: VectorPath,
        filter: Option<Value>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let mut body = json!({
            "query": vector,
            "using": path.vector_name(),
            "limit": limit,
            "with_payload": true,
        });

        if let Some(filter_value) = filter {
            body.as_object_mut()
                .expect("query body should remain an object")
                .insert("filter".into(), filter_value);
        }

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        let results = points
            .into_iter()
            .map(|point| ScoredPoint {
                id: point_id_as_u64(&point.id).unwrap_or_default(),
                score: point.score,
                payload: point.payload,
            })
            .collect();

        Ok(results)
    }

    /// Fetch the first point matching a filter, with its payload.
    pub async fn scroll_first(
        &self,
        collection: &str,
        filter: Value,
    ) -> Result<Option<(u64, Map<String, Value>)>, QdrantError> {
        let body = json!({
            "with_payload": true,
            "with_vector": false,
            "limit": 1,
            "filter": filter,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection}/points/scroll"),
            )?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection, error = %error, "Failed to scroll for point");
            return Err(error);
        }

        let ScrollResponse { result } = response.json().await?;
        Ok(result.points.into_iter().find_map(|point| {
            let id = point.id.as_ref().and_then(point_id_as_u64)?;
            let payload = point.payload?;
            Some((id, payload))
        }))
    }

    /// Collect the ids and payloads of every point matching a filter.
    pub async fn scroll_points(
        &self,
        collection: &str,
        with_payload: Value,
        filter: Option<Value>,
    ) -> Result<Vec<(u64, Map<String, Value>)>, QdrantError> {
        let mut offset: Option<Value> = None;
        let mut results = Vec::new();
        let filter_body = filter.unwrap_or_else(|| json!({ "must": [] }));

        loop {
            let mut body = json!({
                "with_payload": with_payload.clone(),
                "with_vector": false,
                "limit": SCROLL_PAGE_LIMIT,
                "filter": filter_body.clone(),
            });

            if let Some(cursor) = &offset {
                body.as_object_mut()
                    .expect("scroll body is object")
                    .insert("offset".into(), cursor.clone());
            }

            let response = self
                .request(
                    Method::POST,
                    &format!("collections/{collection}/points/scroll"),
                )?
                .json(&body)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection, error = %error, "Failed to scroll points");
                return Err(error);
            }

            let ScrollResponse { result } = response.json().await?;
            for point in result.points {
                if let Some(id) = point.id.as_ref().and_then(point_id_as_u64) {
                    results.push((id, point.payload.unwrap_or_default()));
                }
            }

            match result.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        Ok(results)
    }

    /// Highest point id currently present in the collection, if any.
    ///
    /// The orchestrator allocates new ids strictly above this value so
    /// repeated ingestions into a shared collection never collide.
    pub async fn max_point_id(&self, collection: &str) -> Result<Option<u64>, QdrantError> {
        let points = self.scroll_points(collection, Value::Bool(false), None).await?;
        Ok(points.into_iter().map(|(id, _)| id).max())
    }

    /// Delete the given points from the collection.
    pub async fn delete_points(
        &self,
        collection: &str,
        point_ids: Vec<u64>,
    ) -> Result<(), QdrantError> {
        if point_ids.is_empty() {
            return Ok(());
        }

        let count = point_ids.len();
        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection}/points/delete"),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": point_ids }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection, points = count, "Points deleted");
        })
        .await
    }

    /// Patch a single point's payload without touching its vectors.
    pub async fn set_payload(
        &self,
        collection: &str,
        point_id: u64,
        payload: Value,
    ) -> Result<(), QdrantError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection}/points/payload"),
            )?
            .query(&[("wait", true)])
            .json(&json!({
                "payload": payload,
                "points": [point_id],
            }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection, point_id, "Point payload patched");
        })
        .await
    }

    async fn collection_exists(&self, collection_name: &str) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    pub(crate) fn request(
        &self,
        method: Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder, QdrantError> {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

pub(crate) fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qdrant::filters::visibility_filter;
    use crate::qdrant::types::PagePayload;
    use httpmock::{Method::GET, Method::POST, Method::PUT, MockServer};

    pub(crate) fn test_service(base_url: String) -> QdrantService {
        QdrantService {
            client: Client::builder()
                .user_agent("pdfkb-test")
                .build()
                .expect("client"),
            base_url,
            api_key: None,
        }
    }

    #[tokio::test]
    async fn bootstrap_creates_dual_vector_collection_when_missing() {
        let server = MockServer::start_async().await;
        let service = test_service(server.base_url());

        let exists_check = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/kb");
                then.status(404);
            })
            .await;

        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/kb")
                    .body_contains("summary_vector")
                    .body_contains("content_vector")
                    .body_contains("Cosine");
                then.status(200).json_body(json!({ "result": true }));
            })
            .await;

        service
            .create_collection_if_not_exists("kb", 4)
            .await
            .expect("bootstrap");

        exists_check.assert();
        create.assert();
    }

    #[tokio::test]
    async fn bootstrap_reuses_existing_collection() {
        let server = MockServer::start_async().await;
        let service = test_service(server.base_url());

        let exists_check = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/kb");
                then.status(200).json_body(json!({ "result": {} }));
            })
            .await;

        service
            .create_collection_if_not_exists("kb", 4)
            .await
            .expect("bootstrap");

        exists_check.assert();
    }

    #[tokio::test]
    async fn upsert_emits_integer_ids_and_named_vectors() {
        let server = MockServer::start_async().await;
        let service = test_service(server.base_url());

        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/kb/points")
                    .query_param("wait", "true")
                    .body_contains("\"id\":7")
                    .body_contains("summary_vector")
                    .body_contains("content_vector")
                    .body_contains("\"is_public\":0");
                then.status(200).json_body(json!({ "result": { "status": "acknowledged" } }));
            })
            .await;

        let stored = service
            .upsert_pages(
                "kb",
                vec![PagePoint {
                    id: 7,
                    summary_vector: vec![0.1, 0.2],
                    content_vector: vec![0.3, 0.4],
                    payload: PagePayload {
                        owner: "alice".into(),
                        filename: "doc.pdf".into(),
                        page_number: 1,
                        summary: "digest".into(),
                        content: "body".into(),
                        is_public: false,
                    },
                }],
            )
            .await
            .expect("upsert");

        upsert.assert();
        assert_eq!(stored, 1);
    }

    #[tokio::test]
    async fn search_targets_named_vector_with_filter() {
        let server = MockServer::start_async().await;
        let service = test_service(server.base_url());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/kb/points/query")
                    .body_contains("\"using\":\"summary_vector\"")
                    .body_contains("is_public");
                then.status(200).json_body(json!({
                    "result": {
                        "points": [
                            {
                                "id": 3,
                                "score": 0.91,
                                "payload": {
                                    "filename": "doc.pdf",
                                    "page_number": 2
                                }
                            }
                        ]
                    }
                }));
            })
            .await;

        let results = service
            .search_points(
                "kb",
                vec![0.1, 0.2],
                VectorPath::Summary,
                visibility_filter(Some("alice")),
                5,
            )
            .await
            .expect("search");

        mock.assert();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 3);
        assert!((results[0].score - 0.91).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn max_point_id_spans_scroll_pages() {
        let server = MockServer::start_async().await;
        let service = test_service(server.base_url());

        let first = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/kb/points/scroll")
                    .matches(|req| {
                        !String::from_utf8_lossy(req.body.as_deref().unwrap_or_default())
                            .contains("offset")
                    });
                then.status(200).json_body(json!({
                    "result": {
                        "points": [ { "id": 4 }, { "id": 9 } ],
                        "next_page_offset": 10
                    }
                }));
            })
            .await;

        let second = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/kb/points/scroll")
                    .body_contains("\"offset\":10");
                then.status(200).json_body(json!({
                    "result": {
                        "points": [ { "id": 12 } ],
                        "next_page_offset": null
                    }
                }));
            })
            .await;

        let max = service.max_point_id("kb").await.expect("max id");

        first.assert();
        second.assert();
        assert_eq!(max, Some(12));
    }

    #[tokio::test]
    async fn empty_collection_has_no_max_id() {
        let server = MockServer::start_async().await;
        let service = test_service(server.base_url());

        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/kb/points/scroll");
                then.status(200).json_body(json!({
                    "result": { "points": [], "next_page_offset": null }
                }));
            })
            .await;

        assert_eq!(service.max_point_id("kb").await.expect("max id"), None);
    }

    #[tokio::test]
    async fn delete_points_skips_empty_batches() {
        let server = MockServer::start_async().await;
        let service = test_service(server.base_url());

        // No mock registered: an HTTP call would fail the test.
        service.delete_points("kb", Vec::new()).await.expect("no-op");
    }

    #[tokio::test]
    async fn set_payload_patches_single_point() {
        let server = MockServer::start_async().await;
        let service = test_service(server.base_url());

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/kb/points/payload")
                    .body_contains("\"is_public\":1")
                    .body_contains("\"points\":[5]");
                then.status(200).json_body(json!({ "result": { "status": "acknowledged" } }));
            })
            .await;

        service
            .set_payload("kb", 5, json!({ "is_public": 1 }))
            .await
            .expect("patch");

        mock.assert();
    }
}
