//! Streaming helper for iterating Qdrant scroll endpoints without manual loops.

use async_stream::try_stream;
use futures_core::Stream;
use reqwest::Method;
use serde_json::{Map, Value, json};

use super::client::{QdrantService, format_endpoint};
use super::types::{QdrantError, ScrollResponse, point_id_as_u64};

const DEFAULT_SCROLL_LIMIT: usize = 512;

/// Stream point ids and payloads for a collection using the scroll API.
pub fn stream_points<'a>(
    service: &'a QdrantService,
    collection: &'a str,
    with_payload: Value,
    filter: Option<Value>,
) -> impl Stream<Item = Result<(u64, Map<String, Value>), QdrantError>> + 'a {
    try_stream! {
        let mut offset: Option<Value> = None;
        let payload_template = with_payload;
        let filter_body = filter.unwrap_or_else(|| json!({ "must": [] }));

        loop {
            let mut body = json!({
                "with_payload": payload_template.clone(),
                "with_vector": false,
                "limit": DEFAULT_SCROLL_LIMIT,
                "filter": filter_body.clone(),
            });

            if let Some(cursor) = &offset {
                body.as_object_mut()
                    .expect("scroll body is object")
                    .insert("offset".into(), cursor.clone());
            }

            let mut request = service.client.request(
                Method::POST,
                format_endpoint(&service.base_url, &format!("collections/{collection}/points/scroll")),
            );

            if let Some(api_key) = &service.api_key && !api_key.is_empty() {
                request = request.header("api-key", api_key);
            }

            let response = request.json(&body).send().await?;

            let status = response.status();
            if status.is_success() {
                let ScrollResponse { result } = response.json().await?;
                for point in result.points {
                    if let Some(id) = point.id.as_ref().and_then(point_id_as_u64) {
                        yield (id, point.payload.unwrap_or_default());
                    }
                }

                match result.next_page_offset {
                    Some(next) if !next.is_null() => offset = Some(next),
                    _ => break,
                }
            } else {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(collection = collection, status = %status, "Failed to scroll points via stream");
                Err(QdrantError::UnexpectedStatus { status, body })?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{pin_mut, stream::StreamExt};
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn stream_points_collects_multiple_pages() {
        let server = MockServer::start_async().await;
        let service = QdrantService {
            client: reqwest::Client::builder()
                .user_agent("pdfkb-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
        };

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
                        "points": [
                            { "id": 1, "payload": { "filename": "a.pdf" } }
                        ],
                        "next_page_offset": 2
                    }
                }));
            })
            .await;

        let second = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/kb/points/scroll")
                    .body_contains("\"offset\":2");
                then.status(200).json_body(json!({
                    "result": {
                        "points": [
                            { "id": 2, "payload": { "filename": "b.pdf" } }
                        ],
                        "next_page_offset": null
                    }
                }));
            })
            .await;

        let stream = stream_points(&service, "kb", json!(["filename"]), None);
        pin_mut!(stream);
        let mut items = Vec::new();
        while let Some(item) = stream.next().await {
            items.push(item.expect("entry"));
        }

        first.assert();
        second.assert();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, 1);
        assert_eq!(items[1].0, 2);
        assert_eq!(
            items[1].1.get("filename").and_then(Value::as_str),
            Some("b.pdf")
        );
    }

    #[tokio::test]
    async fn stream_points_surfaces_http_errors() {
        let server = MockServer::start_async().await;
        let service = QdrantService {
            client: reqwest::Client::builder()
                .user_agent("pdfkb-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
        };

        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/kb/points/scroll");
                then.status(500).body("scroll failed");
            })
            .await;

        let stream = stream_points(&service, "kb", Value::Bool(true), None);
        pin_mut!(stream);
        let first = stream.next().await.expect("one item");
        assert!(matches!(
            first,
            Err(QdrantError::UnexpectedStatus { status, .. }) if status.as_u16() == 500
        ));
    }
}
