//! Conversions between raw Qdrant payloads and pipeline response types.

use super::types::{DocumentSummary, PageField, PageView, SearchMatch};
use crate::qdrant::{ScoredPoint, VectorPath};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Map one scored point into a search hit at the given 1-based rank.
pub(crate) fn scored_point_to_match(
    rank: usize,
    point: ScoredPoint,
    path: VectorPath,
) -> SearchMatch {
    let payload = point.payload.unwrap_or_default();
    SearchMatch {
        rank,
        score: point.score,
        filename: payload_str(&payload, "filename"),
        page_number: payload_u32(&payload, "page_number"),
        summary: payload_str(&payload, "summary"),
        content: payload_str(&payload, "content"),
        retrieval_path: path,
    }
}

/// Project the requested fields out of a stored page payload.
///
/// Fields absent from the payload are omitted from the view rather than
/// emitted as nulls.
pub(crate) fn project_page(payload: &Map<String, Value>, fields: &[PageField]) -> PageView {
    let mut view = Map::new();
    for field in fields {
        let key = field.payload_key();
        if let Some(value) = payload.get(key) {
            view.insert(key.to_string(), value.clone());
        }
    }
    view
}

/// Group per-page rows into one metadata entry per filename.
///
/// Rows are expected to carry `filename`, `owner`, and `is_public`; the
/// first row seen for a filename supplies the handle metadata and later
/// rows only bump the page count. Output is sorted by filename.
pub(crate) fn collect_documents(points: Vec<(u64, Map<String, Value>)>) -> Vec<DocumentSummary> {
    let mut grouped: BTreeMap<String, DocumentSummary> = BTreeMap::new();

    for (id, payload) in points {
        let filename = payload_str(&payload, "filename");
        if filename.is_empty() {
            continue;
        }

        grouped
            .entry(filename.clone())
            .and_modify(|entry| entry.page_count += 1)
            .or_insert_with(|| DocumentSummary {
                filename,
                owner: payload_str(&payload, "owner"),
                is_public: payload
                    .get("is_public")
                    .and_then(Value::as_u64)
                    .unwrap_or(0)
                    == 1,
                point_id: id,
                page_count: 1,
            });
    }

    grouped.into_values().collect()
}

fn payload_str(payload: &Map<String, Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn payload_u32(payload: &Map<String, Value>, key: &str) -> u32 {
    payload
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or_default()
}
