//! Shared types used by the Qdrant client and helpers.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// The two independent vector spaces each page is indexed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorPath {
    /// Embedding of the page's LLM-generated summary.
    Summary,
    /// Embedding of the page's full content.
    Content,
}

impl VectorPath {
    /// Named vector identifier used in the collection schema.
    pub fn vector_name(self) -> &'static str {
        match self {
            Self::Summary => "summary_vector",
            Self::Content => "content_vector",
        }
    }

    /// Short label reported back on search hits.
    pub fn label(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Content => "content",
        }
    }
}

/// Payload stored alongside each page point.
#[derive(Debug, Clone)]
pub struct PagePayload {
    /// Identity of the user who ingested the document.
    pub owner: String,
    /// Display filename the page belongs to.
    pub filename: String,
    /// 1-based page number within the document.
    pub page_number: u32,
    /// LLM-generated digest of the page content.
    pub summary: String,
    /// Concatenated paragraph text of the page.
    pub content: String,
    /// Whether the page is readable by other owners.
    pub is_public: bool,
}

impl PagePayload {
    /// Serialize the payload into the JSON object stored on the point.
    /// Visibility is persisted as a 0/1 integer flag.
    pub fn to_value(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("owner".into(), Value::String(self.owner.clone()));
        payload.insert("filename".into(), Value::String(self.filename.clone()));
        payload.insert("page_number".into(), Value::from(self.page_number));
        payload.insert("summary".into(), Value::String(self.summary.clone()));
        payload.insert("content".into(), Value::String(self.content.clone()));
        payload.insert("is_public".into(), Value::from(visibility_flag(self.is_public)));
        Value::Object(payload)
    }
}

/// Encode a visibility boolean as the stored 0/1 flag.
pub fn visibility_flag(is_public: bool) -> u8 {
    if is_public { 1 } else { 0 }
}

/// Prepared point carrying both named vectors and the page payload.
#[derive(Debug, Clone)]
pub struct PagePoint {
    /// Integer point id allocated by the orchestrator.
    pub id: u64,
    /// Embedding of the page summary.
    pub summary_vector: Vec<f32>,
    /// Embedding of the page content.
    pub content_vector: Vec<f32>,
    /// Page payload stored on the point.
    pub payload: PagePayload,
}

/// Scored payload returned by Qdrant similarity queries.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    /// Integer identifier assigned to the point.
    pub id: u64,
    /// Similarity score computed by Qdrant.
    pub score: f32,
    /// Payload associated with the point, without vectors.
    pub payload: Option<Map<String, Value>>,
}

/// Convert a raw Qdrant point id into the integer ids this crate allocates.
pub(crate) fn point_id_as_u64(id: &Value) -> Option<u64> {
    match id {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub(crate) struct ScrollResponse {
    pub(crate) result: ScrollResult,
}

#[derive(Deserialize)]
pub(crate) struct ScrollResult {
    #[serde(default)]
    pub(crate) points: Vec<ScrollPoint>,
    #[serde(default)]
    pub(crate) next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
pub(crate) struct ScrollPoint {
    #[serde(default)]
    pub(crate) id: Option<Value>,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_paths_name_their_spaces() {
        assert_eq!(VectorPath::Summary.vector_name(), "summary_vector");
        assert_eq!(VectorPath::Content.vector_name(), "content_vector");
        assert_eq!(VectorPath::Summary.label(), "summary");
        assert_eq!(VectorPath::Content.label(), "content");
    }

    #[test]
    fn payload_serializes_visibility_as_integer() {
        let payload = PagePayload {
            owner: "alice".into(),
            filename: "doc.pdf".into(),
            page_number: 3,
            summary: "digest".into(),
            content: "body".into(),
            is_public: true,
        };
        let value = payload.to_value();
        assert_eq!(value["owner"], "alice");
        assert_eq!(value["page_number"], 3);
        assert_eq!(value["is_public"], 1);

        let private = PagePayload {
            is_public: false,
            ..payload
        };
        assert_eq!(private.to_value()["is_public"], 0);
    }

    #[test]
    fn point_ids_parse_from_numbers_and_strings() {
        assert_eq!(point_id_as_u64(&Value::from(7u64)), Some(7));
        assert_eq!(point_id_as_u64(&Value::String("12".into())), Some(12));
        assert_eq!(point_id_as_u64(&Value::Null), None);
    }
}
