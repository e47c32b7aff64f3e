//! Filter builders for Qdrant queries over page payloads.

use serde_json::{Value, json};

/// Exact-match filter selecting every page of one `(filename, owner)` document.
pub fn document_filter(filename: &str, owner: &str) -> Value {
    json!({
        "must": [
            {
                "key": "filename",
                "match": { "value": filename }
            },
            {
                "key": "owner",
                "match": { "value": owner }
            }
        ]
    })
}

/// Exact-match filter for a single page, optionally scoped to an owner.
pub fn page_filter(filename: &str, page_number: u32, owner: Option<&str>) -> Value {
    let mut must = vec![
        json!({
            "key": "filename",
            "match": { "value": filename }
        }),
        json!({
            "key": "page_number",
            "match": { "value": page_number }
        }),
    ];

    if let Some(owner) = owner.and_then(non_empty) {
        must.push(json!({
            "key": "owner",
            "match": { "value": owner }
        }));
    }

    json!({ "must": must })
}

/// Visibility filter: a candidate point must either belong to the given
/// owner or be public. `None` when no owner is supplied, meaning no
/// visibility restriction applies.
pub fn visibility_filter(owner: Option<&str>) -> Option<Value> {
    let owner = owner.and_then(non_empty)?;
    Some(json!({
        "should": [
            {
                "key": "owner",
                "match": { "value": owner }
            },
            {
                "key": "is_public",
                "match": { "value": 1 }
            }
        ]
    }))
}

fn non_empty(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}
