//! Reading and extending the response thread embedded in a task's metadata blob.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResponse {
    pub id: String,
    pub text: String,
    pub created_at: String,
    pub created_by: String,
    pub attachments: Vec<Attachment>,
}

/// First string value found under any of `keys`.
fn first_str<'a>(entry: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| entry.get(*key))
        .find_map(|value| value.as_str().filter(|s| !s.is_empty()))
}

/// Normalizes a list of attachment objects. Non-object entries are skipped.
pub fn parse_attachments(value: Option<&Value>) -> Vec<Attachment> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .map(|entry| Attachment {
            name: first_str(entry, &["name"]).unwrap_or_default().to_string(),
            url: first_str(entry, &["url"]).unwrap_or_default().to_string(),
            uploaded_at: first_str(entry, &["uploaded_at", "uploadedAt", "created_at", "createdAt"])
                .map(str::to_string),
            size: entry.get("size").and_then(Value::as_u64),
            content_type: first_str(entry, &["type", "mimeType", "mime_type"]).map(str::to_string),
        })
        .collect()
}

/// Extracts `metadata.responses`, filling missing fields with defaults.
/// Responses without a timestamp inherit `fallback_created_at`.
pub fn parse_responses(metadata: &Value, fallback_created_at: &str) -> Vec<TaskResponse> {
    let Some(Value::Array(entries)) = metadata.get("responses") else {
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let empty = Map::new();
            let entry = entry.as_object().unwrap_or(&empty);
            TaskResponse {
                id: match entry.get("id") {
                    Some(Value::String(id)) if !id.is_empty() => id.clone(),
                    Some(Value::Number(id)) => id.to_string(),
                    _ => format!("response-{index}"),
                },
                text: first_str(entry, &["text", "response"])
                    .unwrap_or_default()
                    .to_string(),
                created_at: first_str(entry, &["created_at", "createdAt"])
                    .unwrap_or(fallback_created_at)
                    .to_string(),
                created_by: first_str(entry, &["created_by", "createdBy"])
                    .unwrap_or_default()
                    .to_string(),
                attachments: parse_attachments(entry.get("attachments")),
            }
        })
        .collect()
}

/// Task-level attachments recorded under `metadata.attachments`.
pub fn metadata_attachments(metadata: &Value) -> Vec<Attachment> {
    parse_attachments(metadata.get("attachments"))
}

/// Returns `metadata` with `response` appended to its `responses` array.
/// Other keys are preserved; a non-object blob is replaced by a fresh object.
pub fn append_response(metadata: Value, response: &TaskResponse) -> Value {
    let mut object = match metadata {
        Value::Object(object) => object,
        _ => Map::new(),
    };

    let entry = serde_json::to_value(response).unwrap_or(Value::Null);
    match object.get_mut("responses") {
        Some(Value::Array(responses)) => responses.push(entry),
        _ => {
            object.insert("responses".to_string(), Value::Array(vec![entry]));
        }
    }

    Value::Object(object)
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
