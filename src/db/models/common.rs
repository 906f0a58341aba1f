//! Common types and utilities shared across models.

use chrono::{SecondsFormat, Utc};

/// Current time as a fixed-width RFC 3339 string.
///
/// Fixed microsecond precision keeps lexical and chronological order equal,
/// which the `ORDER BY created_at` queries rely on.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Split a comma-separated tag string into a trimmed list, dropping empty entries
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Trim every tag and drop the empty ones, keeping order
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Helper to parse tags JSON from database
pub fn parse_tags(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

/// Helper to serialize tags to JSON for database
pub fn serialize_tags(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}
