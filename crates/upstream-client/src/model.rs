//! Wire types for the upstream document-management backend's JSON API.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Statistics {
    pub documents_total: u64,
    #[serde(default)]
    pub character_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamDocument {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<i64>,
    pub correspondent: Option<i64>,
    pub document_type: Option<i64>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub added: Option<DateTime<Utc>>,
    pub original_file_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamDocumentMetadata {
    pub original_size: Option<u64>,
    pub archive_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceItem {
    pub id: i64,
    pub name: String,
}
