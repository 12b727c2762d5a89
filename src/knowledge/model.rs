//! Knowledge document and search hit models.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::timestamp;

/// Server-assigned indexing lifecycle of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Queued,
    Processing,
    Indexed,
    #[serde(alias = "embedding_failed")]
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Indexed => "indexed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

fn default_category() -> String {
    "general".to_string()
}

fn default_status() -> DocumentStatus {
    DocumentStatus::Queued
}

/// An uploaded knowledge document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: DocumentStatus,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Document {
    /// Case-insensitive substring match over title and category.
    pub fn matches(&self, needle_lower: &str) -> bool {
        needle_lower.is_empty()
            || self.title.to_lowercase().contains(needle_lower)
            || self.category.to_lowercase().contains(needle_lower)
    }
}

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, inferring the content type from its extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        Ok(Self {
            content_type: content_type_for(path).to_string(),
            file_name,
            bytes,
        })
    }
}

/// Content types the backend can ingest, by extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("txt") => "text/plain",
        Some("md") | Some("markdown") => "text/markdown",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Upload request as entered in the documents panel.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpload {
    pub file: Option<UploadFile>,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub tags: Vec<String>,
}

/// A scored text fragment from the knowledge index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_parses_with_defaults() {
        let doc: Document = serde_json::from_str(
            r#"{"id":"d1","title":"Price list","status":"embedding_failed",
                "uploaded_at":"2025-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        assert_eq!(doc.category, "general");
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert!(doc.tags.is_empty());
    }

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type_for(Path::new("a/report.PDF")), "application/pdf");
        assert_eq!(content_type_for(Path::new("notes.md")), "text/markdown");
        assert_eq!(content_type_for(Path::new("blob")), "application/octet-stream");
    }

    #[tokio::test]
    async fn upload_file_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terms.txt");
        tokio::fs::write(&path, b"net 30").await.unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.file_name, "terms.txt");
        assert_eq!(file.content_type, "text/plain");
        assert_eq!(file.bytes, b"net 30");
    }
}
