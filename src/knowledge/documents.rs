//! DocumentRegistry — the user's uploaded documents and their indexing status.
//!
//! The backend is authoritative for status: after every successful upload
//! the whole list is re-fetched rather than merged locally.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::model::{Document, DocumentStatus, DocumentUpload};
use crate::backend::Backend;
use crate::error::{Error, SessionError, ValidationError};
use crate::identity::UserIdentity;
use crate::onboarding::GateHandle;

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    /// The document as returned by the upload call.
    pub document: Document,
    /// Status line for the documents panel.
    pub message: String,
}

struct RegistryState {
    documents: Vec<Document>,
    applied_generation: u64,
    status_line: Option<String>,
}

pub struct DocumentRegistry {
    backend: Arc<dyn Backend>,
    user: UserIdentity,
    gate: GateHandle,
    state: RwLock<RegistryState>,
    next_generation: AtomicU64,
    uploading: AtomicBool,
}

/// Clears the in-progress flag even if the upload future is dropped.
struct UploadGuard<'a>(&'a AtomicBool);

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl DocumentRegistry {
    pub fn new(backend: Arc<dyn Backend>, user: UserIdentity, gate: GateHandle) -> Self {
        Self {
            backend,
            user,
            gate,
            state: RwLock::new(RegistryState {
                documents: Vec::new(),
                applied_generation: 0,
                status_line: None,
            }),
            next_generation: AtomicU64::new(1),
            uploading: AtomicBool::new(false),
        }
    }

    /// Documents from the last applied listing, newest first.
    pub async fn list(&self) -> Vec<Document> {
        self.state.read().await.documents.clone()
    }

    /// Documents matching `query`, recomputed from the current list.
    pub async fn filtered(&self, query: &str) -> Vec<Document> {
        let state = self.state.read().await;
        filter_documents(&state.documents, query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Last upload status line (success, indexing advisory or failure).
    pub async fn status_line(&self) -> Option<String> {
        self.state.read().await.status_line.clone()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::SeqCst)
    }

    /// Re-fetch the full list from the backend.
    ///
    /// A listing that arrives after a newer one was applied is discarded.
    pub async fn refresh(&self) -> Result<Vec<Document>, Error> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let mut documents = self.backend.list_documents(&self.user).await?;
        documents.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));

        let mut state = self.state.write().await;
        if generation < state.applied_generation {
            warn!(generation, applied = state.applied_generation, "Discarding stale document listing");
            return Ok(state.documents.clone());
        }
        state.applied_generation = generation;
        state.documents = documents;
        debug!(count = state.documents.len(), "Document list refreshed");
        Ok(state.documents.clone())
    }

    /// Upload a document and re-fetch the registry.
    ///
    /// Refused before any call when onboarding is incomplete, the upload is
    /// missing a file or title, or another upload is still running.
    pub async fn upload(&self, mut upload: DocumentUpload) -> Result<UploadOutcome, Error> {
        self.gate.ensure_complete("document upload")?;

        if upload.file.is_none() {
            return Err(ValidationError::MissingFile.into());
        }
        upload.title = upload.title.trim().to_string();
        if upload.title.is_empty() {
            return Err(ValidationError::EmptyField("title".into()).into());
        }
        upload.category = match upload.category.trim() {
            "" => "general".to_string(),
            category => category.to_string(),
        };
        upload.description = upload
            .description
            .take()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        if self.uploading.swap(true, Ordering::SeqCst) {
            return Err(SessionError::UploadInProgress.into());
        }
        let _guard = UploadGuard(&self.uploading);

        let document = match self.backend.upload_document(&self.user, &upload).await {
            Ok(document) => document,
            Err(e) => {
                warn!(user_id = %self.user, title = %upload.title, error = %e, "Document upload failed");
                self.state.write().await.status_line = Some(format!("Upload failed: {e}"));
                return Err(e.into());
            }
        };
        info!(
            user_id = %self.user,
            document_id = %document.id,
            status = %document.status,
            "Document uploaded"
        );

        let message = upload_message(&document);
        self.state.write().await.status_line = Some(message.clone());

        // The upload already succeeded; a failed listing only leaves the
        // list stale until the next refresh.
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Document list refresh after upload failed");
        }

        Ok(UploadOutcome { document, message })
    }
}

fn upload_message(document: &Document) -> String {
    match document.status {
        DocumentStatus::Indexed => format!("Uploaded \"{}\" and indexed it.", document.title),
        DocumentStatus::Queued | DocumentStatus::Processing => {
            format!("Uploaded \"{}\"; indexing is {}.", document.title, document.status)
        }
        DocumentStatus::Failed => format!(
            "Uploaded \"{}\", but indexing failed (embedding unavailable).",
            document.title
        ),
    }
}

/// Case-insensitive substring match over title and category.
///
/// Pure: never mutates `documents`, preserves their order.
pub fn filter_documents<'a>(documents: &'a [Document], query: &str) -> Vec<&'a Document> {
    let needle = query.trim().to_lowercase();
    documents.iter().filter(|d| d.matches(&needle)).collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::backend::testing::ScriptedBackend;
    use crate::error::GatingError;
    use crate::knowledge::model::UploadFile;
    use crate::onboarding::OnboardingStage;

    fn registry(backend: &Arc<ScriptedBackend>, stage: OnboardingStage) -> DocumentRegistry {
        DocumentRegistry::new(backend.clone(), UserIdentity::new("42"), GateHandle::fixed(stage))
    }

    fn doc(id: &str, title: &str, category: &str, age_minutes: i64) -> Document {
        Document {
            id: id.into(),
            title: title.into(),
            category: category.into(),
            description: None,
            status: DocumentStatus::Indexed,
            uploaded_at: Utc::now() - Duration::minutes(age_minutes),
            size_bytes: 10,
            original_filename: None,
            tags: Vec::new(),
        }
    }

    fn upload(title: &str) -> DocumentUpload {
        DocumentUpload {
            file: Some(UploadFile::new("prices.txt", "text/plain", b"widget 10".to_vec())),
            title: title.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn upload_refused_while_integration_missing() {
        let backend = ScriptedBackend::new();
        backend.documents.lock().unwrap().push(doc("d1", "Old", "general", 5));
        let registry = registry(&backend, OnboardingStage::IntegrationPending);
        registry.refresh().await.unwrap();
        let before = registry.list().await;
        let calls_before = backend.total_calls();

        let err = registry.upload(upload("Prices")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Gating(GatingError::OnboardingIncomplete {
                stage: OnboardingStage::IntegrationPending,
                ..
            })
        ));
        assert_eq!(backend.total_calls(), calls_before);
        assert_eq!(registry.list().await, before);
    }

    #[tokio::test]
    async fn upload_validates_before_calling() {
        let backend = ScriptedBackend::new();
        let registry = registry(&backend, OnboardingStage::Complete);

        let missing_file = DocumentUpload {
            title: "Prices".into(),
            ..Default::default()
        };
        assert!(matches!(
            registry.upload(missing_file).await,
            Err(Error::Validation(ValidationError::MissingFile))
        ));
        assert!(matches!(
            registry.upload(upload("  ")).await,
            Err(Error::Validation(ValidationError::EmptyField(_)))
        ));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn upload_refetches_and_server_status_wins() {
        let backend = ScriptedBackend::new();
        backend.documents.lock().unwrap().push(doc("d0", "Handbook", "hr", 60));
        let registry = registry(&backend, OnboardingStage::Complete);

        let outcome = registry.upload(upload(" Prices ")).await.unwrap();
        assert_eq!(outcome.document.status, DocumentStatus::Queued);
        assert_eq!(outcome.document.category, "general");
        assert!(outcome.message.contains("queued"));
        assert_eq!(backend.calls("/knowledge/documents GET"), 1);

        let docs = registry.list().await;
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].title, "Prices");
        // Listing reflects the backend's status, not the upload response.
        assert_eq!(docs[0].status, DocumentStatus::Indexed);
        assert!(!registry.is_uploading());
    }

    #[tokio::test]
    async fn embedding_failure_is_a_status_not_an_error() {
        let backend = ScriptedBackend::new();
        *backend.upload_status.lock().unwrap() = Some(DocumentStatus::Failed);
        let registry = registry(&backend, OnboardingStage::Complete);

        let outcome = registry.upload(upload("Contract")).await.unwrap();
        assert_eq!(outcome.document.status, DocumentStatus::Failed);
        assert!(outcome.message.contains("embedding unavailable"));
        assert_eq!(registry.status_line().await, Some(outcome.message));
    }

    #[tokio::test]
    async fn concurrent_upload_is_rejected() {
        let backend = ScriptedBackend::new();
        let registry = Arc::new(registry(&backend, OnboardingStage::Complete));
        let release = backend.pause("/knowledge/documents POST");

        let first = tokio::spawn({
            let registry = registry.clone();
            async move { registry.upload(upload("One")).await }
        });
        while backend.calls("/knowledge/documents POST") == 0 {
            tokio::task::yield_now().await;
        }
        assert!(registry.is_uploading());
        assert!(matches!(
            registry.upload(upload("Two")).await,
            Err(Error::Session(SessionError::UploadInProgress))
        ));

        release.notify_one();
        first.await.unwrap().unwrap();
        assert!(!registry.is_uploading());
    }

    #[tokio::test]
    async fn older_listing_landing_late_is_discarded() {
        let backend = ScriptedBackend::new();
        let registry = Arc::new(registry(&backend, OnboardingStage::Complete));
        let release = backend.pause("/knowledge/documents GET");

        let older = tokio::spawn({
            let registry = registry.clone();
            async move { registry.refresh().await }
        });
        while backend.calls("/knowledge/documents GET") == 0 {
            tokio::task::yield_now().await;
        }

        backend.documents.lock().unwrap().push(doc("new", "Price list", "sales", 1));
        assert_eq!(registry.refresh().await.unwrap().len(), 1);

        release.notify_one();
        let stale = older.await.unwrap().unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(registry.list().await[0].id, "new");
    }

    #[tokio::test]
    async fn refresh_sorts_newest_first() {
        let backend = ScriptedBackend::new();
        backend.documents.lock().unwrap().extend([
            doc("old", "Old", "general", 30),
            doc("new", "New", "general", 1),
        ]);
        let registry = registry(&backend, OnboardingStage::Complete);
        let docs = registry.refresh().await.unwrap();
        assert_eq!(docs[0].id, "new");
    }

    #[test]
    fn filter_is_case_insensitive_and_pure() {
        let docs = vec![
            doc("1", "Price List 2025", "sales", 1),
            doc("2", "Employee handbook", "HR", 2),
            doc("3", "Supplier terms", "purchasing", 3),
        ];
        let snapshot = docs.clone();

        let hits: Vec<_> = filter_documents(&docs, "PRICE").iter().map(|d| d.id.as_str()).collect();
        assert_eq!(hits, vec!["1"]);
        let hits: Vec<_> = filter_documents(&docs, "hr").iter().map(|d| d.id.as_str()).collect();
        assert_eq!(hits, vec!["2"]);
        assert_eq!(filter_documents(&docs, "  ").len(), 3);
        assert!(filter_documents(&docs, "payroll").is_empty());
        assert_eq!(docs, snapshot);
    }
}
