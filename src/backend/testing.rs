//! Stateful in-memory backend for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use super::types::*;
use super::Backend;
use crate::chat::message::ChatMessage;
use crate::error::TransportError;
use crate::identity::UserIdentity;
use crate::knowledge::model::{Document, DocumentStatus, DocumentUpload};
use crate::onboarding::model::{CompanyProfile, IntegrationRecord, OnboardingSnapshot};

fn failure(endpoint: &str, detail: &str) -> TransportError {
    TransportError::Status {
        endpoint: endpoint.to_string(),
        status: 500,
        detail: detail.to_string(),
    }
}

/// Scripted backend. Server-side state (snapshot, documents) evolves as the
/// real backend would; chat/execute/search replies are queued by the test.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    pub snapshot: Mutex<OnboardingSnapshot>,
    pub documents: Mutex<Vec<Document>>,
    pub chat_replies: Mutex<VecDeque<Result<ChatResponse, String>>>,
    pub execute_replies: Mutex<VecDeque<Result<ChatResponse, String>>>,
    pub search_replies: Mutex<VecDeque<Result<SearchResponse, String>>>,
    pub profile_failure: Mutex<Option<String>>,
    pub snapshot_failure: Mutex<Option<String>>,
    pub upload_status: Mutex<Option<DocumentStatus>>,
    calls: Mutex<Vec<&'static str>>,
    pauses: Mutex<HashMap<&'static str, Arc<Notify>>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Backend whose user has already finished onboarding.
    pub fn onboarded() -> Arc<Self> {
        let backend = Self::default();
        *backend.snapshot.lock().unwrap() = OnboardingSnapshot {
            profile: Some(CompanyProfile {
                company_name: "Acme".into(),
                ..Default::default()
            }),
            integration: Some(connected()),
        };
        Arc::new(backend)
    }

    pub fn push_chat(&self, reply: Result<ChatResponse, String>) {
        self.chat_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_execute(&self, reply: Result<ChatResponse, String>) {
        self.execute_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_search(&self, reply: Result<SearchResponse, String>) {
        self.search_replies.lock().unwrap().push_back(reply);
    }

    /// Make the next call to `endpoint` block until the returned handle is
    /// notified. Later calls run straight through.
    pub fn pause(&self, endpoint: &'static str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.pauses.lock().unwrap().insert(endpoint, Arc::clone(&notify));
        notify
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == endpoint).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    async fn enter(&self, endpoint: &'static str) {
        self.calls.lock().unwrap().push(endpoint);
        let pause = self.pauses.lock().unwrap().remove(endpoint);
        if let Some(pause) = pause {
            pause.notified().await;
        }
    }
}

pub(crate) fn connected() -> IntegrationRecord {
    IntegrationRecord {
        status: "connected".into(),
        provider: Some("alpha_business".into()),
        connected_at: Some(Utc::now()),
    }
}

/// Assistant reply proposing a plan with the given follow-ups.
pub(crate) fn plan_reply(plan_id: &str, followups: &[&str]) -> ChatResponse {
    ChatResponse::from_reply(
        ChatMessage::assistant(format!("Plan {plan_id} ready. Confirm to run it.")).with_metadata(
            serde_json::json!({ "plan_id": plan_id, "followups": followups }),
        ),
    )
}

pub(crate) fn text_reply(text: &str) -> ChatResponse {
    ChatResponse::from_reply(ChatMessage::assistant(text))
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn health(&self) -> Result<HealthStatus, TransportError> {
        self.enter("/health").await;
        Ok(HealthStatus {
            status: "ok".into(),
            environment: Some("local".into()),
        })
    }

    async fn list_documents(&self, _user: &UserIdentity) -> Result<Vec<Document>, TransportError> {
        // Listed at request time; a paused call returns what it saw then.
        let documents = self.documents.lock().unwrap().clone();
        self.enter("/knowledge/documents GET").await;
        Ok(documents)
    }

    async fn upload_document(
        &self,
        _user: &UserIdentity,
        upload: &DocumentUpload,
    ) -> Result<Document, TransportError> {
        self.enter("/knowledge/documents POST").await;
        let status = self.upload_status.lock().unwrap().unwrap_or(DocumentStatus::Queued);
        let doc = Document {
            id: uuid::Uuid::new_v4().to_string(),
            title: upload.title.clone(),
            category: upload.category.clone(),
            description: upload.description.clone(),
            status,
            uploaded_at: Utc::now(),
            size_bytes: upload.file.as_ref().map_or(0, |f| f.bytes.len() as u64),
            original_filename: upload.file.as_ref().map(|f| f.file_name.clone()),
            tags: upload.tags.clone(),
        };
        // Server-side indexing finishes before the next listing.
        let mut listed = doc.clone();
        if listed.status == DocumentStatus::Queued {
            listed.status = DocumentStatus::Indexed;
        }
        self.documents.lock().unwrap().insert(0, listed);
        Ok(doc)
    }

    async fn search(&self, _query: &str) -> Result<SearchResponse, TransportError> {
        self.enter("/knowledge/search").await;
        let next = self.search_replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(detail)) => Err(failure("/knowledge/search", &detail)),
            None => Ok(SearchResponse::Hits {
                hits: Vec::new(),
                query: None,
                embedding_available: true,
            }),
        }
    }

    async fn send_message(&self, _request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        self.enter("/chat/messages").await;
        let next = self.chat_replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(detail)) => Err(failure("/chat/messages", &detail)),
            None => Ok(text_reply("ok")),
        }
    }

    async fn execute_plan(&self, request: &ExecuteRequest) -> Result<ChatResponse, TransportError> {
        self.enter("/chat/execute").await;
        let next = self.execute_replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(detail)) => Err(failure("/chat/execute", &detail)),
            None => Ok(text_reply(&format!("Executed {}", request.plan_id))),
        }
    }

    async fn reset_context(&self, _user: &UserIdentity) -> Result<(), TransportError> {
        self.enter("/chat/context").await;
        Ok(())
    }

    async fn save_profile(
        &self,
        _user: &UserIdentity,
        profile: &CompanyProfile,
    ) -> Result<ProfileSaveResponse, TransportError> {
        self.enter("/integration/profile").await;
        if let Some(detail) = self.profile_failure.lock().unwrap().clone() {
            return Err(failure("/integration/profile", &detail));
        }
        self.snapshot.lock().unwrap().profile = Some(profile.clone());
        Ok(ProfileSaveResponse {
            status: "ok".into(),
            profile: profile.clone(),
            indexing_status: Some(crate::onboarding::IndexingStatus::Queued),
            indexing_reason: None,
        })
    }

    async fn confirm_integration(
        &self,
        _user: &UserIdentity,
    ) -> Result<IntegrationConfirmation, TransportError> {
        self.enter("/integration/alpha-business").await;
        let record = connected();
        self.snapshot.lock().unwrap().integration = Some(record.clone());
        Ok(IntegrationConfirmation {
            status: "ok".into(),
            integration: Some(record),
        })
    }

    async fn onboarding_snapshot(
        &self,
        _user: &UserIdentity,
    ) -> Result<OnboardingSnapshot, TransportError> {
        let snapshot = self.snapshot.lock().unwrap().clone();
        self.enter("/integration/status").await;
        if let Some(detail) = self.snapshot_failure.lock().unwrap().clone() {
            return Err(failure("/integration/status", &detail));
        }
        Ok(snapshot)
    }
}
