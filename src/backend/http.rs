//! reqwest implementation of the backend surface.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use super::types::*;
use super::Backend;
use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::identity::UserIdentity;
use crate::knowledge::model::{Document, DocumentUpload};
use crate::onboarding::model::{CompanyProfile, OnboardingSnapshot};

/// HTTP client for the pilot backend.
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Request {
                endpoint: "client".into(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self::with_client(&config.api_base_url, client))
    }

    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn decode<T: DeserializeOwned>(endpoint: &str, resp: Response) -> Result<T, TransportError> {
        let resp = Self::check(endpoint, resp).await?;
        resp.json::<T>().await.map_err(|e| TransportError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    /// Map non-success statuses to `TransportError::Status`, pulling the
    /// backend's `detail` field when present.
    async fn check(endpoint: &str, resp: Response) -> Result<Response, TransportError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("detail")
                    .or_else(|| v.get("error"))
                    .map(|d| d.as_str().map(String::from).unwrap_or_else(|| d.to_string()))
            })
            .unwrap_or(body);
        tracing::debug!(endpoint, status = status.as_u16(), %detail, "Backend returned error status");
        Err(TransportError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            detail,
        })
    }

    fn request_failed(endpoint: &str) -> impl FnOnce(reqwest::Error) -> TransportError + '_ {
        move |e| TransportError::Request {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn health(&self) -> Result<HealthStatus, TransportError> {
        const EP: &str = "/health";
        let resp = self
            .client
            .get(self.url(EP))
            .send()
            .await
            .map_err(Self::request_failed(EP))?;
        Self::decode(EP, resp).await
    }

    async fn list_documents(&self, user: &UserIdentity) -> Result<Vec<Document>, TransportError> {
        const EP: &str = "/knowledge/documents";
        let resp = self
            .client
            .get(self.url(EP))
            .query(&[("user_id", user.as_str())])
            .send()
            .await
            .map_err(Self::request_failed(EP))?;
        Self::decode(EP, resp).await
    }

    async fn upload_document(
        &self,
        user: &UserIdentity,
        upload: &DocumentUpload,
    ) -> Result<Document, TransportError> {
        const EP: &str = "/knowledge/documents";
        let file = upload.file.as_ref().ok_or_else(|| TransportError::Request {
            endpoint: EP.into(),
            reason: "upload has no file attached".into(),
        })?;

        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(Self::request_failed(EP))?;
        let tags_json = serde_json::to_string(&upload.tags).unwrap_or_else(|_| "[]".to_string());

        let mut form = Form::new()
            .text("user_id", user.as_str().to_string())
            .text("title", upload.title.clone())
            .text("category", upload.category.clone())
            .text("tags_json", tags_json)
            .part("file", part);
        if let Some(description) = &upload.description {
            form = form.text("description", description.clone());
        }

        let resp = self
            .client
            .post(self.url(EP))
            .multipart(form)
            .send()
            .await
            .map_err(Self::request_failed(EP))?;
        Self::decode(EP, resp).await
    }

    async fn search(&self, query: &str) -> Result<SearchResponse, TransportError> {
        const EP: &str = "/knowledge/search";
        let resp = self
            .client
            .get(self.url(EP))
            .query(&[("query", query)])
            .send()
            .await
            .map_err(Self::request_failed(EP))?;
        Self::decode(EP, resp).await
    }

    async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        const EP: &str = "/chat/messages";
        let resp = self
            .client
            .post(self.url(EP))
            .json(request)
            .send()
            .await
            .map_err(Self::request_failed(EP))?;
        Self::decode(EP, resp).await
    }

    async fn execute_plan(&self, request: &ExecuteRequest) -> Result<ChatResponse, TransportError> {
        const EP: &str = "/chat/execute";
        let resp = self
            .client
            .post(self.url(EP))
            .json(request)
            .send()
            .await
            .map_err(Self::request_failed(EP))?;
        Self::decode(EP, resp).await
    }

    async fn reset_context(&self, user: &UserIdentity) -> Result<(), TransportError> {
        const EP: &str = "/chat/context";
        let resp = self
            .client
            .delete(self.url(&format!("{EP}/{}", user.as_str())))
            .send()
            .await
            .map_err(Self::request_failed(EP))?;
        Self::check(EP, resp).await.map(|_| ())
    }

    async fn save_profile(
        &self,
        user: &UserIdentity,
        profile: &CompanyProfile,
    ) -> Result<ProfileSaveResponse, TransportError> {
        const EP: &str = "/integration/profile";
        let body = ProfileSaveRequest {
            user_id: user,
            profile,
        };
        let resp = self
            .client
            .post(self.url(EP))
            .json(&body)
            .send()
            .await
            .map_err(Self::request_failed(EP))?;
        Self::decode(EP, resp).await
    }

    async fn confirm_integration(
        &self,
        user: &UserIdentity,
    ) -> Result<IntegrationConfirmation, TransportError> {
        const EP: &str = "/integration/alpha-business";
        let resp = self
            .client
            .post(self.url(EP))
            .json(&serde_json::json!({ "user_id": user }))
            .send()
            .await
            .map_err(Self::request_failed(EP))?;
        Self::decode(EP, resp).await
    }

    async fn onboarding_snapshot(
        &self,
        user: &UserIdentity,
    ) -> Result<OnboardingSnapshot, TransportError> {
        const EP: &str = "/integration/status";
        let resp = self
            .client
            .get(self.url(EP))
            .query(&[("user_id", user.as_str())])
            .send()
            .await
            .map_err(Self::request_failed(EP))?;
        Self::decode(EP, resp).await
    }
}
