//! Backend REST surface consumed by the client.
//!
//! `Backend` is the seam every component talks through; `HttpBackend` is the
//! reqwest implementation. Unit tests script their own implementation.

pub mod http;
#[cfg(test)]
pub(crate) mod testing;
pub mod timestamp;
pub mod types;

pub use http::HttpBackend;
pub use types::*;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::identity::UserIdentity;
use crate::knowledge::model::{Document, DocumentUpload};
use crate::onboarding::model::{CompanyProfile, OnboardingSnapshot};

#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /health`
    async fn health(&self) -> Result<HealthStatus, TransportError>;

    /// `GET /knowledge/documents?user_id=`
    async fn list_documents(&self, user: &UserIdentity) -> Result<Vec<Document>, TransportError>;

    /// `POST /knowledge/documents` (multipart). The upload must carry a file.
    async fn upload_document(
        &self,
        user: &UserIdentity,
        upload: &DocumentUpload,
    ) -> Result<Document, TransportError>;

    /// `GET /knowledge/search?query=`
    async fn search(&self, query: &str) -> Result<SearchResponse, TransportError>;

    /// `POST /chat/messages`
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError>;

    /// `POST /chat/execute`
    async fn execute_plan(&self, request: &ExecuteRequest) -> Result<ChatResponse, TransportError>;

    /// `DELETE /chat/context/{user_id}`
    async fn reset_context(&self, user: &UserIdentity) -> Result<(), TransportError>;

    /// `POST /integration/profile`
    async fn save_profile(
        &self,
        user: &UserIdentity,
        profile: &CompanyProfile,
    ) -> Result<ProfileSaveResponse, TransportError>;

    /// `POST /integration/alpha-business`
    async fn confirm_integration(
        &self,
        user: &UserIdentity,
    ) -> Result<IntegrationConfirmation, TransportError>;

    /// `GET /integration/status?user_id=`
    async fn onboarding_snapshot(
        &self,
        user: &UserIdentity,
    ) -> Result<OnboardingSnapshot, TransportError>;
}
