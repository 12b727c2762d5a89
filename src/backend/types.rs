//! Request and response envelopes of the backend REST surface.

use serde::{Deserialize, Serialize};

use crate::chat::message::ChatMessage;
use crate::identity::UserIdentity;
use crate::knowledge::model::SearchHit;
use crate::onboarding::model::{CompanyProfile, IndexingStatus, IntegrationRecord};

/// `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

/// `POST /chat/messages` body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub user_id: UserIdentity,
    pub content: String,
    pub metadata: serde_json::Value,
}

/// How the backend chose to handle a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Outcome of a calculator run during plan execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,
    #[serde(default)]
    pub output: String,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Response of `POST /chat/messages` and `POST /chat/execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: ChatMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(default)]
    pub knowledge_hits: Vec<SearchHit>,
    #[serde(default)]
    pub tool_results: Vec<ToolResult>,
}

impl ChatResponse {
    pub fn from_reply(reply: ChatMessage) -> Self {
        Self {
            reply,
            decision: None,
            knowledge_hits: Vec::new(),
            tool_results: Vec::new(),
        }
    }
}

/// `POST /chat/execute` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecuteRequest {
    pub plan_id: String,
    pub user_id: UserIdentity,
}

/// `POST /integration/profile` body: the profile plus the owner.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSaveRequest<'a> {
    pub user_id: &'a UserIdentity,
    #[serde(flatten)]
    pub profile: &'a CompanyProfile,
}

/// `POST /integration/profile` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSaveResponse {
    #[serde(default)]
    pub status: String,
    pub profile: CompanyProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexing_status: Option<IndexingStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexing_reason: Option<String>,
}

/// `POST /integration/alpha-business` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfirmation {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<IntegrationRecord>,
}

/// `GET /knowledge/search` response: hits or an error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Hits {
        hits: Vec<SearchHit>,
        #[serde(default)]
        query: Option<String>,
        #[serde(default = "default_true")]
        embedding_available: bool,
    },
    Error {
        error: String,
    },
}
