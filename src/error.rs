//! Error types for the pilot client.
//!
//! Nothing at this layer is fatal: every variant degrades to text shown in the
//! panel that triggered it, leaving the rest of the session usable.

use crate::onboarding::OnboardingStage;

/// Top-level error type for the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Gating error: {0}")]
    Gating(#[from] GatingError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),
}

impl Error {
    /// Text suitable for showing inline in the affected panel.
    pub fn user_message(&self) -> String {
        match self {
            Self::Gating(e) => e.guidance().to_string(),
            Self::Transport(e) => format!("Request failed: {e}"),
            Self::Validation(e) => e.to_string(),
            Self::Session(e) => e.to_string(),
            Self::Config(e) => e.to_string(),
            Self::Identity(e) => e.to_string(),
        }
    }
}

/// A feature was invoked before the onboarding prerequisite was met.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatingError {
    #[error("{feature} requires completed onboarding (current stage: {stage})")]
    OnboardingIncomplete {
        feature: String,
        stage: OnboardingStage,
    },
}

impl GatingError {
    /// Guidance text pointing the user at the missing onboarding step.
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::OnboardingIncomplete { stage, .. } => match stage {
                OnboardingStage::NotStarted | OnboardingStage::ProfilePending => {
                    "Fill in the company profile first so the assistant knows your business context."
                }
                OnboardingStage::ProfileSaved | OnboardingStage::IntegrationPending => {
                    "One step left: connect Alpha-Business to unlock chat and document upload."
                }
                OnboardingStage::Complete => "Onboarding is complete.",
            },
        }
    }
}

/// Network or backend failure. Never retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{endpoint} request failed: {reason}")]
    Request { endpoint: String, reason: String },

    #[error("{endpoint} returned {status}: {detail}")]
    Status {
        endpoint: String,
        status: u16,
        detail: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

/// Input rejected before any call is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Company name is required")]
    EmptyCompanyName,

    #[error("Invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("A file is required for upload")]
    MissingFile,

    #[error("{0} must not be empty")]
    EmptyField(String),
}

/// Chat session and plan lifecycle rejections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("A message is already in flight; wait for the reply")]
    Busy,

    #[error("No plan is awaiting confirmation")]
    NoActivePlan,

    #[error("Plan {requested} is no longer active")]
    PlanSuperseded { requested: String },

    #[error("Cannot transition plan from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Another upload is already in progress")]
    UploadInProgress,
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Identity persistence errors. Resolution itself never fails; these are
/// logged by the resolver and surfaced only by the store API.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt identity store: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Result type alias for the client.
pub type Result<T> = std::result::Result<T, Error>;
