//! Onboarding state machine — which step of the two-step sequence the user is in.

use serde::{Deserialize, Serialize};

use super::model::OnboardingSnapshot;

/// The onboarding stages.
///
/// Progresses linearly: NotStarted → ProfilePending → ProfileSaved →
/// IntegrationPending → Complete. Ordering follows that progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStage {
    NotStarted,
    ProfilePending,
    ProfileSaved,
    IntegrationPending,
    Complete,
}

impl OnboardingStage {
    /// Check if an event-driven transition from `self` to `target` is valid.
    ///
    /// Snapshot reconciliation does not go through this table; see
    /// [`OnboardingStage::from_snapshot`].
    pub fn can_transition_to(&self, target: OnboardingStage) -> bool {
        use OnboardingStage::*;
        matches!(
            (self, target),
            (NotStarted, ProfilePending)
                | (NotStarted, IntegrationPending)
                | (NotStarted, Complete)
                | (ProfilePending, ProfileSaved)
                | (ProfileSaved, IntegrationPending)
                | (ProfileSaved, Complete)
                | (IntegrationPending, Complete)
        )
    }

    /// Derive the stage from a backend snapshot.
    pub fn from_snapshot(snapshot: &OnboardingSnapshot) -> Self {
        if !snapshot.profile_saved() {
            Self::ProfilePending
        } else if !snapshot.integration_connected() {
            Self::IntegrationPending
        } else {
            Self::Complete
        }
    }

    /// Whether gated features (chat send, document upload) are available.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Whether the company profile has been saved.
    pub fn profile_saved(&self) -> bool {
        *self >= Self::ProfileSaved
    }
}

impl Default for OnboardingStage {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl std::fmt::Display for OnboardingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::ProfilePending => "profile_pending",
            Self::ProfileSaved => "profile_saved",
            Self::IntegrationPending => "integration_pending",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}
