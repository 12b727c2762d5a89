//! Company profile, editable draft, and onboarding snapshot models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::timestamp;
use crate::error::ValidationError;

/// Company profile as saved on the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employees: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_revenue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_systems: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "timestamp::deserialize_option"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// Editable form mirror of a `CompanyProfile`.
///
/// All fields are raw form text. Editing the draft never touches the saved
/// snapshot; the gate replaces the snapshot only after a successful save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDraft {
    pub company_name: String,
    pub industry: String,
    pub employees: String,
    pub annual_revenue: String,
    pub key_systems: String,
    pub goals: String,
    pub locale: String,
}

impl ProfileDraft {
    /// Mirror a saved profile into a fresh draft.
    pub fn from_profile(profile: &CompanyProfile) -> Self {
        Self {
            company_name: profile.company_name.clone(),
            industry: profile.industry.clone().unwrap_or_default(),
            employees: profile.employees.map(|n| n.to_string()).unwrap_or_default(),
            annual_revenue: profile.annual_revenue.clone().unwrap_or_default(),
            key_systems: profile.key_systems.clone().unwrap_or_default(),
            goals: profile.goals.clone().unwrap_or_default(),
            locale: profile.locale.clone().unwrap_or_default(),
        }
    }

    /// Set a field by its form name. Returns false for unknown fields.
    pub fn set_field(&mut self, field: &str, value: impl Into<String>) -> bool {
        let slot = match field {
            "company_name" | "name" => &mut self.company_name,
            "industry" => &mut self.industry,
            "employees" => &mut self.employees,
            "annual_revenue" | "revenue" => &mut self.annual_revenue,
            "key_systems" | "systems" => &mut self.key_systems,
            "goals" => &mut self.goals,
            "locale" => &mut self.locale,
            _ => return false,
        };
        *slot = value.into();
        true
    }

    /// Validate and convert into a profile ready to save.
    pub fn to_profile(&self) -> Result<CompanyProfile, ValidationError> {
        let company_name = self.company_name.trim();
        if company_name.is_empty() {
            return Err(ValidationError::EmptyCompanyName);
        }

        let employees = match self.employees.trim() {
            "" => None,
            raw => Some(raw.parse::<u32>().map_err(|_| ValidationError::InvalidField {
                field: "employees".into(),
                message: format!("expected a whole number, got {raw:?}"),
            })?),
        };

        Ok(CompanyProfile {
            company_name: company_name.to_string(),
            industry: optional(&self.industry),
            employees,
            annual_revenue: optional(&self.annual_revenue),
            key_systems: optional(&self.key_systems),
            goals: optional(&self.goals),
            locale: optional(&self.locale),
            created_at: None,
        })
    }

    /// Whether the draft differs from the given snapshot.
    pub fn is_dirty(&self, snapshot: Option<&CompanyProfile>) -> bool {
        match snapshot {
            Some(profile) => *self != Self::from_profile(profile),
            None => *self != Self::default(),
        }
    }
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Server-assigned indexing status of a saved profile or document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingStatus {
    Indexed,
    Processing,
    Queued,
    #[serde(alias = "embedding_failed")]
    Failed,
}

impl std::fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Indexed => "indexed",
            Self::Processing => "processing",
            Self::Queued => "queued",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Advisory text for a profile's indexing status. Never blocks onboarding.
pub fn indexing_advisory(status: Option<IndexingStatus>, reason: Option<&str>) -> Option<String> {
    let status = status?;
    let text = match status {
        IndexingStatus::Indexed => "Profile saved and indexed.".to_string(),
        IndexingStatus::Processing => "Profile saved; indexing is in progress.".to_string(),
        IndexingStatus::Queued => "Profile saved and queued for indexing.".to_string(),
        IndexingStatus::Failed => match reason {
            Some("embedding_unavailable") | Some("embedding unavailable") => {
                "Profile saved, but indexing is unavailable right now (embedding service offline)."
                    .to_string()
            }
            Some(other) => format!("Profile saved, but indexing failed: {other}"),
            None => "Profile saved, but indexing failed.".to_string(),
        },
    };
    Some(text)
}

/// Integration record as stored on the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationRecord {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "timestamp::deserialize_option"
    )]
    pub connected_at: Option<DateTime<Utc>>,
}

impl IntegrationRecord {
    pub fn is_connected(&self) -> bool {
        self.status == "connected"
    }
}

/// Backend view of a user's onboarding progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnboardingSnapshot {
    #[serde(default)]
    pub profile: Option<CompanyProfile>,
    #[serde(default)]
    pub integration: Option<IntegrationRecord>,
}

impl OnboardingSnapshot {
    pub fn profile_saved(&self) -> bool {
        self.profile.is_some()
    }

    pub fn integration_connected(&self) -> bool {
        self.integration
            .as_ref()
            .is_some_and(IntegrationRecord::is_connected)
    }

    pub fn onboarding_complete(&self) -> bool {
        self.profile_saved() && self.integration_connected()
    }
}
