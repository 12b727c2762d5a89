//! ViewRouter — which top-level screen is active.
//!
//! A pure function of the onboarding stage and navigation input; holds no
//! state of its own.

use serde::{Deserialize, Serialize};

use crate::identity::NavigationMode;
use crate::onboarding::OnboardingStage;

/// Tabs of the main screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainTab {
    #[default]
    Chat,
    Documents,
    Search,
}

/// Top-level screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "view", content = "tab")]
pub enum View {
    /// Onboarding snapshot not fetched yet.
    Loading,
    Profile,
    Integration,
    Main(MainTab),
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Profile => write!(f, "profile"),
            Self::Integration => write!(f, "integration"),
            Self::Main(MainTab::Chat) => write!(f, "chat"),
            Self::Main(MainTab::Documents) => write!(f, "documents"),
            Self::Main(MainTab::Search) => write!(f, "search"),
        }
    }
}

/// A screen explicitly requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Chat,
    Documents,
    Search,
    Profile,
    Integration,
}

impl std::str::FromStr for Screen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "docs" | "documents" => Ok(Self::Documents),
            "search" => Ok(Self::Search),
            "profile" => Ok(Self::Profile),
            "integration" => Ok(Self::Integration),
            other => Err(format!("unknown screen: {other}")),
        }
    }
}

/// Navigation input accumulated for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Navigation {
    /// Mode carried in the launch URL.
    pub mode: Option<NavigationMode>,
    /// Last screen the user asked for.
    pub requested: Option<Screen>,
    /// The user chose to bypass the integration step.
    pub skipped_integration: bool,
}

impl Navigation {
    pub fn from_mode(mode: Option<NavigationMode>) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }
}

/// Select the active view.
///
/// The profile is mandatory: until it is saved every request lands on the
/// profile screen. After that the integration screen is shown until it is
/// connected or skipped. Skipping unblocks navigation only; gated features
/// still check the stage themselves.
pub fn route(stage: OnboardingStage, nav: &Navigation) -> View {
    use OnboardingStage::*;

    let requested = nav.requested.or(match nav.mode {
        Some(NavigationMode::Profile) => Some(Screen::Profile),
        Some(NavigationMode::Integration) => Some(Screen::Integration),
        None => None,
    });

    match stage {
        NotStarted => View::Loading,
        ProfilePending => View::Profile,
        ProfileSaved | IntegrationPending | Complete => {
            let unblocked = stage.is_complete() || nav.skipped_integration;
            match requested {
                Some(Screen::Profile) => View::Profile,
                Some(Screen::Integration) => View::Integration,
                _ if !unblocked => View::Integration,
                Some(Screen::Documents) => View::Main(MainTab::Documents),
                Some(Screen::Search) => View::Main(MainTab::Search),
                Some(Screen::Chat) | None => View::Main(MainTab::Chat),
            }
        }
    }
}
