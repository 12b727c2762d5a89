//! PilotApp — the session context object.
//!
//! Resolves the identity once, then wires the gate, chat session, document
//! registry and search around it. Every front-end drives the session through
//! this one orchestrator.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::backend::{Backend, HealthStatus};
use crate::chat::{ChatPhase, ChatSession, PlanPhase};
use crate::config::ClientConfig;
use crate::error::Error;
use crate::identity::{
    HostPlatform, IdentityResolver, IdentitySource, IdentityStore, NavigationParams,
    ResolvedIdentity, UserIdentity,
};
use crate::knowledge::{DocumentRegistry, KnowledgeSearch};
use crate::onboarding::{OnboardingGate, OnboardingStage, ProfileSaveOutcome};
use crate::view::{Navigation, Screen, View, route};

/// External collaborators of a session.
///
/// Bundles the injected seams to reduce argument count.
pub struct AppDeps {
    pub backend: Arc<dyn Backend>,
    pub identity_store: Arc<dyn IdentityStore>,
    pub host: Arc<dyn HostPlatform>,
}

/// One-line summary of the session for status displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppStatus {
    pub user_id: String,
    pub identity_source: String,
    pub stage: OnboardingStage,
    pub view: String,
    pub chat_phase: ChatPhase,
    pub plan_phase: PlanPhase,
    pub documents: usize,
    pub advisory: Option<String>,
}

pub struct PilotApp {
    config: ClientConfig,
    identity: ResolvedIdentity,
    backend: Arc<dyn Backend>,
    gate: OnboardingGate,
    chat: ChatSession,
    documents: DocumentRegistry,
    search: KnowledgeSearch,
    navigation: RwLock<Navigation>,
}

impl PilotApp {
    /// Resolve the session identity and build every component around it.
    ///
    /// No backend call is made; call [`PilotApp::bootstrap`] to load state.
    pub async fn start(config: ClientConfig, deps: AppDeps) -> Self {
        let params = config
            .navigation_url
            .as_deref()
            .map(NavigationParams::from_url)
            .unwrap_or_default();

        let identity = IdentityResolver::new(deps.identity_store, deps.host)
            .resolve(&params)
            .await;
        info!(
            user_id = %identity.identity,
            source = %identity.source,
            "Session identity resolved"
        );

        let user = identity.identity.clone();
        let backend = deps.backend;
        let gate = OnboardingGate::new(Arc::clone(&backend), user.clone());
        let chat = ChatSession::new(
            Arc::clone(&backend),
            user.clone(),
            gate.handle(),
            config.source_tag.clone(),
            config.greeting.clone(),
        );
        let documents = DocumentRegistry::new(Arc::clone(&backend), user, gate.handle());
        let search = KnowledgeSearch::new(Arc::clone(&backend));

        Self {
            navigation: RwLock::new(Navigation::from_mode(params.mode)),
            config,
            identity,
            backend,
            gate,
            chat,
            documents,
            search,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn user(&self) -> &UserIdentity {
        &self.identity.identity
    }

    pub fn identity_source(&self) -> IdentitySource {
        self.identity.source
    }

    pub fn gate(&self) -> &OnboardingGate {
        &self.gate
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub fn documents(&self) -> &DocumentRegistry {
        &self.documents
    }

    pub fn search(&self) -> &KnowledgeSearch {
        &self.search
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Load the onboarding snapshot and the document list concurrently.
    ///
    /// A failed document listing is logged and leaves the list empty; a
    /// failed snapshot is returned because routing depends on it.
    pub async fn bootstrap(&self) -> Result<View, Error> {
        let (stage, documents) =
            futures::future::join(self.gate.refresh(), self.documents.refresh()).await;
        if let Err(e) = documents {
            warn!(error = %e, "Initial document listing failed");
        }
        let stage = stage?;
        let view = self.view().await;
        info!(user_id = %self.user(), %stage, %view, "Session bootstrapped");
        Ok(view)
    }

    /// Re-fetch the onboarding snapshot and re-route.
    ///
    /// Picks up changes made outside this session (an integration confirmed
    /// through the companion bot) and recovers from a failed bootstrap.
    pub async fn refresh_onboarding(&self) -> Result<View, Error> {
        let before = self.gate.stage();
        let stage = self.gate.refresh().await?;
        if stage.is_complete() && !before.is_complete() {
            self.clear_request(Screen::Integration).await;
        }
        let view = self.view().await;
        if stage != before {
            info!(user_id = %self.user(), from = %before, to = %stage, %view, "Onboarding refreshed");
        }
        Ok(view)
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<HealthStatus, Error> {
        Ok(self.backend.health().await?)
    }

    // ── Onboarding ──────────────────────────────────────────────────

    /// Save the profile draft; routing then follows the new stage.
    pub async fn save_profile(&self) -> Result<ProfileSaveOutcome, Error> {
        let outcome = self.gate.save_profile().await?;
        self.clear_request(Screen::Profile).await;
        Ok(outcome)
    }

    /// Confirm the integration and re-derive the stage from the backend.
    pub async fn connect_integration(&self) -> Result<OnboardingStage, Error> {
        let stage = self.gate.confirm_integration().await?;
        if stage.is_complete() {
            self.clear_request(Screen::Integration).await;
        }
        Ok(stage)
    }

    /// Bypass the integration step. Navigation is unblocked; gated features
    /// stay refused until the stage is `Complete`.
    pub async fn skip_integration(&self) -> View {
        {
            let mut nav = self.navigation.write().await;
            nav.skipped_integration = true;
            if nav.requested == Some(Screen::Integration) {
                nav.requested = None;
            }
            nav.mode = None;
        }
        info!(user_id = %self.user(), stage = %self.gate.stage(), "Integration step skipped");
        self.view().await
    }

    // ── Navigation ──────────────────────────────────────────────────

    pub async fn view(&self) -> View {
        route(self.gate.stage(), &*self.navigation.read().await)
    }

    /// Request a screen; the router decides what is actually shown.
    pub async fn navigate(&self, screen: Screen) -> View {
        self.navigation.write().await.requested = Some(screen);
        self.view().await
    }

    async fn clear_request(&self, screen: Screen) {
        let mut nav = self.navigation.write().await;
        if nav.requested == Some(screen) {
            nav.requested = None;
        }
        nav.mode = None;
    }

    pub async fn status(&self) -> AppStatus {
        AppStatus {
            user_id: self.user().to_string(),
            identity_source: self.identity.source.to_string(),
            stage: self.gate.stage(),
            view: self.view().await.to_string(),
            chat_phase: self.chat.phase().await,
            plan_phase: self.chat.plan_phase().await,
            documents: self.documents.list().await.len(),
            advisory: self.gate.advisory().await,
        }
    }
}
