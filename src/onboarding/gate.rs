//! OnboardingGate — owns onboarding state and answers "may this feature run?".
//!
//! The stage is always re-derived from a backend snapshot; the only local
//! transition is `ProfilePending → ProfileSaved` after a successful save.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use super::model::{CompanyProfile, OnboardingSnapshot, ProfileDraft, indexing_advisory};
use super::state::OnboardingStage;
use crate::backend::Backend;
use crate::error::{Error, GatingError};
use crate::identity::UserIdentity;

/// Read-only view of the gate, handed to gated features.
///
/// Reading the stage is synchronous: features check it before issuing any
/// call and refuse immediately when onboarding is incomplete.
#[derive(Clone)]
pub struct GateHandle {
    rx: watch::Receiver<OnboardingStage>,
}

impl GateHandle {
    /// A handle pinned to one stage.
    pub fn fixed(stage: OnboardingStage) -> Self {
        let (_tx, rx) = watch::channel(stage);
        Self { rx }
    }

    pub fn stage(&self) -> OnboardingStage {
        *self.rx.borrow()
    }

    /// Refuse with a `GatingError` unless onboarding is complete.
    pub fn ensure_complete(&self, feature: &str) -> Result<(), GatingError> {
        let stage = self.stage();
        if stage.is_complete() {
            Ok(())
        } else {
            debug!(feature, %stage, "Refusing gated feature");
            Err(GatingError::OnboardingIncomplete {
                feature: feature.to_string(),
                stage,
            })
        }
    }

    /// Wait for the next stage change.
    pub async fn changed(&mut self) -> Option<OnboardingStage> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

/// Result of a successful profile save.
#[derive(Debug, Clone)]
pub struct ProfileSaveOutcome {
    pub profile: CompanyProfile,
    pub stage: OnboardingStage,
    /// Indexing advisory; informational only.
    pub advisory: Option<String>,
}

struct GateState {
    snapshot: Option<OnboardingSnapshot>,
    draft: ProfileDraft,
    advisory: Option<String>,
    /// Generation of the snapshot currently applied.
    applied_generation: u64,
}

pub struct OnboardingGate {
    backend: Arc<dyn Backend>,
    user: UserIdentity,
    stage_tx: watch::Sender<OnboardingStage>,
    state: RwLock<GateState>,
    next_generation: AtomicU64,
}

impl OnboardingGate {
    pub fn new(backend: Arc<dyn Backend>, user: UserIdentity) -> Self {
        let (stage_tx, _rx) = watch::channel(OnboardingStage::NotStarted);
        Self {
            backend,
            user,
            stage_tx,
            state: RwLock::new(GateState {
                snapshot: None,
                draft: ProfileDraft::default(),
                advisory: None,
                applied_generation: 0,
            }),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn stage(&self) -> OnboardingStage {
        *self.stage_tx.borrow()
    }

    pub fn handle(&self) -> GateHandle {
        GateHandle {
            rx: self.stage_tx.subscribe(),
        }
    }

    /// Last indexing advisory from a profile save.
    pub async fn advisory(&self) -> Option<String> {
        self.state.read().await.advisory.clone()
    }

    /// Last saved profile, as seen in the most recent snapshot or save.
    pub async fn saved_profile(&self) -> Option<CompanyProfile> {
        self.state
            .read()
            .await
            .snapshot
            .as_ref()
            .and_then(|s| s.profile.clone())
    }

    pub async fn draft(&self) -> ProfileDraft {
        self.state.read().await.draft.clone()
    }

    /// Edit the draft. Never touches the saved snapshot.
    pub async fn edit_draft<R>(&self, edit: impl FnOnce(&mut ProfileDraft) -> R) -> R {
        edit(&mut self.state.write().await.draft)
    }

    /// Fetch the backend snapshot and re-derive the stage.
    ///
    /// A response older than one already applied is discarded.
    pub async fn refresh(&self) -> Result<OnboardingStage, Error> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.backend.onboarding_snapshot(&self.user).await?;

        let mut state = self.state.write().await;
        if generation < state.applied_generation {
            warn!(generation, applied = state.applied_generation, "Discarding stale onboarding snapshot");
            return Ok(self.stage());
        }
        state.applied_generation = generation;

        // Re-mirror the draft only when the user has no unsaved edits.
        let dirty = state
            .draft
            .is_dirty(state.snapshot.as_ref().and_then(|s| s.profile.as_ref()));
        if !dirty && let Some(profile) = &snapshot.profile {
            state.draft = ProfileDraft::from_profile(profile);
        }

        let derived = OnboardingStage::from_snapshot(&snapshot);
        state.snapshot = Some(snapshot);
        drop(state);

        self.apply_derived(derived);
        Ok(derived)
    }

    /// Validate the draft and save it. Validation failures issue no call and
    /// leave the stage unchanged.
    pub async fn save_profile(&self) -> Result<ProfileSaveOutcome, Error> {
        let profile = self.state.read().await.draft.to_profile()?;

        let response = self.backend.save_profile(&self.user, &profile).await?;
        let advisory = indexing_advisory(response.indexing_status, response.indexing_reason.as_deref());
        info!(
            user_id = %self.user,
            indexing = ?response.indexing_status,
            "Company profile saved"
        );

        {
            let mut state = self.state.write().await;
            let snapshot = state.snapshot.get_or_insert_with(OnboardingSnapshot::default);
            snapshot.profile = Some(response.profile.clone());
            state.draft = ProfileDraft::from_profile(&response.profile);
            state.advisory = advisory.clone();
        }

        // Advance on save success alone, regardless of indexing status.
        if self.stage() < OnboardingStage::ProfileSaved {
            if self.stage() == OnboardingStage::NotStarted {
                self.transition(OnboardingStage::ProfilePending);
            }
            self.transition(OnboardingStage::ProfileSaved);
        }

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Snapshot refresh after profile save failed");
        }

        Ok(ProfileSaveOutcome {
            profile: response.profile,
            stage: self.stage(),
            advisory,
        })
    }

    /// Confirm the integration, then re-derive the stage from a fresh
    /// snapshot rather than flipping it locally.
    pub async fn confirm_integration(&self) -> Result<OnboardingStage, Error> {
        let stage = self.stage();
        if !stage.profile_saved() {
            return Err(GatingError::OnboardingIncomplete {
                feature: "integration".into(),
                stage,
            }
            .into());
        }

        self.backend.confirm_integration(&self.user).await?;
        info!(user_id = %self.user, "Integration confirmed");
        self.refresh().await
    }

    fn transition(&self, target: OnboardingStage) -> bool {
        let current = self.stage();
        if !current.can_transition_to(target) {
            warn!(from = %current, to = %target, "Rejected onboarding transition");
            return false;
        }
        self.stage_tx.send_replace(target);
        info!(from = %current, to = %target, "Onboarding stage changed");
        true
    }

    /// Apply a snapshot-derived stage. Follows the backend even when it
    /// regresses, but logs the regression.
    fn apply_derived(&self, derived: OnboardingStage) {
        let current = self.stage();
        if derived == current {
            return;
        }
        if derived < current {
            warn!(from = %current, to = %derived, "Backend onboarding snapshot regressed");
        }
        self.stage_tx.send_replace(derived);
        info!(from = %current, to = %derived, "Onboarding stage derived from snapshot");
    }
}
