//! Onboarding — the mandatory two-step sequence (company profile save,
//! integration confirmation) that gates chat and document upload.
//!
//! `OnboardingGate` owns the state; features receive a `GateHandle` and
//! check it synchronously before issuing any call.

pub mod gate;
pub mod model;
pub mod state;

pub use gate::{GateHandle, OnboardingGate, ProfileSaveOutcome};
pub use model::{
    CompanyProfile, IndexingStatus, IntegrationRecord, OnboardingSnapshot, ProfileDraft,
    indexing_advisory,
};
pub use state::OnboardingStage;
