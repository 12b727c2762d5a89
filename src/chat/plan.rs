//! PlanLifecycle — assistant-proposed calculation plans awaiting confirmation.
//!
//! At most one plan is active (`Proposed` or `Confirming`) at a time; a newer
//! proposal always supersedes an older unconfirmed one.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Status of a plan as seen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Proposed,
    Confirmed,
    Executed,
    Dismissed,
}

/// An identifiable calculation awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub followups: Vec<String>,
    pub status: PlanStatus,
}

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanPhase {
    None,
    Proposed,
    Confirming,
    Executed,
    Dismissed,
}

impl PlanPhase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: PlanPhase) -> bool {
        use PlanPhase::*;
        matches!(
            (self, target),
            (None, Proposed)
                | (Proposed, Proposed)
                | (Proposed, Confirming)
                | (Proposed, Dismissed)
                | (Confirming, Proposed)
                | (Confirming, Executed)
                | (Confirming, Dismissed)
                | (Executed, Proposed)
                | (Dismissed, Proposed)
        )
    }

    /// Whether a plan is held in this phase.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Proposed | Self::Confirming)
    }
}

impl std::fmt::Display for PlanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Proposed => "proposed",
            Self::Confirming => "confirming",
            Self::Executed => "executed",
            Self::Dismissed => "dismissed",
        };
        write!(f, "{s}")
    }
}

/// A recorded phase change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTransition {
    pub from: PlanPhase,
    pub to: PlanPhase,
    pub plan_id: Option<String>,
}

/// The single-active-plan state machine owned by a chat session.
#[derive(Debug, Clone)]
pub struct PlanLifecycle {
    phase: PlanPhase,
    plan: Option<Plan>,
}

impl Default for PlanLifecycle {
    fn default() -> Self {
        Self {
            phase: PlanPhase::None,
            plan: None,
        }
    }
}

impl PlanLifecycle {
    pub fn phase(&self) -> PlanPhase {
        self.phase
    }

    /// The active plan, if one is `Proposed` or `Confirming`.
    pub fn active(&self) -> Option<&Plan> {
        self.plan.as_ref().filter(|_| self.phase.is_active())
    }

    /// Whether `plan_id` is the plan currently being executed.
    pub fn is_confirming(&self, plan_id: &str) -> bool {
        self.phase == PlanPhase::Confirming && self.active().is_some_and(|p| p.plan_id == plan_id)
    }

    /// Install a new proposal, superseding any active plan.
    pub fn propose(
        &mut self,
        plan_id: impl Into<String>,
        followups: Vec<String>,
    ) -> Result<PlanTransition, SessionError> {
        let plan = Plan {
            plan_id: plan_id.into(),
            followups,
            status: PlanStatus::Proposed,
        };
        if let Some(old) = self.active() {
            tracing::info!(superseded = %old.plan_id, by = %plan.plan_id, "Plan superseded");
        }
        let plan_id = plan.plan_id.clone();
        let from = self.phase;
        self.transition(PlanPhase::Proposed, Some(plan))?;
        Ok(PlanTransition {
            from,
            to: PlanPhase::Proposed,
            plan_id: Some(plan_id),
        })
    }

    /// Move the active plan to `Confirming`. Rejected when `plan_id` is not
    /// the currently proposed plan.
    pub fn begin_confirm(&mut self, plan_id: &str) -> Result<(PlanTransition, Plan), SessionError> {
        let Some(active) = self.active() else {
            return Err(SessionError::NoActivePlan);
        };
        if active.plan_id != plan_id {
            return Err(SessionError::PlanSuperseded {
                requested: plan_id.to_string(),
            });
        }
        if self.phase != PlanPhase::Proposed {
            return Err(self.invalid(PlanPhase::Confirming));
        }

        let mut plan = active.clone();
        plan.status = PlanStatus::Confirmed;
        let from = self.phase;
        self.transition(PlanPhase::Confirming, Some(plan.clone()))?;
        Ok((
            PlanTransition {
                from,
                to: PlanPhase::Confirming,
                plan_id: Some(plan.plan_id.clone()),
            },
            plan,
        ))
    }

    /// Execution of `plan_id` succeeded; the plan is cleared.
    pub fn complete(&mut self, plan_id: &str) -> Result<PlanTransition, SessionError> {
        self.finish(plan_id, PlanPhase::Executed)
    }

    /// Execution of `plan_id` failed; the plan is cleared without retry.
    pub fn fail(&mut self, plan_id: &str) -> Result<PlanTransition, SessionError> {
        self.finish(plan_id, PlanPhase::Dismissed)
    }

    /// Dismiss the active plan, if any.
    pub fn dismiss(&mut self) -> Option<PlanTransition> {
        let plan_id = self.active()?.plan_id.clone();
        let from = self.phase;
        self.transition(PlanPhase::Dismissed, None).ok()?;
        Some(PlanTransition {
            from,
            to: PlanPhase::Dismissed,
            plan_id: Some(plan_id),
        })
    }

    fn finish(&mut self, plan_id: &str, target: PlanPhase) -> Result<PlanTransition, SessionError> {
        if !self.is_confirming(plan_id) {
            return Err(SessionError::PlanSuperseded {
                requested: plan_id.to_string(),
            });
        }
        let from = self.phase;
        self.transition(target, None)?;
        Ok(PlanTransition {
            from,
            to: target,
            plan_id: Some(plan_id.to_string()),
        })
    }

    fn transition(&mut self, target: PlanPhase, plan: Option<Plan>) -> Result<(), SessionError> {
        if !self.phase.can_transition_to(target) {
            return Err(self.invalid(target));
        }
        self.phase = target;
        self.plan = plan;
        Ok(())
    }

    fn invalid(&self, target: PlanPhase) -> SessionError {
        SessionError::InvalidTransition {
            from: self.phase.to_string(),
            to: target.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn followups() -> Vec<String> {
        vec!["Which quarter?".to_string(), "Include VAT?".to_string()]
    }

    #[test]
    fn valid_transitions() {
        use PlanPhase::*;
        for (from, to) in [
            (None, Proposed),
            (Proposed, Confirming),
            (Confirming, Executed),
            (Confirming, Dismissed),
            (Proposed, Dismissed),
            (Executed, Proposed),
        ] {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        use PlanPhase::*;
        assert!(!None.can_transition_to(Confirming));
        assert!(!None.can_transition_to(Executed));
        assert!(!Proposed.can_transition_to(Executed));
        assert!(!Executed.can_transition_to(Confirming));
        assert!(!Dismissed.can_transition_to(Executed));
    }

    #[test]
    fn propose_keeps_followup_order() {
        let mut lifecycle = PlanLifecycle::default();
        let t = lifecycle.propose("p1", followups()).unwrap();
        assert_eq!(t.from, PlanPhase::None);
        assert_eq!(t.to, PlanPhase::Proposed);

        let plan = lifecycle.active().unwrap();
        assert_eq!(plan.plan_id, "p1");
        assert_eq!(plan.followups, followups());
        assert_eq!(plan.status, PlanStatus::Proposed);
    }

    #[test]
    fn newer_proposal_supersedes_and_old_cannot_be_confirmed() {
        let mut lifecycle = PlanLifecycle::default();
        lifecycle.propose("p1", vec![]).unwrap();
        lifecycle.propose("p2", vec![]).unwrap();

        assert_eq!(
            lifecycle.begin_confirm("p1").unwrap_err(),
            SessionError::PlanSuperseded {
                requested: "p1".into()
            }
        );
        let (t, plan) = lifecycle.begin_confirm("p2").unwrap();
        assert_eq!(t.to, PlanPhase::Confirming);
        assert_eq!(plan.status, PlanStatus::Confirmed);
    }

    #[test]
    fn proposal_during_confirmation_makes_old_result_stale() {
        let mut lifecycle = PlanLifecycle::default();
        lifecycle.propose("p1", vec![]).unwrap();
        lifecycle.begin_confirm("p1").unwrap();
        lifecycle.propose("p2", vec![]).unwrap();

        assert!(lifecycle.complete("p1").is_err());
        assert_eq!(lifecycle.phase(), PlanPhase::Proposed);
        assert_eq!(lifecycle.active().unwrap().plan_id, "p2");
    }

    #[test]
    fn complete_and_fail_clear_the_plan() {
        let mut lifecycle = PlanLifecycle::default();
        lifecycle.propose("p1", vec![]).unwrap();
        lifecycle.begin_confirm("p1").unwrap();
        lifecycle.complete("p1").unwrap();
        assert_eq!(lifecycle.phase(), PlanPhase::Executed);
        assert!(lifecycle.active().is_none());

        lifecycle.propose("p2", vec![]).unwrap();
        lifecycle.begin_confirm("p2").unwrap();
        lifecycle.fail("p2").unwrap();
        assert_eq!(lifecycle.phase(), PlanPhase::Dismissed);
        assert!(lifecycle.active().is_none());
        // No retry in place.
        assert_eq!(lifecycle.begin_confirm("p2").unwrap_err(), SessionError::NoActivePlan);
    }

    #[test]
    fn double_confirm_is_rejected() {
        let mut lifecycle = PlanLifecycle::default();
        lifecycle.propose("p1", vec![]).unwrap();
        lifecycle.begin_confirm("p1").unwrap();
        assert!(matches!(
            lifecycle.begin_confirm("p1"),
            Err(SessionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn dismiss_only_affects_active_plan() {
        let mut lifecycle = PlanLifecycle::default();
        assert!(lifecycle.dismiss().is_none());
        assert_eq!(lifecycle.phase(), PlanPhase::None);

        lifecycle.propose("p1", vec![]).unwrap();
        let t = lifecycle.dismiss().unwrap();
        assert_eq!(t.plan_id.as_deref(), Some("p1"));
        assert_eq!(lifecycle.phase(), PlanPhase::Dismissed);
        assert!(lifecycle.dismiss().is_none());
    }

    #[test]
    fn dismiss_during_confirmation_follows_the_table() {
        let mut lifecycle = PlanLifecycle::default();
        lifecycle.propose("p1", vec![]).unwrap();
        lifecycle.begin_confirm("p1").unwrap();

        let t = lifecycle.dismiss().unwrap();
        assert_eq!(t.from, PlanPhase::Confirming);
        assert_eq!(t.to, PlanPhase::Dismissed);
        assert!(t.from.can_transition_to(t.to));
        assert!(!lifecycle.is_confirming("p1"));
        assert!(lifecycle.active().is_none());
    }
}
