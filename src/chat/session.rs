//! ChatSession — ordered conversation turns plus the active plan.
//!
//! Turn protocol: the user's message is appended immediately and never rolled
//! back; the assistant reply (or a system-role error) is appended when the
//! call resolves. Every response is checked against the session epoch and
//! turn/plan it was issued for before it is applied, so a late response can
//! never resurrect superseded state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::message::ChatMessage;
use super::plan::{Plan, PlanLifecycle, PlanPhase, PlanTransition};
use crate::backend::{Backend, ChatRequest, ChatResponse, Decision, ExecuteRequest};
use crate::error::{Error, SessionError, ValidationError};
use crate::identity::UserIdentity;
use crate::knowledge::model::SearchHit;
use crate::onboarding::GateHandle;

/// Default broadcast channel capacity.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Chat turn phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatPhase {
    Idle,
    Sending,
    AwaitingReply,
}

impl std::fmt::Display for ChatPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::AwaitingReply => "awaiting_reply",
        };
        write!(f, "{s}")
    }
}

/// Events observed by the view layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MessageAppended { index: usize, message: ChatMessage },
    PhaseChanged { phase: ChatPhase },
    PlanChanged(PlanTransition),
}

/// Outcome of a chat turn or plan execution that got past pre-flight checks.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Assistant reply appended; `plan` is the plan now awaiting confirmation.
    Replied {
        reply: ChatMessage,
        plan: Option<Plan>,
    },
    /// The call failed; a system-role message carrying the error was appended.
    Failed { message: String },
    /// The response arrived after the session moved on and was dropped.
    Discarded,
}

struct SessionState {
    messages: Vec<ChatMessage>,
    phase: ChatPhase,
    plan: PlanLifecycle,
    /// Bumped on reset; responses from an older epoch are discarded.
    epoch: u64,
    /// Bumped on every send.
    turn: u64,
    last_hits: Vec<SearchHit>,
    last_decision: Option<Decision>,
}

pub struct ChatSession {
    backend: Arc<dyn Backend>,
    user: UserIdentity,
    gate: GateHandle,
    source_tag: String,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl ChatSession {
    pub fn new(
        backend: Arc<dyn Backend>,
        user: UserIdentity,
        gate: GateHandle,
        source_tag: impl Into<String>,
        greeting: impl Into<String>,
    ) -> Self {
        let (events, _rx) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            backend,
            user,
            gate,
            source_tag: source_tag.into(),
            state: Mutex::new(SessionState {
                messages: vec![ChatMessage::system(greeting)],
                phase: ChatPhase::Idle,
                plan: PlanLifecycle::default(),
                epoch: 0,
                turn: 0,
                last_hits: Vec::new(),
                last_decision: None,
            }),
            events,
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().await.messages.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    pub async fn phase(&self) -> ChatPhase {
        self.state.lock().await.phase
    }

    pub async fn plan_phase(&self) -> PlanPhase {
        self.state.lock().await.plan.phase()
    }

    /// The plan currently awaiting confirmation (or being executed).
    pub async fn active_plan(&self) -> Option<Plan> {
        self.state.lock().await.plan.active().cloned()
    }

    /// Knowledge hits cited by the last reply.
    pub async fn last_hits(&self) -> Vec<SearchHit> {
        self.state.lock().await.last_hits.clone()
    }

    pub async fn last_decision(&self) -> Option<Decision> {
        self.state.lock().await.last_decision.clone()
    }

    /// Send a user message and wait for the turn to resolve.
    ///
    /// Refused before any call when the text is blank, onboarding is
    /// incomplete, a turn is in flight, or a plan is being executed.
    pub async fn send(&self, content: &str) -> Result<TurnOutcome, Error> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyField("message".into()).into());
        }
        self.gate.ensure_complete("chat")?;

        let (epoch, turn) = {
            let mut state = self.state.lock().await;
            if state.phase != ChatPhase::Idle || state.plan.phase() == PlanPhase::Confirming {
                return Err(SessionError::Busy.into());
            }
            state.turn += 1;
            self.set_phase(&mut state, ChatPhase::Sending);
            self.append(&mut state, ChatMessage::user(content));
            // The user moved on instead of confirming.
            if let Some(t) = state.plan.dismiss() {
                self.emit_plan(t);
            }
            (state.epoch, state.turn)
        };

        let request = ChatRequest {
            user_id: self.user.clone(),
            content: content.to_string(),
            metadata: serde_json::json!({ "source": self.source_tag }),
        };
        {
            let mut state = self.state.lock().await;
            if state.epoch == epoch && state.turn == turn {
                self.set_phase(&mut state, ChatPhase::AwaitingReply);
            }
        }
        debug!(user_id = %self.user, turn, "Chat turn issued");
        let result = self.backend.send_message(&request).await;

        let mut state = self.state.lock().await;
        if state.epoch != epoch || state.turn != turn {
            warn!(turn, epoch, current_epoch = state.epoch, "Discarding stale chat reply");
            return Ok(TurnOutcome::Discarded);
        }
        self.set_phase(&mut state, ChatPhase::Idle);

        match result {
            Ok(response) => Ok(self.apply_reply(&mut state, response)),
            Err(e) => {
                warn!(user_id = %self.user, error = %e, "Chat turn failed");
                let message = format!("Error: {e}");
                self.append(&mut state, ChatMessage::system(&message));
                Ok(TurnOutcome::Failed { message })
            }
        }
    }

    /// Confirm and execute the active plan.
    ///
    /// Rejected when `plan_id` is not the active proposal (for instance after
    /// a newer proposal superseded it) or while a chat turn is in flight.
    pub async fn confirm_plan(&self, plan_id: &str) -> Result<TurnOutcome, Error> {
        let (epoch, plan) = {
            let mut state = self.state.lock().await;
            if state.phase != ChatPhase::Idle {
                return Err(SessionError::Busy.into());
            }
            let (t, plan) = state.plan.begin_confirm(plan_id)?;
            self.emit_plan(t);
            (state.epoch, plan)
        };

        info!(user_id = %self.user, plan_id = %plan.plan_id, "Executing plan");
        let request = ExecuteRequest {
            plan_id: plan.plan_id.clone(),
            user_id: self.user.clone(),
        };
        let result = self.backend.execute_plan(&request).await;

        let mut state = self.state.lock().await;
        if state.epoch != epoch || !state.plan.is_confirming(&plan.plan_id) {
            warn!(plan_id = %plan.plan_id, "Discarding stale plan execution result");
            return Ok(TurnOutcome::Discarded);
        }

        match result {
            Ok(response) => {
                let t = state.plan.complete(&plan.plan_id)?;
                self.emit_plan(t);
                state.last_hits = response.knowledge_hits;
                let reply = response.reply;
                self.append(&mut state, reply.clone());
                Ok(TurnOutcome::Replied { reply, plan: None })
            }
            Err(e) => {
                warn!(plan_id = %plan.plan_id, error = %e, "Plan execution failed");
                let t = state.plan.fail(&plan.plan_id)?;
                self.emit_plan(t);
                let message = format!("Calculation failed: {e}");
                self.append(&mut state, ChatMessage::system(&message));
                Ok(TurnOutcome::Failed { message })
            }
        }
    }

    /// Confirm whichever plan is currently proposed.
    pub async fn confirm_active(&self) -> Result<TurnOutcome, Error> {
        let plan_id = self
            .active_plan()
            .await
            .map(|p| p.plan_id)
            .ok_or(SessionError::NoActivePlan)?;
        self.confirm_plan(&plan_id).await
    }

    /// Start a new, unrelated conversation context.
    ///
    /// History stays append-only: a system marker is appended rather than
    /// removing earlier turns. Any in-flight reply or execution is discarded
    /// when it arrives.
    pub async fn reset(&self) -> Result<(), Error> {
        {
            let mut state = self.state.lock().await;
            state.epoch += 1;
            if let Some(t) = state.plan.dismiss() {
                self.emit_plan(t);
            }
            if state.phase != ChatPhase::Idle {
                self.set_phase(&mut state, ChatPhase::Idle);
            }
            state.last_hits.clear();
            state.last_decision = None;
            self.append(&mut state, ChatMessage::system("Conversation context was reset."));
            info!(user_id = %self.user, epoch = state.epoch, "Chat context reset");
        }

        if let Err(e) = self.backend.reset_context(&self.user).await {
            warn!(error = %e, "Backend context reset failed");
            let mut state = self.state.lock().await;
            self.append(&mut state, ChatMessage::system(format!("Error: {e}")));
            return Err(e.into());
        }
        Ok(())
    }

    fn apply_reply(&self, state: &mut SessionState, response: ChatResponse) -> TurnOutcome {
        let reply = response.reply;
        state.last_hits = response.knowledge_hits;
        state.last_decision = response.decision;

        let plan = match reply.plan_id() {
            Some(plan_id) => match state.plan.propose(plan_id, reply.followups()) {
                Ok(t) => {
                    info!(plan_id = %plan_id, "Plan proposed");
                    self.emit_plan(t);
                    state.plan.active().cloned()
                }
                Err(e) => {
                    warn!(error = %e, "Could not install proposed plan");
                    None
                }
            },
            None => {
                if let Some(t) = state.plan.dismiss() {
                    self.emit_plan(t);
                }
                None
            }
        };

        self.append(state, reply.clone());
        TurnOutcome::Replied { reply, plan }
    }

    fn append(&self, state: &mut SessionState, message: ChatMessage) {
        let index = state.messages.len();
        state.messages.push(message.clone());
        let _ = self.events.send(SessionEvent::MessageAppended { index, message });
    }

    fn set_phase(&self, state: &mut SessionState, phase: ChatPhase) {
        state.phase = phase;
        let _ = self.events.send(SessionEvent::PhaseChanged { phase });
    }

    fn emit_plan(&self, transition: PlanTransition) {
        let _ = self.events.send(SessionEvent::PlanChanged(transition));
    }
}
