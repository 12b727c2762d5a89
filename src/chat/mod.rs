//! Chat — ordered conversation turns and the plan lifecycle they drive.

pub mod message;
pub mod plan;
pub mod session;

pub use message::{ChatMessage, Role};
pub use plan::{Plan, PlanLifecycle, PlanPhase, PlanStatus, PlanTransition};
pub use session::{ChatPhase, ChatSession, SessionEvent, TurnOutcome};
