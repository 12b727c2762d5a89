//! Pilot client — orchestration core for the business assistant.
//!
//! Gates features on onboarding, tracks assistant-proposed plans from
//! proposal to execution, and keeps documents, search and chat consistent
//! while their backend calls complete independently.

pub mod app;
pub mod backend;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod knowledge;
pub mod onboarding;
pub mod view;

pub use app::{AppDeps, PilotApp};
pub use error::{Error, Result};
