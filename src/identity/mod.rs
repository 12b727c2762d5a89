//! Session identity — the opaque per-session user token used on every
//! backend call.
//!
//! Resolved exactly once at session start and read-only afterwards.

pub mod navigation;
pub mod resolver;
pub mod store;

pub use navigation::{NavigationMode, NavigationParams};
pub use resolver::{HostPlatform, IdentityResolver, IdentitySource, NoHost, ResolvedIdentity, StaticHost};
pub use store::{FileIdentityStore, IdentityStore, MemoryIdentityStore, IDENTITY_KEY};

use serde::{Deserialize, Serialize};

/// Opaque user identifier, immutable once established for the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIdentity(String);

impl UserIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a fresh random token.
    pub fn generate() -> Self {
        Self(format!("web-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
