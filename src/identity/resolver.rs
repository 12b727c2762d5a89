//! IdentityResolver — picks the session identity, first match wins:
//! navigation parameter, host platform, persisted value, fresh token.

use std::sync::Arc;

use super::navigation::NavigationParams;
use super::store::IdentityStore;
use super::UserIdentity;

/// Identity supplied by an embedding host (e.g. a messenger web-app shell).
pub trait HostPlatform: Send + Sync {
    fn user_id(&self) -> Option<String>;
}

/// No embedding host.
pub struct NoHost;

impl HostPlatform for NoHost {
    fn user_id(&self) -> Option<String> {
        None
    }
}

/// Host that reports a fixed identity.
pub struct StaticHost(pub Option<String>);

impl HostPlatform for StaticHost {
    fn user_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Where the resolved identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Navigation,
    Host,
    Persisted,
    Generated,
}

impl std::fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Navigation => "navigation",
            Self::Host => "host",
            Self::Persisted => "persisted",
            Self::Generated => "generated",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub identity: UserIdentity,
    pub source: IdentitySource,
}

/// Resolves the session identity. Called once per session start.
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
    host: Arc<dyn HostPlatform>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>, host: Arc<dyn HostPlatform>) -> Self {
        Self { store, host }
    }

    /// Resolve the identity. Never fails: storage problems are logged and
    /// resolution falls through to the next source.
    pub async fn resolve(&self, nav: &NavigationParams) -> ResolvedIdentity {
        if let Some(explicit) = non_blank(nav.user_id.as_deref()) {
            if let Err(e) = self.store.save(explicit).await {
                tracing::warn!(error = %e, "Failed to persist navigation identity");
            }
            return self.resolved(explicit, IdentitySource::Navigation);
        }

        if let Some(host_id) = self.host.user_id()
            && let Some(host_id) = non_blank(Some(&host_id))
        {
            return self.resolved(host_id, IdentitySource::Host);
        }

        match self.store.load().await {
            Ok(Some(persisted)) if !persisted.trim().is_empty() => {
                return self.resolved(persisted.trim(), IdentitySource::Persisted);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Could not read persisted identity"),
        }

        let generated = UserIdentity::generate();
        if let Err(e) = self.store.save(generated.as_str()).await {
            tracing::warn!(error = %e, "Failed to persist generated identity");
        }
        self.resolved(generated.as_str(), IdentitySource::Generated)
    }

    fn resolved(&self, value: &str, source: IdentitySource) -> ResolvedIdentity {
        tracing::info!(user_id = %value, source = %source, "Resolved session identity");
        ResolvedIdentity {
            identity: UserIdentity::new(value),
            source,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
