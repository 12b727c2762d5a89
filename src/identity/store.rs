//! Durable key-value slot for the persisted identity.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::IdentityError;

/// Well-known key the identity is stored under.
pub const IDENTITY_KEY: &str = "pilot_user_id";

/// Local durable storage for the identity slot.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Load the previously persisted identity, if any.
    async fn load(&self) -> Result<Option<String>, IdentityError>;

    /// Persist an identity, replacing any previous value.
    async fn save(&self, identity: &str) -> Result<(), IdentityError>;
}

/// JSON settings file holding `{ "pilot_user_id": "..." }`.
///
/// Other keys in the file are preserved on save.
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<BTreeMap<String, String>, IdentityError> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    async fn load(&self) -> Result<Option<String>, IdentityError> {
        let map = self.read_map().await?;
        Ok(map
            .get(IDENTITY_KEY)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    async fn save(&self, identity: &str) -> Result<(), IdentityError> {
        // A corrupt file is replaced rather than blocking persistence.
        let mut map = self.read_map().await.unwrap_or_default();
        map.insert(IDENTITY_KEY.to_string(), identity.to_string());

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&map)?;
        fs::write(&self.path, json).await?;
        tracing::debug!(path = %self.path.display(), "Persisted identity");
        Ok(())
    }
}

/// In-memory slot, used for tests and hosts without local storage.
#[derive(Default)]
pub struct MemoryIdentityStore {
    value: Mutex<Option<String>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn load(&self) -> Result<Option<String>, IdentityError> {
        Ok(self.value.lock().await.clone())
    }

    async fn save(&self, identity: &str) -> Result<(), IdentityError> {
        *self.value.lock().await = Some(identity.to_string());
        Ok(())
    }
}
