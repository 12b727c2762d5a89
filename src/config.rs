//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Greeting shown as the first entry of every conversation.
pub const DEFAULT_GREETING: &str = "Hello! I am your business assistant. Ask me about your \
     company, your documents, or request a calculation and I will prepare a plan for you.";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL including the API prefix, e.g. `http://localhost:8000/api`.
    pub api_base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// File holding the persisted identity slot.
    pub identity_path: PathBuf,
    /// Tag sent in chat metadata to identify this client surface.
    pub source_tag: String,
    /// System greeting that opens every conversation.
    pub greeting: String,
    /// Navigation URL whose query may carry `user_id` and `mode`.
    pub navigation_url: Option<String>,
    /// Identity supplied by an embedding host.
    pub host_user_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            request_timeout: Duration::from_secs(30),
            identity_path: default_identity_path(),
            source_tag: "web_app".to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            navigation_url: None,
            host_user_id: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from `PILOT_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = get("PILOT_API_BASE_URL") {
            let url = url.trim().trim_end_matches('/').to_string();
            if reqwest::Url::parse(&url).is_err() {
                return Err(ConfigError::InvalidValue {
                    key: "PILOT_API_BASE_URL".into(),
                    message: format!("not a valid URL: {url}"),
                });
            }
            config.api_base_url = url;
        }

        if let Some(secs) = get("PILOT_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "PILOT_REQUEST_TIMEOUT_SECS".into(),
                message: format!("expected whole seconds, got {secs:?}"),
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(path) = get("PILOT_IDENTITY_PATH") {
            config.identity_path = PathBuf::from(path);
        }
        if let Some(tag) = get("PILOT_SOURCE_TAG").filter(|t| !t.trim().is_empty()) {
            config.source_tag = tag;
        }
        if let Some(greeting) = get("PILOT_GREETING").filter(|g| !g.trim().is_empty()) {
            config.greeting = greeting;
        }
        config.navigation_url = get("PILOT_NAV_URL").filter(|u| !u.trim().is_empty());
        config.host_user_id = get("PILOT_HOST_USER_ID").filter(|u| !u.trim().is_empty());

        Ok(config)
    }
}

fn default_identity_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".pilot-client/identity.json")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8000/api");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.source_tag, "web_app");
        assert!(config.navigation_url.is_none());
    }

    #[test]
    fn overrides_and_trims_base_url() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("PILOT_API_BASE_URL", "https://pilot.example.com/api/"),
            ("PILOT_REQUEST_TIMEOUT_SECS", "5"),
            ("PILOT_NAV_URL", "https://app.example.com/?user_id=42"),
        ]))
        .unwrap();
        assert_eq!(config.api_base_url, "https://pilot.example.com/api");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(
            config.navigation_url.as_deref(),
            Some("https://app.example.com/?user_id=42")
        );
    }

    #[test]
    fn rejects_bad_timeout() {
        let err = ClientConfig::from_lookup(lookup(&[("PILOT_REQUEST_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("PILOT_REQUEST_TIMEOUT_SECS"));
    }

    #[test]
    fn rejects_bad_url() {
        assert!(ClientConfig::from_lookup(lookup(&[("PILOT_API_BASE_URL", "not a url")])).is_err());
    }
}
