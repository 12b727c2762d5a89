//! Navigation parameters supplied on each load (query string of the entry URL).

use reqwest::Url;

/// Screen explicitly requested by the entry link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    Profile,
    Integration,
}

/// Parameters parsed from the navigation URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationParams {
    /// Explicit identity; overrides any persisted value.
    pub user_id: Option<String>,
    /// Requested onboarding screen (`?mode=integration`).
    pub mode: Option<NavigationMode>,
}

impl NavigationParams {
    /// Parse parameters from a full URL or a bare query string (`?user_id=42`).
    /// Unparseable input yields empty parameters.
    pub fn from_url(raw: &str) -> Self {
        let url = Url::parse(raw).or_else(|_| {
            Url::parse("http://localhost/").and_then(|base| base.join(raw))
        });
        let url = match url {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unparseable navigation URL");
                return Self::default();
            }
        };

        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "user_id" | "userId" => params.user_id = Some(value.to_string()),
                "mode" => {
                    params.mode = match value {
                        "integration" => Some(NavigationMode::Integration),
                        "profile" => Some(NavigationMode::Profile),
                        _ => None,
                    }
                }
                _ => {}
            }
        }
        params
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}
