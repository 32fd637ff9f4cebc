//! Client configuration.
//!
//! Defaults match the backend the client was built against; every field can
//! be overridden from the environment via [`ClientConfig::from_env`].

use std::time::Duration;

use thiserror::Error;

/// Default API base URL when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Default request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Route the user is sent to when the session expires.
pub const LOGIN_URL: &str = "/login";

/// Header carrying the auth token on every request.
pub const TOKEN_HEADER: &str = "x-access-token";

/// Identifier the session state is persisted under.
pub const STORE_ID: &str = "userStore";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for [`ApiClient`](crate::api::client::ApiClient).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL request paths are joined onto (no trailing slash).
    pub base_url: String,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Keep and resend cookies across requests.
    pub with_credentials: bool,
    /// Login route used on session expiry.
    pub login_url: String,
    /// Name of the token header.
    pub token_header: String,
    /// Persistence key for the session store.
    pub store_id: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            with_credentials: true,
            login_url: LOGIN_URL.to_string(),
            token_header: TOKEN_HEADER.to_string(),
            store_id: STORE_ID.to_string(),
        }
    }
}

impl ClientConfig {
    /// Defaults with the given base URL.
    pub fn new(base_url: &str) -> Self {
        Self::default().with_base_url(base_url)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_login_url(mut self, login_url: &str) -> Self {
        self.login_url = login_url.to_string();
        self
    }

    /// Build a config from the process environment.
    ///
    /// Base URL: `SESSION_API_URL` > `VITE_API_URL` > default.
    /// Also reads `SESSION_API_TIMEOUT_MS`, `SESSION_API_WITH_CREDENTIALS`
    /// and `SESSION_LOGIN_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("SESSION_API_URL").or_else(|| lookup("VITE_API_URL")) {
            config = config.with_base_url(&url);
        }

        if let Some(raw) = lookup("SESSION_API_TIMEOUT_MS") {
            let ms: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    key: "SESSION_API_TIMEOUT_MS",
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
            config.timeout = Duration::from_millis(ms);
        }

        if let Some(raw) = lookup("SESSION_API_WITH_CREDENTIALS") {
            config.with_credentials = parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: "SESSION_API_WITH_CREDENTIALS",
                value: raw.clone(),
                reason: "expected true/false".to_string(),
            })?;
        }

        if let Some(login_url) = lookup("SESSION_LOGIN_URL") {
            config.login_url = login_url;
        }

        Ok(config)
    }

    /// Resolve a request path against the base URL.
    ///
    /// Absolute `http(s)://` URLs are returned unchanged.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            format!("{}/{}", self.base_url, url)
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
