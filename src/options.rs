//! Client configuration: backend location, transport settings and credentials.

use std::collections::HashMap;
use std::time::Duration;

use crate::client::ClientError;

/// Base URL used when nothing else is configured (the Django dev server).
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/mai_chat/api/chat";

pub const ENV_BASE_URL: &str = "MAICHAT_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "MAICHAT_TIMEOUT_SECS";
pub const ENV_PROXY: &str = "MAICHAT_PROXY";
pub const ENV_AUTH_TOKEN: &str = "MAICHAT_AUTH_TOKEN";

/// A secret string type for sensitive data like auth tokens.
/// Prevents accidental logging or display of secrets.
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Options for reaching the chat backend.
///
/// # Example
/// ```rust
/// use maichat::options::ClientOptions;
/// use std::time::Duration;
///
/// let options = ClientOptions::new("http://localhost:8000/mai_chat/api/chat/")
///     .with_timeout(Duration::from_secs(30));
///
/// assert_eq!(options.base_url, "http://localhost:8000/mai_chat/api/chat");
/// ```
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Prefix every endpoint path is appended to, without a trailing slash
    pub base_url: String,

    /// Whole-request timeout. Applies to streaming bodies as well.
    pub timeout: Option<Duration>,

    /// Connection establishment timeout
    pub connect_timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Sent as `Authorization: Token <value>` when present
    pub auth_token: Option<SecretString>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientOptions {
    /// Create options pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            timeout: None,
            connect_timeout: None,
            proxy: None,
            auth_token: None,
            extra_headers: None,
        }
    }

    /// Build options from `MAICHAT_*` environment variables, falling back to
    /// the defaults for anything unset.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::new(lookup(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()));

        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ClientError::Config(format!("{} must be a whole number of seconds, got {:?}", ENV_TIMEOUT_SECS, secs))
            })?;
            options.timeout = Some(Duration::from_secs(secs));
        }

        options.proxy = lookup(ENV_PROXY).filter(|p| !p.is_empty());
        options.auth_token = lookup(ENV_AUTH_TOKEN)
            .filter(|t| !t.is_empty())
            .map(SecretString::new);

        Ok(options)
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(&base_url.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Set the auth token.
    pub fn with_auth_token(mut self, token: impl Into<SecretString>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }

    /// Join an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn normalize_base_url(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}
