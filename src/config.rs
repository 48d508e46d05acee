//! Client configuration.
//!
//! Layering, lowest to highest precedence: built-in defaults, an optional
//! TOML file, the `CHAT_API_URL` environment variable, command-line flags.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ChatError, Result};

/// Base URL of the HTTP API when nothing else is configured.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

/// Environment variable selecting the HTTP API base URL.
pub const API_URL_ENV: &str = "CHAT_API_URL";

/// Port the service exposes its WebSocket endpoint on.
pub const DEFAULT_WS_PORT: u16 = 8000;

/// Fixed delay between a channel closing and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL for `/chat`, `/stats` and `/health`, without trailing slash.
    pub api_base: String,
    /// Explicit WebSocket host. `None` means "same host as `api_base`".
    pub ws_host: Option<String>,
    pub ws_port: u16,
    /// Use `wss://` instead of `ws://`.
    pub ws_secure: bool,
    pub reconnect_delay: Duration,
    /// Per-request timeout for the one-shot endpoints. `None` leaves reqwest's default.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ws_host: None,
            ws_port: DEFAULT_WS_PORT,
            ws_secure: false,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Replace the API base URL, normalising away trailing slashes.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = normalize_base(&base.into());
        self
    }

    /// Overlay the value of [`API_URL_ENV`], if one was set and non-empty.
    pub fn apply_env(&mut self, api_url: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base = normalize_base(&url);
        }
    }

    /// Overlay every key present in a parsed config file.
    pub fn apply_file(&mut self, file: &FileConfig) {
        if let Some(url) = &file.api_url {
            self.api_base = normalize_base(url);
        }
        if let Some(host) = &file.ws_host {
            self.ws_host = Some(host.clone());
        }
        if let Some(port) = file.ws_port {
            self.ws_port = port;
        }
        if let Some(secure) = file.ws_secure {
            self.ws_secure = secure;
        }
        if let Some(secs) = file.reconnect_secs {
            self.reconnect_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Some(Duration::from_secs(secs));
        }
    }

    /// Host the channel connects to: the explicit override, else the API host.
    pub fn ws_host(&self) -> String {
        if let Some(host) = &self.ws_host {
            return host.clone();
        }
        reqwest::Url::parse(&self.api_base)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string())
    }

    /// Full channel URL for one conversation: `ws(s)://<host>:<port>/ws/<id>`.
    pub fn ws_endpoint(&self, conversation_id: &str) -> String {
        let scheme = if self.ws_secure { "wss" } else { "ws" };
        format!(
            "{scheme}://{}:{}/ws/{conversation_id}",
            self.ws_host(),
            self.ws_port
        )
    }

    /// URL of a one-shot endpoint, e.g. `endpoint("chat")`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }
}

/// On-disk shape of the optional TOML config file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub ws_host: Option<String>,
    pub ws_port: Option<u16>,
    pub ws_secure: Option<bool>,
    pub reconnect_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ChatError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|e| match e {
            ChatError::Config(detail) => {
                ChatError::Config(format!("{}: {detail}", path.display()))
            }
            other => other,
        })
    }
}

fn normalize_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
