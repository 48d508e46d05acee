//! One-shot HTTP client for the chat service.
//!
//! Used for `/chat` whenever the persistent channel is not open, and always
//! for `/stats` and `/health`.

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ChatError, Result};
use crate::protocol::{ChatReply, HealthReport, OutboundFrame, ServiceStats};

#[derive(Debug, Clone)]
pub struct ChatApi {
    config: ClientConfig,
    client: reqwest::Client,
}

impl ChatApi {
    pub fn new(config: &ClientConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        // Builder failure falls back to a default client instead of panicking.
        let client = builder.build().unwrap_or_default();
        Self {
            config: config.clone(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.config.api_base
    }

    /// `POST /chat`.
    ///
    /// # Returns
    /// - `Ok(ChatReply)` on a 2xx response with a parseable body.
    /// - `Err(ChatError::Http)` when no response arrives.
    /// - `Err(ChatError::Status)` on a non-2xx response.
    /// - `Err(ChatError::Json)` when the body is not a reply.
    pub async fn post_chat(&self, frame: &OutboundFrame) -> Result<ChatReply> {
        let url = self.config.endpoint("chat");
        debug!(url = %url, conversation_id = %frame.conversation_id, "posting chat message");
        let resp = self
            .client
            .post(&url)
            .json(frame)
            .send()
            .await
            .map_err(|source| ChatError::Http {
                url: url.clone(),
                source,
            })?;
        read_json(resp, url).await
    }

    /// `GET /stats`.
    pub async fn stats(&self) -> Result<ServiceStats> {
        self.get_json("stats").await
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<HealthReport> {
        self.get_json("health").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.config.endpoint(path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ChatError::Http {
                url: url.clone(),
                source,
            })?;
        read_json(resp, url).await
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response, url: String) -> Result<T> {
    if !resp.status().is_success() {
        return Err(ChatError::Status {
            status: resp.status().as_u16(),
            url,
        });
    }
    let bytes = resp
        .bytes()
        .await
        .map_err(|source| ChatError::Http { url, source })?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_base_url_is_normalized() {
        let cfg = ClientConfig::default().with_api_base("http://svc:8000/");
        let api = ChatApi::new(&cfg);
        assert_eq!(api.base_url(), "http://svc:8000");
    }

    #[test]
    fn test_new_with_timeout_does_not_panic() {
        let cfg = ClientConfig {
            request_timeout: Some(Duration::from_millis(250)),
            ..ClientConfig::default()
        };
        let _ = ChatApi::new(&cfg);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        // Port 9 (discard) on loopback is closed in any sane test environment.
        let cfg = ClientConfig::default().with_api_base("http://127.0.0.1:9");
        let api = ChatApi::new(&cfg);
        let err = api
            .post_chat(&OutboundFrame::new("hi", "c"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Http { .. }));
    }
}
