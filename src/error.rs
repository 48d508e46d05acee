//! Crate-level error type.
//!
//! Nothing in the client is fatal: the session converts every variant into a
//! status change or a dismissible warning. The variants exist so callers and
//! logs can tell the failure classes apart.

use thiserror::Error;

/// Errors produced by the HTTP client, the channel and configuration loading.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request never produced a response (connect failure, timeout, broken body).
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service replied with a non-2xx status code.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// The channel endpoint could not be turned into a handshake request.
    #[error("invalid endpoint '{url}': {detail}")]
    InvalidEndpoint { url: String, detail: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A background request task panicked or was aborted before answering.
    #[error("request task failed: {0}")]
    Task(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ChatError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChatError::WebSocket(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_includes_code_and_url() {
        let err = ChatError::Status {
            status: 503,
            url: "http://localhost:8000/chat".into(),
        };
        assert_eq!(err.to_string(), "HTTP 503 from http://localhost:8000/chat");
    }

    #[test]
    fn test_invalid_endpoint_display() {
        let err = ChatError::InvalidEndpoint {
            url: "ws://bad host/ws/x".into(),
            detail: "invalid uri character".into(),
        };
        assert!(err.to_string().contains("ws://bad host/ws/x"));
        assert!(err.to_string().contains("invalid uri character"));
    }

    #[test]
    fn test_json_error_converts() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ChatError = parse.into();
        assert!(matches!(err, ChatError::Json(_)));
    }

    #[test]
    fn test_websocket_error_is_boxed() {
        let err: ChatError = tokio_tungstenite::tungstenite::Error::ConnectionClosed.into();
        assert!(matches!(err, ChatError::WebSocket(_)));
        assert!(err.to_string().starts_with("websocket error"));
    }
}
