//! Wire shapes shared by the channel and the one-shot endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Body of every outbound message, on the channel and on `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub message: String,
    pub conversation_id: String,
}

impl OutboundFrame {
    pub fn new(message: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// An assistant reply, as returned by `POST /chat` and pushed over the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// A classified inbound channel frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// `{ "type": "system", "message": ... }`: diagnostic only.
    System { message: String },
    /// `{ "response": ..., "timestamp": ... }`: an assistant reply.
    Response(ChatReply),
    /// Anything else, including text that is not JSON.
    Unrecognized,
}

impl InboundFrame {
    /// Classify one text frame. Never fails; unknown shapes map to
    /// [`InboundFrame::Unrecognized`].
    pub fn parse(text: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => return InboundFrame::Unrecognized,
        };

        if value.get("type").and_then(|v| v.as_str()) == Some("system") {
            let message = value
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            return InboundFrame::System { message };
        }

        // An empty response string counts as absent.
        match value.get("response").and_then(|v| v.as_str()) {
            Some(response) if !response.is_empty() => InboundFrame::Response(ChatReply {
                response: response.to_string(),
                timestamp: value
                    .get("timestamp")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                conversation_id: value
                    .get("conversation_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            }),
            _ => InboundFrame::Unrecognized,
        }
    }
}

// ---------------------------------------------------------------------------
// Stats / health
// ---------------------------------------------------------------------------

/// `GET /stats` payload. The backend owns this shape, so each section is kept
/// as raw JSON and read leniently: a missing, null or mistyped field falls
/// back to the default the status line shows instead of rejecting the whole
/// payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    #[serde(default)]
    pub service_info: Option<Value>,
    #[serde(default)]
    pub connections: Option<Value>,
    #[serde(default)]
    pub llm_service: Option<Value>,
    #[serde(default)]
    pub system: Option<Value>,
}

impl ServiceStats {
    pub fn messages_processed(&self) -> u64 {
        count(field(&self.llm_service, "messages_processed"))
    }

    pub fn active_connections(&self) -> u64 {
        count(field(&self.connections, "active_websocket_connections"))
    }

    /// Uptime rounded to whole seconds.
    pub fn uptime_seconds(&self) -> u64 {
        count(field(&self.llm_service, "uptime_seconds"))
    }

    pub fn pod_name(&self) -> &str {
        field(&self.system, "pod_name")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .unwrap_or("local")
    }
}

fn field<'a>(section: &'a Option<Value>, key: &str) -> Option<&'a Value> {
    section.as_ref()?.get(key)
}

/// Non-negative whole number from an integer, a float or a numeric string.
fn count(value: Option<&Value>) -> u64 {
    let Some(value) = value else { return 0 };
    if let Some(n) = value.as_u64() {
        return n;
    }
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if n.is_finite() && n > 0.0 => n.round() as u64,
        _ => 0,
    }
}

/// `GET /health` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_outbound_frame_wire_shape() {
        let frame = OutboundFrame::new("hello", "conv-1");
        let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "hello", "conversation_id": "conv-1"})
        );
    }

    #[test]
    fn test_parse_system_frame() {
        let frame = InboundFrame::parse(r#"{"type":"system","message":"Connected to pod-a"}"#);
        assert_eq!(
            frame,
            InboundFrame::System {
                message: "Connected to pod-a".into()
            }
        );
    }

    #[test]
    fn test_parse_system_frame_wins_over_response() {
        let frame = InboundFrame::parse(r#"{"type":"system","message":"m","response":"r"}"#);
        assert!(matches!(frame, InboundFrame::System { .. }));
    }

    #[test]
    fn test_parse_response_frame() {
        let frame = InboundFrame::parse(
            r#"{"response":"hi there","timestamp":"2024-05-01T10:00:00.5","conversation_id":"c"}"#,
        );
        assert_eq!(
            frame,
            InboundFrame::Response(ChatReply {
                response: "hi there".into(),
                timestamp: Some("2024-05-01T10:00:00.5".into()),
                conversation_id: Some("c".into()),
            })
        );
    }

    #[rstest]
    #[case("not json at all")]
    #[case("")]
    #[case("[1,2,3]")]
    #[case(r#"{"type":"typing"}"#)]
    #[case(r#"{"response":""}"#)]
    #[case(r#"{"response":42}"#)]
    #[case(r#"{"error":"boom"}"#)]
    fn test_parse_unrecognized(#[case] text: &str) {
        assert_eq!(InboundFrame::parse(text), InboundFrame::Unrecognized);
    }

    #[test]
    fn test_chat_reply_without_timestamp() {
        let reply: ChatReply = serde_json::from_str(r#"{"response":"ok"}"#).unwrap();
        assert_eq!(reply.response, "ok");
        assert!(reply.timestamp.is_none());
    }

    #[test]
    fn test_stats_full_payload() {
        let stats: ServiceStats = serde_json::from_value(serde_json::json!({
            "service_info": {"name": "Scalable LLM Chatbot", "version": "1.0.0", "environment": "dev"},
            "connections": {"active_websocket_connections": 3, "total_connections_served": 10},
            "llm_service": {"messages_processed": 42, "average_response_time": 0.8,
                            "model_loaded": true, "uptime_seconds": 120.6},
            "system": {"timestamp": "2024-05-01T10:00:00", "pod_name": "chat-7f9", "namespace": "default"}
        }))
        .unwrap();
        assert_eq!(stats.messages_processed(), 42);
        assert_eq!(stats.active_connections(), 3);
        assert_eq!(stats.uptime_seconds(), 121);
        assert_eq!(stats.pod_name(), "chat-7f9");
    }

    #[test]
    fn test_stats_empty_object_defaults() {
        let stats: ServiceStats = serde_json::from_str("{}").unwrap();
        assert_eq!(stats.messages_processed(), 0);
        assert_eq!(stats.active_connections(), 0);
        assert_eq!(stats.uptime_seconds(), 0);
        assert_eq!(stats.pod_name(), "local");
    }

    #[test]
    fn test_stats_ignores_unknown_sections() {
        let stats: ServiceStats =
            serde_json::from_str(r#"{"extra": {"a": 1}, "system": {"pod_name": ""}}"#).unwrap();
        assert_eq!(stats.pod_name(), "local");
    }

    #[rstest]
    #[case::unread_field_mistyped(
        r#"{"service_info":{"version":1},"llm_service":{"messages_processed":5}}"#, 5, 0)]
    #[case::extra_field_mistyped(
        r#"{"llm_service":{"messages_processed":5,"model_loaded":"yes"}}"#, 5, 0)]
    #[case::float_count(r#"{"connections":{"active_websocket_connections":2.0}}"#, 0, 2)]
    #[case::string_count(r#"{"llm_service":{"messages_processed":"7"}}"#, 7, 0)]
    #[case::null_count(r#"{"llm_service":{"messages_processed":null}}"#, 0, 0)]
    #[case::negative_count(r#"{"connections":{"active_websocket_connections":-3}}"#, 0, 0)]
    #[case::section_not_an_object(r#"{"connections":5,"llm_service":[1]}"#, 0, 0)]
    #[case::unknown_keys(
        r#"{"llm_service":{"messages_processed":9,"gpu":{"util":0.5}},"extra":true}"#, 9, 0)]
    fn test_stats_tolerates_unexpected_types(
        #[case] body: &str,
        #[case] messages: u64,
        #[case] connections: u64,
    ) {
        let stats: ServiceStats = serde_json::from_str(body).unwrap();
        assert_eq!(stats.messages_processed(), messages);
        assert_eq!(stats.active_connections(), connections);
        assert_eq!(stats.pod_name(), "local");
    }

    #[test]
    fn test_stats_mistyped_pod_name_defaults() {
        let stats: ServiceStats =
            serde_json::from_str(r#"{"system":{"pod_name":42,"namespace":7}}"#).unwrap();
        assert_eq!(stats.pod_name(), "local");
        assert_eq!(stats.uptime_seconds(), 0);
    }

    #[test]
    fn test_health_report() {
        let report: HealthReport =
            serde_json::from_str(r#"{"status":"healthy","timestamp":"t"}"#).unwrap();
        assert!(report.is_healthy());
        let report: HealthReport = serde_json::from_str(r#"{"status":"degraded"}"#).unwrap();
        assert!(!report.is_healthy());
    }
}
