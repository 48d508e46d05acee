//! Transcript entries and the connection status shown next to them.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Assistant => write!(f, "assistant"),
        }
    }
}

/// One transcript entry. Fields are private: an entry never changes after
/// it is created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    id: Uuid,
    text: String,
    sender: Sender,
    timestamp: DateTime<Utc>,
}

impl Message {
    /// A message typed by the user, stamped with the current time.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender: Sender::User,
            timestamp: Utc::now(),
        }
    }

    /// An assistant reply. `timestamp` is the service's ISO-8601 string;
    /// missing or unparseable values fall back to the receipt time.
    pub fn assistant(text: impl Into<String>, timestamp: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender: Sender::Assistant,
            timestamp: timestamp.and_then(parse_timestamp).unwrap_or_else(Utc::now),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Parse an ISO-8601 timestamp. The service emits naive local timestamps
/// (`2024-05-01T10:00:00.123456`); those are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Append-only, ordered list of messages for one session.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return a reference to it.
    pub fn push(&mut self, message: Message) -> &Message {
        self.entries.push(message);
        &self.entries[self.entries.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.entries.iter()
    }

    /// Entries appended at or after `index`.
    pub fn since(&self, index: usize) -> &[Message] {
        self.entries.get(index..).unwrap_or(&[])
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Status badge state. Only connection events change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
    Error,
}

impl ConnectionStatus {
    /// Badge text: the view only distinguishes connected from everything else.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected | ConnectionStatus::Error => "Disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_sender_display() {
        assert_eq!(Sender::User.to_string(), "user");
        assert_eq!(Sender::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_sender_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Sender::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn test_user_message_fields() {
        let before = Utc::now();
        let msg = Message::user("hello");
        assert_eq!(msg.text(), "hello");
        assert_eq!(msg.sender(), Sender::User);
        assert!(msg.timestamp() >= before);
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = Message::user("x");
        let b = Message::user("x");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_assistant_uses_server_timestamp() {
        let msg = Message::assistant("hi there", Some("2024-05-01T10:20:30.123456"));
        let ts = msg.timestamp();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 5, 1));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (10, 20, 30));
    }

    #[test]
    fn test_assistant_bad_timestamp_falls_back_to_now() {
        let before = Utc::now();
        let msg = Message::assistant("hi", Some("yesterday-ish"));
        assert!(msg.timestamp() >= before);
    }

    #[test]
    fn test_parse_timestamp_rfc3339_with_offset() {
        let ts = parse_timestamp("2024-05-01T12:00:00+02:00").unwrap();
        assert_eq!(ts.hour(), 10);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("12:00").is_none());
    }

    #[test]
    fn test_transcript_preserves_insertion_order() {
        let mut t = Transcript::new();
        t.push(Message::user("one"));
        t.push(Message::assistant("two", None));
        t.push(Message::user("three"));
        let texts: Vec<&str> = t.iter().map(Message::text).collect();
        assert_eq!(texts, ["one", "two", "three"]);
        assert_eq!(t.len(), 3);
        assert_eq!(t.last().map(Message::text), Some("three"));
    }

    #[test]
    fn test_transcript_since() {
        let mut t = Transcript::new();
        t.push(Message::user("a"));
        t.push(Message::user("b"));
        assert_eq!(t.since(1).len(), 1);
        assert_eq!(t.since(1)[0].text(), "b");
        assert!(t.since(2).is_empty());
        assert!(t.since(10).is_empty());
    }

    #[test]
    fn test_connection_status_default_is_disconnected() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_connection_status_labels() {
        assert_eq!(ConnectionStatus::Connected.label(), "Connected");
        assert_eq!(ConnectionStatus::Error.label(), "Disconnected");
        assert_eq!(ConnectionStatus::Error.to_string(), "error");
    }
}
