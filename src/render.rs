//! Terminal rendering. Pure string builders; `main` decides when to print.

use chrono::Local;
use colored::*;

use crate::message::{ConnectionStatus, Message, Sender};
use crate::protocol::{HealthReport, ServiceStats};

pub fn header(conversation_id: &str) -> String {
    format!(
        "{}\n{}",
        "Chatline - scalable assistant client".bright_cyan().bold(),
        format!("conversation {conversation_id}").dimmed()
    )
}

pub fn welcome() -> String {
    format!(
        "{}\n{}",
        "Start a conversation. Type a message and press Enter.".bright_white(),
        "Commands: /stats  /health  /dismiss  /help  /quit".dimmed()
    )
}

pub fn help() -> String {
    [
        "/stats    refresh service statistics",
        "/health   query the service health endpoint",
        "/dismiss  hide the current warning",
        "/quit     close the session",
    ]
    .join("\n")
}

/// One transcript entry: `[HH:MM:SS] you: text` or `[HH:MM:SS] assistant: text`.
pub fn message_line(message: &Message) -> String {
    let time = message.timestamp().with_timezone(&Local).format("%H:%M:%S");
    let stamp = format!("[{time}]").dimmed();
    match message.sender() {
        Sender::User => format!("{stamp} {} {}", "you:".bright_magenta().bold(), message.text()),
        Sender::Assistant => format!(
            "{stamp} {} {}",
            "assistant:".bright_blue().bold(),
            message.text()
        ),
    }
}

pub fn status_badge(status: ConnectionStatus) -> String {
    let label = format!("[{}]", status.label());
    match status {
        ConnectionStatus::Connected => label.bright_green().to_string(),
        ConnectionStatus::Disconnected | ConnectionStatus::Error => label.bright_red().to_string(),
    }
}

pub fn stats_line(stats: &ServiceStats) -> String {
    format!(
        "Pod: {} | Active Connections: {} | Uptime: {}s | {} msgs",
        stats.pod_name(),
        stats.active_connections(),
        stats.uptime_seconds(),
        stats.messages_processed()
    )
    .bright_cyan()
    .to_string()
}

pub fn health_line(report: &HealthReport) -> String {
    let status = if report.is_healthy() {
        report.status.bright_green()
    } else {
        report.status.bright_yellow()
    };
    match &report.timestamp {
        Some(ts) => format!("health: {status} ({ts})"),
        None => format!("health: {status}"),
    }
}

pub fn warning_banner(text: &str) -> String {
    format!("{} {}", "warning:".bright_yellow().bold(), text.yellow())
}

pub fn thinking() -> String {
    "assistant is thinking...".dimmed().italic().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_line_contains_text_and_label() {
        let line = message_line(&Message::user("hello"));
        assert!(line.contains("hello"));
        assert!(line.contains("you:"));
    }

    #[test]
    fn test_assistant_line_contains_text_and_label() {
        let line = message_line(&Message::assistant("hi there", None));
        assert!(line.contains("hi there"));
        assert!(line.contains("assistant:"));
    }

    #[test]
    fn test_status_badge_labels() {
        assert!(status_badge(ConnectionStatus::Connected).contains("Connected"));
        assert!(status_badge(ConnectionStatus::Error).contains("Disconnected"));
    }

    #[test]
    fn test_stats_line_uses_defaults() {
        let line = stats_line(&ServiceStats::default());
        assert!(line.contains("Pod: local"));
        assert!(line.contains("Active Connections: 0"));
        assert!(line.contains("Uptime: 0s"));
        assert!(line.contains("0 msgs"));
    }

    #[test]
    fn test_health_line_includes_timestamp() {
        let line = health_line(&HealthReport {
            status: "healthy".into(),
            timestamp: Some("2024-05-01T10:00:00".into()),
        });
        assert!(line.contains("healthy"));
        assert!(line.contains("2024-05-01T10:00:00"));
    }

    #[test]
    fn test_warning_banner_contains_text() {
        assert!(warning_banner("Failed to send").contains("Failed to send"));
    }
}
