//! One chat session: conversation id, transcript, status and the dispatcher
//! that decides between the channel and the one-shot endpoint.
//!
//! All mutation goes through `&mut ChatSession`, so the owner's event loop is
//! the only writer. Connection events arrive as values and are applied with
//! [`ChatSession::handle_event`].

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::ChatApi;
use crate::config::ClientConfig;
use crate::connection::{ConnectionEvent, ConnectionHandle, ConnectionManager};
use crate::error::{ChatError, Result};
use crate::message::{ConnectionStatus, Message, Transcript};
use crate::protocol::{ChatReply, HealthReport, InboundFrame, OutboundFrame, ServiceStats};

/// Warning shown when the one-shot request fails.
pub const SEND_FAILED_WARNING: &str = "Failed to send message. Please try again.";

/// Route chosen by [`ChatSession::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Ignored,
    /// Queued on the open channel.
    Streamed,
    /// Must be posted to `/chat`.
    Fallback(OutboundFrame),
}

/// What a call to [`ChatSession::send`] did.
#[derive(Debug)]
pub enum SendOutcome {
    /// Input was empty after trimming; nothing happened.
    Ignored,
    /// Queued on the open channel; the reply arrives as a connection event.
    Streamed,
    /// The one-shot request answered and the reply was appended.
    Replied,
    /// The one-shot request failed; a warning is set.
    Failed(ChatError),
}

pub struct ChatSession {
    conversation_id: Uuid,
    transcript: Transcript,
    status: ConnectionStatus,
    pending: bool,
    warning: Option<String>,
    stats: Option<ServiceStats>,
    api: ChatApi,
    channel: Option<ConnectionHandle>,
}

impl ChatSession {
    /// New session with a fresh conversation id and no channel.
    pub fn new(api: ChatApi) -> Self {
        Self {
            conversation_id: Uuid::new_v4(),
            transcript: Transcript::new(),
            status: ConnectionStatus::Disconnected,
            pending: false,
            warning: None,
            stats: None,
            api,
            channel: None,
        }
    }

    /// Start the persistent channel for this conversation. Events must be fed
    /// back through [`handle_event`](Self::handle_event).
    pub fn open_channel(
        &mut self,
        config: &ClientConfig,
    ) -> mpsc::UnboundedReceiver<ConnectionEvent> {
        let (handle, events) = ConnectionManager::spawn(config, &self.conversation_id.to_string());
        info!(endpoint = %handle.endpoint(), "starting channel");
        self.attach_channel(handle);
        events
    }

    /// Use an already-spawned channel. Replaces (and thereby closes) any previous one.
    pub fn attach_channel(&mut self, handle: ConnectionHandle) {
        self.channel = Some(handle);
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether an assistant reply is still outstanding.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn dismiss_warning(&mut self) {
        self.warning = None;
    }

    pub fn api(&self) -> &ChatApi {
        &self.api
    }

    pub fn stats(&self) -> Option<&ServiceStats> {
        self.stats.as_ref()
    }

    /// True only when the socket itself reports open, independent of `status`.
    pub fn channel_open(&self) -> bool {
        self.channel.as_ref().is_some_and(ConnectionHandle::is_open)
    }

    /// Dispatch one line of user input and, on the fallback route, await the
    /// one-shot reply.
    ///
    /// The user message is appended before any network activity. When the
    /// channel is open the frame goes there and the reply arrives later as an
    /// event; otherwise `POST /chat` is awaited here.
    pub async fn send(&mut self, input: &str) -> SendOutcome {
        match self.submit(input) {
            Dispatch::Ignored => SendOutcome::Ignored,
            Dispatch::Streamed => SendOutcome::Streamed,
            Dispatch::Fallback(frame) => {
                let result = self.api.post_chat(&frame).await;
                self.complete_fallback(result)
            }
        }
    }

    /// First half of [`send`](Self::send): append the user message, mark the
    /// session pending and pick a route. A [`Dispatch::Fallback`] frame must be
    /// posted by the caller and its result passed to
    /// [`complete_fallback`](Self::complete_fallback); this lets an event loop
    /// keep handling channel events while the request is in flight.
    pub fn submit(&mut self, input: &str) -> Dispatch {
        if input.trim().is_empty() {
            return Dispatch::Ignored;
        }

        self.transcript.push(Message::user(input));
        self.pending = true;
        self.warning = None;

        let frame = OutboundFrame::new(input, self.conversation_id.to_string());

        // Readiness is re-checked on the socket itself, not on `status`.
        if let Some(channel) = self.channel.as_ref().filter(|c| c.is_open()) {
            if !channel.send(frame) {
                // Same as a socket that closed mid-send: no acknowledgement,
                // pending stays set.
                debug!("channel task gone, frame dropped");
            }
            return Dispatch::Streamed;
        }

        Dispatch::Fallback(frame)
    }

    /// Second half of [`send`](Self::send) for the fallback route.
    pub fn complete_fallback(&mut self, result: Result<ChatReply>) -> SendOutcome {
        self.pending = false;
        match result {
            Ok(reply) => {
                self.transcript
                    .push(Message::assistant(reply.response, reply.timestamp.as_deref()));
                SendOutcome::Replied
            }
            Err(e) => {
                warn!(error = %e, "one-shot chat request failed");
                self.warning = Some(SEND_FAILED_WARNING.to_string());
                SendOutcome::Failed(e)
            }
        }
    }

    /// Apply one event from the channel.
    pub fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => {
                self.status = ConnectionStatus::Connected;
                self.warning = None;
            }
            ConnectionEvent::MessageReceived(InboundFrame::Response(reply)) => {
                // No correlation: the reply lands after whatever is already there.
                self.transcript
                    .push(Message::assistant(reply.response, reply.timestamp.as_deref()));
                self.pending = false;
            }
            ConnectionEvent::MessageReceived(InboundFrame::System { message }) => {
                debug!(message = %message, "system notice");
            }
            ConnectionEvent::MessageReceived(InboundFrame::Unrecognized) => {}
            ConnectionEvent::Closed => {
                self.status = ConnectionStatus::Disconnected;
            }
            ConnectionEvent::Errored(warning) => {
                self.status = ConnectionStatus::Error;
                self.warning = Some(warning);
            }
        }
    }

    /// Fetch `/stats` and apply it. Failures are logged and leave the previous value.
    pub async fn refresh_stats(&mut self) -> Option<&ServiceStats> {
        let result = self.api.stats().await;
        self.apply_stats(result)
    }

    /// Apply a `/stats` result fetched elsewhere, e.g. by a background task.
    pub fn apply_stats(&mut self, result: Result<ServiceStats>) -> Option<&ServiceStats> {
        match result {
            Ok(stats) => self.stats = Some(stats),
            Err(e) => warn!(error = %e, "failed to fetch stats"),
        }
        self.stats.as_ref()
    }

    pub async fn check_health(&self) -> Result<HealthReport> {
        self.api.health().await
    }

    /// Close the channel, if any. No reconnect is scheduled afterwards.
    pub async fn shutdown(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
    }
}
