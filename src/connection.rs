//! Persistent channel to the chat service, with automatic reconnect.
//!
//! ## Design
//! - One background task owns the WebSocket. The session never touches the
//!   socket directly: it reads [`ConnectionEvent`]s from an unbounded mpsc
//!   receiver, checks readiness through a `watch` of [`ChannelState`], and
//!   queues [`OutboundFrame`]s through the [`ConnectionHandle`].
//! - State machine: `Closed -> Connecting -> Open -> Closed -> (delay) -> Connecting ...`
//! - Reconnect delay is fixed (no backoff, no cap, no jitter) and retries are
//!   unbounded while the handle is alive.
//! - A malformed endpoint is reported once and never retried.
//! - Dropping the handle or calling [`ConnectionHandle::close`] stops the task;
//!   no reconnect is scheduled after that.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ChatError, Result};
use crate::protocol::{InboundFrame, OutboundFrame};

/// Warning surfaced when the endpoint cannot even be constructed.
pub const CONSTRUCTION_WARNING: &str = "Failed to establish real-time connection. Using HTTP API.";

/// Warning surfaced when a connection attempt or an open channel fails.
pub const TRANSPORT_WARNING: &str = "WebSocket connection failed. Falling back to HTTP API.";

/// Readiness of the underlying socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Connecting,
    Open,
}

/// Everything the owning session needs to hear from the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Opened,
    /// A recognised inbound frame. Unrecognised frames are never delivered.
    MessageReceived(InboundFrame),
    Closed,
    /// Carries the user-facing warning text.
    Errored(String),
}

/// Owning handle to a running channel.
pub struct ConnectionHandle {
    endpoint: String,
    state: watch::Receiver<ChannelState>,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionHandle {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// A receiver that observes every state change, mainly for tests and
    /// status displays that want to await a transition.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Queue a frame for the socket. There is no acknowledgement: a frame
    /// queued while the socket is not open is dropped. Returns `false` only
    /// when the channel task is gone.
    pub fn send(&self, frame: OutboundFrame) -> bool {
        self.outbound.send(frame).is_ok()
    }

    /// Stop the channel and wait for the task to finish.
    pub async fn close(mut self) {
        self.signal_shutdown();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "channel task ended abnormally");
            }
        }
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

/// Starts channels. Must be called from within a tokio runtime.
pub struct ConnectionManager;

impl ConnectionManager {
    /// Open the channel for `conversation_id` and keep it open until the
    /// returned handle is closed or dropped.
    pub fn spawn(
        config: &ClientConfig,
        conversation_id: &str,
    ) -> (ConnectionHandle, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let endpoint = config.ws_endpoint(conversation_id);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::Closed);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        if let Err(e) = build_request(&endpoint) {
            warn!(error = %e, "cannot construct channel, staying on HTTP");
            let _ = events_tx.send(ConnectionEvent::Errored(CONSTRUCTION_WARNING.to_string()));
            // events_tx, state_tx and outbound_rx drop here: the session sees
            // one event, then the stream ends.
            return (
                ConnectionHandle {
                    endpoint,
                    state: state_rx,
                    outbound: outbound_tx,
                    shutdown: Some(shutdown_tx),
                    task: None,
                },
                events_rx,
            );
        }

        let worker = Worker {
            endpoint: endpoint.clone(),
            reconnect_delay: config.reconnect_delay,
            events: events_tx,
            state: state_tx,
            outbound: outbound_rx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(worker.run());

        (
            ConnectionHandle {
                endpoint,
                state: state_rx,
                outbound: outbound_tx,
                shutdown: Some(shutdown_tx),
                task: Some(task),
            },
            events_rx,
        )
    }
}

/// Validate the endpoint once, up front.
pub fn build_request(endpoint: &str) -> Result<Request> {
    endpoint
        .into_client_request()
        .map_err(|e| ChatError::InvalidEndpoint {
            url: endpoint.to_string(),
            detail: e.to_string(),
        })
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why an open session with the socket ended.
enum Ended {
    Shutdown,
    Lost { error: Option<String> },
}

struct Worker {
    endpoint: String,
    reconnect_delay: std::time::Duration,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    state: watch::Sender<ChannelState>,
    outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    shutdown: oneshot::Receiver<()>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            self.state.send_replace(ChannelState::Connecting);
            debug!(endpoint = %self.endpoint, "connecting");

            let attempt = tokio::select! {
                _ = &mut self.shutdown => break,
                res = connect_async(self.endpoint.as_str()) => res,
            };

            match attempt {
                Ok((socket, _)) => {
                    self.discard_stale();
                    self.state.send_replace(ChannelState::Open);
                    self.emit(ConnectionEvent::Opened);
                    info!(endpoint = %self.endpoint, "channel open");

                    match self.drive(socket).await {
                        Ended::Shutdown => break,
                        Ended::Lost { error: Some(e) } => {
                            warn!(error = %e, "channel failed");
                            self.emit(ConnectionEvent::Errored(TRANSPORT_WARNING.to_string()));
                        }
                        Ended::Lost { error: None } => {}
                    }
                }
                Err(e) => {
                    warn!(endpoint = %self.endpoint, error = %e, "connection attempt failed");
                    self.emit(ConnectionEvent::Errored(TRANSPORT_WARNING.to_string()));
                }
            }

            self.state.send_replace(ChannelState::Closed);
            self.emit(ConnectionEvent::Closed);
            info!(
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "channel closed, reconnect scheduled"
            );

            tokio::select! {
                _ = &mut self.shutdown => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        self.state.send_replace(ChannelState::Closed);
        debug!(endpoint = %self.endpoint, "channel task stopped");
    }

    /// Pump one open socket until it closes, fails or shutdown is requested.
    async fn drive(&mut self, socket: Socket) -> Ended {
        let (mut sink, mut stream) = socket.split();

        loop {
            tokio::select! {
                _ = &mut self.shutdown => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return Ended::Shutdown;
                }
                frame = self.outbound.recv() => {
                    let Some(frame) = frame else {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return Ended::Shutdown;
                    };
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "could not encode outbound frame");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        return Ended::Lost { error: Some(e.to_string()) };
                    }
                }
                msg = stream.next() => match msg {
                    Some(Ok(WsMessage::Text(text))) => self.dispatch(&text),
                    Some(Ok(WsMessage::Ping(payload))) => {
                        let _ = sink.send(WsMessage::Pong(payload)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => return Ended::Lost { error: None },
                    Some(Ok(other)) => {
                        debug!(len = other.len(), "ignoring non-text frame");
                    }
                    Some(Err(e)) => return Ended::Lost { error: Some(e.to_string()) },
                },
            }
        }
    }

    /// Drop frames queued while the socket was down. Must run before the
    /// state flips to `Open`, after which new frames are live.
    fn discard_stale(&mut self) {
        let mut stale = 0usize;
        while self.outbound.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            debug!(dropped = stale, "discarded frames queued while closed");
        }
    }

    fn dispatch(&self, text: &str) {
        match InboundFrame::parse(text) {
            InboundFrame::Unrecognized => {
                debug!(len = text.len(), "ignoring unrecognized frame");
            }
            InboundFrame::System { message } => {
                info!(message = %message, "system notice");
                self.emit(ConnectionEvent::MessageReceived(InboundFrame::System { message }));
            }
            frame @ InboundFrame::Response(_) => {
                self.emit(ConnectionEvent::MessageReceived(frame));
            }
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        // A closed receiver means the session is gone; nothing left to tell.
        let _ = self.events.send(event);
    }
}
