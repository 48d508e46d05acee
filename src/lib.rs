//! Chat client for a scalable assistant service.
//!
//! A [`session::ChatSession`] owns the transcript and dispatches user input
//! either over the persistent WebSocket channel ([`connection`]) or, when that
//! channel is not open, through a one-shot `POST /chat` ([`api`]).

pub mod api;
pub mod background;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;
pub mod render;
pub mod session;

pub use api::ChatApi;
pub use background::{Background, Completed};
pub use config::ClientConfig;
pub use connection::{ChannelState, ConnectionEvent, ConnectionHandle, ConnectionManager};
pub use error::{ChatError, Result};
pub use message::{ConnectionStatus, Message, Sender, Transcript};
pub use protocol::{ChatReply, InboundFrame, OutboundFrame, ServiceStats};
pub use session::{ChatSession, Dispatch, SendOutcome};
