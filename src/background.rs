//! One-shot requests run beside the event loop.
//!
//! `/chat`, `/stats` and `/health` calls are spawned here so the loop keeps
//! reading input and applying channel events while they are outstanding.
//! Nothing is ever cancelled; finished requests come back as [`Completed`]
//! values for the owner to apply to its session.

use tokio::task::{JoinError, JoinSet};
use tracing::warn;

use crate::api::ChatApi;
use crate::error::{ChatError, Result};
use crate::protocol::{ChatReply, HealthReport, OutboundFrame, ServiceStats};
use crate::session::ChatSession;

/// A finished background request.
#[derive(Debug)]
pub enum Completed {
    /// Feed to [`ChatSession::complete_fallback`]. A task that died before
    /// answering shows up as [`ChatError::Task`].
    Chat(Result<ChatReply>),
    /// Feed to [`ChatSession::apply_stats`]. `announce` is set when the user
    /// asked for it and expects a line of output.
    Stats {
        result: Result<ServiceStats>,
        announce: bool,
    },
    Health(Result<HealthReport>),
}

#[derive(Default)]
pub struct Background {
    chats: JoinSet<Result<ChatReply>>,
    lookups: JoinSet<Completed>,
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn_chat(&mut self, api: &ChatApi, frame: OutboundFrame) {
        let api = api.clone();
        self.chats.spawn(async move { api.post_chat(&frame).await });
    }

    pub fn spawn_stats(&mut self, api: &ChatApi, announce: bool) {
        let api = api.clone();
        self.lookups.spawn(async move {
            Completed::Stats {
                result: api.stats().await,
                announce,
            }
        });
    }

    pub fn spawn_health(&mut self, api: &ChatApi) {
        let api = api.clone();
        self.lookups
            .spawn(async move { Completed::Health(api.health().await) });
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty() && self.lookups.is_empty()
    }

    /// No request outstanding here and no reply still owed over the channel.
    pub fn settled(&self, session: &ChatSession) -> bool {
        self.is_empty() && !session.is_pending()
    }

    /// Next finished request, or `None` once nothing is outstanding.
    /// Cancel-safe, so it can sit in a `select!` arm.
    pub async fn next(&mut self) -> Option<Completed> {
        loop {
            tokio::select! {
                Some(done) = self.chats.join_next() => {
                    return Some(Completed::Chat(chat_result(done)));
                }
                Some(done) = self.lookups.join_next() => match done {
                    Ok(completed) => return Some(completed),
                    Err(e) => warn!(error = %e, "lookup task failed"),
                },
                else => return None,
            }
        }
    }
}

fn chat_result(done: std::result::Result<Result<ChatReply>, JoinError>) -> Result<ChatReply> {
    done.unwrap_or_else(|e| {
        warn!(error = %e, "chat request task failed");
        Err(ChatError::Task(e.to_string()))
    })
}
