//! Conversational assistant session.
//!
//! # Responsibility
//! - Keep the alternating user/model history of one conversation.
//! - Stream each reply to the caller chunk by chunk.
//!
//! # Invariants
//! - History grows by exactly two messages per completed `send`: the user
//!   message, then the full reply (or the fallback reply on failure).
//! - A `send` future dropped before completion leaves history unchanged.
//! - A failed reply never discards the user's message.

use crate::textgen::{ChatMessage, ServiceError, TextGenerator};
use futures::StreamExt;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Reply recorded when the service fails mid-conversation.
pub const CHAT_FALLBACK_REPLY: &str = "Lo siento, ocurrió un error.";

/// Rejected chat input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    EmptyMessage,
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "chat message must not be empty"),
        }
    }
}

impl Error for ChatError {}

/// Result of one completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Replied(String),
    /// The service failed; `reply` is what was recorded in history.
    Failed { error: ServiceError, reply: String },
}

impl ChatOutcome {
    /// Text recorded as the model turn.
    pub fn reply(&self) -> &str {
        match self {
            Self::Replied(reply) => reply,
            Self::Failed { reply, .. } => reply,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes a conversation kept by the caller between calls.
    pub fn with_history(history: Vec<ChatMessage>) -> Self {
        Self { history }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Sends `text` and streams the reply through `on_chunk`, which receives
    /// the reply text accumulated so far after every chunk.
    ///
    /// Service failures do not surface as `Err`: the exchange completes
    /// with [`ChatOutcome::Failed`] and the fallback reply is recorded.
    /// Chunks already delivered before a mid-stream failure are discarded
    /// from history.
    pub async fn send<G, F>(
        &mut self,
        generator: &G,
        text: &str,
        mut on_chunk: F,
    ) -> Result<ChatOutcome, ChatError>
    where
        G: TextGenerator + ?Sized,
        F: FnMut(&str),
    {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let started_at = Instant::now();
        info!(
            "event=chat_send module=chat status=start history_len={} message_chars={}",
            self.history.len(),
            text.chars().count()
        );

        let result = async {
            let mut stream = generator.stream_chat_reply(&self.history, text).await?;
            let mut reply = String::new();
            while let Some(chunk) = stream.next().await {
                reply.push_str(&chunk?);
                on_chunk(&reply);
            }
            Ok::<_, ServiceError>(reply)
        }
        .await;

        let outcome = match result {
            Ok(reply) => {
                info!(
                    "event=chat_send module=chat status=ok duration_ms={} reply_chars={}",
                    started_at.elapsed().as_millis(),
                    reply.chars().count()
                );
                ChatOutcome::Replied(reply)
            }
            Err(error) => {
                warn!(
                    "event=chat_send module=chat status=error duration_ms={} error={error}",
                    started_at.elapsed().as_millis()
                );
                ChatOutcome::Failed {
                    error,
                    reply: CHAT_FALLBACK_REPLY.to_string(),
                }
            }
        };

        self.history.push(ChatMessage::user(text));
        self.history.push(ChatMessage::model(outcome.reply()));
        Ok(outcome)
    }
}
