//! Boundary to the external text-generation service.
//!
//! # Responsibility
//! - Define the [`TextGenerator`] seam consumed by the workflow and chat.
//! - Provide an HTTP implementation for the Gemini API.
//!
//! # Invariants
//! - Calls are never retried here; a repeated request is a caller decision.
//! - Chat replies are finite, single-pass streams of text chunks.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod gemini;
pub mod prompt;
mod sse;

pub use gemini::{GeminiClient, GeminiConfig, GroundedAnswer, GroundingSource};
pub use prompt::build_summary_prompt;

/// Lazily produced reply chunks. Not restartable.
pub type TextChunkStream = BoxStream<'static, Result<String, ServiceError>>;

/// Failure talking to the text-generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Client could not be built from configuration.
    InvalidConfig(String),
    /// Connection, timeout or body read failure.
    Transport(String),
    /// Service answered with a non-success status.
    Status { status: u16, body: String },
    /// Service answered with a payload that could not be decoded.
    Decode(String),
    /// Service answered successfully but produced no text.
    EmptyResponse,
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfig(message) => write!(f, "text service misconfigured: {message}"),
            Self::Transport(message) => write!(f, "text service unreachable: {message}"),
            Self::Status { status, body } => {
                write!(f, "text service returned status {status}: {body}")
            }
            Self::Decode(message) => write!(f, "text service response undecodable: {message}"),
            Self::EmptyResponse => write!(f, "text service returned no text"),
        }
    }
}

impl Error for ServiceError {}

/// Speaker of one chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// External text-generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Summarizes the changes `modifying_text` introduces into `base_text`.
    async fn generate_summary(
        &self,
        base_text: &str,
        modifying_text: &str,
    ) -> Result<String, ServiceError>;

    /// Starts a streamed reply to `new_message` given prior `history`.
    async fn stream_chat_reply(
        &self,
        history: &[ChatMessage],
        new_message: &str,
    ) -> Result<TextChunkStream, ServiceError>;
}
