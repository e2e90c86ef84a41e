#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use lexdin_core::fixtures::{load_fixtures, seed_repository};
use lexdin_core::textgen::TextChunkStream;
use lexdin_core::{
    ChatMessage, IdentityProvider, InMemoryNormRepository, NormRepository, ServiceError,
    SqliteNormRepository, TextGenerator, User,
};
use std::sync::Mutex;
use std::time::Duration;

/// Text generator double that replays scripted answers and records calls.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub summary: Option<Result<String, ServiceError>>,
    pub summary_delay: Option<Duration>,
    pub chat_chunks: Vec<Result<String, ServiceError>>,
    pub chat_start_error: Option<ServiceError>,
    pub summary_calls: Mutex<Vec<(String, String)>>,
    pub chat_calls: Mutex<Vec<(Vec<ChatMessage>, String)>>,
}

impl ScriptedGenerator {
    pub fn summarizing(summary: &str) -> Self {
        Self {
            summary: Some(Ok(summary.to_string())),
            ..Self::default()
        }
    }

    pub fn failing_summary(error: ServiceError) -> Self {
        Self {
            summary: Some(Err(error)),
            ..Self::default()
        }
    }

    pub fn chatting(chunks: &[&str]) -> Self {
        Self {
            chat_chunks: chunks.iter().map(|chunk| Ok(chunk.to_string())).collect(),
            ..Self::default()
        }
    }

    pub fn summary_calls(&self) -> Vec<(String, String)> {
        self.summary_calls.lock().unwrap().clone()
    }

    pub fn chat_calls(&self) -> Vec<(Vec<ChatMessage>, String)> {
        self.chat_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate_summary(
        &self,
        base_text: &str,
        modifying_text: &str,
    ) -> Result<String, ServiceError> {
        self.summary_calls
            .lock()
            .unwrap()
            .push((base_text.to_string(), modifying_text.to_string()));
        if let Some(delay) = self.summary_delay {
            tokio::time::sleep(delay).await;
        }
        self.summary
            .clone()
            .unwrap_or(Err(ServiceError::EmptyResponse))
    }

    async fn stream_chat_reply(
        &self,
        history: &[ChatMessage],
        new_message: &str,
    ) -> Result<TextChunkStream, ServiceError> {
        self.chat_calls
            .lock()
            .unwrap()
            .push((history.to_vec(), new_message.to_string()));
        if let Some(err) = self.chat_start_error.clone() {
            return Err(err);
        }
        Ok(stream::iter(self.chat_chunks.clone()).boxed())
    }
}

pub fn seeded_memory_repo() -> InMemoryNormRepository {
    let repo = InMemoryNormRepository::new();
    seed(&repo);
    repo
}

pub fn seeded_sqlite_repo() -> SqliteNormRepository {
    let repo = SqliteNormRepository::open_in_memory().unwrap();
    seed(&repo);
    repo
}

fn seed<R: NormRepository>(repo: &R) {
    let fixtures = load_fixtures().unwrap();
    seed_repository(repo, &fixtures.norms).unwrap();
}

pub fn login(username: &str) -> User {
    let fixtures = load_fixtures().unwrap();
    fixtures
        .directory()
        .authenticate(username, "secret")
        .unwrap()
}
