//! Gemini HTTP client.
//!
//! # Responsibility
//! - Issue `generateContent` and `streamGenerateContent` calls.
//! - Map HTTP and payload failures onto [`ServiceError`].
//!
//! # Invariants
//! - The API key travels only in the `x-goog-api-key` header and is never
//!   logged or included in error messages.
//! - Prompts and replies are never logged; only sizes and durations.

use super::prompt::build_summary_prompt;
use super::sse::text_chunks;
use super::{ChatMessage, ServiceError, TextChunkStream, TextGenerator};
use async_trait::async_trait;
use futures::StreamExt;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::time::{Duration, Instant};

const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Default model for change summaries.
pub const DEFAULT_SUMMARY_MODEL: &str = "gemini-2.5-pro";
/// Default model for chat and grounded search.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for [`GeminiClient`].
#[derive(Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    pub summary_model: String,
    pub chat_model: String,
    pub request_timeout: Duration,
}

impl GeminiConfig {
    /// Config with default models and timeout.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            summary_model: DEFAULT_SUMMARY_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Debug for GeminiConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("summary_model", &self.summary_model)
            .field("chat_model", &self.chat_model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Web source backing a grounded answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    pub title: Option<String>,
}

/// Answer to a search-grounded query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundedAnswer {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// HTTP client for the Gemini generative-language API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ServiceError> {
        if config.api_key.trim().is_empty() {
            return Err(ServiceError::InvalidConfig("api key is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .read_timeout(config.request_timeout)
            .build()
            .map_err(|err| ServiceError::InvalidConfig(err.to_string()))?;
        Ok(Self { http, config })
    }

    /// Answers `query` with the search tool enabled and returns the cited
    /// web sources.
    pub async fn grounded_search(&self, query: &str) -> Result<GroundedAnswer, ServiceError> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent::user(query)],
            tools: vec![Tool::google_search()],
        };
        let response = self
            .generate("grounded_search", &self.config.chat_model, &request)
            .await?;

        let sources: Vec<GroundingSource> = response
            .candidates
            .first()
            .and_then(|candidate| candidate.grounding_metadata.as_ref())
            .map(|metadata| {
                metadata
                    .grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .filter_map(|web| {
                        web.uri.clone().map(|uri| GroundingSource {
                            uri,
                            title: web.title.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(GroundedAnswer {
            text: non_empty(response.text())?,
            sources,
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1beta/models/{model}:{method}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn generate(
        &self,
        op: &'static str,
        model: &str,
        request: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse, ServiceError> {
        let started_at = Instant::now();
        info!("event=textgen_request module=textgen status=start op={op} model={model}");

        let result = async {
            let response = self
                .http
                .post(self.endpoint(model, "generateContent"))
                .header(API_KEY_HEADER, &self.config.api_key)
                .timeout(self.config.request_timeout)
                .json(request)
                .send()
                .await
                .map_err(transport_error)?;
            let response = ensure_success(response).await?;
            response
                .json::<GenerateContentResponse>()
                .await
                .map_err(|err| ServiceError::Decode(err.to_string()))
        }
        .await;

        match &result {
            Ok(_) => info!(
                "event=textgen_request module=textgen status=ok op={op} model={model} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=textgen_request module=textgen status=error op={op} model={model} duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        result
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_summary(
        &self,
        base_text: &str,
        modifying_text: &str,
    ) -> Result<String, ServiceError> {
        let prompt = build_summary_prompt(base_text, modifying_text);
        let request = GenerateContentRequest {
            contents: vec![RequestContent::user(&prompt)],
            tools: Vec::new(),
        };
        let response = self
            .generate("summary", &self.config.summary_model, &request)
            .await?;
        non_empty(response.text())
    }

    async fn stream_chat_reply(
        &self,
        history: &[ChatMessage],
        new_message: &str,
    ) -> Result<TextChunkStream, ServiceError> {
        let mut contents: Vec<RequestContent<'_>> = history
            .iter()
            .map(|message| RequestContent {
                role: message.role.as_str(),
                parts: vec![RequestPart {
                    text: &message.text,
                }],
            })
            .collect();
        contents.push(RequestContent::user(new_message));
        let request = GenerateContentRequest {
            contents,
            tools: Vec::new(),
        };

        let model = &self.config.chat_model;
        info!(
            "event=textgen_request module=textgen status=start op=chat_stream model={model} history_len={}",
            history.len()
        );
        let response = self
            .http
            .post(format!(
                "{}?alt=sse",
                self.endpoint(model, "streamGenerateContent")
            ))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await?;

        let body = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(transport_error)
            })
            .boxed();
        Ok(text_chunks(body))
    }
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    ServiceError::Transport(err.without_url().to_string())
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

fn non_empty(text: String) -> Result<String, ServiceError> {
    if text.trim().is_empty() {
        Err(ServiceError::EmptyResponse)
    } else {
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

impl<'a> RequestContent<'a> {
    fn user(text: &'a str) -> Self {
        Self {
            role: "user",
            parts: vec![RequestPart { text }],
        }
    }
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Tool {
    #[serde(rename = "googleSearch")]
    google_search: GoogleSearch,
}

impl Tool {
    fn google_search() -> Self {
        Self {
            google_search: GoogleSearch {},
        }
    }
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    pub(crate) fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ResponseContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{GeminiClient, GeminiConfig, GenerateContentResponse};
    use crate::textgen::ServiceError;

    #[test]
    fn response_text_concatenates_first_candidate_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}},{"content":{"parts":[{"text":"z"}]}}]}"#,
        )
        .expect("decode");
        assert_eq!(response.text(), "ab");

        let empty: GenerateContentResponse = serde_json::from_str("{}").expect("decode");
        assert_eq!(empty.text(), "");
    }

    #[test]
    fn rejects_empty_api_key_and_redacts_debug_output() {
        let err = GeminiClient::new(GeminiConfig::new("http://localhost", "  "))
            .expect_err("empty key must be rejected");
        assert!(matches!(err, ServiceError::InvalidConfig(_)));

        let config = GeminiConfig::new("http://localhost", "secret-key");
        assert!(!format!("{config:?}").contains("secret-key"));
    }
}
