//! Runtime configuration read from the environment.
//!
//! # Invariants
//! - `API_KEY` is mandatory; startup fails without it.
//! - The key is never logged or shown by `Debug`.

use crate::textgen::gemini::{
    DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SUMMARY_MODEL,
};
use crate::textgen::GeminiConfig;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::time::Duration;

pub const API_KEY_VAR: &str = "API_KEY";
pub const BASE_URL_VAR: &str = "LEXDIN_API_BASE_URL";
pub const SUMMARY_MODEL_VAR: &str = "LEXDIN_SUMMARY_MODEL";
pub const CHAT_MODEL_VAR: &str = "LEXDIN_CHAT_MODEL";
pub const REQUEST_TIMEOUT_VAR: &str = "LEXDIN_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingApiKey,
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "{API_KEY_VAR} is not set"),
            Self::InvalidValue { key, value } => write!(f, "invalid value for {key}: `{value}`"),
        }
    }
}

impl Error for ConfigError {}

/// Settings for the external text service.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub summary_model: String,
    pub chat_model: String,
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = get(API_KEY_VAR).ok_or(ConfigError::MissingApiKey)?;
        let request_timeout = match get(REQUEST_TIMEOUT_VAR) {
            None => DEFAULT_REQUEST_TIMEOUT,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: REQUEST_TIMEOUT_VAR,
                        value: raw,
                    })
                }
            },
        };

        Ok(Self {
            api_key,
            api_base_url: get(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            summary_model: get(SUMMARY_MODEL_VAR)
                .unwrap_or_else(|| DEFAULT_SUMMARY_MODEL.to_string()),
            chat_model: get(CHAT_MODEL_VAR).unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            request_timeout,
        })
    }

    pub fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig {
            base_url: self.api_base_url.clone(),
            api_key: self.api_key.clone(),
            summary_model: self.summary_model.clone(),
            chat_model: self.chat_model.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

impl Debug for AppConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("summary_model", &self.summary_model)
            .field("chat_model", &self.chat_model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
