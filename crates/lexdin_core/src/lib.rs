//! Core domain logic for Lex Dinámica.
//! This crate is the single source of truth for norm versioning and
//! confidentiality invariants.

pub mod access;
pub mod config;
pub mod db;
pub mod fixtures;
pub mod identity;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod textgen;

pub use access::{can_modify, can_view, AccessAction, AccessError};
pub use config::{AppConfig, ConfigError};
pub use identity::{AuthError, DirectoryIdentityProvider, IdentityProvider};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::norm::{Modification, Norm, NormHeader, NormId, NormValidationError, Version};
pub use model::user::{Role, User, UserId};
pub use repo::norm_repo::{
    AppendVersionRequest, InMemoryNormRepository, NormRepository, RepoError, RepoResult,
};
pub use repo::sqlite_norm_repo::SqliteNormRepository;
pub use service::chat_session::{ChatError, ChatOutcome, ChatSession, CHAT_FALLBACK_REPLY};
pub use service::modification_workflow::{
    ModificationWorkflow, ModifyingCandidate, WorkflowError, WorkflowState,
};
pub use service::norm_service::{NormCard, NormService, NormServiceError, NormView};
pub use textgen::{ChatMessage, ChatRole, GeminiClient, ServiceError, TextGenerator};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
