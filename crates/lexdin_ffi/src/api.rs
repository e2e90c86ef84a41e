//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose use-case-level functions for browsing norms, signing in,
//!   applying modifications and chatting.
//! - Flatten core results into response envelopes with `ok` + `message`.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - The caller identifies itself per call by `user_id`; no session state
//!   lives on this side.
//! - Confidential content never appears in an envelope for a caller that
//!   cannot view it.
//! - The store lock is never held across an `.await`.

use lexdin_core::fixtures::{load_fixtures, seed_repository};
use lexdin_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    AppConfig, ChatMessage, ChatOutcome, ChatRole, ChatSession, DirectoryIdentityProvider,
    GeminiClient, IdentityProvider, ModificationWorkflow, NormCard, NormService, NormView,
    SqliteNormRepository, User, Version, WorkflowError,
};
use log::warn;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct Store {
    path: PathBuf,
    repo: Mutex<SqliteNormRepository>,
    directory: DirectoryIdentityProvider,
}

static STORE: OnceCell<Store> = OnceCell::new();
static TEXT_SERVICE: OnceCell<GeminiClient> = OnceCell::new();

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Returns an empty string on success and an error message on failure.
/// Repeating the call with the same `level + log_dir` is a no-op.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str(), false) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Opens the norm database at `db_path` and seeds the fixture norms.
///
/// # FFI contract
/// - Sync call; migrates and seeds on first use of a file.
/// - Idempotent for the same path; a different path is rejected.
/// - Returns an empty string on success and an error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_store(db_path: String) -> String {
    let path = PathBuf::from(db_path.trim());
    let result = STORE.get_or_try_init(|| open_store(path.clone()));
    match result {
        Ok(store) if store.path == path => String::new(),
        Ok(store) => format!(
            "store already open at `{}`; refusing to switch to `{}`",
            store.path.display(),
            path.display()
        ),
        Err(err) => err,
    }
}

/// Builds the text-service client from environment configuration.
///
/// Returns an empty string on success. Fails when `API_KEY` is missing.
#[flutter_rust_bridge::frb(sync)]
pub fn init_text_service() -> String {
    let result = TEXT_SERVICE.get_or_try_init(|| {
        let config = AppConfig::from_env().map_err(|err| err.to_string())?;
        GeminiClient::new(config.gemini_config()).map_err(|err| err.to_string())
    });
    match result {
        Ok(_) => String::new(),
        Err(err) => err,
    }
}

/// Signed-in user as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub ok: bool,
    pub user_id: Option<String>,
    pub username: Option<String>,
    /// `DIRECTIVO` or `ADMIN`.
    pub role: Option<String>,
    pub message: String,
}

/// Resolves username + credential to a user.
#[flutter_rust_bridge::frb(sync)]
pub fn auth_login(username: String, password: String) -> AuthResponse {
    let outcome = with_store(|store| {
        store
            .directory
            .authenticate(&username, &password)
            .map_err(|err| err.to_string())
    });
    match outcome {
        Ok(user) => AuthResponse {
            ok: true,
            user_id: Some(user.id().to_string()),
            username: Some(user.username().to_string()),
            role: Some(user.role().as_str().to_string()),
            message: "Signed in.".to_string(),
        },
        Err(message) => AuthResponse {
            ok: false,
            user_id: None,
            username: None,
            role: None,
            message,
        },
    }
}

/// One norm in the list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormListItem {
    pub id: String,
    pub title: String,
    pub short_title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub is_confidential: bool,
    pub accessible: bool,
    pub latest_version: u32,
    /// RFC 3339.
    pub last_updated: String,
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormListResponse {
    pub ok: bool,
    pub items: Vec<NormListItem>,
    pub message: String,
}

/// Lists norms matching `query` for the caller.
///
/// An unknown `user_id` is treated as anonymous.
#[flutter_rust_bridge::frb(sync)]
pub fn norms_list(user_id: Option<String>, query: String) -> NormListResponse {
    let outcome = with_store(|store| {
        let user = resolve_user(store, user_id.as_deref());
        let repo = lock_repo(store);
        NormService::new(&*repo)
            .list_norms(user.as_ref(), &query)
            .map_err(|err| format!("norms_list failed: {err}"))
    });
    match outcome {
        Ok(cards) => NormListResponse {
            ok: true,
            message: format!("Found {} norm(s).", cards.len()),
            items: cards.into_iter().map(to_list_item).collect(),
        },
        Err(message) => NormListResponse {
            ok: false,
            items: Vec::new(),
            message,
        },
    }
}

/// One entry of a norm's version history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionItem {
    pub version: u32,
    /// RFC 3339.
    pub date: String,
    pub modifying_norm_id: Option<String>,
    pub modifying_norm_title: Option<String>,
    pub summary: Option<String>,
    pub applied_by: Option<String>,
}

/// Norm detail envelope.
///
/// When `restricted` is true only the descriptive fields are filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormDetailResponse {
    pub ok: bool,
    pub restricted: bool,
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub is_confidential: bool,
    pub selected_version: Option<u32>,
    pub content: Option<String>,
    pub versions: Vec<VersionItem>,
    pub message: String,
}

impl NormDetailResponse {
    fn failure(id: String, message: String) -> Self {
        Self {
            ok: false,
            restricted: false,
            id,
            title: String::new(),
            description: String::new(),
            tags: Vec::new(),
            is_confidential: false,
            selected_version: None,
            content: None,
            versions: Vec::new(),
            message,
        }
    }
}

/// Opens one norm at `version` (latest when `None`).
#[flutter_rust_bridge::frb(sync)]
pub fn norm_detail(norm_id: String, user_id: Option<String>, version: Option<u32>) -> NormDetailResponse {
    let outcome = with_store(|store| {
        let user = resolve_user(store, user_id.as_deref());
        let repo = lock_repo(store);
        NormService::new(&*repo)
            .view_norm(&norm_id, user.as_ref(), version)
            .map_err(|err| format!("norm_detail failed: {err}"))
    });
    match outcome {
        Ok(NormView::Restricted(header)) => NormDetailResponse {
            ok: true,
            restricted: true,
            id: header.id,
            title: header.title,
            description: header.description,
            tags: header.tags,
            is_confidential: header.is_confidential,
            selected_version: None,
            content: None,
            versions: Vec::new(),
            message: "Restricted: requires DIRECTIVO or ADMIN.".to_string(),
        },
        Ok(NormView::Visible { norm, selected }) => NormDetailResponse {
            ok: true,
            restricted: false,
            versions: norm.versions().iter().map(to_version_item).collect(),
            id: norm.id,
            title: norm.title,
            description: norm.description,
            tags: norm.tags,
            is_confidential: norm.is_confidential,
            selected_version: Some(selected.version),
            content: Some(selected.content),
            message: String::new(),
        },
        Err(message) => NormDetailResponse::failure(norm_id, message),
    }
}

/// Possible modifying norm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateListResponse {
    pub ok: bool,
    pub items: Vec<CandidateItem>,
    pub message: String,
}

/// Lists norms that may be applied to `target_id`. Requires `ADMIN`.
#[flutter_rust_bridge::frb(sync)]
pub fn norm_candidates(user_id: Option<String>, target_id: String) -> CandidateListResponse {
    let outcome = with_store(|store| -> Result<_, CallError> {
        let user = resolve_user(store, user_id.as_deref());
        let repo = lock_repo(store);
        let workflow = ModificationWorkflow::open(&*repo, &target_id, user.as_ref())?;
        Ok(workflow.candidates(&*repo)?)
    });
    match outcome {
        Ok(candidates) => CandidateListResponse {
            ok: true,
            message: format!("Found {} candidate(s).", candidates.len()),
            items: candidates
                .into_iter()
                .map(|candidate| CandidateItem {
                    id: candidate.id,
                    title: candidate.title,
                })
                .collect(),
        },
        Err(err) => CandidateListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("norm_candidates failed: {err}"),
        },
    }
}

/// Generic action envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Summary text, new version number or reply, depending on the call.
    pub value: Option<String>,
    pub message: String,
}

impl ActionResponse {
    fn success(value: String, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            value: Some(value),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            value: None,
            message: message.into(),
        }
    }
}

/// Asks the text service to summarize what `modifying_id` changes in
/// `target_id`. Requires `ADMIN` and [`init_text_service`].
pub async fn norm_summarize_change(
    user_id: Option<String>,
    target_id: String,
    modifying_id: String,
) -> ActionResponse {
    let Some(client) = TEXT_SERVICE.get() else {
        return ActionResponse::failure("text service not initialized");
    };
    let prepared = with_store(|store| -> Result<_, CallError> {
        let user = resolve_user(store, user_id.as_deref());
        let repo = lock_repo(store);
        let mut workflow = ModificationWorkflow::open(&*repo, &target_id, user.as_ref())?;
        workflow.select_modifying_norm(&*repo, &modifying_id)?;
        Ok(workflow)
    });
    let mut workflow = match prepared {
        Ok(workflow) => workflow,
        Err(err) => return ActionResponse::failure(format!("norm_summarize_change failed: {err}")),
    };

    match workflow.request_summary(client).await {
        Ok(summary) => ActionResponse::success(summary.to_string(), "Summary ready."),
        Err(err) => ActionResponse::failure(format!("norm_summarize_change failed: {err}")),
    }
}

/// Appends a new version of `target_id` carrying `content` and `summary`.
///
/// `expected_version` is the version the UI drafted against; when it is no
/// longer current the call fails with a version conflict and writes nothing.
#[flutter_rust_bridge::frb(sync)]
pub fn norm_apply_modification(
    user_id: Option<String>,
    target_id: String,
    modifying_id: String,
    content: String,
    summary: String,
    expected_version: u32,
) -> ActionResponse {
    let outcome = with_store(|store| -> Result<_, CallError> {
        let user = resolve_user(store, user_id.as_deref());
        let repo = lock_repo(store);
        let mut workflow = ModificationWorkflow::open(&*repo, &target_id, user.as_ref())?;
        if expected_version != workflow.expected_version() {
            return Err(WorkflowError::ConflictingVersion {
                norm_id: target_id.clone(),
                expected: expected_version,
                actual: workflow.expected_version(),
            }
            .into());
        }
        workflow.select_modifying_norm(&*repo, &modifying_id)?;
        workflow.edit_draft(content)?;
        workflow.accept_summary(summary)?;
        Ok(workflow.submit(&*repo)?)
    });
    match outcome {
        Ok(norm) => {
            let version = norm.current_version().version;
            ActionResponse::success(version.to_string(), format!("Version {version} created."))
        }
        Err(err) => ActionResponse::failure(format!("norm_apply_modification failed: {err}")),
    }
}

/// One chat turn kept by the UI between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    /// `user` or `model`.
    pub role: String,
    pub text: String,
}

/// Sends `message` with prior `history` and returns the full reply.
///
/// Service failures come back as `ok = true` with the fallback apology as
/// `value`, matching what the conversation records.
pub async fn chat_send(history: Vec<ChatTurn>, message: String) -> ActionResponse {
    let Some(client) = TEXT_SERVICE.get() else {
        return ActionResponse::failure("text service not initialized");
    };
    let history = history
        .into_iter()
        .map(|turn| ChatMessage {
            role: if turn.role.eq_ignore_ascii_case("model") {
                ChatRole::Model
            } else {
                ChatRole::User
            },
            text: turn.text,
        })
        .collect();
    let mut session = ChatSession::with_history(history);

    match session.send(client, &message, |_| {}).await {
        Ok(ChatOutcome::Replied(reply)) => ActionResponse::success(reply, ""),
        Ok(ChatOutcome::Failed { error, reply }) => {
            warn!("event=chat_send module=ffi status=fallback error={error}");
            ActionResponse::success(reply, error.to_string())
        }
        Err(err) => ActionResponse::failure(err.to_string()),
    }
}

type CallError = Box<dyn std::error::Error + Send + Sync>;

fn open_store(path: PathBuf) -> Result<Store, String> {
    if path.as_os_str().is_empty() {
        return Err("db_path cannot be empty".to_string());
    }
    let fixtures = load_fixtures().map_err(|err| err.to_string())?;
    let repo = SqliteNormRepository::open(&path).map_err(|err| format!("store open failed: {err}"))?;
    seed_repository(&repo, &fixtures.norms).map_err(|err| format!("store seed failed: {err}"))?;
    Ok(Store {
        path,
        repo: Mutex::new(repo),
        directory: fixtures.directory(),
    })
}

fn with_store<T, E>(f: impl FnOnce(&Store) -> Result<T, E>) -> Result<T, E>
where
    E: From<&'static str>,
{
    match STORE.get() {
        Some(store) => f(store),
        None => Err(E::from("store not initialized; call init_store first")),
    }
}

fn lock_repo(store: &Store) -> MutexGuard<'_, SqliteNormRepository> {
    store.repo.lock().unwrap_or_else(PoisonError::into_inner)
}

fn resolve_user(store: &Store, user_id: Option<&str>) -> Option<User> {
    user_id.and_then(|id| store.directory.find_by_id(id.trim()).cloned())
}

fn to_list_item(card: NormCard) -> NormListItem {
    NormListItem {
        id: card.id,
        title: card.title,
        short_title: card.short_title,
        description: card.description,
        tags: card.tags,
        is_confidential: card.is_confidential,
        accessible: card.accessible,
        latest_version: card.latest_version,
        last_updated: card.last_updated.to_rfc3339(),
        excerpt: card.excerpt,
    }
}

fn to_version_item(version: &Version) -> VersionItem {
    let modification = version.modification.as_ref();
    VersionItem {
        version: version.version,
        date: version.date.to_rfc3339(),
        modifying_norm_id: modification.map(|m| m.modifying_norm_id.clone()),
        modifying_norm_title: modification.map(|m| m.modifying_norm_title.clone()),
        summary: modification.map(|m| m.summary.clone()),
        applied_by: modification.map(|m| m.applied_by.clone()),
    }
}
