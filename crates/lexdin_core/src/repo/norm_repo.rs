//! Norm repository contract and in-memory implementation.
//!
//! # Responsibility
//! - Define the keyed collection of append-only version logs.
//! - Map storage failures and stale writes onto semantic errors.
//!
//! # Invariants
//! - Stored versions are never edited or removed.
//! - `append_version` succeeds only when `expected_version` equals the
//!   stored current version; otherwise `ConflictingVersion` and no change.
//! - Every stored norm passes `Norm::validate()`.

use crate::db::DbError;
use crate::model::norm::{normalize_tags, Modification, Norm, NormId, NormValidationError};
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{PoisonError, RwLock};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for norm persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(NormValidationError),
    Db(DbError),
    NotFound(NormId),
    DuplicateNorm(NormId),
    /// Append attempted against a version that is no longer current.
    ConflictingVersion {
        norm_id: NormId,
        expected: u32,
        actual: u32,
    },
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "norm not found: {id}"),
            Self::DuplicateNorm(id) => write!(f, "norm already exists: {id}"),
            Self::ConflictingVersion {
                norm_id,
                expected,
                actual,
            } => write!(
                f,
                "conflicting version for norm {norm_id}: expected current version {expected}, found {actual}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted norm data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "required table missing: {table}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NormValidationError> for RepoError {
    fn from(value: NormValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Input for one append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendVersionRequest {
    pub norm_id: NormId,
    /// Version number the caller based its draft on.
    pub expected_version: u32,
    pub content: String,
    pub modification: Option<Modification>,
    pub date: DateTime<Utc>,
}

/// Keyed collection of append-only norm logs.
///
/// Implementations must never expose a way to edit or delete an existing
/// version; the only write on an existing norm is [`append_version`].
///
/// [`append_version`]: NormRepository::append_version
pub trait NormRepository {
    /// Gets one norm by id.
    fn get_norm(&self, id: &str) -> RepoResult<Option<Norm>>;
    /// Lists all norms ordered by id.
    fn list_norms(&self) -> RepoResult<Vec<Norm>>;
    /// Stores a new norm with its full initial log.
    fn insert_norm(&self, norm: &Norm) -> RepoResult<()>;
    /// Appends one version after an expected-version check and returns the
    /// updated norm.
    fn append_version(&self, request: AppendVersionRequest) -> RepoResult<Norm>;

    /// Gets one norm, failing with `NotFound` when absent.
    fn require_norm(&self, id: &str) -> RepoResult<Norm> {
        self.get_norm(id)?
            .ok_or_else(|| RepoError::NotFound(id.to_string()))
    }
}

impl<R: NormRepository + ?Sized> NormRepository for &R {
    fn get_norm(&self, id: &str) -> RepoResult<Option<Norm>> {
        (**self).get_norm(id)
    }

    fn list_norms(&self) -> RepoResult<Vec<Norm>> {
        (**self).list_norms()
    }

    fn insert_norm(&self, norm: &Norm) -> RepoResult<()> {
        (**self).insert_norm(norm)
    }

    fn append_version(&self, request: AppendVersionRequest) -> RepoResult<Norm> {
        (**self).append_version(request)
    }
}

/// Process-local norm store.
///
/// Appends hold the write lock across check-and-append, so appends are
/// serialized for the whole store.
#[derive(Debug, Default)]
pub struct InMemoryNormRepository {
    norms: RwLock<BTreeMap<NormId, Norm>>,
}

impl InMemoryNormRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.norms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NormRepository for InMemoryNormRepository {
    fn get_norm(&self, id: &str) -> RepoResult<Option<Norm>> {
        let norms = self.norms.read().unwrap_or_else(PoisonError::into_inner);
        Ok(norms.get(id).cloned())
    }

    fn list_norms(&self) -> RepoResult<Vec<Norm>> {
        let norms = self.norms.read().unwrap_or_else(PoisonError::into_inner);
        Ok(norms.values().cloned().collect())
    }

    fn insert_norm(&self, norm: &Norm) -> RepoResult<()> {
        norm.validate()?;
        let mut norms = self.norms.write().unwrap_or_else(PoisonError::into_inner);
        if norms.contains_key(&norm.id) {
            return Err(RepoError::DuplicateNorm(norm.id.clone()));
        }
        let mut stored = norm.clone();
        stored.tags = normalize_tags(&norm.tags);
        norms.insert(norm.id.clone(), stored);
        info!(
            "event=norm_insert module=repo status=ok store=memory norm_id={} versions={}",
            norm.id,
            norm.versions().len()
        );
        Ok(())
    }

    fn append_version(&self, request: AppendVersionRequest) -> RepoResult<Norm> {
        let mut norms = self.norms.write().unwrap_or_else(PoisonError::into_inner);
        let current = norms
            .get(&request.norm_id)
            .ok_or_else(|| RepoError::NotFound(request.norm_id.clone()))?;

        let actual = current.current_version().version;
        if actual != request.expected_version {
            warn!(
                "event=norm_append module=repo status=conflict store=memory norm_id={} expected_version={} actual_version={}",
                request.norm_id, request.expected_version, actual
            );
            return Err(RepoError::ConflictingVersion {
                norm_id: request.norm_id,
                expected: request.expected_version,
                actual,
            });
        }

        let next = current.with_appended_version(request.content, request.modification, request.date);
        next.validate()?;
        norms.insert(next.id.clone(), next.clone());

        info!(
            "event=norm_append module=repo status=ok store=memory norm_id={} version={}",
            next.id,
            next.current_version().version
        );
        Ok(next)
    }
}
