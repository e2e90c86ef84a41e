//! Norm read use-cases.
//!
//! # Responsibility
//! - List norms as cards with per-caller accessibility.
//! - Serve norm detail with confidential content withheld when required.
//!
//! # Invariants
//! - Content of a norm the caller cannot view never leaves this service;
//!   restricted callers get the header only, and cards carry no excerpt.
//! - Card order is `title ASC, id ASC`.

use crate::access::can_view;
use crate::model::norm::{Norm, NormHeader, NormId, Version};
use crate::model::user::User;
use crate::repo::norm_repo::{NormRepository, RepoError};
use crate::search::{derive_excerpt, matches_query};
use chrono::{DateTime, Utc};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for norm read use-cases.
#[derive(Debug)]
pub enum NormServiceError {
    NormNotFound(NormId),
    VersionNotFound { norm_id: NormId, version: u32 },
    Repo(RepoError),
}

impl Display for NormServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NormNotFound(id) => write!(f, "norm not found: {id}"),
            Self::VersionNotFound { norm_id, version } => {
                write!(f, "norm {norm_id} has no version {version}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NormServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NormServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NormNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// List item for one norm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormCard {
    pub id: NormId,
    pub title: String,
    pub short_title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub is_confidential: bool,
    /// Whether the caller may open the content.
    pub accessible: bool,
    pub latest_version: u32,
    pub last_updated: DateTime<Utc>,
    /// Plain-text excerpt of the current content; `None` when not accessible.
    pub excerpt: Option<String>,
}

/// Detail result for one norm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormView {
    /// Caller may read the content.
    Visible {
        norm: Norm,
        /// Requested version, or the latest one.
        selected: Version,
    },
    /// Content withheld; descriptive fields only.
    Restricted(NormHeader),
}

/// Read-side facade over a norm repository.
pub struct NormService<R: NormRepository> {
    repo: R,
}

impl<R: NormRepository> NormService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Gets one norm by id, failing with `NormNotFound`.
    pub fn get_norm(&self, id: &str) -> Result<Norm, NormServiceError> {
        Ok(self.repo.require_norm(id)?)
    }

    /// Lists norms matching `query` as cards for `user`.
    pub fn list_norms(
        &self,
        user: Option<&User>,
        query: &str,
    ) -> Result<Vec<NormCard>, NormServiceError> {
        let mut cards: Vec<NormCard> = self
            .repo
            .list_norms()?
            .into_iter()
            .filter(|norm| matches_query(norm, query))
            .map(|norm| to_card(norm, user))
            .collect();
        cards.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(cards)
    }

    /// Opens one norm for `user`, optionally at a given version.
    ///
    /// # Errors
    /// - `NormNotFound` for an unknown id.
    /// - `VersionNotFound` for an unknown version of a visible norm.
    pub fn view_norm(
        &self,
        id: &str,
        user: Option<&User>,
        version: Option<u32>,
    ) -> Result<NormView, NormServiceError> {
        let norm = self.get_norm(id)?;
        if !can_view(&norm, user) {
            info!(
                "event=norm_view module=service status=restricted norm_id={} role={}",
                norm.id,
                user.map_or("anonymous", |user| user.role().as_str())
            );
            return Ok(NormView::Restricted(norm.header()));
        }

        let selected = match version {
            None => norm.current_version().clone(),
            Some(number) => norm
                .version(number)
                .cloned()
                .ok_or_else(|| NormServiceError::VersionNotFound {
                    norm_id: norm.id.clone(),
                    version: number,
                })?,
        };
        Ok(NormView::Visible { norm, selected })
    }
}

fn to_card(norm: Norm, user: Option<&User>) -> NormCard {
    let accessible = can_view(&norm, user);
    let current = norm.current_version();
    let latest_version = current.version;
    let last_updated = current.date;
    let excerpt = if accessible {
        derive_excerpt(&current.content)
    } else {
        None
    };

    NormCard {
        id: norm.id,
        title: norm.title,
        short_title: norm.short_title,
        description: norm.description,
        tags: norm.tags,
        is_confidential: norm.is_confidential,
        accessible,
        latest_version,
        last_updated,
        excerpt,
    }
}
