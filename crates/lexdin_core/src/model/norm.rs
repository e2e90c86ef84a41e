//! Norm domain model.
//!
//! # Responsibility
//! - Define the norm record and its append-only version log.
//! - Provide the pure append operation used by every repository.
//!
//! # Invariants
//! - `versions` is non-empty and numbered `1..=len` with no gaps.
//! - The current content of a norm is always the last version.
//! - A modification never references the norm it belongs to.
//! - Tags are trimmed, lowercased and deduplicated.

use crate::model::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable norm identifier (e.g. `reg-acad-001`).
pub type NormId = String;

/// Record that a version was produced by applying another norm.
///
/// `modifying_norm_title` is the title captured at application time, not a
/// live reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modification {
    pub modifying_norm_id: NormId,
    pub modifying_norm_title: String,
    pub summary: String,
    pub applied_by: UserId,
    pub applied_at: DateTime<Utc>,
}

/// One immutable snapshot of a norm's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub version: u32,
    pub content: String,
    pub date: DateTime<Utc>,
    pub modification: Option<Modification>,
}

/// Descriptive fields of a norm, without its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormHeader {
    pub id: NormId,
    pub title: String,
    pub short_title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub is_confidential: bool,
}

/// Regulatory document tracked as an append-only sequence of versions.
///
/// Header fields are public; the version log is only reachable through
/// read accessors and [`Norm::with_appended_version`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "NormRecord")]
pub struct Norm {
    pub id: NormId,
    pub title: String,
    pub short_title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub is_confidential: bool,
    versions: Vec<Version>,
}

/// Unchecked wire shape; converted into [`Norm`] through validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NormRecord {
    id: NormId,
    title: String,
    short_title: String,
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    is_confidential: bool,
    versions: Vec<Version>,
}

impl TryFrom<NormRecord> for Norm {
    type Error = NormValidationError;

    fn try_from(value: NormRecord) -> Result<Self, Self::Error> {
        Norm::from_versions(
            NormHeader {
                id: value.id,
                title: value.title,
                short_title: value.short_title,
                description: value.description,
                tags: value.tags,
                is_confidential: value.is_confidential,
            },
            value.versions,
        )
    }
}

/// Validation errors for norm invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormValidationError {
    EmptyId,
    EmptyTitle(NormId),
    NoVersions(NormId),
    /// Version numbers must be `1..=n` in order.
    VersionSequence {
        norm_id: NormId,
        expected: u32,
        found: u32,
    },
    SelfModification {
        norm_id: NormId,
        version: u32,
    },
}

impl Display for NormValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "norm id must not be empty"),
            Self::EmptyTitle(id) => write!(f, "norm {id} must have a title"),
            Self::NoVersions(id) => write!(f, "norm {id} must have at least one version"),
            Self::VersionSequence {
                norm_id,
                expected,
                found,
            } => write!(
                f,
                "norm {norm_id} has version {found} where version {expected} was expected"
            ),
            Self::SelfModification { norm_id, version } => write!(
                f,
                "norm {norm_id} version {version} records itself as modifying norm"
            ),
        }
    }
}

impl Error for NormValidationError {}

impl Norm {
    /// Creates a norm with a single, unmodified first version.
    pub fn new(header: NormHeader, content: impl Into<String>, date: DateTime<Utc>) -> Self {
        let NormHeader {
            id,
            title,
            short_title,
            description,
            tags,
            is_confidential,
        } = header;
        Self {
            id,
            title,
            short_title,
            description,
            tags: normalize_tags(&tags),
            is_confidential,
            versions: vec![Version {
                version: 1,
                content: content.into(),
                date,
                modification: None,
            }],
        }
    }

    /// Rebuilds a norm from a stored version log.
    ///
    /// # Errors
    /// - Any invariant listed in the module docs is violated.
    pub fn from_versions(
        header: NormHeader,
        versions: Vec<Version>,
    ) -> Result<Self, NormValidationError> {
        let norm = Self {
            id: header.id,
            title: header.title,
            short_title: header.short_title,
            description: header.description,
            tags: normalize_tags(&header.tags),
            is_confidential: header.is_confidential,
            versions,
        };
        norm.validate()?;
        Ok(norm)
    }

    /// Checks the norm invariants.
    pub fn validate(&self) -> Result<(), NormValidationError> {
        if self.id.trim().is_empty() {
            return Err(NormValidationError::EmptyId);
        }
        if self.title.trim().is_empty() {
            return Err(NormValidationError::EmptyTitle(self.id.clone()));
        }
        if self.versions.is_empty() {
            return Err(NormValidationError::NoVersions(self.id.clone()));
        }

        for (expected, version) in (1u32..).zip(self.versions.iter()) {
            if version.version != expected {
                return Err(NormValidationError::VersionSequence {
                    norm_id: self.id.clone(),
                    expected,
                    found: version.version,
                });
            }
            if let Some(modification) = version.modification.as_ref() {
                if modification.modifying_norm_id == self.id {
                    return Err(NormValidationError::SelfModification {
                        norm_id: self.id.clone(),
                        version: version.version,
                    });
                }
            }
        }

        Ok(())
    }

    /// Returns descriptive fields without history.
    pub fn header(&self) -> NormHeader {
        NormHeader {
            id: self.id.clone(),
            title: self.title.clone(),
            short_title: self.short_title.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            is_confidential: self.is_confidential,
        }
    }

    /// Full version log, oldest first.
    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    /// Latest version.
    ///
    /// # Panics
    /// Only if the non-empty invariant was broken, which every constructor
    /// rules out.
    pub fn current_version(&self) -> &Version {
        match self.versions.last() {
            Some(version) => version,
            None => unreachable!("norm {} has an empty version log", self.id),
        }
    }

    /// First version; the text the norm was enacted with.
    pub fn first_version(&self) -> &Version {
        match self.versions.first() {
            Some(version) => version,
            None => unreachable!("norm {} has an empty version log", self.id),
        }
    }

    /// Looks up one version by number.
    pub fn version(&self, number: u32) -> Option<&Version> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.versions.get(index)
    }

    /// Returns a new norm value with one more version; `self` is untouched.
    ///
    /// The new version number is `current_version().version + 1`.
    pub fn with_appended_version(
        &self,
        content: impl Into<String>,
        modification: Option<Modification>,
        date: DateTime<Utc>,
    ) -> Norm {
        let mut next = self.clone();
        next.versions.push(Version {
            version: self.current_version().version + 1,
            content: content.into(),
            date,
            modification,
        });
        next
    }
}

/// Normalizes one tag value.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes and deduplicates tag values, sorted by name.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut unique = BTreeSet::new();
    for tag in tags {
        if let Some(value) = normalize_tag(tag) {
            unique.insert(value);
        }
    }
    unique.into_iter().collect()
}
