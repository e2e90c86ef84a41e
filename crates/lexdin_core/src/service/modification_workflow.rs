//! Modification-application workflow.
//!
//! # Responsibility
//! - Drive one administrator through applying a modifying norm to a target
//!   norm: select, draft, summarize, submit.
//! - Append exactly one version on successful submission and nothing
//!   otherwise.
//!
//! # Invariants
//! - Only callers passing `can_modify` can open a workflow.
//! - The modifying norm must exist and differ from the target.
//! - Submission requires a non-empty summary and draft.
//! - The append is checked against the target version seen at `open`; a
//!   concurrent append makes submission fail with `ConflictingVersion`.
//! - The modifying norm's title is captured at submission time.
//! - Summary requests are never retried automatically.
//!
//! State machine:
//!
//! ```text
//! open() -> SelectingModifyingNorm -> Drafting -> SummaryRequested -> SummaryReady -> Submitted
//!                     any non-terminal state --abort()--> Aborted
//! ```
//!
//! A dropped `request_summary` future leaves the workflow in
//! `SummaryRequested`; the outcome of that request is never applied.

use crate::access::{authorize_modifier, AccessError};
use crate::model::norm::{Modification, Norm, NormId};
use crate::model::user::User;
use crate::repo::norm_repo::{AppendVersionRequest, NormRepository, RepoError};
use crate::textgen::{ServiceError, TextGenerator};
use chrono::Utc;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

/// Observable workflow phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    SelectingModifyingNorm,
    Drafting,
    /// A summary request is outstanding, or was abandoned by its caller.
    SummaryRequested,
    SummaryReady,
    Submitted,
    Aborted,
}

impl WorkflowState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelectingModifyingNorm => "selecting_modifying_norm",
            Self::Drafting => "drafting",
            Self::SummaryRequested => "summary_requested",
            Self::SummaryReady => "summary_ready",
            Self::Submitted => "submitted",
            Self::Aborted => "aborted",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted | Self::Aborted)
    }
}

impl Display for WorkflowState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow failures.
#[derive(Debug)]
pub enum WorkflowError {
    Forbidden(AccessError),
    /// Unknown norm, or a modifying norm equal to the target.
    NotFound(NormId),
    /// Required field empty at submission.
    Validation(&'static str),
    ConflictingVersion {
        norm_id: NormId,
        expected: u32,
        actual: u32,
    },
    /// Summarization failed; the workflow is back in `Drafting`.
    Service(ServiceError),
    InvalidTransition {
        state: WorkflowState,
        action: &'static str,
    },
    Repo(RepoError),
}

impl Display for WorkflowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "norm not found: {id}"),
            Self::Validation(field) => write!(f, "{field} must not be empty"),
            Self::ConflictingVersion {
                norm_id,
                expected,
                actual,
            } => write!(
                f,
                "norm {norm_id} changed while drafting: based on version {expected}, current is {actual}"
            ),
            Self::Service(err) => write!(f, "{err}"),
            Self::InvalidTransition { state, action } => {
                write!(f, "cannot {action} while workflow is {state}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WorkflowError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Forbidden(err) => Some(err),
            Self::Service(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for WorkflowError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::ConflictingVersion {
                norm_id,
                expected,
                actual,
            } => Self::ConflictingVersion {
                norm_id,
                expected,
                actual,
            },
            other => Self::Repo(other),
        }
    }
}

impl From<AccessError> for WorkflowError {
    fn from(value: AccessError) -> Self {
        Self::Forbidden(value)
    }
}

/// Norm offered as a possible modifying norm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyingCandidate {
    pub id: NormId,
    pub title: String,
}

#[derive(Debug, Clone)]
struct ModifyingSelection {
    id: NormId,
    /// First version's content; the text of the modifying act itself.
    enacted_content: String,
}

/// One in-progress application of a modifying norm to a target norm.
#[derive(Debug, Clone)]
pub struct ModificationWorkflow {
    session_id: Uuid,
    user: User,
    target_id: NormId,
    base_content: String,
    expected_version: u32,
    modifying: Option<ModifyingSelection>,
    draft: String,
    summary: Option<String>,
    state: WorkflowState,
}

impl ModificationWorkflow {
    /// Opens a workflow on `target_id` for `user`.
    ///
    /// # Errors
    /// - `NotFound` when the target does not exist.
    /// - `Forbidden` when `user` is absent or not `ADMIN`.
    pub fn open<R: NormRepository + ?Sized>(
        repo: &R,
        target_id: &str,
        user: Option<&User>,
    ) -> Result<Self, WorkflowError> {
        let target = repo.require_norm(target_id)?;
        let user = match authorize_modifier(&target, user) {
            Ok(user) => user,
            Err(err) => {
                warn!(
                    "event=workflow_open module=workflow status=forbidden norm_id={}",
                    target.id
                );
                return Err(err.into());
            }
        };

        let current = target.current_version();
        let workflow = Self {
            session_id: Uuid::new_v4(),
            user: user.clone(),
            target_id: target.id.clone(),
            base_content: current.content.clone(),
            expected_version: current.version,
            modifying: None,
            draft: current.content.clone(),
            summary: None,
            state: WorkflowState::SelectingModifyingNorm,
        };
        info!(
            "event=workflow_open module=workflow status=ok session_id={} norm_id={} base_version={} user_id={}",
            workflow.session_id,
            workflow.target_id,
            workflow.expected_version,
            workflow.user.id()
        );
        Ok(workflow)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Target version the draft is based on.
    pub fn expected_version(&self) -> u32 {
        self.expected_version
    }

    pub fn modifying_norm_id(&self) -> Option<&str> {
        self.modifying.as_ref().map(|selection| selection.id.as_str())
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Every norm other than the target, ordered by id.
    pub fn candidates<R: NormRepository + ?Sized>(
        &self,
        repo: &R,
    ) -> Result<Vec<ModifyingCandidate>, WorkflowError> {
        Ok(repo
            .list_norms()?
            .into_iter()
            .filter(|norm| norm.id != self.target_id)
            .map(|norm| ModifyingCandidate {
                id: norm.id,
                title: norm.title,
            })
            .collect())
    }

    /// Selects the modifying norm and moves to `Drafting`.
    ///
    /// Re-selecting discards a summary produced for the previous choice.
    ///
    /// # Errors
    /// - `NotFound` when `modifying_id` is unknown or equals the target.
    pub fn select_modifying_norm<R: NormRepository + ?Sized>(
        &mut self,
        repo: &R,
        modifying_id: &str,
    ) -> Result<(), WorkflowError> {
        self.expect_state(
            "select modifying norm",
            &[
                WorkflowState::SelectingModifyingNorm,
                WorkflowState::Drafting,
                WorkflowState::SummaryRequested,
                WorkflowState::SummaryReady,
            ],
        )?;

        let modifying_id = modifying_id.trim();
        if modifying_id == self.target_id {
            return Err(WorkflowError::NotFound(modifying_id.to_string()));
        }
        let modifying = repo.require_norm(modifying_id)?;

        self.modifying = Some(ModifyingSelection {
            id: modifying.id.clone(),
            enacted_content: modifying.first_version().content.clone(),
        });
        self.summary = None;
        self.state = WorkflowState::Drafting;
        info!(
            "event=workflow_select module=workflow status=ok session_id={} modifying_norm_id={}",
            self.session_id, modifying.id
        );
        Ok(())
    }

    /// Replaces the draft content of the new version.
    pub fn edit_draft(&mut self, content: impl Into<String>) -> Result<(), WorkflowError> {
        self.expect_state(
            "edit draft",
            &[
                WorkflowState::Drafting,
                WorkflowState::SummaryRequested,
                WorkflowState::SummaryReady,
            ],
        )?;
        self.draft = content.into();
        if self.state == WorkflowState::SummaryRequested {
            self.state = WorkflowState::Drafting;
        }
        Ok(())
    }

    /// Asks `generator` to summarize the change and stores the result.
    ///
    /// Sends the target's content at `open` and the modifying norm's first
    /// version content. On failure the workflow returns to `Drafting` and
    /// the error is returned for the caller to surface.
    pub async fn request_summary<G: TextGenerator + ?Sized>(
        &mut self,
        generator: &G,
    ) -> Result<&str, WorkflowError> {
        self.expect_state(
            "request summary",
            &[
                WorkflowState::Drafting,
                WorkflowState::SummaryRequested,
                WorkflowState::SummaryReady,
            ],
        )?;
        let Some(modifying) = self.modifying.as_ref() else {
            return Err(WorkflowError::InvalidTransition {
                state: self.state,
                action: "request summary",
            });
        };

        self.state = WorkflowState::SummaryRequested;
        self.summary = None;
        let started_at = Instant::now();
        info!(
            "event=workflow_summary module=workflow status=start session_id={} base_chars={} modifying_chars={}",
            self.session_id,
            self.base_content.chars().count(),
            modifying.enacted_content.chars().count()
        );

        let result = generator
            .generate_summary(&self.base_content, &modifying.enacted_content)
            .await;

        match result {
            Ok(summary) => {
                info!(
                    "event=workflow_summary module=workflow status=ok session_id={} duration_ms={} summary_chars={}",
                    self.session_id,
                    started_at.elapsed().as_millis(),
                    summary.chars().count()
                );
                self.state = WorkflowState::SummaryReady;
                Ok(self.summary.insert(summary).as_str())
            }
            Err(err) => {
                warn!(
                    "event=workflow_summary module=workflow status=error session_id={} duration_ms={} error={err}",
                    self.session_id,
                    started_at.elapsed().as_millis()
                );
                self.state = WorkflowState::Drafting;
                Err(WorkflowError::Service(err))
            }
        }
    }

    /// Stores a summary produced outside this workflow and moves to
    /// `SummaryReady`.
    pub fn accept_summary(&mut self, summary: impl Into<String>) -> Result<(), WorkflowError> {
        self.expect_state(
            "accept summary",
            &[
                WorkflowState::Drafting,
                WorkflowState::SummaryRequested,
                WorkflowState::SummaryReady,
            ],
        )?;
        self.summary = Some(summary.into());
        self.state = WorkflowState::SummaryReady;
        Ok(())
    }

    /// Appends the drafted version to the target norm.
    ///
    /// # Errors
    /// - `Validation` when summary or draft is blank; state is unchanged.
    /// - `NotFound` when the modifying norm no longer exists.
    /// - `ConflictingVersion` when the target changed since `open`.
    pub fn submit<R: NormRepository + ?Sized>(&mut self, repo: &R) -> Result<Norm, WorkflowError> {
        self.expect_state("submit", &[WorkflowState::SummaryReady])?;
        let summary = self.summary.as_deref().unwrap_or_default();
        if summary.trim().is_empty() {
            return Err(WorkflowError::Validation("summary"));
        }
        if self.draft.trim().is_empty() {
            return Err(WorkflowError::Validation("content"));
        }
        let Some(selection) = self.modifying.as_ref() else {
            return Err(WorkflowError::InvalidTransition {
                state: self.state,
                action: "submit",
            });
        };

        let modifying = repo.require_norm(&selection.id)?;
        let now = Utc::now();
        let request = AppendVersionRequest {
            norm_id: self.target_id.clone(),
            expected_version: self.expected_version,
            content: self.draft.clone(),
            modification: Some(Modification {
                modifying_norm_id: modifying.id,
                modifying_norm_title: modifying.title,
                summary: summary.to_string(),
                applied_by: self.user.id().to_string(),
                applied_at: now,
            }),
            date: now,
        };

        let updated = repo.append_version(request)?;
        self.state = WorkflowState::Submitted;
        info!(
            "event=workflow_submit module=workflow status=ok session_id={} norm_id={} version={}",
            self.session_id,
            updated.id,
            updated.current_version().version
        );
        Ok(updated)
    }

    /// Cancels the workflow and discards all draft state.
    pub fn abort(&mut self) -> Result<(), WorkflowError> {
        if self.state.is_terminal() {
            return Err(WorkflowError::InvalidTransition {
                state: self.state,
                action: "abort",
            });
        }
        info!(
            "event=workflow_abort module=workflow status=ok session_id={} from_state={}",
            self.session_id, self.state
        );
        self.modifying = None;
        self.draft.clear();
        self.summary = None;
        self.state = WorkflowState::Aborted;
        Ok(())
    }

    fn expect_state(
        &self,
        action: &'static str,
        allowed: &[WorkflowState],
    ) -> Result<(), WorkflowError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                state: self.state,
                action,
            })
        }
    }
}
