use serde::{Deserialize, Serialize};

use super::collaborators::{CatalogError, DirectoryError};
use super::domain::{ApplicationId, ApplicationStatus, CourseId};
use super::normalizer::ValidationError;
use super::repository::RepositoryError;

/// An active application for the same email and course already exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("an application for this course already exists ({existing_id} is {existing_status})")]
pub struct DuplicateApplicationError {
    pub existing_id: ApplicationId,
    pub existing_status: ApplicationStatus,
}

/// Reviewer actions that move an application out of `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Approve,
    Reject,
    Waitlist,
    Amend,
}

impl WorkflowAction {
    pub const fn label(self) -> &'static str {
        match self {
            WorkflowAction::Approve => "approve",
            WorkflowAction::Reject => "reject",
            WorkflowAction::Waitlist => "waitlist",
            WorkflowAction::Amend => "amend",
        }
    }
}

/// Error raised by the admission service and workflow.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Duplicate(#[from] DuplicateApplicationError),
    #[error("cannot {} application {id}: status is {current}", .action.label())]
    InvalidStateTransition {
        id: ApplicationId,
        current: ApplicationStatus,
        action: WorkflowAction,
    },
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("applicant is already enrolled in course {course_id}")]
    AlreadyEnrolled { course_id: CourseId },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Directory(DirectoryError),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl AdmissionError {
    /// Stable machine-readable tag used in API bodies and bulk reports.
    pub fn kind(&self) -> &'static str {
        match self {
            AdmissionError::Validation(_) => "validation_error",
            AdmissionError::Duplicate(_) => "duplicate_application",
            AdmissionError::InvalidStateTransition { .. } => "invalid_state_transition",
            AdmissionError::NotFound(_) => "not_found",
            AdmissionError::AlreadyEnrolled { .. } => "already_enrolled",
            AdmissionError::Catalog(CatalogError::NotFound(_)) => "course_not_found",
            AdmissionError::Repository(RepositoryError::StaleState { .. }) => "conflict",
            AdmissionError::Repository(RepositoryError::NotFound) => "not_found",
            AdmissionError::Catalog(_)
            | AdmissionError::Directory(_)
            | AdmissionError::Repository(_) => "unavailable",
        }
    }
}

impl From<DirectoryError> for AdmissionError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::AlreadyEnrolled { course_id, .. } => {
                AdmissionError::AlreadyEnrolled { course_id }
            }
            other => AdmissionError::Directory(other),
        }
    }
}

impl From<RepositoryError> for AdmissionError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::DuplicateActive {
                existing_id,
                existing_status,
            } => AdmissionError::Duplicate(DuplicateApplicationError {
                existing_id,
                existing_status,
            }),
            other => AdmissionError::Repository(other),
        }
    }
}
