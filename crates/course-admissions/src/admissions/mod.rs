//! Course application intake, applicant scoring and ranking, and the admission workflow.

pub mod collaborators;
pub mod domain;
pub mod error;
pub mod import;
pub mod memory;
pub mod normalizer;
pub mod query;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use collaborators::{
    CatalogError, Clock, CourseCatalog, DirectoryError, IdentityDirectory, Notification,
    NotificationFailure, NotificationKind, Notifier, ProvisionedUser, SystemClock, UserProfile,
};
pub use domain::{
    ApplicantRecord, Application, ApplicationId, ApplicationStatus, ApplicationSummary, Course,
    CourseId, EnrollmentId, NewApplication, ReviewerId, UserId,
};
pub use error::{AdmissionError, DuplicateApplicationError, WorkflowAction};
pub use normalizer::{FieldError, FieldNormalizer, ValidationError};
pub use query::{ApplicationFilter, ApplicationQuery, ApplicationStatistics, Page, SortKey, SortOrder};
pub use repository::{ApplicationRepository, RepositoryError};
pub use router::application_router;
pub use scoring::{RiskCategory, ScoreSet, ScoringEngine};
pub use service::{AdmissionService, RecalculationReport, SubmissionReceipt};
pub use workflow::{
    AdmissionWorkflow, BulkFailure, BulkReport, BulkRequest, BulkSuccess, ReviewDecision,
    TransitionOutcome, MAX_BULK_BATCH,
};
