use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, Course, CourseId, EnrollmentId, UserId};

/// Profile details copied onto a provisioned learner account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub full_name: String,
    pub phone: String,
    pub country: String,
    pub city: String,
}

/// Result of provisioning (or reusing) a learner account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedUser {
    pub user_id: UserId,
    pub created: bool,
    pub temp_password: Option<String>,
}

/// Account and enrollment management owned by the wider LMS.
pub trait IdentityDirectory: Send + Sync {
    fn get_or_create_user(
        &self,
        email: &str,
        profile: &UserProfile,
    ) -> Result<ProvisionedUser, DirectoryError>;

    /// Fails with [`DirectoryError::AlreadyEnrolled`] when an active enrollment exists.
    fn create_enrollment(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<EnrollmentId, DirectoryError>;

    /// Compensates a created enrollment when the surrounding status write fails.
    fn remove_enrollment(&self, enrollment_id: &EnrollmentId) -> Result<(), DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("user {user_id:?} is already enrolled in course {course_id}")]
    AlreadyEnrolled { user_id: UserId, course_id: CourseId },
    #[error("identity directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApplicationReceived,
    ApplicationApproved,
    ApplicationRejected,
    ApplicationWaitlisted,
}

impl NotificationKind {
    pub const fn template(self) -> &'static str {
        match self {
            NotificationKind::ApplicationReceived => "application_received",
            NotificationKind::ApplicationApproved => "application_approved",
            NotificationKind::ApplicationRejected => "application_rejected",
            NotificationKind::ApplicationWaitlisted => "application_waitlisted",
        }
    }
}

/// Outbound message handed to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub application_id: ApplicationId,
    pub context: BTreeMap<String, String>,
}

/// Email (or other channel) delivery. Retries belong to the implementation.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotificationFailure>;
}

#[derive(Debug, thiserror::Error)]
#[error("notification '{template}' to {recipient} failed: {reason}")]
pub struct NotificationFailure {
    pub template: &'static str,
    pub recipient: String,
    pub reason: String,
}

/// Course offering lookup; also the source of the regional bonus country list.
pub trait CourseCatalog: Send + Sync {
    fn get_course(&self, course_id: &CourseId) -> Result<Course, CatalogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("course {0} not found")]
    NotFound(CourseId),
    #[error("course catalog unavailable: {0}")]
    Unavailable(String),
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
