use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::collaborators::{
    Clock, IdentityDirectory, Notification, NotificationKind, Notifier, UserProfile,
};
use super::domain::{Application, ApplicationId, ApplicationStatus, ReviewerId};
use super::error::{AdmissionError, WorkflowAction};
use super::normalizer::ValidationError;
use super::repository::ApplicationRepository;

/// Largest number of applications a single bulk request may touch.
pub const MAX_BULK_BATCH: usize = 100;

/// Reviewer decision applied to a pending application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject {
        reason: String,
    },
    Waitlist {
        #[serde(default)]
        admin_notes: Option<String>,
    },
}

impl ReviewDecision {
    pub fn action(&self) -> WorkflowAction {
        match self {
            ReviewDecision::Approve => WorkflowAction::Approve,
            ReviewDecision::Reject { .. } => WorkflowAction::Reject,
            ReviewDecision::Waitlist { .. } => WorkflowAction::Waitlist,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            ReviewDecision::Reject { reason } if reason.trim().is_empty() => {
                Err(ValidationError::single("reason", "is required when rejecting"))
            }
            _ => Ok(()),
        }
    }
}

/// Committed transition plus the outcome of the best-effort notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionOutcome {
    pub application: Application,
    pub email_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_created: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRequest {
    #[serde(flatten)]
    pub decision: ReviewDecision,
    pub application_ids: Vec<ApplicationId>,
    pub reviewer: ReviewerId,
    #[serde(default)]
    pub send_email: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkSuccess {
    pub application_id: ApplicationId,
    pub status: ApplicationStatus,
    pub email_sent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub application_id: ApplicationId,
    pub kind: &'static str,
    pub error: String,
}

/// Per-id results of a bulk action; failures never abort sibling items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub successful: Vec<BulkSuccess>,
    pub failed: Vec<BulkFailure>,
}

/// Drives `pending -> approved | rejected | waitlisted`.
///
/// Each transition runs in two phases: a persistence phase that either fully commits
/// (status, review stamps and, for approvals, the enrollment) or leaves nothing behind,
/// followed by a notification phase whose failure is only reported as `email_sent: false`.
pub struct AdmissionWorkflow<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
    directory: Arc<dyn IdentityDirectory>,
    clock: Arc<dyn Clock>,
}

impl<R, N> AdmissionWorkflow<R, N>
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<N>,
        directory: Arc<dyn IdentityDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            notifier,
            directory,
            clock,
        }
    }

    pub fn approve(
        &self,
        id: &ApplicationId,
        reviewer: &ReviewerId,
        send_email: bool,
    ) -> Result<TransitionOutcome, AdmissionError> {
        let mut application = self.load_pending(id, WorkflowAction::Approve)?;
        let applicant = &application.applicant;

        let profile = UserProfile {
            full_name: applicant.full_name.clone(),
            phone: applicant.phone.clone(),
            country: applicant.country.clone(),
            city: applicant.city.clone(),
        };
        let user = self
            .directory
            .get_or_create_user(&applicant.email, &profile)?;
        let enrollment_id = self
            .directory
            .create_enrollment(&user.user_id, &application.course_id)?;

        let now = self.clock.now();
        application.status = ApplicationStatus::Approved;
        application.approved_by = Some(reviewer.clone());
        application.reviewed_by = Some(reviewer.clone());
        application.reviewed_at = Some(now);
        application.updated_at = now;
        application.user_id = Some(user.user_id.clone());
        application.enrollment_id = Some(enrollment_id.clone());

        let application = match self.repository.update(&application) {
            Ok(committed) => committed,
            Err(err) => {
                if let Err(compensation) = self.directory.remove_enrollment(&enrollment_id) {
                    warn!(
                        application_id = %id,
                        enrollment_id = %enrollment_id.0,
                        error = %compensation,
                        "failed to remove enrollment after aborted approval"
                    );
                }
                return Err(err.into());
            }
        };

        info!(
            application_id = %id,
            reviewer = %reviewer.0,
            account_created = user.created,
            "application approved"
        );

        let email_sent = send_email && {
            let mut context = BTreeMap::new();
            context.insert("course_id".to_string(), application.course_id.0.clone());
            context.insert("user_id".to_string(), user.user_id.0.clone());
            if let Some(password) = &user.temp_password {
                context.insert("temp_password".to_string(), password.clone());
            }
            self.dispatch(NotificationKind::ApplicationApproved, &application, context)
        };

        Ok(TransitionOutcome {
            application,
            email_sent,
            account_created: Some(user.created),
        })
    }

    pub fn reject(
        &self,
        id: &ApplicationId,
        reviewer: &ReviewerId,
        reason: &str,
        send_email: bool,
    ) -> Result<TransitionOutcome, AdmissionError> {
        let decision = ReviewDecision::Reject {
            reason: reason.to_string(),
        };
        decision.validate()?;

        let mut application = self.load_pending(id, WorkflowAction::Reject)?;
        let now = self.clock.now();
        application.status = ApplicationStatus::Rejected;
        application.reviewed_by = Some(reviewer.clone());
        application.rejection_reason = Some(reason.trim().to_string());
        application.reviewed_at = Some(now);
        application.updated_at = now;

        let application = self.repository.update(&application)?;
        info!(application_id = %id, reviewer = %reviewer.0, "application rejected");

        let email_sent = send_email && {
            let mut context = BTreeMap::new();
            context.insert("reason".to_string(), reason.trim().to_string());
            self.dispatch(NotificationKind::ApplicationRejected, &application, context)
        };

        Ok(TransitionOutcome {
            application,
            email_sent,
            account_created: None,
        })
    }

    pub fn waitlist(
        &self,
        id: &ApplicationId,
        reviewer: &ReviewerId,
        admin_notes: Option<&str>,
        send_email: bool,
    ) -> Result<TransitionOutcome, AdmissionError> {
        let mut application = self.load_pending(id, WorkflowAction::Waitlist)?;
        let now = self.clock.now();
        application.status = ApplicationStatus::Waitlisted;
        application.reviewed_by = Some(reviewer.clone());
        application.reviewed_at = Some(now);
        application.updated_at = now;
        if let Some(notes) = admin_notes.map(str::trim).filter(|notes| !notes.is_empty()) {
            application.admin_notes = Some(notes.to_string());
        }

        let application = self.repository.update(&application)?;
        info!(application_id = %id, reviewer = %reviewer.0, "application waitlisted");

        let email_sent = send_email
            && self.dispatch(
                NotificationKind::ApplicationWaitlisted,
                &application,
                BTreeMap::new(),
            );

        Ok(TransitionOutcome {
            application,
            email_sent,
            account_created: None,
        })
    }

    pub fn decide(
        &self,
        id: &ApplicationId,
        reviewer: &ReviewerId,
        decision: &ReviewDecision,
        send_email: bool,
    ) -> Result<TransitionOutcome, AdmissionError> {
        match decision {
            ReviewDecision::Approve => self.approve(id, reviewer, send_email),
            ReviewDecision::Reject { reason } => self.reject(id, reviewer, reason, send_email),
            ReviewDecision::Waitlist { admin_notes } => {
                self.waitlist(id, reviewer, admin_notes.as_deref(), send_email)
            }
        }
    }

    /// Apply one decision to each id independently.
    ///
    /// Only the batch shape (empty or more than `MAX_BULK_BATCH` ids) fails the whole call.
    /// Everything else, including a blank rejection reason, is reported per id in `failed`.
    pub fn bulk(&self, request: &BulkRequest) -> Result<BulkReport, AdmissionError> {
        if request.application_ids.is_empty() {
            return Err(ValidationError::single("application_ids", "must not be empty").into());
        }
        if request.application_ids.len() > MAX_BULK_BATCH {
            return Err(ValidationError::single(
                "application_ids",
                &format!("at most {MAX_BULK_BATCH} applications per request"),
            )
            .into());
        }

        let mut report = BulkReport::default();
        for id in &request.application_ids {
            match self.decide(id, &request.reviewer, &request.decision, request.send_email) {
                Ok(outcome) => report.successful.push(BulkSuccess {
                    application_id: id.clone(),
                    status: outcome.application.status,
                    email_sent: outcome.email_sent,
                }),
                Err(err) => {
                    warn!(
                        application_id = %id,
                        action = request.decision.action().label(),
                        error = %err,
                        "bulk item failed"
                    );
                    report.failed.push(BulkFailure {
                        application_id: id.clone(),
                        kind: err.kind(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            action = request.decision.action().label(),
            successful = report.successful.len(),
            failed = report.failed.len(),
            "bulk action processed"
        );
        Ok(report)
    }

    fn load_pending(
        &self,
        id: &ApplicationId,
        action: WorkflowAction,
    ) -> Result<Application, AdmissionError> {
        let application = self
            .repository
            .get(id)?
            .ok_or_else(|| AdmissionError::NotFound(id.clone()))?;

        if application.status != ApplicationStatus::Pending {
            return Err(AdmissionError::InvalidStateTransition {
                id: id.clone(),
                current: application.status,
                action,
            });
        }
        Ok(application)
    }

    /// Send after commit; a failure is logged and reported, never propagated.
    pub(crate) fn dispatch(
        &self,
        kind: NotificationKind,
        application: &Application,
        mut context: BTreeMap<String, String>,
    ) -> bool {
        context.insert(
            "full_name".to_string(),
            application.applicant.full_name.clone(),
        );
        context.insert("status".to_string(), application.status.label().to_string());

        let notification = Notification {
            kind,
            recipient: application.applicant.email.clone(),
            application_id: application.id.clone(),
            context,
        };

        match self.notifier.notify(notification) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    application_id = %application.id,
                    template = kind.template(),
                    error = %err,
                    "notification failed; transition kept"
                );
                false
            }
        }
    }
}
