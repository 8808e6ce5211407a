use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::collaborators::{
    Clock, CourseCatalog, IdentityDirectory, NotificationKind, Notifier, SystemClock,
};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, CourseId, NewApplication, ReviewerId,
};
use super::error::{AdmissionError, DuplicateApplicationError, WorkflowAction};
use super::normalizer::FieldNormalizer;
use super::query::{ApplicationFilter, ApplicationQuery, ApplicationStatistics, Page};
use super::repository::ApplicationRepository;
use super::scoring::ScoringEngine;
use super::workflow::{
    AdmissionWorkflow, BulkFailure, BulkReport, BulkRequest, ReviewDecision, TransitionOutcome,
};

/// Stored application plus whether the acknowledgement email went out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub application: Application,
    pub email_sent: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecalculationReport {
    pub recalculated: Vec<ApplicationId>,
    pub failed: Vec<BulkFailure>,
}

/// Service composing the normalizer, scoring engine, duplicate guard, and workflow.
pub struct AdmissionService<R, N> {
    normalizer: FieldNormalizer,
    engine: ScoringEngine,
    repository: Arc<R>,
    catalog: Arc<dyn CourseCatalog>,
    clock: Arc<dyn Clock>,
    workflow: AdmissionWorkflow<R, N>,
}

impl<R, N> AdmissionService<R, N>
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<N>,
        directory: Arc<dyn IdentityDirectory>,
        catalog: Arc<dyn CourseCatalog>,
    ) -> Self {
        Self::with_clock(repository, notifier, directory, catalog, Arc::new(SystemClock))
    }

    pub fn with_clock(
        repository: Arc<R>,
        notifier: Arc<N>,
        directory: Arc<dyn IdentityDirectory>,
        catalog: Arc<dyn CourseCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let workflow =
            AdmissionWorkflow::new(repository.clone(), notifier, directory, clock.clone());

        Self {
            normalizer: FieldNormalizer::new(),
            engine: ScoringEngine::new(),
            repository,
            catalog,
            clock,
            workflow,
        }
    }

    /// Validate, de-duplicate, score, and store a new pending application.
    pub fn submit(
        &self,
        course_id: &CourseId,
        payload: &Value,
    ) -> Result<SubmissionReceipt, AdmissionError> {
        let course = self.catalog.get_course(course_id)?;
        let applicant = self.normalizer.normalize_value(payload)?;
        self.guard_duplicates(&applicant.email, course_id, None)?;

        let scores = self.engine.score(&applicant, &course);
        let application = self.repository.create(NewApplication {
            course_id: course_id.clone(),
            applicant,
            scores,
            created_at: self.clock.now(),
        })?;

        info!(
            application_id = %application.id,
            course_id = %course_id,
            final_rank_score = application.scores.final_rank_score,
            is_high_risk = application.scores.is_high_risk,
            "application submitted"
        );

        let mut context = BTreeMap::new();
        context.insert("course_title".to_string(), course.title.clone());
        let email_sent = self.workflow.dispatch(
            NotificationKind::ApplicationReceived,
            &application,
            context,
        );

        Ok(SubmissionReceipt {
            application,
            email_sent,
        })
    }

    /// Re-run scoring; only the score set and `updated_at` change.
    pub fn recalculate(&self, id: &ApplicationId) -> Result<Application, AdmissionError> {
        let application = self.get(id)?;
        self.rescore(application)
    }

    pub fn recalculate_course(
        &self,
        course_id: &CourseId,
    ) -> Result<RecalculationReport, AdmissionError> {
        self.catalog.get_course(course_id)?;
        let applications = self
            .repository
            .matching(&ApplicationFilter::for_course(course_id.clone()))?;

        let mut report = RecalculationReport::default();
        for application in applications {
            let id = application.id.clone();
            match self.rescore(application) {
                Ok(_) => report.recalculated.push(id),
                Err(err) => {
                    warn!(application_id = %id, error = %err, "recalculation failed");
                    report.failed.push(BulkFailure {
                        application_id: id,
                        kind: err.kind(),
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Replace the applicant record of a pending application and re-score it.
    pub fn amend(&self, id: &ApplicationId, payload: &Value) -> Result<Application, AdmissionError> {
        let mut application = self.get(id)?;
        if application.status != ApplicationStatus::Pending {
            return Err(AdmissionError::InvalidStateTransition {
                id: id.clone(),
                current: application.status,
                action: WorkflowAction::Amend,
            });
        }

        let applicant = self.normalizer.normalize_value(payload)?;
        if applicant.email != application.applicant.email {
            self.guard_duplicates(&applicant.email, &application.course_id, Some(id))?;
        }

        application.applicant = applicant;
        let application = self.rescore(application)?;
        info!(application_id = %id, "application amended");
        Ok(application)
    }

    pub fn approve(
        &self,
        id: &ApplicationId,
        reviewer: &ReviewerId,
        send_email: bool,
    ) -> Result<TransitionOutcome, AdmissionError> {
        self.workflow.approve(id, reviewer, send_email)
    }

    pub fn reject(
        &self,
        id: &ApplicationId,
        reviewer: &ReviewerId,
        reason: &str,
        send_email: bool,
    ) -> Result<TransitionOutcome, AdmissionError> {
        self.workflow.reject(id, reviewer, reason, send_email)
    }

    pub fn waitlist(
        &self,
        id: &ApplicationId,
        reviewer: &ReviewerId,
        admin_notes: Option<&str>,
        send_email: bool,
    ) -> Result<TransitionOutcome, AdmissionError> {
        self.workflow.waitlist(id, reviewer, admin_notes, send_email)
    }

    pub fn decide(
        &self,
        id: &ApplicationId,
        reviewer: &ReviewerId,
        decision: &ReviewDecision,
        send_email: bool,
    ) -> Result<TransitionOutcome, AdmissionError> {
        self.workflow.decide(id, reviewer, decision, send_email)
    }

    pub fn bulk(&self, request: &BulkRequest) -> Result<BulkReport, AdmissionError> {
        self.workflow.bulk(request)
    }

    pub fn get(&self, id: &ApplicationId) -> Result<Application, AdmissionError> {
        self.repository
            .get(id)?
            .ok_or_else(|| AdmissionError::NotFound(id.clone()))
    }

    pub fn list(&self, query: &ApplicationQuery) -> Result<Page<Application>, AdmissionError> {
        Ok(self.repository.list(query)?)
    }

    pub fn statistics(
        &self,
        course_id: Option<&CourseId>,
    ) -> Result<ApplicationStatistics, AdmissionError> {
        let filter = match course_id {
            Some(course_id) => {
                self.catalog.get_course(course_id)?;
                ApplicationFilter::for_course(course_id.clone())
            }
            None => ApplicationFilter::default(),
        };
        let applications = self.repository.matching(&filter)?;
        Ok(ApplicationStatistics::from_applications(
            course_id.cloned(),
            &applications,
        ))
    }

    fn guard_duplicates(
        &self,
        email: &str,
        course_id: &CourseId,
        ignore: Option<&ApplicationId>,
    ) -> Result<(), AdmissionError> {
        let existing =
            self.repository
                .find_duplicate(email, course_id, &ApplicationStatus::ACTIVE)?;

        match existing {
            Some(existing) if Some(&existing.id) != ignore => {
                Err(AdmissionError::Duplicate(DuplicateApplicationError {
                    existing_id: existing.id,
                    existing_status: existing.status,
                }))
            }
            _ => Ok(()),
        }
    }

    fn rescore(&self, mut application: Application) -> Result<Application, AdmissionError> {
        let course = self.catalog.get_course(&application.course_id)?;
        application.scores = self.engine.score(&application.applicant, &course);
        application.updated_at = self.clock.now();

        // Lands only if nothing else committed since `application` was read.
        Ok(self.repository.update(&application)?)
    }
}
