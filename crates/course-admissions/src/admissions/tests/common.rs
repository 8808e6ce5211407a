use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::admissions::collaborators::{
    Clock, Notification, NotificationFailure, Notifier,
};
use crate::admissions::domain::{
    Application, ApplicationId, ApplicationStatus, Course, CourseId, NewApplication, ReviewerId,
};
use crate::admissions::memory::{
    MemoryApplicationRepository, MemoryDirectory, MemoryOutbox, StaticCourseCatalog,
};
use crate::admissions::query::ApplicationFilter;
use crate::admissions::repository::{ApplicationRepository, RepositoryError};
use crate::admissions::{application_router, AdmissionService};

pub(super) const COURSE: &str = "excel-101";

pub(super) fn course_id() -> CourseId {
    CourseId(COURSE.to_string())
}

pub(super) fn reviewer() -> ReviewerId {
    ReviewerId("admin-7".to_string())
}

pub(super) fn course() -> Course {
    Course {
        id: course_id(),
        title: "Excel for Data Work".to_string(),
        regional_bonus_countries: vec!["Ghana".to_string(), "Kenya".to_string()],
    }
}

pub(super) fn catalog() -> StaticCourseCatalog {
    StaticCourseCatalog::new([
        course(),
        Course {
            id: CourseId("data-201".to_string()),
            title: "Data Analysis".to_string(),
            regional_bonus_countries: Vec::new(),
        },
    ])
}

/// Well-prepared applicant: risk 0, readiness 96, commitment 80, application 92.
pub(super) fn strong_payload(email: &str) -> Value {
    json!({
        "full_name": "Adaeze Okafor",
        "email": email,
        "phone": "+1 555 0100",
        "country": "Canada",
        "city": "Toronto",
        "gender": "female",
        "age_range": "25-34",
        "education_level": "bachelors",
        "current_status": "employed",
        "field_of_study": "Accounting",
        "has_computer": true,
        "has_internet": "yes",
        "internet_access_type": "stable_broadband",
        "primary_device": "laptop",
        "has_used_excel": true,
        "excel_skill_level": "advanced",
        "excel_tasks_done": ["formulas", "pivot_tables", "charts"],
        "motivation": "m".repeat(320),
        "learning_outcomes": "o".repeat(120),
        "career_impact": "c".repeat(60),
        "committed_to_complete": true,
        "agrees_to_assessments": "true",
        "available_for_live_sessions": true,
        "available_time": ["weekday_evenings", "weekends"],
        "online_learning_experience": true,
    })
}

/// Applicant hitting every risk condition: risk 100, every other score 0.
pub(super) fn weak_payload(email: &str) -> Value {
    json!({
        "full_name": "Tom Reyes",
        "email": email,
        "country": "Canada",
        "has_computer": false,
        "has_internet": false,
        "excel_skill_level": "never_used",
        "motivation": "I want to learn",
        "committed_to_complete": false,
        "agrees_to_assessments": false,
        "online_learning_experience": false,
    })
}

pub(super) fn with_field(mut payload: Value, key: &str, value: Value) -> Value {
    payload[key] = value;
    payload
}

/// Deterministic clock advancing one second per reading.
pub(super) struct SteppingClock {
    seconds: AtomicI64,
}

impl SteppingClock {
    pub(super) fn new() -> Self {
        Self {
            seconds: AtomicI64::new(0),
        }
    }
}

pub(super) fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let offset = self.seconds.fetch_add(1, Ordering::SeqCst);
        epoch() + chrono::Duration::seconds(offset)
    }
}

pub(super) type MemoryService = AdmissionService<MemoryApplicationRepository, MemoryOutbox>;

pub(super) struct Harness {
    pub(super) service: Arc<MemoryService>,
    pub(super) repository: Arc<MemoryApplicationRepository>,
    pub(super) outbox: Arc<MemoryOutbox>,
    pub(super) directory: Arc<MemoryDirectory>,
}

pub(super) fn harness() -> Harness {
    let repository = Arc::new(MemoryApplicationRepository::default());
    let outbox = Arc::new(MemoryOutbox::default());
    let directory = Arc::new(MemoryDirectory::default());
    let service = AdmissionService::with_clock(
        repository.clone(),
        outbox.clone(),
        directory.clone(),
        Arc::new(catalog()),
        Arc::new(SteppingClock::new()),
    );
    Harness {
        service: Arc::new(service),
        repository,
        outbox,
        directory,
    }
}

/// Service over an arbitrary store, sharing `directory` with other services in the test.
pub(super) fn service_over<R>(
    repository: Arc<R>,
    directory: Arc<MemoryDirectory>,
) -> AdmissionService<R, MemoryOutbox>
where
    R: ApplicationRepository + 'static,
{
    AdmissionService::with_clock(
        repository,
        Arc::new(MemoryOutbox::default()),
        directory,
        Arc::new(catalog()),
        Arc::new(SteppingClock::new()),
    )
}

impl Harness {
    pub(super) fn submit(&self, payload: Value) -> Application {
        self.service
            .submit(&course_id(), &payload)
            .expect("submission succeeds")
            .application
    }

    pub(super) fn status_of(&self, id: &ApplicationId) -> ApplicationStatus {
        self.repository
            .get(id)
            .expect("fetch succeeds")
            .expect("record present")
            .status
    }

    pub(super) fn router(&self) -> Router {
        application_router(self.service.clone())
    }
}

/// Notifier whose transport is always down.
#[derive(Default)]
pub(super) struct DownNotifier;

impl Notifier for DownNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotificationFailure> {
        Err(NotificationFailure {
            template: notification.kind.template(),
            recipient: notification.recipient,
            reason: "smtp connection refused".to_string(),
        })
    }
}

/// Memory store whose `update` can be switched to fail, for rollback scenarios.
#[derive(Default)]
pub(super) struct FlakyRepository {
    pub(super) inner: MemoryApplicationRepository,
    pub(super) fail_updates: AtomicBool,
}

impl ApplicationRepository for FlakyRepository {
    fn create(&self, application: NewApplication) -> Result<Application, RepositoryError> {
        self.inner.create(application)
    }

    fn get(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        self.inner.get(id)
    }

    fn find_duplicate(
        &self,
        email: &str,
        course_id: &CourseId,
        statuses: &[ApplicationStatus],
    ) -> Result<Option<Application>, RepositoryError> {
        self.inner.find_duplicate(email, course_id, statuses)
    }

    fn update(&self, application: &Application) -> Result<Application, RepositoryError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("database offline".to_string()));
        }
        self.inner.update(application)
    }

    fn matching(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        self.inner.matching(filter)
    }
}

type Hook = Box<dyn FnOnce() + Send>;

/// Memory store that runs a hook once, after the caller's read and before its next write
/// reaches storage.
pub(super) struct InterleavingRepository {
    inner: MemoryApplicationRepository,
    before_update: Mutex<Option<Hook>>,
}

impl InterleavingRepository {
    pub(super) fn new(inner: MemoryApplicationRepository) -> Self {
        Self {
            inner,
            before_update: Mutex::new(None),
        }
    }

    pub(super) fn before_next_update(&self, hook: impl FnOnce() + Send + 'static) {
        if let Ok(mut slot) = self.before_update.lock() {
            *slot = Some(Box::new(hook));
        }
    }
}

impl ApplicationRepository for InterleavingRepository {
    fn create(&self, application: NewApplication) -> Result<Application, RepositoryError> {
        self.inner.create(application)
    }

    fn get(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        self.inner.get(id)
    }

    fn find_duplicate(
        &self,
        email: &str,
        course_id: &CourseId,
        statuses: &[ApplicationStatus],
    ) -> Result<Option<Application>, RepositoryError> {
        self.inner.find_duplicate(email, course_id, statuses)
    }

    fn update(&self, application: &Application) -> Result<Application, RepositoryError> {
        let hook = self
            .before_update
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(hook) = hook {
            hook();
        }
        self.inner.update(application)
    }

    fn matching(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        self.inner.matching(filter)
    }
}

pub(super) async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let body = match body {
        Some(value) => Body::from(serde_json::to_vec(&value).expect("serialize body")),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .expect("request builds");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("route executes");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("read body");
    let payload = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json payload")
    };
    (status, payload)
}
