use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::collaborators::{CatalogError, Notifier};
use super::domain::{ApplicationId, ApplicationStatus, CourseId, ReviewerId};
use super::error::AdmissionError;
use super::normalizer::ValidationError;
use super::query::{ApplicationFilter, ApplicationQuery, SortKey, SortOrder, DEFAULT_PER_PAGE};
use super::repository::{ApplicationRepository, RepositoryError};
use super::service::AdmissionService;
use super::workflow::BulkRequest;

type SharedService<R, N> = Arc<AdmissionService<R, N>>;

/// Router exposing intake, scoring, review, and reporting endpoints.
pub fn application_router<R, N>(service: SharedService<R, N>) -> Router
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/courses/:course_id/applications",
            post(submit_handler::<R, N>),
        )
        .route(
            "/api/v1/courses/:course_id/applications/statistics",
            get(course_statistics_handler::<R, N>),
        )
        .route(
            "/api/v1/courses/:course_id/applications/recalculate",
            post(recalculate_course_handler::<R, N>),
        )
        .route("/api/v1/applications", get(list_handler::<R, N>))
        .route("/api/v1/applications/bulk", post(bulk_handler::<R, N>))
        .route("/api/v1/statistics", get(statistics_handler::<R, N>))
        .route(
            "/api/v1/applications/:application_id",
            get(fetch_handler::<R, N>).put(amend_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/recalculate",
            post(recalculate_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/approve",
            post(approve_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/reject",
            post(reject_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/waitlist",
            post(waitlist_handler::<R, N>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApproveRequest {
    pub(crate) reviewer: ReviewerId,
    #[serde(default)]
    pub(crate) send_email: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectRequest {
    pub(crate) reviewer: ReviewerId,
    #[serde(default)]
    pub(crate) reason: String,
    #[serde(default)]
    pub(crate) send_email: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WaitlistRequest {
    pub(crate) reviewer: ReviewerId,
    #[serde(default)]
    pub(crate) admin_notes: Option<String>,
    #[serde(default)]
    pub(crate) send_email: bool,
}

/// Query string accepted by the listing endpoint.
///
/// Every value arrives as text and is parsed in `into_query`, so a malformed filter gets the
/// same field-level 422 body as any other validation failure.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    pub(crate) course_id: Option<String>,
    pub(crate) status: Option<String>,
    pub(crate) high_risk: Option<String>,
    pub(crate) min_final_score: Option<String>,
    pub(crate) max_final_score: Option<String>,
    pub(crate) min_application_score: Option<String>,
    pub(crate) max_application_score: Option<String>,
    pub(crate) created_after: Option<String>,
    pub(crate) created_before: Option<String>,
    pub(crate) search: Option<String>,
    pub(crate) sort: Option<String>,
    pub(crate) order: Option<String>,
    pub(crate) page: Option<String>,
    pub(crate) per_page: Option<String>,
}

impl ListParams {
    pub(crate) fn into_query(self) -> Result<ApplicationQuery, ValidationError> {
        let status = match present(&self.status) {
            Some(raw) => Some(
                ApplicationStatus::parse(raw)
                    .ok_or_else(|| ValidationError::single("status", "unknown status"))?,
            ),
            None => None,
        };
        let sort = match present(&self.sort) {
            Some(raw) => SortKey::parse(raw)
                .ok_or_else(|| ValidationError::single("sort", "unknown sort field"))?,
            None => SortKey::default(),
        };
        let order = match present(&self.order) {
            Some(raw) => SortOrder::parse(raw)
                .ok_or_else(|| ValidationError::single("order", "expected asc or desc"))?,
            None => SortOrder::default(),
        };

        Ok(ApplicationQuery {
            filter: ApplicationFilter {
                course_id: present(&self.course_id).map(|id| CourseId(id.to_string())),
                status,
                high_risk: parsed(&self.high_risk, "high_risk", "expected true or false")?,
                min_final_score: parsed(&self.min_final_score, "min_final_score", "expected a number")?,
                max_final_score: parsed(&self.max_final_score, "max_final_score", "expected a number")?,
                min_application_score: score_bound(
                    &self.min_application_score,
                    "min_application_score",
                )?,
                max_application_score: score_bound(
                    &self.max_application_score,
                    "max_application_score",
                )?,
                created_after: parsed::<DateTime<Utc>>(
                    &self.created_after,
                    "created_after",
                    "expected an RFC 3339 timestamp",
                )?,
                created_before: parsed::<DateTime<Utc>>(
                    &self.created_before,
                    "created_before",
                    "expected an RFC 3339 timestamp",
                )?,
                search: present(&self.search).map(str::to_string),
            },
            sort,
            order,
            page: parsed(&self.page, "page", "expected a positive integer")?.unwrap_or(1),
            per_page: parsed(&self.per_page, "per_page", "expected a positive integer")?
                .unwrap_or(DEFAULT_PER_PAGE),
        })
    }
}

/// Blank query values count as absent.
fn present(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn parsed<T: FromStr>(
    raw: &Option<String>,
    field: &str,
    message: &str,
) -> Result<Option<T>, ValidationError> {
    present(raw)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ValidationError::single(field, message))
        })
        .transpose()
}

fn score_bound(raw: &Option<String>, field: &str) -> Result<Option<u8>, ValidationError> {
    const MESSAGE: &str = "expected an integer between 0 and 100";
    match parsed::<u8>(raw, field, MESSAGE)? {
        Some(score) if score > 100 => Err(ValidationError::single(field, MESSAGE)),
        bound => Ok(bound),
    }
}

pub(crate) async fn submit_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(course_id): Path<String>,
    Json(payload): Json<Value>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    match service.submit(&CourseId(course_id), &payload) {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn fetch_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    match service.get(&ApplicationId(application_id)) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn amend_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(application_id): Path<String>,
    Json(payload): Json<Value>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    match service.amend(&ApplicationId(application_id), &payload) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Query(params): Query<ListParams>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    let query = match params.into_query() {
        Ok(query) => query,
        Err(error) => return error_response(error.into()),
    };
    match service.list(&query) {
        Ok(page) => {
            let page = page.map(|application| application.summary());
            (StatusCode::OK, Json(page)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn recalculate_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    match service.recalculate(&ApplicationId(application_id)) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn recalculate_course_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(course_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    match service.recalculate_course(&CourseId(course_id)) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn approve_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(application_id): Path<String>,
    Json(request): Json<ApproveRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    let id = ApplicationId(application_id);
    match service.approve(&id, &request.reviewer, request.send_email) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reject_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(application_id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    let id = ApplicationId(application_id);
    match service.reject(&id, &request.reviewer, &request.reason, request.send_email) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn waitlist_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(application_id): Path<String>,
    Json(request): Json<WaitlistRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    let id = ApplicationId(application_id);
    match service.waitlist(
        &id,
        &request.reviewer,
        request.admin_notes.as_deref(),
        request.send_email,
    ) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

/// Always 200 once the request itself is valid; callers inspect `failed`.
pub(crate) async fn bulk_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Json(request): Json<BulkRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    match service.bulk(&request) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn course_statistics_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(course_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    match service.statistics(Some(&CourseId(course_id))) {
        Ok(statistics) => (StatusCode::OK, Json(statistics)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn statistics_handler<R, N>(
    State(service): State<SharedService<R, N>>,
) -> Response
where
    R: ApplicationRepository + 'static,
    N: Notifier + 'static,
{
    match service.statistics(None) {
        Ok(statistics) => (StatusCode::OK, Json(statistics)).into_response(),
        Err(error) => error_response(error),
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        error_response(self)
    }
}

pub(crate) fn error_response(error: AdmissionError) -> Response {
    let status = match &error {
        AdmissionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AdmissionError::Duplicate(_)
        | AdmissionError::InvalidStateTransition { .. }
        | AdmissionError::AlreadyEnrolled { .. }
        | AdmissionError::Repository(RepositoryError::StaleState { .. }) => StatusCode::CONFLICT,
        AdmissionError::NotFound(_)
        | AdmissionError::Catalog(CatalogError::NotFound(_))
        | AdmissionError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        AdmissionError::Catalog(_) | AdmissionError::Directory(_) | AdmissionError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let mut payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
    });
    match &error {
        AdmissionError::Validation(validation) => {
            payload["fields"] = json!(validation.errors);
        }
        AdmissionError::Duplicate(duplicate) => {
            payload["existing_application_id"] = json!(duplicate.existing_id);
            payload["existing_status"] = json!(duplicate.existing_status);
        }
        AdmissionError::InvalidStateTransition { current, .. } => {
            payload["current_status"] = json!(current);
        }
        _ => {}
    }

    (status, Json(payload)).into_response()
}
