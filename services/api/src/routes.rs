use crate::infra::{ApiAdmissionService, AppState};
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use course_admissions::admissions::import::{rank_rows, read_rows, BatchRanking};
use course_admissions::admissions::{
    application_router, AdmissionError, CourseCatalog, CourseId,
};
use course_admissions::error::AppError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// CSV form export scored against a course without storing anything.
#[derive(Debug, Deserialize)]
pub(crate) struct RankPreviewRequest {
    pub(crate) csv: String,
}

pub(crate) fn with_application_routes(service: Arc<ApiAdmissionService>) -> Router {
    application_router(service)
        .route("/health", get(liveness))
        .route("/ready", get(readiness))
        .route("/metrics", get(prometheus_scrape))
        .route(
            "/api/v1/courses/:course_id/rank-preview",
            post(rank_preview_endpoint),
        )
}

/// Liveness plus the number of courses accepting applications.
pub(crate) async fn liveness(Extension(state): Extension<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "courses": state.catalog.courses().count() }))
}

pub(crate) async fn readiness(Extension(state): Extension<AppState>) -> (StatusCode, Json<Value>) {
    if state.readiness.load(Ordering::Acquire) {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing" })),
        )
    }
}

pub(crate) async fn prometheus_scrape(Extension(state): Extension<AppState>) -> Response {
    let body = state.metrics.render();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response()
}

pub(crate) async fn rank_preview_endpoint(
    Extension(state): Extension<AppState>,
    Path(course_id): Path<String>,
    Json(payload): Json<RankPreviewRequest>,
) -> Result<Json<BatchRanking>, Response> {
    let course = state
        .catalog
        .get_course(&CourseId(course_id))
        .map_err(|err| AdmissionError::from(err).into_response())?;

    let rows = read_rows(Cursor::new(payload.csv.into_bytes()))
        .map_err(|err| AppError::from(err).into_response())?;

    Ok(Json(rank_rows(rows, &course)))
}
