use axum::http::{Method, StatusCode};
use serde_json::json;

use super::common::{harness, reviewer, send, strong_payload, weak_payload, COURSE};
use crate::admissions::domain::ApplicationStatus;

fn applications_uri() -> String {
    format!("/api/v1/courses/{COURSE}/applications")
}

#[tokio::test]
async fn submit_returns_created_receipt() {
    let harness = harness();
    let router = harness.router();

    let (status, body) = send(
        &router,
        Method::POST,
        &applications_uri(),
        Some(strong_payload("ada@example.com")),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["application"]["status"], "pending");
    assert_eq!(body["application"]["scores"]["application_score"], 92);
    assert_eq!(body["email_sent"], true);
}

#[tokio::test]
async fn duplicate_submission_conflicts_with_existing_reference() {
    let harness = harness();
    let router = harness.router();
    let existing = harness.submit(strong_payload("ada@example.com"));

    let (status, body) = send(
        &router,
        Method::POST,
        &applications_uri(),
        Some(strong_payload("ada@example.com")),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "duplicate_application");
    assert_eq!(body["existing_application_id"], existing.id.0.as_str());
    assert_eq!(body["existing_status"], "pending");
}

#[tokio::test]
async fn invalid_submission_lists_field_errors() {
    let harness = harness();
    let router = harness.router();

    let (status, body) = send(
        &router,
        Method::POST,
        &applications_uri(),
        Some(json!({ "full_name": "No Email" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_error");
    let fields: Vec<_> = body["fields"]
        .as_array()
        .expect("field list")
        .iter()
        .filter_map(|error| error["field"].as_str())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"motivation"));
}

#[tokio::test]
async fn unknown_course_and_application_are_not_found() {
    let harness = harness();
    let router = harness.router();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/courses/knitting-101/applications",
        Some(strong_payload("ada@example.com")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "course_not_found");

    let (status, body) = send(&router, Method::GET, "/api/v1/applications/app-404404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn approve_twice_conflicts() {
    let harness = harness();
    let router = harness.router();
    let application = harness.submit(strong_payload("ada@example.com"));
    let uri = format!("/api/v1/applications/{}/approve", application.id);
    let request = json!({ "reviewer": "admin-7", "send_email": true });

    let (status, body) = send(&router, Method::POST, &uri, Some(request.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["application"]["status"], "approved");
    assert_eq!(body["account_created"], true);

    let (status, body) = send(&router, Method::POST, &uri, Some(request)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_state_transition");
    assert_eq!(body["current_status"], "approved");
}

#[tokio::test]
async fn reject_without_reason_is_unprocessable() {
    let harness = harness();
    let router = harness.router();
    let application = harness.submit(weak_payload("tom@example.com"));
    let uri = format!("/api/v1/applications/{}/reject", application.id);

    let (status, _) = send(&router, Method::POST, &uri, Some(json!({ "reviewer": "admin-7" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(harness.status_of(&application.id), ApplicationStatus::Pending);
}

#[tokio::test]
async fn bulk_route_reports_partial_success() {
    let harness = harness();
    let router = harness.router();
    let pending = harness.submit(strong_payload("a@example.com"));
    let rejected = harness.submit(weak_payload("b@example.com"));
    harness
        .service
        .reject(&rejected.id, &reviewer(), "no device", false)
        .expect("rejection succeeds");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/applications/bulk",
        Some(json!({
            "action": "waitlist",
            "admin_notes": "spring cohort",
            "application_ids": [pending.id.0, rejected.id.0],
            "reviewer": "admin-7",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["successful"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["successful"][0]["status"], "waitlisted");
    assert_eq!(body["failed"][0]["kind"], "invalid_state_transition");
}

#[tokio::test]
async fn list_route_applies_filters_and_sorting() {
    let harness = harness();
    let router = harness.router();
    let strong = harness.submit(strong_payload("a@example.com"));
    harness.submit(weak_payload("b@example.com"));

    let (status, body) = send(
        &router,
        Method::GET,
        &format!("/api/v1/applications?course_id={COURSE}&high_risk=false&sort=readiness_score"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["id"], strong.id.0.as_str());
    assert_eq!(body["items"][0]["readiness_score"], 96);

    let (status, body) = send(&router, Method::GET, "/api/v1/applications?sort=height", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"][0]["field"], "sort");
}

#[tokio::test]
async fn statistics_and_recalculation_routes() {
    let harness = harness();
    let router = harness.router();
    let application = harness.submit(strong_payload("a@example.com"));

    let (status, body) = send(
        &router,
        Method::GET,
        &format!("{}/statistics", applications_uri()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["by_status"]["pending"], 1);

    let (status, body) = send(
        &router,
        Method::POST,
        &format!("/api/v1/applications/{}/recalculate", application.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["scores"]["final_rank_score"], 81.6);
}

#[tokio::test]
async fn bulk_reject_without_reason_still_returns_report() {
    let harness = harness();
    let router = harness.router();
    let application = harness.submit(strong_payload("a@example.com"));

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/applications/bulk",
        Some(json!({
            "action": "reject",
            "reason": "",
            "application_ids": [application.id.0.as_str()],
            "reviewer": "admin-7",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["successful"].as_array().map(Vec::len), Some(0));
    assert_eq!(body["failed"][0]["kind"], "validation_error");
    assert_eq!(harness.status_of(&application.id), ApplicationStatus::Pending);
}

#[tokio::test]
async fn malformed_list_filters_are_field_errors() {
    let harness = harness();
    let router = harness.router();
    harness.submit(strong_payload("a@example.com"));

    for (query, field) in [
        ("min_application_score=300", "min_application_score"),
        ("max_application_score=-1", "max_application_score"),
        ("high_risk=maybe", "high_risk"),
        ("created_after=yesterday", "created_after"),
        ("per_page=ten", "per_page"),
    ] {
        let (status, body) =
            send(&router, Method::GET, &format!("/api/v1/applications?{query}"), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{query}");
        assert_eq!(body["kind"], "validation_error");
        assert_eq!(body["fields"][0]["field"], field);
    }

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/v1/applications?min_application_score=90&high_risk=&status=",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}
