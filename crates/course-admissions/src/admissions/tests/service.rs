use std::sync::Arc;
use std::thread;

use serde_json::json;

use super::common::{
    course_id, epoch, harness, reviewer, service_over, strong_payload, weak_payload, with_field,
    InterleavingRepository,
};
use crate::admissions::collaborators::{CatalogError, NotificationKind};
use crate::admissions::domain::{ApplicationStatus, CourseId, NewApplication};
use crate::admissions::error::{AdmissionError, WorkflowAction};
use crate::admissions::query::{ApplicationFilter, ApplicationQuery, SortKey, SortOrder};
use crate::admissions::memory::{MemoryApplicationRepository, MemoryDirectory};
use crate::admissions::repository::{ApplicationRepository, RepositoryError};

#[test]
fn submission_stores_scored_pending_application() {
    let harness = harness();

    let receipt = harness
        .service
        .submit(&course_id(), &strong_payload("Ada@Example.com"))
        .expect("submission succeeds");

    let application = &receipt.application;
    assert_eq!(application.status, ApplicationStatus::Pending);
    assert_eq!(application.applicant.email, "ada@example.com");
    assert_eq!(application.scores.application_score, 92);
    assert_eq!(application.created_at, epoch());
    assert!(receipt.email_sent);

    let sent = harness.outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::ApplicationReceived);
    assert_eq!(
        sent[0].context.get("course_title").map(String::as_str),
        Some("Excel for Data Work")
    );
}

#[test]
fn regional_applicant_gets_bonus_from_course() {
    let harness = harness();
    let payload = with_field(strong_payload("kofi@example.com"), "country", json!("Ghana"));

    let application = harness.submit(payload);

    assert!(application.scores.regional_bonus_applied);
    assert!((application.scores.final_rank_score - 86.6).abs() < 1e-9);
}

#[test]
fn invalid_submission_is_not_stored() {
    let harness = harness();
    let error = harness
        .service
        .submit(&course_id(), &json!({ "email": "x@example.com" }))
        .expect_err("required fields missing");

    assert!(matches!(error, AdmissionError::Validation(_)));
    assert!(harness.repository.is_empty());
    assert!(harness.outbox.sent().is_empty());
}

#[test]
fn unknown_course_is_reported() {
    let harness = harness();
    let error = harness
        .service
        .submit(&CourseId("knitting-101".to_string()), &strong_payload("a@example.com"))
        .expect_err("course does not exist");

    assert!(matches!(error, AdmissionError::Catalog(CatalogError::NotFound(_))));
    assert_eq!(error.kind(), "course_not_found");
}

#[test]
fn duplicate_blocked_while_active_and_allowed_after_rejection() {
    let harness = harness();
    let first = harness.submit(strong_payload("ada@example.com"));

    let error = harness
        .service
        .submit(&course_id(), &strong_payload("ADA@example.com "))
        .expect_err("pending application blocks a second one");
    match error {
        AdmissionError::Duplicate(duplicate) => {
            assert_eq!(duplicate.existing_id, first.id);
            assert_eq!(duplicate.existing_status, ApplicationStatus::Pending);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.repository.len(), 1);

    let other_course = harness
        .service
        .submit(&CourseId("data-201".to_string()), &strong_payload("ada@example.com"))
        .expect("other courses are independent");
    assert_eq!(other_course.application.status, ApplicationStatus::Pending);

    harness
        .service
        .reject(&first.id, &reviewer(), "incomplete answers", false)
        .expect("rejection succeeds");
    let second = harness.submit(strong_payload("ada@example.com"));
    assert_ne!(second.id, first.id);
    assert_eq!(harness.repository.len(), 3);
}

#[test]
fn repository_refuses_second_active_application() {
    let harness = harness();
    let first = harness.submit(strong_payload("ada@example.com"));

    let error = harness
        .repository
        .create(NewApplication {
            course_id: first.course_id.clone(),
            applicant: first.applicant.clone(),
            scores: first.scores.clone(),
            created_at: epoch(),
        })
        .expect_err("storage enforces active uniqueness");
    assert!(matches!(error, RepositoryError::DuplicateActive { .. }));
}

#[test]
fn concurrent_duplicate_submissions_store_one_application() {
    let harness = harness();
    let service = &harness.service;

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| service.submit(&course_id(), &strong_payload("ada@example.com")))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread completes"))
            .collect()
    });

    let stored = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(stored, 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|error| matches!(error, AdmissionError::Duplicate(_))));
    assert_eq!(harness.repository.len(), 1);
}

#[test]
fn recalculation_is_idempotent_and_keeps_review_trail() {
    let harness = harness();
    let application = harness.submit(strong_payload("ada@example.com"));
    let approved = harness
        .service
        .approve(&application.id, &reviewer(), false)
        .expect("approval succeeds")
        .application;

    let once = harness
        .service
        .recalculate(&application.id)
        .expect("recalculation succeeds");
    let twice = harness
        .service
        .recalculate(&application.id)
        .expect("recalculation succeeds");

    assert_eq!(once.scores, approved.scores);
    assert_eq!(twice.scores, once.scores);
    assert_eq!(twice.status, ApplicationStatus::Approved);
    assert_eq!(twice.approved_by, approved.approved_by);
    assert_eq!(twice.reviewed_at, approved.reviewed_at);
    assert_eq!(twice.enrollment_id, approved.enrollment_id);
    assert!(twice.updated_at > approved.updated_at);
}

#[test]
fn course_recalculation_covers_every_application() {
    let harness = harness();
    let first = harness.submit(strong_payload("a@example.com"));
    let second = harness.submit(weak_payload("b@example.com"));

    let report = harness
        .service
        .recalculate_course(&course_id())
        .expect("course exists");

    assert!(report.failed.is_empty());
    assert_eq!(report.recalculated, vec![first.id, second.id]);
}

#[test]
fn amend_rescores_pending_application_only() {
    let harness = harness();
    let application = harness.submit(weak_payload("tom@example.com"));
    assert!(application.scores.is_high_risk);

    let amended = harness
        .service
        .amend(&application.id, &strong_payload("tom@example.com"))
        .expect("pending applications can be amended");
    assert_eq!(amended.status, ApplicationStatus::Pending);
    assert_eq!(amended.scores.risk_score, 0);
    assert_eq!(amended.created_at, application.created_at);

    harness
        .service
        .waitlist(&application.id, &reviewer(), None, false)
        .expect("waitlist succeeds");
    let error = harness
        .service
        .amend(&application.id, &weak_payload("tom@example.com"))
        .expect_err("only pending applications can be amended");
    assert!(matches!(
        error,
        AdmissionError::InvalidStateTransition {
            action: WorkflowAction::Amend,
            current: ApplicationStatus::Waitlisted,
            ..
        }
    ));
}

#[test]
fn amend_cannot_take_over_another_active_email() {
    let harness = harness();
    let taken = harness.submit(strong_payload("ada@example.com"));
    let application = harness.submit(weak_payload("tom@example.com"));

    let error = harness
        .service
        .amend(&application.id, &strong_payload("ada@example.com"))
        .expect_err("email belongs to another active application");

    match error {
        AdmissionError::Duplicate(duplicate) => assert_eq!(duplicate.existing_id, taken.id),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn listing_orders_by_rank_with_first_come_ties() {
    let harness = harness();
    let weak = harness.submit(weak_payload("w@example.com"));
    let early = harness.submit(strong_payload("early@example.com"));
    let late = harness.submit(strong_payload("late@example.com"));

    let page = harness
        .service
        .list(&ApplicationQuery::default())
        .expect("listing succeeds");
    let order: Vec<_> = page.items.iter().map(|application| application.id.clone()).collect();
    assert_eq!(order, vec![early.id.clone(), late.id.clone(), weak.id.clone()]);
    assert_eq!(page.total, 3);
    assert_eq!(page.pages, 1);

    let query = ApplicationQuery {
        filter: ApplicationFilter {
            high_risk: Some(false),
            ..ApplicationFilter::default()
        },
        sort: SortKey::CreatedAt,
        order: SortOrder::Descending,
        page: 1,
        per_page: 1,
    };
    let page = harness.service.list(&query).expect("listing succeeds");
    assert_eq!(page.total, 2);
    assert_eq!(page.pages, 2);
    assert_eq!(page.items[0].id, late.id);
}

#[test]
fn statistics_summarise_course() {
    let harness = harness();
    let strong = harness.submit(strong_payload("a@example.com"));
    harness.submit(weak_payload("b@example.com"));
    harness
        .service
        .approve(&strong.id, &reviewer(), false)
        .expect("approval succeeds");

    let statistics = harness
        .service
        .statistics(Some(&course_id()))
        .expect("course exists");

    assert_eq!(statistics.total, 2);
    assert_eq!(statistics.by_status.approved, 1);
    assert_eq!(statistics.by_status.pending, 1);
    assert_eq!(statistics.high_risk, 1);
    assert_eq!(statistics.risk_bands.low, 1);
    assert_eq!(statistics.risk_bands.high, 1);
    assert_eq!(statistics.averages.application, 46.0);
    let buckets: Vec<_> = statistics
        .application_score_histogram
        .iter()
        .map(|bucket| (bucket.range.as_str(), bucket.count))
        .collect();
    assert_eq!(
        buckets,
        vec![("0-19", 1), ("20-39", 0), ("40-59", 0), ("60-79", 0), ("80-100", 1)]
    );

    let error = harness
        .service
        .statistics(Some(&CourseId("missing".to_string())))
        .expect_err("unknown course");
    assert_eq!(error.kind(), "course_not_found");
}

#[test]
fn repository_refuses_writes_from_a_stale_read() {
    let harness = harness();
    let application = harness.submit(strong_payload("ada@example.com"));
    assert_eq!(application.revision, 1);

    let mut noted = application.clone();
    noted.admin_notes = Some("called applicant".to_string());
    let committed = harness.repository.update(&noted).expect("fresh write commits");
    assert_eq!(committed.revision, 2);

    let error = harness
        .repository
        .update(&application)
        .expect_err("write based on revision 1 is refused");
    assert!(matches!(
        error,
        RepositoryError::StaleState {
            expected: 1,
            found: 2,
            ..
        }
    ));
}

#[test]
fn recalculation_racing_an_amendment_keeps_the_amendment() {
    let shared = MemoryApplicationRepository::default();
    let directory = Arc::new(MemoryDirectory::default());
    let editor = Arc::new(service_over(Arc::new(shared.clone()), directory.clone()));
    let interleaving = Arc::new(InterleavingRepository::new(shared.clone()));
    let recalculator = service_over(interleaving.clone(), directory);

    let application = editor
        .submit(&course_id(), &weak_payload("tom@example.com"))
        .expect("submission succeeds")
        .application;

    let amending = editor.clone();
    let id = application.id.clone();
    interleaving.before_next_update(move || {
        amending
            .amend(&id, &strong_payload("tom@example.com"))
            .expect("amendment commits between read and write");
    });

    let error = recalculator
        .recalculate(&application.id)
        .expect_err("recalculation read a superseded record");
    assert_eq!(error.kind(), "conflict");

    let stored = shared
        .get(&application.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert!(stored.applicant.has_computer);
    assert_eq!(stored.scores.risk_score, 0);
    assert_eq!(stored.revision, 2);

    let rescored = recalculator
        .recalculate(&application.id)
        .expect("fresh read recalculates");
    assert_eq!(rescored.applicant, stored.applicant);
    assert_eq!(rescored.scores, stored.scores);
}

#[test]
fn approval_racing_an_amendment_is_refused_and_unenrolled() {
    let shared = MemoryApplicationRepository::default();
    let directory = Arc::new(MemoryDirectory::default());
    let editor = Arc::new(service_over(Arc::new(shared.clone()), directory.clone()));
    let interleaving = Arc::new(InterleavingRepository::new(shared.clone()));
    let approver = service_over(interleaving.clone(), directory.clone());

    let application = editor
        .submit(&course_id(), &weak_payload("tom@example.com"))
        .expect("submission succeeds")
        .application;

    let amending = editor.clone();
    let id = application.id.clone();
    interleaving.before_next_update(move || {
        amending
            .amend(&id, &strong_payload("tom@example.com"))
            .expect("amendment commits before the approval write");
    });

    let error = approver
        .approve(&application.id, &reviewer(), false)
        .expect_err("approval of a superseded record is refused");
    assert_eq!(error.kind(), "conflict");
    assert!(directory.enrollments_for(&course_id()).is_empty());

    let stored = shared
        .get(&application.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(stored.status, ApplicationStatus::Pending);
    assert!(stored.applicant.has_computer);
}
