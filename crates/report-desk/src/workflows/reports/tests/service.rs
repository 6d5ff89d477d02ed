use super::common::*;
use std::sync::Arc;
use std::thread;

use crate::workflows::reports::domain::{PageRequest, ReportFilter, ReportId, ReportStatus, UserId};
use crate::workflows::reports::repository::{
    EvaluationRepository, InMemoryEvaluationRepository, InMemoryReportRepository,
    ReportRepository,
};
use crate::workflows::reports::service::{
    AuthContext, ErrorKind, ReportLifecycleService, ReportServiceError, SecondaryOperation,
};

#[test]
fn author_creates_then_submits_once() {
    let (service, reports, _, dispatcher) = build_service();
    let author = caller("u1");

    let created = service
        .create_report(&author, create_request())
        .expect("create succeeds")
        .into_value();
    assert_eq!(created.report.status, ReportStatus::Draft);
    assert_eq!(created.report.author_id, UserId("u1".to_string()));

    match service.submit_report(&caller("u2"), &created.report.id) {
        Err(error @ ReportServiceError::PermissionDenied(_)) => {
            assert_eq!(error.to_string(), "only the author can submit the report");
        }
        other => panic!("expected permission denied, got {other:?}"),
    }

    let submitted = service
        .submit_report(&author, &created.report.id)
        .expect("author submits")
        .into_value();
    assert_eq!(submitted.report.status, ReportStatus::Submitted);
    assert!(submitted.report.submitted_at.is_some());

    match service.submit_report(&author, &created.report.id) {
        Err(error @ ReportServiceError::InvalidArgument(_)) => {
            assert_eq!(error.to_string(), "report is already submitted");
        }
        other => panic!("expected invalid argument, got {other:?}"),
    }

    let stored = reports.get_by_id(&created.report.id).expect("stored");
    assert_eq!(stored.status, ReportStatus::Submitted);
    assert_eq!(dispatcher.jobs().len(), 1);
}

#[test]
fn every_operation_requires_a_caller() {
    let (service, _, _, dispatcher) = build_service();
    let anonymous = AuthContext::anonymous();
    let id = ReportId("a1b2c3d4-0000-4000-8000-000000000001".to_string());

    assert!(matches!(
        service.create_report(&anonymous, create_request()),
        Err(ReportServiceError::Unauthenticated)
    ));
    assert!(matches!(
        service.list_reports(&anonymous, &ReportFilter::default(), PageRequest::default()),
        Err(ReportServiceError::Unauthenticated)
    ));
    assert!(matches!(
        service.get_report(&anonymous, &id),
        Err(ReportServiceError::Unauthenticated)
    ));
    assert!(matches!(
        service.submit_report(&anonymous, &id),
        Err(ReportServiceError::Unauthenticated)
    ));
    assert!(dispatcher.jobs().is_empty());
}

#[test]
fn create_saves_evaluation_with_caller_as_evaluator() {
    let (service, _, evaluations, _) = build_service();
    let mut request = create_request();
    request.evaluation = Some(scorecard());

    let outcome = service
        .create_report(&caller("u1"), request)
        .expect("create succeeds");

    assert!(!outcome.is_degraded());
    let view = outcome.into_value();
    let evaluation = view.evaluation.expect("evaluation joined");
    assert_eq!(evaluation.scorecard, scorecard());
    assert_eq!(evaluation.evaluator_id, UserId("u1".to_string()));

    let stored = evaluations
        .get_by_report(&view.report.id)
        .expect("evaluation stored");
    assert_eq!(stored.scorecard.security_score, 8);
}

#[test]
fn create_survives_evaluation_save_failure() {
    let reports = Arc::new(InMemoryReportRepository::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let service = ReportLifecycleService::new(
        reports.clone(),
        Arc::new(UnavailableEvaluationRepository),
        dispatcher,
    );
    let mut request = create_request();
    request.evaluation = Some(scorecard());

    let outcome = service
        .create_report(&caller("u1"), request)
        .expect("primary write still succeeds");

    assert!(outcome.is_degraded());
    assert_eq!(
        outcome.degradations[0].operation,
        SecondaryOperation::EvaluationSave
    );
    assert!(outcome.value.evaluation.is_none());
    assert!(reports.get_by_id(&outcome.value.report.id).is_ok());
}

#[test]
fn create_hides_storage_details_from_callers() {
    let service = ReportLifecycleService::new(
        Arc::new(UnavailableReportRepository),
        Arc::new(InMemoryEvaluationRepository::default()),
        Arc::new(RecordingDispatcher::default()),
    );

    let error = service
        .create_report(&caller("u1"), create_request())
        .expect_err("storage is offline");

    assert_eq!(error.kind(), ErrorKind::Internal);
    assert_eq!(error.to_string(), "failed to save report");
}

#[test]
fn list_counts_matches_before_pagination() {
    let (service, _, _, _) = build_service();
    let author = caller("u1");
    let mut ids = Vec::new();
    for _ in 0..5 {
        let view = service
            .create_report(&author, create_request())
            .expect("create")
            .into_value();
        ids.push(view.report.id);
    }
    for id in &ids[..2] {
        service.submit_report(&author, id).expect("submit");
    }

    let filter = ReportFilter {
        status: Some(ReportStatus::Submitted),
        ..ReportFilter::default()
    };
    let listing = service
        .list_reports(&author, &filter, PageRequest::new(Some(1), None))
        .expect("list succeeds")
        .into_value();

    assert_eq!(listing.total, 2);
    assert_eq!(listing.reports.len(), 1);
    assert_eq!(listing.reports[0].report.status, ReportStatus::Submitted);
}

#[test]
fn list_degrades_when_evaluation_join_fails() {
    let reports = Arc::new(InMemoryReportRepository::default());
    reports
        .create(new_report("u1", PROJECT_ID))
        .expect("seed");
    let service = ReportLifecycleService::new(
        reports,
        Arc::new(UnavailableEvaluationRepository),
        Arc::new(RecordingDispatcher::default()),
    );

    let outcome = service
        .list_reports(&caller("u1"), &ReportFilter::default(), PageRequest::default())
        .expect("listing still succeeds");

    assert_eq!(outcome.value.reports.len(), 1);
    assert!(outcome.value.reports[0].evaluation.is_none());
    assert_eq!(
        outcome.degradations[0].operation,
        SecondaryOperation::EvaluationFetch
    );
}

#[test]
fn get_report_joins_evaluation_and_reports_missing_ids() {
    let (service, _, _, _) = build_service();
    let mut request = create_request();
    request.evaluation = Some(scorecard());
    let created = service
        .create_report(&caller("u1"), request)
        .expect("create")
        .into_value();

    let fetched = service
        .get_report(&caller("u2"), &created.report.id)
        .expect("any caller can read")
        .into_value();
    assert_eq!(fetched, created);

    let evaluation = service
        .get_evaluation(&caller("u2"), &created.report.id)
        .expect("evaluation readable");
    assert_eq!(evaluation.report_id, created.report.id);

    assert!(matches!(
        service.get_report(&caller("u1"), &ReportId("missing".to_string())),
        Err(ReportServiceError::NotFound(_))
    ));
}

#[test]
fn submit_unknown_report_is_not_found() {
    let (service, _, _, dispatcher) = build_service();

    match service.submit_report(&caller("u1"), &ReportId("missing".to_string())) {
        Err(error @ ReportServiceError::NotFound(_)) => {
            assert_eq!(error.to_string(), "report not found");
        }
        other => panic!("expected not found, got {other:?}"),
    }
    assert!(dispatcher.jobs().is_empty());
}

#[test]
fn only_the_author_can_submit() {
    let (service, reports, _, dispatcher) = build_service();
    let created = service
        .create_report(&caller("u1"), create_request())
        .expect("create")
        .into_value();

    for intruder in ["u2", "admin", "U1", "u1 "] {
        let result = service.submit_report(&caller(intruder), &created.report.id);
        assert!(
            matches!(result, Err(ReportServiceError::PermissionDenied(_))),
            "{intruder:?} should be denied"
        );
    }

    assert_eq!(
        reports.get_by_id(&created.report.id).expect("stored").status,
        ReportStatus::Draft
    );
    assert!(dispatcher.jobs().is_empty());
}

#[test]
fn non_draft_reports_cannot_be_submitted() {
    let (service, reports, _, dispatcher) = build_service();

    for status in [ReportStatus::Approved, ReportStatus::Rejected] {
        let report = reports
            .import(report_fixture("u1", status))
            .expect("import");
        assert!(matches!(
            service.submit_report(&caller("u1"), &report.id),
            Err(ReportServiceError::InvalidArgument(_))
        ));
        assert_eq!(reports.get_by_id(&report.id).expect("stored").status, status);
    }
    assert!(dispatcher.jobs().is_empty());
}

#[test]
fn submit_hands_report_and_evaluation_to_delivery() {
    let (service, _, _, dispatcher) = build_service();
    let mut request = create_request();
    request.evaluation = Some(scorecard());
    let created = service
        .create_report(&caller("u1"), request)
        .expect("create")
        .into_value();

    service
        .submit_report(&caller("u1"), &created.report.id)
        .expect("submit");

    let jobs = dispatcher.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].report.id, created.report.id);
    assert_eq!(jobs[0].report.status, ReportStatus::Submitted);
    assert_eq!(
        jobs[0].evaluation.as_ref().map(|e| e.scorecard.clone()),
        Some(scorecard())
    );
}

#[test]
fn concurrent_submissions_transition_exactly_once() {
    let (service, reports, _, dispatcher) = build_service();
    let created = service
        .create_report(&caller("u1"), create_request())
        .expect("create")
        .into_value();
    let id = created.report.id;

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| scope.spawn(|| service.submit_report(&caller("u1"), &id)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("submit thread panicked"))
            .collect()
    });

    let successes = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results.iter().filter(|result| result.is_err()).all(|result| {
        matches!(result, Err(ReportServiceError::InvalidArgument(_)))
    }));
    assert_eq!(
        reports.get_by_id(&id).expect("stored").status,
        ReportStatus::Submitted
    );
    assert_eq!(dispatcher.jobs().len(), 1);
}
