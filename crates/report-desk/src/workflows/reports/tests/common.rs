use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::DeliveryConfig;
use crate::workflows::reports::catalog::SECURITY_DEPARTMENT_ID;
use crate::workflows::reports::delivery::{
    DeliveryDispatcher, DeliveryJob, DeliveryPayload, DepartmentGateway, GatewayError,
};
use crate::workflows::reports::domain::{
    CreateReportRequest, Department, Evaluation, EvaluationId, NewReport, PageRequest, Report,
    ReportFilter, ReportId, ReportPage, ReportStatus, Scorecard, UserId,
};
use crate::workflows::reports::repository::{
    EvaluationRepository, InMemoryEvaluationRepository, InMemoryReportRepository,
    ReportRepository, RepositoryError,
};
use crate::workflows::reports::service::{AuthContext, ReportLifecycleService};

pub(super) const PROJECT_ID: &str = "0d8f6c2a-5e4b-4c3d-9a1f-7b2e6d4c8a90";
pub(super) const OTHER_PROJECT_ID: &str = "1e9a7d3b-6f5c-4d4e-8b2a-8c3f7e5d9b01";
pub(super) const UNKNOWN_DEPARTMENT_ID: &str = "ffffffff-0000-4000-8000-000000000000";

pub(super) fn caller(id: &str) -> AuthContext {
    AuthContext::authenticated(id)
}

pub(super) fn scorecard() -> Scorecard {
    Scorecard {
        security_score: 8,
        performance_score: 7,
        memory_score: 6,
        testing_score: 7,
        error_score: 8,
        load_score: 6,
        security_details: "JWT validation, CSRF protection, rate limiting".to_string(),
        performance_details: "Response caching on hot paths".to_string(),
        memory_details: "No unbounded buffers".to_string(),
        testing_details: "Unit and integration coverage".to_string(),
        error_details: "Typed errors with operator logs".to_string(),
        load_details: "Handles 500 requests/sec".to_string(),
    }
}

pub(super) fn create_request() -> CreateReportRequest {
    CreateReportRequest {
        title: "Auth Module Review".to_string(),
        description: "JWT login flow and tokens".to_string(),
        project_id: PROJECT_ID.to_string(),
        department_id: SECURITY_DEPARTMENT_ID.to_string(),
        evaluation: None,
        metadata: None,
    }
}

pub(super) fn new_report(author: &str, project: &str) -> NewReport {
    NewReport {
        title: "Gateway Review".to_string(),
        description: "Rate limiting and retries for the gateway".to_string(),
        project_id: project.to_string(),
        author_id: UserId(author.to_string()),
        department_id: SECURITY_DEPARTMENT_ID.to_string(),
        metadata: None,
    }
}

/// Unsaved report with an explicit status, for seeding via `put`/`import`.
pub(super) fn report_fixture(author: &str, status: ReportStatus) -> Report {
    let created_at: DateTime<Utc> = Utc::now();
    Report {
        id: ReportId::default(),
        title: "Seeded report".to_string(),
        description: "Seeded directly into the store".to_string(),
        project_id: PROJECT_ID.to_string(),
        author_id: UserId(author.to_string()),
        department_id: SECURITY_DEPARTMENT_ID.to_string(),
        status,
        created_at,
        updated_at: created_at,
        submitted_at: (status == ReportStatus::Submitted).then_some(created_at),
        metadata: None,
    }
}

pub(super) fn evaluation_fixture(report_id: &str, security_score: u8) -> Evaluation {
    let now = Utc::now();
    Evaluation {
        id: EvaluationId::default(),
        report_id: ReportId(report_id.to_string()),
        scorecard: Scorecard {
            security_score,
            ..scorecard()
        },
        evaluator_id: UserId("reviewer".to_string()),
        created_at: now,
        updated_at: now,
    }
}

pub(super) type MemoryService =
    ReportLifecycleService<InMemoryReportRepository, InMemoryEvaluationRepository>;

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryReportRepository>,
    Arc<InMemoryEvaluationRepository>,
    Arc<RecordingDispatcher>,
) {
    let reports = Arc::new(InMemoryReportRepository::default());
    let evaluations = Arc::new(InMemoryEvaluationRepository::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let service =
        ReportLifecycleService::new(reports.clone(), evaluations.clone(), dispatcher.clone());
    (service, reports, evaluations, dispatcher)
}

#[derive(Default)]
pub(super) struct RecordingDispatcher {
    jobs: Mutex<Vec<DeliveryJob>>,
}

impl RecordingDispatcher {
    pub(super) fn jobs(&self) -> Vec<DeliveryJob> {
        self.jobs.lock().expect("dispatcher mutex poisoned").clone()
    }
}

impl DeliveryDispatcher for RecordingDispatcher {
    fn dispatch(&self, job: DeliveryJob) {
        self.jobs.lock().expect("dispatcher mutex poisoned").push(job);
    }
}

pub(super) struct UnavailableReportRepository;

impl ReportRepository for UnavailableReportRepository {
    fn create(&self, _report: NewReport) -> Result<Report, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn get_by_id(&self, _id: &ReportId) -> Result<Report, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(
        &self,
        _filter: &ReportFilter,
        _page: PageRequest,
    ) -> Result<ReportPage, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_status(
        &self,
        _id: &ReportId,
        _status: ReportStatus,
        _submitted_at: Option<DateTime<Utc>>,
    ) -> Result<Report, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn transition_status(
        &self,
        _id: &ReportId,
        _from: ReportStatus,
        _to: ReportStatus,
        _submitted_at: Option<DateTime<Utc>>,
    ) -> Result<Report, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: &ReportId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct UnavailableEvaluationRepository;

impl EvaluationRepository for UnavailableEvaluationRepository {
    fn upsert_for_report(
        &self,
        _report_id: &ReportId,
        _scorecard: Scorecard,
        _evaluator_id: &UserId,
    ) -> Result<Evaluation, RepositoryError> {
        Err(RepositoryError::Unavailable("evaluation store offline".to_string()))
    }

    fn get_by_report(&self, _report_id: &ReportId) -> Result<Evaluation, RepositoryError> {
        Err(RepositoryError::Unavailable("evaluation store offline".to_string()))
    }

    fn get_by_id(&self, _id: &EvaluationId) -> Result<Evaluation, RepositoryError> {
        Err(RepositoryError::Unavailable("evaluation store offline".to_string()))
    }

    fn delete(&self, _id: &EvaluationId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("evaluation store offline".to_string()))
    }
}

pub(super) fn fast_delivery_config(max_attempts: u32) -> DeliveryConfig {
    DeliveryConfig {
        attempt_timeout: Duration::from_millis(200),
        max_attempts,
        base_backoff: Duration::from_millis(1),
        simulated_latency: Duration::ZERO,
    }
}

/// Gateway that fails a scripted number of times before accepting.
#[derive(Default)]
pub(super) struct ScriptedGateway {
    failures: Mutex<VecDeque<GatewayError>>,
    calls: AtomicU32,
    delivered: Mutex<Vec<(Department, DeliveryPayload)>>,
}

impl ScriptedGateway {
    pub(super) fn failing(times: usize) -> Self {
        let failures = (0..times)
            .map(|attempt| GatewayError::Unreachable(format!("connection reset #{attempt}")))
            .collect();
        Self {
            failures: Mutex::new(failures),
            ..Self::default()
        }
    }

    pub(super) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) fn delivered(&self) -> Vec<(Department, DeliveryPayload)> {
        self.delivered.lock().expect("gateway mutex poisoned").clone()
    }
}

#[async_trait]
impl DepartmentGateway for ScriptedGateway {
    async fn deliver(
        &self,
        department: &Department,
        payload: &DeliveryPayload,
    ) -> Result<(), GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self
            .failures
            .lock()
            .expect("gateway mutex poisoned")
            .pop_front()
        {
            return Err(failure);
        }
        self.delivered
            .lock()
            .expect("gateway mutex poisoned")
            .push((department.clone(), payload.clone()));
        Ok(())
    }
}

/// Gateway that never answers within any reasonable timeout.
pub(super) struct StalledGateway;

#[async_trait]
impl DepartmentGateway for StalledGateway {
    async fn deliver(
        &self,
        _department: &Department,
        _payload: &DeliveryPayload,
    ) -> Result<(), GatewayError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
