use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::domain::{
    Evaluation, EvaluationId, NewReport, PageRequest, Report, ReportFilter, ReportId, ReportPage,
    ReportStatus, Scorecard, UserId,
};
use super::store::EntityStore;

/// Error enumeration for storage failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("report status is {actual}")]
    StatusConflict { actual: ReportStatus },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Typed report operations so the lifecycle service can be exercised in isolation.
pub trait ReportRepository: Send + Sync {
    fn create(&self, report: NewReport) -> Result<Report, RepositoryError>;
    fn get_by_id(&self, id: &ReportId) -> Result<Report, RepositoryError>;
    fn list(&self, filter: &ReportFilter, page: PageRequest) -> Result<ReportPage, RepositoryError>;
    fn update_status(
        &self,
        id: &ReportId,
        status: ReportStatus,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Result<Report, RepositoryError>;
    /// Compare-and-swap on status: fails with `StatusConflict` unless the stored status is `from`.
    fn transition_status(
        &self,
        id: &ReportId,
        from: ReportStatus,
        to: ReportStatus,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Result<Report, RepositoryError>;
    fn delete(&self, id: &ReportId) -> Result<(), RepositoryError>;
}

/// Evaluation scorecards keyed one-per-report.
pub trait EvaluationRepository: Send + Sync {
    fn upsert_for_report(
        &self,
        report_id: &ReportId,
        scorecard: Scorecard,
        evaluator_id: &UserId,
    ) -> Result<Evaluation, RepositoryError>;
    fn get_by_report(&self, report_id: &ReportId) -> Result<Evaluation, RepositoryError>;
    fn get_by_id(&self, id: &EvaluationId) -> Result<Evaluation, RepositoryError>;
    fn delete(&self, id: &EvaluationId) -> Result<(), RepositoryError>;
}

#[derive(Default, Clone)]
pub struct InMemoryReportRepository {
    store: Arc<EntityStore<Report>>,
}

impl InMemoryReportRepository {
    pub fn new(store: Arc<EntityStore<Report>>) -> Self {
        Self { store }
    }

    /// Persist a fully formed report as-is, keeping its id when present.
    pub fn import(&self, report: Report) -> Result<Report, RepositoryError> {
        self.store.put(report)
    }
}

impl ReportRepository for InMemoryReportRepository {
    fn create(&self, report: NewReport) -> Result<Report, RepositoryError> {
        let now = Utc::now();
        self.store.put(Report {
            id: ReportId::default(),
            title: report.title,
            description: report.description,
            project_id: report.project_id,
            author_id: report.author_id,
            department_id: report.department_id,
            status: ReportStatus::Draft,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            metadata: report.metadata,
        })
    }

    fn get_by_id(&self, id: &ReportId) -> Result<Report, RepositoryError> {
        self.store.get(&id.0)
    }

    fn list(&self, filter: &ReportFilter, page: PageRequest) -> Result<ReportPage, RepositoryError> {
        let mut matches: Vec<Report> = self.store.scan(|report| filter.matches(report))?.collect();
        // Storage order is arbitrary; pages need a stable one.
        matches.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = matches.len();
        let reports = matches
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();

        Ok(ReportPage { reports, total })
    }

    fn update_status(
        &self,
        id: &ReportId,
        status: ReportStatus,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Result<Report, RepositoryError> {
        self.store.update(&id.0, |report: &mut Report| {
            apply_status(report, status, submitted_at);
            Ok::<(), RepositoryError>(())
        })
    }

    fn transition_status(
        &self,
        id: &ReportId,
        from: ReportStatus,
        to: ReportStatus,
        submitted_at: Option<DateTime<Utc>>,
    ) -> Result<Report, RepositoryError> {
        self.store.update(&id.0, |report: &mut Report| {
            if report.status != from {
                return Err(RepositoryError::StatusConflict {
                    actual: report.status,
                });
            }
            apply_status(report, to, submitted_at);
            Ok(())
        })
    }

    fn delete(&self, id: &ReportId) -> Result<(), RepositoryError> {
        self.store.delete(&id.0).map(|_| ())
    }
}

/// `submitted_at` is stamped on the first move into `Submitted` and cleared on leaving it.
fn apply_status(report: &mut Report, status: ReportStatus, submitted_at: Option<DateTime<Utc>>) {
    report.status = status;
    if status == ReportStatus::Submitted {
        if report.submitted_at.is_none() {
            report.submitted_at = Some(submitted_at.unwrap_or_else(Utc::now));
        }
    } else {
        report.submitted_at = None;
    }
}

#[derive(Default, Clone)]
pub struct InMemoryEvaluationRepository {
    store: Arc<EntityStore<Evaluation>>,
}

impl InMemoryEvaluationRepository {
    pub fn new(store: Arc<EntityStore<Evaluation>>) -> Self {
        Self { store }
    }
}

impl EvaluationRepository for InMemoryEvaluationRepository {
    fn upsert_for_report(
        &self,
        report_id: &ReportId,
        scorecard: Scorecard,
        evaluator_id: &UserId,
    ) -> Result<Evaluation, RepositoryError> {
        let replacement = scorecard.clone();
        let evaluator = evaluator_id.clone();
        self.store.upsert_by_secondary_key(
            &report_id.0,
            move |existing: &mut Evaluation| {
                existing.scorecard = replacement;
                existing.evaluator_id = evaluator;
            },
            || {
                let now = Utc::now();
                Evaluation {
                    id: EvaluationId::default(),
                    report_id: report_id.clone(),
                    scorecard,
                    evaluator_id: evaluator_id.clone(),
                    created_at: now,
                    updated_at: now,
                }
            },
        )
    }

    fn get_by_report(&self, report_id: &ReportId) -> Result<Evaluation, RepositoryError> {
        self.store.get_by_secondary_key(&report_id.0)
    }

    fn get_by_id(&self, id: &EvaluationId) -> Result<Evaluation, RepositoryError> {
        self.store.get(&id.0)
    }

    fn delete(&self, id: &EvaluationId) -> Result<(), RepositoryError> {
        self.store.delete(&id.0).map(|_| ())
    }
}
