use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, warn};

use super::delivery::{DeliveryDispatcher, DeliveryJob};
use super::domain::{
    CreateReportRequest, Evaluation, NewReport, PageRequest, Report, ReportFilter, ReportId,
    ReportStatus, ReportView, UserId,
};
use super::repository::{EvaluationRepository, RepositoryError, ReportRepository};

/// Identity handed over by the authentication layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    caller: Option<UserId>,
}

impl AuthContext {
    pub fn authenticated(caller: impl Into<String>) -> Self {
        Self {
            caller: Some(UserId(caller.into())),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn caller_id(&self) -> Result<&UserId, ReportServiceError> {
        self.caller.as_ref().ok_or(ReportServiceError::Unauthenticated)
    }
}

/// Secondary operations allowed to fail without failing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryOperation {
    EvaluationSave,
    EvaluationFetch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degradation {
    pub report_id: ReportId,
    pub operation: SecondaryOperation,
    pub error: String,
}

/// Primary result that succeeded, plus any secondary steps that degraded.
#[derive(Debug, Clone, PartialEq)]
pub struct BestEffort<T> {
    pub value: T,
    pub degradations: Vec<Degradation>,
}

impl<T> BestEffort<T> {
    fn new(value: T, degradations: Vec<Degradation>) -> Self {
        Self {
            value,
            degradations,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// One page of joined reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportListing {
    pub reports: Vec<ReportView>,
    pub total: usize,
}

/// Orchestrates report creation, listing, and the draft-to-submitted transition.
pub struct ReportLifecycleService<R, E> {
    reports: Arc<R>,
    evaluations: Arc<E>,
    delivery: Arc<dyn DeliveryDispatcher>,
}

impl<R, E> ReportLifecycleService<R, E>
where
    R: ReportRepository + 'static,
    E: EvaluationRepository + 'static,
{
    pub fn new(reports: Arc<R>, evaluations: Arc<E>, delivery: Arc<dyn DeliveryDispatcher>) -> Self {
        Self {
            reports,
            evaluations,
            delivery,
        }
    }

    /// Persist a draft authored by the caller, saving any evaluation best-effort.
    pub fn create_report(
        &self,
        auth: &AuthContext,
        request: CreateReportRequest,
    ) -> Result<BestEffort<ReportView>, ReportServiceError> {
        let caller = auth.caller_id()?;

        let report = self
            .reports
            .create(NewReport {
                title: request.title,
                description: request.description,
                project_id: request.project_id,
                author_id: caller.clone(),
                department_id: request.department_id,
                metadata: request.metadata,
            })
            .map_err(|err| ReportServiceError::internal("failed to save report", err))?;

        let mut degradations = Vec::new();
        let evaluation = match request.evaluation {
            Some(scorecard) => match self
                .evaluations
                .upsert_for_report(&report.id, scorecard, caller)
            {
                Ok(evaluation) => Some(evaluation),
                Err(err) => {
                    warn!(report_id = %report.id, error = %err, "failed to save evaluation");
                    degradations.push(Degradation {
                        report_id: report.id.clone(),
                        operation: SecondaryOperation::EvaluationSave,
                        error: err.to_string(),
                    });
                    None
                }
            },
            None => None,
        };

        Ok(BestEffort::new(
            ReportView::new(report, evaluation.as_ref()),
            degradations,
        ))
    }

    /// Filtered, paginated listing with each report joined to its evaluation.
    pub fn list_reports(
        &self,
        auth: &AuthContext,
        filter: &ReportFilter,
        page: PageRequest,
    ) -> Result<BestEffort<ReportListing>, ReportServiceError> {
        auth.caller_id()?;

        let page = self
            .reports
            .list(filter, page)
            .map_err(|err| ReportServiceError::internal("failed to list reports", err))?;

        let mut degradations = Vec::new();
        let reports = page
            .reports
            .into_iter()
            .map(|report| {
                let evaluation = self.evaluation_for(&report.id, &mut degradations);
                ReportView::new(report, evaluation.as_ref())
            })
            .collect();

        Ok(BestEffort::new(
            ReportListing {
                reports,
                total: page.total,
            },
            degradations,
        ))
    }

    pub fn get_report(
        &self,
        auth: &AuthContext,
        id: &ReportId,
    ) -> Result<BestEffort<ReportView>, ReportServiceError> {
        auth.caller_id()?;
        let report = self.load(id)?;
        let mut degradations = Vec::new();
        let evaluation = self.evaluation_for(&report.id, &mut degradations);
        Ok(BestEffort::new(
            ReportView::new(report, evaluation.as_ref()),
            degradations,
        ))
    }

    pub fn get_evaluation(
        &self,
        auth: &AuthContext,
        report_id: &ReportId,
    ) -> Result<Evaluation, ReportServiceError> {
        auth.caller_id()?;
        self.evaluations
            .get_by_report(report_id)
            .map_err(|err| match err {
                RepositoryError::NotFound => {
                    ReportServiceError::NotFound("evaluation not found".to_string())
                }
                other => ReportServiceError::internal("failed to get evaluation", other),
            })
    }

    /// Move the caller's draft to `submitted` and queue it for department delivery.
    ///
    /// Returns as soon as the transition is stored; delivery outcome never
    /// affects the result.
    pub fn submit_report(
        &self,
        auth: &AuthContext,
        id: &ReportId,
    ) -> Result<BestEffort<ReportView>, ReportServiceError> {
        let caller = auth.caller_id()?;
        let report = self.load(id)?;

        if &report.author_id != caller {
            return Err(ReportServiceError::PermissionDenied(
                "only the author can submit the report".to_string(),
            ));
        }
        if report.status != ReportStatus::Draft {
            return Err(already_submitted());
        }

        let submitted = self
            .reports
            .transition_status(
                id,
                ReportStatus::Draft,
                ReportStatus::Submitted,
                Some(Utc::now()),
            )
            .map_err(|err| match err {
                RepositoryError::StatusConflict { .. } => already_submitted(),
                RepositoryError::NotFound => {
                    ReportServiceError::NotFound("report not found".to_string())
                }
                other => ReportServiceError::internal("failed to save report", other),
            })?;

        let mut degradations = Vec::new();
        let evaluation = self.evaluation_for(&submitted.id, &mut degradations);

        self.delivery.dispatch(DeliveryJob {
            report: submitted.clone(),
            evaluation: evaluation.clone(),
        });

        Ok(BestEffort::new(
            ReportView::new(submitted, evaluation.as_ref()),
            degradations,
        ))
    }

    fn load(&self, id: &ReportId) -> Result<Report, ReportServiceError> {
        self.reports.get_by_id(id).map_err(|err| match err {
            RepositoryError::NotFound => ReportServiceError::NotFound("report not found".to_string()),
            other => ReportServiceError::internal("failed to get report", other),
        })
    }

    fn evaluation_for(
        &self,
        report_id: &ReportId,
        degradations: &mut Vec<Degradation>,
    ) -> Option<Evaluation> {
        match self.evaluations.get_by_report(report_id) {
            Ok(evaluation) => Some(evaluation),
            Err(RepositoryError::NotFound) => None,
            Err(err) => {
                warn!(report_id = %report_id, error = %err, "failed to get evaluation");
                degradations.push(Degradation {
                    report_id: report_id.clone(),
                    operation: SecondaryOperation::EvaluationFetch,
                    error: err.to_string(),
                });
                None
            }
        }
    }
}

fn already_submitted() -> ReportServiceError {
    ReportServiceError::InvalidArgument("report is already submitted".to_string())
}

/// Machine-readable failure category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    PermissionDenied,
    NotFound,
    InvalidArgument,
    Internal,
}

/// Error raised by the lifecycle service.
#[derive(Debug, thiserror::Error)]
pub enum ReportServiceError {
    #[error("user must be authenticated")]
    Unauthenticated,
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{message}")]
    Internal {
        message: &'static str,
        #[source]
        source: RepositoryError,
    },
}

impl ReportServiceError {
    fn internal(message: &'static str, source: RepositoryError) -> Self {
        error!(error = %source, "{message}");
        Self::Internal { message, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportServiceError::Unauthenticated => ErrorKind::Unauthenticated,
            ReportServiceError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ReportServiceError::NotFound(_) => ErrorKind::NotFound,
            ReportServiceError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ReportServiceError::Internal { .. } => ErrorKind::Internal,
        }
    }
}
