use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::domain::{
    CreateReportRequest, PageRequest, ReportFilter, ReportId, ReportStatus, UserId, MAX_SCORE,
};
use super::repository::{EvaluationRepository, ReportRepository};
use super::service::{AuthContext, ErrorKind, ReportLifecycleService, ReportServiceError};

/// Header carrying the caller identity resolved by the upstream auth layer.
pub const CALLER_HEADER: &str = "x-user-id";

const MIN_TITLE_CHARS: usize = 5;
const MIN_DESCRIPTION_CHARS: usize = 20;

/// Router builder exposing the report lifecycle over HTTP.
pub fn report_router<R, E>(service: Arc<ReportLifecycleService<R, E>>) -> Router
where
    R: ReportRepository + 'static,
    E: EvaluationRepository + 'static,
{
    Router::new()
        .route(
            "/api/reports",
            post(create_handler::<R, E>).get(list_handler::<R, E>),
        )
        .route("/api/reports/:report_id", get(get_handler::<R, E>))
        .route(
            "/api/reports/:report_id/evaluation",
            get(evaluation_handler::<R, E>),
        )
        .route(
            "/api/reports/:report_id/submit",
            post(submit_handler::<R, E>),
        )
        .with_state(service)
}

pub(crate) fn auth_from_headers(headers: &HeaderMap) -> AuthContext {
    headers
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(AuthContext::authenticated)
        .unwrap_or_default()
}

/// Query string accepted by the list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ListReportsQuery {
    pub status: Option<String>,
    pub author_id: Option<String>,
    pub project_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListReportsQuery {
    pub fn into_parts(self) -> Result<(ReportFilter, PageRequest), ReportServiceError> {
        let status = self
            .status
            .map(|raw| raw.parse::<ReportStatus>())
            .transpose()
            .map_err(|err| ReportServiceError::InvalidArgument(err.to_string()))?;

        let filter = ReportFilter {
            status,
            author_id: self.author_id.map(UserId),
            project_id: self.project_id,
        };
        Ok((filter, PageRequest::new(self.limit, self.offset)))
    }
}

pub(crate) fn validate_create(request: &CreateReportRequest) -> Result<(), ReportServiceError> {
    if request.title.chars().count() < MIN_TITLE_CHARS {
        return Err(invalid(format!(
            "title must be at least {MIN_TITLE_CHARS} characters"
        )));
    }
    if request.description.chars().count() < MIN_DESCRIPTION_CHARS {
        return Err(invalid(format!(
            "description must be at least {MIN_DESCRIPTION_CHARS} characters"
        )));
    }
    if Uuid::parse_str(&request.project_id).is_err() {
        return Err(invalid("project_id must be a UUID".to_string()));
    }
    if Uuid::parse_str(&request.department_id).is_err() {
        return Err(invalid("department_id must be a UUID".to_string()));
    }
    if let Some((field, _)) = request
        .evaluation
        .as_ref()
        .and_then(|scorecard| scorecard.out_of_range())
    {
        return Err(invalid(format!("{field} must be between 0 and {MAX_SCORE}")));
    }
    Ok(())
}

fn parse_report_id(raw: String) -> Result<ReportId, ReportServiceError> {
    Uuid::parse_str(&raw)
        .map(|_| ReportId(raw))
        .map_err(|_| invalid("report id must be a UUID".to_string()))
}

fn invalid(message: String) -> ReportServiceError {
    ReportServiceError::InvalidArgument(message)
}

pub fn error_response(error: ReportServiceError) -> Response {
    let kind = error.kind();
    let status = match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "kind": kind,
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

pub(crate) async fn create_handler<R, E>(
    State(service): State<Arc<ReportLifecycleService<R, E>>>,
    headers: HeaderMap,
    body: Result<Json<CreateReportRequest>, JsonRejection>,
) -> Response
where
    R: ReportRepository + 'static,
    E: EvaluationRepository + 'static,
{
    let auth = auth_from_headers(&headers);
    if let Err(error) = auth.caller_id() {
        return error_response(error);
    }

    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return error_response(invalid(rejection.body_text())),
    };

    match validate_create(&request).and_then(|()| service.create_report(&auth, request)) {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome.into_value())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<R, E>(
    State(service): State<Arc<ReportLifecycleService<R, E>>>,
    headers: HeaderMap,
    query: Result<Query<ListReportsQuery>, QueryRejection>,
) -> Response
where
    R: ReportRepository + 'static,
    E: EvaluationRepository + 'static,
{
    let auth = auth_from_headers(&headers);
    if let Err(error) = auth.caller_id() {
        return error_response(error);
    }

    let result = query
        .map_err(|rejection| invalid(rejection.body_text()))
        .and_then(|Query(query)| query.into_parts())
        .and_then(|(filter, page)| service.list_reports(&auth, &filter, page));

    match result {
        Ok(outcome) => (StatusCode::OK, Json(outcome.into_value())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_handler<R, E>(
    State(service): State<Arc<ReportLifecycleService<R, E>>>,
    headers: HeaderMap,
    Path(report_id): Path<String>,
) -> Response
where
    R: ReportRepository + 'static,
    E: EvaluationRepository + 'static,
{
    let auth = auth_from_headers(&headers);
    let result = auth
        .caller_id()
        .and_then(|_| parse_report_id(report_id))
        .and_then(|id| service.get_report(&auth, &id));

    match result {
        Ok(outcome) => (StatusCode::OK, Json(outcome.into_value())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn evaluation_handler<R, E>(
    State(service): State<Arc<ReportLifecycleService<R, E>>>,
    headers: HeaderMap,
    Path(report_id): Path<String>,
) -> Response
where
    R: ReportRepository + 'static,
    E: EvaluationRepository + 'static,
{
    let auth = auth_from_headers(&headers);
    let result = auth
        .caller_id()
        .and_then(|_| parse_report_id(report_id))
        .and_then(|id| service.get_evaluation(&auth, &id));

    match result {
        Ok(evaluation) => (StatusCode::OK, Json(evaluation)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<R, E>(
    State(service): State<Arc<ReportLifecycleService<R, E>>>,
    headers: HeaderMap,
    Path(report_id): Path<String>,
) -> Response
where
    R: ReportRepository + 'static,
    E: EvaluationRepository + 'static,
{
    let auth = auth_from_headers(&headers);
    let result = auth
        .caller_id()
        .and_then(|_| parse_report_id(report_id))
        .and_then(|id| service.submit_report(&auth, &id));

    match result {
        Ok(outcome) => (StatusCode::OK, Json(outcome.into_value())).into_response(),
        Err(error) => error_response(error),
    }
}
