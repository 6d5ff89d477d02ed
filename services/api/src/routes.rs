use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use report_desk::workflows::reports::{
    report_router, DepartmentCatalog, EvaluationRepository, ReportLifecycleService,
    ReportRepository,
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

pub(crate) fn with_report_routes<R, E>(service: Arc<ReportLifecycleService<R, E>>) -> axum::Router
where
    R: ReportRepository + 'static,
    E: EvaluationRepository + 'static,
{
    report_router(service)
        .route("/api/departments", axum::routing::get(departments_endpoint))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn departments_endpoint(Extension(state): Extension<AppState>) -> Response {
    match state.catalog.list() {
        Ok(departments) => {
            (StatusCode::OK, Json(json!({ "departments": departments }))).into_response()
        }
        Err(err) => {
            error!(error = %err, "failed to list departments");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "kind": "internal", "error": "failed to list departments" })),
            )
                .into_response()
        }
    }
}
