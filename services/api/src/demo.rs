use crate::infra::build_report_stack;
use clap::{Args, ValueEnum};
use report_desk::config::AppConfig;
use report_desk::error::AppError;
use report_desk::workflows::reports::catalog::{
    BACKEND_DEPARTMENT_ID, FRONTEND_DEPARTMENT_ID, SECURITY_DEPARTMENT_ID,
};
use report_desk::workflows::reports::{
    AuthContext, CreateReportRequest, DeliveryOutcome, PageRequest, ReportFilter, ReportStatus,
    Scorecard,
};
use std::time::Duration;

const DEMO_PROJECT_ID: &str = "0d8f6c2a-5e4b-4c3d-9a1f-7b2e6d4c8a90";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum DemoDepartment {
    #[default]
    Security,
    Backend,
    Frontend,
}

impl DemoDepartment {
    fn id(self) -> &'static str {
        match self {
            DemoDepartment::Security => SECURITY_DEPARTMENT_ID,
            DemoDepartment::Backend => BACKEND_DEPARTMENT_ID,
            DemoDepartment::Frontend => FRONTEND_DEPARTMENT_ID,
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Department that receives the demo report.
    #[arg(long, value_enum, default_value_t = DemoDepartment::Security)]
    pub(crate) department: DemoDepartment,
    /// Override the simulated department latency (milliseconds).
    #[arg(long)]
    pub(crate) latency_ms: Option<u64>,
    /// Submit the report without an evaluation scorecard.
    #[arg(long)]
    pub(crate) skip_evaluation: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        department,
        latency_ms,
        skip_evaluation,
    } = args;

    let mut delivery = AppConfig::load()?.delivery;
    if let Some(latency_ms) = latency_ms {
        delivery.simulated_latency = Duration::from_millis(latency_ms);
    }

    let stack = build_report_stack(&delivery);
    let mut outcomes = stack.delivery.subscribe();
    let author = AuthContext::authenticated("u1");
    let reviewer = AuthContext::authenticated("u2");

    println!("Report desk demo");
    let created = stack
        .service
        .create_report(&author, demo_request(department, !skip_evaluation))?;
    if created.is_degraded() {
        println!("- evaluation could not be saved; continuing without it");
    }
    let created = created.into_value();
    println!(
        "- u1 drafted \"{}\" ({}) | status {}",
        created.report.title, created.report.id, created.report.status
    );

    match stack.service.submit_report(&reviewer, &created.report.id) {
        Err(err) => println!("- u2 submit refused: {err}"),
        Ok(_) => println!("- u2 submit unexpectedly accepted"),
    }

    let submitted = stack
        .service
        .submit_report(&author, &created.report.id)?
        .into_value();
    println!(
        "- u1 submitted | status {} | submitted_at {}",
        submitted.report.status,
        submitted
            .report
            .submitted_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_default()
    );

    match stack.service.submit_report(&author, &created.report.id) {
        Err(err) => println!("- repeated submit refused: {err}"),
        Ok(_) => println!("- repeated submit unexpectedly accepted"),
    }

    let listing = stack
        .service
        .list_reports(
            &author,
            &ReportFilter {
                status: Some(ReportStatus::Submitted),
                ..ReportFilter::default()
            },
            PageRequest::default(),
        )?
        .into_value();
    println!("- {} submitted report(s) on file", listing.total);

    let wait = delivery
        .attempt_timeout
        .saturating_mul(delivery.max_attempts.max(1))
        .saturating_add(delivery.backoff_after(delivery.max_attempts))
        .saturating_add(Duration::from_secs(1));
    println!("Waiting up to {wait:?} for department delivery...");
    match tokio::time::timeout(wait, outcomes.recv()).await {
        Ok(Ok(outcome)) => println!("{}", describe_outcome(&outcome)),
        Ok(Err(err)) => println!("- delivery outcome unavailable: {err}"),
        Err(_) => println!("- delivery still pending after {wait:?}"),
    }

    Ok(())
}

fn demo_request(department: DemoDepartment, with_evaluation: bool) -> CreateReportRequest {
    CreateReportRequest {
        title: "Auth Module Review".to_string(),
        description: "JWT login flow, refresh tokens, and session revocation".to_string(),
        project_id: DEMO_PROJECT_ID.to_string(),
        department_id: department.id().to_string(),
        evaluation: with_evaluation.then(|| Scorecard {
            security_score: 8,
            performance_score: 7,
            memory_score: 6,
            testing_score: 7,
            error_score: 8,
            load_score: 6,
            security_details: "JWT validation, CSRF protection, rate limiting".to_string(),
            load_details: "Handles 500 requests/sec".to_string(),
            ..Scorecard::default()
        }),
        metadata: None,
    }
}

fn describe_outcome(outcome: &DeliveryOutcome) -> String {
    match outcome {
        DeliveryOutcome::Delivered {
            report_id,
            department,
            attempts,
        } => format!("- {report_id} delivered to {department} after {attempts} attempt(s)"),
        DeliveryOutcome::Aborted { report_id, reason } => {
            format!("- {report_id} not delivered: {reason}")
        }
        DeliveryOutcome::DeadLettered {
            report_id,
            attempts,
            last_error,
        } => format!("- {report_id} dead-lettered after {attempts} attempt(s): {last_error}"),
    }
}
