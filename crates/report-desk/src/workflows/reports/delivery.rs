//! Best-effort forwarding of submitted reports to their owning department.
//!
//! Submissions are queued over an unbounded channel to a worker spawned once
//! per process. Every job runs on its own task, outside any request scope, and
//! finishes with exactly one [`DeliveryOutcome`] broadcast to subscribers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::catalog::DepartmentCatalog;
use super::domain::{Department, Evaluation, Metadata, Report, ReportId, Scorecard, UserId};
use crate::config::DeliveryConfig;

const OUTCOME_CHANNEL_CAPACITY: usize = 256;

/// A submitted report and its evaluation, if one was on file at submission time.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryJob {
    pub report: Report,
    pub evaluation: Option<Evaluation>,
}

/// Hand-off seam between the lifecycle service and the delivery worker.
pub trait DeliveryDispatcher: Send + Sync {
    /// Must not block and must not fail the caller.
    fn dispatch(&self, job: DeliveryJob);
}

/// Flat body posted to a department's intake endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryPayload {
    pub report_id: ReportId,
    pub title: String,
    pub description: String,
    pub project_id: String,
    pub author_id: UserId,
    pub department_id: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Scorecard>,
}

impl From<&DeliveryJob> for DeliveryPayload {
    fn from(job: &DeliveryJob) -> Self {
        let report = &job.report;
        Self {
            report_id: report.id.clone(),
            title: report.title.clone(),
            description: report.description.clone(),
            project_id: report.project_id.clone(),
            author_id: report.author_id.clone(),
            department_id: report.department_id.clone(),
            submitted_at: report.submitted_at,
            metadata: report.metadata.clone(),
            evaluation: job
                .evaluation
                .as_ref()
                .map(|evaluation| evaluation.scorecard.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("department endpoint rejected delivery: {0}")]
    Rejected(String),
    #[error("department endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("delivery attempt timed out after {0:?}")]
    TimedOut(Duration),
}

/// Transport to a department's intake endpoint.
#[async_trait]
pub trait DepartmentGateway: Send + Sync {
    async fn deliver(
        &self,
        department: &Department,
        payload: &DeliveryPayload,
    ) -> Result<(), GatewayError>;
}

/// Stand-in for the department intake API: waits out a network hop and logs the payload.
#[derive(Debug, Clone)]
pub struct SimulatedDepartmentGateway {
    latency: Duration,
}

impl SimulatedDepartmentGateway {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl DepartmentGateway for SimulatedDepartmentGateway {
    async fn deliver(
        &self,
        department: &Department,
        payload: &DeliveryPayload,
    ) -> Result<(), GatewayError> {
        let body = serde_json::to_string(payload)
            .map_err(|err| GatewayError::Rejected(format!("payload encoding failed: {err}")))?;
        info!(
            report_id = %payload.report_id,
            department = %department.name,
            payload = %body,
            "submitting report to department"
        );
        tokio::time::sleep(self.latency).await;
        Ok(())
    }
}

/// Terminal result of one delivery job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered {
        report_id: ReportId,
        department: String,
        attempts: u32,
    },
    /// Permanent failure before any attempt, e.g. an unknown department.
    Aborted { report_id: ReportId, reason: String },
    DeadLettered {
        report_id: ReportId,
        attempts: u32,
        last_error: String,
    },
}

impl DeliveryOutcome {
    pub fn report_id(&self) -> &ReportId {
        match self {
            DeliveryOutcome::Delivered { report_id, .. }
            | DeliveryOutcome::Aborted { report_id, .. }
            | DeliveryOutcome::DeadLettered { report_id, .. } => report_id,
        }
    }
}

/// Job that exhausted its attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub job: DeliveryJob,
    pub attempts: u32,
    pub last_error: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct DeadLetterLog {
    entries: Mutex<Vec<DeadLetter>>,
}

impl DeadLetterLog {
    fn record(&self, letter: DeadLetter) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(letter),
            Err(poisoned) => poisoned.into_inner().push(letter),
        }
    }

    pub fn entries(&self) -> Vec<DeadLetter> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Looks up the department and pushes the payload with timeout, retry, and backoff.
pub struct DeliveryWorker {
    config: DeliveryConfig,
    catalog: Arc<dyn DepartmentCatalog>,
    gateway: Arc<dyn DepartmentGateway>,
    outcomes: broadcast::Sender<DeliveryOutcome>,
    dead_letters: Arc<DeadLetterLog>,
}

impl DeliveryWorker {
    pub fn new(
        config: DeliveryConfig,
        catalog: Arc<dyn DepartmentCatalog>,
        gateway: Arc<dyn DepartmentGateway>,
    ) -> Self {
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
        Self {
            config,
            catalog,
            gateway,
            outcomes,
            dead_letters: Arc::new(DeadLetterLog::default()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryOutcome> {
        self.outcomes.subscribe()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.entries()
    }

    /// Start consuming the queue on the current Tokio runtime.
    pub fn spawn(self) -> DeliveryHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = DeliveryHandle {
            sender,
            outcomes: self.outcomes.clone(),
            dead_letters: self.dead_letters.clone(),
        };
        tokio::spawn(Arc::new(self).run(receiver));
        handle
    }

    async fn run(self: Arc<Self>, mut receiver: mpsc::UnboundedReceiver<DeliveryJob>) {
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                job = receiver.recv() => match job {
                    Some(job) => {
                        let worker = Arc::clone(&self);
                        in_flight.spawn(async move { worker.process(job).await });
                    }
                    None => break,
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(err) = joined {
                        error!(error = %err, "delivery task terminated abnormally");
                    }
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "delivery task terminated abnormally");
            }
        }
        debug!("delivery queue closed");
    }

    /// Run one job to completion. Never returns an error; failures become outcomes.
    pub async fn process(&self, job: DeliveryJob) -> DeliveryOutcome {
        let report_id = job.report.id.clone();

        let department = match self.catalog.get_by_id(&job.report.department_id) {
            Ok(department) => department,
            Err(err) => {
                error!(
                    report_id = %report_id,
                    department_id = %job.report.department_id,
                    error = %err,
                    "department lookup failed; delivery aborted"
                );
                return self.publish(DeliveryOutcome::Aborted {
                    report_id,
                    reason: err.to_string(),
                });
            }
        };

        let payload = DeliveryPayload::from(&job);
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(report_id = %report_id, department = %department.name, attempt, "delivering report");

            let result = match tokio::time::timeout(
                self.config.attempt_timeout,
                self.gateway.deliver(&department, &payload),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(GatewayError::TimedOut(self.config.attempt_timeout)),
            };

            match result {
                Ok(()) => {
                    info!(
                        report_id = %report_id,
                        department = %department.name,
                        attempts = attempt,
                        "report delivered to department"
                    );
                    return self.publish(DeliveryOutcome::Delivered {
                        report_id,
                        department: department.name,
                        attempts: attempt,
                    });
                }
                Err(err) if attempt < max_attempts => {
                    let backoff = self.config.backoff_after(attempt);
                    warn!(
                        report_id = %report_id,
                        attempt,
                        ?backoff,
                        error = %err,
                        "delivery attempt failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => {
                    error!(
                        report_id = %report_id,
                        attempts = attempt,
                        error = %err,
                        "delivery failed; recording dead letter"
                    );
                    self.dead_letters.record(DeadLetter {
                        job,
                        attempts: attempt,
                        last_error: err.to_string(),
                        recorded_at: Utc::now(),
                    });
                    return self.publish(DeliveryOutcome::DeadLettered {
                        report_id,
                        attempts: attempt,
                        last_error: err.to_string(),
                    });
                }
            }
        }
    }

    fn publish(&self, outcome: DeliveryOutcome) -> DeliveryOutcome {
        // No subscribers is the normal case outside tests.
        let _ = self.outcomes.send(outcome.clone());
        outcome
    }
}

/// Cloneable sender side of a running [`DeliveryWorker`].
#[derive(Clone)]
pub struct DeliveryHandle {
    sender: mpsc::UnboundedSender<DeliveryJob>,
    outcomes: broadcast::Sender<DeliveryOutcome>,
    dead_letters: Arc<DeadLetterLog>,
}

impl DeliveryHandle {
    /// Observe outcomes of jobs dispatched after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryOutcome> {
        self.outcomes.subscribe()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.entries()
    }
}

impl DeliveryDispatcher for DeliveryHandle {
    fn dispatch(&self, job: DeliveryJob) {
        let report_id = job.report.id.clone();
        if self.sender.send(job).is_err() {
            error!(report_id = %report_id, "delivery queue closed; report not forwarded");
        }
    }
}
