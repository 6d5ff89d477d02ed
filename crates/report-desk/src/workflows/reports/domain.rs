use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for reports. Empty until the store assigns one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportId(pub String);

/// Identifier wrapper for evaluation scorecards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvaluationId(pub String);

/// Opaque caller identity supplied by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-form report metadata.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Report lifecycle states. Only `Draft -> Submitted` is driven by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl ReportStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReportStatus::Draft => "draft",
            ReportStatus::Submitted => "submitted",
            ReportStatus::Approved => "approved",
            ReportStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown report status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ReportStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(UnknownStatus(raw.to_string())),
        }
    }
}

/// A report authored for review and forwarded to its department on submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub title: String,
    pub description: String,
    pub project_id: String,
    pub author_id: UserId,
    pub department_id: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Caller-supplied fields for a new report; everything else is server-assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub title: String,
    pub description: String,
    pub project_id: String,
    pub author_id: UserId,
    pub department_id: String,
    pub metadata: Option<Metadata>,
}

/// Six independent 0-10 quality dimensions with their rationale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scorecard {
    pub security_score: u8,
    pub performance_score: u8,
    pub memory_score: u8,
    pub testing_score: u8,
    pub error_score: u8,
    pub load_score: u8,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub security_details: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub performance_details: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memory_details: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub testing_details: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_details: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub load_details: String,
}

pub const MAX_SCORE: u8 = 10;

impl Scorecard {
    /// Named scores in a stable order.
    pub fn scores(&self) -> [(&'static str, u8); 6] {
        [
            ("security_score", self.security_score),
            ("performance_score", self.performance_score),
            ("memory_score", self.memory_score),
            ("testing_score", self.testing_score),
            ("error_score", self.error_score),
            ("load_score", self.load_score),
        ]
    }

    /// First score outside the 0-10 range, if any.
    pub fn out_of_range(&self) -> Option<(&'static str, u8)> {
        self.scores()
            .into_iter()
            .find(|(_, score)| *score > MAX_SCORE)
    }
}

/// Scorecard persisted against a report. At most one per report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: EvaluationId,
    pub report_id: ReportId,
    #[serde(flatten)]
    pub scorecard: Scorecard,
    pub evaluator_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Report joined with its evaluation, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportView {
    #[serde(flatten)]
    pub report: Report,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationView>,
}

/// Public projection of an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationView {
    #[serde(flatten)]
    pub scorecard: Scorecard,
    pub evaluator_id: UserId,
}

impl From<&Evaluation> for EvaluationView {
    fn from(evaluation: &Evaluation) -> Self {
        Self {
            scorecard: evaluation.scorecard.clone(),
            evaluator_id: evaluation.evaluator_id.clone(),
        }
    }
}

impl ReportView {
    pub fn new(report: Report, evaluation: Option<&Evaluation>) -> Self {
        Self {
            report,
            evaluation: evaluation.map(EvaluationView::from),
        }
    }
}

/// Conjunctive list filter; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub author_id: Option<UserId>,
    pub project_id: Option<String>,
}

impl ReportFilter {
    pub fn matches(&self, report: &Report) -> bool {
        self.status.map_or(true, |status| report.status == status)
            && self
                .author_id
                .as_ref()
                .map_or(true, |author| &report.author_id == author)
            && self
                .project_id
                .as_ref()
                .map_or(true, |project| &report.project_id == project)
    }
}

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 100;

/// Clamped pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl PageRequest {
    /// Limits outside `1..=100` fall back to the default; negative offsets become zero.
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = match limit {
            Some(value) if (1..=MAX_PAGE_LIMIT as i64).contains(&value) => value as usize,
            _ => DEFAULT_PAGE_LIMIT,
        };
        let offset = offset
            .filter(|value| *value > 0)
            .map_or(0, |value| usize::try_from(value).unwrap_or(usize::MAX));
        Self { limit, offset }
    }
}

/// One page of reports plus the pre-pagination match count.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPage {
    pub reports: Vec<Report>,
    pub total: usize,
}

/// Department that owns submitted reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub name: String,
}

/// Body of a create call; the author is always the authenticated caller.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CreateReportRequest {
    pub title: String,
    pub description: String,
    pub project_id: String,
    pub department_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Scorecard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}
