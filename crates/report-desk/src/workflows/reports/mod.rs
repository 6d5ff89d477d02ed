//! Report lifecycle: drafting, evaluation scorecards, submission, and
//! best-effort forwarding to the owning department.

pub mod catalog;
pub mod delivery;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use catalog::{CatalogError, DepartmentCatalog, StaticDepartmentCatalog};
pub use delivery::{
    DeadLetter, DeliveryDispatcher, DeliveryHandle, DeliveryJob, DeliveryOutcome,
    DeliveryPayload, DeliveryWorker, DepartmentGateway, GatewayError, SimulatedDepartmentGateway,
};
pub use domain::{
    CreateReportRequest, Department, Evaluation, EvaluationId, EvaluationView, Metadata,
    NewReport, PageRequest, Report, ReportFilter, ReportId, ReportPage, ReportStatus, ReportView,
    Scorecard, UserId,
};
pub use repository::{
    EvaluationRepository, InMemoryEvaluationRepository, InMemoryReportRepository,
    ReportRepository, RepositoryError,
};
pub use router::{report_router, ListReportsQuery, CALLER_HEADER};
pub use service::{
    AuthContext, BestEffort, Degradation, ErrorKind, ReportLifecycleService, ReportListing,
    ReportServiceError, SecondaryOperation,
};
pub use store::{Entity, EntityStore};
