use metrics_exporter_prometheus::PrometheusHandle;
use report_desk::config::DeliveryConfig;
use report_desk::workflows::reports::{
    DeliveryHandle, DeliveryWorker, InMemoryEvaluationRepository, InMemoryReportRepository,
    ReportLifecycleService, SimulatedDepartmentGateway, StaticDepartmentCatalog,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type MemoryReportService =
    ReportLifecycleService<InMemoryReportRepository, InMemoryEvaluationRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) catalog: Arc<StaticDepartmentCatalog>,
}

/// In-process wiring shared by `serve` and `demo`.
pub(crate) struct ReportStack {
    pub(crate) service: Arc<MemoryReportService>,
    pub(crate) delivery: DeliveryHandle,
    pub(crate) catalog: Arc<StaticDepartmentCatalog>,
}

/// Builds the stores, seeded catalog, and delivery worker.
///
/// Must run inside a Tokio runtime: the worker is spawned immediately.
pub(crate) fn build_report_stack(delivery_config: &DeliveryConfig) -> ReportStack {
    let catalog = Arc::new(StaticDepartmentCatalog::seeded());
    let gateway = Arc::new(SimulatedDepartmentGateway::new(
        delivery_config.simulated_latency,
    ));
    let delivery = DeliveryWorker::new(delivery_config.clone(), catalog.clone(), gateway).spawn();

    let service = Arc::new(ReportLifecycleService::new(
        Arc::new(InMemoryReportRepository::default()),
        Arc::new(InMemoryEvaluationRepository::default()),
        Arc::new(delivery.clone()),
    ));

    ReportStack {
        service,
        delivery,
        catalog,
    }
}
