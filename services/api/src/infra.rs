use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use course_admissions::admissions::memory::{
    MemoryApplicationRepository, MemoryDirectory, StaticCourseCatalog,
};
use course_admissions::admissions::{AdmissionService, Notification, NotificationFailure, Notifier};
use course_admissions::config::AdmissionsConfig;
use tracing::info;

pub(crate) type ApiAdmissionService = AdmissionService<MemoryApplicationRepository, LogNotifier>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) catalog: Arc<StaticCourseCatalog>,
}

/// Writes outbound notifications to the log until a mail relay is wired in.
#[derive(Debug, Default, Clone)]
pub(crate) struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotificationFailure> {
        info!(
            template = notification.kind.template(),
            recipient = %notification.recipient,
            application_id = %notification.application_id,
            "notification dispatched"
        );
        Ok(())
    }
}

pub(crate) fn build_catalog(config: &AdmissionsConfig) -> Arc<StaticCourseCatalog> {
    Arc::new(StaticCourseCatalog::from_config(config))
}

pub(crate) fn build_service(catalog: Arc<StaticCourseCatalog>) -> Arc<ApiAdmissionService> {
    Arc::new(AdmissionService::new(
        Arc::new(MemoryApplicationRepository::default()),
        Arc::new(LogNotifier),
        Arc::new(MemoryDirectory::default()),
        catalog,
    ))
}
