use crate::cli::ServeArgs;
use crate::infra::{build_catalog, build_service, AppState};
use crate::routes::with_application_routes;
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use course_admissions::config::AppConfig;
use course_admissions::error::AppError;
use course_admissions::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    args.apply(&mut config.server);
    telemetry::init(&config.telemetry)?;

    let addr = config.server.socket_addr()?;
    let (app, readiness) = build_app(&config);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness.store(true, Ordering::Release);

    info!(
        environment = ?config.environment,
        %addr,
        courses = config.admissions.courses.len(),
        regional_bonus_countries = ?config.admissions.regional_bonus_countries,
        "course admissions api listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Assemble routes, shared state, and the request metrics layer.
fn build_app(config: &AppConfig) -> (Router, Arc<AtomicBool>) {
    let (metrics_layer, metrics_handle) = PrometheusMetricLayer::pair();
    let readiness = Arc::new(AtomicBool::new(false));
    let catalog = build_catalog(&config.admissions);

    let state = AppState {
        readiness: readiness.clone(),
        metrics: Arc::new(metrics_handle),
        catalog: catalog.clone(),
    };
    let app = with_application_routes(build_service(catalog))
        .layer(Extension(state))
        .layer(metrics_layer);

    (app, readiness)
}
