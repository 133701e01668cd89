use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryLabStore, LoggingNotifier};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use lab_arbiter::allocation::{ReservationService, ScoringConfig, ScoringEngine};
use lab_arbiter::config::AppConfig;
use lab_arbiter::error::AppError;
use lab_arbiter::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryLabStore::campus());
    let notifier = Arc::new(LoggingNotifier);
    let engine = Arc::new(ScoringEngine::new(ScoringConfig::default())?);
    let reservation_service = Arc::new(ReservationService::new(
        store,
        notifier,
        engine,
        config.allocation,
    ));

    let app = with_operational_routes(reservation_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        auto_approve = config.allocation.auto_approve_threshold(),
        "lab reservation arbiter ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
