use crate::cli::ServeArgs;
use crate::infra::{build_engine, AppState, NoticeEngine};
use crate::routes::with_notice_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use site_notices::config::AppConfig;
use site_notices::error::AppError;
use site_notices::notices::source::notifications_url;
use site_notices::notices::NoticeRoutesState;
use site_notices::telemetry;
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

    let NoticeEngine {
        orchestrator,
        coordinator,
        layout,
        sizes,
        size_inbox,
    } = build_engine(&config)?;

    tokio::spawn(coordinator.run(orchestrator.subscribe(), size_inbox));
    let _polling = orchestrator.activate();

    let app = with_notice_routes(NoticeRoutesState {
        orchestrator,
        layout,
        sizes,
    })
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        source = %notifications_url(&config.gateway.origin),
        poll_interval_ms = config.polling.interval.as_millis() as u64,
        "site notices service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
