use crate::infra::{AppState, SessionBackend};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use site_notices::notices::{notice_router, HttpNotificationSource, NoticeRoutesState};

pub(crate) fn with_notice_routes(
    state: NoticeRoutesState<HttpNotificationSource, SessionBackend>,
) -> axum::Router {
    notice_router(state)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::build_engine;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use site_notices::config::{
        AppConfig, AppEnvironment, DismissalConfig, GatewayConfig, PollingConfig, ServerConfig,
        TelemetryConfig,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_state(ready: bool) -> AppState {
        let recorder = PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
        }
    }

    fn offline_config() -> AppConfig {
        AppConfig {
            environment: AppEnvironment::Test,
            gateway: GatewayConfig {
                origin: "http://127.0.0.1:9".to_string(),
            },
            polling: PollingConfig {
                interval: Duration::from_secs(60),
                fetch_timeout: Duration::from_millis(500),
            },
            dismissals: DismissalConfig {
                ttl: chrono::Duration::minutes(10),
                session_file: None,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn readiness_reflects_flag() {
        let state = app_state(false);
        let response = readiness_endpoint(Extension(state.clone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.readiness.store(true, Ordering::Release);
        let response = readiness_endpoint(Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn service_router_serves_health_and_notices() {
        let engine = build_engine(&offline_config()).expect("engine builds");
        let app = with_notice_routes(NoticeRoutesState {
            orchestrator: engine.orchestrator,
            layout: engine.layout,
            sizes: engine.sizes,
        })
        .layer(Extension(app_state(true)));

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health responds");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get("/api/v1/notices")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("notices respond");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["is_loading"], json!(true));
    }
}
