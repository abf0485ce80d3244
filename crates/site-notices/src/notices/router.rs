use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::AppError;

use super::classifier::BannerView;
use super::domain::{Notification, NotificationId};
use super::layout::LayoutState;
use super::orchestrator::NotificationOrchestrator;
use super::source::NotificationSource;
use super::store::SessionStore;

/// Handles the banner routes need: the orchestrator, the published layout
/// and the inbox for size observations reported by the client.
pub struct NoticeRoutesState<S, K> {
    pub orchestrator: Arc<NotificationOrchestrator<S, K>>,
    pub layout: LayoutState,
    pub sizes: mpsc::Sender<f64>,
}

impl<S, K> Clone for NoticeRoutesState<S, K> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            layout: self.layout.clone(),
            sizes: self.sizes.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NoticesResponse {
    pub is_loading: bool,
    pub visible: Vec<Notification>,
    pub banner: BannerView,
    pub banner_height: f64,
    pub layout_css: String,
}

#[derive(Debug, Deserialize)]
pub struct LayoutReport {
    pub height: f64,
}

/// Router exposing the rendering contract over HTTP.
pub fn notice_router<S, K>(state: NoticeRoutesState<S, K>) -> Router
where
    S: NotificationSource + 'static,
    K: SessionStore + 'static,
{
    Router::new()
        .route("/api/v1/notices", get(notices_handler::<S, K>))
        .route(
            "/api/v1/notices/:notice_id/dismiss",
            post(dismiss_handler::<S, K>),
        )
        .route("/api/v1/notices/layout", post(layout_handler::<S, K>))
        .route("/api/v1/notices/refresh", post(refresh_handler::<S, K>))
        .route(
            "/api/v1/notices/dismissals",
            delete(reset_dismissals_handler::<S, K>),
        )
        .with_state(state)
}

pub(crate) async fn notices_handler<S, K>(
    State(state): State<NoticeRoutesState<S, K>>,
) -> Json<NoticesResponse>
where
    S: NotificationSource + 'static,
    K: SessionStore + 'static,
{
    let snapshot = state.orchestrator.snapshot();
    let banner = snapshot.banner();
    Json(NoticesResponse {
        is_loading: snapshot.is_loading,
        visible: snapshot.visible,
        banner,
        banner_height: state.layout.banner_height(),
        layout_css: state.layout.css_declaration(),
    })
}

pub(crate) async fn dismiss_handler<S, K>(
    State(state): State<NoticeRoutesState<S, K>>,
    Path(notice_id): Path<String>,
) -> Result<StatusCode, AppError>
where
    S: NotificationSource + 'static,
    K: SessionStore + 'static,
{
    let id = NotificationId::new(notice_id);
    if state.orchestrator.dismiss(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotDismissible(id))
    }
}

pub(crate) async fn layout_handler<S, K>(
    State(state): State<NoticeRoutesState<S, K>>,
    Json(report): Json<LayoutReport>,
) -> Result<StatusCode, AppError>
where
    S: NotificationSource + 'static,
    K: SessionStore + 'static,
{
    state
        .sizes
        .send(report.height)
        .await
        .map_err(|_| AppError::LayoutUnavailable)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn refresh_handler<S, K>(
    State(state): State<NoticeRoutesState<S, K>>,
) -> StatusCode
where
    S: NotificationSource + 'static,
    K: SessionStore + 'static,
{
    let orchestrator = Arc::clone(&state.orchestrator);
    tokio::spawn(async move {
        orchestrator.refresh().await;
    });
    StatusCode::ACCEPTED
}

pub(crate) async fn reset_dismissals_handler<S, K>(
    State(state): State<NoticeRoutesState<S, K>>,
) -> StatusCode
where
    S: NotificationSource + 'static,
    K: SessionStore + 'static,
{
    state.orchestrator.reset_dismissals();
    StatusCode::NO_CONTENT
}
