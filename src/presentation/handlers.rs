// HTTP request handlers
use crate::application::scada_api::ApiError;
use crate::domain::device::DeviceRecord;
use crate::domain::events::DeviceSelection;
use crate::domain::widget::{LayoutChange, WidgetDraft, WidgetPatch};
use crate::presentation::app_state::AppState;
use crate::presentation::events_stream::change_stream;
use crate::presentation::views::{self, DEFAULT_MAX_CHART_POINTS};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// `maxPoints` caps the chart length; missing or 0 means the default
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub max_points: Option<usize>,
}

impl HistoryQuery {
    fn max_points(&self) -> usize {
        self.max_points
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CHART_POINTS)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/console/connection", get(connection_status))
        .route("/console/connection/connect", post(connect))
        .route("/console/connection/disconnect", post(disconnect))
        .route("/console/subscriptions", post(subscribe).delete(unsubscribe))
        .route("/console/devices", get(list_devices))
        .route(
            "/console/devices/:id",
            get(get_device).put(put_device).delete(delete_device),
        )
        .route("/console/devices/:id/gauges", get(device_gauges))
        .route("/console/tags/:id/history", get(tag_history))
        .route("/console/summary", get(status_summary))
        .route("/console/widgets", get(list_widgets).post(create_widget))
        .route("/console/widgets/layout", post(reposition_widgets))
        .route("/console/widgets/:id", put(update_widget).delete(delete_widget))
        .route("/console/events", get(events))
        .with_state(state)
}

/// Backend failures surface as 502 unless the backend said the item is gone
fn api_failure(error: ApiError) -> Response {
    let status = if error.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

fn not_found(what: &str, id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("{} {} not found", what, id) })),
    )
        .into_response()
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn connection_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.connection.snapshot())
}

pub async fn connect(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.connection.connect();
    (StatusCode::ACCEPTED, Json(state.connection.snapshot()))
}

pub async fn disconnect(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.connection.disconnect();
    Json(state.connection.snapshot())
}

/// Subscription requests are forwarded only while connected; `sent` tells
/// the caller whether this one went out
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Json(selection): Json<DeviceSelection>,
) -> impl IntoResponse {
    let sent = state.connection.subscribe(selection.device_ids);
    Json(json!({ "sent": sent, "subscriptions": state.connection.subscriptions() }))
}

pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Json(selection): Json<DeviceSelection>,
) -> impl IntoResponse {
    let sent = state.connection.unsubscribe(selection.device_ids);
    Json(json!({ "sent": sent, "subscriptions": state.connection.subscriptions() }))
}

pub async fn list_devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(views::device_rows(&state.devices.devices()))
}

pub async fn get_device(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    match state.devices.device(&id) {
        Some(device) => Json(device.as_ref().clone()).into_response(),
        None => not_found("device", &id),
    }
}

/// Register or replace a device in the live view; the path id wins over the body
pub async fn put_device(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(mut device): Json<DeviceRecord>,
) -> impl IntoResponse {
    device.id = id;
    state.devices.update_device(device.clone());
    Json(device)
}

pub async fn delete_device(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    if state.devices.remove_device(&id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found("device", &id)
    }
}

pub async fn device_gauges(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    match state.devices.device(&id) {
        Some(device) => Json(views::gauges(&device)).into_response(),
        None => not_found("device", &id),
    }
}

/// Chart series for one tag; an unknown tag yields an empty series
pub async fn tag_history(
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let max_points = query.max_points();
    let history = state.devices.tag_history(&id);
    Json(views::chart_series(&id, &history, max_points))
}

pub async fn status_summary(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(views::status_summary(
        &state.devices.devices(),
        state.connection.snapshot(),
    ))
}

pub async fn list_widgets(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.widgets.snapshot())
}

pub async fn create_widget(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<WidgetDraft>,
) -> Response {
    match state.widgets.add_widget(draft).await {
        Ok(widget) => (StatusCode::CREATED, Json(widget)).into_response(),
        Err(e) => api_failure(e),
    }
}

pub async fn update_widget(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(patch): Json<WidgetPatch>,
) -> Response {
    match state.widgets.update_widget(&id, patch).await {
        Ok(widget) => Json(widget).into_response(),
        Err(e) => api_failure(e),
    }
}

pub async fn delete_widget(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    match state.widgets.remove_widget(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => api_failure(e),
    }
}

/// Drag/resize from the grid; responds with the layouts actually applied
pub async fn reposition_widgets(
    State(state): State<Arc<AppState>>,
    Json(changes): Json<Vec<LayoutChange>>,
) -> Response {
    match state.widgets.reposition(changes).await {
        Ok(applied) => Json(applied).into_response(),
        Err(e) => api_failure(e),
    }
}

pub async fn events(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    change_stream(state.devices.subscribe(), state.connection.watch())
}
