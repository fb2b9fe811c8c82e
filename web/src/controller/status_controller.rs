use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use change_feed::{WatcherMonitor, WatcherStatus};
use serde::Serialize;
use service::AppState;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HubStatus {
    pub connections: usize,
    pub topics: usize,
    pub watchers: Vec<WatcherReport>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WatcherReport {
    pub collection: String,
    pub topic: String,
    #[schema(value_type = String, example = "watching")]
    pub status: WatcherStatus,
    pub restarts: u64,
}

impl From<&WatcherMonitor> for WatcherReport {
    fn from(monitor: &WatcherMonitor) -> Self {
        Self {
            collection: monitor.source().collection.clone(),
            topic: monitor.source().topic.clone(),
            status: monitor.status(),
            restarts: monitor.restarts(),
        }
    }
}

/// GET open connections, active topics and change feed watchers
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Current hub status", body = HubStatus),
    )
)]
pub async fn status(State(app_state): State<AppState>) -> impl IntoResponse {
    let registry = app_state.hub_ref().registry();

    Json(HubStatus {
        connections: registry.connection_count(),
        topics: registry.topic_count(),
        watchers: app_state.watchers.iter().map(WatcherReport::from).collect(),
    })
}
