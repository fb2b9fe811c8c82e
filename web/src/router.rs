use crate::controller::{health_check_controller, notify_controller, status_controller};
use crate::ws::handler;
use axum::{
    routing::{get, post},
    Router,
};
use service::AppState;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI document. To be a part
// of the rendered document, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Model Notify API"
        ),
        paths(
            health_check_controller::health_check,
            notify_controller::notify,
            status_controller::status,
        ),
        components(
            schemas(
                status_controller::HubStatus,
                status_controller::WatcherReport,
            )
        ),
        tags(
            (name = "model_notify", description = "Model change notifications over WebSocket")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(status_routes(app_state.clone()))
        .merge(notify_routes(app_state.clone()))
        .merge(websocket_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn status_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/status", get(status_controller::status))
        .with_state(app_state)
}

fn notify_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/test/notify/{model_type}", post(notify_controller::notify))
        .with_state(app_state)
}

fn websocket_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(handler::ws_handler))
        .with_state(app_state)
}
