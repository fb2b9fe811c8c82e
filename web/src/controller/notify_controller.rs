use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use events::DomainEvent;
use log::*;
use service::AppState;

/// POST publish an update for a model type to every subscriber
#[utoipa::path(
    post,
    path = "/test/notify/{model_type}",
    params(
        ("model_type" = String, Path, description = "Topic to publish an update for"),
    ),
    responses(
        (status = 200, description = "Update published", body = String),
    )
)]
pub async fn notify(
    State(app_state): State<AppState>,
    Path(model_type): Path<String>,
) -> impl IntoResponse {
    debug!("Manual publish requested for {model_type}");

    app_state
        .event_publisher
        .publish(DomainEvent::PublishRequested { model_type })
        .await;

    (StatusCode::OK, "ok")
}
