//! HTTP and WebSocket surface of the notification hub.
use axum::http::{HeaderValue, Method};
use log::*;
use service::AppState;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};

mod controller;
pub mod router;
mod ws;

#[cfg(test)]
mod test_support;

/// Serves the router until `shutdown` is cancelled. On shutdown every open
/// WebSocket connection is closed before in-flight requests are drained.
pub async fn init_server(app_state: AppState, shutdown: CancellationToken) -> std::io::Result<()> {
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let server_url = format!("{}:{}", interface, app_state.config.port);
    let hub = app_state.hub.clone();

    let cors = cors_layer(&app_state.config.allowed_origins);
    let app = router::define_routes(app_state).layer(cors);

    let listener = TcpListener::bind(&server_url).await?;
    info!("Server starting... listening for connections on http://{server_url}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("Shutdown requested, closing open connections");
            hub.shutdown();
        })
        .await
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {origin}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_skips_invalid_origins() {
        let _layer = cors_layer(&[
            "http://localhost:3000".to_string(),
            "not a\nheader".to_string(),
        ]);
    }
}
