use change_feed::{ChangeFeed, ChangeFeedWatcher, MongoChangeFeed, PgChangeFeed, WatcherHandle};
use events::EventPublisher;
use hub::notifier::CacheInvalidationNotifier;
use hub::{Hub, HubEventHandler};
use log::*;
use service::config::{ChangeFeedBackend, Config};
use service::{logging::Logger, AppState};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
        std::process::exit(1);
    }

    info!(
        "Starting model_notify in {} mode with log level {}",
        config.runtime_env(),
        config.log_level_filter
    );

    let notifier = match CacheInvalidationNotifier::new(
        config.cache_invalidation_url(),
        config.cache_invalidation_timeout(),
    ) {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            error!("Invalid cache invalidation endpoint: {e}");
            std::process::exit(1);
        }
    };

    let hub = Arc::new(Hub::new(config.keepalive_interval(), notifier));
    let event_publisher = Arc::new(
        EventPublisher::new().with_handler(Arc::new(HubEventHandler::new(hub.clone()))),
    );

    let feed = match init_change_feed(&config).await {
        Some(feed) => feed,
        None => std::process::exit(1),
    };

    let shutdown = CancellationToken::new();
    let watchers: Vec<WatcherHandle> = config
        .change_feed_sources
        .iter()
        .map(|source| {
            ChangeFeedWatcher::new(
                feed.clone(),
                source.clone(),
                (*event_publisher).clone(),
                config.change_feed_retry_delay(),
            )
            .spawn(shutdown.clone())
        })
        .collect();
    let monitors = watchers.iter().map(WatcherHandle::monitor).collect();

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let app_state = AppState::new(config, &hub, &event_publisher, monitors);
    if let Err(e) = web::init_server(app_state, shutdown.clone()).await {
        error!("Server failed: {e}");
        shutdown.cancel();
        hub.shutdown();
    }

    for watcher in watchers {
        watcher.join().await;
    }
    info!("Shutdown complete");
}

async fn init_change_feed(config: &Config) -> Option<Arc<dyn ChangeFeed>> {
    info!("Watching {} change feeds", config.change_feed_backend);

    match config.change_feed_backend {
        ChangeFeedBackend::Mongodb => match service::init_mongodb(config).await {
            Ok(database) => Some(Arc::new(MongoChangeFeed::new(database))),
            Err(e) => {
                error!("Failed to configure MongoDB client: {e}");
                None
            }
        },
        ChangeFeedBackend::Postgres => match service::init_database(config) {
            Ok(pool) => Some(Arc::new(PgChangeFeed::new(pool))),
            Err(e) => {
                error!("Failed to configure database pool: {e}");
                None
            }
        },
    }
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
    shutdown.cancel();
}
