use change_feed::WatcherMonitor;
use config::Config;
use events::EventPublisher;
use hub::Hub;
use log::info;
use mongodb::{Client, Database};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;

pub mod config;
pub mod logging;

/// Builds the pool the change feed listeners connect through.
///
/// The pool is lazy: no connection is made until a watcher opens its feed, so
/// the hub starts serving WebSocket clients even while the database is down.
pub fn init_database(config: &Config) -> Result<PgPool, sqlx::Error> {
    info!(
        "Database pool config: max_connections={}, acquire_timeout={}s",
        config.db_max_connections, config.db_acquire_timeout_secs,
    );

    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_acquire_timeout())
        .connect_lazy(config.database_url())
}

/// Connects a MongoDB client and selects the database whose collections are
/// watched. Server selection happens lazily, on the first change stream.
pub async fn init_mongodb(config: &Config) -> Result<Database, mongodb::error::Error> {
    info!(
        "MongoDB change feed on database {}",
        config.mongodb_database
    );

    let client = Client::with_uri_str(&config.mongodb_uri).await?;
    Ok(client.database(&config.mongodb_database))
}

// Service-level state shared by every request handler
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub hub: Arc<Hub>,
    pub event_publisher: Arc<EventPublisher>,
    pub watchers: Arc<Vec<WatcherMonitor>>,
}

impl AppState {
    pub fn new(
        app_config: Config,
        hub: &Arc<Hub>,
        event_publisher: &Arc<EventPublisher>,
        watchers: Vec<WatcherMonitor>,
    ) -> Self {
        Self {
            config: app_config,
            hub: Arc::clone(hub),
            event_publisher: Arc::clone(event_publisher),
            watchers: Arc::new(watchers),
        }
    }

    pub fn hub_ref(&self) -> &Hub {
        self.hub.as_ref()
    }
}
