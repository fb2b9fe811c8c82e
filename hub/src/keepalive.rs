use crate::connection::{Connection, ConnectionId, Outbound};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default interval between liveness pings.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Runs one recurring ping task per open connection.
///
/// Each task is stopped through its own [`CancellationToken`]. The token is
/// removed from the map and cancelled exactly once, on disconnect.
pub struct KeepaliveSupervisor {
    interval: Duration,
    tasks: DashMap<ConnectionId, CancellationToken>,
}

impl KeepaliveSupervisor {
    /// A zero interval cannot drive a ticker and is replaced by
    /// [`DEFAULT_KEEPALIVE_INTERVAL`].
    pub fn new(interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!("Keepalive interval must be non-zero, using {DEFAULT_KEEPALIVE_INTERVAL:?}");
            DEFAULT_KEEPALIVE_INTERVAL
        } else {
            interval
        };

        Self {
            interval,
            tasks: DashMap::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Schedule pings for a connection, first one after a full interval.
    /// Returns `false` if the connection already has a keepalive task.
    pub fn start(&self, connection: Arc<Connection>) -> bool {
        let token = CancellationToken::new();

        match self.tasks.entry(connection.id().clone()) {
            Entry::Occupied(_) => {
                warn!(
                    "Keepalive already running for connection {}",
                    connection.id()
                );
                return false;
            }
            Entry::Vacant(entry) => {
                entry.insert(token.clone());
            }
        }

        tokio::spawn(run_keepalive(connection, self.interval, token));
        true
    }

    /// Stop the keepalive task of a connection. Returns `true` if a task was
    /// running. Safe to call while a tick is executing.
    pub fn cancel(&self, connection_id: &ConnectionId) -> bool {
        match self.tasks.remove(connection_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, connection_id: &ConnectionId) -> bool {
        self.tasks.contains_key(connection_id)
    }

    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Default for KeepaliveSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_KEEPALIVE_INTERVAL)
    }
}

async fn run_keepalive(connection: Arc<Connection>, period: Duration, token: CancellationToken) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if !connection.is_open() {
                    continue;
                }
                if let Err(e) = connection.send(Outbound::Ping) {
                    warn!("Keepalive ping failed for connection {}: {e}", connection.id());
                }
            }
        }
    }

    trace!("Keepalive stopped for connection {}", connection.id());
}
