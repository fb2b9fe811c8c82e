use crate::connection::{Connection, ConnectionId, Outbound, OutboundSender};
use crate::error::Error;
use crate::keepalive::KeepaliveSupervisor;
use crate::message::{ClientMessage, ServerMessage};
use crate::notifier::DownstreamNotifier;
use crate::registry::ConnectionRegistry;
use log::*;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a single publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Topic based notification hub.
///
/// Owns the connection lifecycle (connect, inbound control frames,
/// disconnect) and the outbound fan-out. Nothing here returns an error to the
/// caller: failures are per connection and end up in the log.
pub struct Hub {
    registry: Arc<ConnectionRegistry>,
    keepalive: KeepaliveSupervisor,
    notifier: Arc<dyn DownstreamNotifier>,
}

impl Hub {
    pub fn new(keepalive_interval: Duration, notifier: Arc<dyn DownstreamNotifier>) -> Self {
        Self::with_registry(
            Arc::new(ConnectionRegistry::new()),
            keepalive_interval,
            notifier,
        )
    }

    pub fn with_registry(
        registry: Arc<ConnectionRegistry>,
        keepalive_interval: Duration,
        notifier: Arc<dyn DownstreamNotifier>,
    ) -> Self {
        Self {
            registry,
            keepalive: KeepaliveSupervisor::new(keepalive_interval),
            notifier,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn keepalive(&self) -> &KeepaliveSupervisor {
        &self.keepalive
    }

    /// Register a new connection and start its keepalive.
    /// Must be called from within a tokio runtime.
    pub fn connect(&self, sender: OutboundSender) -> Arc<Connection> {
        let connection = Arc::new(Connection::new(sender));
        self.registry.register(connection.clone());
        self.keepalive.start(connection.clone());
        info!("Connection {} established", connection.id());
        connection
    }

    /// Handle one inbound text frame. Malformed frames are logged and the
    /// connection stays open.
    pub fn handle_text(&self, connection: &Connection, text: &str) {
        if let Err(e) = self.dispatch(connection, text) {
            error!(
                "Failed to handle frame from connection {}: {e}",
                connection.id()
            );
        }
    }

    fn dispatch(&self, connection: &Connection, text: &str) -> Result<(), Error> {
        let message = ClientMessage::parse(text)?;
        trace!("Connection {} sent {message:?}", connection.id());

        match message {
            ClientMessage::Subscribe { model_type } => {
                if self.registry.subscribe(connection.id(), &model_type) {
                    debug!("Connection {} subscribed to {model_type}", connection.id());
                }
                connection.send(Outbound::Message(ServerMessage::Subscribed { model_type }))
            }
            ClientMessage::Unsubscribe { model_type } => {
                if let Some(topic) = model_type.as_deref() {
                    if self.registry.unsubscribe(connection.id(), topic) {
                        debug!("Connection {} unsubscribed from {topic}", connection.id());
                    }
                }
                connection.send(Outbound::Message(ServerMessage::Unsubscribed { model_type }))
            }
            ClientMessage::Disconnect => {
                info!("Connection {} requested disconnect", connection.id());
                connection.close();
                Ok(())
            }
            ClientMessage::Ping => connection.send(Outbound::Message(ServerMessage::Pong)),
        }
    }

    /// Tear a connection down: close it, purge its subscriptions and stop its
    /// keepalive. Idempotent, so every cause of a disconnect may call it.
    pub fn disconnect(&self, connection_id: &ConnectionId) {
        let connection = self.registry.unregister_all(connection_id);
        if let Some(connection) = &connection {
            connection.close();
        }
        let keepalive_cancelled = self.keepalive.cancel(connection_id);

        if connection.is_some() || keepalive_cancelled {
            info!("Connection {connection_id} closed");
        }
    }

    /// Close every open connection, e.g. on server shutdown.
    pub fn shutdown(&self) {
        let connections = self.registry.connections();
        info!("Closing {} connection(s)", connections.len());
        for connection in connections {
            self.disconnect(connection.id());
        }
    }

    /// Notify every current subscriber of `topic` and the downstream notifier.
    ///
    /// Delivers to a snapshot of the subscribers; a failed delivery is logged
    /// and skipped. The downstream notifier is invoked exactly once, even
    /// without subscribers.
    pub fn publish(&self, topic: &str) -> PublishReport {
        let mut report = PublishReport::default();
        let update = ServerMessage::Update {
            model_type: topic.to_string(),
        };

        for connection in self.registry.subscribers_of(topic) {
            match connection.send(Outbound::Message(update.clone())) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        "Failed to deliver update for {topic} to connection {}: {e}",
                        connection.id()
                    );
                }
            }
        }

        self.notifier.notify(topic);

        debug!(
            "Published {topic}: delivered={}, failed={}",
            report.delivered, report.failed
        );
        report
    }
}
