use crate::connection::{Connection, ConnectionId};
use dashmap::DashMap;
use log::*;
use std::collections::HashSet;
use std::sync::Arc;

/// Topics are model-type names, e.g. `"patients"`.
pub type Topic = String;

/// Connection registry with a secondary topic index.
///
/// Both maps are `DashMap`s so subscription changes from many connection
/// tasks, fan-out from publishers and cleanup on disconnect can run
/// concurrently. Guards are never held across a send: fan-out works on a
/// snapshot returned by [`ConnectionRegistry::subscribers_of`].
pub struct ConnectionRegistry {
    /// Primary storage: every live connection by id.
    connections: DashMap<ConnectionId, Arc<Connection>>,

    /// Secondary index: topic → subscribed connection ids. A topic only
    /// exists while it has at least one subscriber.
    topics: DashMap<Topic, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            topics: DashMap::new(),
        }
    }

    /// Register a new connection with no subscriptions.
    pub fn register(&self, connection: Arc<Connection>) {
        self.connections
            .insert(connection.id().clone(), connection);
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections
            .get(connection_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Add a connection to a topic. Returns `true` if it was not already a
    /// member. Unknown connections are ignored.
    pub fn subscribe(&self, connection_id: &ConnectionId, topic: &str) -> bool {
        if !self.connections.contains_key(connection_id) {
            debug!("Ignoring subscribe to {topic} from unregistered connection {connection_id}");
            return false;
        }

        let added = self
            .topics
            .entry(topic.to_string())
            .or_default()
            .insert(connection_id.clone());

        // unregister_all may have run between the check above and the insert.
        if !self.connections.contains_key(connection_id) {
            self.unsubscribe(connection_id, topic);
            return false;
        }

        added
    }

    /// Remove a connection from a topic, dropping the topic once it is empty.
    /// Returns `true` if the connection was a member.
    pub fn unsubscribe(&self, connection_id: &ConnectionId, topic: &str) -> bool {
        let removed = match self.topics.get_mut(topic) {
            Some(mut subscribers) => subscribers.remove(connection_id),
            None => false,
        };

        self.topics
            .remove_if(topic, |_, subscribers| subscribers.is_empty());

        removed
    }

    /// Remove a connection from the registry and from every topic.
    /// Returns the connection if it was still registered.
    pub fn unregister_all(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        let connection = self
            .connections
            .remove(connection_id)
            .map(|(_, connection)| connection);

        self.topics.retain(|_, subscribers| {
            subscribers.remove(connection_id);
            !subscribers.is_empty()
        });

        connection
    }

    /// Snapshot of the connections currently subscribed to `topic`.
    pub fn subscribers_of(&self, topic: &str) -> Vec<Arc<Connection>> {
        let connection_ids: Vec<ConnectionId> = match self.topics.get(topic) {
            Some(subscribers) => subscribers.iter().cloned().collect(),
            None => return Vec::new(),
        };

        connection_ids
            .iter()
            .filter_map(|connection_id| self.get(connection_id))
            .collect()
    }

    pub fn is_subscribed(&self, connection_id: &ConnectionId, topic: &str) -> bool {
        self.topics
            .get(topic)
            .map(|subscribers| subscribers.contains(connection_id))
            .unwrap_or(false)
    }

    /// Topics a connection is subscribed to, sorted.
    pub fn topics_of(&self, connection_id: &ConnectionId) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .topics
            .iter()
            .filter(|entry| entry.value().contains(connection_id))
            .map(|entry| entry.key().clone())
            .collect();
        topics.sort();
        topics
    }

    /// Snapshot of every registered connection.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
