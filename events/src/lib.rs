//! Event system infrastructure for model change notifications.
//!
//! This crate decouples the code that changes data from the code that tells
//! clients about it. Anything that mutates a model collection (CRUD
//! collaborators, the administrative trigger, the change-feed watchers)
//! publishes a [`DomainEvent`]; infrastructure such as the notification hub
//! registers an [`EventHandler`] to react to it.
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing every kind of model change
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates, avoiding circular
//! dependencies between the hub, the watchers and the web layer.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// A type alias that represents any record's id field data type.
pub type Id = Uuid;

/// Events that represent a change to a model collection.
///
/// Every variant names the `model_type` whose subscribers must be told about
/// the change. Notifications are coarse grained: subscribers learn that the
/// collection changed, not which record.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// Emitted after a record was created through the API.
    RecordCreated {
        model_type: String,
        /// Complete serialized record, kept for handlers that want it.
        record: Value,
    },
    /// Emitted after a record was modified through the API.
    RecordUpdated { model_type: String, record: Value },
    /// Emitted after a record was removed through the API.
    RecordDeleted { model_type: String, record_id: Id },
    /// Emitted after a bulk import (e.g. a spreadsheet upload) completed.
    RecordsImported { model_type: String, count: usize },
    /// Emitted by the administrative trigger to force a notification.
    PublishRequested { model_type: String },
    /// Emitted by a change-feed watcher for a change made outside the API.
    ExternalChange {
        /// The watched collection the change came from.
        collection: String,
        /// The topic the collection's changes are published under.
        model_type: String,
        /// Operation name as reported by the feed (insert, update, ...).
        operation: String,
    },
}

impl DomainEvent {
    /// The topic this event must be published under.
    pub fn model_type(&self) -> &str {
        match self {
            DomainEvent::RecordCreated { model_type, .. }
            | DomainEvent::RecordUpdated { model_type, .. }
            | DomainEvent::RecordDeleted { model_type, .. }
            | DomainEvent::RecordsImported { model_type, .. }
            | DomainEvent::PublishRequested { model_type }
            | DomainEvent::ExternalChange { model_type, .. } => model_type,
        }
    }

    /// Short name of the event kind, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::RecordCreated { .. } => "record_created",
            DomainEvent::RecordUpdated { .. } => "record_updated",
            DomainEvent::RecordDeleted { .. } => "record_deleted",
            DomainEvent::RecordsImported { .. } => "records_imported",
            DomainEvent::PublishRequested { .. } => "publish_requested",
            DomainEvent::ExternalChange { .. } => "external_change",
        }
    }
}

/// Trait for handling domain events.
/// Implementations perform side effects like pushing notifications.
/// Handlers must not fail the publisher; they log their own errors.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Publish an event to all registered handlers.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
