use crate::Hub;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;
use std::sync::Arc;

/// Handles domain events by publishing the event's model type on the hub.
///
/// Every kind of change (API writes, bulk imports, the administrative trigger
/// and external change-feed events) maps to the same coarse `update`
/// notification for the model type.
pub struct HubEventHandler {
    hub: Arc<Hub>,
}

impl HubEventHandler {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl EventHandler for HubEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        debug!(
            "Handling {} event for {}",
            event.kind(),
            event.model_type()
        );

        self.hub.publish(event.model_type());
    }
}
