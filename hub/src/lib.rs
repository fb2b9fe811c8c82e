//! Real-time model change notifications over WebSocket connections.
//!
//! This crate is the transport-independent core of the notification
//! subsystem. The web layer owns the sockets and feeds this crate text frames;
//! everything else (subscription bookkeeping, acknowledgements, fan-out,
//! keepalive pings and the downstream cache invalidation call) lives here.
//!
//! # Architecture
//!
//! - **Topic registry**: connections subscribe to topics named after model
//!   types (`"patients"`, `"pose_events"`, ...). Topics appear on first
//!   subscription and disappear with their last subscriber.
//! - **Snapshot fan-out**: `publish` delivers to the subscribers present when
//!   it is called. A failed delivery affects only that connection.
//! - **Keepalive**: each connection gets a ping every interval until it
//!   disconnects.
//! - **Downstream notifier**: each publish also posts the model type to the
//!   frontend server's cache invalidation endpoint, fire-and-forget.
//! - **Ephemeral messages**: a client that is not connected misses the
//!   update and reloads fresh data on reconnect.
//!
//! # Message Flow
//!
//! 1. Client opens a WebSocket on `/ws`; the web layer calls [`Hub::connect`]
//! 2. Client sends `{"type":"subscribe","modelType":"patients"}`; the hub
//!    records the subscription and replies `{"event":"subscribed",...}`
//! 3. A record changes (API write or external change feed); a
//!    `DomainEvent` reaches [`HubEventHandler`], which calls [`Hub::publish`]
//! 4. Every subscriber receives `{"event":"update","modelType":"patients"}`
//!    and the cache invalidation endpoint is called once
//! 5. On close the web layer calls [`Hub::disconnect`]
//!
//! # Modules
//!
//! - `connection`: Connection handle, its open/closed state and outbound frames
//! - `registry`: ConnectionRegistry with the topic index
//! - `manager`: the Hub (control frames, publish, disconnect)
//! - `keepalive`: per-connection ping scheduling
//! - `notifier`: downstream cache invalidation
//! - `message`: wire format of control and server frames

pub mod connection;
pub mod domain_event_handler;
pub mod error;
pub mod keepalive;
pub mod manager;
pub mod message;
pub mod notifier;
pub mod registry;

pub use domain_event_handler::HubEventHandler;
pub use manager::{Hub, PublishReport};
