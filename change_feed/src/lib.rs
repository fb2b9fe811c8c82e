//! Watches an external store's change feed and republishes its changes.
//!
//! Writes that bypass the API (other services, scripts, the pose capture
//! pipeline) never pass through a controller, so nothing would tell
//! subscribers about them. A [`ChangeFeedWatcher`] per configured
//! [`FeedSource`] keeps a cursor open on the store's native change feed and
//! turns every insert, replace or update into a `DomainEvent` for the
//! source's topic.
//!
//! # Modules
//!
//! - `feed`: the `ChangeFeed` trait, change events and feed sources
//! - `mongo`: `ChangeFeed` over MongoDB change streams
//! - `postgres`: `ChangeFeed` over Postgres `LISTEN/NOTIFY`
//! - `watcher`: the supervised, self-restarting watcher loop

pub mod error;
pub mod feed;
pub mod mongo;
pub mod postgres;
pub mod watcher;

pub use feed::{ChangeEvent, ChangeFeed, ChangeStream, FeedSource, OperationKind};
pub use mongo::MongoChangeFeed;
pub use postgres::PgChangeFeed;
pub use watcher::{ChangeFeedWatcher, WatcherHandle, WatcherMonitor, WatcherStatus};
