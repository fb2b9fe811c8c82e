//! Postgres `LISTEN/NOTIFY` as a change feed.
//!
//! Each watched collection is a notification channel of the same name. A
//! row-level trigger (see `sql/notify_trigger.sql`) calls `pg_notify` with
//! the operation, so writes made by any client of the database reach the
//! watcher.

use crate::error::Error;
use crate::feed::{ChangeEvent, ChangeFeed, ChangeStream};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::*;
use sqlx::postgres::{PgListener, PgPool};

pub struct PgChangeFeed {
    pool: PgPool,
}

impl PgChangeFeed {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChangeFeed for PgChangeFeed {
    async fn open(&self, collection: &str) -> Result<ChangeStream, Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(collection).await?;
        debug!("Listening on channel {collection}");

        Ok(notification_stream(collection.to_string(), listener))
    }
}

/// One listening connection that yields notification payloads.
#[async_trait]
pub(crate) trait NotificationSource: Send + 'static {
    /// `Ok(None)` means the connection was lost; notifications sent in the
    /// meantime may be missing.
    async fn next_payload(&mut self) -> Result<Option<String>, Error>;
}

#[async_trait]
impl NotificationSource for PgListener {
    async fn next_payload(&mut self) -> Result<Option<String>, Error> {
        // `try_recv` rather than `recv`: the latter reconnects silently and
        // hides the gap from the watcher.
        let notification = self.try_recv().await?;
        Ok(notification.map(|notification| notification.payload().to_string()))
    }
}

/// Turns a notification source into a cursor. The cursor ends when the
/// connection is lost and stops after the first error, so the watcher logs
/// the failure and reopens after its retry delay.
pub(crate) fn notification_stream<S: NotificationSource>(
    collection: String,
    source: S,
) -> ChangeStream {
    stream::unfold(Some(source), move |source| {
        let collection = collection.clone();
        async move {
            let mut source = source?;
            match source.next_payload().await {
                Ok(Some(payload)) => Some((
                    Ok(ChangeEvent::from_payload(&collection, &payload)),
                    Some(source),
                )),
                Ok(None) => {
                    debug!("Listener connection for {collection} was lost");
                    None
                }
                Err(e) => Some((Err(e), None)),
            }
        }
    })
    .boxed()
}
