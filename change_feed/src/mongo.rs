//! MongoDB change streams as a change feed.
//!
//! Each watched collection is opened as a change stream on the configured
//! database. The server filters the stream down to inserts, replacements and
//! updates, and update events carry the looked-up full document.

use crate::error::Error;
use crate::feed::{ChangeEvent, ChangeFeed, ChangeStream, OperationKind};
use async_trait::async_trait;
use futures::StreamExt;
use log::*;
use mongodb::bson::{doc, Document};
use mongodb::change_stream::event::OperationType;
use mongodb::options::FullDocumentType;
use mongodb::Database;

pub struct MongoChangeFeed {
    database: Database,
}

impl MongoChangeFeed {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl ChangeFeed for MongoChangeFeed {
    async fn open(&self, collection: &str) -> Result<ChangeStream, Error> {
        let stream = self
            .database
            .collection::<Document>(collection)
            .watch()
            .pipeline(qualifying_pipeline())
            .full_document(FullDocumentType::UpdateLookup)
            .await?;
        debug!(
            "Change stream opened on {}.{collection}",
            self.database.name()
        );

        let collection = collection.to_string();
        let stream = stream.map(move |event| {
            event
                .map(|event| change_event(&collection, &event.operation_type, event.document_key))
                .map_err(Error::from)
        });

        Ok(stream.boxed())
    }
}

/// Server side filter keeping only the operations that trigger notifications.
fn qualifying_pipeline() -> Vec<Document> {
    vec![doc! {
        "$match": { "operationType": { "$in": ["insert", "replace", "update"] } }
    }]
}

fn change_event(
    collection: &str,
    operation: &OperationType,
    document_key: Option<Document>,
) -> ChangeEvent {
    let operation = match operation {
        OperationType::Insert => OperationKind::Insert,
        OperationType::Replace => OperationKind::Replace,
        OperationType::Update => OperationKind::Update,
        OperationType::Delete => OperationKind::Delete,
        other => OperationKind::Other(format!("{other:?}").to_lowercase()),
    };

    ChangeEvent {
        collection: collection.to_string(),
        operation,
        document_key: document_key.and_then(|key| serde_json::to_value(key).ok()),
    }
}
