use crate::error::{Error, ErrorKind};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Kind of change reported by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    Insert,
    Replace,
    Update,
    Delete,
    Other(String),
}

impl OperationKind {
    /// Inserts, replacements and updates trigger notifications; deletes and
    /// everything else are ignored.
    pub fn is_qualifying(&self) -> bool {
        matches!(
            self,
            OperationKind::Insert | OperationKind::Replace | OperationKind::Update
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::Insert => "insert",
            OperationKind::Replace => "replace",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Other(name) => name,
        }
    }
}

impl From<&str> for OperationKind {
    fn from(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "insert" => OperationKind::Insert,
            "replace" => OperationKind::Replace,
            "update" => OperationKind::Update,
            "delete" => OperationKind::Delete,
            other => OperationKind::Other(other.to_string()),
        }
    }
}

/// One change observed on a watched collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub collection: String,
    pub operation: OperationKind,
    pub document_key: Option<Value>,
}

#[derive(Deserialize)]
struct NotificationPayload {
    #[serde(rename = "operationType")]
    operation_type: String,
    #[serde(rename = "documentKey", default)]
    document_key: Option<Value>,
}

impl ChangeEvent {
    pub fn new(collection: impl Into<String>, operation: OperationKind) -> Self {
        Self {
            collection: collection.into(),
            operation,
            document_key: None,
        }
    }

    /// Build an event from a notification payload.
    ///
    /// Accepts `{"operationType": "update", "documentKey": {...}}` or a bare
    /// operation name such as `UPDATE`.
    pub fn from_payload(collection: &str, payload: &str) -> Self {
        match serde_json::from_str::<NotificationPayload>(payload) {
            Ok(parsed) => Self {
                collection: collection.to_string(),
                operation: OperationKind::from(parsed.operation_type.as_str()),
                document_key: parsed.document_key,
            },
            Err(_) => Self::new(collection, OperationKind::from(payload)),
        }
    }
}

/// A watched collection and the topic its changes are published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    pub collection: String,
    pub topic: String,
}

impl FeedSource {
    pub fn new(collection: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            topic: topic.into(),
        }
    }
}

/// Parses `collection` or `collection:topic`.
impl FromStr for FeedSource {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (collection, topic) = match value.split_once(':') {
            Some((collection, topic)) => (collection.trim(), topic.trim()),
            None => (value.trim(), value.trim()),
        };

        if collection.is_empty() || topic.is_empty() {
            return Err(Error {
                source: None,
                error_kind: ErrorKind::Config(format!(
                    "invalid change feed source '{value}', expected collection[:topic]"
                )),
            });
        }

        Ok(Self::new(collection, topic))
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.collection == self.topic {
            write!(f, "{}", self.collection)
        } else {
            write!(f, "{}:{}", self.collection, self.topic)
        }
    }
}

/// Open cursor on a change feed. The stream ending means the cursor closed.
pub type ChangeStream = BoxStream<'static, Result<ChangeEvent, Error>>;

/// An external store's native change feed.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a cursor on the changes of `collection`.
    async fn open(&self, collection: &str) -> Result<ChangeStream, Error>;
}
