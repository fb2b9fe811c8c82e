//! Error types for the `change_feed` layer.
use std::error::Error as StdError;
use std::fmt;

/// Top-level change feed error type.
/// Feed errors never escape the watcher: every one of them is logged and
/// answered with a delayed restart of the feed.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Enum representing the kinds of errors that can occur in the `change_feed` layer.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// A feed source could not be parsed from configuration.
    Config(String),
    /// The external store refused or dropped the feed.
    Database,
    /// Any other feed failure.
    Other(String),
}

impl Error {
    pub fn other(message: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::Other(message.into()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Change Feed Error: {:?}: {source}", self.error_kind),
            None => write!(f, "Change Feed Error: {:?}", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Database,
        }
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Database,
        }
    }
}
