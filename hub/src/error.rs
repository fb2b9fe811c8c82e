//! Error types for the `hub` layer.
use std::error::Error as StdError;
use std::fmt;

/// Top-level hub error type.
/// None of these errors ever leave the notification subsystem: the hub
/// converts them to log lines at its boundary so that a failed delivery or a
/// malformed client frame can never fail the operation that triggered it.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Enum representing the kinds of errors that can occur in the `hub` layer.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// An inbound control frame could not be parsed.
    MalformedFrame,
    /// A frame was sent to a connection that is already closed.
    ConnectionClosed(String),
    /// The connection's outbound channel is gone.
    Transport,
    /// An outbound frame could not be serialized.
    Serialization,
    /// A call to a downstream HTTP endpoint failed.
    Network,
    /// Invalid component configuration.
    Config(String),
}

impl Error {
    pub(crate) fn connection_closed(connection_id: &str) -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::ConnectionClosed(connection_id.to_string()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Hub Error: {:?}: {source}", self.error_kind),
            None => write!(f, "Hub Error: {:?}", self.error_kind),
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

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        let error_kind = if err.is_data() || err.is_syntax() || err.is_eof() {
            ErrorKind::MalformedFrame
        } else {
            ErrorKind::Serialization
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Config(err.to_string())
        } else {
            ErrorKind::Network
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}
