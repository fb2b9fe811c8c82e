use crate::error::{Error, ErrorKind};
use crate::message::ServerMessage;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedSender;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed,
}

/// A frame queued for a connection's socket writer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// A JSON text frame.
    Message(ServerMessage),
    /// Transport level liveness ping with an empty payload.
    Ping,
    /// Close the socket with a normal status. Always the last frame queued.
    Close,
}

pub type OutboundSender = UnboundedSender<Outbound>;

/// Handle to one client's bidirectional channel.
///
/// The handle only owns the sending half of the outbound queue; the transport
/// layer drains the receiving half into the socket. Once closed, every send is
/// rejected with [`ErrorKind::ConnectionClosed`].
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    open: AtomicBool,
    sender: OutboundSender,
}

impl Connection {
    pub fn new(sender: OutboundSender) -> Self {
        Self {
            id: ConnectionId::new(),
            open: AtomicBool::new(true),
            sender,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn state(&self) -> ConnectionState {
        if self.open.load(Ordering::Acquire) {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Queue a frame for delivery.
    pub fn send(&self, frame: Outbound) -> Result<(), Error> {
        if !self.is_open() {
            return Err(Error::connection_closed(self.id.as_str()));
        }

        self.sender.send(frame).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Transport,
        })
    }

    /// Transition to `Closed` and queue the close frame.
    ///
    /// Returns `true` only for the call that performed the transition, so the
    /// close frame is queued at most once no matter how many parties race to
    /// close the connection.
    pub fn close(&self) -> bool {
        if self.open.swap(false, Ordering::AcqRel) {
            // The writer may already be gone when the client closed first.
            let _ = self.sender.send(Outbound::Close);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn test_send_while_open_is_queued() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = Connection::new(tx);

        connection.send(Outbound::Ping).unwrap();

        assert_eq!(connection.state(), ConnectionState::Open);
        assert_eq!(rx.try_recv().unwrap(), Outbound::Ping);
    }

    #[test]
    fn test_send_after_close_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = Connection::new(tx);
        connection.close();

        let err = connection.send(Outbound::Ping).unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::ConnectionClosed(connection.id().to_string())
        );
    }

    #[test]
    fn test_send_to_dropped_writer_is_a_transport_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Connection::new(tx);
        drop(rx);

        let err = connection.send(Outbound::Ping).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Transport);
    }

    #[test]
    fn test_close_queues_a_single_close_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = Connection::new(tx);

        assert!(connection.close());
        assert!(!connection.close());

        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
        assert!(rx.try_recv().is_err());
    }
}
