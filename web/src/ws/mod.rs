//! WebSocket transport for the hub.
//!
//! Only framing lives here: the protocol state machine, the registry and
//! keepalive are owned by the `hub` crate.

pub mod handler;
