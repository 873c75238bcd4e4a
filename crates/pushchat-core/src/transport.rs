//! Transport abstraction for the push connection
//!
//! A transport is the persistent bidirectional event channel underneath the
//! sync runtime (WebSocket in production, a scripted channel in tests). The
//! runtime owns exactly one transport instance and is the only reader of its
//! signals, which is what makes reconnect-over-reconnect incapable of leaving
//! a stale handler attached.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::Result;
use crate::types::AuthToken;
use crate::wire::OutboundEvent;

// ----------------------------------------------------------------------------
// Transport Signals
// ----------------------------------------------------------------------------

/// Raw notification delivered by a transport
#[derive(Debug, Clone)]
pub enum TransportSignal {
    /// The connection is established and authenticated
    Opened,
    /// The connection dropped; the runtime decides whether to reconnect
    Closed { reason: String },
    /// Connecting failed before the connection was established
    ConnectError { reason: String },
    /// A named event arrived; payload is decoded by the runtime, not here
    Event { name: String, payload: Value },
}

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Persistent push connection interface
///
/// All methods return immediately or await I/O; none of them block a thread.
/// `open` attaches the auth token as connection metadata, never as an event
/// payload.
#[async_trait]
pub trait PushTransport: Send {
    /// Establish the connection using the given credential
    async fn open(&mut self, token: &AuthToken) -> Result<()>;

    /// Tear the connection down; idempotent
    async fn close(&mut self) -> Result<()>;

    /// Emit an outbound event; fails when not connected
    async fn emit(&mut self, event: OutboundEvent) -> Result<()>;

    /// Next signal from the connection; `None` once the transport is finished
    /// and will produce nothing further
    async fn next_signal(&mut self) -> Option<TransportSignal>;
}
