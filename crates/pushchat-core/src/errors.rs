//! Error types for the PushChat client core
//!
//! Two failure domains exist: the transport (connect, reconnect, emit) and
//! the inbound codec. Transport failures are surfaced to consumers through
//! the connection fan-out; decode failures are logged and absorbed. Nothing
//! in this crate is allowed to terminate the process.

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Failures of the persistent push connection
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connect failed: {reason}")]
    ConnectFailed { reason: String },
    #[error("Connection closed: {reason}")]
    Closed { reason: String },
    #[error("Emit failed for event {event}: {reason}")]
    EmitFailed { event: String, reason: String },
    #[error("Transport is not connected")]
    NotConnected,
    #[error("Reconnection attempts exhausted after {attempts} tries")]
    ReconnectExhausted { attempts: u32 },
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ----------------------------------------------------------------------------
// Decode Errors
// ----------------------------------------------------------------------------

/// Failures to parse an inbound event payload into its expected schema
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Unknown event name: {name}")]
    UnknownEvent { name: String },
    #[error("Missing or empty required field `{field}` in {event} payload")]
    MissingField { event: &'static str, field: &'static str },
    #[error("Malformed {event} payload: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

// ----------------------------------------------------------------------------
// Top-Level Error
// ----------------------------------------------------------------------------

/// Unified error type for the PushChat client
#[derive(Debug, thiserror::Error)]
pub enum PushChatError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("History fetch failed: {reason}")]
    History { reason: String },

    /// Internal channel failure (runtime task gone or buffer closed)
    #[error("Channel error: {message}")]
    Channel { message: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

impl PushChatError {
    /// Create a connect failure with a reason
    pub fn connect_failed<R: Into<String>>(reason: R) -> Self {
        PushChatError::Transport(TransportError::ConnectFailed {
            reason: reason.into(),
        })
    }

    /// Create a channel error with a message
    pub fn channel_error<M: Into<String>>(message: M) -> Self {
        PushChatError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<R: Into<String>>(reason: R) -> Self {
        PushChatError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a history fetch error with a reason
    pub fn history_error<R: Into<String>>(reason: R) -> Self {
        PushChatError::History {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, PushChatError>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
