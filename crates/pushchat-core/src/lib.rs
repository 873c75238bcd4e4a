//! PushChat Core
//!
//! This crate provides the domain types, wire codec and synchronization state
//! for the PushChat realtime client: per-conversation message collections,
//! the debounced typing tracker, the subscription-based event router, and the
//! traits that runtime crates implement (transport, history, session).
//!
//! None of the types in this crate spawn tasks or touch the network; the
//! `pushchat-runtime` crate wires them onto a single-writer tokio task.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod history;
pub mod message;
pub mod router;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;
pub mod typing;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{ChannelConfig, ReconnectConfig, SyncConfig, TypingConfig};
pub use errors::{DecodeError, PushChatError, Result, TransportError};
pub use history::HistoryService;
pub use message::{Message, MessageKind};
pub use router::{ConnectionEvent, EventRouter, Subscription, TypingEvent};
pub use session::{SessionProvider, StaticSession};
pub use store::MessageStore;
pub use transport::{PushTransport, TransportSignal};
pub use types::{AuthToken, ChatId, MessageId, UserId};
pub use typing::TypingTracker;
pub use wire::{InboundEvent, OutboundEvent};
