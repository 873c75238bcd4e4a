//! PushChat Runtime
//!
//! Wires the synchronization core from `pushchat-core` onto a single tokio
//! task: the task owns the transport, the message store, the typing tracker
//! and the connection state machine; clonable [`PushChatHandle`]s enqueue
//! commands and consumers subscribe to the shared [`pushchat_core::EventRouter`].
//!
//! ```rust,no_run
//! use pushchat_core::{ChatId, StaticSession};
//! use pushchat_runtime::PushChatBuilder;
//! use pushchat_ws::WsTransport;
//!
//! # async fn example() -> pushchat_core::Result<()> {
//! let transport = WsTransport::new("wss://chat.example.com/push")?;
//! let (client, _task) = PushChatBuilder::new(transport)
//!     .with_session(StaticSession::new("user-1", "jwt-token"))
//!     .spawn()?;
//!
//! client.router().subscribe_messages(|message| {
//!     println!("{}: {}", message.sender_id, message.content);
//! });
//! client.connect();
//! client.join_chat(ChatId::new("chat-1"));
//! # Ok(())
//! # }
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

mod builder;
mod command;
mod connection;
mod handle;
mod task;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use builder::PushChatBuilder;
pub use connection::ConnectionState;
pub use handle::PushChatHandle;
pub use task::SyncStats;
