//! Commands from the presentation layer to the sync task
//!
//! All mutation flows through these messages so that the sync task remains
//! the single writer of store, tracker and connection state.

use pushchat_core::{ChatId, Message, MessageId, MessageKind, Result};
use tokio::sync::oneshot;

/// One request from a [`crate::PushChatHandle`] to the sync task
#[derive(Debug)]
pub(crate) enum Command {
    /// Establish the push connection; no-op when already live
    Connect,
    /// Tear the connection down and cancel pending reconnects; idempotent
    Disconnect,
    /// Emit `send_message`; dropped when not connected
    SendMessage {
        chat_id: ChatId,
        content: String,
        kind: MessageKind,
    },
    /// Emit `typing`; dropped when not connected
    SendTyping { chat_id: ChatId },
    /// Emit `delete_message`; local removal happens when the server echoes
    /// `message_deleted`
    DeleteMessage {
        chat_id: ChatId,
        message_id: MessageId,
    },
    /// Flag the local list as seen and emit `mark_read` when connected
    MarkAsRead { chat_id: ChatId },
    /// Emit `join_chat`; dropped when not connected
    JoinChat { chat_id: ChatId },
    /// Focus a conversation for typing indicators
    WatchChat { chat_id: ChatId },
    /// Clear typing focus and cancel its pending deadline (view closed)
    UnwatchChat,
    /// Fetch a history page and seed the store with a full replace
    LoadHistory {
        chat_id: ChatId,
        limit: u32,
        offset: u32,
        reply: oneshot::Sender<Result<usize>>,
    },
    /// Snapshot a conversation's messages
    GetMessages {
        chat_id: ChatId,
        reply: oneshot::Sender<Vec<Message>>,
    },
    /// Drop a conversation's local list (view closed for good)
    ClearConversation { chat_id: ChatId },
    /// Snapshot the task's counters
    GetStats {
        reply: oneshot::Sender<crate::task::SyncStats>,
    },
    /// Stop the sync task
    Shutdown,
}
