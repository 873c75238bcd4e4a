//! Clonable client handle
//!
//! The handle is the outbound action surface: fire-and-forget commands that
//! are enqueued to the sync task and emitted only while the connection is
//! live. There is no global locator; the application's session lifecycle
//! owns the handle and passes clones to whichever views need one.

use std::sync::Arc;

use pushchat_core::{
    ChatId, EventRouter, Message, MessageId, MessageKind, PushChatError, Result,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::warn;

use crate::command::Command;
use crate::connection::ConnectionState;

// ----------------------------------------------------------------------------
// Handle
// ----------------------------------------------------------------------------

/// Handle to a running sync task
///
/// Cheap to clone; all clones talk to the same task and share one router, so
/// one consumer's teardown never disturbs another's subscriptions.
#[derive(Clone)]
pub struct PushChatHandle {
    command_sender: mpsc::Sender<Command>,
    status_receiver: watch::Receiver<ConnectionState>,
    router: Arc<EventRouter>,
}

impl PushChatHandle {
    pub(crate) fn new(
        command_sender: mpsc::Sender<Command>,
        status_receiver: watch::Receiver<ConnectionState>,
        router: Arc<EventRouter>,
    ) -> Self {
        Self {
            command_sender,
            status_receiver,
            router,
        }
    }

    /// Event fan-out shared by every clone of this handle
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    /// Point-in-time connection query, no side effects
    pub fn is_connected(&self) -> bool {
        *self.status_receiver.borrow() == ConnectionState::Connected
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        *self.status_receiver.borrow()
    }

    /// Watch connection state changes (for banners, retry UI)
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.status_receiver.clone()
    }

    // ------------------------------------------------------------------
    // Connection lifecycle (fire-and-forget)
    // ------------------------------------------------------------------

    /// Establish the push connection; no-op when already live. Failures are
    /// reported through the connection fan-out, never to this caller.
    pub fn connect(&self) {
        self.enqueue(Command::Connect);
    }

    /// Tear the connection down; idempotent
    pub fn disconnect(&self) {
        self.enqueue(Command::Disconnect);
    }

    /// Stop the sync task entirely
    pub fn shutdown(&self) {
        self.enqueue(Command::Shutdown);
    }

    // ------------------------------------------------------------------
    // Outbound actions (fire-and-forget, dropped while disconnected)
    // ------------------------------------------------------------------

    /// Send a text or image message to a conversation
    pub fn send_message(&self, chat_id: ChatId, content: impl Into<String>, kind: MessageKind) {
        self.enqueue(Command::SendMessage {
            chat_id,
            content: content.into(),
            kind,
        });
    }

    /// Send a plain text message
    pub fn send_text(&self, chat_id: ChatId, content: impl Into<String>) {
        self.send_message(chat_id, content, MessageKind::default());
    }

    /// Tell the server the local user is typing in a conversation
    pub fn send_typing(&self, chat_id: ChatId) {
        self.enqueue(Command::SendTyping { chat_id });
    }

    /// Ask the server to delete a message; the local copy goes away when the
    /// server echoes `message_deleted`
    pub fn delete_message(&self, chat_id: ChatId, message_id: MessageId) {
        self.enqueue(Command::DeleteMessage {
            chat_id,
            message_id,
        });
    }

    /// Flag a conversation as read locally and notify the server
    pub fn mark_as_read(&self, chat_id: ChatId) {
        self.enqueue(Command::MarkAsRead { chat_id });
    }

    /// Join a conversation's realtime room
    pub fn join_chat(&self, chat_id: ChatId) {
        self.enqueue(Command::JoinChat { chat_id });
    }

    // ------------------------------------------------------------------
    // Conversation state
    // ------------------------------------------------------------------

    /// Focus a conversation so its typing indicator is tracked
    pub fn watch_chat(&self, chat_id: ChatId) {
        self.enqueue(Command::WatchChat { chat_id });
    }

    /// Clear focus; cancels any pending typing deadline (view closed)
    pub fn unwatch_chat(&self) {
        self.enqueue(Command::UnwatchChat);
    }

    /// Drop the locally held list of a conversation
    pub fn clear_conversation(&self, chat_id: ChatId) {
        self.enqueue(Command::ClearConversation { chat_id });
    }

    /// Fetch a history page and replace the conversation's list with it;
    /// returns the number of messages loaded
    pub async fn load_history(&self, chat_id: ChatId, limit: u32, offset: u32) -> Result<usize> {
        let (reply, response) = oneshot::channel();
        self.command_sender
            .send(Command::LoadHistory {
                chat_id,
                limit,
                offset,
                reply,
            })
            .await
            .map_err(|_| PushChatError::channel_error("sync task is gone"))?;
        response
            .await
            .map_err(|_| PushChatError::channel_error("sync task dropped the reply"))?
    }

    /// Snapshot of a conversation's messages in arrival order
    pub async fn messages(&self, chat_id: ChatId) -> Result<Vec<Message>> {
        let (reply, response) = oneshot::channel();
        self.command_sender
            .send(Command::GetMessages { chat_id, reply })
            .await
            .map_err(|_| PushChatError::channel_error("sync task is gone"))?;
        response
            .await
            .map_err(|_| PushChatError::channel_error("sync task dropped the reply"))
    }

    /// Snapshot of the task's counters (dropped commands, decode failures)
    pub async fn stats(&self) -> Result<crate::SyncStats> {
        let (reply, response) = oneshot::channel();
        self.command_sender
            .send(Command::GetStats { reply })
            .await
            .map_err(|_| PushChatError::channel_error("sync task is gone"))?;
        response
            .await
            .map_err(|_| PushChatError::channel_error("sync task dropped the reply"))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Fire-and-forget enqueue; a full or closed buffer drops the command
    /// with a log line, matching the no-queue delivery semantics
    fn enqueue(&self, command: Command) {
        if let Err(e) = self.command_sender.try_send(command) {
            warn!(error = %e, "dropping command, sync task unavailable or backlogged");
        }
    }
}
