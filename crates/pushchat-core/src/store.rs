//! Per-conversation message collections
//!
//! The store reconciles two inflows for each conversation: bulk REST history
//! loads (full replace) and live push events (append-if-absent). Insertion is
//! idempotent on message id, which covers the optimistic-echo-plus-push double
//! delivery and redelivery after reconnect.
//!
//! All reads return snapshots. `mark_all_read` swaps in a freshly allocated
//! list so identity-based change detection observes the mutation.

use hashbrown::HashMap;

use crate::message::Message;
use crate::types::{ChatId, MessageId};

// ----------------------------------------------------------------------------
// Message Store
// ----------------------------------------------------------------------------

/// Ordered, deduplicated message lists keyed by conversation
#[derive(Debug, Default)]
pub struct MessageStore {
    /// Messages per conversation, in arrival order
    conversations: HashMap<ChatId, Vec<Message>>,
    /// Statistics
    stats: MessageStoreStats,
}

/// Statistics for store reconciliation
#[derive(Debug, Clone, Default)]
pub struct MessageStoreStats {
    /// Messages appended via push events
    pub messages_added: u64,
    /// Push arrivals ignored because the id was already present
    pub duplicates_ignored: u64,
    /// Push arrivals rejected for an empty id
    pub empty_ids_rejected: u64,
    /// Full history replacements
    pub history_loads: u64,
}

impl MessageStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a conversation's list wholesale (history page load)
    ///
    /// Replace semantics: no deduplication against the previous contents.
    pub fn set_messages(&mut self, chat_id: ChatId, messages: Vec<Message>) {
        self.stats.history_loads += 1;
        self.conversations.insert(chat_id, messages);
    }

    /// Append a message unless its id is empty or already present
    ///
    /// Returns `true` when the message was inserted.
    pub fn add_message(&mut self, message: Message) -> bool {
        if message.id.is_empty() {
            self.stats.empty_ids_rejected += 1;
            tracing::warn!(chat = %message.chat_id, "dropping pushed message with empty id");
            return false;
        }

        let list = self.conversations.entry(message.chat_id.clone()).or_default();
        if list.iter().any(|existing| existing.id == message.id) {
            self.stats.duplicates_ignored += 1;
            tracing::debug!(chat = %message.chat_id, id = %message.id, "duplicate message ignored");
            return false;
        }

        list.push(message);
        self.stats.messages_added += 1;
        true
    }

    /// Flag every entry of a conversation as seen
    ///
    /// The list is rebuilt rather than mutated in place so that consumers
    /// holding the previous snapshot can detect the change by identity.
    pub fn mark_all_read(&mut self, chat_id: &ChatId) {
        if let Some(list) = self.conversations.get_mut(chat_id) {
            let updated: Vec<Message> = list
                .iter()
                .map(|m| Message { seen: true, ..m.clone() })
                .collect();
            *list = updated;
        }
    }

    /// Remove the entry with the given id; no-op when absent
    pub fn remove_message(&mut self, chat_id: &ChatId, message_id: &MessageId) {
        if let Some(list) = self.conversations.get_mut(chat_id) {
            list.retain(|m| &m.id != message_id);
        }
    }

    /// Drop a conversation's list entirely (view closed)
    pub fn clear_conversation(&mut self, chat_id: &ChatId) {
        self.conversations.remove(chat_id);
    }

    /// Snapshot of a conversation's messages in arrival order
    pub fn messages(&self, chat_id: &ChatId) -> Vec<Message> {
        self.conversations.get(chat_id).cloned().unwrap_or_default()
    }

    /// Whether a conversation contains the given id
    pub fn contains(&self, chat_id: &ChatId, message_id: &MessageId) -> bool {
        self.conversations
            .get(chat_id)
            .map(|list| list.iter().any(|m| &m.id == message_id))
            .unwrap_or(false)
    }

    /// Number of messages held for a conversation
    pub fn message_count(&self, chat_id: &ChatId) -> usize {
        self.conversations.get(chat_id).map(Vec::len).unwrap_or(0)
    }

    /// Get store statistics
    pub fn stats(&self) -> &MessageStoreStats {
        &self.stats
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
