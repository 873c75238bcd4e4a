//! Debounced typing indicator state
//!
//! Each typing event from a peer makes the indicator visible for the watched
//! conversation and re-arms a single expiry deadline; a later event replaces
//! the pending deadline rather than stacking a second one. The tracker holds
//! deadlines as plain milliseconds and is driven by whatever clock and timer
//! the runtime provides, which keeps the debounce logic synchronous and
//! testable.

use hashbrown::HashMap;

use crate::types::{ChatId, UserId};

/// How long the indicator stays visible after the last typing event
pub const TYPING_VISIBLE_MS: u64 = 3_000;

// ----------------------------------------------------------------------------
// Typing Tracker
// ----------------------------------------------------------------------------

/// Per-conversation ephemeral "peer is typing" flags
#[derive(Debug)]
pub struct TypingTracker {
    /// Local user, whose own typing events are ignored
    local_user: UserId,
    /// Conversation currently on screen, if any
    watched: Option<ChatId>,
    /// Expiry deadline (epoch millis) per visible conversation
    deadlines: HashMap<ChatId, u64>,
    /// Visibility window in milliseconds
    ttl_ms: u64,
}

impl TypingTracker {
    /// Create a tracker for the given local user with the default window
    pub fn new(local_user: UserId) -> Self {
        Self::with_ttl(local_user, TYPING_VISIBLE_MS)
    }

    /// Create a tracker with a custom visibility window
    pub fn with_ttl(local_user: UserId, ttl_ms: u64) -> Self {
        Self {
            local_user,
            watched: None,
            deadlines: HashMap::new(),
            ttl_ms,
        }
    }

    /// Focus a conversation; typing events for other chats are ignored
    pub fn watch(&mut self, chat_id: ChatId) {
        if self.watched.as_ref() != Some(&chat_id) {
            self.deadlines.clear();
            self.watched = Some(chat_id);
        }
    }

    /// Clear focus and cancel any pending deadline (view closed)
    pub fn unwatch(&mut self) {
        self.watched = None;
        self.deadlines.clear();
    }

    /// Process a typing event observed at `now_millis`
    ///
    /// Returns `true` when the indicator for the watched conversation became
    /// (or stayed) visible, re-arming its deadline. Self-typing and events
    /// for unwatched conversations return `false`.
    pub fn observe(&mut self, chat_id: &ChatId, user_id: &UserId, now_millis: u64) -> bool {
        if user_id == &self.local_user {
            return false;
        }
        if self.watched.as_ref() != Some(chat_id) {
            return false;
        }

        // Debounce: a fresh deadline replaces the pending one
        self.deadlines
            .insert(chat_id.clone(), now_millis + self.ttl_ms);
        true
    }

    /// Expire deadlines that have elapsed by `now_millis`
    ///
    /// Returns the conversations whose indicator just went hidden.
    pub fn expire(&mut self, now_millis: u64) -> Vec<ChatId> {
        let expired: Vec<ChatId> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now_millis)
            .map(|(chat, _)| chat.clone())
            .collect();
        for chat in &expired {
            self.deadlines.remove(chat);
        }
        expired
    }

    /// Earliest pending deadline, for the runtime to sleep until
    pub fn next_deadline(&self) -> Option<u64> {
        self.deadlines.values().copied().min()
    }

    /// Whether the indicator is currently visible for a conversation
    pub fn is_visible(&self, chat_id: &ChatId) -> bool {
        self.deadlines.contains_key(chat_id)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
