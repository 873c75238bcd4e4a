//! Chat message model
//!
//! Mirrors the server's JSON schema (camelCase fields). Messages are
//! immutable once created except for the `seen` flag, which `MessageStore`
//! flips when a conversation is marked read.

use serde::{Deserialize, Serialize};

use crate::types::{ChatId, MessageId, UserId};

// ----------------------------------------------------------------------------
// Message Kind
// ----------------------------------------------------------------------------

/// Payload kind of a message: plain text or the URL of an uploaded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
}

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// A single chat message as delivered by the server
///
/// `created_at` is the server's timestamp and is carried as an opaque string;
/// the client never parses it, since ordering is arrival order and the server
/// is the sole time authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    /// Text body, or the URL of the uploaded object for image messages
    pub content: String,
    /// Missing on the wire for some legacy rows; treated as text by default
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub seen: bool,
}

impl Message {
    /// Identity comparison: two entries are the same item iff their ids match
    pub fn is_same_item(&self, other: &Message) -> bool {
        self.id == other.id
    }

    /// Content comparison used by change detection: content, seen flag and
    /// kind must all be equal. A kind missing on both sides counts as equal.
    pub fn has_same_contents(&self, other: &Message) -> bool {
        self.content == other.content && self.seen == other.seen && self.kind == other.kind
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
