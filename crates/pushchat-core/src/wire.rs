//! Wire protocol for the push connection
//!
//! The server speaks named JSON events over a persistent connection. This
//! module owns the event names, the payload schemas (camelCase, matching the
//! server) and the decode path. Decoding is total: anything malformed comes
//! back as a [`DecodeError`] so the caller can log and drop it without ever
//! reaching a listener.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DecodeError;
use crate::message::{Message, MessageKind};
use crate::types::{ChatId, MessageId, UserId};

// ----------------------------------------------------------------------------
// Event Names
// ----------------------------------------------------------------------------

pub const EVENT_NEW_MESSAGE: &str = "new_message";
pub const EVENT_MESSAGE_DELETED: &str = "message_deleted";
pub const EVENT_USER_TYPING: &str = "user_typing";

pub const EVENT_SEND_MESSAGE: &str = "send_message";
pub const EVENT_TYPING: &str = "typing";
pub const EVENT_DELETE_MESSAGE: &str = "delete_message";
pub const EVENT_MARK_READ: &str = "mark_read";
pub const EVENT_JOIN_CHAT: &str = "join_chat";

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One named event with its JSON payload, as carried on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

// ----------------------------------------------------------------------------
// Inbound Events
// ----------------------------------------------------------------------------

/// Decoded realtime event from the server
#[derive(Debug, Clone)]
pub enum InboundEvent {
    NewMessage(Message),
    MessageDeleted {
        chat_id: ChatId,
        message_id: MessageId,
    },
    UserTyping {
        chat_id: ChatId,
        user_id: UserId,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDeletedPayload {
    message_id: MessageId,
    chat_id: ChatId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserTypingPayload {
    chat_id: ChatId,
    user_id: UserId,
}

/// Decode a named inbound event into its typed form
///
/// A `new_message` without a server-assigned id is rejected here rather than
/// later in the store: such a message could never be deduplicated or deleted.
pub fn decode_inbound(name: &str, payload: &Value) -> Result<InboundEvent, DecodeError> {
    match name {
        EVENT_NEW_MESSAGE => {
            let message: Message =
                serde_json::from_value(payload.clone()).map_err(|source| DecodeError::Payload {
                    event: EVENT_NEW_MESSAGE,
                    source,
                })?;
            if message.id.is_empty() {
                return Err(DecodeError::MissingField {
                    event: EVENT_NEW_MESSAGE,
                    field: "id",
                });
            }
            Ok(InboundEvent::NewMessage(message))
        }
        EVENT_MESSAGE_DELETED => {
            let payload: MessageDeletedPayload =
                serde_json::from_value(payload.clone()).map_err(|source| DecodeError::Payload {
                    event: EVENT_MESSAGE_DELETED,
                    source,
                })?;
            Ok(InboundEvent::MessageDeleted {
                chat_id: payload.chat_id,
                message_id: payload.message_id,
            })
        }
        EVENT_USER_TYPING => {
            let payload: UserTypingPayload =
                serde_json::from_value(payload.clone()).map_err(|source| DecodeError::Payload {
                    event: EVENT_USER_TYPING,
                    source,
                })?;
            Ok(InboundEvent::UserTyping {
                chat_id: payload.chat_id,
                user_id: payload.user_id,
            })
        }
        other => Err(DecodeError::UnknownEvent {
            name: other.to_string(),
        }),
    }
}

// ----------------------------------------------------------------------------
// Outbound Events
// ----------------------------------------------------------------------------

/// Command emitted on the push connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    SendMessage {
        chat_id: ChatId,
        content: String,
        kind: MessageKind,
    },
    Typing {
        chat_id: ChatId,
    },
    DeleteMessage {
        chat_id: ChatId,
        message_id: MessageId,
    },
    MarkRead {
        chat_id: ChatId,
    },
    JoinChat {
        chat_id: ChatId,
    },
}

impl OutboundEvent {
    /// Wire name of this event
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::SendMessage { .. } => EVENT_SEND_MESSAGE,
            OutboundEvent::Typing { .. } => EVENT_TYPING,
            OutboundEvent::DeleteMessage { .. } => EVENT_DELETE_MESSAGE,
            OutboundEvent::MarkRead { .. } => EVENT_MARK_READ,
            OutboundEvent::JoinChat { .. } => EVENT_JOIN_CHAT,
        }
    }

    /// JSON payload for this event, in the server's camelCase schema
    pub fn payload(&self) -> Value {
        match self {
            OutboundEvent::SendMessage {
                chat_id,
                content,
                kind,
            } => serde_json::json!({
                "chatId": chat_id,
                "content": content,
                "type": kind,
            }),
            OutboundEvent::Typing { chat_id } => serde_json::json!({ "chatId": chat_id }),
            OutboundEvent::DeleteMessage {
                chat_id,
                message_id,
            } => serde_json::json!({
                "chatId": chat_id,
                "messageId": message_id,
            }),
            OutboundEvent::MarkRead { chat_id } => serde_json::json!({ "chatId": chat_id }),
            OutboundEvent::JoinChat { chat_id } => serde_json::json!({ "chatId": chat_id }),
        }
    }

    /// Full frame ready for serialization
    pub fn to_frame(&self) -> Frame {
        Frame {
            event: self.name().to_string(),
            data: self.payload(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
