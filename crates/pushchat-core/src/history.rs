//! REST history boundary
//!
//! The history/auth/profile API is an external collaborator; the core only
//! needs one operation from it: paging a conversation's messages so the
//! runtime can seed the store with a full replace.

use async_trait::async_trait;

use crate::errors::Result;
use crate::message::Message;
use crate::types::ChatId;

/// Read-only access to server-side message history
#[async_trait]
pub trait HistoryService: Send + Sync {
    /// Fetch up to `limit` messages of a conversation, starting at `offset`,
    /// in the server's chronological order
    async fn fetch_messages(
        &self,
        chat_id: &ChatId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>>;
}
