//! Typed fan-out of inbound realtime events
//!
//! Multiple independent consumers (several open conversation views, a chat
//! list, a connection banner) subscribe to the events they care about and get
//! back an opaque [`Subscription`] handle. Unsubscribing is idempotent and
//! safe to call while a dispatch is in flight: dispatch walks a snapshot of
//! the registry taken at dispatch start but re-checks liveness immediately
//! before each invocation, so a listener removed mid-dispatch is not invoked
//! and no listener is skipped or invoked twice.

use std::sync::{Arc, Mutex};

use smallvec::SmallVec;
use uuid::Uuid;

use crate::message::Message;
use crate::types::{ChatId, MessageId, UserId};

// ----------------------------------------------------------------------------
// Subscription Handle
// ----------------------------------------------------------------------------

/// Opaque token identifying a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(Uuid);

impl Subscription {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

// ----------------------------------------------------------------------------
// Event Types
// ----------------------------------------------------------------------------

/// Connection lifecycle notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    /// Transport-reported connect or runtime error, not fatal by itself
    Error { reason: String },
    /// Bounded reconnection gave up; the session is over until reconnected
    /// explicitly
    Failed { attempts: u32 },
}

/// Typing indicator change for the watched conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypingEvent {
    /// A peer started (or kept) typing
    Started { chat_id: ChatId, user_id: UserId },
    /// The debounce window elapsed with no further events
    Stopped { chat_id: ChatId },
}

// ----------------------------------------------------------------------------
// Listener Registry
// ----------------------------------------------------------------------------

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// One registry per event kind; listeners are held behind `Arc` so dispatch
/// can run without the lock.
struct Registry<E> {
    entries: Mutex<SmallVec<[(Subscription, Listener<E>); 4]>>,
}

impl<E> Registry<E> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(SmallVec::new()),
        }
    }

    fn subscribe(&self, listener: Listener<E>) -> Subscription {
        let token = Subscription::new();
        self.entries
            .lock()
            .expect("router registry lock poisoned")
            .push((token, listener));
        token
    }

    /// Remove by token; returns whether anything was removed
    fn remove(&self, token: Subscription) -> bool {
        let mut entries = self.entries.lock().expect("router registry lock poisoned");
        let before = entries.len();
        entries.retain(|(t, _)| *t != token);
        entries.len() != before
    }

    fn contains(&self, token: Subscription) -> bool {
        self.entries
            .lock()
            .expect("router registry lock poisoned")
            .iter()
            .any(|(t, _)| *t == token)
    }

    /// Dispatch one event over a snapshot of the current listener set
    ///
    /// The lock is never held while a listener runs, so listeners may freely
    /// subscribe or unsubscribe (themselves or each other) during dispatch.
    fn dispatch(&self, event: &E) {
        let snapshot: SmallVec<[(Subscription, Listener<E>); 4]> = self
            .entries
            .lock()
            .expect("router registry lock poisoned")
            .clone();

        for (token, listener) in snapshot {
            // A listener removed earlier in this same dispatch must not run
            if self.contains(token) {
                listener(event);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Event Router
// ----------------------------------------------------------------------------

/// Fan-out hub for inbound realtime events
///
/// Every event kind supports any number of independent listeners, typing
/// included, so several views can observe the same conversation at once.
pub struct EventRouter {
    messages: Registry<Message>,
    deletions: Registry<(ChatId, MessageId)>,
    typing: Registry<TypingEvent>,
    connection: Registry<ConnectionEvent>,
}

impl EventRouter {
    /// Create a router with no listeners
    pub fn new() -> Self {
        Self {
            messages: Registry::new(),
            deletions: Registry::new(),
            typing: Registry::new(),
            connection: Registry::new(),
        }
    }

    /// Register a listener for newly arrived messages
    pub fn subscribe_messages<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.messages.subscribe(Arc::new(listener))
    }

    /// Register a listener for server-side message deletions
    pub fn subscribe_deletions<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&(ChatId, MessageId)) + Send + Sync + 'static,
    {
        self.deletions.subscribe(Arc::new(listener))
    }

    /// Register a listener for typing indicator changes
    pub fn subscribe_typing<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&TypingEvent) + Send + Sync + 'static,
    {
        self.typing.subscribe(Arc::new(listener))
    }

    /// Register a listener for connection lifecycle events
    pub fn subscribe_connection<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.connection.subscribe(Arc::new(listener))
    }

    /// Remove a listener by its handle; idempotent, any kind
    pub fn unsubscribe(&self, token: Subscription) {
        let _ = self.messages.remove(token)
            || self.deletions.remove(token)
            || self.typing.remove(token)
            || self.connection.remove(token);
    }

    /// Fan a new message out to all message listeners
    pub fn dispatch_message(&self, message: &Message) {
        self.messages.dispatch(message);
    }

    /// Fan a deletion out to all deletion listeners
    pub fn dispatch_deletion(&self, chat_id: ChatId, message_id: MessageId) {
        self.deletions.dispatch(&(chat_id, message_id));
    }

    /// Fan a typing change out to all typing listeners
    pub fn dispatch_typing(&self, event: &TypingEvent) {
        self.typing.dispatch(event);
    }

    /// Fan a connection event out to all connection listeners
    pub fn dispatch_connection(&self, event: &ConnectionEvent) {
        self.connection.dispatch(event);
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;

    fn message(id: &str) -> Message {
        Message {
            id: MessageId::new(id),
            chat_id: ChatId::new("c1"),
            sender_id: UserId::new("u1"),
            content: "hi".to_string(),
            kind: Some(MessageKind::Text),
            created_at: String::new(),
            seen: false,
        }
    }

    #[test]
    fn test_multi_subscriber_fan_out() {
        let router = EventRouter::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));

        let a2 = a.clone();
        router.subscribe_messages(move |_| {
            a2.fetch_add(1, Ordering::SeqCst);
        });
        let b2 = b.clone();
        router.subscribe_messages(move |_| {
            b2.fetch_add(1, Ordering::SeqCst);
        });

        router.dispatch_message(&message("m1"));
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let router = EventRouter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let token = router.subscribe_messages(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        router.unsubscribe(token);
        router.unsubscribe(token);
        router.dispatch_message(&message("m1"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_removing_another_mid_dispatch() {
        let router = Arc::new(EventRouter::new());
        let b_calls = Arc::new(AtomicUsize::new(0));
        static TOKEN_B: OnceLock<Subscription> = OnceLock::new();

        // A unsubscribes B while handling the event
        let router2 = router.clone();
        router.subscribe_messages(move |_| {
            router2.unsubscribe(*TOKEN_B.get().unwrap());
        });

        let b2 = b_calls.clone();
        let token_b = router.subscribe_messages(move |_| {
            b2.fetch_add(1, Ordering::SeqCst);
        });
        TOKEN_B.set(token_b).unwrap();

        // B registered after A, so A runs first and B must not see the event
        router.dispatch_message(&message("m1"));
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);

        // Later dispatches also skip B, and nothing panics
        router.dispatch_message(&message("m2"));
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_removing_itself_mid_dispatch() {
        let router = Arc::new(EventRouter::new());
        let calls = Arc::new(AtomicUsize::new(0));
        static TOKEN: OnceLock<Subscription> = OnceLock::new();

        let router2 = router.clone();
        let c = calls.clone();
        let token = router.subscribe_messages(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            router2.unsubscribe(*TOKEN.get().unwrap());
        });
        TOKEN.set(token).unwrap();

        router.dispatch_message(&message("m1"));
        router.dispatch_message(&message("m2"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_typing_supports_multiple_listeners() {
        let router = EventRouter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let h = hits.clone();
            router.subscribe_typing(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            });
        }

        router.dispatch_typing(&TypingEvent::Started {
            chat_id: ChatId::new("c1"),
            user_id: UserId::new("peer"),
        });
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_one_consumer_teardown_keeps_others_live() {
        let router = EventRouter::new();
        let kept = Arc::new(AtomicUsize::new(0));

        let k = kept.clone();
        let _keep = router.subscribe_deletions(move |_| {
            k.fetch_add(1, Ordering::SeqCst);
        });
        let gone = router.subscribe_deletions(|_| {});
        router.unsubscribe(gone);

        router.dispatch_deletion(ChatId::new("c1"), MessageId::new("m1"));
        assert_eq!(kept.load(Ordering::SeqCst), 1);
    }
}
