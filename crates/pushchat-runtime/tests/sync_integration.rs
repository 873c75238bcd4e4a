//! Integration tests for the sync runtime
//!
//! Drive the sync task through a scripted in-memory transport: tests inject
//! transport signals, observe outbound emissions, and subscribe to the
//! router exactly the way a presentation layer would.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pushchat_core::{
    AuthToken, ChatId, ConnectionEvent, HistoryService, Message, MessageId, MessageKind,
    OutboundEvent, PushChatError, PushTransport, Result, StaticSession, SyncConfig,
    TransportSignal, TypingEvent, UserId,
};
use pushchat_runtime::{ConnectionState, PushChatBuilder, PushChatHandle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ----------------------------------------------------------------------------
// Scripted Transport
// ----------------------------------------------------------------------------

/// Transport whose signals are injected by the test and whose emissions are
/// recorded for assertions
struct ScriptedTransport {
    signals: mpsc::UnboundedReceiver<TransportSignal>,
    shared: Arc<ScriptShared>,
}

struct ScriptShared {
    sent: Mutex<Vec<OutboundEvent>>,
    open_failures: Mutex<VecDeque<String>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

/// Test-side controls for a [`ScriptedTransport`]
#[derive(Clone)]
struct Script {
    signal_sender: mpsc::UnboundedSender<TransportSignal>,
    shared: Arc<ScriptShared>,
}

impl Script {
    fn push_event(&self, name: &str, payload: serde_json::Value) {
        self.signal_sender
            .send(TransportSignal::Event {
                name: name.to_string(),
                payload,
            })
            .unwrap();
    }

    fn push_closed(&self, reason: &str) {
        self.signal_sender
            .send(TransportSignal::Closed {
                reason: reason.to_string(),
            })
            .unwrap();
    }

    /// Queue a failure for the next `open` call
    fn fail_next_open(&self, reason: &str) {
        self.shared
            .open_failures
            .lock()
            .unwrap()
            .push_back(reason.to_string());
    }

    fn sent(&self) -> Vec<OutboundEvent> {
        self.shared.sent.lock().unwrap().clone()
    }

    fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }
}

fn scripted_transport() -> (ScriptedTransport, Script) {
    let (signal_sender, signals) = mpsc::unbounded_channel();
    let shared = Arc::new(ScriptShared {
        sent: Mutex::new(Vec::new()),
        open_failures: Mutex::new(VecDeque::new()),
        opens: AtomicUsize::new(0),
        closes: AtomicUsize::new(0),
    });
    (
        ScriptedTransport {
            signals,
            shared: shared.clone(),
        },
        Script {
            signal_sender,
            shared,
        },
    )
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn open(&mut self, _token: &AuthToken) -> Result<()> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.shared.open_failures.lock().unwrap().pop_front() {
            return Err(PushChatError::connect_failed(reason));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn emit(&mut self, event: OutboundEvent) -> Result<()> {
        self.shared.sent.lock().unwrap().push(event);
        Ok(())
    }

    async fn next_signal(&mut self) -> Option<TransportSignal> {
        self.signals.recv().await
    }
}

// ----------------------------------------------------------------------------
// History Stub
// ----------------------------------------------------------------------------

struct StubHistory {
    pages: Mutex<Vec<Vec<Message>>>,
}

impl StubHistory {
    fn new(pages: Vec<Vec<Message>>) -> Self {
        Self {
            pages: Mutex::new(pages),
        }
    }
}

#[async_trait]
impl HistoryService for StubHistory {
    async fn fetch_messages(
        &self,
        _chat_id: &ChatId,
        _limit: u32,
        _offset: u32,
    ) -> Result<Vec<Message>> {
        let mut pages = self.pages.lock().unwrap();
        if pages.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(pages.remove(0))
        }
    }
}

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

fn message_payload(id: &str, chat: &str, sender: &str, content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "chatId": chat,
        "senderId": sender,
        "content": content,
        "type": "text",
        "createdAt": "2024-05-01T10:00:00.000Z",
        "seen": false
    })
}

fn message(id: &str, chat: &str, content: &str) -> Message {
    Message {
        id: MessageId::new(id),
        chat_id: ChatId::new(chat),
        sender_id: UserId::new("peer"),
        content: content.to_string(),
        kind: Some(MessageKind::Text),
        created_at: "2024-05-01T10:00:00.000Z".to_string(),
        seen: false,
    }
}

fn spawn_client(
    history: Option<StubHistory>,
) -> (PushChatHandle, JoinHandle<Result<()>>, Script) {
    let (transport, script) = scripted_transport();
    let mut builder = PushChatBuilder::new(transport)
        .with_session(StaticSession::new("me", "jwt-token"))
        .with_config(SyncConfig::testing());
    if let Some(history) = history {
        builder = builder.with_history(history);
    }
    let (handle, join) = builder.spawn().unwrap();
    (handle, join, script)
}

async fn wait_for_state(handle: &PushChatHandle, state: ConnectionState) {
    let mut watch = handle.watch_connection();
    tokio::time::timeout(Duration::from_secs(5), watch.wait_for(|s| *s == state))
        .await
        .expect("timed out waiting for connection state")
        .expect("status channel closed");
}

/// Poll until the condition holds; paused-clock tests auto-advance through
/// the sleeps
async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never reached: {what}");
}

async fn wait_for_message_count(client: &PushChatHandle, chat: &ChatId, expected: usize) {
    let mut count = 0;
    for _ in 0..500 {
        count = client.messages(chat.clone()).await.unwrap().len();
        if count == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("expected {expected} messages, store settled at {count}");
}

// ----------------------------------------------------------------------------
// Connection Lifecycle
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_then_disconnect() {
    let (client, _join, script) = spawn_client(None);
    let events: Arc<Mutex<Vec<ConnectionEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    client.router().subscribe_connection(move |event| {
        sink.lock().unwrap().push(event.clone());
    });

    assert!(!client.is_connected());
    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;
    assert!(client.is_connected());
    assert_eq!(script.opens(), 1);

    client.disconnect();
    wait_for_state(&client, ConnectionState::Disconnected).await;
    // Disconnect again: idempotent, no extra fan-out
    client.disconnect();

    let seen = events.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![ConnectionEvent::Connected, ConnectionEvent::Disconnected]
    );
}

#[tokio::test]
async fn test_connect_while_connected_is_noop_with_single_dispatch() {
    let (client, _join, script) = spawn_client(None);
    let deliveries = Arc::new(AtomicUsize::new(0));
    let sink = deliveries.clone();
    client.router().subscribe_messages(move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;
    client.connect();
    client.connect();

    script.push_event("new_message", message_payload("m1", "c1", "peer", "hi"));
    eventually("message dispatched", || {
        deliveries.load(Ordering::SeqCst) >= 1
    })
    .await;

    // Still exactly one transport instance and one dispatch per event
    assert_eq!(script.opens(), 1);
    assert_eq!(deliveries.load(Ordering::SeqCst), 1);
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_exhaustion_surfaces_failed() {
    let (client, _join, script) = spawn_client(None);
    let events: Arc<Mutex<Vec<ConnectionEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    client.router().subscribe_connection(move |event| {
        sink.lock().unwrap().push(event.clone());
    });

    // Initial connect plus all three retries fail (testing config: 3 attempts)
    for _ in 0..4 {
        script.fail_next_open("server unreachable");
    }
    client.connect();
    wait_for_state(&client, ConnectionState::Failed).await;

    assert_eq!(script.opens(), 4);
    let seen = events.lock().unwrap().clone();
    assert_eq!(
        seen.iter()
            .filter(|e| matches!(e, ConnectionEvent::Error { .. }))
            .count(),
        4
    );
    assert!(seen.contains(&ConnectionEvent::Failed { attempts: 3 }));

    // A later explicit connect starts over with a fresh budget
    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;
}

#[tokio::test(start_paused = true)]
async fn test_unsolicited_close_triggers_reconnect() {
    let (client, _join, script) = spawn_client(None);
    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;

    script.push_closed("idle timeout");
    // One failed retry, then success on the second
    script.fail_next_open("transient");
    eventually("reconnected", || script.opens() == 3).await;
    wait_for_state(&client, ConnectionState::Connected).await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let (client, _join, script) = spawn_client(None);
    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;
    let opens_before = script.opens();

    // Drop the connection and immediately disconnect explicitly
    script.push_closed("idle timeout");
    client.disconnect();
    wait_for_state(&client, ConnectionState::Disconnected).await;

    // Give any stray reconnect deadline a chance to fire
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(script.opens(), opens_before);
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

// ----------------------------------------------------------------------------
// Outbound Actions
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_actions_emit_only_while_connected() {
    let (client, _join, script) = spawn_client(None);
    let chat = ChatId::new("c1");

    // Not connected: every action is dropped without error
    client.send_text(chat.clone(), "offline hello");
    client.send_typing(chat.clone());
    client.join_chat(chat.clone());
    let stats = client.stats().await.unwrap();
    assert_eq!(stats.commands_dropped, 3);
    assert!(script.sent().is_empty());

    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;

    client.send_message(chat.clone(), "hello", MessageKind::Text);
    client.send_typing(chat.clone());
    client.delete_message(chat.clone(), MessageId::new("m9"));
    client.join_chat(chat.clone());
    let _ = client.stats().await.unwrap(); // barrier: commands processed

    let sent = script.sent();
    assert_eq!(sent.len(), 4);
    assert_eq!(
        sent[0],
        OutboundEvent::SendMessage {
            chat_id: chat.clone(),
            content: "hello".to_string(),
            kind: MessageKind::Text,
        }
    );
    assert_eq!(sent[1], OutboundEvent::Typing { chat_id: chat.clone() });
    assert_eq!(
        sent[2],
        OutboundEvent::DeleteMessage {
            chat_id: chat.clone(),
            message_id: MessageId::new("m9"),
        }
    );
    assert_eq!(sent[3], OutboundEvent::JoinChat { chat_id: chat });
}

#[tokio::test]
async fn test_mark_as_read_flips_local_copy_and_notifies_server() {
    let (client, _join, script) = spawn_client(None);
    let chat = ChatId::new("c1");
    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;

    script.push_event("new_message", message_payload("m1", "c1", "peer", "one"));
    script.push_event("new_message", message_payload("m2", "c1", "peer", "two"));
    wait_for_message_count(&client, &chat, 2).await;

    client.mark_as_read(chat.clone());
    let messages = client.messages(chat.clone()).await.unwrap();
    assert!(messages.iter().all(|m| m.seen));
    assert!(script
        .sent()
        .contains(&OutboundEvent::MarkRead { chat_id: chat }));
}

#[tokio::test]
async fn test_mark_as_read_while_disconnected_flips_local_copy_only() {
    let history = StubHistory::new(vec![vec![
        message("m1", "c1", "one"),
        message("m2", "c1", "two"),
    ]]);
    let (client, _join, script) = spawn_client(Some(history));
    let chat = ChatId::new("c1");

    let loaded = client.load_history(chat.clone(), 50, 0).await.unwrap();
    assert_eq!(loaded, 2);

    // Offline read: the local cache reflects it, the server is not told
    client.mark_as_read(chat.clone());
    let messages = client.messages(chat.clone()).await.unwrap();
    assert!(messages.iter().all(|m| m.seen));
    assert!(script.sent().is_empty());
    assert_eq!(client.stats().await.unwrap().commands_dropped, 1);
}

// ----------------------------------------------------------------------------
// Inbound Events
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_duplicate_push_delivery_is_absorbed() {
    let (client, _join, script) = spawn_client(None);
    let deliveries = Arc::new(AtomicUsize::new(0));
    let sink = deliveries.clone();
    client.router().subscribe_messages(move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;

    // Same id three times: optimistic echo plus redelivery after reconnect
    for _ in 0..3 {
        script.push_event("new_message", message_payload("m1", "c1", "peer", "hi"));
    }
    let mut received = 0;
    for _ in 0..500 {
        received = client.stats().await.unwrap().events_received;
        if received == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(received, 3);

    let messages = client.messages(ChatId::new("c1")).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(deliveries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_decode_failure_is_dropped_without_dispatch() {
    let (client, _join, script) = spawn_client(None);
    let deliveries = Arc::new(AtomicUsize::new(0));
    let sink = deliveries.clone();
    client.router().subscribe_messages(move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;

    // Missing id: must never reach a listener or the store
    script.push_event(
        "new_message",
        serde_json::json!({ "chatId": "c1", "senderId": "peer", "content": "ghost" }),
    );
    script.push_event("presence_update", serde_json::json!({}));

    let mut decode_failures = 0;
    for _ in 0..500 {
        decode_failures = client.stats().await.unwrap().decode_failures;
        if decode_failures == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(decode_failures, 2);

    assert_eq!(deliveries.load(Ordering::SeqCst), 0);
    assert!(client.messages(ChatId::new("c1")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_message_deleted_removes_and_fans_out() {
    let (client, _join, script) = spawn_client(None);
    let deletions: Arc<Mutex<Vec<(ChatId, MessageId)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = deletions.clone();
    client.router().subscribe_deletions(move |deletion| {
        sink.lock().unwrap().push(deletion.clone());
    });

    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;

    script.push_event("new_message", message_payload("m1", "c1", "peer", "hi"));
    script.push_event(
        "message_deleted",
        serde_json::json!({ "messageId": "m1", "chatId": "c1" }),
    );
    eventually("deletion dispatched", || !deletions.lock().unwrap().is_empty()).await;

    assert_eq!(
        deletions.lock().unwrap()[0],
        (ChatId::new("c1"), MessageId::new("m1"))
    );
    assert!(client.messages(ChatId::new("c1")).await.unwrap().is_empty());
}

// ----------------------------------------------------------------------------
// Typing Indicator
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_typing_starts_and_expires() {
    let (client, _join, script) = spawn_client(None);
    let events: Arc<Mutex<Vec<TypingEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    client.router().subscribe_typing(move |event| {
        sink.lock().unwrap().push(event.clone());
    });

    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;
    client.watch_chat(ChatId::new("c1"));
    let _ = client.stats().await.unwrap(); // barrier: watch command processed

    script.push_event("user_typing", serde_json::json!({ "chatId": "c1", "userId": "peer" }));
    eventually("typing started", || !events.lock().unwrap().is_empty()).await;
    assert_eq!(
        events.lock().unwrap()[0],
        TypingEvent::Started {
            chat_id: ChatId::new("c1"),
            user_id: UserId::new("peer"),
        }
    );

    // With no refresh the 3 s deadline fires and the indicator goes hidden
    eventually("typing stopped", || {
        events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, TypingEvent::Stopped { .. }))
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_self_and_unwatched_typing_are_ignored() {
    let (client, _join, script) = spawn_client(None);
    let events: Arc<Mutex<Vec<TypingEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    client.router().subscribe_typing(move |event| {
        sink.lock().unwrap().push(event.clone());
    });

    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;
    client.watch_chat(ChatId::new("c1"));
    let _ = client.stats().await.unwrap(); // barrier: watch command processed

    // Local user typing and typing in an unwatched chat: both ignored
    script.push_event("user_typing", serde_json::json!({ "chatId": "c1", "userId": "me" }));
    script.push_event("user_typing", serde_json::json!({ "chatId": "c2", "userId": "peer" }));
    // A real one afterwards serves as the ordering barrier
    script.push_event("user_typing", serde_json::json!({ "chatId": "c1", "userId": "peer" }));

    eventually("real typing dispatched", || !events.lock().unwrap().is_empty()).await;
    let seen = events.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!(matches!(&seen[0], TypingEvent::Started { user_id, .. } if user_id.as_str() == "peer"));
}

// ----------------------------------------------------------------------------
// History Seeding
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_history_load_replaces_then_push_appends() {
    let history = StubHistory::new(vec![vec![
        message("m1", "c1", "first"),
        message("m2", "c1", "second"),
    ]]);
    let (client, _join, script) = spawn_client(Some(history));
    let chat = ChatId::new("c1");

    let loaded = client.load_history(chat.clone(), 50, 0).await.unwrap();
    assert_eq!(loaded, 2);

    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;

    // A pushed duplicate of a history row is absorbed; a new one appends
    script.push_event("new_message", message_payload("m2", "c1", "peer", "second"));
    script.push_event("new_message", message_payload("m3", "c1", "peer", "third"));
    wait_for_message_count(&client, &chat, 3).await;

    let messages = client.messages(chat).await.unwrap();
    let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2", "m3"]);
}

#[tokio::test]
async fn test_history_without_service_is_a_configuration_error() {
    let (client, _join, _script) = spawn_client(None);
    let result = client.load_history(ChatId::new("c1"), 50, 0).await;
    assert!(matches!(result, Err(PushChatError::Configuration { .. })));
}
