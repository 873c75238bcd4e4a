//! The single-writer sync task
//!
//! All mutation of the message store, the typing tracker and the connection
//! state happens on this task: handles enqueue commands, the transport
//! enqueues signals, and one `tokio::select!` loop drains both alongside the
//! pending timer deadlines (typing expiry, reconnect backoff). Inbound
//! decode failures are logged and dropped here, before any listener runs.

use std::sync::Arc;
use std::time::Duration;

use pushchat_core::{
    wire::{decode_inbound, InboundEvent},
    ChatId, ConnectionEvent, EventRouter, HistoryService, MessageStore, OutboundEvent,
    PushChatError, PushTransport, Result, SessionProvider, SyncConfig, TransportSignal,
    TypingEvent, TypingTracker,
};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::command::Command;
use crate::connection::{ConnectionState, ReconnectSchedule};

// ----------------------------------------------------------------------------
// Task Statistics
// ----------------------------------------------------------------------------

/// Counters kept by the sync task, mostly for logging and tests
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Inbound named events received from the transport
    pub events_received: u64,
    /// Inbound events dropped because their payload failed to decode
    pub decode_failures: u64,
    /// Outbound commands dropped because the connection was not live
    pub commands_dropped: u64,
    /// Reconnect attempts fired
    pub reconnect_attempts: u64,
}

// ----------------------------------------------------------------------------
// Sync Task
// ----------------------------------------------------------------------------

/// Owner of the transport and all mutable synchronization state
pub(crate) struct SyncTask {
    transport: Box<dyn PushTransport>,
    session: Arc<dyn SessionProvider>,
    history: Option<Arc<dyn HistoryService>>,
    router: Arc<EventRouter>,
    store: MessageStore,
    typing: TypingTracker,
    state: ConnectionState,
    reconnect: ReconnectSchedule,
    command_receiver: mpsc::Receiver<Command>,
    status_sender: watch::Sender<ConnectionState>,
    /// Baseline for the tracker's millisecond clock
    epoch: Instant,
    stats: SyncStats,
    running: bool,
}

impl SyncTask {
    pub(crate) fn new(
        transport: Box<dyn PushTransport>,
        session: Arc<dyn SessionProvider>,
        history: Option<Arc<dyn HistoryService>>,
        router: Arc<EventRouter>,
        config: &SyncConfig,
        command_receiver: mpsc::Receiver<Command>,
        status_sender: watch::Sender<ConnectionState>,
    ) -> Self {
        let typing = TypingTracker::with_ttl(session.user_id(), config.typing.visible_ms);
        Self {
            transport,
            session,
            history,
            router,
            store: MessageStore::new(),
            typing,
            state: ConnectionState::Disconnected,
            reconnect: ReconnectSchedule::new(config.reconnect.clone()),
            command_receiver,
            status_sender,
            epoch: Instant::now(),
            stats: SyncStats::default(),
            running: true,
        }
    }

    /// Run the sync loop until shutdown or all handles are dropped
    pub(crate) async fn run(mut self) -> Result<()> {
        info!("sync task starting");

        while self.running {
            let wake = self.next_wake();
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            info!("all handles dropped, shutting down sync task");
                            break;
                        }
                    }
                }

                signal = self.transport.next_signal(),
                    if self.state == ConnectionState::Connected =>
                {
                    match signal {
                        Some(sig) => self.handle_signal(sig),
                        // A finished stream while Connected is an unsolicited close
                        None => self.handle_signal(TransportSignal::Closed {
                            reason: "transport stream ended".to_string(),
                        }),
                    }
                }

                _ = sleep_until(wake.unwrap_or_else(Instant::now)), if wake.is_some() => {
                    self.handle_deadlines().await;
                }
            }
        }

        let _ = self.transport.close().await;
        self.set_state(ConnectionState::Disconnected);
        info!("sync task stopped");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Command handling
    // ------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect().await,
            Command::Disconnect => self.disconnect().await,
            Command::SendMessage {
                chat_id,
                content,
                kind,
            } => {
                self.emit_gated(OutboundEvent::SendMessage {
                    chat_id,
                    content,
                    kind,
                })
                .await
            }
            Command::SendTyping { chat_id } => {
                self.emit_gated(OutboundEvent::Typing { chat_id }).await
            }
            Command::DeleteMessage {
                chat_id,
                message_id,
            } => {
                self.emit_gated(OutboundEvent::DeleteMessage {
                    chat_id,
                    message_id,
                })
                .await
            }
            Command::MarkAsRead { chat_id } => {
                // Local flip always happens; the server is told only when live
                self.store.mark_all_read(&chat_id);
                self.emit_gated(OutboundEvent::MarkRead { chat_id }).await;
            }
            Command::JoinChat { chat_id } => {
                self.emit_gated(OutboundEvent::JoinChat { chat_id }).await
            }
            Command::WatchChat { chat_id } => self.typing.watch(chat_id),
            Command::UnwatchChat => self.typing.unwatch(),
            Command::LoadHistory {
                chat_id,
                limit,
                offset,
                reply,
            } => {
                let result = self.load_history(chat_id, limit, offset).await;
                let _ = reply.send(result);
            }
            Command::GetMessages { chat_id, reply } => {
                let _ = reply.send(self.store.messages(&chat_id));
            }
            Command::ClearConversation { chat_id } => {
                self.store.clear_conversation(&chat_id);
            }
            Command::GetStats { reply } => {
                let _ = reply.send(self.stats.clone());
            }
            Command::Shutdown => self.running = false,
        }
    }

    async fn connect(&mut self) {
        if self.state.connect_is_noop() {
            debug!(state = ?self.state, "connect ignored, connection already live");
            return;
        }
        self.reconnect.reset();
        self.try_open().await;
    }

    async fn disconnect(&mut self) {
        // Cancels any pending reconnect attempt as well
        self.reconnect.reset();
        if self.state == ConnectionState::Disconnected {
            return;
        }
        if let Err(e) = self.transport.close().await {
            debug!(error = %e, "transport close reported an error");
        }
        self.set_state(ConnectionState::Disconnected);
        self.router
            .dispatch_connection(&ConnectionEvent::Disconnected);
    }

    async fn try_open(&mut self) {
        self.set_state(ConnectionState::Connecting);
        let token = self.session.auth_token();
        match self.transport.open(&token).await {
            Ok(()) => {
                self.reconnect.reset();
                self.set_state(ConnectionState::Connected);
                self.router.dispatch_connection(&ConnectionEvent::Connected);
            }
            Err(e) => {
                warn!(error = %e, "connect attempt failed");
                self.router.dispatch_connection(&ConnectionEvent::Error {
                    reason: e.to_string(),
                });
                self.schedule_reconnect();
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        match self.reconnect.schedule(Instant::now()) {
            Some(attempt) => {
                debug!(attempt, "scheduling reconnect attempt");
                self.set_state(ConnectionState::Reconnecting { attempt });
            }
            None => {
                let attempts = self.reconnect.max_attempts();
                error!(attempts, "reconnection attempts exhausted");
                self.set_state(ConnectionState::Failed);
                self.router
                    .dispatch_connection(&ConnectionEvent::Failed { attempts });
            }
        }
    }

    async fn emit_gated(&mut self, event: OutboundEvent) {
        if !self.state.can_emit() {
            self.stats.commands_dropped += 1;
            debug!(
                event = event.name(),
                state = ?self.state,
                "dropping outbound command while not connected"
            );
            return;
        }
        if let Err(e) = self.transport.emit(event).await {
            warn!(error = %e, "outbound emit failed");
            self.router.dispatch_connection(&ConnectionEvent::Error {
                reason: e.to_string(),
            });
        }
    }

    async fn load_history(&mut self, chat_id: ChatId, limit: u32, offset: u32) -> Result<usize> {
        let history = self
            .history
            .clone()
            .ok_or_else(|| PushChatError::config_error("no history service configured"))?;
        let messages = history.fetch_messages(&chat_id, limit, offset).await?;
        let count = messages.len();
        debug!(chat = %chat_id, count, "seeding store from history");
        self.store.set_messages(chat_id, messages);
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Transport signal handling
    // ------------------------------------------------------------------

    fn handle_signal(&mut self, signal: TransportSignal) {
        match signal {
            // Transports whose open() already completed report this
            // redundantly; only act on a state change
            TransportSignal::Opened => {
                if self.state != ConnectionState::Connected {
                    self.reconnect.reset();
                    self.set_state(ConnectionState::Connected);
                    self.router.dispatch_connection(&ConnectionEvent::Connected);
                }
            }
            TransportSignal::Closed { reason } => {
                warn!(%reason, "push connection closed");
                self.router
                    .dispatch_connection(&ConnectionEvent::Disconnected);
                self.schedule_reconnect();
            }
            TransportSignal::ConnectError { reason } => {
                self.router
                    .dispatch_connection(&ConnectionEvent::Error { reason });
            }
            TransportSignal::Event { name, payload } => self.handle_event(&name, payload),
        }
    }

    fn handle_event(&mut self, name: &str, payload: serde_json::Value) {
        self.stats.events_received += 1;
        match decode_inbound(name, &payload) {
            Err(e) => {
                self.stats.decode_failures += 1;
                warn!(event = name, error = %e, "dropping malformed inbound event");
            }
            Ok(InboundEvent::NewMessage(message)) => {
                // Fan out only on first arrival; echo/redelivery duplicates
                // are absorbed by the store
                if self.store.add_message(message.clone()) {
                    self.router.dispatch_message(&message);
                }
            }
            Ok(InboundEvent::MessageDeleted {
                chat_id,
                message_id,
            }) => {
                self.store.remove_message(&chat_id, &message_id);
                self.router.dispatch_deletion(chat_id, message_id);
            }
            Ok(InboundEvent::UserTyping { chat_id, user_id }) => {
                let now = self.now_millis();
                if self.typing.observe(&chat_id, &user_id, now) {
                    self.router
                        .dispatch_typing(&TypingEvent::Started { chat_id, user_id });
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Timer deadlines
    // ------------------------------------------------------------------

    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn next_wake(&self) -> Option<Instant> {
        let typing = self
            .typing
            .next_deadline()
            .map(|ms| self.epoch + Duration::from_millis(ms));
        match (typing, self.reconnect.next_at()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    async fn handle_deadlines(&mut self) {
        for chat_id in self.typing.expire(self.now_millis()) {
            self.router
                .dispatch_typing(&TypingEvent::Stopped { chat_id });
        }

        if self.reconnect.is_due(Instant::now()) {
            if let Some(attempt) = self.reconnect.take_due() {
                self.stats.reconnect_attempts += 1;
                debug!(attempt, "reconnect attempt firing");
                self.try_open().await;
            }
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "connection state change");
            self.state = state;
            let _ = self.status_sender.send(state);
        }
    }
}
