//! Runtime construction
//!
//! Builds the channels, validates configuration and spawns the sync task.
//! Each built instance is fully independent; tests can run as many as they
//! like side by side.

use std::sync::Arc;

use pushchat_core::{
    EventRouter, HistoryService, PushChatError, PushTransport, Result, SessionProvider,
    SyncConfig,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::connection::ConnectionState;
use crate::handle::PushChatHandle;
use crate::task::SyncTask;

// ----------------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------------

/// Builder for a sync runtime instance
pub struct PushChatBuilder {
    transport: Box<dyn PushTransport>,
    session: Option<Arc<dyn SessionProvider>>,
    history: Option<Arc<dyn HistoryService>>,
    config: SyncConfig,
}

impl PushChatBuilder {
    /// Start building around the transport that will own the push connection
    pub fn new(transport: impl PushTransport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            session: None,
            history: None,
            config: SyncConfig::default(),
        }
    }

    /// Session provider for the auth token and local user id (required)
    pub fn with_session(mut self, session: impl SessionProvider + 'static) -> Self {
        self.session = Some(Arc::new(session));
        self
    }

    /// REST history backend for seeding conversations (optional)
    pub fn with_history(mut self, history: impl HistoryService + 'static) -> Self {
        self.history = Some(Arc::new(history));
        self
    }

    /// Replace the default configuration
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate, spawn the sync task and hand back the client handle
    pub fn spawn(self) -> Result<(PushChatHandle, JoinHandle<Result<()>>)> {
        self.config
            .validate()
            .map_err(|reason| PushChatError::Configuration { reason })?;
        let session = self
            .session
            .ok_or_else(|| PushChatError::config_error("a session provider is required"))?;

        let (command_sender, command_receiver) =
            mpsc::channel(self.config.channels.command_buffer_size);
        let (status_sender, status_receiver) = watch::channel(ConnectionState::Disconnected);
        let router = Arc::new(EventRouter::new());

        let task = SyncTask::new(
            self.transport,
            session,
            self.history,
            router.clone(),
            &self.config,
            command_receiver,
            status_sender,
        );
        let join = tokio::spawn(task.run());

        Ok((
            PushChatHandle::new(command_sender, status_receiver, router),
            join,
        ))
    }
}
