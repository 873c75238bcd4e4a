//! Connection lifecycle state machine
//!
//! Exactly one push connection exists per runtime instance. The sync task
//! owns the transport and this state; everyone else observes it through a
//! `watch` channel. Reconnection is bounded and scheduled as a deadline
//! inside the task's select loop so an explicit disconnect can always cancel
//! a pending attempt.

use pushchat_core::ReconnectConfig;
use tokio::time::Instant;

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Lifecycle of the single push connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the backoff before the given attempt (1-based)
    Reconnecting { attempt: u32 },
    /// Reconnection attempts exhausted; stays here until an explicit connect
    Failed,
}

impl ConnectionState {
    /// Whether a `connect` request should be treated as a no-op
    pub fn connect_is_noop(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connected
                | ConnectionState::Connecting
                | ConnectionState::Reconnecting { .. }
        )
    }

    /// Whether outbound commands may be emitted
    pub fn can_emit(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

// ----------------------------------------------------------------------------
// Reconnect Schedule
// ----------------------------------------------------------------------------

/// Bounded-attempt reconnect bookkeeping for the sync task
#[derive(Debug)]
pub(crate) struct ReconnectSchedule {
    config: ReconnectConfig,
    /// Next attempt number, 1-based; 0 when idle
    attempt: u32,
    /// When the next attempt fires, if one is pending
    next_at: Option<Instant>,
}

impl ReconnectSchedule {
    pub(crate) fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempt: 0,
            next_at: None,
        }
    }

    /// Schedule the next attempt; returns `None` when the budget is spent
    pub(crate) fn schedule(&mut self, now: Instant) -> Option<u32> {
        if self.attempt >= self.config.max_attempts {
            self.reset();
            return None;
        }
        self.attempt += 1;
        self.next_at = Some(now + self.config.backoff_for_attempt(self.attempt));
        Some(self.attempt)
    }

    /// Deadline of the pending attempt, if any
    pub(crate) fn next_at(&self) -> Option<Instant> {
        self.next_at
    }

    /// True once the pending deadline has passed
    pub(crate) fn is_due(&self, now: Instant) -> bool {
        self.next_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Consume the pending deadline (the attempt is being made now)
    pub(crate) fn take_due(&mut self) -> Option<u32> {
        self.next_at.take().map(|_| self.attempt)
    }

    /// Total attempts allowed
    pub(crate) fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Cancel any pending attempt and reset the budget (explicit disconnect
    /// or successful connect)
    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
        self.next_at = None;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
