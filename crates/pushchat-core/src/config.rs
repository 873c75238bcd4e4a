//! Configuration for the sync runtime
//!
//! Consolidates the tunables of the client core: reconnection policy, typing
//! indicator window and channel buffer sizes. Defaults match the production
//! server's expectations; `validate()` is called once when the runtime is
//! built.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::typing::TYPING_VISIBLE_MS;

// ----------------------------------------------------------------------------
// Reconnection Configuration
// ----------------------------------------------------------------------------

/// Automatic reconnection policy for the push connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Maximum consecutive reconnection attempts before giving up
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Ceiling for the exponential backoff
    pub max_backoff: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl ReconnectConfig {
    /// Backoff before the given attempt (1-based), doubling up to the ceiling
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

// ----------------------------------------------------------------------------
// Typing Configuration
// ----------------------------------------------------------------------------

/// Typing indicator behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingConfig {
    /// How long the indicator stays visible after the last typing event
    pub visible_ms: u64,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            visible_ms: TYPING_VISIBLE_MS,
        }
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the runtime's channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Buffer for commands (handle → sync task)
    pub command_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 64,
        }
    }
}

// ----------------------------------------------------------------------------
// Sync Configuration
// ----------------------------------------------------------------------------

/// Top-level configuration for a sync runtime instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    pub reconnect: ReconnectConfig,
    pub typing: TypingConfig,
    pub channels: ChannelConfig,
}

impl SyncConfig {
    /// Validate the configuration, returning a human-readable reason on
    /// failure
    pub fn validate(&self) -> Result<(), String> {
        if self.reconnect.max_attempts == 0 {
            return Err("reconnect.max_attempts must be at least 1".to_string());
        }
        if self.reconnect.initial_backoff.is_zero() {
            return Err("reconnect.initial_backoff must be non-zero".to_string());
        }
        if self.reconnect.max_backoff < self.reconnect.initial_backoff {
            return Err("reconnect.max_backoff must be >= initial_backoff".to_string());
        }
        if self.typing.visible_ms == 0 {
            return Err("typing.visible_ms must be non-zero".to_string());
        }
        if self.channels.command_buffer_size == 0 {
            return Err("channels.command_buffer_size must be non-zero".to_string());
        }
        Ok(())
    }

    /// Configuration tuned for fast tests
    pub fn testing() -> Self {
        Self {
            reconnect: ReconnectConfig {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(10),
                max_backoff: Duration::from_millis(50),
            },
            typing: TypingConfig::default(),
            channels: ChannelConfig {
                command_buffer_size: 16,
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
