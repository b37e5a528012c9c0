//! Call state machine configuration

use crate::error::{CallError, CallResult};
use crate::DEFAULT_ANSWER_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use voxlink_signaling_core::DEFAULT_INBOUND_CAPACITY;

/// Configuration for one participant's call state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// How long the caller waits in Calling before giving up
    pub answer_timeout: Duration,
    /// Name shown to callees in the invite
    pub display_name: Option<String>,
    /// Capacity of the local command channel
    pub command_buffer: usize,
    /// Capacity of the call event broadcast channel
    pub event_buffer: usize,
    /// Capacity of the inbound envelope channel when attaching to a relay
    pub inbound_buffer: usize,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            answer_timeout: DEFAULT_ANSWER_TIMEOUT,
            display_name: None,
            command_buffer: 32,
            event_buffer: 64,
            inbound_buffer: DEFAULT_INBOUND_CAPACITY,
        }
    }
}

impl CallConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the answer timeout
    pub fn with_answer_timeout(mut self, timeout: Duration) -> Self {
        self.answer_timeout = timeout;
        self
    }

    /// Set the display name carried in outgoing invites
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the command channel capacity
    pub fn with_command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity;
        self
    }

    /// Set the event broadcast capacity
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    /// Set the inbound envelope capacity
    pub fn with_inbound_buffer(mut self, capacity: usize) -> Self {
        self.inbound_buffer = capacity;
        self
    }

    /// Check that every value is usable
    pub fn validate(&self) -> CallResult<()> {
        if self.answer_timeout.is_zero() {
            return Err(CallError::config("answer_timeout must be greater than zero"));
        }
        if self.command_buffer == 0 {
            return Err(CallError::config("command_buffer must be greater than zero"));
        }
        if self.event_buffer == 0 {
            return Err(CallError::config("event_buffer must be greater than zero"));
        }
        if self.inbound_buffer == 0 {
            return Err(CallError::config("inbound_buffer must be greater than zero"));
        }
        Ok(())
    }
}
