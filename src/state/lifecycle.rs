//! Connection lifecycle state machine.
//!
//! Validates every change of [`ConnectionState`]. The connection manager is
//! the only owner; everyone else reads the state.
//!
//! # Transitions
//!
//! ```text
//! Disconnected   ──connect──────▶ Connecting
//! Connecting     ──established──▶ Connected
//! Connecting     ──failed───────▶ Disconnected
//! Connected      ──dropped──────▶ Reconnecting
//! Reconnecting   ──established──▶ Connected
//! Reconnecting   ──failed───────▶ Disconnected   (attempts exhausted)
//! Connecting  ┐
//! Connected   ├──stop───────────▶ Disconnecting
//! Reconnecting┘
//! Disconnecting  ──stopped──────▶ Disconnected
//! ```

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Connection state of the duplex channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnecting => "Disconnecting",
            Self::Reconnecting => "Reconnecting",
        }
    }

    /// Check if RPCs may be sent.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if the channel is up or being brought up.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }

    /// Apply an event, returning the new state or an error.
    pub fn apply(self, event: LifecycleEvent) -> Result<Self, InvalidTransition> {
        use ConnectionState::*;
        use LifecycleEvent::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self,
            event,
            reason,
        };

        match (self, event) {
            (Disconnected, Connect) => Ok(Connecting),
            (Disconnecting, Connect) => Err(invalid("Still disconnecting")),
            (_, Connect) => Err(invalid("Connection already active")),

            (Connecting | Reconnecting, Established) => Ok(Connected),
            (_, Established) => Err(invalid("No connection attempt in flight")),

            (Connected, Dropped) => Ok(Reconnecting),
            (_, Dropped) => Err(invalid("Not connected")),

            (Connecting | Reconnecting, Failed) => Ok(Disconnected),
            (_, Failed) => Err(invalid("No connection attempt in flight")),

            (Connecting | Connected | Reconnecting, Stop) => Ok(Disconnecting),
            (Disconnecting, Stop) => Err(invalid("Already disconnecting")),
            (Disconnected, Stop) => Err(invalid("Already disconnected")),

            (Disconnecting, Stopped) => Ok(Disconnected),
            (_, Stopped) => Err(invalid("Not disconnecting")),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle transition events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Caller asked to connect
    Connect,
    /// Transport came up (first time or after a reconnect)
    Established,
    /// Transport went away without being asked to
    Dropped,
    /// Connect attempt failed, or reconnect attempts ran out
    Failed,
    /// Caller asked to disconnect
    Stop,
    /// Transport finished shutting down
    Stopped,
}

/// Error when a lifecycle transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid connection transition from {from} via {event:?}: {reason}")]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub event: LifecycleEvent,
    pub reason: &'static str,
}
