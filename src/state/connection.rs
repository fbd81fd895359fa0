//! Connection management.
//!
//! [`ConnectionManager`] owns the hub transport and its lifecycle state. It
//! connects on request, reconnects on an unexpected drop following a fixed
//! schedule, and turns inbound hub messages into [`ProtocolEvent`]s.
//!
//! Events are pulled one at a time with [`ConnectionManager::next_event`].
//! Lifecycle notifications (`Reconnecting`, `Reconnected`,
//! `ConnectionClosed`) come out of the same call, in the order they happen.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::config::ReconnectPolicy;
use super::error::HubError;
use super::lifecycle::{ConnectionState, LifecycleEvent};
use super::protocol::{HubCall, HubFault, ProtocolEvent};
use super::transport::HubTransport;

/// Identifies one established channel; changes on every (re)connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Snapshot of connection internals for troubleshooting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionDiagnostics {
    pub hub_url: String,
    pub state: ConnectionState,
    pub connection_id: Option<ConnectionId>,
    /// 1-based attempt number while reconnecting
    pub reconnect_attempt: Option<usize>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReconnectPhase {
    /// Sleeping until the attempt is due
    Waiting,
    /// Announced, transport start pending
    Attempting,
}

#[derive(Debug, Clone, Copy)]
struct ReconnectCycle {
    dropped_at: Instant,
    attempt: usize,
    phase: ReconnectPhase,
}

/// Owns the duplex channel and its lifecycle.
pub struct ConnectionManager<T> {
    transport: T,
    state: ConnectionState,
    policy: ReconnectPolicy,
    hub_url: String,
    connections: u64,
    reconnect: Option<ReconnectCycle>,
    last_error: Option<String>,
}

impl<T: fmt::Debug> fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("transport", &self.transport)
            .field("state", &self.state)
            .field("hub_url", &self.hub_url)
            .field("connections", &self.connections)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

impl<T: HubTransport> ConnectionManager<T> {
    pub fn new(transport: T, hub_url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            policy,
            hub_url: hub_url.into(),
            connections: 0,
            reconnect: None,
            last_error: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    /// Handle of the live channel, if connected.
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.state
            .is_connected()
            .then_some(ConnectionId(self.connections))
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn diagnostics(&self) -> ConnectionDiagnostics {
        ConnectionDiagnostics {
            hub_url: self.hub_url.clone(),
            state: self.state,
            connection_id: self.connection_id(),
            reconnect_attempt: self.reconnect.map(|cycle| cycle.attempt + 1),
            last_error: self.last_error.clone(),
        }
    }

    /// Open the channel.
    ///
    /// Already connected: returns the existing handle. A failed first
    /// attempt is reported and not retried.
    pub async fn connect(&mut self) -> Result<ConnectionId, HubError> {
        if let Some(id) = self.connection_id() {
            debug!(connection = %id, "Already connected");
            return Ok(id);
        }

        self.state = self.state.apply(LifecycleEvent::Connect)?;
        info!(url = %self.hub_url, "Connecting to game hub");

        match self.transport.start().await {
            Ok(()) => {
                self.advance(LifecycleEvent::Established);
                self.connections += 1;
                self.last_error = None;
                let id = ConnectionId(self.connections);
                info!(url = %self.hub_url, connection = %id, "Connected to game hub");
                Ok(id)
            }
            Err(source) => {
                self.advance(LifecycleEvent::Failed);
                error!(url = %self.hub_url, error = %source, "Failed to connect to game hub");
                self.last_error = Some(source.to_string());
                Err(HubError::Connection { source })
            }
        }
    }

    /// Close the channel. Does nothing if already disconnected.
    pub async fn disconnect(&mut self) {
        if matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Disconnecting
        ) {
            return;
        }

        self.advance(LifecycleEvent::Stop);
        self.reconnect = None;

        if let Err(err) = self.transport.stop().await {
            warn!(error = %err, "Error stopping hub connection");
        }

        self.advance(LifecycleEvent::Stopped);
        info!(url = %self.hub_url, "Disconnected from game hub");
    }

    /// Send an RPC. Only allowed while connected.
    pub async fn invoke(&mut self, method: &str, arguments: Vec<Value>) -> Result<(), HubError> {
        if !self.state.is_connected() {
            return Err(HubError::NotConnected { state: self.state });
        }

        debug!(method, "Invoking hub method");
        self.transport
            .invoke(method, arguments)
            .await
            .map_err(|source| {
                error!(method, error = %source, "Hub invocation failed");
                HubError::Invocation {
                    method: method.to_string(),
                    source,
                }
            })
    }

    /// Send a typed RPC.
    pub async fn call(&mut self, call: &HubCall) -> Result<(), HubError> {
        self.invoke(call.method(), call.arguments()).await
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the manager is disconnected, either because it was
    /// never connected, was told to disconnect, or ran out of reconnect
    /// attempts (in which case `ConnectionClosed` is returned first).
    ///
    /// # Cancel safety
    ///
    /// Cancel safe as long as the transport's `recv` is. The reconnect cycle
    /// lives on the manager, so dropping this future mid-sleep or mid-attempt
    /// and calling again resumes at the same deadline or retries the same
    /// attempt without announcing it twice. This lets a caller race it
    /// against its own command source in `tokio::select!`.
    pub async fn next_event(&mut self) -> Option<ProtocolEvent> {
        loop {
            match self.state {
                ConnectionState::Connected => {
                    if let Some(event) = self.receive().await {
                        return Some(event);
                    }
                }
                ConnectionState::Reconnecting => {
                    if let Some(event) = self.reconnect_step().await {
                        return Some(event);
                    }
                }
                _ => return None,
            }
        }
    }

    /// Read one message. `None` means nothing to hand out yet.
    async fn receive(&mut self) -> Option<ProtocolEvent> {
        let Some(message) = self.transport.recv().await else {
            return self.on_dropped();
        };

        match ProtocolEvent::decode(&message.target, message.payload()) {
            Ok(Some(event)) => Some(event),
            Ok(None) => {
                debug!(event = %message.target, "Ignoring unrecognised hub event");
                None
            }
            Err(err) => {
                warn!(event = %message.target, error = %err, "Malformed hub payload");
                Some(ProtocolEvent::Error(HubFault {
                    message: err.to_string(),
                }))
            }
        }
    }

    fn on_dropped(&mut self) -> Option<ProtocolEvent> {
        warn!(url = %self.hub_url, "Hub connection lost");
        self.advance(LifecycleEvent::Dropped);

        if self.policy.attempts() == 0 {
            self.advance(LifecycleEvent::Failed);
            return Some(ProtocolEvent::ConnectionClosed);
        }

        self.reconnect = Some(ReconnectCycle {
            dropped_at: Instant::now(),
            attempt: 0,
            phase: ReconnectPhase::Waiting,
        });
        None
    }

    /// Advance the reconnect cycle by one phase.
    async fn reconnect_step(&mut self) -> Option<ProtocolEvent> {
        let Some(mut cycle) = self.reconnect else {
            self.advance(LifecycleEvent::Failed);
            return Some(ProtocolEvent::ConnectionClosed);
        };
        let attempt = cycle.attempt + 1;

        match cycle.phase {
            ReconnectPhase::Waiting => {
                let delay = self.policy.delay(cycle.attempt).unwrap_or_default();
                tokio::time::sleep_until(cycle.dropped_at + delay).await;
                cycle.phase = ReconnectPhase::Attempting;
                self.reconnect = Some(cycle);
                info!(attempt, url = %self.hub_url, "Reconnecting to game hub");
                Some(ProtocolEvent::Reconnecting { attempt })
            }
            ReconnectPhase::Attempting => match self.transport.start().await {
                Ok(()) => {
                    self.reconnect = None;
                    self.advance(LifecycleEvent::Established);
                    self.connections += 1;
                    self.last_error = None;
                    info!(attempt, connection = %ConnectionId(self.connections), "Reconnected to game hub");
                    Some(ProtocolEvent::Reconnected)
                }
                Err(err) => {
                    warn!(attempt, error = %err, "Reconnect attempt failed");
                    self.last_error = Some(err.to_string());

                    if attempt < self.policy.attempts() {
                        cycle.attempt = attempt;
                        cycle.phase = ReconnectPhase::Waiting;
                        self.reconnect = Some(cycle);
                        None
                    } else {
                        self.reconnect = None;
                        self.advance(LifecycleEvent::Failed);
                        error!(attempts = attempt, "Giving up on reconnecting to game hub");
                        Some(ProtocolEvent::ConnectionClosed)
                    }
                }
            },
        }
    }

    fn advance(&mut self, event: LifecycleEvent) {
        match self.state.apply(event) {
            Ok(next) => self.state = next,
            Err(err) => warn!(error = %err, "Ignoring invalid connection transition"),
        }
    }
}
