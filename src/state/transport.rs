//! Duplex transport abstraction.
//!
//! The connection manager drives a [`HubTransport`] and never touches the
//! network itself. Production code plugs in a WebSocket/long-polling hub
//! client; tests use a scripted transport.

use async_trait::async_trait;
use serde_json::Value;

use super::error::TransportError;

static NULL_PAYLOAD: Value = Value::Null;

/// One push message received from the hub.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Event name, e.g. `MoveMade`
    pub target: String,
    /// Positional arguments; events carry their payload in the first one
    pub arguments: Vec<Value>,
}

impl InboundMessage {
    pub fn new(target: impl Into<String>, payload: Value) -> Self {
        Self {
            target: target.into(),
            arguments: vec![payload],
        }
    }

    /// The event payload, `null` when the hub sent none.
    pub fn payload(&self) -> &Value {
        self.arguments.first().unwrap_or(&NULL_PAYLOAD)
    }
}

/// Persistent duplex channel to the game hub.
///
/// `start` is called for the initial connect and again for each reconnect
/// attempt. `recv` returning `None` means the channel dropped.
#[async_trait]
pub trait HubTransport: Send {
    /// Open the channel.
    async fn start(&mut self) -> Result<(), TransportError>;

    /// Close the channel.
    async fn stop(&mut self) -> Result<(), TransportError>;

    /// Send one RPC and wait for the hub to accept it.
    async fn invoke(&mut self, method: &str, arguments: Vec<Value>) -> Result<(), TransportError>;

    /// Wait for the next push message.
    ///
    /// Must be cancel safe: a message is never lost when the returned future
    /// is dropped before completing.
    async fn recv(&mut self) -> Option<InboundMessage>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted transport for tests.

    use std::collections::VecDeque;

    use super::*;

    /// Plays back scripted results.
    ///
    /// - `start_results` are consumed per `start`; when empty, `start` succeeds
    /// - `inbound` is consumed per `recv`; `None` entries and an empty queue
    ///   both read as a dropped channel
    /// - `invoke_results` are consumed per `invoke`; when empty, `invoke` succeeds
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedTransport {
        pub start_results: VecDeque<Result<(), TransportError>>,
        pub inbound: VecDeque<Option<InboundMessage>>,
        pub invoke_results: VecDeque<Result<(), TransportError>>,
        pub invocations: Vec<(String, Vec<Value>)>,
        pub starts: usize,
        pub stops: usize,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_start(mut self, message: &str) -> Self {
            self.start_results
                .push_back(Err(TransportError::new(message)));
            self
        }

        pub fn succeed_start(mut self) -> Self {
            self.start_results.push_back(Ok(()));
            self
        }

        pub fn push(&mut self, target: &str, payload: Value) {
            self.inbound
                .push_back(Some(InboundMessage::new(target, payload)));
        }

        pub fn push_drop(&mut self) {
            self.inbound.push_back(None);
        }

        pub fn methods(&self) -> Vec<&str> {
            self.invocations.iter().map(|(m, _)| m.as_str()).collect()
        }
    }

    #[async_trait]
    impl HubTransport for ScriptedTransport {
        async fn start(&mut self) -> Result<(), TransportError> {
            self.starts += 1;
            self.start_results.pop_front().unwrap_or(Ok(()))
        }

        async fn stop(&mut self) -> Result<(), TransportError> {
            self.stops += 1;
            Ok(())
        }

        async fn invoke(
            &mut self,
            method: &str,
            arguments: Vec<Value>,
        ) -> Result<(), TransportError> {
            self.invocations.push((method.to_string(), arguments));
            self.invoke_results.pop_front().unwrap_or(Ok(()))
        }

        async fn recv(&mut self) -> Option<InboundMessage> {
            self.inbound.pop_front().flatten()
        }
    }
}
