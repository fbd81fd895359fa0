//! Error types for the synchronization core.

use thiserror::Error;

use super::lifecycle::{ConnectionState, InvalidTransition};
use super::turn::MoveRejection;

/// Failure reported by a [`HubTransport`](super::transport::HubTransport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced to callers of the connection manager and session.
#[derive(Debug, Error)]
pub enum HubError {
    /// The initial connect failed. Not retried automatically.
    #[error("failed to connect to multiplayer server: {source}")]
    Connection {
        #[source]
        source: TransportError,
    },

    /// An RPC was attempted while not connected.
    #[error("not connected to the game hub (connection is {state})")]
    NotConnected { state: ConnectionState },

    /// The transport rejected a sent RPC.
    #[error("hub call `{method}` failed: {source}")]
    Invocation {
        method: String,
        #[source]
        source: TransportError,
    },

    /// A hub payload did not have the expected shape.
    #[error("malformed `{event}` payload: {source}")]
    ProtocolMismatch {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("move not sent: {0}")]
    MoveNotAllowed(#[from] MoveRejection),

    #[error("please enter your name")]
    MissingPlayerName,

    #[error("player name must be at most {max} characters")]
    PlayerNameTooLong { max: usize },

    #[error("already in game {game_id}")]
    AlreadyInGame { game_id: String },

    #[error("no active game")]
    NoActiveGame,
}
