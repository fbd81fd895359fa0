//! Game session owner.
//!
//! [`GameSession`] ties one [`ConnectionManager`], one [`EventDispatcher`]
//! and the current [`GameSnapshot`] together. It is what a UI talks to:
//! it validates moves, sends RPCs, folds inbound events into the snapshot,
//! keeps a short list of user-visible notices and forwards every event to
//! subscribed listeners.
//!
//! Each session is an independent value. Two sessions never share
//! listeners, snapshots or connections.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::config::ClientConfig;
use super::connection::{ConnectionDiagnostics, ConnectionId, ConnectionManager};
use super::dispatch::{EventDispatcher, HandlerResult, SubscriptionId};
use super::error::HubError;
use super::game::{reduce, GameSnapshot, Outcome};
use super::lifecycle::ConnectionState;
use super::protocol::{EventKind, HubCall, ProtocolEvent};
use super::transport::HubTransport;
use super::turn::{can_attempt_move, MoveRejection};

/// Status line shown when no game is bound.
pub const NO_ACTIVE_GAME: &str = "No active game";

/// Longest accepted player name, in characters.
pub const MAX_PLAYER_NAME_LEN: usize = 20;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Most recent notices, oldest first.
#[derive(Debug, Clone)]
pub struct NoticeLog {
    entries: VecDeque<Notice>,
    capacity: usize,
    next_id: u64,
}

impl NoticeLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 0,
        }
    }

    /// Append a notice, dropping the oldest when full.
    pub fn push(&mut self, level: NoticeLevel, text: impl Into<String>) -> u64 {
        self.next_id += 1;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Notice {
            id: self.next_id,
            level,
            text: text.into(),
            at: Utc::now(),
        });
        self.next_id
    }

    /// Remove one notice. Returns `false` if it is no longer kept.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|n| n.id != id);
        self.entries.len() != before
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Notice shown for an inbound event.
fn notice_for(event: &ProtocolEvent) -> (NoticeLevel, String) {
    match event {
        ProtocolEvent::GameCreated(bound) => (
            NoticeLevel::Success,
            format!("Game created successfully! Game ID: {}", bound.game_id),
        ),
        ProtocolEvent::GameJoined(_) => (
            NoticeLevel::Success,
            "Successfully joined game! Waiting for opponent...".to_string(),
        ),
        ProtocolEvent::PlayerJoined(joined) => (
            NoticeLevel::Info,
            format!("{} joined the game!", joined.player_name),
        ),
        ProtocolEvent::MoveMade(made) => {
            (NoticeLevel::Info, format!("Move made by {}", made.player_name))
        }
        ProtocolEvent::GameEnded(ended) => {
            let text = match Outcome::from_winner(ended.winner) {
                Outcome::Won(mark) => format!("Game over! {} wins!", mark),
                Outcome::Draw => "Game ended in a draw!".to_string(),
            };
            (NoticeLevel::Success, text)
        }
        ProtocolEvent::MoveRejected(refusal) => (
            NoticeLevel::Error,
            format!("Move rejected: {}", refusal.reason),
        ),
        ProtocolEvent::PlayerLeft(gone) => {
            (NoticeLevel::Warning, format!("{} left the game", gone.player_name))
        }
        ProtocolEvent::PlayerDisconnected(gone) => {
            (NoticeLevel::Warning, format!("{} disconnected", gone.player_name))
        }
        ProtocolEvent::Error(fault) => (NoticeLevel::Error, format!("Error: {}", fault.message)),
        ProtocolEvent::JoinGameFailed(refusal) => (
            NoticeLevel::Error,
            format!("Failed to join game: {}", refusal.reason),
        ),
        ProtocolEvent::ConnectionClosed => {
            (NoticeLevel::Error, "Disconnected from server".to_string())
        }
        ProtocolEvent::Reconnecting { .. } => {
            (NoticeLevel::Warning, "Reconnecting to server...".to_string())
        }
        ProtocolEvent::Reconnected => (NoticeLevel::Success, "Reconnected to server".to_string()),
    }
}

/// One player's view of one multiplayer game.
pub struct GameSession<T> {
    connection: ConnectionManager<T>,
    dispatcher: EventDispatcher,
    snapshot: Option<Arc<GameSnapshot>>,
    player_name: Option<String>,
    notices: NoticeLog,
}

impl<T: fmt::Debug> fmt::Debug for GameSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameSession")
            .field("connection", &self.connection)
            .field("dispatcher", &self.dispatcher)
            .field("snapshot", &self.snapshot)
            .field("player_name", &self.player_name)
            .finish()
    }
}

impl<T: HubTransport> GameSession<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        Self::with_connection(
            ConnectionManager::new(transport, config.hub_url(), config.reconnect.clone()),
            config.notice_capacity,
        )
    }

    /// Build around an existing connection manager.
    pub fn with_connection(connection: ConnectionManager<T>, notice_capacity: usize) -> Self {
        Self {
            connection,
            dispatcher: EventDispatcher::new(),
            snapshot: None,
            player_name: None,
            notices: NoticeLog::new(notice_capacity),
        }
    }

    // ---- Accessors ----

    /// The current game, shared with readers.
    pub fn snapshot(&self) -> Option<Arc<GameSnapshot>> {
        self.snapshot.clone()
    }

    /// Name the local player created or joined with.
    pub fn player_name(&self) -> Option<&str> {
        self.player_name.as_deref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    pub fn diagnostics(&self) -> ConnectionDiagnostics {
        self.connection.diagnostics()
    }

    /// Status line for the local player.
    pub fn status(&self) -> String {
        match &self.snapshot {
            Some(snapshot) => snapshot
                .status_for(self.player_name.as_deref().unwrap_or_default())
                .to_string(),
            None => NO_ACTIVE_GAME.to_string(),
        }
    }

    pub fn notices(&self) -> &NoticeLog {
        &self.notices
    }

    pub fn dismiss_notice(&mut self, id: u64) -> bool {
        self.notices.dismiss(id)
    }

    // ---- Listeners ----

    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&ProtocolEvent) -> HandlerResult + Send + 'static,
    {
        self.dispatcher.subscribe(kind, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    // ---- Connection ----

    #[instrument(skip(self), fields(url = %self.connection.hub_url()))]
    pub async fn connect(&mut self) -> Result<ConnectionId, HubError> {
        match self.connection.connect().await {
            Ok(id) => {
                self.notices
                    .push(NoticeLevel::Success, "Connected to multiplayer server");
                Ok(id)
            }
            Err(err) => {
                let reason = match &err {
                    HubError::Connection { source } => source.message().to_string(),
                    other => other.to_string(),
                };
                self.notices
                    .push(NoticeLevel::Error, format!("Failed to connect: {}", reason));
                Err(err)
            }
        }
    }

    /// Tear the connection down and forget the current game.
    ///
    /// Listeners get a `ConnectionClosed` event unless the session was
    /// already disconnected.
    #[instrument(skip(self))]
    pub async fn disconnect(&mut self) {
        let was_open = self.connection.state() != ConnectionState::Disconnected;
        self.connection.disconnect().await;
        self.snapshot = None;

        if was_open {
            self.handle(&ProtocolEvent::ConnectionClosed);
        }
    }

    /// Drop every listener, then disconnect.
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self) {
        self.dispatcher.unsubscribe_all(None);
        self.disconnect().await;
    }

    // ---- Game actions ----

    #[instrument(skip(self))]
    pub async fn create_game(&mut self, player_name: &str) -> Result<(), HubError> {
        let name = self.claim_name(player_name)?;
        let call = HubCall::CreateGame { player_name: name };

        match self.connection.call(&call).await {
            Ok(()) => {
                self.notices.push(NoticeLevel::Info, "Creating game...");
                Ok(())
            }
            Err(err) => {
                self.notices
                    .push(NoticeLevel::Error, "Failed to create game");
                Err(err)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn join_game(&mut self, game_id: &str, player_name: &str) -> Result<(), HubError> {
        let name = self.claim_name(player_name)?;
        let call = HubCall::JoinGame {
            game_id: game_id.to_string(),
            player_name: name,
        };

        match self.connection.call(&call).await {
            Ok(()) => {
                self.notices
                    .push(NoticeLevel::Info, format!("Joining game {}...", game_id));
                Ok(())
            }
            Err(err) => {
                self.notices.push(NoticeLevel::Error, "Failed to join game");
                Err(err)
            }
        }
    }

    /// Submit a move for a cell index (0..9, row-major).
    ///
    /// Nothing is sent unless the move passes local validation. The hub may
    /// still answer with `MoveRejected`.
    #[instrument(skip(self))]
    pub async fn make_move(&mut self, cell: usize) -> Result<(), HubError> {
        let state = self.connection.state();
        if !state.is_connected() {
            return Err(HubError::NotConnected { state });
        }

        let local = self.player_name.as_deref().unwrap_or_default();
        let request = match can_attempt_move(self.snapshot.as_deref(), local, cell) {
            Ok(request) => request,
            Err(rejection) => {
                debug!(cell, reason = %rejection, "Move not sent");
                if matches!(
                    rejection,
                    MoveRejection::NotYourTurn | MoveRejection::NotSeated
                ) {
                    self.notices
                        .push(NoticeLevel::Warning, "It's not your turn!");
                }
                return Err(rejection.into());
            }
        };

        let game_id = self
            .snapshot
            .as_ref()
            .map(|s| s.id.clone())
            .ok_or(HubError::NoActiveGame)?;

        if let Err(err) = self
            .connection
            .call(&HubCall::MakeMove { game_id, request })
            .await
        {
            self.notices.push(NoticeLevel::Error, "Failed to make move");
            return Err(err);
        }
        Ok(())
    }

    /// Leave the current game and forget it.
    #[instrument(skip(self))]
    pub async fn leave_game(&mut self) -> Result<(), HubError> {
        let game_id = self
            .snapshot
            .as_ref()
            .map(|s| s.id.clone())
            .ok_or(HubError::NoActiveGame)?;

        match self.connection.call(&HubCall::LeaveGame { game_id }).await {
            Ok(()) => {
                self.snapshot = None;
                self.notices.push(NoticeLevel::Info, "Left the game");
                Ok(())
            }
            Err(err) => {
                self.notices.push(NoticeLevel::Error, "Failed to leave game");
                Err(err)
            }
        }
    }

    // ---- Event pump ----

    /// Pull one event, apply it and notify listeners.
    ///
    /// Returns `None` once the connection is down for good.
    ///
    /// # Cancel safety
    ///
    /// Cancel safe, with the same transport condition as
    /// [`ConnectionManager::next_event`]. An event is only applied after it
    /// has been received, so a dropped call never half-applies one. Drive it
    /// next to user commands with `tokio::select!`.
    pub async fn next_event(&mut self) -> Option<ProtocolEvent> {
        let event = self.connection.next_event().await?;
        self.handle(&event);
        Some(event)
    }

    /// Process events until the connection settles. Returns how many were
    /// handled.
    pub async fn run(&mut self) -> usize {
        let mut handled = 0;
        while self.next_event().await.is_some() {
            handled += 1;
        }
        info!(handled, "Event pump stopped");
        handled
    }

    fn handle(&mut self, event: &ProtocolEvent) {
        if event.touches_snapshot() {
            let next = reduce(self.snapshot.as_deref(), event);
            if next.is_none() {
                debug!(event = %event.kind(), "Dropping event for unbound game");
            }
            self.snapshot = next.map(Arc::new);
        }

        let (level, text) = notice_for(event);
        self.notices.push(level, text);

        let delivery = self.dispatcher.publish(event);
        if delivery.failed > 0 {
            warn!(
                event = %event.kind(),
                failed = delivery.failed,
                delivered = delivery.delivered,
                "Some listeners failed"
            );
        }
    }

    /// Validate and remember the local player name.
    fn claim_name(&mut self, player_name: &str) -> Result<String, HubError> {
        let name = player_name.trim();
        if name.is_empty() {
            return Err(HubError::MissingPlayerName);
        }
        if name.chars().count() > MAX_PLAYER_NAME_LEN {
            return Err(HubError::PlayerNameTooLong {
                max: MAX_PLAYER_NAME_LEN,
            });
        }
        if let Some(snapshot) = &self.snapshot {
            return Err(HubError::AlreadyInGame {
                game_id: snapshot.id.clone(),
            });
        }

        self.player_name = Some(name.to_string());
        Ok(name.to_string())
    }
}
