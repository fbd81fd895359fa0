//! Game snapshot and reducer.
//!
//! A [`GameSnapshot`] is an immutable view of one game as last reported by
//! the hub. [`reduce`] folds one [`ProtocolEvent`] into the previous snapshot
//! and returns the next one. The reducer never decides wins or draws itself;
//! it only stores what the server said.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::board::{Board, BOARD_CELLS};
use super::protocol::{GameBound, GameEnded, MoveMade, ProtocolEvent};

/// Maximum players per game.
pub const MAX_PLAYERS: usize = 2;

/// Player marker. `X` always moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Mark {
    #[default]
    #[serde(alias = "x")]
    X,
    #[serde(alias = "o")]
    O,
}

impl Mark {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X => "X",
            Self::O => "O",
        }
    }

    /// Parse a symbol, ignoring case and surrounding whitespace.
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "X" | "x" => Some(Self::X),
            "O" | "o" => Some(Self::O),
            _ => None,
        }
    }

    pub fn opponent(&self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A seated player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub symbol: Mark,
}

impl Player {
    pub fn new(name: impl Into<String>, symbol: Mark) -> Self {
        Self {
            name: name.into(),
            symbol,
        }
    }
}

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Won(Mark),
    Draw,
}

impl Outcome {
    /// A finished game is either won or drawn, never both. A reported winner
    /// takes precedence; a finished game with no winner is a draw.
    pub fn from_winner(winner: Option<Mark>) -> Self {
        match winner {
            Some(mark) => Self::Won(mark),
            None => Self::Draw,
        }
    }
}

/// Immutable view of one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    /// Game ID assigned by the hub
    pub id: String,

    /// Canonical flat board
    pub board: Board,

    /// Whose move is next
    pub current_player: Mark,

    /// Set once the hub reports the game over
    pub outcome: Option<Outcome>,

    /// Cells forming the winning line, empty otherwise
    pub winning_cells: BTreeSet<usize>,

    /// Seated players, at most one per symbol
    pub players: Vec<Player>,
}

impl GameSnapshot {
    /// Fresh snapshot from a `GameCreated`/`GameJoined` payload.
    pub fn bound(payload: &GameBound) -> Self {
        Self {
            id: payload.game_id.clone(),
            board: payload.board,
            current_player: payload.current_player.unwrap_or_default(),
            outcome: None,
            winning_cells: BTreeSet::new(),
            players: seat_players(&payload.players),
        }
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn winner(&self) -> Option<Mark> {
        match self.outcome {
            Some(Outcome::Won(mark)) => Some(mark),
            _ => None,
        }
    }

    pub fn is_draw(&self) -> bool {
        matches!(self.outcome, Some(Outcome::Draw))
    }

    pub fn player_named(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    pub fn player_with(&self, symbol: Mark) -> Option<&Player> {
        self.players.iter().find(|p| p.symbol == symbol)
    }

    /// Check whether the named player holds the current turn.
    pub fn is_turn_of(&self, name: &str) -> bool {
        self.player_named(name)
            .is_some_and(|p| p.symbol == self.current_player)
    }

    /// Status line as seen by the local player.
    pub fn status_for(&self, local_player: &str) -> GameStatus {
        match self.outcome {
            Some(Outcome::Won(mark)) => return GameStatus::Won(mark),
            Some(Outcome::Draw) => return GameStatus::Draw,
            None => {}
        }

        if self.players.len() < MAX_PLAYERS {
            return GameStatus::WaitingForOpponent;
        }

        match self.player_with(self.current_player) {
            Some(p) if p.name == local_player => GameStatus::YourTurn,
            Some(p) => GameStatus::TurnOf(p.name.clone()),
            None => GameStatus::TurnOf(self.current_player.as_str().to_string()),
        }
    }

    /// Render for UI collaborators.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "board": self.board,
            "currentPlayer": self.current_player,
            "isGameOver": self.is_over(),
            "winner": self.winner(),
            "isDraw": self.is_draw(),
            "winningCells": self.winning_cells,
            "players": self.players
        })
    }
}

/// Human-readable game status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameStatus {
    WaitingForOpponent,
    YourTurn,
    TurnOf(String),
    Won(Mark),
    Draw,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForOpponent => write!(f, "Waiting for opponent..."),
            Self::YourTurn => write!(f, "Your turn!"),
            Self::TurnOf(name) => write!(f, "{}'s turn", name),
            Self::Won(mark) => write!(f, "Game over - {} wins!", mark),
            Self::Draw => write!(f, "Game ended in a draw"),
        }
    }
}

/// Apply one event to the previous snapshot.
///
/// `GameCreated`/`GameJoined` always bind a new snapshot. Events that update
/// a game arriving with nothing bound are stale and leave the state empty.
/// Every other event returns the previous snapshot unchanged.
pub fn reduce(previous: Option<&GameSnapshot>, event: &ProtocolEvent) -> Option<GameSnapshot> {
    match event {
        ProtocolEvent::GameCreated(payload) | ProtocolEvent::GameJoined(payload) => {
            Some(GameSnapshot::bound(payload))
        }
        ProtocolEvent::PlayerJoined(payload) => previous.map(|prev| GameSnapshot {
            players: payload
                .players
                .as_deref()
                .map(seat_players)
                .unwrap_or_else(|| prev.players.clone()),
            ..prev.clone()
        }),
        ProtocolEvent::MoveMade(payload) => previous.map(|prev| apply_move(prev, payload)),
        ProtocolEvent::GameEnded(payload) => previous.map(|prev| apply_end(prev, payload)),
        _ => previous.cloned(),
    }
}

fn apply_move(prev: &GameSnapshot, payload: &MoveMade) -> GameSnapshot {
    let outcome = payload.is_game_over.then(|| Outcome::from_winner(payload.winner));

    GameSnapshot {
        board: payload.board,
        current_player: payload.current_player.unwrap_or(prev.current_player),
        outcome,
        winning_cells: winning_cells(&payload.winning_cells),
        ..prev.clone()
    }
}

fn apply_end(prev: &GameSnapshot, payload: &GameEnded) -> GameSnapshot {
    GameSnapshot {
        outcome: Some(Outcome::from_winner(payload.winner)),
        winning_cells: winning_cells(&payload.winning_cells),
        ..prev.clone()
    }
}

fn winning_cells(cells: &[usize]) -> BTreeSet<usize> {
    cells.iter().copied().filter(|&i| i < BOARD_CELLS).collect()
}

/// Keep the first player for each symbol.
fn seat_players(players: &[Player]) -> Vec<Player> {
    let mut seated: Vec<Player> = Vec::with_capacity(MAX_PLAYERS);
    for player in players {
        if !seated.iter().any(|p| p.symbol == player.symbol) {
            seated.push(player.clone());
        }
    }
    seated
}
