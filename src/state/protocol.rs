//! Hub wire contract.
//!
//! Inbound push events are decoded into [`ProtocolEvent`]; outbound RPCs are
//! built from [`HubCall`]. Lifecycle notifications (`ConnectionClosed`,
//! `Reconnecting`, `Reconnected`) share the event type but are only ever
//! synthesized locally by the connection manager.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use super::board::{Board, BOARD_CELLS};
use super::error::HubError;
use super::game::{Mark, Player};
use super::turn::MoveRequest;

/// Discriminant of a [`ProtocolEvent`], used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    GameCreated,
    GameJoined,
    PlayerJoined,
    MoveMade,
    GameEnded,
    MoveRejected,
    PlayerLeft,
    PlayerDisconnected,
    Error,
    JoinGameFailed,
    ConnectionClosed,
    Reconnecting,
    Reconnected,
}

impl EventKind {
    /// Events the hub pushes to clients.
    pub const HUB_EVENTS: [EventKind; 10] = [
        Self::GameCreated,
        Self::GameJoined,
        Self::PlayerJoined,
        Self::MoveMade,
        Self::GameEnded,
        Self::MoveRejected,
        Self::PlayerLeft,
        Self::PlayerDisconnected,
        Self::Error,
        Self::JoinGameFailed,
    ];

    /// Notifications raised by the connection manager itself.
    pub const LIFECYCLE_EVENTS: [EventKind; 3] = [
        Self::ConnectionClosed,
        Self::Reconnecting,
        Self::Reconnected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GameCreated => "GameCreated",
            Self::GameJoined => "GameJoined",
            Self::PlayerJoined => "PlayerJoined",
            Self::MoveMade => "MoveMade",
            Self::GameEnded => "GameEnded",
            Self::MoveRejected => "MoveRejected",
            Self::PlayerLeft => "PlayerLeft",
            Self::PlayerDisconnected => "PlayerDisconnected",
            Self::Error => "Error",
            Self::JoinGameFailed => "JoinGameFailed",
            Self::ConnectionClosed => "ConnectionClosed",
            Self::Reconnecting => "Reconnecting",
            Self::Reconnected => "Reconnected",
        }
    }

    /// Look up a hub event by its wire name. Lifecycle names are not
    /// accepted from the wire.
    pub fn from_hub_name(name: &str) -> Option<Self> {
        Self::HUB_EVENTS.into_iter().find(|k| k.as_str() == name)
    }

    pub fn is_lifecycle(&self) -> bool {
        Self::LIFECYCLE_EVENTS.contains(self)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `GameCreated` and `GameJoined`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameBound {
    pub game_id: String,
    #[serde(default)]
    pub board: Board,
    #[serde(default, deserialize_with = "optional_mark")]
    pub current_player: Option<Mark>,
    #[serde(default, deserialize_with = "seated_players")]
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoined {
    #[serde(default, deserialize_with = "lenient")]
    pub player_name: String,
    /// `None` keeps the players already known.
    #[serde(default, deserialize_with = "optional_players")]
    pub players: Option<Vec<Player>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveMade {
    #[serde(default)]
    pub board: Board,
    #[serde(default, deserialize_with = "optional_mark")]
    pub current_player: Option<Mark>,
    #[serde(default, deserialize_with = "lenient")]
    pub player_name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub is_game_over: bool,
    #[serde(default, deserialize_with = "optional_mark")]
    pub winner: Option<Mark>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_draw: bool,
    #[serde(default, deserialize_with = "cell_indices")]
    pub winning_cells: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEnded {
    #[serde(default, deserialize_with = "optional_mark")]
    pub winner: Option<Mark>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_draw: bool,
    #[serde(default, deserialize_with = "cell_indices")]
    pub winning_cells: Vec<usize>,
}

/// Payload of `MoveRejected` and `JoinGameFailed`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Refusal {
    #[serde(default, deserialize_with = "lenient")]
    pub reason: String,
}

/// Payload of `PlayerLeft` and `PlayerDisconnected`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerGone {
    #[serde(default, deserialize_with = "lenient")]
    pub player_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HubFault {
    #[serde(default, deserialize_with = "lenient")]
    pub message: String,
}

/// Every event a session can observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    GameCreated(GameBound),
    GameJoined(GameBound),
    PlayerJoined(PlayerJoined),
    MoveMade(MoveMade),
    GameEnded(GameEnded),
    MoveRejected(Refusal),
    PlayerLeft(PlayerGone),
    PlayerDisconnected(PlayerGone),
    Error(HubFault),
    JoinGameFailed(Refusal),
    ConnectionClosed,
    /// One automatic reconnect attempt is starting (1-based).
    Reconnecting { attempt: usize },
    Reconnected,
}

impl ProtocolEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::GameCreated(_) => EventKind::GameCreated,
            Self::GameJoined(_) => EventKind::GameJoined,
            Self::PlayerJoined(_) => EventKind::PlayerJoined,
            Self::MoveMade(_) => EventKind::MoveMade,
            Self::GameEnded(_) => EventKind::GameEnded,
            Self::MoveRejected(_) => EventKind::MoveRejected,
            Self::PlayerLeft(_) => EventKind::PlayerLeft,
            Self::PlayerDisconnected(_) => EventKind::PlayerDisconnected,
            Self::Error(_) => EventKind::Error,
            Self::JoinGameFailed(_) => EventKind::JoinGameFailed,
            Self::ConnectionClosed => EventKind::ConnectionClosed,
            Self::Reconnecting { .. } => EventKind::Reconnecting,
            Self::Reconnected => EventKind::Reconnected,
        }
    }

    /// Whether the reducer can change the snapshot for this event.
    pub fn touches_snapshot(&self) -> bool {
        matches!(
            self,
            Self::GameCreated(_)
                | Self::GameJoined(_)
                | Self::PlayerJoined(_)
                | Self::MoveMade(_)
                | Self::GameEnded(_)
        )
    }

    /// Decode a hub push event.
    ///
    /// Returns `Ok(None)` for names this client does not listen to. Fields
    /// with the wrong shape fall back to their defaults, so the only
    /// failure is a `GameCreated`/`GameJoined` without a string `gameId`.
    pub fn decode(name: &str, payload: &Value) -> Result<Option<Self>, HubError> {
        let Some(kind) = EventKind::from_hub_name(name) else {
            return Ok(None);
        };

        let event = match kind {
            EventKind::GameCreated => Self::GameCreated(parse(kind, payload)?),
            EventKind::GameJoined => Self::GameJoined(parse(kind, payload)?),
            EventKind::PlayerJoined => Self::PlayerJoined(parse(kind, payload)?),
            EventKind::MoveMade => Self::MoveMade(parse(kind, payload)?),
            EventKind::GameEnded => Self::GameEnded(parse(kind, payload)?),
            EventKind::MoveRejected => Self::MoveRejected(parse(kind, payload)?),
            EventKind::PlayerLeft => Self::PlayerLeft(parse(kind, payload)?),
            EventKind::PlayerDisconnected => Self::PlayerDisconnected(parse(kind, payload)?),
            EventKind::Error => Self::Error(parse(kind, payload)?),
            EventKind::JoinGameFailed => Self::JoinGameFailed(parse(kind, payload)?),
            EventKind::ConnectionClosed | EventKind::Reconnecting | EventKind::Reconnected => {
                return Ok(None)
            }
        };

        Ok(Some(event))
    }
}

fn parse<T: DeserializeOwned>(kind: EventKind, payload: &Value) -> Result<T, HubError> {
    // Anything but an object reads as an empty one so field defaults apply.
    let empty = Value::Object(Default::default());
    let payload = match payload {
        Value::Object(_) => payload,
        Value::Null => &empty,
        other => {
            warn!(event = %kind, payload = %other, "Hub payload is not an object");
            &empty
        }
    };
    T::deserialize(payload).map_err(|source| HubError::ProtocolMismatch {
        event: kind.as_str().to_string(),
        source,
    })
}

/// Read a field, falling back to its default when it is `null` or has the
/// wrong type.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Value::deserialize(deserializer)?;
    if raw.is_null() {
        return Ok(T::default());
    }
    Ok(T::deserialize(&raw).unwrap_or_else(|err| {
        warn!(value = %raw, error = %err, "Ignoring malformed hub field");
        T::default()
    }))
}

/// `null`, missing, `""` and unknown symbols mean no mark.
fn optional_mark<'de, D>(deserializer: D) -> Result<Option<Mark>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    match &raw {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        _ => {
            let mark = raw.as_str().and_then(Mark::parse);
            if mark.is_none() {
                warn!(value = %raw, "Ignoring unknown mark");
            }
            Ok(mark)
        }
    }
}

/// Cell indices on the board. Entries that are not an index below 9 are
/// dropped.
fn cell_indices<'de, D>(deserializer: D) -> Result<Vec<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let items = match raw {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            warn!(value = %other, "Ignoring malformed cell list");
            return Ok(Vec::new());
        }
    };

    Ok(items
        .iter()
        .filter_map(|item| {
            let index = item
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .filter(|&i| i < BOARD_CELLS);
            if index.is_none() {
                warn!(value = %item, "Ignoring out-of-range cell index");
            }
            index
        })
        .collect())
}

fn seated_players<'de, D>(deserializer: D) -> Result<Vec<Player>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(player_list(&raw).unwrap_or_default())
}

fn optional_players<'de, D>(deserializer: D) -> Result<Option<Vec<Player>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(player_list(&raw))
}

/// Players that decode; malformed entries are skipped one by one.
fn player_list(raw: &Value) -> Option<Vec<Player>> {
    match raw {
        Value::Null => None,
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match Player::deserialize(item) {
                    Ok(player) => Some(player),
                    Err(err) => {
                        warn!(value = %item, error = %err, "Ignoring malformed player");
                        None
                    }
                })
                .collect(),
        ),
        other => {
            warn!(value = %other, "Ignoring malformed player list");
            None
        }
    }
}

/// Outbound hub RPCs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubCall {
    CreateGame { player_name: String },
    JoinGame { game_id: String, player_name: String },
    MakeMove { game_id: String, request: MoveRequest },
    LeaveGame { game_id: String },
}

impl HubCall {
    pub fn method(&self) -> &'static str {
        match self {
            Self::CreateGame { .. } => "CreateGame",
            Self::JoinGame { .. } => "JoinGame",
            Self::MakeMove { .. } => "MakeMove",
            Self::LeaveGame { .. } => "LeaveGame",
        }
    }

    /// Positional arguments in the order the hub expects them.
    pub fn arguments(&self) -> Vec<Value> {
        match self {
            Self::CreateGame { player_name } => vec![Value::from(player_name.as_str())],
            Self::JoinGame {
                game_id,
                player_name,
            } => vec![
                Value::from(game_id.as_str()),
                Value::from(player_name.as_str()),
            ],
            Self::MakeMove { game_id, request } => {
                vec![Value::from(game_id.as_str()), request.to_json()]
            }
            Self::LeaveGame { game_id } => vec![Value::from(game_id.as_str())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::board::BoardCell;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in EventKind::HUB_EVENTS {
            assert_eq!(EventKind::from_hub_name(kind.as_str()), Some(kind));
            assert!(!kind.is_lifecycle());
        }
        for kind in EventKind::LIFECYCLE_EVENTS {
            assert_eq!(EventKind::from_hub_name(kind.as_str()), None);
            assert!(kind.is_lifecycle());
        }
    }

    #[test]
    fn test_unknown_names_are_ignored() {
        assert_eq!(ProtocolEvent::decode("ChatMessage", &json!({})).unwrap(), None);
        assert_eq!(ProtocolEvent::decode("Reconnected", &Value::Null).unwrap(), None);
    }

    #[test]
    fn test_decode_game_created_nested_board() {
        let payload = json!({
            "gameId": "g1",
            "board": [["", "", ""], ["", "X", ""], ["", "", ""]],
            "currentPlayer": "O",
            "players": [{"name": "A", "symbol": "X"}]
        });

        let event = ProtocolEvent::decode("GameCreated", &payload).unwrap().unwrap();
        let ProtocolEvent::GameCreated(bound) = event else {
            panic!("expected GameCreated");
        };
        assert_eq!(bound.game_id, "g1");
        assert_eq!(bound.board[4], BoardCell::X);
        assert_eq!(bound.current_player, Some(Mark::O));
        assert_eq!(bound.players, vec![Player::new("A", Mark::X)]);
    }

    #[test]
    fn test_decode_move_made_defaults() {
        let payload = json!({
            "board": null,
            "currentPlayer": "X",
            "winner": null,
            "winningCells": null
        });

        let event = ProtocolEvent::decode("MoveMade", &payload).unwrap().unwrap();
        let ProtocolEvent::MoveMade(made) = event else {
            panic!("expected MoveMade");
        };
        assert!(!made.is_game_over);
        assert!(!made.is_draw);
        assert_eq!(made.winner, None);
        assert!(made.winning_cells.is_empty());
        assert_eq!(made.player_name, "");
    }

    #[test]
    fn test_decode_player_joined_without_players() {
        let event = ProtocolEvent::decode("PlayerJoined", &json!({"playerName": "B"}))
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ProtocolEvent::PlayerJoined(PlayerJoined {
                player_name: "B".to_string(),
                players: None,
            })
        );
    }

    #[test]
    fn test_decode_null_payload() {
        let event = ProtocolEvent::decode("MoveRejected", &Value::Null).unwrap().unwrap();
        assert_eq!(
            event,
            ProtocolEvent::MoveRejected(Refusal {
                reason: String::new()
            })
        );
    }

    #[test]
    fn test_decode_mismatch() {
        let err = ProtocolEvent::decode("GameJoined", &json!({"board": []})).unwrap_err();
        assert!(matches!(err, HubError::ProtocolMismatch { ref event, .. } if event == "GameJoined"));

        let err = ProtocolEvent::decode("GameCreated", &json!({"gameId": 42})).unwrap_err();
        assert!(matches!(err, HubError::ProtocolMismatch { .. }));
    }

    #[test]
    fn test_malformed_fields_fall_back() {
        let payload = json!({
            "board": ["X", null, null, null, null, null, null, null, null],
            "currentPlayer": "O",
            "playerName": 7,
            "isGameOver": "no",
            "winner": "Q",
            "winningCells": [-1, 2, "4", 9, 8]
        });

        let event = ProtocolEvent::decode("MoveMade", &payload).unwrap().unwrap();
        let ProtocolEvent::MoveMade(made) = event else {
            panic!("expected MoveMade");
        };
        assert_eq!(made.board[0], BoardCell::X);
        assert_eq!(made.current_player, Some(Mark::O));
        assert_eq!(made.player_name, "");
        assert!(!made.is_game_over);
        assert_eq!(made.winner, None);
        assert_eq!(made.winning_cells, vec![2, 8]);

        let event = ProtocolEvent::decode("GameEnded", &json!({"winner": 1, "winningCells": "all"}))
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ProtocolEvent::GameEnded(GameEnded {
                winner: None,
                is_draw: false,
                winning_cells: Vec::new(),
            })
        );
    }

    #[test]
    fn test_malformed_players_are_skipped() {
        let payload = json!({
            "gameId": "g1",
            "currentPlayer": "X",
            "players": [
                {"name": "A", "symbol": "X"},
                {"name": "Z", "symbol": "Q"},
                "B",
                {"name": "B", "symbol": "o"}
            ]
        });

        let event = ProtocolEvent::decode("GameJoined", &payload).unwrap().unwrap();
        let ProtocolEvent::GameJoined(bound) = event else {
            panic!("expected GameJoined");
        };
        assert_eq!(
            bound.players,
            vec![Player::new("A", Mark::X), Player::new("B", Mark::O)]
        );

        let event = ProtocolEvent::decode("PlayerJoined", &json!({"playerName": "B", "players": {}}))
            .unwrap()
            .unwrap();
        assert!(matches!(event, ProtocolEvent::PlayerJoined(PlayerJoined { players: None, .. })));
    }

    #[test]
    fn test_non_object_payload_reads_as_empty() {
        let event = ProtocolEvent::decode("Error", &json!("boom")).unwrap().unwrap();
        assert_eq!(
            event,
            ProtocolEvent::Error(HubFault {
                message: String::new()
            })
        );
    }

    #[test]
    fn test_hub_call_arguments() {
        let call = HubCall::JoinGame {
            game_id: "g1".to_string(),
            player_name: "B".to_string(),
        };
        assert_eq!(call.method(), "JoinGame");
        assert_eq!(call.arguments(), vec![json!("g1"), json!("B")]);

        let call = HubCall::MakeMove {
            game_id: "g1".to_string(),
            request: MoveRequest {
                row: 1,
                column: 2,
                player: Mark::O,
            },
        };
        assert_eq!(
            call.arguments(),
            vec![json!("g1"), json!({"row": 1, "column": 2, "player": "O"})]
        );
    }
}
