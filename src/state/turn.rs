//! Local move gating.
//!
//! [`can_attempt_move`] decides whether the local player may submit a move
//! for a cell. It only guards against obviously pointless requests; the hub
//! still has the final word and may answer with `MoveRejected`.

use serde::Serialize;
use thiserror::Error;

use super::board::coords;
use super::game::{GameSnapshot, Mark};

/// Why a move attempt was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveRejection {
    #[error("no active game")]
    NoActiveGame,
    #[error("cell {0} is outside the board")]
    OutOfRange(usize),
    #[error("cell {0} is already taken")]
    Occupied(usize),
    #[error("game is over")]
    GameOver,
    #[error("not a player in this game")]
    NotSeated,
    #[error("not your turn")]
    NotYourTurn,
}

/// Outbound move, as sent to `MakeMove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoveRequest {
    pub row: usize,
    pub column: usize,
    pub player: Mark,
}

impl MoveRequest {
    pub fn cell_index(&self) -> usize {
        self.row * 3 + self.column
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "row": self.row,
            "column": self.column,
            "player": self.player.as_str()
        })
    }
}

/// Check a proposed move and build the request if it may be sent.
///
/// Checks run in order: a game is bound, the index is on the board, the
/// cell is empty, the game is not over, and the local player is seated
/// with the symbol whose turn it is.
pub fn can_attempt_move(
    snapshot: Option<&GameSnapshot>,
    local_player: &str,
    cell: usize,
) -> Result<MoveRequest, MoveRejection> {
    let snapshot = snapshot.ok_or(MoveRejection::NoActiveGame)?;
    let position = coords(cell).ok_or(MoveRejection::OutOfRange(cell))?;

    if !snapshot.board[cell].is_empty() {
        return Err(MoveRejection::Occupied(cell));
    }

    if snapshot.is_over() {
        return Err(MoveRejection::GameOver);
    }

    if snapshot.player_named(local_player).is_none() {
        return Err(MoveRejection::NotSeated);
    }
    if !snapshot.is_turn_of(local_player) {
        return Err(MoveRejection::NotYourTurn);
    }

    Ok(MoveRequest {
        row: position.row,
        column: position.column,
        player: snapshot.current_player,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::board::{Board, BoardCell};
    use crate::state::game::{Outcome, Player};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn snapshot(board: Board, current: Mark) -> GameSnapshot {
        GameSnapshot {
            id: "g1".to_string(),
            board,
            current_player: current,
            outcome: None,
            winning_cells: BTreeSet::new(),
            players: vec![Player::new("A", Mark::X), Player::new("B", Mark::O)],
        }
    }

    #[test]
    fn test_allowed_move_maps_coordinates() {
        let snap = snapshot(Board::empty(), Mark::X);
        let request = can_attempt_move(Some(&snap), "A", 5).unwrap();

        assert_eq!(
            request,
            MoveRequest {
                row: 1,
                column: 2,
                player: Mark::X
            }
        );
        assert_eq!(request.cell_index(), 5);
    }

    #[test]
    fn test_not_your_turn() {
        let snap = snapshot(Board::empty(), Mark::X);
        let err = can_attempt_move(Some(&snap), "B", 0).unwrap_err();

        assert_eq!(err, MoveRejection::NotYourTurn);
        assert_eq!(err.to_string(), "not your turn");
    }

    #[test]
    fn test_rejections_in_order() {
        assert_eq!(
            can_attempt_move(None, "A", 0),
            Err(MoveRejection::NoActiveGame)
        );

        let snap = snapshot(Board::empty().with(4, BoardCell::O), Mark::X);
        assert_eq!(
            can_attempt_move(Some(&snap), "A", 9),
            Err(MoveRejection::OutOfRange(9))
        );
        assert_eq!(
            can_attempt_move(Some(&snap), "A", 4),
            Err(MoveRejection::Occupied(4))
        );
        assert_eq!(
            can_attempt_move(Some(&snap), "Z", 0),
            Err(MoveRejection::NotSeated)
        );

        let over = GameSnapshot {
            outcome: Some(Outcome::Draw),
            ..snap
        };
        assert_eq!(
            can_attempt_move(Some(&over), "A", 0),
            Err(MoveRejection::GameOver)
        );
    }

    proptest! {
        #[test]
        fn prop_allowed_iff_in_range_empty_and_on_turn(
            cells in prop::array::uniform9(prop_oneof![
                Just(BoardCell::Empty),
                Just(BoardCell::X),
                Just(BoardCell::O)
            ]),
            current_is_x in any::<bool>(),
            local_is_a in any::<bool>(),
            cell in 0usize..12,
        ) {
            let current = if current_is_x { Mark::X } else { Mark::O };
            let local = if local_is_a { "A" } else { "B" };
            let local_symbol = if local_is_a { Mark::X } else { Mark::O };
            let snap = snapshot(Board::from_cells(cells), current);

            let expected = cell < 9 && cells[cell].is_empty() && local_symbol == current;
            prop_assert_eq!(can_attempt_move(Some(&snap), local, cell).is_ok(), expected);
        }
    }
}
