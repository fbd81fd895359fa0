//! Board representation and normalization.
//!
//! The hub may send a board either as a flat sequence of nine cells or as a
//! 3x3 nested sequence. Everything inside this crate works on the flat
//! [`Board`]; [`normalize`] converts whatever arrives on the wire.
//!
//! Normalization never fails. Payloads with an unexpected shape become an
//! empty board, so a malformed message can not take the client down.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::game::Mark;

/// Number of cells on the board.
pub const BOARD_CELLS: usize = 9;

/// Length of one side of the board.
pub const BOARD_SIDE: usize = 3;

/// A single board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BoardCell {
    #[default]
    Empty,
    X,
    O,
}

impl BoardCell {
    /// Interpret one wire value. Anything that is not a known mark is empty.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Mark::parse(s).map(Self::from).unwrap_or(Self::Empty),
            _ => Self::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The mark occupying this cell, if any.
    pub fn mark(&self) -> Option<Mark> {
        match self {
            Self::Empty => None,
            Self::X => Some(Mark::X),
            Self::O => Some(Mark::O),
        }
    }

    pub fn to_value(&self) -> Value {
        match self.mark() {
            Some(mark) => Value::String(mark.as_str().to_string()),
            None => Value::Null,
        }
    }
}

impl From<Mark> for BoardCell {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Self::X,
            Mark::O => Self::O,
        }
    }
}

impl Serialize for BoardCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.mark() {
            Some(mark) => serializer.serialize_str(mark.as_str()),
            None => serializer.serialize_none(),
        }
    }
}

/// Row/column position of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CellCoords {
    pub row: usize,
    pub column: usize,
}

/// Convert a flat index to row/column, or `None` if it is off the board.
pub fn coords(index: usize) -> Option<CellCoords> {
    (index < BOARD_CELLS).then(|| CellCoords {
        row: index / BOARD_SIDE,
        column: index % BOARD_SIDE,
    })
}

/// Canonical flat board; index `i` is row `i / 3`, column `i % 3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board([BoardCell; BOARD_CELLS]);

impl Board {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: [BoardCell; BOARD_CELLS]) -> Self {
        Self(cells)
    }

    pub fn cells(&self) -> &[BoardCell; BOARD_CELLS] {
        &self.0
    }

    /// Get the cell at a flat index.
    pub fn get(&self, index: usize) -> Option<BoardCell> {
        self.0.get(index).copied()
    }

    /// Return a copy of the board with one cell replaced.
    pub fn with(mut self, index: usize, cell: BoardCell) -> Self {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = cell;
        }
        self
    }

    /// Row-major 3x3 view.
    pub fn rows(&self) -> [[BoardCell; BOARD_SIDE]; BOARD_SIDE] {
        let mut rows = [[BoardCell::Empty; BOARD_SIDE]; BOARD_SIDE];
        for (index, cell) in self.0.iter().enumerate() {
            rows[index / BOARD_SIDE][index % BOARD_SIDE] = *cell;
        }
        rows
    }

    /// Flat JSON array, `null` for empty cells.
    pub fn to_value(&self) -> Value {
        Value::Array(self.0.iter().map(BoardCell::to_value).collect())
    }
}

impl std::ops::Index<usize> for Board {
    type Output = BoardCell;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(normalize(raw.as_ref()))
    }
}

/// Normalize a wire board into the canonical flat form.
///
/// - absent or `null` gives an empty board
/// - nine elements, first not an array: taken as flat, cell by cell
/// - three elements, first an array: flattened row-major; missing, `null`
///   and `""` cells become [`BoardCell::Empty`]
/// - anything else gives an empty board
pub fn normalize(raw: Option<&Value>) -> Board {
    let Some(Value::Array(items)) = raw else {
        return Board::empty();
    };

    let mut cells = [BoardCell::Empty; BOARD_CELLS];

    match items.first() {
        Some(first) if items.len() == BOARD_CELLS && !first.is_array() => {
            for (slot, item) in cells.iter_mut().zip(items) {
                *slot = BoardCell::from_value(item);
            }
        }
        Some(Value::Array(_)) if items.len() == BOARD_SIDE => {
            for (row, row_value) in items.iter().enumerate() {
                let Value::Array(row_cells) = row_value else {
                    continue;
                };
                for (column, item) in row_cells.iter().take(BOARD_SIDE).enumerate() {
                    cells[row * BOARD_SIDE + column] = BoardCell::from_value(item);
                }
            }
        }
        _ => return Board::empty(),
    }

    Board(cells)
}
