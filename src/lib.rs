//! Tic-Tac-Toe Sync Library
//!
//! This crate keeps a client's view of a two-player tic-tac-toe game in sync
//! with an authoritative game hub over a persistent duplex connection.
//!
//! # Overview
//!
//! The state module provides:
//!
//! - **Board Codec** - Normalizes flat or nested board payloads into nine
//!   cells. Malformed boards become empty instead of failing.
//!
//! - **Connection Management** - Lifecycle state machine, RPCs, and automatic
//!   reconnection on a fixed delay schedule.
//!
//! - **Event Dispatch** - Typed listeners per event kind, isolated from each
//!   other's failures.
//!
//! - **Game State** - Immutable snapshots folded from hub events, plus local
//!   move validation.
//!
//! # Design Principles
//!
//! 1. **The hub is authoritative** - Wins, draws and turn order are taken
//!    from the server, never computed locally.
//!
//! 2. **State machines validate transitions** - Invalid connection changes are
//!    rejected with clear errors.
//!
//! 3. **Transport-agnostic** - The network is behind the `HubTransport` trait.
//!
//! 4. **Serialization-ready** - Snapshots and notices convert to JSON for UIs.
//!
//! # Example
//!
//! ```rust
//! use tictactoe_sync::state::{
//!     can_attempt_move, reduce, GameStatus, Mark, MoveRejection, ProtocolEvent,
//! };
//! use serde_json::json;
//!
//! let created = ProtocolEvent::decode(
//!     "GameCreated",
//!     &json!({
//!         "gameId": "g1",
//!         "board": null,
//!         "currentPlayer": "X",
//!         "players": [{"name": "Alice", "symbol": "X"}, {"name": "Bob", "symbol": "O"}]
//!     }),
//! )
//! .unwrap()
//! .unwrap();
//!
//! let snapshot = reduce(None, &created).unwrap();
//! assert_eq!(snapshot.status_for("Alice"), GameStatus::YourTurn);
//!
//! let request = can_attempt_move(Some(&snapshot), "Alice", 4).unwrap();
//! assert_eq!((request.row, request.column, request.player), (1, 1, Mark::X));
//!
//! assert_eq!(
//!     can_attempt_move(Some(&snapshot), "Bob", 4),
//!     Err(MoveRejection::NotYourTurn)
//! );
//! ```

pub mod state;

pub use state::*;
