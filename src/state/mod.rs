//! Client-side synchronization core for multiplayer tic-tac-toe.
//!
//! This module provides the core types and managers:
//!
//! - `board` - Board codec (flat or nested hub payloads → 9 cells)
//! - `protocol` - Typed hub events and outbound RPCs
//! - `lifecycle` - Connection state machine
//! - `transport` - Duplex transport seam
//! - `connection` - Connection manager with automatic reconnects
//! - `dispatch` - Per-event-kind listener registry
//! - `game` - Game snapshot and reducer
//! - `turn` - Local move gating
//! - `session` - Session owner tying everything together
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          GameSession<T>                              │
//! │                                                                      │
//! │  make_move ──▶ can_attempt_move ──▶ ConnectionManager::call          │
//! │                                                                      │
//! │  ┌────────────────────┐   ProtocolEvent   ┌──────────────────────┐   │
//! │  │ ConnectionManager  │ ────────────────▶ │ reduce(snapshot, ev) │   │
//! │  │                    │                   └──────────┬───────────┘   │
//! │  │  HubTransport      │                              │               │
//! │  │  ConnectionState   │                              ▼               │
//! │  │  reconnect cycle   │                   ┌──────────────────────┐   │
//! │  └────────────────────┘                   │ NoticeLog            │   │
//! │                                           │ EventDispatcher      │   │
//! │                                           │   kind → listeners   │   │
//! │                                           └──────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use tictactoe_sync::state::{ClientConfig, EventKind, GameSession};
//!
//! let config = ClientConfig::from_env();
//! let mut session = GameSession::new(transport, &config);
//!
//! session.subscribe(EventKind::MoveMade, |event| {
//!     println!("{event:?}");
//!     Ok(())
//! });
//!
//! session.connect().await?;
//! session.create_game("Alice").await?;
//! while let Some(_event) = session.next_event().await {
//!     println!("{}", session.status());
//! }
//! ```

pub mod board;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod game;
pub mod lifecycle;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod turn;

// Re-export commonly used types
pub use board::{coords, normalize, Board, BoardCell, CellCoords, BOARD_CELLS, BOARD_SIDE};
pub use config::{ClientConfig, ReconnectPolicy, API_URL_ENV, DEFAULT_API_URL};
pub use connection::{ConnectionDiagnostics, ConnectionId, ConnectionManager};
pub use dispatch::{Delivery, EventDispatcher, HandlerError, HandlerResult, SubscriptionId};
pub use error::{HubError, TransportError};
pub use game::{reduce, GameSnapshot, GameStatus, Mark, Outcome, Player, MAX_PLAYERS};
pub use lifecycle::{ConnectionState, InvalidTransition, LifecycleEvent};
pub use protocol::{EventKind, HubCall, ProtocolEvent};
pub use session::{GameSession, Notice, NoticeLevel, NoticeLog};
pub use transport::{HubTransport, InboundMessage};
pub use turn::{can_attempt_move, MoveRejection, MoveRequest};
