//! Core module - pure game logic with no I/O
//!
//! Everything in here is deterministic and synchronous: board rules,
//! piece data, RNG, scoring, and the engine state machine. The net layer
//! drives it; nothing here knows about sockets or async.

pub mod board;
pub mod engine;
pub mod pieces;
pub mod rng;
pub mod scoring;
pub mod snapshot;

pub use board::Board;
pub use engine::{Engine, FallingPiece, LockOutcome};
pub use pieces::{shape, try_rotate};
pub use rng::{PieceQueue, SimpleRng};
pub use snapshot::{ActivePiece, PlayerSnapshot};
