//! Core types shared across the crate
//!
//! Pure data types plus the timing and scoring constants that define the
//! game rules. No I/O, no dependencies beyond serde for the wire format.

use serde::{Deserialize, Serialize};

/// Board dimensions. The two buffer rows above the visible field allow
/// spawn and rotation overhang without special-casing negative rows.
pub const BOARD_WIDTH: u8 = 10;
pub const BOARD_VISIBLE_HEIGHT: u8 = 20;
pub const BOARD_BUFFER_ROWS: u8 = 2;
pub const BOARD_TOTAL_HEIGHT: u8 = BOARD_VISIBLE_HEIGHT + BOARD_BUFFER_ROWS;

/// Spawn anchor for new pieces (x, y) in board coordinates.
pub const SPAWN_POSITION: (i8, i8) = (3, 0);

/// Game timing constants (in milliseconds)
pub const TICK_MS: u32 = 16;
pub const BASE_DROP_MS: u32 = 1000;
pub const DROP_MS_PER_LEVEL: u32 = 100;
pub const DROP_INTERVAL_MIN_MS: u32 = 100;
pub const LOCK_DELAY_MS: u32 = 500;
pub const LOCK_RESET_LIMIT: u8 = 15;

/// How many upcoming pieces the engine exposes to players.
pub const QUEUE_PREVIEW: usize = 2;

/// Line clear base scores indexed by lines cleared (1-4).
pub const LINE_SCORES: [u32; 5] = [0, 100, 300, 500, 800];

/// Tetromino piece kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl PieceKind {
    pub const ALL: [PieceKind; 7] = [
        PieceKind::I,
        PieceKind::O,
        PieceKind::T,
        PieceKind::S,
        PieceKind::Z,
        PieceKind::J,
        PieceKind::L,
    ];

    /// Stable 1-based cell tag used in board snapshots (0 = empty).
    pub fn cell_tag(self) -> u8 {
        match self {
            PieceKind::I => 1,
            PieceKind::O => 2,
            PieceKind::T => 3,
            PieceKind::S => 4,
            PieceKind::Z => 5,
            PieceKind::J => 6,
            PieceKind::L => 7,
        }
    }
}

/// Rotation states, R0 = spawn orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
}

impl Rotation {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Clockwise neighbor: (index + 1) mod 4.
    pub fn cw(self) -> Self {
        match self {
            Rotation::R0 => Rotation::R1,
            Rotation::R1 => Rotation::R2,
            Rotation::R2 => Rotation::R3,
            Rotation::R3 => Rotation::R0,
        }
    }

    /// Counter-clockwise neighbor: (index + 3) mod 4.
    pub fn ccw(self) -> Self {
        match self {
            Rotation::R0 => Rotation::R3,
            Rotation::R3 => Rotation::R2,
            Rotation::R2 => Rotation::R1,
            Rotation::R1 => Rotation::R0,
        }
    }
}

/// Discrete input events fed into the engine.
///
/// Held keys are translated into repeated discrete events by the input
/// collaborator; the engine only ever sees this stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputEvent {
    MoveLeft,
    MoveRight,
    SoftDrop,
    HardDrop,
    RotateCw,
    RotateCcw,
    Hold,
    Pause,
    Restart,
}

/// Engine lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Running,
    Paused,
    GameOver,
}

/// Cell on the board (None = empty, Some = filled with piece kind)
pub type Cell = Option<PieceKind>;
