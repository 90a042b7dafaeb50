//! Wire-friendly view of one player's game.
//!
//! Snapshots are what the host broadcasts every tick: plain data, serde
//! serializable, no references into the engine. The board grid covers the
//! visible rows only; the active piece keeps full-grid coordinates, so its
//! minos can sit above the visible area right after spawning (grid row 0 is
//! the top of the hidden buffer, visible rows start at `BOARD_BUFFER_ROWS`).

use serde::{Deserialize, Serialize};

use crate::core::engine::{Engine, FallingPiece};
use crate::types::{
    Phase, PieceKind, Rotation, BOARD_BUFFER_ROWS, BOARD_VISIBLE_HEIGHT, BOARD_WIDTH,
    QUEUE_PREVIEW,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePiece {
    pub kind: PieceKind,
    pub rotation: Rotation,
    pub x: i8,
    pub y: i8,
}

impl From<FallingPiece> for ActivePiece {
    fn from(value: FallingPiece) -> Self {
        Self {
            kind: value.kind,
            rotation: value.rotation,
            x: value.x,
            y: value.y,
        }
    }
}

/// Complete render state for one player. Cell values are 0 for empty and
/// `PieceKind::cell_tag()` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub board: [[u8; BOARD_WIDTH as usize]; BOARD_VISIBLE_HEIGHT as usize],
    pub active: Option<ActivePiece>,
    pub ghost_y: Option<i8>,
    pub hold: Option<PieceKind>,
    pub can_hold: bool,
    pub next: [PieceKind; QUEUE_PREVIEW],
    pub score: u64,
    pub lines: u64,
    pub level: u32,
    pub combo: u32,
    pub phase: Phase,
}

impl PlayerSnapshot {
    pub fn capture(engine: &Engine) -> Self {
        let mut board = [[0u8; BOARD_WIDTH as usize]; BOARD_VISIBLE_HEIGHT as usize];
        let cells = engine.board().cells();
        let width = BOARD_WIDTH as usize;
        for (row, out_row) in board.iter_mut().enumerate() {
            let grid_row = row + BOARD_BUFFER_ROWS as usize;
            for (col, out_cell) in out_row.iter_mut().enumerate() {
                *out_cell = match cells[grid_row * width + col] {
                    Some(kind) => kind.cell_tag(),
                    None => 0,
                };
            }
        }

        Self {
            board,
            active: engine.active().map(ActivePiece::from),
            ghost_y: engine.ghost_y(),
            hold: engine.hold_piece(),
            can_hold: engine.can_hold(),
            next: *engine.next_queue(),
            score: engine.score(),
            lines: engine.lines(),
            level: engine.level(),
            combo: engine.combo(),
            phase: engine.phase(),
        }
    }

    pub fn playable(&self) -> bool {
        self.phase == Phase::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InputEvent;

    #[test]
    fn capture_reflects_engine_state() {
        let mut engine = Engine::new(5);
        engine.apply_event(InputEvent::MoveRight);
        let snap = PlayerSnapshot::capture(&engine);

        let active = engine.active().unwrap();
        assert_eq!(snap.active.unwrap().x, active.x);
        assert_eq!(snap.next, *engine.next_queue());
        assert_eq!(snap.phase, Phase::Running);
        assert!(snap.playable());
        // Nothing locked yet, the visible board is empty.
        assert!(snap.board.iter().flatten().all(|&c| c == 0));
    }

    #[test]
    fn locked_cells_show_up_in_the_grid() {
        let mut engine = Engine::new(5);
        let kind = engine.active().unwrap().kind;
        engine.apply_event(InputEvent::HardDrop);
        engine.take_last_outcome();

        let snap = PlayerSnapshot::capture(&engine);
        let tagged: Vec<u8> = snap
            .board
            .iter()
            .flatten()
            .copied()
            .filter(|&c| c != 0)
            .collect();
        assert_eq!(tagged.len(), 4);
        assert!(tagged.iter().all(|&c| c == kind.cell_tag()));
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let engine = Engine::new(5);
        let snap = PlayerSnapshot::capture(&engine);
        let json = serde_json::to_string(&snap).unwrap();
        let back: PlayerSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
