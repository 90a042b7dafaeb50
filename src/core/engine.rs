//! Engine module - the complete single-player state machine
//!
//! Ties together board, pieces, RNG, and scoring. The engine is driven by
//! two entry points: `apply_event` for player input and `tick` for time.
//! Both are only honored in the Running phase (except pause and restart),
//! so a host can gate remote input with phase checks in one place.

use arrayvec::ArrayVec;

use crate::core::board::Board;
use crate::core::pieces::{shape, try_rotate};
use crate::core::rng::PieceQueue;
use crate::core::scoring::{drop_interval_ms, level_for_lines, line_clear_points};
use crate::types::{
    InputEvent, Phase, PieceKind, Rotation, LOCK_DELAY_MS, LOCK_RESET_LIMIT, QUEUE_PREVIEW,
    SPAWN_POSITION,
};

/// Active falling piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallingPiece {
    pub kind: PieceKind,
    pub rotation: Rotation,
    pub x: i8,
    pub y: i8,
}

impl FallingPiece {
    pub fn spawn(kind: PieceKind) -> Self {
        Self {
            kind,
            rotation: Rotation::R0,
            x: SPAWN_POSITION.0,
            y: SPAWN_POSITION.1,
        }
    }

    pub fn minos(&self) -> [(i8, i8); 4] {
        shape(self.kind, self.rotation)
    }

    /// True when something blocks the cell directly below any mino.
    pub fn is_grounded(&self, board: &Board) -> bool {
        self.minos()
            .iter()
            .any(|&(mx, my)| board.is_occupied(self.x + mx, self.y + my + 1))
    }
}

/// What a lock produced, consumed once by the session layer to emit
/// line-clear and game-over notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOutcome {
    pub cleared_rows: ArrayVec<usize, 4>,
    pub points: u64,
    /// Combo count after this lock.
    pub combo: u32,
    pub topped_out: bool,
}

/// Deterministic game engine for one player.
///
/// Identical seeds and identical event/tick sequences produce identical
/// states, which is what lets tests replay a remote game locally.
#[derive(Debug, Clone)]
pub struct Engine {
    board: Board,
    active: Option<FallingPiece>,
    hold: Option<PieceKind>,
    next_queue: [PieceKind; QUEUE_PREVIEW],
    queue: PieceQueue,
    seed: u64,
    phase: Phase,
    score: u64,
    lines: u64,
    level: u32,
    combo: u32,
    can_hold: bool,
    drop_timer_ms: u64,
    lock_timer_ms: u64,
    lock_reset_count: u8,
    last_outcome: Option<LockOutcome>,
}

impl Engine {
    /// Create a running engine and spawn the first piece.
    pub fn new(seed: u64) -> Self {
        let queue = PieceQueue::new(seed);
        let next_queue = queue.preview();
        let mut engine = Self {
            board: Board::new(),
            active: None,
            hold: None,
            next_queue,
            queue,
            seed,
            phase: Phase::Running,
            score: 0,
            lines: 0,
            level: 0,
            combo: 0,
            can_hold: true,
            drop_timer_ms: 0,
            lock_timer_ms: 0,
            lock_reset_count: 0,
            last_outcome: None,
        };
        engine.spawn_piece();
        engine
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn can_hold(&self) -> bool {
        self.can_hold
    }

    pub fn hold_piece(&self) -> Option<PieceKind> {
        self.hold
    }

    pub fn next_queue(&self) -> &[PieceKind; QUEUE_PREVIEW] {
        &self.next_queue
    }

    pub fn active(&self) -> Option<FallingPiece> {
        self.active
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    #[cfg(test)]
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    #[cfg(test)]
    pub fn set_combo(&mut self, combo: u32) {
        self.combo = combo;
    }

    /// Row where the active piece would rest if dropped now.
    pub fn ghost_y(&self) -> Option<i8> {
        let active = self.active?;
        Some(
            self.board
                .drop_y(active.kind, active.rotation, active.x, active.y),
        )
    }

    /// Take and clear the outcome of the most recent lock.
    pub fn take_last_outcome(&mut self) -> Option<LockOutcome> {
        self.last_outcome.take()
    }

    fn spawn_piece(&mut self) -> bool {
        let kind = self.queue.next();
        self.next_queue = self.queue.preview();

        let piece = FallingPiece::spawn(kind);
        if !self
            .board
            .can_place(piece.kind, piece.rotation, piece.x, piece.y)
        {
            self.phase = Phase::GameOver;
            self.active = None;
            return false;
        }

        self.active = Some(piece);
        self.can_hold = true;
        self.drop_timer_ms = 0;
        self.lock_timer_ms = 0;
        self.lock_reset_count = 0;
        true
    }

    fn try_move(&mut self, dx: i8, dy: i8) -> bool {
        let Some(active) = self.active else {
            return false;
        };

        if !self
            .board
            .can_place(active.kind, active.rotation, active.x + dx, active.y + dy)
        {
            return false;
        }

        self.active = Some(FallingPiece {
            x: active.x + dx,
            y: active.y + dy,
            ..active
        });

        // Successful movement while grounded restarts the lock countdown,
        // capped so a piece cannot stall forever.
        if self.is_grounded() {
            self.reset_lock_timer();
        } else {
            self.lock_timer_ms = 0;
        }

        true
    }

    fn rotate(&mut self, clockwise: bool) -> bool {
        let Some(active) = self.active else {
            return false;
        };

        let result = try_rotate(
            active.kind,
            active.rotation,
            active.x,
            active.y,
            clockwise,
            |x, y| self.board.is_open(x, y),
        );

        let Some((rotation, (dx, dy))) = result else {
            return false;
        };

        self.active = Some(FallingPiece {
            rotation,
            x: active.x + dx,
            y: active.y + dy,
            ..active
        });
        if self.is_grounded() {
            self.reset_lock_timer();
        }
        true
    }

    fn reset_lock_timer(&mut self) {
        if self.lock_reset_count < LOCK_RESET_LIMIT {
            self.lock_timer_ms = 0;
            self.lock_reset_count += 1;
        }
    }

    pub fn is_grounded(&self) -> bool {
        match self.active {
            Some(piece) => piece.is_grounded(&self.board),
            None => false,
        }
    }

    fn hard_drop(&mut self) -> bool {
        let Some(active) = self.active else {
            return false;
        };

        let rest_y = self
            .board
            .drop_y(active.kind, active.rotation, active.x, active.y);
        self.active = Some(FallingPiece {
            y: rest_y,
            ..active
        });
        self.lock_piece();
        true
    }

    fn hold(&mut self) -> bool {
        if !self.can_hold {
            return false;
        }
        let Some(active) = self.active else {
            return false;
        };

        match self.hold.take() {
            Some(stored) => {
                let piece = FallingPiece::spawn(stored);
                if !self
                    .board
                    .can_place(piece.kind, piece.rotation, piece.x, piece.y)
                {
                    self.hold = Some(stored);
                    return false;
                }
                self.hold = Some(active.kind);
                self.active = Some(piece);
                self.drop_timer_ms = 0;
                self.lock_timer_ms = 0;
                self.lock_reset_count = 0;
            }
            None => {
                self.hold = Some(active.kind);
                self.spawn_piece();
            }
        }

        self.can_hold = false;
        true
    }

    /// Commit the active piece, clear rows, score, and spawn the next piece.
    fn lock_piece(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        self.board
            .commit(active.kind, active.rotation, active.x, active.y);

        let cleared = self.board.clear_full_rows();
        let mut points = 0;
        if cleared.is_empty() {
            self.combo = 0;
        } else {
            points = line_clear_points(cleared.len(), self.combo);
            self.combo += 1;
            self.score += points;
            self.lines += cleared.len() as u64;
            self.level = level_for_lines(self.lines);
        }

        let spawned = self.spawn_piece();

        self.last_outcome = Some(LockOutcome {
            cleared_rows: cleared,
            points,
            combo: self.combo,
            topped_out: !spawned,
        });
    }

    /// Reset to a fresh game with the same seed.
    pub fn restart(&mut self) {
        *self = Self::new(self.seed);
    }

    /// Apply one input event. Returns true when it changed the state.
    ///
    /// Pause and restart work in any phase; everything else is dropped
    /// unless the game is running.
    pub fn apply_event(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::Pause => {
                self.phase = match self.phase {
                    Phase::Running => Phase::Paused,
                    Phase::Paused => Phase::Running,
                    Phase::GameOver => return false,
                };
                true
            }
            InputEvent::Restart => {
                self.restart();
                true
            }
            _ if self.phase != Phase::Running => false,
            InputEvent::MoveLeft => self.try_move(-1, 0),
            InputEvent::MoveRight => self.try_move(1, 0),
            InputEvent::SoftDrop => {
                let moved = self.try_move(0, 1);
                if moved {
                    self.drop_timer_ms = 0;
                }
                moved
            }
            InputEvent::HardDrop => self.hard_drop(),
            InputEvent::RotateCw => self.rotate(true),
            InputEvent::RotateCcw => self.rotate(false),
            InputEvent::Hold => self.hold(),
        }
    }

    /// Advance time. Gravity steps the piece down one row per interval;
    /// a grounded piece locks after the lock delay expires.
    pub fn tick(&mut self, elapsed_ms: u64) {
        if self.phase != Phase::Running {
            return;
        }
        let Some(_) = self.active else {
            return;
        };

        if self.is_grounded() {
            self.lock_timer_ms += elapsed_ms;
            if self.lock_timer_ms >= u64::from(LOCK_DELAY_MS) {
                self.lock_piece();
            }
            return;
        }

        self.lock_timer_ms = 0;
        self.drop_timer_ms += elapsed_ms;
        let interval = drop_interval_ms(self.level);
        while self.drop_timer_ms >= interval {
            self.drop_timer_ms -= interval;
            if !self.try_move(0, 1) {
                // Landed mid-step; the lock countdown starts next tick.
                self.drop_timer_ms = 0;
                break;
            }
            if self.is_grounded() {
                self.drop_timer_ms = 0;
                break;
            }
        }
    }
}
