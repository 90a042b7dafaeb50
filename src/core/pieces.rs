//! Piece catalog - tetromino shapes and SRS rotation system
//!
//! Shapes and kick offsets live in precomputed immutable tables indexed by
//! (kind, rotation); nothing here is resolved at runtime via lookup maps.
//! Kick data follows the Standard Rotation System: https://tetris.wiki/SRS

use crate::types::{PieceKind, Rotation};

/// Offset of a single mino relative to the piece's top-left anchor.
pub type MinoOffset = (i8, i8);

/// Shape of a piece - 4 mino offsets from the anchor.
pub type PieceShape = [MinoOffset; 4];

/// Shape tables indexed by rotation, derived from the canonical 4x4
/// occupancy matrices (row 0 at the top).
const I_SHAPES: [PieceShape; 4] = [
    [(0, 1), (1, 1), (2, 1), (3, 1)],
    [(2, 0), (2, 1), (2, 2), (2, 3)],
    [(0, 2), (1, 2), (2, 2), (3, 2)],
    [(1, 0), (1, 1), (1, 2), (1, 3)],
];

const O_SHAPES: [PieceShape; 4] = [[(1, 0), (2, 0), (1, 1), (2, 1)]; 4];

const T_SHAPES: [PieceShape; 4] = [
    [(1, 0), (0, 1), (1, 1), (2, 1)],
    [(1, 0), (1, 1), (2, 1), (1, 2)],
    [(0, 1), (1, 1), (2, 1), (1, 2)],
    [(1, 0), (0, 1), (1, 1), (1, 2)],
];

const S_SHAPES: [PieceShape; 4] = [
    [(1, 0), (2, 0), (0, 1), (1, 1)],
    [(1, 0), (1, 1), (2, 1), (2, 2)],
    [(1, 1), (2, 1), (0, 2), (1, 2)],
    [(0, 0), (0, 1), (1, 1), (1, 2)],
];

const Z_SHAPES: [PieceShape; 4] = [
    [(0, 0), (1, 0), (1, 1), (2, 1)],
    [(2, 0), (1, 1), (2, 1), (1, 2)],
    [(0, 1), (1, 1), (1, 2), (2, 2)],
    [(1, 0), (0, 1), (1, 1), (0, 2)],
];

const J_SHAPES: [PieceShape; 4] = [
    [(0, 0), (0, 1), (1, 1), (2, 1)],
    [(1, 0), (2, 0), (1, 1), (1, 2)],
    [(0, 1), (1, 1), (2, 1), (2, 2)],
    [(1, 0), (1, 1), (0, 2), (1, 2)],
];

const L_SHAPES: [PieceShape; 4] = [
    [(2, 0), (0, 1), (1, 1), (2, 1)],
    [(1, 0), (1, 1), (1, 2), (2, 2)],
    [(0, 1), (1, 1), (2, 1), (0, 2)],
    [(0, 0), (1, 0), (1, 1), (1, 2)],
];

/// Shape (mino offsets) for a piece kind at a given rotation.
pub fn shape(kind: PieceKind, rotation: Rotation) -> PieceShape {
    let table = match kind {
        PieceKind::I => &I_SHAPES,
        PieceKind::O => &O_SHAPES,
        PieceKind::T => &T_SHAPES,
        PieceKind::S => &S_SHAPES,
        PieceKind::Z => &Z_SHAPES,
        PieceKind::J => &J_SHAPES,
        PieceKind::L => &L_SHAPES,
    };
    table[rotation.index()]
}

/// Ordered kick offsets per rotation transition.
/// Index layout: see [`kick_index`]. Entry 0 is always the trivial (0,0).
pub type KickTable = [[(i8, i8); 5]; 8];

/// O never visually rotates; its only offset is trivial.
const O_KICKS: KickTable = [[(0, 0); 5]; 8];

/// Shared by J, L, S, T, Z.
const JLSTZ_KICKS: KickTable = [
    // R0->R1
    [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)],
    // R0->R3
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],
    // R1->R0
    [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],
    // R1->R2
    [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],
    // R2->R1
    [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)],
    // R2->R3
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],
    // R3->R2
    [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],
    // R3->R0
    [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],
];

/// I has its own table.
const I_KICKS: KickTable = [
    // R0->R1
    [(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)],
    // R0->R3
    [(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)],
    // R1->R0
    [(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)],
    // R1->R2
    [(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)],
    // R2->R1
    [(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)],
    // R2->R3
    [(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)],
    // R3->R2
    [(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)],
    // R3->R0
    [(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)],
];

fn kick_table(kind: PieceKind) -> &'static KickTable {
    match kind {
        PieceKind::O => &O_KICKS,
        PieceKind::I => &I_KICKS,
        _ => &JLSTZ_KICKS,
    }
}

/// Row index into a [`KickTable`] for a (from, direction) transition.
fn kick_index(from: Rotation, clockwise: bool) -> usize {
    match (from, clockwise) {
        (Rotation::R0, true) => 0,
        (Rotation::R0, false) => 1,
        (Rotation::R1, false) => 2,
        (Rotation::R1, true) => 3,
        (Rotation::R2, false) => 4,
        (Rotation::R2, true) => 5,
        (Rotation::R3, false) => 6,
        (Rotation::R3, true) => 7,
    }
}

/// Try to rotate a piece, testing kick offsets in table order.
///
/// `is_open` reports whether a board cell can accept a mino. Returns the new
/// rotation and the accepted (dx, dy), or None when every offset collides -
/// a silent rejection, not an error.
pub fn try_rotate(
    kind: PieceKind,
    rotation: Rotation,
    x: i8,
    y: i8,
    clockwise: bool,
    is_open: impl Fn(i8, i8) -> bool,
) -> Option<(Rotation, (i8, i8))> {
    let target = if clockwise { rotation.cw() } else { rotation.ccw() };
    let minos = shape(kind, target);
    let kicks = &kick_table(kind)[kick_index(rotation, clockwise)];

    for &(dx, dy) in kicks {
        let fits = minos
            .iter()
            .all(|&(mx, my)| is_open(x + dx + mx, y + dy + my));
        if fits {
            return Some((target, (dx, dy)));
        }
    }

    None
}
