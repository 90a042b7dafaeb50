//! Deterministic piece generation.
//!
//! A small LCG drives a 7-bag shuffle: each bag holds one of every piece
//! kind in random order, so droughts are bounded at 12 pieces. Seeding the
//! generator reproduces the exact piece sequence, which the sync layer
//! relies on for per-player engines spawned from a session seed.

use crate::types::{PieceKind, QUEUE_PREVIEW};

/// Linear congruential generator (Numerical Recipes constants).
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(1664525)
            .wrapping_add(1013904223);
        self.state
    }

    /// Uniform-ish value in 0..n. Fine for bag shuffles, not for anything
    /// that needs statistical quality.
    pub fn next_range(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.next_range(i + 1);
            slice.swap(i, j);
        }
    }
}

/// 7-bag piece queue with a fixed-size preview window.
#[derive(Debug, Clone)]
pub struct PieceQueue {
    rng: SimpleRng,
    bag: Vec<PieceKind>,
}

impl PieceQueue {
    pub fn new(seed: u64) -> Self {
        let mut queue = Self {
            rng: SimpleRng::new(seed),
            bag: Vec::with_capacity(14),
        };
        queue.refill();
        queue
    }

    fn refill(&mut self) {
        let mut fresh = PieceKind::ALL;
        self.rng.shuffle(&mut fresh);
        // Prepend behind the current remainder so draw order is preserved.
        self.bag.splice(0..0, fresh.iter().rev().copied());
    }

    /// Draw the next piece, refilling the bag as it empties.
    pub fn next(&mut self) -> PieceKind {
        let kind = self.bag.pop().unwrap_or(PieceKind::I);
        if self.bag.len() < QUEUE_PREVIEW {
            self.refill();
        }
        kind
    }

    /// The upcoming pieces, nearest first.
    pub fn preview(&self) -> [PieceKind; QUEUE_PREVIEW] {
        let mut out = [PieceKind::I; QUEUE_PREVIEW];
        for (slot, kind) in out.iter_mut().zip(self.bag.iter().rev()) {
            *slot = *kind;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = PieceQueue::new(42);
        let mut b = PieceQueue::new(42);
        for _ in 0..50 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = PieceQueue::new(1);
        let mut b = PieceQueue::new(2);
        let seq_a: Vec<_> = (0..20).map(|_| a.next()).collect();
        let seq_b: Vec<_> = (0..20).map(|_| b.next()).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn every_bag_holds_all_seven_kinds() {
        let mut queue = PieceQueue::new(7);
        for _ in 0..10 {
            let bag: HashSet<PieceKind> = (0..7).map(|_| queue.next()).collect();
            assert_eq!(bag.len(), 7);
        }
    }

    #[test]
    fn preview_matches_upcoming_draws() {
        let mut queue = PieceQueue::new(99);
        let preview = queue.preview();
        for expected in preview {
            assert_eq!(queue.next(), expected);
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = SimpleRng::new(123);
        let mut values: Vec<u32> = (0..20).collect();
        rng.shuffle(&mut values);
        let mut sorted = values.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<u32>>());
    }
}
