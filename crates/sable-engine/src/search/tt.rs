//! Shared transposition table.
//!
//! Slots are pairs of `AtomicU64`s: the packed entry and the entry XORed
//! with the position key. Readers recompute the XOR and drop entries whose
//! key does not match, so a torn read from a concurrent writer can only
//! manifest as a cache miss. No locks anywhere.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use sable_core::Move;

use crate::search::negamax::MAX_EVAL;

/// What the stored score proves about the true value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    /// Empty slot.
    None = 0,
    /// Exact score from a PV node.
    Exact = 1,
    /// Score is a lower bound (the node failed high).
    Lower = 2,
    /// Score is an upper bound (the node failed low).
    Upper = 3,
}

impl Bound {
    const fn from_bits(bits: u64) -> Bound {
        match bits & 0x3 {
            1 => Bound::Exact,
            2 => Bound::Lower,
            3 => Bound::Upper,
            _ => Bound::None,
        }
    }
}

/// A decoded table hit.
#[derive(Debug, Clone, Copy)]
pub struct TtEntry {
    /// Best move from the stored search; null for upper bounds.
    pub best_move: Move,
    /// Stored score, already renormalized to the probing ply.
    pub score: i32,
    /// Depth the entry was searched to.
    pub depth: i32,
    /// Bound kind.
    pub bound: Bound,
}

/// Mate scores are stored relative to the storing node, not the root, so a
/// "mate in 3" found via two different paths hashes to the same entry.
fn score_to_tt(score: i32, ply: usize) -> i32 {
    if score > MAX_EVAL {
        score + ply as i32
    } else if score < -MAX_EVAL {
        score - ply as i32
    } else {
        score
    }
}

/// Reverse of [`score_to_tt`] at the probing ply.
fn score_from_tt(score: i32, ply: usize) -> i32 {
    if score > MAX_EVAL {
        score - ply as i32
    } else if score < -MAX_EVAL {
        score + ply as i32
    } else {
        score
    }
}

/// Packed layout: move(16) | score+32768(16) | depth(8) | bound(2) | generation(6).
fn pack(mv: Move, score: i32, depth: i32, bound: Bound, generation: u8) -> u64 {
    debug_assert!((-32_768..32_768).contains(&score));
    (mv.raw() as u64)
        | (((score + 32_768) as u64) << 16)
        | ((depth.clamp(0, 255) as u64) << 32)
        | ((bound as u64) << 40)
        | (((generation & 0x3F) as u64) << 42)
}

const fn unpack_move(data: u64) -> Move {
    Move::from_raw((data & 0xFFFF) as u16)
}

const fn unpack_score(data: u64) -> i32 {
    ((data >> 16 & 0xFFFF) as i32) - 32_768
}

const fn unpack_depth(data: u64) -> i32 {
    (data >> 32 & 0xFF) as i32
}

const fn unpack_bound(data: u64) -> Bound {
    Bound::from_bits(data >> 40)
}

const fn unpack_generation(data: u64) -> u8 {
    (data >> 42 & 0x3F) as u8
}

#[derive(Default)]
struct Slot {
    /// `key ^ data`; recomputed on read to validate the pair.
    check: AtomicU64,
    data: AtomicU64,
}

/// Fixed-size, power-of-two transposition table shared by all workers.
pub struct TranspositionTable {
    slots: Box<[Slot]>,
    mask: u64,
    generation: AtomicU8,
}

impl TranspositionTable {
    /// Allocate a table of roughly `mb` megabytes (rounded down to a power
    /// of two slot count).
    pub fn new(mb: usize) -> TranspositionTable {
        let bytes = mb.max(1) * 1024 * 1024;
        let count = (bytes / std::mem::size_of::<Slot>())
            .next_power_of_two()
            .max(2)
            >> 1;
        let slots: Box<[Slot]> = (0..count).map(|_| Slot::default()).collect();
        TranspositionTable {
            slots,
            mask: (count - 1) as u64,
            generation: AtomicU8::new(0),
        }
    }

    /// Zero every slot and restart the generation counter.
    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.check.store(0, Ordering::Relaxed);
            slot.data.store(0, Ordering::Relaxed);
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    /// Advance the generation. Called once per root search so replacement
    /// can prefer fresh entries.
    pub fn new_generation(&self) {
        let g = self.generation.load(Ordering::Relaxed);
        self.generation.store(g.wrapping_add(1) & 0x3F, Ordering::Relaxed);
    }

    #[inline]
    fn slot(&self, key: u64) -> &Slot {
        &self.slots[(key & self.mask) as usize]
    }

    /// Look up a position. Returns the decoded entry with the score
    /// renormalized to `ply`, or `None` on miss or torn read.
    pub fn probe(&self, key: u64, ply: usize) -> Option<TtEntry> {
        let slot = self.slot(key);
        let data = slot.data.load(Ordering::Relaxed);
        let check = slot.check.load(Ordering::Relaxed);
        if check ^ data != key {
            return None;
        }
        let bound = unpack_bound(data);
        if bound == Bound::None {
            return None;
        }
        Some(TtEntry {
            best_move: unpack_move(data),
            score: score_from_tt(unpack_score(data), ply),
            depth: unpack_depth(data),
            bound,
        })
    }

    /// The stored best move for a position, if any. Cheaper than a full
    /// probe when only ordering information is wanted.
    pub fn probe_move(&self, key: u64) -> Move {
        self.probe(key, 0).map_or(Move::NULL, |e| e.best_move)
    }

    /// Store an entry, mate-adjusting the score by `ply`.
    ///
    /// Replacement: a slot survives only against a shallower write of the
    /// same generation; new generations, deeper searches and exact bounds
    /// always win.
    pub fn store(&self, key: u64, mv: Move, score: i32, bound: Bound, depth: i32, ply: usize) {
        let generation = self.generation.load(Ordering::Relaxed);
        let slot = self.slot(key);

        let old_data = slot.data.load(Ordering::Relaxed);
        let old_check = slot.check.load(Ordering::Relaxed);
        let old_valid = old_check ^ old_data == key && unpack_bound(old_data) != Bound::None;
        let keep_old = old_valid
            && unpack_generation(old_data) == generation
            && depth < unpack_depth(old_data)
            && bound != Bound::Exact;
        if keep_old {
            return;
        }

        let data = pack(mv, score_to_tt(score, ply), depth, bound, generation);
        slot.data.store(data, Ordering::Relaxed);
        slot.check.store(key ^ data, Ordering::Relaxed);
    }

    /// Number of slots, for diagnostics.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl std::fmt::Debug for TranspositionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("slots", &self.slots.len())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::negamax::MATE;
    use sable_core::Square;

    fn mv() -> Move {
        Move::new(Square::E2, Square::E4)
    }

    #[test]
    fn store_probe_roundtrip() {
        let tt = TranspositionTable::new(1);
        let key = 0xDEAD_BEEF_1234_5678;
        tt.store(key, mv(), 120, Bound::Exact, 7, 0);

        let entry = tt.probe(key, 0).expect("stored entry must be found");
        assert_eq!(entry.best_move, mv());
        assert_eq!(entry.score, 120);
        assert_eq!(entry.depth, 7);
        assert_eq!(entry.bound, Bound::Exact);
    }

    #[test]
    fn miss_returns_none() {
        let tt = TranspositionTable::new(1);
        assert!(tt.probe(0x1234, 0).is_none());
    }

    #[test]
    fn negative_scores_roundtrip() {
        let tt = TranspositionTable::new(1);
        tt.store(42, mv(), -512, Bound::Upper, 3, 0);
        assert_eq!(tt.probe(42, 0).unwrap().score, -512);
    }

    #[test]
    fn mate_scores_renormalize_across_plies() {
        let tt = TranspositionTable::new(1);
        // Mate in 4 plies seen from the root, stored at ply 6.
        let score = MATE - 4;
        tt.store(99, mv(), score, Bound::Exact, 9, 6);

        // Probing at the same ply restores the same root-relative score.
        assert_eq!(tt.probe(99, 6).unwrap().score, score);
        // Probing closer to the root makes the mate look nearer.
        assert_eq!(tt.probe(99, 2).unwrap().score, score + 4);

        // Mated side mirrors.
        tt.store(100, mv(), -score, Bound::Exact, 9, 6);
        assert_eq!(tt.probe(100, 6).unwrap().score, -score);
    }

    #[test]
    fn deeper_write_replaces_shallower() {
        let tt = TranspositionTable::new(1);
        tt.store(7, mv(), 10, Bound::Lower, 3, 0);
        tt.store(7, Move::new(Square::D2, Square::D4), 30, Bound::Lower, 8, 0);
        let entry = tt.probe(7, 0).unwrap();
        assert_eq!(entry.depth, 8);
        assert_eq!(entry.score, 30);
    }

    #[test]
    fn shallower_write_does_not_replace() {
        let tt = TranspositionTable::new(1);
        tt.store(7, mv(), 10, Bound::Lower, 8, 0);
        tt.store(7, Move::new(Square::D2, Square::D4), 30, Bound::Lower, 3, 0);
        assert_eq!(tt.probe(7, 0).unwrap().depth, 8);
    }

    #[test]
    fn new_generation_allows_shallow_replacement() {
        let tt = TranspositionTable::new(1);
        tt.store(7, mv(), 10, Bound::Lower, 12, 0);
        tt.new_generation();
        tt.store(7, Move::new(Square::D2, Square::D4), 5, Bound::Lower, 2, 0);
        assert_eq!(tt.probe(7, 0).unwrap().depth, 2);
    }

    #[test]
    fn exact_bound_always_replaces() {
        let tt = TranspositionTable::new(1);
        tt.store(7, mv(), 10, Bound::Lower, 12, 0);
        tt.store(7, Move::new(Square::D2, Square::D4), 22, Bound::Exact, 2, 0);
        assert_eq!(tt.probe(7, 0).unwrap().bound, Bound::Exact);
    }

    #[test]
    fn clear_empties_the_table() {
        let tt = TranspositionTable::new(1);
        tt.store(7, mv(), 10, Bound::Exact, 5, 0);
        tt.clear();
        assert!(tt.probe(7, 0).is_none());
    }

    #[test]
    fn colliding_keys_do_not_alias() {
        let tt = TranspositionTable::new(1);
        let key_a = 0x0123_4567_89AB_CDEF;
        // Same slot (identical low bits), different key.
        let key_b = key_a ^ 0xFFFF_0000_0000_0000;
        tt.store(key_a, mv(), 10, Bound::Exact, 5, 0);
        assert!(tt.probe(key_b, 0).is_none(), "wrong-key probe must miss");
    }

    #[test]
    fn probe_move_without_full_hit() {
        let tt = TranspositionTable::new(1);
        assert!(tt.probe_move(55).is_null());
        tt.store(55, mv(), 10, Bound::Lower, 5, 0);
        assert_eq!(tt.probe_move(55), mv());
    }
}
