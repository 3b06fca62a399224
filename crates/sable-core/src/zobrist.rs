//! Zobrist keys, generated at compile time from a fixed seed.

use crate::board::Board;
use crate::castling::CastleRights;
use crate::color::Color;
use crate::piece::Piece;
use crate::square::{File, Square};

const SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// splitmix64 step. Returns (value, next state).
const fn splitmix64(state: u64) -> (u64, u64) {
    let next = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = next;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    (z ^ (z >> 31), next)
}

/// One flat table holding every key the hash needs:
/// 768 piece-square keys, 1 side key, 16 castling keys, 8 en-passant keys.
static KEYS: [u64; 768 + 1 + 16 + 8] = {
    let mut keys = [0u64; 793];
    let mut state = SEED;
    let mut i = 0;
    while i < keys.len() {
        let (val, next) = splitmix64(state);
        keys[i] = val;
        state = next;
        i += 1;
    }
    keys
};

/// Key for a colored piece on a square.
#[inline]
pub(crate) fn piece(piece: Piece, sq: Square) -> u64 {
    KEYS[piece.index() * 64 + sq.index()]
}

/// Key XORed in when Black is to move.
#[inline]
pub(crate) fn side() -> u64 {
    KEYS[768]
}

/// Key for a castling-rights configuration.
#[inline]
pub(crate) fn castling(rights: CastleRights) -> u64 {
    KEYS[769 + rights.bits() as usize]
}

/// Key for the en-passant file.
#[inline]
pub(crate) fn en_passant(file: File) -> u64 {
    KEYS[785 + file.index()]
}

/// Hash a board from scratch. Incremental updates in make-move must agree
/// with this function.
pub fn hash_from_scratch(board: &Board) -> u64 {
    let mut hash = 0u64;

    for p in Piece::ALL {
        for sq in board.pieces(p.kind()) & board.side(p.color()) {
            hash ^= piece(p, sq);
        }
    }

    if board.side_to_move() == Color::Black {
        hash ^= side();
    }

    hash ^= castling(board.castling());

    if let Some(ep) = board.en_passant() {
        hash ^= en_passant(ep.file());
    }

    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_unique_and_nonzero() {
        let mut sorted = KEYS.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), KEYS.len(), "zobrist keys collide");
        assert!(sorted.iter().all(|&k| k != 0));
    }

    #[test]
    fn starting_position_matches_from_scratch() {
        let board = Board::starting_position();
        assert_eq!(board.hash(), hash_from_scratch(&board));
        assert_ne!(board.hash(), 0);
    }

    #[test]
    fn side_to_move_changes_hash() {
        let white: Board = "4k3/8/8/8/8/8/8/4K3 w - - 0 1".parse().unwrap();
        let black: Board = "4k3/8/8/8/8/8/8/4K3 b - - 0 1".parse().unwrap();
        assert_ne!(white.hash(), black.hash());
    }
}
