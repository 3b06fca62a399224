//! Static evaluation: material plus tapered piece-square tables.
//!
//! Deliberately small — the search carries the engine. Scores are from the
//! side to move's perspective, in centipawns, and never reach the mate
//! envelope.

use sable_core::{Board, Color, PieceKind};

use crate::search::negamax::MAX_EVAL;

/// (middlegame, endgame) material values, pawn through queen.
const MATERIAL: [(i32, i32); 5] = [(82, 94), (337, 281), (365, 297), (477, 512), (1025, 936)];

/// Game-phase weight per piece kind; 24 = all minors and majors on the board.
const PHASE: [i32; 6] = [0, 1, 1, 2, 4, 0];

#[rustfmt::skip]
const PAWN_PST: [i32; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
     -5,  -2,  -8, -18, -18,  -8,  -2,  -5,
     -6,  -4,  -2,   4,   4,  -2,  -4,  -6,
     -8,  -2,   6,  18,  18,   6,  -2,  -8,
     -4,   2,  10,  20,  20,  10,   2,  -4,
     10,  14,  22,  26,  26,  22,  14,  10,
     55,  60,  60,  60,  60,  60,  60,  55,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const KNIGHT_PST: [i32; 64] = [
    -45, -30, -20, -15, -15, -20, -30, -45,
    -28, -12,   0,   4,   4,   0, -12, -28,
    -16,   4,  12,  16,  16,  12,   4, -16,
    -10,   6,  18,  24,  24,  18,   6, -10,
    -10,   8,  20,  26,  26,  20,   8, -10,
    -14,   4,  14,  20,  20,  14,   4, -14,
    -26, -10,   2,   6,   6,   2, -10, -26,
    -50, -28, -16, -12, -12, -16, -28, -50,
];

#[rustfmt::skip]
const BISHOP_PST: [i32; 64] = [
    -18,  -8, -10,  -6,  -6, -10,  -8, -18,
     -4,  10,   4,   6,   6,   4,  10,  -4,
      0,   8,  10,   8,   8,  10,   8,   0,
      0,   6,  10,  14,  14,  10,   6,   0,
      2,   6,  12,  14,  14,  12,   6,   2,
      0,   8,  10,  10,  10,  10,   8,   0,
     -6,   4,   4,   2,   2,   4,   4,  -6,
    -16,  -6,  -8,  -8,  -8,  -8,  -6, -16,
];

#[rustfmt::skip]
const ROOK_PST: [i32; 64] = [
     -4,  -2,   2,   6,   6,   2,  -2,  -4,
    -10,  -4,   0,   4,   4,   0,  -4, -10,
    -10,  -4,   0,   2,   2,   0,  -4, -10,
     -8,  -2,   0,   4,   4,   0,  -2,  -8,
     -6,   0,   4,   6,   6,   4,   0,  -6,
     -2,   4,   8,  10,  10,   8,   4,  -2,
     12,  16,  20,  22,  22,  20,  16,  12,
      6,   8,  10,  10,  10,  10,   8,   6,
];

#[rustfmt::skip]
const QUEEN_PST: [i32; 64] = [
    -14,  -8,  -6,   2,   2,  -6,  -8, -14,
     -8,   0,   4,   4,   4,   4,   0,  -8,
     -6,   2,   6,   6,   6,   6,   2,  -6,
      0,   4,   6,   8,   8,   6,   4,   0,
      0,   4,   6,   8,   8,   6,   4,   0,
     -4,   2,   6,   6,   6,   6,   2,  -4,
     -8,   0,   4,   4,   4,   4,   0,  -8,
    -14,  -8,  -4,   0,   0,  -4,  -8, -14,
];

#[rustfmt::skip]
const KING_MG_PST: [i32; 64] = [
     22,  30,  12,  -8,  -8,  12,  32,  24,
     14,  12,  -6, -22, -22,  -6,  12,  14,
    -14, -20, -28, -34, -34, -28, -20, -14,
    -28, -32, -38, -46, -46, -38, -32, -28,
    -36, -40, -46, -52, -52, -46, -40, -36,
    -40, -44, -50, -56, -56, -50, -44, -40,
    -44, -48, -52, -58, -58, -52, -48, -44,
    -48, -52, -56, -60, -60, -56, -52, -48,
];

#[rustfmt::skip]
const KING_EG_PST: [i32; 64] = [
    -40, -28, -20, -14, -14, -20, -28, -40,
    -24, -12,  -4,   2,   2,  -4, -12, -24,
    -16,  -2,   8,  14,  14,   8,  -2, -16,
    -12,   4,  16,  22,  22,  16,   4, -12,
    -12,   4,  16,  22,  22,  16,   4, -12,
    -16,  -2,   8,  14,  14,   8,  -2, -16,
    -26, -12,  -4,   2,   2,  -4, -12, -26,
    -42, -30, -22, -16, -16, -22, -30, -42,
];

/// Piece-square bonus for `kind` on `sq` from white's perspective.
/// King tables differ between phases; other pieces share one table.
fn pst(kind: PieceKind, sq: usize, endgame: bool) -> i32 {
    match kind {
        PieceKind::Pawn => PAWN_PST[sq],
        PieceKind::Knight => KNIGHT_PST[sq],
        PieceKind::Bishop => BISHOP_PST[sq],
        PieceKind::Rook => ROOK_PST[sq],
        PieceKind::Queen => QUEEN_PST[sq],
        PieceKind::King => {
            if endgame {
                KING_EG_PST[sq]
            } else {
                KING_MG_PST[sq]
            }
        }
    }
}

/// Mirror a square index vertically (a1 <-> a8).
#[inline]
fn flip(sq: usize) -> usize {
    sq ^ 56
}

/// Evaluate the position from the side to move's perspective.
///
/// Tapered between middlegame and endgame by remaining piece material.
/// The result stays strictly inside the mate envelope.
pub fn evaluate(board: &Board) -> i32 {
    let mut mg = 0i32;
    let mut eg = 0i32;
    let mut phase = 0i32;

    for color in Color::ALL {
        let sign = if color == Color::White { 1 } else { -1 };
        for kind in PieceKind::ALL {
            for sq in board.pieces(kind) & board.side(color) {
                let idx = match color {
                    Color::White => sq.index(),
                    Color::Black => flip(sq.index()),
                };
                if kind != PieceKind::King {
                    let (m, e) = MATERIAL[kind.index()];
                    mg += sign * m;
                    eg += sign * e;
                }
                mg += sign * pst(kind, idx, false);
                eg += sign * pst(kind, idx, true);
                phase += PHASE[kind.index()];
            }
        }
    }

    let phase = phase.min(24);
    let white_score = (mg * phase + eg * (24 - phase)) / 24;

    let score = match board.side_to_move() {
        Color::White => white_score,
        Color::Black => -white_score,
    };
    score.clamp(-MAX_EVAL + 1, MAX_EVAL - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White's static score regardless of whose turn it is.
    fn white_relative(board: &Board) -> i32 {
        match board.side_to_move() {
            Color::White => evaluate(board),
            Color::Black => -evaluate(board),
        }
    }

    #[test]
    fn starting_position_is_balanced() {
        let board = Board::starting_position();
        assert_eq!(evaluate(&board), 0, "symmetric position must score zero");
    }

    #[test]
    fn extra_queen_dominates() {
        let board: Board = "4k3/8/8/8/8/8/8/3QK3 w - - 0 1".parse().unwrap();
        assert!(evaluate(&board) > 800);
    }

    #[test]
    fn score_negates_with_side_to_move() {
        let white: Board = "4k3/8/8/8/8/8/8/3QK3 w - - 0 1".parse().unwrap();
        let black: Board = "4k3/8/8/8/8/8/8/3QK3 b - - 0 1".parse().unwrap();
        assert_eq!(evaluate(&white), -evaluate(&black));
    }

    #[test]
    fn stays_inside_mate_envelope() {
        // Nine queens against a bare king.
        let board: Board = "QQQQQQQ1/QQ6/8/8/8/8/8/k3K3 w - - 0 1".parse().unwrap();
        let score = white_relative(&board);
        assert!(score < MAX_EVAL);
        assert!(score > 5_000);
    }

    #[test]
    fn central_knight_beats_rim_knight() {
        let center: Board = "4k3/8/8/8/4N3/8/8/4K3 w - - 0 1".parse().unwrap();
        let rim: Board = "4k3/8/8/8/N7/8/8/4K3 w - - 0 1".parse().unwrap();
        assert!(evaluate(&center) > evaluate(&rim));
    }
}
