//! Move ordering.
//!
//! The picker scores every generated move into disjoint bands, then yields
//! them highest-first by selection sort. The bands realize the staged order:
//! hash move, winning or equal captures (by exchange score), killers, the
//! counter-move, quiets by history, and finally losing captures.

use std::sync::OnceLock;

use sable_core::{Board, Move, MoveKind, MoveList, PieceKind, PromotionPiece, Square};

use crate::search::heuristics::{HistoryTable, KillerTable};
use crate::search::see::see;

/// Which ordering stage a move came from. The searcher gates its quiet-move
/// prunings and reductions on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveClass {
    /// The transposition-table move.
    Hash,
    /// Capture or queen promotion that does not lose material.
    GoodCapture,
    /// A killer from this ply.
    Killer,
    /// The recorded refutation of the previous move.
    Counter,
    /// Plain quiet move (includes castling).
    Quiet,
    /// Capture that loses material, or an under-promotion.
    BadCapture,
}

/// Victim-major, attacker-minor capture weights.
fn mvv_lva(victim: PieceKind, attacker: PieceKind) -> i32 {
    const WEIGHT: [i32; 6] = [1, 3, 3, 5, 9, 0];
    WEIGHT[victim.index()] * 16 - WEIGHT[attacker.index()]
}

const HASH_SCORE: i32 = 1_000_000;
const QUEEN_PROMO_SCORE: i32 = 200_000;
const GOOD_CAPTURE_BASE: i32 = 100_000;
const KILLER_SCORE: i32 = 90_000;
const COUNTER_SCORE: i32 = 85_000;
const ESCAPE_BONUS: i32 = 20_000;
const BAD_CAPTURE_BASE: i32 = -200_000;

/// Yields scored moves highest-first without generating duplicates.
pub struct MovePicker<'a> {
    moves: &'a MoveList,
    scores: [i32; 256],
    classes: [MoveClass; 256],
    order: [u8; 256],
    cursor: usize,
    min_score: i32,
}

impl<'a> MovePicker<'a> {
    /// Full picker for the main search.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        board: &Board,
        moves: &'a MoveList,
        tt_move: Move,
        killers: &KillerTable,
        history: &HistoryTable,
        counter: Move,
        escape_sq: Option<Square>,
        ply: usize,
    ) -> MovePicker<'a> {
        let mut picker = MovePicker {
            moves,
            scores: [0; 256],
            classes: [MoveClass::Quiet; 256],
            order: [0; 256],
            cursor: 0,
            min_score: i32::MIN,
        };
        let killer_pair = killers.get(ply);
        let us = board.side_to_move();

        for (i, &mv) in moves.iter().enumerate() {
            picker.order[i] = i as u8;
            let (score, class) = if mv == tt_move {
                (HASH_SCORE, MoveClass::Hash)
            } else {
                match mv.kind() {
                    MoveKind::Promotion => {
                        if mv.promotion_piece() == PromotionPiece::Queen {
                            (QUEEN_PROMO_SCORE, MoveClass::GoodCapture)
                        } else {
                            (BAD_CAPTURE_BASE + 50, MoveClass::BadCapture)
                        }
                    }
                    MoveKind::EnPassant => {
                        (GOOD_CAPTURE_BASE + mvv_lva(PieceKind::Pawn, PieceKind::Pawn),
                         MoveClass::GoodCapture)
                    }
                    MoveKind::Castling => {
                        (history.score(us, PieceKind::King, mv.to().index()), MoveClass::Quiet)
                    }
                    MoveKind::Normal => {
                        if let Some(victim) = board.piece_on(mv.to()) {
                            let exchange = see(board, mv);
                            if exchange >= 0 {
                                let attacker =
                                    board.piece_on(mv.from()).unwrap_or(PieceKind::Pawn);
                                (GOOD_CAPTURE_BASE + mvv_lva(victim, attacker),
                                 MoveClass::GoodCapture)
                            } else {
                                (BAD_CAPTURE_BASE + exchange, MoveClass::BadCapture)
                            }
                        } else if mv == killer_pair[0] {
                            (KILLER_SCORE, MoveClass::Killer)
                        } else if mv == killer_pair[1] {
                            (KILLER_SCORE - 1, MoveClass::Killer)
                        } else if mv == counter {
                            (COUNTER_SCORE, MoveClass::Counter)
                        } else {
                            let piece = board.piece_on(mv.from()).unwrap_or(PieceKind::Pawn);
                            let mut score = history.score(us, piece, mv.to().index());
                            if escape_sq == Some(mv.from()) {
                                score += ESCAPE_BONUS;
                            }
                            (score, MoveClass::Quiet)
                        }
                    }
                }
            };
            picker.scores[i] = score;
            picker.classes[i] = class;
        }
        picker
    }

    /// Quiescence picker. Outside check only winning or equal tactical moves
    /// are yielded; in check every evasion is.
    pub fn quiescence(board: &Board, moves: &'a MoveList, in_check: bool) -> MovePicker<'a> {
        let mut picker = MovePicker {
            moves,
            scores: [0; 256],
            classes: [MoveClass::Quiet; 256],
            order: [0; 256],
            cursor: 0,
            min_score: if in_check { i32::MIN } else { 1 },
        };

        for (i, &mv) in moves.iter().enumerate() {
            picker.order[i] = i as u8;
            let (score, class) = match mv.kind() {
                MoveKind::Promotion => {
                    if mv.promotion_piece() == PromotionPiece::Queen {
                        (QUEEN_PROMO_SCORE, MoveClass::GoodCapture)
                    } else {
                        (0, MoveClass::Quiet)
                    }
                }
                MoveKind::EnPassant => {
                    (GOOD_CAPTURE_BASE + mvv_lva(PieceKind::Pawn, PieceKind::Pawn),
                     MoveClass::GoodCapture)
                }
                MoveKind::Castling => (0, MoveClass::Quiet),
                MoveKind::Normal => {
                    if let Some(victim) = board.piece_on(mv.to()) {
                        let exchange = see(board, mv);
                        if exchange >= 0 {
                            let attacker = board.piece_on(mv.from()).unwrap_or(PieceKind::Pawn);
                            (GOOD_CAPTURE_BASE + mvv_lva(victim, attacker),
                             MoveClass::GoodCapture)
                        } else {
                            (BAD_CAPTURE_BASE + exchange, MoveClass::BadCapture)
                        }
                    } else {
                        (0, MoveClass::Quiet)
                    }
                }
            };
            picker.scores[i] = score;
            picker.classes[i] = class;
        }
        picker
    }

    /// Next move in band order, or `None` when exhausted (or, for the
    /// quiescence picker outside check, when only quiet moves remain).
    pub fn next(&mut self) -> Option<(Move, MoveClass)> {
        if self.cursor >= self.moves.len() {
            return None;
        }

        let mut best = self.cursor;
        for i in (self.cursor + 1)..self.moves.len() {
            if self.scores[self.order[i] as usize] > self.scores[self.order[best] as usize] {
                best = i;
            }
        }
        let idx = self.order[best] as usize;
        if self.scores[idx] < self.min_score {
            return None;
        }

        self.order.swap(self.cursor, best);
        self.cursor += 1;
        Some((self.moves[idx], self.classes[idx]))
    }
}

// ---------------------------------------------------------------------------
// Late-move reduction table
// ---------------------------------------------------------------------------

static LMR: OnceLock<Box<[[[i32; 64]; 64]; 2]>> = OnceLock::new();

fn lmr_table() -> &'static [[[i32; 64]; 64]; 2] {
    LMR.get_or_init(|| {
        let mut table = Box::new([[[0i32; 64]; 64]; 2]);
        for depth in 1..64usize {
            for tried in 1..64usize {
                let r = ((depth as f64).ln() * (tried.min(63) as f64).ln() / 2.0) as i32;
                // A reduction may never drop below the horizon.
                table[0][depth][tried] = r.min(depth as i32 - 1);
                table[1][depth][tried] = (r - 1).min(depth as i32 - 1);
            }
        }
        table
    })
}

/// Reduction for the `tried`-th move at `depth`; PV nodes reduce one less.
/// May be zero or negative, in which case callers skip the reduction.
pub fn lmr_reduction(is_pv: bool, depth: i32, tried: usize) -> i32 {
    let d = depth.clamp(0, 63) as usize;
    lmr_table()[is_pv as usize][d][tried.min(63)]
}
