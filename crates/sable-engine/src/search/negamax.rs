//! The node searcher and iterative-deepening driver.
//!
//! Fail-soft negamax with a shared transposition table, null-move pruning
//! with verification, razoring, static null-move pruning, futility and
//! late-move pruning, late-move reductions, internal iterative deepening,
//! check/recapture/pawn-push extensions and principal variation search.

use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use sable_core::{Bitboard, Board, Color, Move, MoveKind, PieceKind, Square, generate_moves};

use crate::eval::evaluate;
use crate::search::control::SearchControl;
use crate::search::heuristics::{CounterMoveTable, HistoryTable, KillerTable};
use crate::search::ordering::{MoveClass, MovePicker, lmr_reduction};
use crate::search::pv::PvTable;
use crate::search::tt::{Bound, TranspositionTable};
use crate::search::{SearchInfo, SearchParams, SearchResult};

/// Larger than any reachable score.
pub const INF: i32 = 30_000;

/// Mate at the root; mate in `k` plies scores `MATE - k`.
pub const MATE: i32 = 29_000;

/// Upper bound for static evaluations; larger magnitudes mean forced mate.
pub const MAX_EVAL: i32 = 28_000;

/// Hard ceiling on search depth.
pub const MAX_PLY: usize = 64;

/// Static null-move pruning applies at `depth <= SNP_DEPTH`.
const SNP_DEPTH: i32 = 3;

/// Razoring applies at `depth <= RAZOR_DEPTH`.
const RAZOR_DEPTH: i32 = 4;

/// Futility pruning applies at `depth <= FUTILITY_DEPTH`.
const FUTILITY_DEPTH: i32 = 6;

const RAZOR_MARGIN: [i32; 5] = [0, 300, 360, 420, 480];
const FUTILITY_MARGIN: [i32; 7] = [0, 100, 160, 220, 280, 340, 400];

/// Per-worker search state. Heuristic tables are private to the worker;
/// the transposition table, node counter, depth ceiling and control are the
/// only shared pieces.
pub(crate) struct SearchContext<'a> {
    pub tt: &'a TranspositionTable,
    pub control: &'a SearchControl,
    /// Node counter shared by every worker (relaxed increments).
    pub shared_nodes: &'a AtomicU64,
    /// Highest iteration completed by any worker; only ever raised.
    pub depth_reached: &'a AtomicI32,
    /// Hashes of every game position up to and including the root.
    pub game_history: &'a [u64],
    /// Hashes along the current search path, indexed by ply.
    pub path: [u64; MAX_PLY],
    /// Locally counted nodes (drives the clock-poll cadence).
    pub nodes: u64,
    pub pv: PvTable,
    pub killers: KillerTable,
    pub history: HistoryTable,
    pub counters: CounterMoveTable,
    pub params: SearchParams,
    /// The side the engine is playing; draws score contempt-relative to it.
    pub engine_side: Color,
    pub root_depth: i32,
    /// Set once the root has seen a second legal move.
    pub root_choice: bool,
    pub info: &'a mut dyn FnMut(SearchInfo<'_>),
}

impl SearchContext<'_> {
    fn draw_score(&self, board: &Board) -> i32 {
        if board.side_to_move() == self.engine_side {
            -self.params.contempt
        } else {
            self.params.contempt
        }
    }
}

/// Fifty-move rule, insufficient material, or a repetition of any earlier
/// position on the search path or in the game history.
fn is_draw(board: &Board, ctx: &SearchContext, ply: usize) -> bool {
    if board.halfmove_clock() >= 100 {
        return true;
    }
    if board.insufficient_material() {
        return true;
    }
    let hash = board.hash();
    ctx.path[..ply.min(MAX_PLY)].iter().rev().any(|&h| h == hash)
        || ctx.game_history.iter().rev().any(|&h| h == hash)
}

/// History, killer and counter-move bookkeeping for a quiet move that
/// caused (or headed) a cutoff.
fn update_quiet_history(ctx: &mut SearchContext, board: &Board, last_move: Move, mv: Move, depth: i32, ply: usize) {
    if mv.is_null() || mv.kind() != MoveKind::Normal || board.piece_on(mv.to()).is_some() {
        return;
    }
    let piece = board.piece_on(mv.from()).unwrap_or(PieceKind::Pawn);
    ctx.history.reward(board.side_to_move(), piece, mv.to().index(), depth);
    ctx.killers.store(ply, mv);
    ctx.counters.store(last_move, mv);
}

/// Penalize the quiet moves tried before the cutoff move.
fn penalize_tried_quiets(ctx: &mut SearchContext, board: &Board, quiets: &[Move], cutoff: Move, depth: i32) {
    let side = board.side_to_move();
    for &mv in quiets {
        if mv == cutoff {
            continue;
        }
        let piece = board.piece_on(mv.from()).unwrap_or(PieceKind::Pawn);
        ctx.history.penalize(side, piece, mv.to().index(), depth);
    }
}

/// Report a fresh root line, unless another worker has already finished a
/// deeper iteration.
fn emit_root_pv(ctx: &mut SearchContext, score: i32) {
    if ctx.root_depth < ctx.depth_reached.load(Ordering::Relaxed) {
        return;
    }
    let line = ctx.pv.root_line();
    (ctx.info)(SearchInfo::Pv {
        depth: ctx.root_depth,
        score,
        nodes: ctx.shared_nodes.load(Ordering::Relaxed),
        elapsed: ctx.control.elapsed(),
        pv: &line,
    });
}

/// Quiescence search: stand pat, then winning or equal tactical moves.
/// In check it searches every evasion instead, so mates are never missed
/// at the tips. Fail-soft.
pub(crate) fn quiesce(board: &Board, ply: usize, mut alpha: i32, beta: i32, ctx: &mut SearchContext) -> i32 {
    ctx.nodes += 1;
    let global_nodes = ctx.shared_nodes.fetch_add(1, Ordering::Relaxed) + 1;
    ctx.control.slowdown(global_nodes, ctx.root_depth);
    if ctx.control.should_stop(ctx.nodes) && ctx.root_depth > 1 {
        return 0;
    }

    if ply >= MAX_PLY - 1 {
        return evaluate(board);
    }
    ctx.pv.clear(ply);
    ctx.path[ply] = board.hash();
    if is_draw(board, ctx, ply) {
        return ctx.draw_score(board);
    }

    let in_check = board.in_check();
    let mut best = -INF;

    if !in_check {
        best = evaluate(board);
        if best >= beta {
            return best;
        }
        if best > alpha {
            alpha = best;
        }
    }

    let moves = generate_moves(board);
    let mut picker = MovePicker::quiescence(board, &moves, in_check);
    let mut any_legal = false;

    while let Some((mv, _)) = picker.next() {
        let child = board.make_move(mv);
        if child.illegal() {
            continue;
        }
        any_legal = true;

        let score = -quiesce(&child, ply + 1, -beta, -alpha, ctx);
        if score >= beta {
            return score;
        }
        if score > best {
            best = score;
            if score > alpha {
                alpha = score;
            }
        }
    }

    if in_check && !any_legal {
        return -MATE + ply as i32;
    }
    best
}

/// The negamax node searcher.
///
/// `was_null` marks the child of a null move (null tries and some pruning
/// are disabled there), `last_move` is the move that led here, and
/// `last_capt_sq` the square of an immediately preceding capture (for the
/// recapture extension).
#[allow(clippy::too_many_arguments)]
pub(crate) fn search(
    board: &Board,
    ply: usize,
    mut alpha: i32,
    mut beta: i32,
    depth: i32,
    was_null: bool,
    last_move: Move,
    last_capt_sq: Option<Square>,
    ctx: &mut SearchContext,
) -> i32 {
    if depth <= 0 {
        return quiesce(board, ply, alpha, beta, ctx);
    }

    ctx.nodes += 1;
    let global_nodes = ctx.shared_nodes.fetch_add(1, Ordering::Relaxed) + 1;
    ctx.control.slowdown(global_nodes, ctx.root_depth);
    if ctx.control.should_stop(ctx.nodes) && ctx.root_depth > 1 {
        return 0;
    }

    let is_pv = alpha != beta - 1;

    if ply > 0 {
        ctx.pv.clear(ply);
        if ply < MAX_PLY {
            ctx.path[ply] = board.hash();
        }
        if is_draw(board, ctx, ply) {
            return ctx.draw_score(board);
        }

        // Mate-distance pruning: no mate can be shorter than the path here.
        let mating = MATE - ply as i32;
        if mating < beta {
            beta = mating;
            if alpha >= mating {
                return alpha;
            }
        }
        let mated = -MATE + ply as i32;
        if mated > alpha {
            alpha = mated;
            if beta <= mated {
                return beta;
            }
        }
    }

    // Transposition table probe.
    let mut tt_move = Move::NULL;
    if let Some(entry) = ctx.tt.probe(board.hash(), ply) {
        tt_move = entry.best_move;
        if entry.depth >= depth {
            let usable = match entry.bound {
                Bound::Exact => true,
                Bound::Lower => entry.score >= beta,
                Bound::Upper => entry.score <= alpha,
                Bound::None => false,
            };
            if usable {
                if entry.score >= beta {
                    update_quiet_history(ctx, board, last_move, tt_move, depth, ply);
                }
                if !is_pv {
                    return entry.score;
                }
            }
        }
    }

    if ply >= MAX_PLY - 1 {
        return evaluate(board);
    }

    let in_check = board.in_check();
    let prunable = !in_check && !is_pv && alpha > -MAX_EVAL && beta < MAX_EVAL;

    // Every consumer of `eval` below also requires `prunable`.
    let eval = if prunable { evaluate(board) } else { 0 };

    // Static null-move (beta) pruning.
    if prunable && depth <= SNP_DEPTH && !was_null {
        let margin = eval - 120 * depth;
        if margin > beta {
            return margin;
        }
    }

    // Null-move pruning with verification.
    let mut did_null = false;
    let mut escape_sq: Option<Square> = None;
    if depth > 1
        && !was_null
        && prunable
        && board.has_non_pawn_material(board.side_to_move())
        && eval >= beta
    {
        did_null = true;

        let reduction = (823 + 67 * depth) / 256 + ((eval - beta) / 200).min(3);
        let new_depth = depth - reduction;

        // If the table already proves this node below beta at the reduced
        // depth, the null try cannot cut off; skip it.
        let hopeless = ctx.tt.probe(board.hash(), ply).is_some_and(|e| {
            e.depth >= new_depth && e.bound != Bound::Lower && e.score < beta
        });

        if !hopeless {
            let null_child = board.make_null_move();
            let mut score = if new_depth <= 0 {
                -quiesce(&null_child, ply + 1, -beta, -beta + 1, ctx)
            } else {
                -search(&null_child, ply + 1, -beta, -beta + 1, new_depth, true, Move::NULL, None, ctx)
            };

            // The opponent's refutation of the null move names a piece in
            // danger; escaping with it gets an ordering bonus below.
            let refutation = ctx.tt.probe_move(null_child.hash());
            if !refutation.is_null() {
                escape_sq = Some(refutation.to());
            }

            if ctx.control.aborted() && ctx.root_depth > 1 {
                return 0;
            }

            // Never trust a mate proved by passing.
            if score >= MAX_EVAL {
                score = beta;
            }

            if score >= beta {
                if new_depth > 6 {
                    // Deep null cutoffs are verified by a reduced search
                    // with the null permit revoked (zugzwang guard).
                    score = search(board, ply, alpha, beta, depth - 5, true, last_move, last_capt_sq, ctx);
                }
                if ctx.control.aborted() && ctx.root_depth > 1 {
                    return 0;
                }
                if score >= beta {
                    return score;
                }
            }
        }
    }

    // Razoring: shallow nodes far below alpha drop into quiescence.
    if prunable && tt_move.is_null() && !was_null && depth <= RAZOR_DEPTH {
        let seventh = match board.side_to_move() {
            Color::White => Bitboard::RANK_7,
            Color::Black => Bitboard::RANK_2,
        };
        let can_promote =
            (board.pieces(PieceKind::Pawn) & board.side(board.side_to_move()) & seventh).any();
        let threshold = beta - RAZOR_MARGIN[depth as usize];
        if !can_promote && eval < threshold {
            let score = quiesce(board, ply, alpha, beta, ctx);
            if score < threshold {
                return score;
            }
        }
    }

    // Internal iterative deepening: a PV node without a table move runs a
    // shallow search just to seed one.
    if is_pv && !in_check && tt_move.is_null() && depth > 6 {
        search(board, ply, alpha, beta, depth - 2, false, Move::NULL, last_capt_sq, ctx);
        tt_move = ctx.tt.probe_move(board.hash());
    }

    let moves = generate_moves(board);
    let counter = ctx.counters.get(last_move);
    let mut picker = MovePicker::new(
        board,
        &moves,
        tt_move,
        &ctx.killers,
        &ctx.history,
        counter,
        escape_sq,
        ply,
    );

    let mut best = -INF;
    let mut best_move = Move::NULL;
    let mut futility = false;
    let mut mv_tried = 0usize;
    let mut quiet_tried = 0usize;
    let mut quiets_seen = [Move::NULL; 64];
    let mut quiets_len = 0usize;

    while let Some((mv, class)) = picker.next() {
        // Arm futility before the first quiet move is tried.
        if class == MoveClass::Quiet
            && quiet_tried == 0
            && prunable
            && depth <= FUTILITY_DEPTH
            && eval + FUTILITY_MARGIN[depth as usize] < beta
        {
            futility = true;
        }

        let hist_score = {
            let piece = board.piece_on(mv.from()).unwrap_or(PieceKind::Pawn);
            ctx.history.score(board.side_to_move(), piece, mv.to().index())
        };
        let last_capt = if board.piece_on(mv.to()).is_some() {
            Some(mv.to())
        } else {
            None
        };

        let child = board.make_move(mv);
        if child.illegal() {
            continue;
        }
        let gives_check = child.in_check();

        mv_tried += 1;
        if ply == 0 && mv_tried > 1 {
            ctx.root_choice = true;
        }
        if class == MoveClass::Quiet {
            quiet_tried += 1;
        }
        // Remember every attempted quiet move (killers and counters too)
        // for the bulk history penalty on a cutoff.
        if mv.kind() == MoveKind::Normal
            && board.piece_on(mv.to()).is_none()
            && quiets_len < quiets_seen.len()
        {
            quiets_seen[quiets_len] = mv;
            quiets_len += 1;
        }
        if ply == 0 && depth > 16 {
            (ctx.info)(SearchInfo::CurrMove { mv, number: mv_tried });
        }

        let mut new_depth = depth - 1;

        // Check extension at PV nodes and near the horizon.
        if gives_check && (is_pv || depth < 8) {
            new_depth += 1;
        }
        // Recapture extension at PV nodes.
        if is_pv && Some(mv.to()) == last_capt_sq {
            new_depth += 1;
        }
        // Passed-pawn-push extension near the PV tips.
        if is_pv
            && depth < 6
            && child.piece_on(mv.to()) == Some(PieceKind::Pawn)
            && (mv.to().bitboard() & (Bitboard::RANK_2 | Bitboard::RANK_7)).any()
        {
            new_depth += 1;
        }

        // Futility: skip late quiet moves that cannot raise alpha.
        if futility
            && !gives_check
            && hist_score < ctx.params.hist_limit
            && class == MoveClass::Quiet
            && mv_tried > 1
        {
            continue;
        }

        // Late-move pruning at shallow depth.
        if prunable
            && depth <= 3
            && quiet_tried > 3 * depth as usize
            && !gives_check
            && hist_score < ctx.params.hist_limit
            && class == MoveClass::Quiet
        {
            continue;
        }

        // After a failed null try, a quick null-window quiescence of the
        // child spots moves that leave the threat unanswered; those are
        // reduced harder below.
        let mut threat_unmet = false;
        if did_null && depth > 2 && !gives_check {
            let probe = quiesce(&child, ply + 1, -beta, -beta + 1, ctx);
            if probe >= beta {
                threat_unmet = true;
            }
        }

        // Late-move reduction of quiet moves.
        let mut reduction = 0;
        if depth > 2
            && mv_tried > 3
            && !in_check
            && !gives_check
            && class == MoveClass::Quiet
            && hist_score < ctx.params.hist_limit
            && mv.kind() != MoveKind::Castling
        {
            let table_r = lmr_reduction(is_pv, depth, mv_tried);
            if table_r > 0 {
                reduction = table_r;
                if threat_unmet && new_depth - reduction >= 2 {
                    reduction += 1;
                }
                if hist_score < 0 && new_depth - reduction >= 2 {
                    reduction += 1;
                }
                new_depth -= reduction;
            }
        }

        // Marginal reduction of late losing captures outside the PV.
        if depth > 2
            && mv_tried > 6
            && alpha > -MAX_EVAL
            && beta < MAX_EVAL
            && !in_check
            && !gives_check
            && class == MoveClass::BadCapture
            && !is_pv
        {
            reduction = 1;
            new_depth -= 1;
        }

        // Principal variation search, re-searching once at full depth when
        // a reduced move surprises us.
        let mut score;
        loop {
            if best == -INF {
                score = -search(&child, ply + 1, -beta, -alpha, new_depth, false, mv, last_capt, ctx);
            } else {
                score = -search(&child, ply + 1, -alpha - 1, -alpha, new_depth, false, mv, last_capt, ctx);
                if !ctx.control.aborted() && score > alpha && score < beta {
                    score = -search(&child, ply + 1, -beta, -alpha, new_depth, false, mv, last_capt, ctx);
                }
            }
            if score > alpha && reduction > 0 {
                new_depth += reduction;
                reduction = 0;
                continue;
            }
            break;
        }

        if ctx.control.aborted() && ctx.root_depth > 1 {
            return 0;
        }

        if score >= beta {
            if !in_check {
                update_quiet_history(ctx, board, last_move, mv, depth, ply);
                penalize_tried_quiets(ctx, board, &quiets_seen[..quiets_len], mv, depth);
            }
            ctx.tt.store(board.hash(), mv, score, Bound::Lower, depth, ply);
            if ply == 0 {
                ctx.pv.build(0, mv);
                emit_root_pv(ctx, score);
            }
            return score;
        }

        if score > best {
            best = score;
            if score > alpha {
                alpha = score;
                best_move = mv;
                ctx.pv.build(ply, mv);
                if ply == 0 {
                    emit_root_pv(ctx, score);
                }
            }
        }
    }

    // No legal move: mate or stalemate.
    if mv_tried == 0 {
        return if in_check {
            -MATE + ply as i32
        } else {
            ctx.draw_score(board)
        };
    }

    if !best_move.is_null() {
        if !in_check {
            update_quiet_history(ctx, board, last_move, best_move, depth, ply);
            penalize_tried_quiets(ctx, board, &quiets_seen[..quiets_len], best_move, depth);
        }
        ctx.tt.store(board.hash(), best_move, best, Bound::Exact, depth, ply);
    } else {
        ctx.tt.store(board.hash(), Move::NULL, best, Bound::Upper, depth, ply);
    }

    best
}

/// The aspiration window ladder around a previous score: margins double
/// from 8 until they would reach 500, after which the caller falls back to
/// the full window.
pub fn aspiration_windows(last_score: i32) -> impl Iterator<Item = (i32, i32)> {
    std::iter::successors(Some(8), |m| Some(m * 2))
        .take_while(|&m| m < 500)
        .map(move |m| (last_score - m, last_score + m))
}

/// One iteration: aspiration windows around the previous score, widening on
/// fail-high or fail-low, with a full-window fallback.
fn widen(board: &Board, depth: i32, last_score: i32, ctx: &mut SearchContext) -> i32 {
    if depth > 6 && last_score.abs() <= MAX_EVAL {
        for (alpha, beta) in aspiration_windows(last_score) {
            let score = search(board, 0, alpha, beta, depth, false, Move::NULL, None, ctx);
            if ctx.control.aborted() {
                return score;
            }
            if score > alpha && score < beta {
                return score;
            }
            if score.abs() > MAX_EVAL {
                // A mate inside an artificial window is suspect; verify it
                // with the full window below.
                break;
            }
        }
    }
    search(board, 0, -INF, INF, depth, false, Move::NULL, None, ctx)
}

/// Iterative deepening for one worker.
///
/// Helpers start one ply deeper on odd ids for Lazy SMP diversity, skip
/// iterations the rest of the field has already passed, and stop early on a
/// forced root move or a proven mate.
pub(crate) fn iterate(
    board: &Board,
    max_depth: i32,
    thread_id: usize,
    ctx: &mut SearchContext,
) -> SearchResult {
    ctx.history.age();

    let max_depth = max_depth.clamp(1, MAX_PLY as i32 - 1);
    let start_depth = 1 + (thread_id & 1) as i32;

    let mut completed_depth = 0;
    let mut completed_score = -INF;
    let mut completed_pv: Vec<Move> = Vec::new();
    let mut last_score = 0;

    for depth in start_depth..=max_depth {
        // A worker lagging behind the field skips ahead rather than redoing
        // depths that can no longer contribute.
        if ctx.depth_reached.load(Ordering::Relaxed) > completed_depth + 1 {
            completed_depth += 1;
            continue;
        }
        if ctx.control.should_stop_iterating() {
            break;
        }

        ctx.root_depth = depth;
        (ctx.info)(SearchInfo::Depth { depth });

        let score = widen(board, depth, last_score, ctx);

        // An aborted iteration is discarded (except the very first, which
        // always runs to completion so a move exists).
        if ctx.control.aborted() && depth > 1 {
            break;
        }

        last_score = score;
        completed_depth = depth;
        completed_score = score;
        completed_pv = ctx.pv.root_line();
        ctx.depth_reached.fetch_max(depth, Ordering::Relaxed);

        if ctx.control.aborted() {
            break;
        }
        // A forced move needs no deep confirmation.
        if depth >= 8 && !ctx.root_choice {
            break;
        }
        // Once a mate is proven, a few extra plies confirm the distance;
        // beyond that the iteration cannot change the outcome.
        if score.abs() > MAX_EVAL {
            let settled = ((MATE - score.abs() + 2) * 4 + 2) / 3;
            if settled <= depth {
                break;
            }
        }
    }

    let best_move = completed_pv.first().copied().unwrap_or(Move::NULL);
    let ponder_move = completed_pv.get(1).copied();
    SearchResult {
        best_move,
        ponder_move,
        pv: completed_pv,
        score: completed_score,
        nodes: ctx.nodes,
        depth: completed_depth,
    }
}
