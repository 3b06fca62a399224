//! Behavioural tests for the search core: mates, terminal scores, draws,
//! pruning safety, abort handling and resource limits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use sable_core::Board;
use sable_engine::{
    MATE, MAX_EVAL, SearchControl, SearchInfo, SearchParams, SearchResult, ThreadPool,
};

const SCHOLARS_MATE_FEN: &str =
    "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4";

/// After 1. f3 e5 2. g4 — Black mates with Qh4.
const FOOLS_MATE_FEN: &str =
    "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq g3 0 2";

fn search_depth(board: &Board, depth: i32) -> SearchResult {
    let stopped = Arc::new(AtomicBool::new(false));
    let control = SearchControl::new_infinite(stopped);
    let pool = ThreadPool::new(16);
    pool.search(
        board,
        &[board.hash()],
        depth,
        SearchParams::default(),
        &control,
        |_| {},
    )
}

#[test]
fn finds_fools_mate() {
    let board: Board = FOOLS_MATE_FEN.parse().unwrap();
    let result = search_depth(&board, 2);
    assert_eq!(result.best_move.to_string(), "d8h4");
    assert_eq!(result.score, MATE - 1, "mate in one scores MATE - 1");
    assert_eq!(result.pv.first().map(|m| m.to_string()).as_deref(), Some("d8h4"));
}

#[test]
fn finds_scholars_mate() {
    let board: Board = SCHOLARS_MATE_FEN.parse().unwrap();
    let result = search_depth(&board, 2);
    assert_eq!(result.best_move.to_string(), "h5f7");
    assert!(result.score > MAX_EVAL);
}

#[test]
fn stalemate_scores_draw() {
    let board: Board = "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1".parse().unwrap();
    let result = search_depth(&board, 1);
    assert_eq!(result.score, 0);
    assert!(result.best_move.is_null(), "no legal move to report");
}

#[test]
fn checkmated_root_scores_mate_against_us() {
    let board: Board = "7k/6Q1/5K2/8/8/8/8/8 b - - 0 1".parse().unwrap();
    let result = search_depth(&board, 1);
    assert!(result.score < -MAX_EVAL);
    assert!(result.best_move.is_null());
}

#[test]
fn insufficient_material_is_drawn_at_any_depth() {
    let board: Board = "8/8/8/4k3/8/8/4K3/8 w - - 0 1".parse().unwrap();
    for depth in [1, 4, 8] {
        let result = search_depth(&board, depth);
        assert_eq!(result.score, 0, "bare kings must score 0 at depth {depth}");
    }
}

#[test]
fn contempt_shifts_the_draw_score() {
    let board: Board = "8/8/8/4k3/8/8/4K3/8 w - - 0 1".parse().unwrap();
    let stopped = Arc::new(AtomicBool::new(false));
    let control = SearchControl::new_infinite(stopped);
    let pool = ThreadPool::new(16);
    let params = SearchParams {
        contempt: 50,
        ..SearchParams::default()
    };
    let result = pool.search(&board, &[board.hash()], 4, params, &control, |_| {});
    assert_eq!(result.score, -50, "a draw while we hold contempt scores against us");
}

#[test]
fn null_move_pruning_keeps_the_mate() {
    let board: Board = SCHOLARS_MATE_FEN.parse().unwrap();
    let result = search_depth(&board, 4);
    assert_eq!(result.best_move.to_string(), "h5f7");
    assert!(result.score > MAX_EVAL);
}

#[test]
fn reductions_keep_the_mate_at_depth_6() {
    let board: Board = SCHOLARS_MATE_FEN.parse().unwrap();
    let result = search_depth(&board, 6);
    assert_eq!(result.best_move.to_string(), "h5f7");
    assert!(result.score > MAX_EVAL, "mate must survive aspiration and LMR");
}

#[test]
fn pawn_endgame_stays_sound_without_null_move() {
    // King and pawn endgames disable null-move tries entirely; the
    // verification path covers the rest. White is simply winning here and
    // the search must agree.
    let board: Board = "8/8/8/3k4/8/3K4/4P3/8 w - - 0 1".parse().unwrap();
    let result = search_depth(&board, 8);
    assert!(!result.best_move.is_null());
    assert!(result.score >= 0, "extra pawn cannot evaluate as lost, got {}", result.score);
}

#[test]
fn forced_root_move_stops_early() {
    // Only Ka2 is legal; iterating past depth 8 proves nothing new.
    let board: Board = "8/8/8/8/8/1r6/2k5/K7 w - - 0 1".parse().unwrap();
    let result = search_depth(&board, 30);
    assert_eq!(result.best_move.to_string(), "a1a2");
    assert!(result.depth <= 8, "forced move searched to depth {}", result.depth);
}

#[test]
fn every_iteration_reports_its_depth() {
    let board = Board::starting_position();
    let stopped = Arc::new(AtomicBool::new(false));
    let control = SearchControl::new_infinite(stopped);
    let pool = ThreadPool::new(16);

    let mut depths = Vec::new();
    pool.search(
        &board,
        &[board.hash()],
        8,
        SearchParams::default(),
        &control,
        |report| {
            if let SearchInfo::Depth { depth } = report {
                depths.push(depth);
            }
        },
    );
    assert_eq!(depths, (1..=8).collect::<Vec<_>>(), "aspiration must not skip depths");
}

#[test]
fn reported_pv_starts_with_a_legal_move() {
    let board = Board::starting_position();
    let stopped = Arc::new(AtomicBool::new(false));
    let control = SearchControl::new_infinite(stopped);
    let pool = ThreadPool::new(16);

    pool.search(
        &board,
        &[board.hash()],
        6,
        SearchParams::default(),
        &control,
        |report| {
            if let SearchInfo::Pv { pv, .. } = report {
                assert!(!pv.is_empty(), "PV report must carry a line");
                let legal = sable_core::generate_legal_moves(&board);
                assert!(
                    legal.iter().any(|m| *m == pv[0]),
                    "PV head {} is not legal at the root",
                    pv[0]
                );
            }
        },
    );
}

#[test]
fn node_cap_converts_to_abort() {
    let board = Board::starting_position();
    let stopped = Arc::new(AtomicBool::new(false));
    let control = SearchControl::new_infinite(stopped).with_node_limit(20_000);
    let pool = ThreadPool::new(16);

    let result = pool.search(
        &board,
        &[board.hash()],
        64,
        SearchParams::default(),
        &control,
        |_| {},
    );
    assert!(!result.best_move.is_null());
    assert!(result.depth >= 1);
    assert!(
        result.nodes <= 25_000,
        "search ran {} nodes past a 20k cap",
        result.nodes
    );
}

#[test]
fn nps_throttle_keeps_the_rate_down() {
    let board = Board::starting_position();
    let stopped = Arc::new(AtomicBool::new(false));
    let limit = 50_000u64;
    let control = SearchControl::new_timed(
        stopped,
        Duration::from_millis(600),
        Duration::from_millis(600),
    )
    .with_nps_limit(limit);
    let pool = ThreadPool::new(16);

    let t0 = Instant::now();
    let result = pool.search(
        &board,
        &[board.hash()],
        64,
        SearchParams::default(),
        &control,
        |_| {},
    );
    let ms = t0.elapsed().as_millis().max(1) as u64;
    let nps = result.nodes * 1000 / ms;
    assert!(
        nps <= limit + limit / 10,
        "throttled search ran at {nps} nps against a {limit} limit"
    );
}

#[test]
fn preset_stop_completes_nothing() {
    let board = Board::starting_position();
    let stopped = Arc::new(AtomicBool::new(true));
    let control = SearchControl::new_infinite(stopped);
    let pool = ThreadPool::new(16);

    let result = pool.search(
        &board,
        &[board.hash()],
        64,
        SearchParams::default(),
        &control,
        |_| {},
    );
    assert_eq!(result.depth, 0, "no iteration may complete under a pre-set stop");
}

#[test]
fn mid_search_stop_keeps_last_completed_iteration() {
    let board = Board::starting_position();
    let stopped = Arc::new(AtomicBool::new(false));
    let control = SearchControl::new_infinite(Arc::clone(&stopped));
    let pool = ThreadPool::new(16);

    let stop_at = 3;
    let stopper = Arc::clone(&stopped);
    let result = pool.search(
        &board,
        &[board.hash()],
        64,
        SearchParams::default(),
        &control,
        move |report| {
            if let SearchInfo::Depth { depth } = report
                && depth > stop_at
            {
                stopper.store(true, Ordering::Release);
            }
        },
    );

    assert!(!result.best_move.is_null());
    assert!(
        result.depth >= stop_at && result.depth <= stop_at + 1,
        "stop after depth {stop_at} left depth {}",
        result.depth
    );
}

#[test]
fn losing_side_escapes_into_repetition() {
    // White is a queen down. The position after Kg1 is planted in the game
    // history, so repeating it is an immediate draw — by far White's best.
    let board: Board = "1q5k/8/8/8/8/8/7P/7K w - - 0 1".parse().unwrap();
    let kg1 = sable_core::Move::from_uci("h1g1", &board).unwrap();
    let repeated = board.make_move(kg1);
    let history = vec![board.hash(), repeated.hash()];

    let stopped = Arc::new(AtomicBool::new(false));
    let control = SearchControl::new_infinite(stopped);
    let pool = ThreadPool::new(16);
    let result = pool.search(&board, &history, 4, SearchParams::default(), &control, |_| {});

    assert_eq!(result.best_move, kg1, "the repetition is the only saving move");
    assert_eq!(result.score, 0, "repetition scores as a draw");
}
