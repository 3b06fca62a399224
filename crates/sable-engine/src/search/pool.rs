//! Lazy SMP: N workers share the transposition table and nothing else.
//!
//! The primary worker reports progress and produces the result; helpers
//! run the same iterative deepening silently, seeding the shared table.
//! Staggered starting depths keep the workers out of lockstep.

use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use sable_core::{Board, Color, Move};
use tracing::debug;

use crate::search::control::SearchControl;
use crate::search::heuristics::{CounterMoveTable, HistoryTable, KillerTable};
use crate::search::negamax::{INF, SearchContext, iterate};
use crate::search::pv::PvTable;
use crate::search::tt::TranspositionTable;
use crate::search::{SearchInfo, SearchParams, SearchResult};

/// Owns the transposition table and fans a search out over worker threads.
pub struct ThreadPool {
    tt: TranspositionTable,
    num_threads: usize,
}

impl ThreadPool {
    /// A pool with a transposition table of `hash_mb` megabytes and one
    /// worker.
    pub fn new(hash_mb: usize) -> ThreadPool {
        ThreadPool {
            tt: TranspositionTable::new(hash_mb),
            num_threads: 1,
        }
    }

    /// Set the worker count (minimum one).
    pub fn set_num_threads(&mut self, n: usize) {
        self.num_threads = n.max(1);
    }

    /// Replace the transposition table with one of `mb` megabytes.
    pub fn resize_tt(&mut self, mb: usize) {
        self.tt = TranspositionTable::new(mb);
    }

    /// Wipe the transposition table (between games).
    pub fn clear_tt(&self) {
        self.tt.clear();
    }

    /// Run a search to at most `max_depth`.
    ///
    /// `game_history` holds the Zobrist hashes of every position played so
    /// far, newest last, for repetition detection. `on_info` receives
    /// progress reports from the primary worker only.
    pub fn search(
        &self,
        board: &Board,
        game_history: &[u64],
        max_depth: i32,
        params: SearchParams,
        control: &SearchControl,
        mut on_info: impl FnMut(SearchInfo<'_>),
    ) -> SearchResult {
        self.tt.new_generation();

        let shared_nodes = AtomicU64::new(0);
        let depth_reached = AtomicI32::new(0);
        let engine_side = board.side_to_move();

        let mut result = SearchResult {
            best_move: Move::NULL,
            ponder_move: None,
            pv: Vec::new(),
            score: -INF,
            nodes: 0,
            depth: 0,
        };

        std::thread::scope(|s| {
            for thread_id in 1..self.num_threads {
                let tt = &self.tt;
                let shared_nodes = &shared_nodes;
                let depth_reached = &depth_reached;
                s.spawn(move || {
                    run_worker(
                        thread_id,
                        tt,
                        board,
                        game_history,
                        max_depth,
                        params,
                        control,
                        shared_nodes,
                        depth_reached,
                        engine_side,
                        &mut |_| {},
                    );
                });
            }

            result = run_worker(
                0,
                &self.tt,
                board,
                game_history,
                max_depth,
                params,
                control,
                &shared_nodes,
                &depth_reached,
                engine_side,
                &mut on_info,
            );

            // The primary worker is done; call the helpers home. This is
            // not the user's stop flag, so a fixed-depth finish stays
            // distinguishable from an abort.
            control.finish();
        });

        result.nodes = shared_nodes.load(Ordering::Relaxed);
        debug!(
            nodes = result.nodes,
            depth = result.depth,
            score = result.score,
            "search finished"
        );
        result
    }
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
    thread_id: usize,
    tt: &TranspositionTable,
    board: &Board,
    game_history: &[u64],
    max_depth: i32,
    params: SearchParams,
    control: &SearchControl,
    shared_nodes: &AtomicU64,
    depth_reached: &AtomicI32,
    engine_side: Color,
    info: &mut dyn FnMut(SearchInfo<'_>),
) -> SearchResult {
    let mut ctx = SearchContext {
        tt,
        control,
        shared_nodes,
        depth_reached,
        game_history,
        path: [0; crate::search::negamax::MAX_PLY],
        nodes: 0,
        pv: PvTable::new(),
        killers: KillerTable::new(),
        history: HistoryTable::new(),
        counters: CounterMoveTable::new(),
        params,
        engine_side,
        root_depth: 0,
        root_choice: false,
        info,
    };
    iterate(board, max_depth, thread_id, &mut ctx)
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("tt", &self.tt)
            .field("num_threads", &self.num_threads)
            .finish()
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new(16)
    }
}
