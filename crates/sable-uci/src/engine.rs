//! The UCI engine loop.
//!
//! Event-driven: a reader thread feeds stdin lines into a channel, searches
//! run on their own thread and post their result back as an event, so
//! `stop`, `ponderhit` and `quit` are handled while a search is running.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};

use tracing::{debug, info, warn};

use sable_core::Board;
use sable_engine::{
    MATE, MAX_EVAL, SearchControl, SearchInfo, SearchParams, SearchResult, ThreadPool,
    limits_from_go,
};

use crate::command::{Command, GoParams, parse_command};
use crate::error::UciError;

enum EngineState {
    Idle,
    Searching,
    Pondering,
}

enum EngineEvent {
    UciCommand(Result<Command, UciError>),
    SearchDone(Box<SearchDone>),
    InputClosed,
}

struct SearchDone {
    result: SearchResult,
    pool: ThreadPool,
}

/// Engine frontend state: current position, search pool and options.
pub struct UciEngine {
    board: Board,
    history: Vec<u64>,
    pool: Option<ThreadPool>,
    state: EngineState,
    stop_flag: Arc<AtomicBool>,
    control: Option<Arc<SearchControl>>,
    pending_clear_tt: bool,
    threads: usize,
    contempt: i32,
    nps_limit: u64,
    silent: bool,
}

impl UciEngine {
    /// A fresh engine at the starting position with default options.
    pub fn new() -> UciEngine {
        let board = Board::starting_position();
        UciEngine {
            history: vec![board.hash()],
            board,
            pool: Some(ThreadPool::new(16)),
            state: EngineState::Idle,
            stop_flag: Arc::new(AtomicBool::new(false)),
            control: None,
            pending_clear_tt: false,
            threads: 1,
            contempt: 0,
            nps_limit: 0,
            silent: false,
        }
    }

    /// Run the event loop until `quit` or stdin closes.
    pub fn run(mut self) -> Result<(), UciError> {
        let (tx, rx) = mpsc::channel::<EngineEvent>();

        let stdin_tx = tx.clone();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        debug!(cmd = %trimmed, "received UCI command");
                        if stdin_tx
                            .send(EngineEvent::UciCommand(parse_command(trimmed)))
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(_) => break,
                }
            }
            let _ = stdin_tx.send(EngineEvent::InputClosed);
        });

        for event in &rx {
            match event {
                EngineEvent::UciCommand(Ok(cmd)) => match cmd {
                    Command::Uci => self.handle_uci(),
                    Command::IsReady => println!("readyok"),
                    Command::UciNewGame => self.handle_ucinewgame(),
                    Command::Position { board, history } => {
                        self.board = board;
                        self.history = history;
                    }
                    Command::Go(params) => self.handle_go(params, &tx),
                    Command::SetOption { name, value } => self.handle_setoption(&name, value),
                    Command::Stop => self.stop_flag.store(true, Ordering::Release),
                    Command::PonderHit => self.handle_ponderhit(),
                    Command::Quit => {
                        if !matches!(self.state, EngineState::Idle) {
                            self.stop_flag.store(true, Ordering::Release);
                            for ev in &rx {
                                if let EngineEvent::SearchDone(done) = ev {
                                    self.finish_search(*done);
                                    break;
                                }
                            }
                        }
                        break;
                    }
                    Command::Unknown(line) => {
                        if !line.is_empty() {
                            debug!(line = %line, "ignoring unknown command");
                        }
                    }
                },
                EngineEvent::UciCommand(Err(e)) => warn!(error = %e, "UCI parse error"),
                EngineEvent::SearchDone(done) => self.finish_search(*done),
                EngineEvent::InputClosed => break,
            }
        }

        info!("sable shutting down");
        Ok(())
    }

    fn handle_uci(&self) {
        println!("id name Sable");
        println!("id author the Sable developers");
        println!("option name Hash type spin default 16 min 1 max 4096");
        println!("option name Threads type spin default 1 min 1 max 64");
        println!("option name Contempt type spin default 0 min -200 max 200");
        println!("option name NpsLimit type spin default 0 min 0 max 10000000");
        println!("option name Silent type check default false");
        println!("option name Ponder type check default false");
        println!("uciok");
    }

    fn handle_ucinewgame(&mut self) {
        self.board = Board::starting_position();
        self.history = vec![self.board.hash()];
        match &self.pool {
            Some(pool) => pool.clear_tt(),
            // The search thread owns the pool; clear when it comes back.
            None => self.pending_clear_tt = true,
        }
    }

    fn handle_setoption(&mut self, name: &str, value: Option<String>) {
        let value = value.unwrap_or_default();
        match name.to_ascii_lowercase().as_str() {
            "hash" => match (value.parse::<usize>(), &mut self.pool) {
                (Ok(mb), Some(pool)) => pool.resize_tt(mb.clamp(1, 4096)),
                _ => warn!(value = %value, "cannot resize hash now"),
            },
            "threads" => match value.parse::<usize>() {
                Ok(n) => self.threads = n.clamp(1, 64),
                Err(_) => warn!(value = %value, "bad Threads value"),
            },
            "contempt" => match value.parse::<i32>() {
                Ok(c) => self.contempt = c.clamp(-200, 200),
                Err(_) => warn!(value = %value, "bad Contempt value"),
            },
            "npslimit" => match value.parse::<u64>() {
                Ok(n) => self.nps_limit = n,
                Err(_) => warn!(value = %value, "bad NpsLimit value"),
            },
            "silent" => self.silent = value.eq_ignore_ascii_case("true"),
            "ponder" => {}
            other => debug!(option = other, "ignoring unsupported option"),
        }
    }

    fn handle_go(&mut self, params: GoParams, tx: &mpsc::Sender<EngineEvent>) {
        if !matches!(self.state, EngineState::Idle) {
            warn!("go received while busy, ignoring");
            return;
        }

        self.stop_flag = Arc::new(AtomicBool::new(false));
        let control = Arc::new(
            limits_from_go(
                params.wtime,
                params.btime,
                params.winc,
                params.binc,
                params.movestogo,
                params.movetime,
                params.infinite,
                params.ponder,
                self.board.side_to_move(),
                Arc::clone(&self.stop_flag),
            )
            .with_node_limit(params.nodes.unwrap_or(0))
            .with_nps_limit(self.nps_limit),
        );

        let search_params = SearchParams {
            contempt: self.contempt,
            ..SearchParams::default()
        };
        let max_depth = params.depth.unwrap_or(i32::MAX);
        let silent = self.silent;

        let mut pool = self.pool.take().unwrap_or_default();
        pool.set_num_threads(self.threads);

        let board = self.board;
        let history = self.history.clone();
        let search_control = Arc::clone(&control);
        let tx = tx.clone();

        std::thread::spawn(move || {
            let result = pool.search(
                &board,
                &history,
                max_depth,
                search_params,
                &search_control,
                |report| {
                    if !silent {
                        print_info(&report);
                    }
                },
            );
            let _ = tx.send(EngineEvent::SearchDone(Box::new(SearchDone { result, pool })));
        });

        self.state = if params.ponder {
            EngineState::Pondering
        } else {
            EngineState::Searching
        };
        self.control = Some(control);
    }

    fn handle_ponderhit(&mut self) {
        if !matches!(self.state, EngineState::Pondering) {
            warn!("ponderhit received while not pondering, ignoring");
            return;
        }
        if let Some(control) = &self.control {
            control.activate();
        }
        self.state = EngineState::Searching;
    }

    fn finish_search(&mut self, done: SearchDone) {
        let pool = done.pool;
        if self.pending_clear_tt {
            pool.clear_tt();
            self.pending_clear_tt = false;
        }
        self.pool = Some(pool);
        self.control = None;
        self.state = EngineState::Idle;

        let result = &done.result;
        if result.best_move.is_null() {
            // No legal move at the root (mate or stalemate against us).
            println!("bestmove 0000");
        } else {
            match result.ponder_move {
                Some(ponder) if !ponder.is_null() => {
                    println!("bestmove {} ponder {}", result.best_move, ponder);
                }
                _ => println!("bestmove {}", result.best_move),
            }
        }
    }
}

/// Format one search report as a UCI `info` line.
fn print_info(report: &SearchInfo<'_>) {
    match report {
        SearchInfo::Depth { depth } => println!("info depth {depth}"),
        SearchInfo::CurrMove { mv, number } => {
            println!("info currmove {mv} currmovenumber {number}");
        }
        SearchInfo::Pv {
            depth,
            score,
            nodes,
            elapsed,
            pv,
        } => {
            let ms = elapsed.as_millis().max(1) as u64;
            let nps = nodes * 1000 / ms;
            let (kind, value) = if *score > MAX_EVAL {
                ("mate", (MATE - score + 1) / 2)
            } else if *score < -MAX_EVAL {
                ("mate", (-MATE - score) / 2)
            } else {
                ("cp", *score)
            };
            let line = pv
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            println!(
                "info depth {depth} time {ms} nodes {nodes} nps {nps} score {kind} {value} pv {line}"
            );
        }
    }
}

impl Default for UciEngine {
    fn default() -> Self {
        Self::new()
    }
}
