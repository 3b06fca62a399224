//! UCI command parsing.

use std::time::Duration;

use sable_core::{Board, Move, generate_legal_moves};

use crate::error::UciError;

/// Parameters of a `go` command.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoParams {
    pub wtime: Option<Duration>,
    pub btime: Option<Duration>,
    pub winc: Option<Duration>,
    pub binc: Option<Duration>,
    pub movestogo: Option<u32>,
    pub movetime: Option<Duration>,
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    pub infinite: bool,
    pub ponder: bool,
}

/// A parsed UCI command.
#[derive(Debug)]
pub enum Command {
    Uci,
    IsReady,
    UciNewGame,
    /// A `position` command: the resulting board plus the Zobrist hashes of
    /// every position along the way (for repetition detection).
    Position {
        board: Board,
        history: Vec<u64>,
    },
    Go(GoParams),
    SetOption {
        name: String,
        value: Option<String>,
    },
    Stop,
    PonderHit,
    Quit,
    Unknown(String),
}

/// Parse one line of UCI input.
pub fn parse_command(line: &str) -> Result<Command, UciError> {
    let mut tokens = line.split_whitespace();
    let Some(head) = tokens.next() else {
        return Ok(Command::Unknown(String::new()));
    };

    match head {
        "uci" => Ok(Command::Uci),
        "isready" => Ok(Command::IsReady),
        "ucinewgame" => Ok(Command::UciNewGame),
        "stop" => Ok(Command::Stop),
        "ponderhit" => Ok(Command::PonderHit),
        "quit" => Ok(Command::Quit),
        "position" => parse_position(line),
        "go" => parse_go(tokens),
        "setoption" => parse_setoption(tokens),
        _ => Ok(Command::Unknown(line.to_string())),
    }
}

fn parse_position(line: &str) -> Result<Command, UciError> {
    let rest = line.trim_start_matches("position").trim();

    let (mut board, moves_part) = if let Some(after) = rest.strip_prefix("startpos") {
        (Board::starting_position(), after.trim())
    } else if let Some(after) = rest.strip_prefix("fen") {
        let after = after.trim();
        let (fen_str, moves_part) = match after.find("moves") {
            Some(idx) => (&after[..idx], &after[idx..]),
            None => (after, ""),
        };
        (fen_str.trim().parse::<Board>()?, moves_part)
    } else {
        return Err(UciError::MalformedPosition);
    };

    let mut history = vec![board.hash()];

    if let Some(moves) = moves_part.strip_prefix("moves") {
        for token in moves.split_whitespace() {
            let mv = Move::from_uci(token, &board)
                .filter(|m| generate_legal_moves(&board).iter().any(|lm| lm == m))
                .ok_or_else(|| UciError::InvalidMove(token.to_string()))?;
            board = board.make_move(mv);
            history.push(board.hash());
        }
    }

    Ok(Command::Position { board, history })
}

fn parse_go<'a>(tokens: impl Iterator<Item = &'a str>) -> Result<Command, UciError> {
    let mut params = GoParams::default();
    let mut tokens = tokens.peekable();

    fn parse_num<'a>(
        tokens: &mut impl Iterator<Item = &'a str>,
        param: &'static str,
    ) -> Result<u64, UciError> {
        let value = tokens.next().ok_or(UciError::MissingValue(param))?;
        value.parse().map_err(|_| UciError::InvalidValue {
            param,
            value: value.to_string(),
        })
    }

    while let Some(token) = tokens.next() {
        match token {
            "wtime" => params.wtime = Some(Duration::from_millis(parse_num(&mut tokens, "wtime")?)),
            "btime" => params.btime = Some(Duration::from_millis(parse_num(&mut tokens, "btime")?)),
            "winc" => params.winc = Some(Duration::from_millis(parse_num(&mut tokens, "winc")?)),
            "binc" => params.binc = Some(Duration::from_millis(parse_num(&mut tokens, "binc")?)),
            "movestogo" => params.movestogo = Some(parse_num(&mut tokens, "movestogo")? as u32),
            "movetime" => {
                params.movetime = Some(Duration::from_millis(parse_num(&mut tokens, "movetime")?))
            }
            "depth" => params.depth = Some(parse_num(&mut tokens, "depth")? as i32),
            "nodes" => params.nodes = Some(parse_num(&mut tokens, "nodes")?),
            "infinite" => params.infinite = true,
            "ponder" => params.ponder = true,
            _ => {}
        }
    }

    Ok(Command::Go(params))
}

fn parse_setoption<'a>(tokens: impl Iterator<Item = &'a str>) -> Result<Command, UciError> {
    let mut tokens = tokens.peekable();
    if tokens.next() != Some("name") {
        return Err(UciError::MissingValue("name"));
    }

    let mut name_parts = Vec::new();
    for token in tokens.by_ref() {
        if token == "value" {
            break;
        }
        name_parts.push(token);
    }
    let value: Vec<&str> = tokens.collect();

    Ok(Command::SetOption {
        name: name_parts.join(" "),
        value: if value.is_empty() {
            None
        } else {
            Some(value.join(" "))
        },
    })
}
