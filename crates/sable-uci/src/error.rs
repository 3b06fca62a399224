//! UCI protocol errors.

/// Errors raised while handling UCI input.
#[derive(Debug, thiserror::Error)]
pub enum UciError {
    /// `position` without `startpos` or `fen`.
    #[error("malformed position command: expected startpos or fen")]
    MalformedPosition,

    /// The FEN in a `position` command did not parse.
    #[error("invalid FEN: {0}")]
    InvalidFen(#[from] sable_core::FenError),

    /// A move in a `position` command was unparseable or illegal.
    #[error("invalid move in position command: {0}")]
    InvalidMove(String),

    /// A `go` or `setoption` parameter was missing its value.
    #[error("missing value for parameter {0}")]
    MissingValue(&'static str),

    /// A parameter value did not parse.
    #[error("invalid value for {param}: {value}")]
    InvalidValue {
        /// Parameter name.
        param: &'static str,
        /// Offending value.
        value: String,
    },

    /// Reading stdin failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
