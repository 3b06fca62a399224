//! Errors produced while building positions.

/// Reasons a FEN string can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FenError {
    /// The string does not have the expected fields.
    #[error("FEN must have at least 4 whitespace-separated fields, got {0}")]
    WrongFieldCount(usize),

    /// The placement field does not describe 8 ranks of 8 squares.
    #[error("malformed piece placement: {0}")]
    BadPlacement(String),

    /// An unknown piece character.
    #[error("unknown piece character '{0}'")]
    BadPiece(char),

    /// The side-to-move field is neither `w` nor `b`.
    #[error("side to move must be 'w' or 'b', got {0:?}")]
    BadSideToMove(String),

    /// The castling field contains an unknown character.
    #[error("bad castling field {0:?}")]
    BadCastling(String),

    /// The en-passant field is not `-` or a square.
    #[error("bad en-passant field {0:?}")]
    BadEnPassant(String),

    /// A move counter failed to parse.
    #[error("bad move counter {0:?}")]
    BadCounter(String),

    /// The described position is structurally impossible.
    #[error("illegal position: {0}")]
    IllegalPosition(&'static str),
}
