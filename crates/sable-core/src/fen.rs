//! FEN parsing and formatting.

use std::fmt;
use std::str::FromStr;

use crate::bitboard::Bitboard;
use crate::board::Board;
use crate::castling::CastleRights;
use crate::color::Color;
use crate::error::FenError;
use crate::piece::PieceKind;
use crate::square::Square;

impl FromStr for Board {
    type Err = FenError;

    fn from_str(fen: &str) -> Result<Board, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(FenError::WrongFieldCount(fields.len()));
        }

        let mut board = Board {
            pieces: [Bitboard::EMPTY; PieceKind::COUNT],
            sides: [Bitboard::EMPTY; Color::COUNT],
            occupied: Bitboard::EMPTY,
            side_to_move: Color::White,
            castling: CastleRights::NONE,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            hash: 0,
        };

        // Piece placement, rank 8 first.
        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::BadPlacement(fields[0].to_string()));
        }
        for (i, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - i;
            let mut file = 0usize;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as usize;
                } else {
                    let kind = PieceKind::from_fen_char(c).ok_or(FenError::BadPiece(c))?;
                    let color = if c.is_ascii_uppercase() { Color::White } else { Color::Black };
                    if file >= 8 {
                        return Err(FenError::BadPlacement(fields[0].to_string()));
                    }
                    let sq = Square::from_index_unchecked((rank * 8 + file) as u8);
                    board.pieces[kind.index()] |= sq.bitboard();
                    board.sides[color.index()] |= sq.bitboard();
                    file += 1;
                }
            }
            if file != 8 {
                return Err(FenError::BadPlacement(fields[0].to_string()));
            }
        }
        board.occupied = board.sides[0] | board.sides[1];

        board.side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::BadSideToMove(other.to_string())),
        };

        if fields[2] != "-" {
            for c in fields[2].chars() {
                let right = match c {
                    'K' => CastleRights::WHITE_KINGSIDE,
                    'Q' => CastleRights::WHITE_QUEENSIDE,
                    'k' => CastleRights::BLACK_KINGSIDE,
                    'q' => CastleRights::BLACK_QUEENSIDE,
                    _ => return Err(FenError::BadCastling(fields[2].to_string())),
                };
                board.castling = board.castling.with(right);
            }
        }

        if fields[3] != "-" {
            board.en_passant = Some(
                Square::from_algebraic(fields[3])
                    .ok_or_else(|| FenError::BadEnPassant(fields[3].to_string()))?,
            );
        }

        if let Some(half) = fields.get(4) {
            board.halfmove_clock = half
                .parse()
                .map_err(|_| FenError::BadCounter(half.to_string()))?;
        }
        if let Some(full) = fields.get(5) {
            board.fullmove_number = full
                .parse()
                .map_err(|_| FenError::BadCounter(full.to_string()))?;
        }

        for color in Color::ALL {
            if (board.pieces(PieceKind::King) & board.side(color)).count() != 1 {
                return Err(FenError::IllegalPosition("each side needs exactly one king"));
            }
        }
        if (board.pieces(PieceKind::Pawn) & (Bitboard::RANK_1 | Bitboard::RANK_8)).any() {
            return Err(FenError::IllegalPosition("pawns cannot stand on the back ranks"));
        }

        board.recompute_hash();
        Ok(board)
    }
}

impl fmt::Display for Board {
    /// Format the position as a FEN string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0u8..8).rev() {
            let mut empty = 0;
            for file in 0u8..8 {
                let sq = Square::from_index_unchecked(rank * 8 + file);
                match (self.piece_on(sq), self.color_on(sq)) {
                    (Some(kind), Some(color)) => {
                        if empty > 0 {
                            write!(f, "{empty}")?;
                            empty = 0;
                        }
                        let c = match color {
                            Color::White => kind.fen_char().to_ascii_uppercase(),
                            Color::Black => kind.fen_char(),
                        };
                        write!(f, "{c}")?;
                    }
                    _ => empty += 1,
                }
            }
            if empty > 0 {
                write!(f, "{empty}")?;
            }
            if rank > 0 {
                write!(f, "/")?;
            }
        }

        let side = match self.side_to_move() {
            Color::White => 'w',
            Color::Black => 'b',
        };
        write!(f, " {side} {} ", self.castling())?;
        match self.en_passant() {
            Some(sq) => write!(f, "{sq}")?,
            None => write!(f, "-")?,
        }
        write!(f, " {} {}", self.halfmove_clock(), self.fullmove_number())
    }
}
