//! Copy-make move application with incremental hash updates.

use crate::board::Board;
use crate::color::Color;
use crate::moves::{Move, MoveKind};
use crate::piece::{Piece, PieceKind};
use crate::square::Square;
use crate::zobrist;

impl Board {
    #[inline]
    fn add_piece(&mut self, kind: PieceKind, color: Color, sq: Square) {
        self.pieces[kind.index()] |= sq.bitboard();
        self.sides[color.index()] |= sq.bitboard();
        self.hash ^= zobrist::piece(Piece::new(kind, color), sq);
    }

    #[inline]
    fn remove_piece(&mut self, kind: PieceKind, color: Color, sq: Square) {
        self.pieces[kind.index()] ^= sq.bitboard();
        self.sides[color.index()] ^= sq.bitboard();
        self.hash ^= zobrist::piece(Piece::new(kind, color), sq);
    }

    #[inline]
    fn shift_piece(&mut self, kind: PieceKind, color: Color, from: Square, to: Square) {
        self.remove_piece(kind, color, from);
        self.add_piece(kind, color, to);
    }

    /// Apply a pseudo-legal move, returning the resulting position.
    ///
    /// The move may still expose the mover's king; callers must reject the
    /// child with [`Board::illegal`] before trusting it.
    ///
    /// # Panics
    ///
    /// Panics if there is no piece on the move's source square, which means
    /// the move was not generated from this position.
    pub fn make_move(&self, mv: Move) -> Board {
        let mut b = *self;
        let us = self.side_to_move;
        let them = !us;
        let from = mv.from();
        let to = mv.to();
        let piece = self
            .piece_on(from)
            .expect("make_move requires a piece on the source square");

        if let Some(ep) = b.en_passant.take() {
            b.hash ^= zobrist::en_passant(ep.file());
        }

        b.halfmove_clock += 1;

        match mv.kind() {
            MoveKind::Normal => {
                if let Some(victim) = self.piece_on(to) {
                    b.remove_piece(victim, them, to);
                    b.halfmove_clock = 0;
                }
                b.shift_piece(piece, us, from, to);
                if piece == PieceKind::Pawn {
                    b.halfmove_clock = 0;
                    if from.index().abs_diff(to.index()) == 16 {
                        let ep = Square::from_index_unchecked(((from.index() + to.index()) / 2) as u8);
                        b.en_passant = Some(ep);
                        b.hash ^= zobrist::en_passant(ep.file());
                    }
                }
            }
            MoveKind::Promotion => {
                if let Some(victim) = self.piece_on(to) {
                    b.remove_piece(victim, them, to);
                }
                b.remove_piece(PieceKind::Pawn, us, from);
                b.add_piece(mv.promotion_piece().kind(), us, to);
                b.halfmove_clock = 0;
            }
            MoveKind::EnPassant => {
                // The captured pawn sits behind the target square.
                let captured = match us {
                    Color::White => Square::from_index_unchecked(to.index() as u8 - 8),
                    Color::Black => Square::from_index_unchecked(to.index() as u8 + 8),
                };
                b.remove_piece(PieceKind::Pawn, them, captured);
                b.shift_piece(PieceKind::Pawn, us, from, to);
                b.halfmove_clock = 0;
            }
            MoveKind::Castling => {
                b.shift_piece(PieceKind::King, us, from, to);
                let (rook_from, rook_to) = match to {
                    Square::G1 => (Square::H1, Square::F1),
                    Square::C1 => (Square::A1, Square::D1),
                    Square::G8 => (Square::H8, Square::F8),
                    _ => (Square::A8, Square::D8),
                };
                b.shift_piece(PieceKind::Rook, us, rook_from, rook_to);
            }
        }

        let rights = b.castling.after_move(from, to);
        if rights != b.castling {
            b.hash ^= zobrist::castling(b.castling) ^ zobrist::castling(rights);
            b.castling = rights;
        }

        b.side_to_move = them;
        b.hash ^= zobrist::side();
        if us == Color::Black {
            b.fullmove_number += 1;
        }
        b.occupied = b.sides[0] | b.sides[1];
        b
    }

    /// Pass the move: flip the side to move without touching any piece.
    ///
    /// Used by null-move pruning. The en-passant square is cleared because
    /// the opponent moves next from the same placement.
    pub fn make_null_move(&self) -> Board {
        let mut b = *self;
        if let Some(ep) = b.en_passant.take() {
            b.hash ^= zobrist::en_passant(ep.file());
        }
        b.side_to_move = !b.side_to_move;
        b.hash ^= zobrist::side();
        b.halfmove_clock += 1;
        b
    }
}
