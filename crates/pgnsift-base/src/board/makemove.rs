use crate::bits::castling::CastlingRights;
use crate::board::board::Board;
use crate::mv::Move;
use crate::piece::{FlipSide, Piece};

impl Board {
    #[must_use]
    pub fn make_move(&self, m: Move) -> Board {
        let mut b = self.clone();
        b.apply_move(m);
        b
    }

    pub fn apply_move(&mut self, m: Move) {
        let us = self.turn;
        self.fullmove_number += us.chooser_wb(0, 1);
        self.halfmove_clock += 1;

        if m.is_null {
            self.en_passant = None;
            self.turn = us.flip_side();
            self.recalculate_hash();
            return;
        }

        let mut en_passant = None;
        if m.mover == Piece::Pawn {
            self.halfmove_clock = 0;
            if m.is_pawn_double_push() {
                en_passant = Some(m.double_push_en_passant_square());
            }
        }

        if let Some(captured) = m.capture {
            self.halfmove_clock = 0;
            debug_assert!(captured != Piece::King, "king captured by {m} on {self}");
            self.toggle_piece(m.capture_square(us).as_bb(), captured, us.flip_side());
        }

        self.en_passant = en_passant;

        if let Some(side) = m.castle {
            // lift both pieces before replacing them: in Chess960 the
            // king and rook squares may overlap
            let (rook_from, rook_to) = self.castle_rook_squares(side, us);
            self.toggle_piece(m.from.as_bb(), Piece::King, us);
            self.toggle_piece(rook_from.as_bb(), Piece::Rook, us);
            self.toggle_piece(m.to.as_bb(), Piece::King, us);
            self.toggle_piece(rook_to.as_bb(), Piece::Rook, us);
        } else {
            self.move_piece(m.from.as_bb(), m.to.as_bb(), m.mover, us);
        }

        if let Some(promo) = m.promo {
            self.change_piece(m.to.as_bb(), Piece::Pawn, promo);
        }

        // castling rights lapse when pieces move from, or capture on,
        // the king and rook home squares
        self.castling -= CastlingRights::rights_lost(m.from, m.to);
        if m.mover == Piece::King {
            self.castling -= CastlingRights::king_side_right(us) | CastlingRights::queen_side_right(us);
        }
        // Chess960 rooks live on recorded files rather than a1/h1
        if let Some(files) = self.c960_files {
            if m.mover == Piece::Rook && m.from.rank_index() == us.back_rank_index() {
                if m.from.file_index() == files.kside_rook_file {
                    self.castling -= CastlingRights::king_side_right(us);
                } else if m.from.file_index() == files.qside_rook_file {
                    self.castling -= CastlingRights::queen_side_right(us);
                }
            }
        }

        self.turn = us.flip_side();
        self.recalculate_hash();
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::bits::square::Square;
    use crate::mv::CastlingSide;
    use crate::piece::Color;

    fn uci_move(b: &Board, from: Square, to: Square) -> Move {
        b.legal_moves()
            .into_iter()
            .find(|m| m.from == from && m.to == to)
            .unwrap_or_else(|| panic!("no move {from}{to} on {b}"))
    }

    #[test]
    fn test_make_move() {
        let b = Board::starting_pos();
        let b = b.make_move(uci_move(&b, Square::E2, Square::E4));
        assert_eq!(b.to_fen(), "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1");
        let b = b.make_move(uci_move(&b, Square::A7, Square::A6));
        assert_eq!(b.fullmove_number(), 2);
        assert_eq!(b.halfmove_clock(), 0);
        assert_eq!(b.en_passant_square(), None);
    }

    #[test]
    fn test_null_move() {
        let b = Board::parse_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1").unwrap();
        let b2 = b.make_move(Move::new_null());
        assert_eq!(b2.turn(), Color::White);
        assert_eq!(b2.en_passant_square(), None);
        assert_eq!(b2.occupied(), b.occupied());
    }

    #[test]
    fn test_capture_resets_clock() {
        let b = Board::parse_fen("k7/8/8/3p4/4N3/8/8/K7 w - - 12 40").unwrap();
        let b2 = b.make_move(uci_move(&b, Square::E4, Square::D5));
        assert_eq!(b2.halfmove_clock(), 0);
        assert_eq!(b2.piece(Square::D5), Some(Piece::Knight));
    }

    #[test]
    fn test_en_passant_capture() {
        let b = Board::parse_fen("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 2").unwrap();
        let mv = b.legal_moves().into_iter().find(|m| m.is_ep).unwrap();
        let b2 = b.make_move(mv);
        assert_eq!(b2.piece(Square::E4), None, "captured pawn removed");
        assert_eq!(b2.piece(Square::E3), Some(Piece::Pawn));
    }

    #[test]
    fn test_castling_moves_rook() {
        let b = Board::parse_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        let oo = b
            .legal_moves()
            .into_iter()
            .find(|m| m.castle == Some(CastlingSide::KingSide))
            .unwrap();
        let b2 = b.make_move(oo);
        assert_eq!(b2.piece(Square::G1), Some(Piece::King));
        assert_eq!(b2.piece(Square::F1), Some(Piece::Rook));
        assert!(!b2.castling().contains(CastlingRights::WHITE_KING));
        assert!(!b2.castling().contains(CastlingRights::WHITE_QUEEN));
        assert!(b2.castling().contains(CastlingRights::BLACK_KING));
    }

    #[test]
    fn test_rook_capture_loses_rights() {
        let b = Board::parse_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let b2 = b.make_move(uci_move(&b, Square::A1, Square::A8));
        assert_eq!(b2.castling().to_string(), "Kk");
    }

    #[test]
    fn test_promotion() {
        let b = Board::parse_fen("7k/P7/8/8/8/8/8/7K w - - 0 1").unwrap();
        let promo = b
            .legal_moves()
            .into_iter()
            .find(|m| m.promo == Some(Piece::Queen))
            .unwrap();
        let b2 = b.make_move(promo);
        assert_eq!(b2.piece(Square::A8), Some(Piece::Queen));
        assert_eq!(b2.piece(Square::A7), None);
        assert_eq!((b2.pawns() & b2.white()).popcount(), 0);
    }

    #[test]
    fn test_hash_consistent_after_moves() {
        use crate::board::hasher::Hasher;
        let mut b = Board::starting_pos();
        for mv in b.clone().legal_moves() {
            let b2 = b.make_move(mv);
            assert_eq!(b2.hash(), Hasher::instance().hash_board(&b2), "hash after {mv}");
        }
        b.apply_move(Move::new_null());
        assert_eq!(b.hash(), Hasher::instance().hash_board(&b));
    }
}
