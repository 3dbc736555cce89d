use once_cell::sync::Lazy;

use crate::bits::bitboard::{Bitboard, Dir};
use crate::bits::castling::CastlingRights;
use crate::bits::square::Square;
use crate::board::board::Board;
use crate::mv::{CastlingSide, Move};
use crate::piece::{Color, FlipSide, Piece};

static KNIGHT_ATTACKS: Lazy<[Bitboard; 64]> = Lazy::new(|| {
    let mut attacks = [Bitboard::EMPTY; 64];
    for sq in Square::all() {
        let bb = sq.as_bb();
        let east = bb.shift(Dir::E);
        let west = bb.shift(Dir::W);
        let targets = (east | west).shift(Dir::N).shift(Dir::N)
            | (east | west).shift(Dir::S).shift(Dir::S)
            | (east.shift(Dir::E) | west.shift(Dir::W)).shift(Dir::N)
            | (east.shift(Dir::E) | west.shift(Dir::W)).shift(Dir::S);
        attacks[sq.index()] = targets;
    }
    attacks
});

static KING_ATTACKS: Lazy<[Bitboard; 64]> = Lazy::new(|| {
    let mut attacks = [Bitboard::EMPTY; 64];
    for sq in Square::all() {
        let bb = sq.as_bb();
        let mut targets = Bitboard::EMPTY;
        for dir in Dir::ALL {
            targets |= bb.shift(dir);
        }
        attacks[sq.index()] = targets;
    }
    attacks
});

fn sliding_attacks(sq: Square, occupied: Bitboard, dirs: &[Dir]) -> Bitboard {
    let mut attacks = Bitboard::EMPTY;
    for &dir in dirs {
        let mut bb = sq.as_bb().shift(dir);
        while bb.any() {
            attacks |= bb;
            if bb.intersects(occupied) {
                break;
            }
            bb = bb.shift(dir);
        }
    }
    attacks
}

fn pawn_attacks(sq: Square, c: Color) -> Bitboard {
    let bb = sq.as_bb();
    match c {
        Color::White => bb.shift(Dir::NE) | bb.shift(Dir::NW),
        Color::Black => bb.shift(Dir::SE) | bb.shift(Dir::SW),
    }
}

impl Board {
    /// squares a piece on sq attacks (occupancy-aware for sliders)
    pub fn attacks_from(&self, p: Piece, sq: Square, c: Color) -> Bitboard {
        match p {
            Piece::Pawn => pawn_attacks(sq, c),
            Piece::Knight => KNIGHT_ATTACKS[sq.index()],
            Piece::King => KING_ATTACKS[sq.index()],
            Piece::Bishop => sliding_attacks(sq, self.occupied(), &Dir::BISHOP),
            Piece::Rook => sliding_attacks(sq, self.occupied(), &Dir::ROOK),
            Piece::Queen => sliding_attacks(sq, self.occupied(), &Dir::ALL),
        }
    }

    /// all pieces of colour `by` attacking sq
    pub fn attackers_of(&self, sq: Square, by: Color) -> Bitboard {
        let occ = self.occupied();
        let attackers = (KNIGHT_ATTACKS[sq.index()] & self.knights())
            | (KING_ATTACKS[sq.index()] & self.kings())
            | (sliding_attacks(sq, occ, &Dir::BISHOP) & (self.bishops() | self.queens()))
            | (sliding_attacks(sq, occ, &Dir::ROOK) & (self.rooks() | self.queens()))
            | (pawn_attacks(sq, by.flip_side()) & self.pawns());
        attackers & self.color(by)
    }

    #[inline]
    pub fn is_attacked(&self, sq: Square, by: Color) -> bool {
        self.attackers_of(sq, by).any()
    }

    pub fn is_in_check(&self, king_color: Color) -> bool {
        match self.king(king_color) {
            Some(sq) => self.is_attacked(sq, king_color.flip_side()),
            None => false,
        }
    }

    pub fn is_checkmate(&self) -> bool {
        self.is_in_check(self.turn()) && !self.has_legal_moves()
    }

    pub fn is_stalemate(&self) -> bool {
        !self.is_in_check(self.turn()) && !self.has_legal_moves()
    }

    pub fn has_legal_moves(&self) -> bool {
        !self.legal_moves().is_empty()
    }

    /// does mv (assumed legal here) give check to the opponent
    pub fn gives_check(&self, mv: Move) -> bool {
        let after = self.make_move(mv);
        after.is_in_check(after.turn())
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        let us = self.turn();
        self.pseudo_legal_moves()
            .into_iter()
            .filter(|&mv| !self.make_move(mv).is_in_check(us))
            .collect()
    }

    fn pseudo_legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(64);
        self.pawn_moves(&mut moves);
        self.piece_moves(&mut moves);
        self.castling_moves(&mut moves);
        moves
    }

    fn push_pawn_move(&self, moves: &mut Vec<Move>, from: Square, to: Square, capture: Option<Piece>, is_ep: bool) {
        let us = self.turn();
        let template = Move {
            from,
            to,
            mover: Piece::Pawn,
            capture,
            promo: None,
            castle: None,
            is_ep,
            is_null: false,
        };
        if to.rank_index() == us.promo_rank_index() {
            for promo in [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight] {
                moves.push(Move {
                    promo: Some(promo),
                    ..template
                });
            }
        } else {
            moves.push(template);
        }
    }

    fn pawn_moves(&self, moves: &mut Vec<Move>) {
        let us = self.turn();
        let forward = us.chooser_wb(Dir::N, Dir::S);
        let occ = self.occupied();
        for from in (self.pawns() & self.us()).squares() {
            // advances
            if let Some(to) = from.shift(forward) {
                if !to.is_in(occ) {
                    self.push_pawn_move(moves, from, to, None, false);
                    if from.rank_index() == us.pawn_rank_index() {
                        if let Some(to2) = to.shift(forward) {
                            if !to2.is_in(occ) {
                                self.push_pawn_move(moves, from, to2, None, false);
                            }
                        }
                    }
                }
            }
            // captures
            for to in pawn_attacks(from, us).squares() {
                if to.is_in(self.them()) {
                    self.push_pawn_move(moves, from, to, self.piece(to), false);
                } else if Some(to) == self.en_passant_square() {
                    self.push_pawn_move(moves, from, to, Some(Piece::Pawn), true);
                }
            }
        }
    }

    fn piece_moves(&self, moves: &mut Vec<Move>) {
        for p in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen, Piece::King] {
            for from in (self.pieces(p) & self.us()).squares() {
                let targets = self.attacks_from(p, from, self.turn()) - self.us();
                for to in targets.squares() {
                    moves.push(Move {
                        from,
                        to,
                        mover: p,
                        capture: self.piece(to),
                        promo: None,
                        castle: None,
                        is_ep: false,
                        is_null: false,
                    });
                }
            }
        }
    }

    fn castling_moves(&self, moves: &mut Vec<Move>) {
        let us = self.turn();
        let them = us.flip_side();
        let Some(king_from) = self.king(us) else {
            return;
        };
        for (side, right) in [
            (CastlingSide::KingSide, CastlingRights::king_side_right(us)),
            (CastlingSide::QueenSide, CastlingRights::queen_side_right(us)),
        ] {
            if !self.castling().contains(right) {
                continue;
            }
            let (rook_from, rook_to) = self.castle_rook_squares(side, us);
            if self.piece(rook_from) != Some(Piece::Rook) || self.color_of(rook_from) != Some(us) {
                continue;
            }
            let king_to = side.king_destination(us);

            // the king's path and destination must be unattacked, everything
            // between the moving pieces empty
            let mut squares_between = path_between(king_from, king_to)
                | path_between(rook_from, rook_to)
                | king_to.as_bb()
                | rook_to.as_bb();
            squares_between.remove(king_from.as_bb() | rook_from.as_bb());
            if squares_between.intersects(self.occupied()) {
                continue;
            }
            if self.is_attacked(king_from, them) {
                continue;
            }
            let king_path = path_between(king_from, king_to) | king_to.as_bb();
            if king_path.squares().any(|sq| self.is_attacked(sq, them)) {
                continue;
            }
            moves.push(Move {
                from: king_from,
                to: king_to,
                mover: Piece::King,
                capture: None,
                promo: None,
                castle: Some(side),
                is_ep: false,
                is_null: false,
            });
        }
    }

    /// rook start/end squares for castling, honouring Chess960 files
    pub fn castle_rook_squares(&self, side: CastlingSide, c: Color) -> (Square, Square) {
        match self.c960_files() {
            None => side.rook_from_to(c),
            Some(files) => {
                let rank = c.back_rank_index() as u32;
                let file = match side {
                    CastlingSide::KingSide => files.kside_rook_file,
                    CastlingSide::QueenSide => files.qside_rook_file,
                };
                let (_, to) = side.rook_from_to(c);
                (Square::from_xy(file as u32, rank), to)
            }
        }
    }
}

/// squares strictly between two squares on the same rank
fn path_between(from: Square, to: Square) -> Bitboard {
    let mut path = Bitboard::EMPTY;
    if from.rank_index() != to.rank_index() {
        return path;
    }
    let rank = from.rank_index() as u32;
    let (lo, hi) = if from.file_index() < to.file_index() {
        (from.file_index() + 1, to.file_index())
    } else {
        (to.file_index() + 1, from.file_index())
    };
    for file in lo..hi {
        path |= Square::from_xy(file as u32, rank).as_bb();
    }
    path
}
