use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::bits::bitboard::Bitboard;
use crate::bits::castling::CastlingRights;
use crate::bits::square::Square;
use crate::board::hasher::Hasher;
use crate::piece::{Color, FlipSide, Hash, Piece};

pub const STARTING_POSITION_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Clone, Serialize, Deserialize)]
pub struct Board {
    pub(super) pieces:          [Bitboard; Piece::len()],
    pub(super) colors:          [Bitboard; 2],
    pub(super) turn:            Color,
    pub(super) castling:        CastlingRights,
    pub(super) en_passant:      Option<Square>,
    pub(super) halfmove_clock:  u16,
    pub(super) fullmove_number: u16,
    pub(super) hash:            Hash,
    /// king/rook start files for Chess960 castling, None for classical
    pub(super) c960_files:      Option<C960Files>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct C960Files {
    pub king_file:       usize,
    pub kside_rook_file: usize,
    pub qside_rook_file: usize,
}

impl Default for Board {
    fn default() -> Self {
        Board {
            pieces:          [Bitboard::EMPTY; 6],
            colors:          [Bitboard::EMPTY; 2],
            turn:            Color::White,
            castling:        CastlingRights::NONE,
            en_passant:      None,
            halfmove_clock:  0,
            fullmove_number: 1,
            hash:            0,
            c960_files:      None,
        }
    }
}

impl PartialEq for Board {
    fn eq(&self, other: &Self) -> bool {
        self.pieces == other.pieces
            && self.colors == other.colors
            && self.turn == other.turn
            && self.castling == other.castling
            && self.en_passant == other.en_passant
            && self.halfmove_clock == other.halfmove_clock
            && self.fullmove_number == other.fullmove_number
    }
}

impl Eq for Board {}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Board").field("fen", &self.to_fen()).finish()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fen())?;
        if f.alternate() {
            writeln!(f)?;
            f.write_str(&self.to_diagram())?;
            writeln!(f, "hash: {:x}", self.hash())?;
        }
        Ok(())
    }
}

impl FromStr for Board {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Board::parse_fen(s)
    }
}

impl Board {
    pub fn new_empty() -> Board {
        Default::default()
    }

    pub fn starting_pos() -> Board {
        Board::parse_fen(STARTING_POSITION_FEN).expect("starting fen")
    }

    #[inline]
    pub fn pieces(&self, p: Piece) -> Bitboard {
        self.pieces[p]
    }

    #[inline]
    pub fn pawns(&self) -> Bitboard {
        self.pieces(Piece::Pawn)
    }

    #[inline]
    pub fn knights(&self) -> Bitboard {
        self.pieces(Piece::Knight)
    }

    #[inline]
    pub fn bishops(&self) -> Bitboard {
        self.pieces(Piece::Bishop)
    }

    #[inline]
    pub fn rooks(&self) -> Bitboard {
        self.pieces(Piece::Rook)
    }

    #[inline]
    pub fn queens(&self) -> Bitboard {
        self.pieces(Piece::Queen)
    }

    #[inline]
    pub fn kings(&self) -> Bitboard {
        self.pieces(Piece::King)
    }

    #[inline]
    pub fn color(&self, c: Color) -> Bitboard {
        self.colors[c]
    }

    #[inline]
    pub fn white(&self) -> Bitboard {
        self.colors[Color::White]
    }

    #[inline]
    pub fn black(&self) -> Bitboard {
        self.colors[Color::Black]
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.white() | self.black()
    }

    #[inline]
    pub fn us(&self) -> Bitboard {
        self.color(self.turn)
    }

    #[inline]
    pub fn them(&self) -> Bitboard {
        self.color(self.turn.flip_side())
    }

    #[inline]
    pub fn turn(&self) -> Color {
        self.turn
    }

    #[inline]
    pub fn color_them(&self) -> Color {
        self.turn.flip_side()
    }

    #[inline]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    #[inline]
    pub fn en_passant_square(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> i32 {
        self.halfmove_clock.into()
    }

    #[inline]
    pub fn fullmove_number(&self) -> i32 {
        self.fullmove_number.into()
    }

    #[inline]
    pub fn hash(&self) -> Hash {
        self.hash
    }

    #[inline]
    pub fn c960_files(&self) -> Option<C960Files> {
        self.c960_files
    }

    pub fn set_c960_files(&mut self, files: Option<C960Files>) {
        self.c960_files = files;
    }

    #[inline]
    pub fn king(&self, king_color: Color) -> Option<Square> {
        (self.kings() & self.color(king_color)).find_first_square()
    }

    #[inline]
    pub fn piece(&self, sq: Square) -> Option<Piece> {
        Piece::ALL.into_iter().find(|&p| sq.is_in(self.pieces(p)))
    }

    #[inline]
    pub fn color_of(&self, sq: Square) -> Option<Color> {
        if sq.is_in(self.white()) {
            Some(Color::White)
        } else if sq.is_in(self.black()) {
            Some(Color::Black)
        } else {
            None
        }
    }

    #[inline]
    pub fn piece_and_color(&self, sq: Square) -> Option<(Piece, Color)> {
        Some((self.piece(sq)?, self.color_of(sq)?))
    }

    #[inline]
    pub fn count_of(&self, c: Color, p: Piece) -> i32 {
        (self.pieces(p) & self.color(c)).popcount()
    }

    pub(super) fn toggle_piece(&mut self, bb: Bitboard, p: Piece, c: Color) {
        self.pieces[p] ^= bb;
        self.colors[c] ^= bb;
    }

    pub(super) fn move_piece(&mut self, from: Bitboard, to: Bitboard, p: Piece, c: Color) {
        self.pieces[p] ^= from | to;
        self.colors[c] ^= from | to;
    }

    pub(super) fn change_piece(&mut self, bb: Bitboard, from: Piece, to: Piece) {
        self.pieces[from] ^= bb;
        self.pieces[to] ^= bb;
    }

    pub fn set_piece(&mut self, sq: Square, pc: Option<(Piece, Color)>) {
        let bb = sq.as_bb();
        for p in &mut self.pieces {
            p.remove(bb);
        }
        for c in &mut self.colors {
            c.remove(bb);
        }
        if let Some((p, c)) = pc {
            self.pieces[p].insert(bb);
            self.colors[c].insert(bb);
        }
        self.recalculate_hash();
    }

    pub fn set_turn(&mut self, c: Color) {
        self.turn = c;
        self.recalculate_hash();
    }

    pub fn set_castling(&mut self, cr: CastlingRights) {
        self.castling = cr;
        self.recalculate_hash();
    }

    pub fn set_en_passant(&mut self, sq: Option<Square>) {
        self.en_passant = sq;
        self.recalculate_hash();
    }

    pub fn set_halfmove_clock(&mut self, hmvc: i32) {
        self.halfmove_clock = hmvc as u16;
    }

    pub fn set_fullmove_number(&mut self, fmvn: i32) {
        self.fullmove_number = fmvn as u16;
    }

    #[inline]
    pub(super) fn recalculate_hash(&mut self) {
        self.hash = Hasher::instance().hash_board(self);
    }

    /// no pawns/rooks/queens, at most a bare minor each (per FIDE practice)
    pub fn is_insufficient_material(&self) -> bool {
        if self.pawns().any() || self.rooks().any() || self.queens().any() {
            return false;
        }
        for c in Color::ALL {
            if self.count_of(c, Piece::Bishop) > 1 {
                return false;
            }
            if self.count_of(c, Piece::Bishop) != 0 && self.count_of(c, Piece::Knight) != 0 {
                return false;
            }
        }
        for c in Color::ALL {
            let them = c.flip_side();
            if self.count_of(c, Piece::Knight) >= 2
                && (self.count_of(them, Piece::Bishop) != 0 || self.count_of(them, Piece::Knight) != 0)
            {
                return false;
            }
        }
        true
    }

    /// one rank as 8 chars, '.' for empty, rank_index 0 = rank 1
    pub fn rank_text(&self, rank_index: usize) -> String {
        let mut s = String::with_capacity(8);
        for file in 0..8 {
            let sq = Square::from_xy(file as u32, rank_index as u32);
            match self.piece_and_color(sq) {
                Some((p, c)) => s.push(p.to_char(c)),
                None => s.push('.'),
            }
        }
        s
    }

    pub fn to_diagram(&self) -> String {
        let mut s = String::new();
        for rank in (0..8).rev() {
            s += &self.rank_text(rank);
            s += "\n";
        }
        s
    }

    /// first four FEN fields (EPD form)
    pub fn to_epd(&self) -> String {
        format!(
            "{placement} {turn} {castle} {ep}",
            placement = self.placement_fen(),
            turn = self.turn,
            castle = self.castling,
            ep = match self.en_passant {
                Some(sq) => sq.uci().to_string(),
                None => "-".to_string(),
            },
        )
    }

    pub fn to_fen(&self) -> String {
        format!(
            "{epd} {fifty} {count}",
            epd = self.to_epd(),
            fifty = self.halfmove_clock(),
            count = self.fullmove_number()
        )
    }

    fn placement_fen(&self) -> String {
        let mut fen = (0..8)
            .rev()
            .map(|r| self.rank_text(r))
            .collect::<Vec<String>>()
            .join("/");
        for i in (1..=8).rev() {
            fen = fen.replace(".".repeat(i).as_str(), i.to_string().as_str());
        }
        fen
    }

    pub fn parse_piece_placement(placement: &str) -> Result<Board> {
        let mut pos = String::from(placement);
        for i in 1..=8 {
            pos = pos.replace(i.to_string().as_str(), ".".repeat(i).as_str());
        }
        let ranks: Vec<&str> = pos.split('/').collect();
        if ranks.len() != 8 || ranks.iter().any(|r| r.chars().count() != 8) {
            bail!("expected 8 ranks of 8 pieces in fen {}", placement);
        }
        let mut b = Board::new_empty();
        for (i, rank) in ranks.iter().enumerate() {
            let rank_index = 7 - i;
            for (file, ch) in rank.chars().enumerate() {
                if ch == '.' {
                    continue;
                }
                let p = Piece::from_char(ch)?;
                let c = Color::from_piece_char(ch)?;
                let bb = Square::from_xy(file as u32, rank_index as u32).as_bb();
                b.pieces[p].insert(bb);
                b.colors[c].insert(bb);
            }
        }
        b.recalculate_hash();
        Ok(b)
    }

    /// 0. piece placement  1. active color  2. castling  3. e/p square
    /// 4. half move clock  5. full move counter
    pub fn parse_fen(fen: &str) -> Result<Board> {
        let words = fen.split_whitespace().collect::<Vec<_>>();
        if words.len() < 4 {
            bail!("must specify at least 4 parts in fen '{}'", fen);
        }
        let mut b = Board::parse_piece_placement(words[0])?;
        b.turn = Color::parse(words[1])?;
        b.castling = CastlingRights::parse(words[2])?;
        b.en_passant = if words[3] == "-" {
            None
        } else {
            Some(Square::parse(words[3])?)
        };
        if words.len() >= 6 {
            b.halfmove_clock = words[4]
                .parse()
                .with_context(|| format!("invalid halfmove clock '{}'", words[4]))?;
            b.fullmove_number = words[5]
                .parse()
                .with_context(|| format!("invalid fullmove count '{}'", words[5]))?;
        }
        b.recalculate_hash();
        b.validate()?;
        Ok(b)
    }

    pub fn validate(&self) -> Result<()> {
        if self.black().intersects(self.white()) {
            bail!("white and black occupancy are not disjoint");
        }
        let mut bb = Bitboard::empty();
        for &p in Piece::ALL.iter() {
            let pieces = self.pieces(p);
            if pieces.intersects(bb) {
                bail!("piece bitboard for {p} intersects other pieces in {self}");
            }
            bb |= pieces;
        }
        if bb != self.occupied() {
            bail!("piece bitboards and occupied squares do not match in {self}");
        }
        for c in Color::ALL {
            if (self.kings() & self.color(c)).popcount() != 1 {
                bail!("expected exactly one {c} king in {self}");
            }
        }
        if let Some(ep) = self.en_passant_square() {
            if !ep.is_in(Bitboard::RANK_3 | Bitboard::RANK_6) {
                bail!("en passant square must be rank 3 or 6 not {}", ep.uci());
            }
        }
        Ok(())
    }
}
