use std::fmt::{self, Debug};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bits::bitboard::{Bitboard, Dir, SquaresIterator};

#[derive(Copy, Hash, Clone, PartialOrd, Ord, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
#[rustfmt::skip]
pub enum Square {
    A1, B1, C1, D1, E1, F1, G1, H1,
    A2, B2, C2, D2, E2, F2, G2, H2,
    A3, B3, C3, D3, E3, F3, G3, H3,
    A4, B4, C4, D4, E4, F4, G4, H4,
    A5, B5, C5, D5, E5, F5, G5, H5,
    A6, B6, C6, D6, E6, F6, G6, H6,
    A7, B7, C7, D7, E7, F7, G7, H7,
    A8, B8, C8, D8, E8, F8, G8, H8,
}

impl Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Square").field(&self.uci()).finish()
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.uci())
    }
}

impl<T> std::ops::Index<Square> for [T; 64] {
    type Output = T;
    #[inline]
    fn index(&self, sq: Square) -> &Self::Output {
        &self[sq.index()]
    }
}

impl<T> std::ops::IndexMut<Square> for [T; 64] {
    #[inline]
    fn index_mut(&mut self, sq: Square) -> &mut Self::Output {
        &mut self[sq.index()]
    }
}

impl FromStr for Square {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Square::parse(s)
    }
}

impl Square {
    #[inline]
    #[must_use]
    pub const fn from_u8(i: u8) -> Square {
        assert!(i < 64);
        unsafe { std::mem::transmute(i) }
    }

    #[inline]
    #[must_use]
    pub const fn from_xy(file: u32, rank: u32) -> Square {
        debug_assert!(file <= 7 && rank <= 7);
        Square::from_u8(((rank << 3) | file) as u8)
    }

    #[inline]
    #[must_use]
    pub const fn len() -> usize {
        64
    }

    #[inline]
    #[must_use]
    pub const fn all() -> SquaresIterator {
        Bitboard::all().squares()
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn file_index(self) -> usize {
        self as usize % 8
    }

    #[inline]
    pub const fn rank_index(self) -> usize {
        self as usize / 8
    }

    #[inline]
    #[must_use]
    pub const fn as_bb(self) -> Bitboard {
        Bitboard::from_sq(self as u16)
    }

    #[inline]
    #[must_use]
    pub const fn is_in(self, bb: Bitboard) -> bool {
        self.as_bb().intersects(bb)
    }

    /// shift within the board, None if falling off an edge
    #[inline]
    pub fn shift(self, dir: Dir) -> Option<Square> {
        self.as_bb().shift(dir).find_first_square()
    }

    #[inline]
    #[must_use]
    pub const fn file_char(self) -> char {
        (b'a' + (self as u8 % 8)) as char
    }

    #[inline]
    #[must_use]
    pub const fn rank_char(self) -> char {
        (b'1' + (self as u8 / 8)) as char
    }

    #[must_use]
    pub fn uci(self) -> &'static str {
        #[rustfmt::skip]
        static UCIS: [&str; 64] = [
            "a1", "b1", "c1", "d1", "e1", "f1", "g1", "h1", "a2", "b2", "c2", "d2", "e2", "f2",
            "g2", "h2", "a3", "b3", "c3", "d3", "e3", "f3", "g3", "h3", "a4", "b4", "c4", "d4",
            "e4", "f4", "g4", "h4", "a5", "b5", "c5", "d5", "e5", "f5", "g5", "h5", "a6", "b6",
            "c6", "d6", "e6", "f6", "g6", "h6", "a7", "b7", "c7", "d7", "e7", "f7", "g7", "h7",
            "a8", "b8", "c8", "d8", "e8", "f8", "g8", "h8",
        ];
        UCIS[self]
    }

    pub fn parse(s: &str) -> anyhow::Result<Square> {
        let mut chars = s.chars();
        let bb = match (chars.next(), chars.next(), chars.next()) {
            (Some(f), Some(r), None) => {
                Bitboard::parse_file(&f.to_string())? & Bitboard::parse_rank(&r.to_string())?
            }
            _ => anyhow::bail!("invalid square '{}'", s),
        };
        bb.find_first_square()
            .ok_or_else(|| anyhow::anyhow!("invalid square '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square() {
        assert_eq!(Square::A1.index(), 0);
        assert_eq!(Square::H8.index(), 63);
        assert_eq!(Square::E4.uci(), "e4");
        assert_eq!(Square::E4.file_char(), 'e');
        assert_eq!(Square::E4.rank_char(), '4');
        assert_eq!(Square::from_xy(4, 3), Square::E4);
        assert_eq!(Square::parse("e4").unwrap(), Square::E4);
        assert!(Square::parse("i9").is_err());
        assert!(Square::parse("e").is_err());
    }

    #[test]
    fn test_shift() {
        assert_eq!(Square::E4.shift(Dir::N), Some(Square::E5));
        assert_eq!(Square::A1.shift(Dir::SW), None);
        assert_eq!(Square::H8.shift(Dir::NE), None);
    }
}
