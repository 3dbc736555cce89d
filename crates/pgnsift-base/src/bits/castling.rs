use std::fmt;

use anyhow::{bail, Result};
use bitflags::bitflags;

use crate::bits::square::Square;
use crate::piece::Color;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Debug, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct CastlingRights: u8 {
        const NONE = 0;
        const WHITE_KING = 1 << 0;
        const WHITE_QUEEN = 1 << 1;
        const BLACK_KING = 1 << 2;
        const BLACK_QUEEN = 1 << 3;
        const ALL = Self::WHITE_KING.bits() | Self::WHITE_QUEEN.bits()
                  | Self::BLACK_KING.bits() | Self::BLACK_QUEEN.bits();
    }
}

impl Default for CastlingRights {
    fn default() -> Self {
        Self::NONE
    }
}

impl CastlingRights {
    /// Accepts "KQkq", "-", and Chess960/Shredder file letters, where files
    /// a-d stand for the queen-side rook and e-h for the king-side rook.
    pub fn parse(s: &str) -> Result<CastlingRights> {
        let mut castling = CastlingRights::NONE;
        for ch in s.chars() {
            match ch {
                '-' => break,
                'K' | 'E'..='H' => castling |= Self::WHITE_KING,
                'Q' | 'A'..='D' => castling |= Self::WHITE_QUEEN,
                'k' | 'e'..='h' => castling |= Self::BLACK_KING,
                'q' | 'a'..='d' => castling |= Self::BLACK_QUEEN,
                _ => bail!("invalid character '{}' in castling rights '{}'", ch, s),
            }
        }
        Ok(castling)
    }

    #[inline]
    pub fn king_side_right(c: Color) -> Self {
        c.chooser_wb(Self::WHITE_KING, Self::BLACK_KING)
    }

    #[inline]
    pub fn queen_side_right(c: Color) -> Self {
        c.chooser_wb(Self::WHITE_QUEEN, Self::BLACK_QUEEN)
    }

    #[inline]
    pub const fn or(self, other: Self) -> Self {
        Self::from_bits_truncate(self.bits() | other.bits())
    }

    /// rights lost when a piece moves from or to (capturing on) a square
    pub fn rights_lost(from: Square, to: Square) -> CastlingRights {
        const fn pop_castling_rights() -> [CastlingRights; 64] {
            let mut cr = [CastlingRights::NONE; 64];
            cr[Square::A1.index()] = CastlingRights::WHITE_QUEEN;
            cr[Square::A8.index()] = CastlingRights::BLACK_QUEEN;
            cr[Square::H1.index()] = CastlingRights::WHITE_KING;
            cr[Square::H8.index()] = CastlingRights::BLACK_KING;
            cr[Square::E1.index()] = CastlingRights::WHITE_KING.or(CastlingRights::WHITE_QUEEN);
            cr[Square::E8.index()] = CastlingRights::BLACK_KING.or(CastlingRights::BLACK_QUEEN);
            cr
        }

        const RIGHTS_LOST: [CastlingRights; 64] = pop_castling_rights();
        RIGHTS_LOST[from.index()].or(RIGHTS_LOST[to.index()])
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        if self.contains(Self::WHITE_KING) {
            write!(f, "K")?;
        }
        if self.contains(Self::WHITE_QUEEN) {
            write!(f, "Q")?;
        }
        if self.contains(Self::BLACK_KING) {
            write!(f, "k")?;
        }
        if self.contains(Self::BLACK_QUEEN) {
            write!(f, "q")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!(CastlingRights::parse("KQkq").unwrap(), CastlingRights::ALL);
        assert_eq!(CastlingRights::parse("-").unwrap(), CastlingRights::NONE);
        assert_eq!(CastlingRights::parse("Kq").unwrap().to_string(), "Kq");
        assert_eq!(CastlingRights::ALL.to_string(), "KQkq");
        assert_eq!(CastlingRights::NONE.to_string(), "-");
        assert!(CastlingRights::parse("KXkq").is_err());
        // shredder-style file letters
        assert_eq!(CastlingRights::parse("HAha").unwrap(), CastlingRights::ALL);
    }

    #[test]
    fn test_rights_lost() {
        assert_eq!(
            CastlingRights::rights_lost(Square::E1, Square::E2),
            CastlingRights::WHITE_KING | CastlingRights::WHITE_QUEEN
        );
        assert_eq!(
            CastlingRights::rights_lost(Square::A1, Square::A8),
            CastlingRights::WHITE_QUEEN | CastlingRights::BLACK_QUEEN
        );
        assert_eq!(CastlingRights::rights_lost(Square::B2, Square::B3), CastlingRights::NONE);
    }
}
