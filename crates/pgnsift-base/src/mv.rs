use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bits::square::Square;
use crate::piece::{Color, Piece};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastlingSide {
    KingSide,
    QueenSide,
}

impl CastlingSide {
    #[inline]
    pub fn king_destination(self, c: Color) -> Square {
        match (self, c) {
            (CastlingSide::KingSide, Color::White) => Square::G1,
            (CastlingSide::QueenSide, Color::White) => Square::C1,
            (CastlingSide::KingSide, Color::Black) => Square::G8,
            (CastlingSide::QueenSide, Color::Black) => Square::C8,
        }
    }

    #[inline]
    pub fn rook_from_to(self, c: Color) -> (Square, Square) {
        match (self, c) {
            (CastlingSide::KingSide, Color::White) => (Square::H1, Square::F1),
            (CastlingSide::QueenSide, Color::White) => (Square::A1, Square::D1),
            (CastlingSide::KingSide, Color::Black) => (Square::H8, Square::F8),
            (CastlingSide::QueenSide, Color::Black) => (Square::A8, Square::D8),
        }
    }

    pub fn san(self) -> &'static str {
        match self {
            CastlingSide::KingSide => "O-O",
            CastlingSide::QueenSide => "O-O-O",
        }
    }
}

/// A fully resolved board transition. Null moves carry no squares worth
/// reading; every other move records its geometry and side effects.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from:    Square,
    pub to:      Square,
    pub mover:   Piece,
    pub capture: Option<Piece>,
    pub promo:   Option<Piece>,
    pub castle:  Option<CastlingSide>,
    pub is_ep:   bool,
    pub is_null: bool,
}

impl Default for Move {
    fn default() -> Self {
        Move::new_null()
    }
}

impl Move {
    pub fn new_null() -> Move {
        Move {
            from:    Square::A1,
            to:      Square::A1,
            mover:   Piece::King,
            capture: None,
            promo:   None,
            castle:  None,
            is_ep:   false,
            is_null: true,
        }
    }

    #[inline]
    pub fn is_capture(&self) -> bool {
        self.capture.is_some()
    }

    #[inline]
    pub fn is_promo(&self) -> bool {
        self.promo.is_some()
    }

    #[inline]
    pub fn is_castle(&self) -> bool {
        self.castle.is_some()
    }

    /// square of the captured piece (differs from `to` for en passant)
    #[inline]
    pub fn capture_square(&self, us: Color) -> Square {
        if self.is_ep {
            // the captured pawn sits beside the destination
            Square::from_xy(
                self.to.file_index() as u32,
                us.chooser_wb(self.to.rank_index() as u32 - 1, self.to.rank_index() as u32 + 1),
            )
        } else {
            self.to
        }
    }

    #[inline]
    pub fn is_pawn_double_push(&self) -> bool {
        self.mover == Piece::Pawn
            && (self.to.rank_index() as i32 - self.from.rank_index() as i32).abs() == 2
    }

    /// the en-passant target square behind a double-pushed pawn
    #[inline]
    pub fn double_push_en_passant_square(&self) -> Square {
        Square::from_u8(((self.from.index() + self.to.index()) / 2) as u8)
    }

    pub fn to_uci(&self) -> String {
        if self.is_null {
            return "0000".to_string();
        }
        let mut s = format!("{}{}", self.from.uci(), self.to.uci());
        if let Some(promo) = self.promo {
            s.push(promo.to_lower_char());
        }
        s
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_uci())
    }
}
