use std::fmt;
use std::ops::{Index, IndexMut};

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use strum_macros::EnumString;

pub type Ply = i32;
pub type Hash = u64;

pub trait FlipSide {
    fn flip_side(self) -> Self;
}

#[derive(Copy, Clone, Default, Serialize, Deserialize, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Color {
    #[default]
    #[serde(rename = "w")]
    White = 0,

    #[serde(rename = "b")]
    Black = 1,
}

impl<T> Index<Color> for [T; 2] {
    type Output = T;
    #[inline]
    fn index(&self, c: Color) -> &Self::Output {
        &self[c.index()]
    }
}

impl<T> IndexMut<Color> for [T; 2] {
    #[inline]
    fn index_mut(&mut self, c: Color) -> &mut Self::Output {
        &mut self[c.index()]
    }
}

impl Color {
    pub const ALL: [Color; 2] = [Color::White, Color::Black];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn is_white(self) -> bool {
        matches!(self, Color::White)
    }

    #[inline]
    pub const fn chooser_wb<T: Copy>(self, white_thing: T, black_thing: T) -> T {
        match self {
            Color::White => white_thing,
            Color::Black => black_thing,
        }
    }

    /// rank index (0-7) of this side's back rank
    #[inline]
    pub const fn back_rank_index(self) -> usize {
        self.chooser_wb(0, 7)
    }

    #[inline]
    pub const fn promo_rank_index(self) -> usize {
        self.chooser_wb(7, 0)
    }

    /// rank index pawns start on
    #[inline]
    pub const fn pawn_rank_index(self) -> usize {
        self.chooser_wb(1, 6)
    }

    pub fn parse(s: &str) -> Result<Color> {
        match s {
            "w" => Ok(Color::White),
            "b" => Ok(Color::Black),
            _ => Err(anyhow!("invalid color: '{}'", s)),
        }
    }

    #[inline]
    pub fn from_piece_char(ch: char) -> Result<Color> {
        if ch.is_lowercase() {
            return Ok(Color::Black);
        } else if ch.is_uppercase() {
            return Ok(Color::White);
        }
        Err(anyhow!("cannot get color for char '{}'", ch))
    }
}

impl FlipSide for Color {
    #[inline]
    fn flip_side(self) -> Color {
        self.chooser_wb(Color::Black, Color::White)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.chooser_wb('w', 'b'))
    }
}

#[derive(Copy, Default, Hash, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, EnumString)]
pub enum Piece {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    #[default]
    King,
}

impl<T> Index<Piece> for [T; 6] {
    type Output = T;
    #[inline]
    fn index(&self, p: Piece) -> &Self::Output {
        &self[p.index()]
    }
}

impl<T> IndexMut<Piece> for [T; 6] {
    #[inline]
    fn index_mut(&mut self, p: Piece) -> &mut Self::Output {
        &mut self[p.index()]
    }
}

/// as lower case
impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_lower_char())
    }
}

impl Piece {
    pub const ALL: [Piece; 6] = [
        Piece::Pawn,
        Piece::Knight,
        Piece::Bishop,
        Piece::Rook,
        Piece::Queen,
        Piece::King,
    ];

    pub const ALL_BAR_KING: [Piece; 5] = [Piece::Pawn, Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen];

    #[inline]
    pub const fn index(&self) -> usize {
        *self as usize
    }

    #[inline]
    pub const fn from_index(i: usize) -> Piece {
        Self::ALL[i]
    }

    #[inline]
    pub const fn len() -> usize {
        Self::ALL.len()
    }

    #[inline]
    pub const fn is_minor(&self) -> bool {
        matches!(self, Piece::Knight | Piece::Bishop)
    }

    #[inline]
    pub const fn is_line_piece(&self) -> bool {
        matches!(self, Piece::Bishop | Piece::Rook | Piece::Queen)
    }

    #[inline]
    pub const fn to_upper_char(&self) -> char {
        match self {
            Piece::Pawn => 'P',
            Piece::Knight => 'N',
            Piece::Bishop => 'B',
            Piece::Rook => 'R',
            Piece::Queen => 'Q',
            Piece::King => 'K',
        }
    }

    #[inline]
    pub const fn to_lower_char(&self) -> char {
        self.to_upper_char().to_ascii_lowercase()
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        ["pawn", "knight", "bishop", "rook", "queen", "king"][self.index()]
    }

    #[inline]
    pub fn from_char(ch: char) -> Result<Piece> {
        Ok(match ch.to_ascii_uppercase() {
            'P' => Piece::Pawn,
            'N' => Piece::Knight,
            'B' => Piece::Bishop,
            'R' => Piece::Rook,
            'Q' => Piece::Queen,
            'K' => Piece::King,
            _ => bail!("Unknown piece '{}'", ch),
        })
    }

    #[inline]
    pub const fn to_char(&self, c: Color) -> char {
        match c {
            Color::White => self.to_upper_char(),
            Color::Black => self.to_upper_char().to_ascii_lowercase(),
        }
    }

    pub fn parse(s: &str) -> Result<Piece> {
        if s.len() == 1 {
            Piece::from_char(s.chars().next().unwrap())
        } else {
            bail!("Unknown piece '{s}'");
        }
    }
}
