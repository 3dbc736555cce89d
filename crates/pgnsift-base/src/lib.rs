pub mod bits;
pub mod board;
pub mod infra;
pub mod mv;
pub mod outcome;
pub mod piece;
pub mod prelude;
pub mod san;
pub mod trace;

pub use crate::bits::bitboard::Bitboard;
pub use crate::board::board::Board;
pub use crate::mv::Move;
pub use crate::outcome::Outcome;
pub use crate::piece::{Color, Piece};

use std::fmt;

pub struct Displayable<F>(pub F)
where
    F: Fn(&mut fmt::Formatter) -> fmt::Result;

impl<F> fmt::Display for Displayable<F>
where
    F: Fn(&mut fmt::Formatter) -> fmt::Result,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0(f)
    }
}
