pub mod board;
pub mod hasher;
pub mod makemove;
pub mod movegen;

pub use crate::board::board::{Board, C960Files, STARTING_POSITION_FEN};
pub use crate::board::hasher::Hasher;
