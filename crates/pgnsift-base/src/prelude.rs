pub use anyhow::{Context as _, Result};
pub use itertools::Itertools;

pub use crate::bits::{Bitboard, CastlingRights, Square};
pub use crate::board::{Board, C960Files, Hasher};
pub use crate::infra::utils::{file_create, file_open, ToStringOr};
pub use crate::mv::{CastlingSide, Move};
pub use crate::outcome::Outcome;
pub use crate::piece::{Color, FlipSide, Hash, Piece, Ply};
