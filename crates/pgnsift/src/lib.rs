//! A batch extractor for PGN chess game collections: parse every game,
//! replay it against the rules of chess, classify, deduplicate and
//! filter, then emit the survivors in a choice of notations.

pub mod argsfile;
pub mod config;
pub mod dedup;
pub mod driver;
pub mod eco;
pub mod filter;
pub mod game;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod writer;

pub use crate::config::{Config, Counts, OutputFormat};
pub use crate::driver::{run, Criteria};
pub use crate::game::Game;
