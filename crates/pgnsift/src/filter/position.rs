use std::collections::HashMap;

use pgnsift_base::prelude::*;
use tracing::warn;

use crate::config::WhoseMove;
use crate::interp::Replay;

/// Positions to look for, keyed by board hash. Entries come from
/// positional variations (replayed from the standard start), from FEN
/// lines and from raw hex hash values.
#[derive(Clone, Debug, Default)]
pub struct PositionMatcher {
    /// hash → ply count of the shortest line that reached it
    hashes: HashMap<Hash, u32>,
    /// plies to search into each game, 0 for unlimited
    pub depth: usize,
}

impl PositionMatcher {
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn add_hash(&mut self, hash: Hash, plycount: u32) {
        let entry = self.hashes.entry(hash).or_insert(plycount);
        *entry = (*entry).min(plycount);
    }

    /// a line of moves from the starting position; its final position is
    /// what must be reached
    pub fn add_variation_line(&mut self, line: &str) -> Result<()> {
        let mut board = Board::starting_pos();
        let mut plies = 0;
        for token in line.split_whitespace() {
            let tok = token.trim_end_matches('.');
            if !tok.is_empty() && tok.chars().all(|ch| ch.is_ascii_digit()) {
                continue;
            }
            let mv = board
                .parse_san_move(token)
                .with_context(|| format!("positional variation '{line}'"))?;
            board = board.make_move(mv);
            plies += 1;
        }
        anyhow::ensure!(plies > 0, "positional variation '{line}' has no moves");
        self.add_hash(board.hash(), plies);
        Ok(())
    }

    pub fn add_fen(&mut self, fen: &str) -> Result<()> {
        let board = Board::parse_fen(fen)?;
        self.add_hash(board.hash(), 0);
        Ok(())
    }

    /// a -x file line is a variation unless it parses as a FEN
    pub fn add_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
            return Ok(());
        }
        if line.contains('/') {
            self.add_fen(line)
        } else {
            self.add_variation_line(line)
        }
    }

    pub fn add_hex_hash(&mut self, hex: &str) -> Result<()> {
        let hash = Hash::from_str_radix(hex.trim_start_matches("0x"), 16)
            .with_context(|| format!("hash value '{hex}'"))?;
        self.add_hash(hash, 0);
        Ok(())
    }

    /// the first ply (1-based) whose position is in the table, within the
    /// search depth; ply 0 is the starting position itself
    pub fn match_ply(&self, replay: &Replay, whose_move: WhoseMove) -> Option<usize> {
        let limit = if self.depth == 0 { usize::MAX } else { self.depth };
        for ply in 0..=replay.boards.len().min(limit) {
            let board = replay.board_after(ply);
            let side_ok = match whose_move {
                WhoseMove::Either => true,
                WhoseMove::WhiteToMove => board.turn() == Color::White,
                WhoseMove::BlackToMove => board.turn() == Color::Black,
            };
            if side_ok && self.hashes.contains_key(&board.hash()) {
                return Some(ply);
            }
        }
        None
    }

    pub fn matches(&self, replay: &Replay, whose_move: WhoseMove) -> bool {
        self.match_ply(replay, whose_move).is_some()
    }
}

/// build from the lines of a -x file, skipping bad lines with a warning
pub fn build_position_matcher(lines: &[String], depth: usize) -> PositionMatcher {
    let mut m = PositionMatcher {
        depth,
        ..PositionMatcher::default()
    };
    for line in lines {
        if let Err(e) = m.add_line(line) {
            warn!("{e:#}");
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::config::Config;
    use crate::interp::interpret;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn replay_of(src: &str) -> Replay {
        let mut game = Parser::new(tokenize(src, false)).next_game().unwrap();
        interpret(&mut game, &Config::default(), None).unwrap()
    }

    #[test]
    fn test_variation_line_match() {
        let mut m = PositionMatcher::default();
        m.add_variation_line("1. e4 c5 2. Nf3").unwrap();
        assert_eq!(m.len(), 1);

        let replay = replay_of("[Event \"?\"]\n\n1. e4 c5 2. Nf3 d6 *\n");
        assert_eq!(m.match_ply(&replay, WhoseMove::Either), Some(3));

        let replay = replay_of("[Event \"?\"]\n\n1. e4 c5 2. Nc3 d6 *\n");
        assert!(!m.matches(&replay, WhoseMove::Either));
    }

    #[test]
    fn test_depth_limit() {
        let mut m = PositionMatcher::default();
        m.add_variation_line("1. e4 c5 2. Nf3").unwrap();
        m.depth = 2;
        let replay = replay_of("[Event \"?\"]\n\n1. e4 c5 2. Nf3 d6 *\n");
        assert!(!m.matches(&replay, WhoseMove::Either), "match lies beyond the depth");
        m.depth = 3;
        assert!(m.matches(&replay, WhoseMove::Either));
    }

    #[test]
    fn test_whose_move() {
        let mut m = PositionMatcher::default();
        m.add_variation_line("1. e4 c5 2. Nf3").unwrap();
        let replay = replay_of("[Event \"?\"]\n\n1. e4 c5 2. Nf3 d6 *\n");
        // after 2. Nf3 it is black to move
        assert!(m.matches(&replay, WhoseMove::BlackToMove));
        assert!(!m.matches(&replay, WhoseMove::WhiteToMove));
    }

    #[test]
    fn test_fen_line() {
        let mut m = PositionMatcher::default();
        m.add_line("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1").unwrap();
        let replay = replay_of("[Event \"?\"]\n\n1. e4 e5 *\n");
        assert_eq!(m.match_ply(&replay, WhoseMove::Either), Some(1));
    }

    #[test]
    fn test_hex_hash() {
        let replay = replay_of("[Event \"?\"]\n\n1. e4 e5 *\n");
        let target = replay.boards[1].hash();
        let mut m = PositionMatcher::default();
        m.add_hex_hash(&format!("{target:x}")).unwrap();
        assert_eq!(m.match_ply(&replay, WhoseMove::Either), Some(2));
        assert!(m.add_hex_hash("zzz").is_err());
    }

    #[test]
    fn test_bad_variation_line() {
        let mut m = PositionMatcher::default();
        assert!(m.add_variation_line("1. e4 e5 2. Ke2zz").is_err());
        assert!(m.add_variation_line("").is_err());
    }
}
