use anyhow::{anyhow, bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::board::board::Board;
use crate::mv::{CastlingSide, Move};
use crate::piece::Piece;

// regex from https://stackoverflow.com/questions/40007937/regex-help-for-chess-moves-san
// adjusted to allow a leading P, "-" separators and lowercase promotions
static REGEX_SAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)             # x flag to allow whitespace and comments
        ^
        ([PNBRQK])?         # piece - grp(1)
        ([a-h])?            # src square file grp(2)
        ([1-8])?            # src square rank grp(3)
        (\-|x)?             # move or capture grp(4)
        ([a-h][1-8])?       # dest square grp(5)
        (=[NBRQ]|=[nbrq])?  # promo grp(6)
        (\+|\#)?            # check or checkmate grp(7)
        \z
        |                   # OR
        ^O-O(-O)?(\+|\#)?\z # castling king or queen side
        "#,
    )
    .unwrap()
});

impl Board {
    /// Parse a move in SAN (or coordinate) form against this board by
    /// searching the legal moves for the unique fit. Null moves are the
    /// caller's concern.
    pub fn parse_san_move(&self, s: &str) -> Result<Move> {
        let orig = s;
        // PGN uses O; FIDE uses the digit zero
        let mut s = orig.replace('0', "O");
        // strip annotations that can ride on the move text
        while s.ends_with('!') || s.ends_with('?') {
            s.pop();
        }
        s = s.replace(' ', "");

        let caps = REGEX_SAN
            .captures(&s)
            .ok_or_else(|| anyhow!("unable to parse '{}' as an algebraic move", orig))?;

        let mut piece = caps.get(1).map_or("", |m| m.as_str());
        let mut src_file = caps.get(2).map_or("", |m| m.as_str());
        let mut src_rank = caps.get(3).map_or("", |m| m.as_str());
        let mut dst_square = caps.get(5).map_or("", |m| m.as_str()).to_string();
        let promo = caps.get(6).map_or("", |m| m.as_str());
        let is_capture_text = caps.get(4).map_or("", |m| m.as_str()) == "x";
        let castling = s.starts_with("O-O");

        // if only one square is given, it is the destination not the source
        if dst_square.is_empty() && !src_file.is_empty() && !src_rank.is_empty() {
            dst_square = src_file.to_owned() + src_rank;
            src_file = "";
            src_rank = "";
        }

        // pawn prefixes are omitted
        if piece.is_empty() && !dst_square.is_empty() {
            piece = "P";
        }

        let wanted_promo = match promo {
            "" => None,
            p => Some(Piece::from_char(p.chars().nth(1).unwrap())?),
        };

        let kingside = castling && !s.starts_with("O-O-O");

        let mut matching = vec![];
        for lm in self.legal_moves() {
            if castling {
                match lm.castle {
                    Some(CastlingSide::KingSide) if kingside => {}
                    Some(CastlingSide::QueenSide) if !kingside => {}
                    _ => continue,
                }
                matching.push(lm);
                continue;
            }
            if lm.is_castle() {
                continue;
            }
            if !dst_square.is_empty() && lm.to.uci() != dst_square {
                continue;
            }
            if !src_file.is_empty() && lm.from.file_char().to_string() != src_file {
                continue;
            }
            if !src_rank.is_empty() && lm.from.rank_char().to_string() != src_rank {
                continue;
            }
            if !piece.is_empty() && lm.mover.to_upper_char().to_string() != piece {
                continue;
            }
            if lm.promo != wanted_promo && (wanted_promo.is_some() || lm.is_promo()) {
                continue;
            }
            matching.push(lm);
        }

        // "exd" style captures leave the capture flag as the only hint
        if matching.len() > 1 && is_capture_text {
            matching.retain(|m| m.is_capture());
        }

        match matching.len() {
            0 => bail!("move {} is not legal for board {}", orig, self.to_fen()),
            1 => Ok(matching[0]),
            _ => bail!(
                "move {} is ambiguous ({} candidates) for board {}",
                orig,
                matching.len(),
                self.to_fen()
            ),
        }
    }

    pub fn parse_uci_move(&self, s: &str) -> Result<Move> {
        if s == "0000" {
            return Ok(Move::new_null());
        }
        self.legal_moves()
            .into_iter()
            .find(|m| m.to_uci() == s)
            .ok_or_else(|| anyhow!("uci move {} is not legal for board {}", s, self.to_fen()))
    }

    /// Render a legal move in SAN, with minimal disambiguation and without
    /// any check suffix (the caller knows the check status).
    pub fn to_san(&self, mv: Move) -> String {
        if mv.is_null {
            return "--".to_string();
        }
        if let Some(side) = mv.castle {
            return side.san().to_string();
        }
        let mut s = String::new();
        if mv.mover == Piece::Pawn {
            if mv.is_capture() {
                s.push(mv.from.file_char());
            }
        } else {
            s.push(mv.mover.to_upper_char());
            // pieces of the same kind able to reach the same square need
            // a file, rank or full square qualifier
            let rivals: Vec<Move> = self
                .legal_moves()
                .into_iter()
                .filter(|m| m.mover == mv.mover && m.to == mv.to && m.from != mv.from)
                .collect();
            if !rivals.is_empty() {
                let file_unique = rivals.iter().all(|m| m.from.file_index() != mv.from.file_index());
                let rank_unique = rivals.iter().all(|m| m.from.rank_index() != mv.from.rank_index());
                if file_unique {
                    s.push(mv.from.file_char());
                } else if rank_unique {
                    s.push(mv.from.rank_char());
                } else {
                    s.push(mv.from.file_char());
                    s.push(mv.from.rank_char());
                }
            }
        }
        if mv.is_capture() {
            s.push('x');
        }
        s += mv.to.uci();
        if let Some(promo) = mv.promo {
            s.push('=');
            s.push(promo.to_upper_char());
        }
        s
    }
}
