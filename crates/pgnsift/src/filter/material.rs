use pgnsift_base::prelude::*;
use tracing::warn;

use crate::interp::Replay;

/// How a piece count must relate to the wanted number or the opponent's
/// holding of the same piece.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Occurs {
    #[default]
    Exactly,
    NumOrMore,
    NumOrLess,
    SameAsOpponent,
    NotSameAsOpponent,
    LessThanOpponent,
    MoreThanOpponent,
    LessEqOpponent,
    MoreEqOpponent,
}

/// A material balance to look for. Criteria chain as alternatives; a
/// criterion fires once it has held for `move_depth` consecutive plies
/// for one colour assignment.
#[derive(Clone, Debug)]
pub struct MaterialCriteria {
    pub both_colours:     bool,
    pub num_pieces:       [[i32; 6]; 2],
    pub occurs:           [[Occurs; 6]; 2],
    pub num_minor_pieces: [i32; 2],
    pub minor_occurs:     [Occurs; 2],
    pub move_depth:       u32,
    depth_explicit:       bool,
    match_depth:          [u32; 2],
}

impl Default for MaterialCriteria {
    fn default() -> Self {
        let mut num_pieces = [[0; 6]; 2];
        num_pieces[0][Piece::King.index()] = 1;
        num_pieces[1][Piece::King.index()] = 1;
        MaterialCriteria {
            both_colours: false,
            num_pieces,
            occurs: [[Occurs::Exactly; 6]; 2],
            num_minor_pieces: [0; 2],
            minor_occurs: [Occurs::Exactly; 2],
            // two half-move stability by default
            move_depth: 2,
            depth_explicit: false,
            match_depth: [0; 2],
        }
    }
}

const MINOR_PIECE: char = 'L';

impl MaterialCriteria {
    /// Parse a description like `"KRP* kr*"` or `"6 KQ* kq*"`: an
    /// optional leading move depth, then one piece set per colour.
    /// Piece letters take a count and an optional relation: `2` exact,
    /// `*` zero or more, `+` or-more, `-` or-less, `?` at most one,
    /// `=` same as opponent, `#` differs from opponent, `<`/`>` fewer or
    /// more than opponent, `<=`/`>=` exactly that many fewer or more.
    /// `L` stands for either minor piece. A lone-king second set may be
    /// omitted.
    pub fn parse(line: &str, both_colours: bool) -> Result<MaterialCriteria> {
        let mut details = MaterialCriteria {
            both_colours,
            ..MaterialCriteria::default()
        };
        let mut rest = line.trim();

        let depth_len = rest.chars().take_while(|ch| ch.is_ascii_digit()).count();
        if depth_len > 0 && rest[depth_len..].starts_with(char::is_whitespace) {
            details.move_depth = rest[..depth_len].parse()?;
            details.depth_explicit = true;
            rest = rest[depth_len..].trim_start();
        }

        let mut sets = rest.split_whitespace();
        let white = sets.next().ok_or_else(|| anyhow::anyhow!("no pieces in '{line}'"))?;
        details.parse_piece_set(white, 0)?;
        if let Some(black) = sets.next() {
            details.parse_piece_set(black, 1)?;
        }
        // trailing text is a comment
        Ok(details)
    }

    fn parse_piece_set(&mut self, set: &str, colour: usize) -> Result<()> {
        let mut chars = set.chars().peekable();
        while let Some(ch) = chars.next() {
            let minor = ch.to_ascii_uppercase() == MINOR_PIECE;
            let piece = if minor { None } else { Some(Piece::from_char(ch)?) };
            let (mut number, occurs) = Self::extract_combination(&mut chars)?;
            match piece {
                Some(Piece::King) if number != 1 => {
                    warn!("a king must occur exactly once in '{set}'");
                    number = 1;
                }
                Some(Piece::Pawn) if number > 8 => {
                    warn!("no more than 8 pawns are allowed in '{set}'");
                    number = 8;
                }
                _ => {}
            }
            match piece {
                Some(p) => {
                    self.num_pieces[colour][p.index()] = number;
                    self.occurs[colour][p.index()] = occurs;
                }
                None => {
                    self.num_minor_pieces[colour] = number;
                    self.minor_occurs[colour] = occurs;
                }
            }
        }
        Ok(())
    }

    fn extract_combination(chars: &mut std::iter::Peekable<std::str::Chars>) -> Result<(i32, Occurs)> {
        let mut number = 1;
        if let Some(d) = chars.peek().and_then(|ch| ch.to_digit(10)) {
            chars.next();
            if chars.peek().map(|ch| ch.is_ascii_digit()).unwrap_or(false) {
                anyhow::bail!("piece counts above 9 are not supported");
            }
            number = d as i32;
        }
        let occurs = match chars.peek() {
            Some('*') => {
                chars.next();
                number = 0;
                Occurs::NumOrMore
            }
            Some('+') => {
                chars.next();
                Occurs::NumOrMore
            }
            Some('-') => {
                chars.next();
                Occurs::NumOrLess
            }
            Some('?') => {
                chars.next();
                number = 1;
                Occurs::NumOrLess
            }
            Some('=') => {
                chars.next();
                Occurs::SameAsOpponent
            }
            Some('#') => {
                chars.next();
                Occurs::NotSameAsOpponent
            }
            Some('<') => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    Occurs::LessEqOpponent
                } else {
                    Occurs::LessThanOpponent
                }
            }
            Some('>') => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    Occurs::MoreEqOpponent
                } else {
                    Occurs::MoreThanOpponent
                }
            }
            _ => Occurs::Exactly,
        };
        Ok((number, occurs))
    }
}

fn piece_match(num_available: i32, num_to_find: i32, num_opponents: i32, occurs: Occurs) -> bool {
    match occurs {
        Occurs::Exactly => num_available == num_to_find,
        Occurs::NumOrMore => num_available >= num_to_find,
        Occurs::NumOrLess => num_available <= num_to_find,
        Occurs::SameAsOpponent => num_available == num_opponents,
        Occurs::NotSameAsOpponent => num_available != num_opponents,
        Occurs::LessThanOpponent => num_available + num_to_find <= num_opponents,
        Occurs::MoreThanOpponent => num_available - num_to_find >= num_opponents,
        Occurs::LessEqOpponent => num_available + num_to_find == num_opponents,
        Occurs::MoreEqOpponent => num_available - num_to_find == num_opponents,
    }
}

pub(crate) fn counts_of(board: &Board) -> [[i32; 6]; 2] {
    let mut counts = [[0; 6]; 2];
    for c in Color::ALL {
        for p in Piece::ALL {
            counts[c.index()][p.index()] = board.count_of(c, p);
        }
    }
    counts
}

impl MaterialCriteria {
    /// a one-shot balance check, for FEN-pattern material constraints
    pub fn matches_board(&self, board: &Board) -> bool {
        let counts = counts_of(board);
        if self.piece_set_match(&counts, 0, 0) && self.piece_set_match(&counts, 1, 1) {
            return true;
        }
        self.both_colours && self.piece_set_match(&counts, 1, 0) && self.piece_set_match(&counts, 0, 1)
    }

    fn piece_set_match(&self, counts: &[[i32; 6]; 2], game_colour: usize, set_colour: usize) -> bool {
        let opp = 1 - game_colour;
        let mut minor_failure = false;
        for p in Piece::ALL_BAR_KING {
            let ok = piece_match(
                counts[game_colour][p.index()],
                self.num_pieces[set_colour][p.index()],
                counts[opp][p.index()],
                self.occurs[set_colour][p.index()],
            );
            if !ok {
                if p.is_minor() {
                    // an L requirement may still rescue the match
                    minor_failure = true;
                } else {
                    return false;
                }
            }
        }
        let num_to_find = self.num_minor_pieces[set_colour];
        let occurs = self.minor_occurs[set_colour];
        if num_to_find > 0 || occurs != Occurs::Exactly {
            let avail = counts[game_colour][Piece::Knight.index()] + counts[game_colour][Piece::Bishop.index()];
            let opps = counts[opp][Piece::Knight.index()] + counts[opp][Piece::Bishop.index()];
            piece_match(avail, num_to_find, opps, occurs)
        } else {
            !minor_failure
        }
    }

    /// check one ply; fires when the balance has held for `move_depth`
    /// consecutive plies under the given colour assignment
    fn step(&mut self, counts: &[[i32; 6]; 2], game_colour: usize) -> bool {
        let matched = self.piece_set_match(counts, game_colour, 0) && self.piece_set_match(counts, 1 - game_colour, 1);
        if matched {
            self.match_depth[game_colour] += 1;
            self.match_depth[game_colour] >= self.move_depth
        } else {
            self.match_depth[game_colour] = 0;
            false
        }
    }

    fn reset(&mut self) {
        self.match_depth = [0; 2];
    }
}

/// The chained alternatives of -z/-y files. A game matches when any
/// criterion fires at any ply of the replay.
#[derive(Clone, Debug, Default)]
pub struct MaterialMatcher {
    criteria: Vec<MaterialCriteria>,
}

impl MaterialMatcher {
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn add_line(&mut self, line: &str, both_colours: bool) -> Result<()> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
            return Ok(());
        }
        self.criteria.push(MaterialCriteria::parse(line, both_colours)?);
        Ok(())
    }

    /// the --stable threshold for criteria that named no depth of their own
    pub fn set_default_move_depth(&mut self, depth: u32) {
        for c in &mut self.criteria {
            if !c.depth_explicit {
                c.move_depth = depth;
            }
        }
    }

    pub fn matches(&self, replay: &Replay) -> bool {
        let mut criteria = self.criteria.clone();
        for c in &mut criteria {
            c.reset();
        }
        let mut boards: Vec<&Board> = vec![&replay.start];
        boards.extend(replay.boards.iter());
        for board in boards {
            let counts = counts_of(board);
            for c in &mut criteria {
                if c.step(&counts, 0) {
                    return true;
                }
                if c.both_colours && c.step(&counts, 1) {
                    return true;
                }
            }
        }
        false
    }
}
