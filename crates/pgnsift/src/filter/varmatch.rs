use pgnsift_base::prelude::*;
use tracing::warn;

use crate::game::Game;

/// One per-ply token of a stored textual variation: pipe-separated
/// alternatives, `*` wildcard, `!move` negation.
#[derive(Clone, Debug, PartialEq)]
pub struct PlyToken {
    pub alternatives: Vec<String>,
    pub negated:      bool,
    pub wildcard:     bool,
}

impl PlyToken {
    fn parse(token: &str) -> PlyToken {
        if token == "*" {
            return PlyToken {
                alternatives: vec![],
                negated: false,
                wildcard: true,
            };
        }
        let (negated, token) = match token.strip_prefix('!') {
            Some(t) => (true, t),
            None => (false, token),
        };
        PlyToken {
            alternatives: token.split('|').map(str::to_string).collect(),
            negated,
            wildcard: false,
        }
    }

    fn hits(&self, played: &str) -> bool {
        self.alternatives.iter().any(|alt| alt == played)
    }
}

/// Textual variations from a -v file: each line is one variation, each
/// whitespace-separated token constrains one ply.
#[derive(Clone, Debug, Default)]
pub struct VariationMatcher {
    variations: Vec<Vec<PlyToken>>,
    /// permutation mode lets same-colour moves satisfy tokens in any order
    pub permutations: bool,
}

impl VariationMatcher {
    pub fn new(permutations: bool) -> VariationMatcher {
        VariationMatcher {
            variations: vec![],
            permutations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.variations.is_empty()
    }

    pub fn add_line(&mut self, line: &str) {
        let tokens: Vec<PlyToken> = line
            .split_whitespace()
            .filter(|tok| !is_move_number(tok))
            .map(PlyToken::parse)
            .collect();
        if tokens.is_empty() {
            return;
        }
        if tokens.iter().all(|t| t.wildcard || t.negated) {
            warn!("variation '{line}' has no positive move, ignored");
            return;
        }
        self.variations.push(tokens);
    }

    pub fn add_lines(&mut self, lines: &[String]) {
        for line in lines {
            self.add_lines_one(line);
        }
    }

    fn add_lines_one(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
            return;
        }
        self.add_line(line);
    }

    pub fn matches(&self, game: &Game) -> bool {
        let played = played_moves(game);
        self.variations.iter().any(|var| {
            if self.permutations {
                permutation_match(var, &played)
            } else {
                strict_match(var, &played)
            }
        })
    }
}

fn is_move_number(tok: &str) -> bool {
    let tok = tok.trim_end_matches('.');
    !tok.is_empty() && tok.chars().all(|ch| ch.is_ascii_digit()) && tok != "*"
}

/// both spellings of each played move, input text and normalised SAN
fn played_moves(game: &Game) -> Vec<Vec<String>> {
    game.moves
        .iter()
        .map(|m| {
            let mut names = vec![m.san.clone()];
            if let Some(norm) = &m.san_norm {
                if norm != &m.san {
                    names.push(norm.clone());
                }
            }
            names
        })
        .collect()
}

fn token_matches_ply(token: &PlyToken, ply: &[String]) -> bool {
    if token.wildcard {
        return true;
    }
    let hit = ply.iter().any(|name| token.hits(name));
    hit != token.negated
}

/// token i against ply i
fn strict_match(tokens: &[PlyToken], played: &[Vec<String>]) -> bool {
    if played.len() < tokens.len() {
        return false;
    }
    tokens.iter().zip(played).all(|(t, p)| token_matches_ply(t, p))
}

/// Any ply of the right colour may satisfy any token of that colour
/// within the window; wildcards are slack; a negated token invalidates
/// the match if its move occurs anywhere in the window.
fn permutation_match(tokens: &[PlyToken], played: &[Vec<String>]) -> bool {
    let window = tokens.len();
    if played.len() < window {
        return false;
    }
    for colour in 0..2 {
        let colour_tokens: Vec<&PlyToken> = tokens.iter().skip(colour).step_by(2).collect();
        let colour_plies: Vec<&Vec<String>> = played[..window].iter().skip(colour).step_by(2).collect();

        // negations veto across the whole window
        for t in colour_tokens.iter().filter(|t| t.negated) {
            if colour_plies.iter().any(|p| p.iter().any(|name| t.hits(name))) {
                return false;
            }
        }
        let required: Vec<&PlyToken> = colour_tokens
            .iter()
            .filter(|t| !t.negated && !t.wildcard)
            .copied()
            .collect();
        if !assign(&required, &colour_plies, &mut vec![false; colour_plies.len()]) {
            return false;
        }
    }
    true
}

/// backtracking assignment of tokens to distinct plies
fn assign(tokens: &[&PlyToken], plies: &[&Vec<String>], used: &mut Vec<bool>) -> bool {
    let Some((first, rest)) = tokens.split_first() else {
        return true;
    };
    for (i, ply) in plies.iter().enumerate() {
        if used[i] || !ply.iter().any(|name| first.hits(name)) {
            continue;
        }
        used[i] = true;
        if assign(rest, plies, used) {
            return true;
        }
        used[i] = false;
    }
    false
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::game::{Game, MoveNode};

    fn game_of(moves: &[&str]) -> Game {
        let mut g = Game::new();
        for san in moves {
            g.moves.push(MoveNode::from_san(san));
        }
        g
    }

    #[test]
    fn test_strict_match() {
        let mut m = VariationMatcher::new(false);
        m.add_line("1. e4 c5 2. Nf3");
        assert!(m.matches(&game_of(&["e4", "c5", "Nf3", "d6"])));
        assert!(!m.matches(&game_of(&["e4", "c5", "Nc3", "d6"])));
        assert!(!m.matches(&game_of(&["e4", "c5"])), "shorter than the variation");
    }

    #[test]
    fn test_alternatives() {
        let mut m = VariationMatcher::new(false);
        m.add_line("e4 c5 Nc3|Nf3");
        assert!(m.matches(&game_of(&["e4", "c5", "Nf3", "d6"])));
        assert!(m.matches(&game_of(&["e4", "c5", "Nc3", "d6"])));
        assert!(!m.matches(&game_of(&["e4", "c5", "d4", "d6"])));
    }

    #[test]
    fn test_wildcard() {
        let mut m = VariationMatcher::new(false);
        m.add_line("e4 * Nf3");
        assert!(m.matches(&game_of(&["e4", "a6", "Nf3"])));
        assert!(m.matches(&game_of(&["e4", "c5", "Nf3"])));
        assert!(!m.matches(&game_of(&["d4", "c5", "Nf3"])));
    }

    #[test]
    fn test_negation_strict() {
        let mut m = VariationMatcher::new(false);
        m.add_line("e4 !c5 Nf3");
        assert!(m.matches(&game_of(&["e4", "e5", "Nf3"])));
        assert!(!m.matches(&game_of(&["e4", "c5", "Nf3"])));
    }

    #[test]
    fn test_permutation_mode() {
        let mut m = VariationMatcher::new(true);
        m.add_line("d4 d5 c4 e6");
        // queen's gambit reached via an english move order
        assert!(m.matches(&game_of(&["c4", "e6", "d4", "d5", "Nc3"])));
        assert!(!m.matches(&game_of(&["c4", "e5", "d4", "d5"])));
        // colours are not interchangeable
        assert!(!m.matches(&game_of(&["d5", "d4", "e6", "c4"])));
    }

    #[test]
    fn test_permutation_negation_vetoes_window() {
        let mut m = VariationMatcher::new(true);
        m.add_line("d4 !c5 c4 *");
        assert!(m.matches(&game_of(&["d4", "e6", "c4", "d5"])));
        // c5 appears anywhere in the black window: veto
        assert!(!m.matches(&game_of(&["c4", "c5", "d4", "e6"])));
    }

    #[test]
    fn test_multiple_variations_are_alternatives() {
        let mut m = VariationMatcher::new(false);
        m.add_line("e4 e5");
        m.add_line("d4 d5");
        assert!(m.matches(&game_of(&["e4", "e5", "Nf3"])));
        assert!(m.matches(&game_of(&["d4", "d5", "c4"])));
        assert!(!m.matches(&game_of(&["c4", "e5"])));
    }

    #[test]
    fn test_normalised_san_also_matches() {
        let mut g = game_of(&["Ngf3"]);
        g.moves[0].san_norm = Some("Nf3".to_string());
        let mut m = VariationMatcher::new(false);
        m.add_line("Nf3");
        assert!(m.matches(&g));
    }

    #[test]
    fn test_all_negative_line_ignored() {
        let mut m = VariationMatcher::new(false);
        m.add_line("!e4 *");
        assert!(m.is_empty());
    }
}
