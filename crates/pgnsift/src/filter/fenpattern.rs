use pgnsift_base::prelude::*;
use tracing::warn;

use crate::filter::material::MaterialCriteria;

// Pattern matching over per-rank board text, after Rob Pike's beautiful
// little matcher. Meta characters:
//   '_' empty square        '!' non-empty       '?' any state
//   '*' any run in a rank   'A'/'a' any white/black piece
//   'm' anything but a pawn, digits count empty squares,
//   '[...]' / '[^...]' character classes, piece letters as in FEN.
const EMPTY_SQUARE: u8 = b'_';
const NON_EMPTY_SQUARE: u8 = b'!';
const ANY_SQUARE_STATE: u8 = b'?';
const ZERO_OR_MORE: u8 = b'*';
const ANY_WHITE_PIECE: u8 = b'A';
const ANY_BLACK_PIECE: u8 = b'a';
const NOT_A_PAWN: u8 = b'm';
const CCL_START: u8 = b'[';
const CCL_END: u8 = b']';
const NCCL: u8 = b'^';

/// One rank of a pattern; ranks chain via `next_rank` and alternatives
/// sharing earlier ranks hang off `alternative_rank`. The final rank of
/// a chain carries the label and any material constraint.
#[derive(Debug, Default)]
struct PatternNode {
    rank:             String,
    next_rank:        Option<Box<PatternNode>>,
    alternative_rank: Option<Box<PatternNode>>,
    label:            Option<String>,
    constraint:       Option<MaterialCriteria>,
}

#[derive(Debug, Default)]
pub struct FenPatternMatcher {
    root: Option<Box<PatternNode>>,
}

impl FenPatternMatcher {
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Add a pattern `r8/r7/.../r1[:material]`. When `add_reverse` is
    /// set a colour-flipped twin is added too, its label suffixed "I".
    pub fn add_pattern(&mut self, pattern: &str, add_reverse: bool, label: Option<&str>) -> Result<()> {
        let (ranks_part, constraint_part) = match pattern.split_once(':') {
            Some((r, c)) => (r, Some(c)),
            None => (pattern, None),
        };
        let ranks = Self::split_ranks(ranks_part)
            .with_context(|| format!("FEN pattern '{pattern}' badly formed"))?;
        let constraint = match constraint_part {
            Some(c) => Some(MaterialCriteria::parse(c, add_reverse)?),
            None => None,
        };
        self.insert(&ranks, label.unwrap_or("").to_string(), constraint);

        if add_reverse {
            let reversed = reverse_fen_pattern(ranks_part);
            let rlabel = label.map(|l| format!("{l}I"));
            self.add_pattern(
                &match constraint_part {
                    Some(c) => format!("{reversed}:{c}"),
                    None => reversed,
                },
                false,
                rlabel.as_deref(),
            )?;
        }
        Ok(())
    }

    fn split_ranks(s: &str) -> Result<Vec<String>> {
        let ranks: Vec<&str> = s.split('/').collect();
        anyhow::ensure!(ranks.len() == 8, "expected 8 ranks");
        let mut in_closure = false;
        for rank in &ranks {
            anyhow::ensure!(!rank.is_empty(), "empty rank");
            for &b in rank.as_bytes() {
                match b {
                    CCL_START => {
                        anyhow::ensure!(!in_closure, "nested closures not allowed");
                        in_closure = true;
                    }
                    CCL_END => {
                        anyhow::ensure!(in_closure, "']' without '['");
                        in_closure = false;
                    }
                    NCCL => anyhow::ensure!(in_closure, "'^' outside a closure"),
                    _ => {}
                }
            }
            anyhow::ensure!(!in_closure, "unclosed closure");
        }
        Ok(ranks.into_iter().map(str::to_string).collect())
    }

    /// merge the new chain into the tree, sharing identical leading ranks
    fn insert(&mut self, ranks: &[String], label: String, constraint: Option<MaterialCriteria>) {
        let chain = Self::make_chain(ranks, label, constraint);
        match &mut self.root {
            None => self.root = Some(chain),
            Some(root) => Self::insert_pattern(root, chain),
        }
    }

    fn make_chain(ranks: &[String], label: String, constraint: Option<MaterialCriteria>) -> Box<PatternNode> {
        let mut node = Box::new(PatternNode {
            rank: ranks[0].clone(),
            ..PatternNode::default()
        });
        if ranks.len() > 1 {
            node.next_rank = Some(Self::make_chain(&ranks[1..], label, constraint));
        } else {
            node.label = Some(label);
            node.constraint = constraint;
        }
        node
    }

    fn insert_pattern(node: &mut PatternNode, chain: Box<PatternNode>) {
        if node.rank == chain.rank {
            match (&mut node.next_rank, chain.next_rank) {
                (Some(next), Some(chain_next)) => Self::insert_pattern(next, chain_next),
                _ => warn!("duplicate FEN patterns detected"),
            }
        } else {
            match &mut node.alternative_rank {
                Some(alt) => Self::insert_pattern(alt, chain),
                None => node.alternative_rank = Some(chain),
            }
        }
    }

    /// Some(label) when any pattern matches; the label is empty for
    /// unlabelled patterns.
    pub fn match_board(&self, board: &Board) -> Option<String> {
        let root = self.root.as_deref()?;
        let ranks: Vec<String> = (0..8)
            .map(|i| board.rank_text(7 - i).replace('.', "_"))
            .collect();
        Self::match_rank(board, Some(root), 0, &ranks)
    }

    fn match_rank(board: &Board, mut pattern: Option<&PatternNode>, index: usize, ranks: &[String]) -> Option<String> {
        while let Some(node) = pattern {
            if matchhere(node.rank.as_bytes(), ranks[index].as_bytes()) {
                let label = if index == 7 {
                    match &node.constraint {
                        Some(c) if !c.matches_board(board) => None,
                        _ => Some(node.label.clone().unwrap_or_default()),
                    }
                } else {
                    Self::match_rank(board, node.next_rank.as_deref(), index + 1, ranks)
                };
                if label.is_some() {
                    return label;
                }
            }
            pattern = node.alternative_rank.as_deref();
        }
        None
    }
}

/// swap the rank order and invert the case of each piece letter
fn reverse_fen_pattern(pattern: &str) -> String {
    let mut rows: Vec<String> = pattern.split('/').map(str::to_string).collect();
    rows.reverse();
    rows.iter()
        .map(|row| {
            row.chars()
                .map(|ch| {
                    if ch.is_ascii_lowercase() {
                        ch.to_ascii_uppercase()
                    } else if ch.is_ascii_uppercase() {
                        ch.to_ascii_lowercase()
                    } else {
                        ch
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<String>>()
        .join("/")
}

/// search for the pattern at the start of a rank's text
fn matchhere(regexp: &[u8], text: &[u8]) -> bool {
    if regexp.is_empty() {
        return text.is_empty();
    }
    if regexp[0] == ZERO_OR_MORE {
        return matchstar(&regexp[1..], text);
    }
    if text.is_empty() {
        return false;
    }
    match regexp[0] {
        ANY_SQUARE_STATE => matchhere(&regexp[1..], &text[1..]),
        NON_EMPTY_SQUARE | ANY_WHITE_PIECE | ANY_BLACK_PIECE | NOT_A_PAWN => {
            matchone(regexp[0], text[0]) && matchhere(&regexp[1..], &text[1..])
        }
        CCL_START => {
            if regexp.get(1) == Some(&NCCL) {
                matchnccl(&regexp[2..], text)
            } else {
                matchccl(&regexp[1..], text)
            }
        }
        d @ b'1'..=b'8' => {
            let empty = (d - b'0') as usize;
            if text.len() >= empty && text[..empty].iter().all(|&b| b == EMPTY_SQUARE) {
                matchhere(&regexp[1..], &text[empty..])
            } else {
                false
            }
        }
        ch => ch == text[0] && matchhere(&regexp[1..], &text[1..]),
    }
}

/// leftmost-longest match of '*' within a single rank
fn matchstar(regexp: &[u8], text: &[u8]) -> bool {
    for skip in (0..=text.len()).rev() {
        if matchhere(regexp, &text[skip..]) {
            return true;
        }
    }
    false
}

fn matchone(regchar: u8, textchar: u8) -> bool {
    if regchar == textchar {
        return true;
    }
    match regchar {
        NON_EMPTY_SQUARE => textchar != EMPTY_SQUARE,
        ANY_WHITE_PIECE => matches!(textchar, b'K' | b'Q' | b'R' | b'N' | b'B' | b'P'),
        ANY_BLACK_PIECE => matches!(textchar, b'k' | b'q' | b'r' | b'n' | b'b' | b'p'),
        ANY_SQUARE_STATE => true,
        NOT_A_PAWN => !matches!(textchar, b'P' | b'p'),
        _ => false,
    }
}

/// match any character of the closure
fn matchccl(regexp: &[u8], text: &[u8]) -> bool {
    let mut i = 0;
    while i < regexp.len() && regexp[i] != CCL_END && !matchone(regexp[i], text[0]) {
        i += 1;
    }
    if i >= regexp.len() || regexp[i] == CCL_END {
        return false;
    }
    // skip to the closing bracket
    let close = regexp.iter().position(|&b| b == CCL_END);
    match close {
        Some(c) => matchhere(&regexp[c + 1..], &text[1..]),
        None => false,
    }
}

/// match any character not in the closure
fn matchnccl(regexp: &[u8], text: &[u8]) -> bool {
    let mut i = 0;
    while i < regexp.len() && regexp[i] != CCL_END {
        if matchone(regexp[i], text[0]) {
            return false;
        }
        i += 1;
    }
    match regexp.iter().position(|&b| b == CCL_END) {
        Some(c) => matchhere(&regexp[c + 1..], &text[1..]),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn board(fen: &str) -> Board {
        Board::parse_fen(fen).unwrap()
    }

    #[test]
    fn test_exact_pattern() {
        let mut m = FenPatternMatcher::default();
        m.add_pattern("8/8/8/8/8/8/8/4K2R", false, None).unwrap();
        assert_eq!(m.match_board(&board("8/8/8/8/8/8/8/4K2R w K - 0 1")), Some(String::new()));
        assert_eq!(m.match_board(&board("8/8/8/8/8/8/8/4KR2 w - - 0 1")), None);
    }

    #[test]
    fn test_digits_count_empties() {
        let mut m = FenPatternMatcher::default();
        m.add_pattern("8/8/8/8/8/8/8/3_K2R", false, None).unwrap();
        assert!(m.match_board(&board("8/8/8/8/8/8/8/4K2R w K - 0 1")).is_some());
    }

    #[test]
    fn test_star_and_any() {
        let mut m = FenPatternMatcher::default();
        m.add_pattern("*k*/8/8/8/8/8/8/*K*", false, None).unwrap();
        assert!(m.match_board(&board("3k4/8/8/8/8/8/8/6K1 w - - 0 1")).is_some());
        assert!(m.match_board(&board("8/3k4/8/8/8/8/8/6K1 w - - 0 1")).is_none());
    }

    #[test]
    fn test_meta_characters() {
        let mut m = FenPatternMatcher::default();
        // a white piece, a non-pawn and a non-empty square on rank 1
        m.add_pattern("*k*/8/8/8/8/8/8/Am!5", false, None).unwrap();
        assert!(m.match_board(&board("3k4/8/8/8/8/8/8/KQR5 w - - 0 1")).is_some());
        assert!(m.match_board(&board("3k4/8/8/8/8/8/8/kQR5 w - - 0 1")).is_none());
    }

    #[test]
    fn test_character_classes() {
        let mut m = FenPatternMatcher::default();
        m.add_pattern("*k*/8/8/8/8/8/8/[RQ]7", false, None).unwrap();
        assert!(m.match_board(&board("3k4/8/8/8/8/8/8/R7 w - - 0 1")).is_some());
        assert!(m.match_board(&board("3k4/8/8/8/8/8/8/Q7 w - - 0 1")).is_some());
        assert!(m.match_board(&board("3k4/8/8/8/8/8/8/B7 w - - 0 1")).is_none());

        let mut m = FenPatternMatcher::default();
        m.add_pattern("*k*/8/8/8/8/8/8/[^RQ]7", false, None).unwrap();
        assert!(m.match_board(&board("3k4/8/8/8/8/8/8/B7 w - - 0 1")).is_some());
        assert!(m.match_board(&board("3k4/8/8/8/8/8/8/R7 w - - 0 1")).is_none());
    }

    #[test]
    fn test_material_constraint() {
        let mut m = FenPatternMatcher::default();
        // white king on e1, rook on h1, material exactly KR versus k
        m.add_pattern("*k*/8/8/8/8/8/8/4K2R:KR k", false, None).unwrap();
        assert!(m.match_board(&board("3k4/8/8/8/8/8/8/4K2R w - - 0 1")).is_some());
    }

    #[test]
    fn test_labels() {
        let mut m = FenPatternMatcher::default();
        m.add_pattern("*k*/8/8/8/8/8/8/*K*R*", false, Some("bare-rook")).unwrap();
        assert_eq!(
            m.match_board(&board("3k4/8/8/8/8/8/8/4K2R w - - 0 1")),
            Some("bare-rook".to_string())
        );
    }

    #[test]
    fn test_reverse_pattern() {
        assert_eq!(
            reverse_fen_pattern("8/8/8/8/8/8/8/4K2R"),
            "4k2r/8/8/8/8/8/8/8"
        );
        let mut m = FenPatternMatcher::default();
        m.add_pattern("8/8/8/8/8/8/8/4K2R", true, Some("kr")).unwrap();
        assert_eq!(
            m.match_board(&board("8/8/8/8/8/8/8/4K2R w K - 0 1")),
            Some("kr".to_string())
        );
        assert_eq!(
            m.match_board(&board("4k2r/8/8/8/8/8/8/8 b k - 0 1")),
            Some("krI".to_string()),
            "reversed twin labelled with an I suffix"
        );
    }

    #[test]
    fn test_alternatives_share_prefix() {
        let mut m = FenPatternMatcher::default();
        m.add_pattern("*k*/8/8/8/8/8/8/R7", false, Some("rook")).unwrap();
        m.add_pattern("*k*/8/8/8/8/8/8/Q7", false, Some("queen")).unwrap();
        assert_eq!(
            m.match_board(&board("3k4/8/8/8/8/8/8/Q7 w - - 0 1")),
            Some("queen".to_string())
        );
        assert_eq!(
            m.match_board(&board("3k4/8/8/8/8/8/8/R7 w - - 0 1")),
            Some("rook".to_string())
        );
    }

    #[test]
    fn test_bad_patterns_rejected() {
        let mut m = FenPatternMatcher::default();
        assert!(m.add_pattern("8/8/8", false, None).is_err());
        assert!(m.add_pattern("8/8/8/8/8/8/8/[R", false, None).is_err());
        assert!(m.add_pattern("8/8/8/8/8/8/8/^R", false, None).is_err());
        assert!(m.add_pattern("8/8/8/8/8/8/8/", false, None).is_err());
    }
}
