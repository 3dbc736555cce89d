use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use pgnsift_base::prelude::*;

/// A comment, stored as its whitespace-separated word tokens so the writer
/// can wrap long lines without re-tokenising.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Comment {
    words: Vec<String>,
}

impl Comment {
    pub fn parse(text: &str) -> Comment {
        Comment {
            words: text.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn from_words(words: Vec<String>) -> Comment {
        Comment { words }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn text(&self) -> String {
        self.words.join(" ")
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{}}}", self.text())
    }
}

pub type CommentList = Vec<Comment>;

pub type Nag = u16;

/// Move classification assigned by the interpreter.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MoveClass {
    Pawn,
    EnPassantPawn,
    PieceMove,
    KingsideCastle,
    QueensideCastle,
    PawnWithPromotion,
    Null,
    #[default]
    Unknown,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CheckStatus {
    #[default]
    None,
    Check,
    Checkmate,
}

impl CheckStatus {
    pub fn suffix(self) -> &'static str {
        match self {
            CheckStatus::None => "",
            CheckStatus::Check => "+",
            CheckStatus::Checkmate => "#",
        }
    }
}

/// One half-move of a game with everything that rode on it in the input
/// and everything the interpreter derived from it.
#[derive(Clone, Debug, Default)]
pub struct MoveNode {
    /// move text as it appeared in the input, pre-disambiguation
    pub san:        String,
    /// check indicators attached in the input
    pub check_hint: CheckStatus,
    pub nags:       Vec<Nag>,
    pub comments:   CommentList,
    pub variations: Vec<Variation>,

    // filled in by the interpreter
    pub mv:         Option<Move>,
    pub class:      MoveClass,
    pub check:      CheckStatus,
    /// regenerated, normalised SAN; the writer prefers it when present
    pub san_norm:   Option<String>,
    pub fen_after:  Option<String>,
    pub epd_after:  Option<String>,
    pub hash_after: Hash,
    pub evaluation: Option<String>,
}

impl MoveNode {
    pub fn from_san(san: &str) -> MoveNode {
        MoveNode {
            san: san.to_string(),
            ..Default::default()
        }
    }

    pub fn is_null(&self) -> bool {
        self.san == "--" || self.san == "Z0"
    }
}

/// A recursive annotation variation.
#[derive(Clone, Debug, Default)]
pub struct Variation {
    pub prefix_comment: CommentList,
    pub moves:          Vec<MoveNode>,
    pub suffix_comment: CommentList,
    pub result:         Option<Outcome>,
}

pub const SEVEN_TAG_ROSTER: [&str; 7] = ["Event", "Site", "Date", "Round", "White", "Black", "Result"];

/// Tags recommended to follow the Seven Tag Roster, in output order.
pub const RECOMMENDED_TAGS: [&str; 10] = [
    "WhiteTitle",
    "BlackTitle",
    "WhiteElo",
    "BlackElo",
    "ECO",
    "Opening",
    "Variation",
    "SubVariation",
    "FEN",
    "SetUp",
];

/// Tag name/value pairs in input order. Unknown tag names register simply
/// by insertion; predefined names get no special storage, only special
/// output ordering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TagRoster {
    map: IndexMap<String, String>,
}

impl TagRoster {
    pub fn new() -> TagRoster {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(|s| s.as_str())
    }

    /// later occurrences overwrite earlier ones; returns true if the tag
    /// was already present
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        self.map.insert(name.to_string(), value.to_string()).is_some()
    }

    pub fn remove(&mut self, name: &str) {
        self.map.shift_remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// value for Seven-Tag-Roster output, with the conventional fallbacks
    pub fn str_value(&self, name: &str) -> String {
        match self.get(name) {
            Some(v) => v.to_string(),
            None if name == "Date" => "????.??.??".to_string(),
            None if name == "Result" => "*".to_string(),
            None => "?".to_string(),
        }
    }
}

/// A parsed game: the tag roster, the move list and what interpretation
/// derived. Ownership is exclusive; the driver drops each game before
/// parsing the next.
#[derive(Clone, Debug, Default)]
pub struct Game {
    pub tags:            TagRoster,
    pub prefix_comment:  CommentList,
    pub moves:           Vec<MoveNode>,
    pub result:          Outcome,
    /// neither a terminating result nor a Result tag was found
    pub missing_result:  bool,
    /// first lexical or grammatical error hit while parsing this game
    pub parse_error:     Option<String>,
    pub moves_ok:        bool,
    pub moves_checked:   bool,
    pub error_ply:       Option<Ply>,
    pub position_counts: HashMap<Hash, u32>,
    pub cumulative_hash: Hash,
    pub final_hash:      Hash,
    pub start_line:      u32,
    pub end_line:        u32,
    pub chess960:        bool,
}

impl Game {
    pub fn new() -> Game {
        Game::default()
    }

    pub fn plycount(&self) -> usize {
        self.moves.len()
    }

    /// board the game starts from: the FEN tag if present, else the
    /// standard array
    pub fn starting_board(&self) -> Result<Board> {
        match self.tags.get("FEN") {
            Some(fen) => Board::parse_fen(fen).with_context(|| format!("FEN tag of game at line {}", self.start_line)),
            None => Ok(Board::starting_pos()),
        }
    }

    pub fn has_comments(&self) -> bool {
        !self.prefix_comment.is_empty()
            || self
                .moves
                .iter()
                .any(|m| !m.comments.is_empty() || m.variations.iter().any(variation_has_comments))
    }

    /// number of moves (not plies) for move-bound filters
    pub fn move_count(&self) -> usize {
        (self.plycount() + 1) / 2
    }

    pub fn white_to_move_at(&self, ply: usize) -> Result<bool> {
        let start = self.starting_board()?;
        Ok(start.turn().chooser_wb(ply % 2 == 0, ply % 2 == 1))
    }
}

fn variation_has_comments(var: &Variation) -> bool {
    !var.prefix_comment.is_empty()
        || !var.suffix_comment.is_empty()
        || var
            .moves
            .iter()
            .any(|m| !m.comments.is_empty() || m.variations.iter().any(variation_has_comments))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_comment_tokenisation() {
        let c = Comment::parse("  a  comment   with spaces  ");
        assert_eq!(c.words(), &["a", "comment", "with", "spaces"]);
        assert_eq!(c.text(), "a comment with spaces");
        assert_eq!(c.to_string(), "{a comment with spaces}");
        assert!(Comment::parse("   ").is_empty());
    }

    #[test]
    fn test_tag_roster() {
        let mut tags = TagRoster::new();
        assert!(!tags.set("Event", "casual"));
        assert!(!tags.set("MyCustomTag", "yes"));
        assert!(tags.set("Event", "rated"), "second set reports overwrite");
        assert_eq!(tags.get("Event"), Some("rated"));
        assert_eq!(tags.len(), 2);
        // insertion order retained
        let names: Vec<&str> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["Event", "MyCustomTag"]);

        assert_eq!(tags.str_value("Date"), "????.??.??");
        assert_eq!(tags.str_value("White"), "?");
        assert_eq!(tags.str_value("Result"), "*");
        tags.remove("MyCustomTag");
        assert!(!tags.contains("MyCustomTag"));
    }

    #[test]
    fn test_game_basics() {
        let mut game = Game::new();
        assert_eq!(game.starting_board().unwrap(), Board::starting_pos());
        game.tags.set("FEN", "7k/8/8/8/8/8/8/7K w - - 0 1");
        assert_eq!(game.starting_board().unwrap().to_fen(), "7k/8/8/8/8/8/8/7K w - - 0 1");
        game.tags.set("FEN", "not a fen");
        assert!(game.starting_board().is_err());

        let mut game = Game::new();
        game.moves.push(MoveNode::from_san("e4"));
        game.moves.push(MoveNode::from_san("e5"));
        game.moves.push(MoveNode::from_san("Nf3"));
        assert_eq!(game.plycount(), 3);
        assert_eq!(game.move_count(), 2);
        assert!(!game.has_comments());
        game.moves[1].comments.push(Comment::parse("a comment"));
        assert!(game.has_comments());
    }

    #[test]
    fn test_null_move_detection() {
        assert!(MoveNode::from_san("--").is_null());
        assert!(MoveNode::from_san("Z0").is_null());
        assert!(!MoveNode::from_san("e4").is_null());
    }
}
