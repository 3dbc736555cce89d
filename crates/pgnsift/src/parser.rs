use pgnsift_base::prelude::*;
use tracing::{debug, warn};

use crate::game::{CheckStatus, Comment, Game, MoveNode, Variation};
use crate::lexer::Token;

/// Turns a token stream into Games, one per call, with best-effort
/// recovery: a token-level error inside a game drains to the next
/// terminating result or tag-section opener and resumes there.
pub struct Parser {
    tokens:     Vec<(Token, u32)>,
    pos:        usize,
    saw_result: bool,
}

impl Parser {
    pub fn new(tokens: Vec<(Token, u32)>) -> Parser {
        Parser {
            tokens,
            pos: 0,
            saw_result: false,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn line(&self) -> u32 {
        self.tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map(|(_, l)| *l)
            .unwrap_or(0)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    /// drain to the next plausible game start after an error
    fn recover(&mut self) {
        while let Some(tok) = self.peek() {
            match tok {
                Token::Result(_) => {
                    self.bump();
                    return;
                }
                Token::Tag(_) => return,
                _ => {
                    self.bump();
                }
            }
        }
    }

    pub fn next_game(&mut self) -> Option<Game> {
        // junk and leading comments
        let mut prefix = vec![];
        loop {
            match self.peek()? {
                Token::Comment(_) => {
                    if let Some(Token::Comment(text)) = self.bump() {
                        let c = Comment::parse(&text);
                        if !c.is_empty() {
                            prefix.push(c);
                        }
                    }
                }
                Token::Tag(_) | Token::MoveText(_) | Token::MoveNumber(_) | Token::Nag(_) => break,
                Token::Error(msg) => {
                    warn!("line {}: {} before any game, skipping", self.line(), msg);
                    self.bump();
                }
                _ => {
                    debug!("line {}: skipping junk token {:?}", self.line(), self.peek());
                    self.bump();
                }
            }
        }

        let mut game = Game::new();
        game.start_line = self.line();
        game.prefix_comment = prefix;

        self.parse_tag_section(&mut game);

        // a NAG before any move is not legal PGN; drop it like the
        // original does
        while let Some(Token::Nag(n)) = self.peek() {
            warn!(
                "line {}: NAG ${n} before a move is not legal PGN, dropped",
                self.line()
            );
            self.bump();
        }

        self.parse_move_list(&mut game);
        game.end_line = self.line();

        // missing-result tolerance: fall back on the Result tag
        if !self.saw_result && game.parse_error.is_none() {
            match game.tags.get("Result").map(Outcome::try_from_pgn) {
                Some(Ok(r)) => game.result = r,
                _ => {
                    game.missing_result = true;
                    warn!("game at line {} has no terminating result", game.start_line);
                }
            }
        }

        // normalise a short draw marker in the Result tag
        if game.tags.get("Result") == Some("1/2") {
            warn!("game at line {}: Result tag '1/2' normalised to '1/2-1/2'", game.start_line);
            game.tags.set("Result", "1/2-1/2");
        }

        Some(game)
    }

    fn parse_tag_section(&mut self, game: &mut Game) {
        while let Some(Token::Tag(_)) = self.peek() {
            let Some(Token::Tag(name)) = self.bump() else { break };
            let value = match self.peek() {
                Some(Token::Str(_)) => {
                    let Some(Token::Str(v)) = self.bump() else { unreachable!() };
                    v
                }
                _ => {
                    game.parse_error
                        .get_or_insert_with(|| format!("line {}: tag [{name} has no string value", self.line()));
                    self.recover_tag();
                    continue;
                }
            };
            match self.peek() {
                Some(Token::TagEnd) => {
                    self.bump();
                }
                _ => {
                    game.parse_error
                        .get_or_insert_with(|| format!("line {}: missing ']' after tag {name}", self.line()));
                    self.recover_tag();
                }
            }
            let value = if name == "Result" && value == "1/2" {
                "1/2-1/2".to_string()
            } else {
                value
            };
            if game.tags.set(&name, &value) {
                warn!("line {}: duplicate tag {name}, later value kept", self.line());
            }
        }
    }

    /// drain to the end of a malformed tag pair
    fn recover_tag(&mut self) {
        while let Some(tok) = self.peek() {
            match tok {
                Token::TagEnd => {
                    self.bump();
                    return;
                }
                Token::Tag(_) | Token::MoveText(_) | Token::MoveNumber(_) | Token::Result(_) => return,
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn parse_move_list(&mut self, game: &mut Game) {
        self.saw_result = false;
        loop {
            match self.peek() {
                None => return,
                Some(Token::MoveNumber(_)) => {
                    self.bump();
                }
                Some(Token::MoveText(_)) => {
                    let Some(Token::MoveText(san)) = self.bump() else { unreachable!() };
                    let mut node = MoveNode::from_san(&san);
                    self.parse_move_trailers(&mut node, game);
                    game.moves.push(node);
                }
                Some(Token::Comment(_)) => {
                    // an orphan comment attaches to the last move, or to
                    // the game prefix when there is none yet
                    let Some(Token::Comment(text)) = self.bump() else { unreachable!() };
                    let c = Comment::parse(&text);
                    if c.is_empty() {
                        continue;
                    }
                    match game.moves.last_mut() {
                        Some(last) => last.comments.push(c),
                        None => game.prefix_comment.push(c),
                    }
                }
                Some(Token::Result(_)) => {
                    let Some(Token::Result(r)) = self.bump() else { unreachable!() };
                    game.result = r;
                    self.saw_result = true;
                    return;
                }
                Some(Token::Tag(_)) => {
                    // next game's tag section: this game never terminated
                    return;
                }
                Some(Token::Nag(_)) => {
                    let Some(Token::Nag(n)) = self.bump() else { unreachable!() };
                    match game.moves.last_mut() {
                        Some(last) => last.nags.push(n),
                        None => warn!("line {}: NAG ${n} with no move, dropped", self.line()),
                    }
                }
                Some(Token::RavStart) => {
                    self.bump();
                    let var = self.parse_variation(game);
                    match game.moves.last_mut() {
                        Some(last) => last.variations.push(var),
                        None => {
                            game.parse_error
                                .get_or_insert_with(|| format!("line {}: variation before any move", self.line()));
                        }
                    }
                }
                Some(Token::RavEnd | Token::TagEnd | Token::Str(_) | Token::CheckSymbol(_)) => {
                    game.parse_error
                        .get_or_insert_with(|| format!("line {}: unexpected token {:?}", self.line(), self.peek()));
                    self.recover();
                    return;
                }
                Some(Token::Error(_)) => {
                    let line = self.line();
                    let Some(Token::Error(msg)) = self.bump() else { unreachable!() };
                    game.parse_error.get_or_insert_with(|| format!("line {line}: {msg}"));
                    self.recover();
                    return;
                }
            }
        }
    }

    /// check symbols, comments, NAGs and variations riding on a move
    fn parse_move_trailers(&mut self, node: &mut MoveNode, game: &mut Game) {
        loop {
            match self.peek() {
                Some(Token::CheckSymbol(_)) => {
                    let Some(Token::CheckSymbol(ch)) = self.bump() else { unreachable!() };
                    // '#' wins over '+' when both are present
                    if ch == '#' || node.check_hint == CheckStatus::None {
                        node.check_hint = if ch == '#' { CheckStatus::Checkmate } else { CheckStatus::Check };
                    }
                }
                Some(Token::Comment(_)) => {
                    let Some(Token::Comment(text)) = self.bump() else { unreachable!() };
                    let c = Comment::parse(&text);
                    if !c.is_empty() {
                        node.comments.push(c);
                    }
                }
                Some(Token::Nag(_)) => {
                    let Some(Token::Nag(n)) = self.bump() else { unreachable!() };
                    node.nags.push(n);
                }
                Some(Token::RavStart) => {
                    self.bump();
                    let var = self.parse_variation(game);
                    node.variations.push(var);
                }
                _ => return,
            }
        }
    }

    /// inside '(' ... ')': [comment] move_list [result] [comment]
    fn parse_variation(&mut self, game: &mut Game) -> Variation {
        let mut var = Variation::default();
        loop {
            match self.peek() {
                None => {
                    game.parse_error
                        .get_or_insert_with(|| format!("line {}: unterminated variation", self.line()));
                    return var;
                }
                Some(Token::RavEnd) => {
                    self.bump();
                    // comments straight after ')' are the variation's
                    // suffix comments
                    while let Some(Token::Comment(_)) = self.peek() {
                        let Some(Token::Comment(text)) = self.bump() else { unreachable!() };
                        let c = Comment::parse(&text);
                        if !c.is_empty() {
                            var.suffix_comment.push(c);
                        }
                    }
                    return var;
                }
                Some(Token::MoveNumber(_)) => {
                    self.bump();
                }
                Some(Token::MoveText(_)) => {
                    let Some(Token::MoveText(san)) = self.bump() else { unreachable!() };
                    let mut node = MoveNode::from_san(&san);
                    self.parse_move_trailers(&mut node, game);
                    var.moves.push(node);
                }
                Some(Token::Comment(_)) => {
                    let Some(Token::Comment(text)) = self.bump() else { unreachable!() };
                    let c = Comment::parse(&text);
                    if c.is_empty() {
                        continue;
                    }
                    match var.moves.last_mut() {
                        Some(last) => last.comments.push(c),
                        None => var.prefix_comment.push(c),
                    }
                }
                Some(Token::Result(_)) => {
                    let Some(Token::Result(r)) = self.bump() else { unreachable!() };
                    var.result = Some(r);
                }
                Some(Token::Nag(_)) => {
                    let Some(Token::Nag(n)) = self.bump() else { unreachable!() };
                    match var.moves.last_mut() {
                        Some(last) => last.nags.push(n),
                        None => warn!("line {}: NAG ${n} with no move in variation, dropped", self.line()),
                    }
                }
                Some(Token::RavStart) => {
                    self.bump();
                    let inner = self.parse_variation(game);
                    match var.moves.last_mut() {
                        Some(last) => last.variations.push(inner),
                        None => {
                            game.parse_error
                                .get_or_insert_with(|| format!("line {}: variation before any move", self.line()));
                        }
                    }
                }
                Some(Token::Error(_)) => {
                    let line = self.line();
                    let Some(Token::Error(msg)) = self.bump() else { unreachable!() };
                    game.parse_error.get_or_insert_with(|| format!("line {line}: {msg}"));
                }
                Some(Token::Tag(_)) => {
                    game.parse_error
                        .get_or_insert_with(|| format!("line {}: tag inside variation", self.line()));
                    return var;
                }
                Some(Token::TagEnd | Token::Str(_) | Token::CheckSymbol(_)) => {
                    game.parse_error
                        .get_or_insert_with(|| format!("line {}: unexpected token in variation", self.line()));
                    self.bump();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::lexer::tokenize;

    pub fn parse_all(src: &str) -> Vec<Game> {
        let mut parser = Parser::new(tokenize(src, false));
        let mut games = vec![];
        while let Some(g) = parser.next_game() {
            games.push(g);
        }
        games
    }

    #[test]
    fn test_minimal_game() {
        let games = parse_all("[Event \"?\"]\n\n1. e4 e5 *\n");
        assert_eq!(games.len(), 1);
        let g = &games[0];
        assert_eq!(g.tags.get("Event"), Some("?"));
        assert_eq!(g.plycount(), 2);
        assert_eq!(g.moves[0].san, "e4");
        assert_eq!(g.moves[1].san, "e5");
        assert_eq!(g.result, Outcome::Unterminated);
        assert!(!g.missing_result);
        assert!(g.parse_error.is_none());
    }

    #[test]
    fn test_zero_move_game() {
        let games = parse_all("[Event \"empty\"]\n[Result \"1-0\"]\n\n1-0\n");
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].plycount(), 0);
        assert_eq!(games[0].result, Outcome::Win(Color::White));
    }

    #[test]
    fn test_missing_result_falls_back_on_tag() {
        let games = parse_all("[Result \"0-1\"]\n\n1. e4 e5\n[Event \"next\"]\n\n1. d4 *\n");
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].result, Outcome::Win(Color::Black));
        assert!(!games[0].missing_result, "result tag rescued it");
        assert_eq!(games[1].tags.get("Event"), Some("next"));
    }

    #[test]
    fn test_missing_result_and_tag() {
        let games = parse_all("[Event \"x\"]\n\n1. e4 e5\n[Event \"next\"]\n\n1. d4 *\n");
        assert_eq!(games.len(), 2);
        assert!(games[0].missing_result);
    }

    #[test]
    fn test_duplicate_tag_overwrites() {
        let games = parse_all("[Event \"first\"]\n[Event \"second\"]\n\n*\n");
        assert_eq!(games[0].tags.get("Event"), Some("second"));
        assert_eq!(games[0].tags.len(), 1);
    }

    #[test]
    fn test_result_tag_normalisation() {
        let games = parse_all("[Result \"1/2\"]\n\n1. e4 1/2-1/2\n");
        assert_eq!(games[0].tags.get("Result"), Some("1/2-1/2"));
        assert_eq!(games[0].result, Outcome::Draw);
    }

    #[test]
    fn test_comments_attach() {
        let games = parse_all("{prefix words} [Event \"?\"]\n\n{before} 1. e4 {on e4} e5 {orphan1} {orphan2} *\n");
        let g = &games[0];
        assert_eq!(g.prefix_comment.len(), 2, "prefix and pre-move comments");
        assert_eq!(g.moves[0].comments[0].text(), "on e4");
        assert_eq!(g.moves[1].comments.len(), 2, "orphans attach to the last move");
    }

    #[test]
    fn test_nags() {
        let games = parse_all("1. e4 $1 $9 e5?! *");
        let g = &games[0];
        assert_eq!(g.moves[0].nags, vec![1, 9]);
        assert_eq!(g.moves[1].nags, vec![6]);
    }

    #[test]
    fn test_check_symbols() {
        let games = parse_all("1. e4 e5 2. Qh5 Nc6 3. Qxf7# 1-0");
        let g = &games[0];
        assert_eq!(g.moves[4].san, "Qxf7");
        assert_eq!(g.moves[4].check_hint, CheckStatus::Checkmate);
    }

    #[test]
    fn test_variations() {
        let games = parse_all("1. e4 (1. d4 {queen pawn} d5) ({pre} 1. c4 e5 {post}) e5 *");
        let g = &games[0];
        assert_eq!(g.moves.len(), 2);
        let vars = &g.moves[0].variations;
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0].moves.len(), 2);
        assert_eq!(vars[0].moves[0].san, "d4");
        assert_eq!(vars[0].moves[0].comments[0].text(), "queen pawn");
        assert_eq!(vars[1].prefix_comment[0].text(), "pre");
        assert_eq!(vars[1].moves[1].comments[0].text(), "post");
    }

    #[test]
    fn test_nested_variation() {
        let games = parse_all("1. e4 (1. d4 d5 (1... Nf6 2. c4)) e5 *");
        let outer = &games[0].moves[0].variations[0];
        assert_eq!(outer.moves[1].variations.len(), 1);
        assert_eq!(outer.moves[1].variations[0].moves[0].san, "Nf6");
    }

    #[test]
    fn test_variation_suffix_comment() {
        let games = parse_all("1. e4 (1. d4) {suffix} e5 *");
        let var = &games[0].moves[0].variations[0];
        assert_eq!(var.suffix_comment.len(), 1);
        assert_eq!(var.suffix_comment[0].text(), "suffix");
    }

    #[test]
    fn test_recovery_after_error() {
        let src = "[Event \"bad\"]\n\n1. e4 e5 ~~ 2. Nf3 1-0\n\n[Event \"good\"]\n\n1. d4 *\n";
        let games = parse_all(src);
        assert_eq!(games.len(), 2);
        assert!(games[0].parse_error.is_some());
        assert!(games[1].parse_error.is_none());
        assert_eq!(games[1].tags.get("Event"), Some("good"));
        assert_eq!(games[1].moves[0].san, "d4");
    }

    #[test]
    fn test_leading_nag_dropped() {
        let games = parse_all("[Event \"?\"]\n\n$4 1. e4 *\n");
        assert_eq!(games[0].moves.len(), 1);
        assert!(games[0].moves[0].nags.is_empty());
    }

    #[test]
    fn test_line_numbers() {
        let games = parse_all("[Event \"?\"]\n\n1. e4 e5\n2. Nf3 Nc6 1-0\n");
        assert_eq!(games[0].start_line, 1);
        assert_eq!(games[0].end_line, 4);
    }
}
