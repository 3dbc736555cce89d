use pgnsift_base::prelude::*;

use crate::game::{Game, MoveNode, Variation};

/// Promote each recursive annotation variation (to the given depth) into
/// a game of its own sharing the main-line prefix. Split-out games get a
/// `*` Result and carry the variation's prefix comment on the last
/// prefix move. The originals are left untouched.
pub fn split_variations(game: &Game, depth_limit: usize) -> Vec<Game> {
    let mut out = vec![];
    split_line(game, &game.moves, &[], depth_limit, &mut out);
    out
}

fn split_line(game: &Game, line: &[MoveNode], prefix: &[MoveNode], depth_limit: usize, out: &mut Vec<Game>) {
    if depth_limit == 0 {
        return;
    }
    for (i, node) in line.iter().enumerate() {
        for var in &node.variations {
            let mut moves: Vec<MoveNode> = prefix.to_vec();
            moves.extend(line[..i].iter().cloned().map(strip_variations));
            let split_at = moves.len();
            moves.extend(var.moves.iter().cloned().map(strip_variations));
            if let Some(last_prefix) = split_at.checked_sub(1) {
                // the variation's own comments travel with the split
                for c in &var.prefix_comment {
                    moves[last_prefix].comments.push(c.clone());
                }
            }
            let mut split = Game {
                tags: game.tags.clone(),
                prefix_comment: game.prefix_comment.clone(),
                moves,
                result: Outcome::Unterminated,
                ..Game::new()
            };
            split.tags.set("Result", "*");
            split.start_line = game.start_line;
            split.end_line = game.end_line;
            out.push(split);

            // deeper variations hang off the variation's own moves
            let mut nested_prefix: Vec<MoveNode> = prefix.to_vec();
            nested_prefix.extend(line[..i].iter().cloned().map(strip_variations));
            split_line(game, &var.moves, &nested_prefix, depth_limit - 1, out);
        }
    }
}

fn strip_variations(mut node: MoveNode) -> MoveNode {
    node.variations.clear();
    node
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::config::Config;
    use crate::interp::interpret;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn game_of(src: &str) -> Game {
        let mut game = Parser::new(tokenize(src, false)).next_game().unwrap();
        interpret(&mut game, &Config::default(), None).unwrap();
        game
    }

    #[test]
    fn test_single_split() {
        let game = game_of("[Event \"?\"]\n[Result \"1-0\"]\n\n1. e4 (1. d4 d5 2. c4) e5 1-0\n");
        let splits = split_variations(&game, 1);
        assert_eq!(splits.len(), 1);
        let split = &splits[0];
        let sans: Vec<&str> = split.moves.iter().map(|m| m.san.as_str()).collect();
        assert_eq!(sans, vec!["d4", "d5", "c4"]);
        assert_eq!(split.tags.get("Result"), Some("*"));
        assert_eq!(split.result, Outcome::Unterminated);
        assert_eq!(split.tags.get("Event"), Some("?"));
        // the original is untouched
        assert_eq!(game.moves[0].variations.len(), 1);
    }

    #[test]
    fn test_split_shares_prefix() {
        let game = game_of("[Event \"?\"]\n\n1. e4 e5 2. Nf3 (2. f4 exf4) Nc6 *\n");
        let splits = split_variations(&game, 1);
        assert_eq!(splits.len(), 1);
        let sans: Vec<&str> = splits[0].moves.iter().map(|m| m.san.as_str()).collect();
        assert_eq!(sans, vec!["e4", "e5", "f4", "exf4"]);
    }

    #[test]
    fn test_variation_prefix_comment_migrates() {
        let game = game_of("[Event \"?\"]\n\n1. e4 e5 2. Nf3 ({better first} 2. f4 exf4) Nc6 *\n");
        let splits = split_variations(&game, 1);
        let split = &splits[0];
        // the comment lands on the last shared move, 1... e5
        assert_eq!(split.moves[1].san, "e5");
        assert_eq!(split.moves[1].comments[0].text(), "better first");
    }

    #[test]
    fn test_depth_limit() {
        let src = "[Event \"?\"]\n\n1. e4 (1. d4 d5 (1... Nf6 2. c4)) e5 *\n";
        let game = game_of(src);
        assert_eq!(split_variations(&game, 1).len(), 1, "only the outer variation");
        let splits = split_variations(&game, 2);
        assert_eq!(splits.len(), 2);
        let sans: Vec<&str> = splits[1].moves.iter().map(|m| m.san.as_str()).collect();
        assert_eq!(sans, vec!["d4", "Nf6", "c4"]);
    }

    #[test]
    fn test_split_games_have_no_variations() {
        let src = "[Event \"?\"]\n\n1. e4 (1. d4 d5 (1... Nf6 2. c4)) e5 *\n";
        let game = game_of(src);
        for split in split_variations(&game, 3) {
            assert!(split.moves.iter().all(|m| m.variations.is_empty()));
        }
    }
}
