pub mod fenpattern;
pub mod material;
pub mod position;
pub mod tags;
pub mod varmatch;

use std::collections::HashSet;

use pgnsift_base::prelude::*;

use crate::config::{Config, SetupPolicy, WhoseMove};
use crate::filter::fenpattern::FenPatternMatcher;
use crate::filter::material::MaterialMatcher;
use crate::filter::position::PositionMatcher;
use crate::filter::tags::TagMatcher;
use crate::filter::varmatch::VariationMatcher;
use crate::game::{CheckStatus, Game};
use crate::interp::Replay;

/// What the filter decided and the side data a match produced.
#[derive(Clone, Debug, Default)]
pub struct FilterOutcome {
    pub accepted:    bool,
    /// label of the FEN pattern leaf that matched, "" for unlabelled
    pub match_label: Option<String>,
    /// ply at which the positional match fired, for --markmatches
    pub matched_ply: Option<usize>,
}

impl FilterOutcome {
    fn rejected() -> FilterOutcome {
        FilterOutcome::default()
    }
}

/// The independent predicates, combined by logical AND in a fixed order
/// with short-circuit evaluation. All tables are built during startup;
/// only the seen-setups set grows as games flow through.
#[derive(Default)]
pub struct FilterEngine {
    pub tag_matcher:      TagMatcher,
    pub var_matcher:      VariationMatcher,
    pub material_matcher: MaterialMatcher,
    pub fen_patterns:     FenPatternMatcher,
    pub position_matcher: PositionMatcher,
    seen_setups:          HashSet<Hash>,
}

impl FilterEngine {
    pub fn check(&mut self, game: &Game, replay: &Replay, config: &Config) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();

        // tag roster
        if !self.tag_matcher.is_empty() && !self.tag_matcher.matches(game) {
            return FilterOutcome::rejected();
        }

        // setup-tag policy
        let has_setup = game.tags.contains("FEN");
        match config.setup_policy {
            SetupPolicy::NoSetupTags if has_setup => return FilterOutcome::rejected(),
            SetupPolicy::OnlySetupTags if !has_setup => return FilterOutcome::rejected(),
            _ => {}
        }

        // repeated-setup suppression
        if config.delete_same_setup && has_setup {
            let setup_hash = replay.start.hash();
            if !self.seen_setups.insert(setup_hash) {
                return FilterOutcome::rejected();
            }
        }

        // the move list must have interpreted, unless rescued
        if !game.moves_ok && !config.keep_broken_games {
            return FilterOutcome::rejected();
        }

        // inconsistent or absent results
        if config.reject_inconsistent_results {
            if game.missing_result {
                return FilterOutcome::rejected();
            }
            if let Some(tag) = game.tags.get("Result") {
                match Outcome::try_from_pgn(tag) {
                    Ok(r) if r == game.result => {}
                    _ => return FilterOutcome::rejected(),
                }
            }
        }

        // move- and ply-count bounds
        let moves = game.move_count();
        if moves < config.lower_move_bound || moves > config.upper_move_bound {
            return FilterOutcome::rejected();
        }
        let plies = game.plycount();
        if plies < config.lower_ply_bound || plies > config.upper_ply_bound {
            return FilterOutcome::rejected();
        }

        // textual variations
        if !self.var_matcher.is_empty() && !self.var_matcher.matches(game) {
            return FilterOutcome::rejected();
        }

        // positional match
        if !self.position_matcher.is_empty() {
            match self.position_matcher.match_ply(replay, config.whose_move) {
                Some(ply) => outcome.matched_ply = Some(ply),
                None => return FilterOutcome::rejected(),
            }
        }

        // FEN patterns
        if !self.fen_patterns.is_empty() {
            match self.match_fen_patterns(replay, config) {
                Some(label) => outcome.match_label = Some(label),
                None => return FilterOutcome::rejected(),
            }
        }

        // material balance
        if !self.material_matcher.is_empty() && !self.material_matcher.matches(replay) {
            return FilterOutcome::rejected();
        }

        // terminations
        if config.match_only_checkmate {
            let mated = game
                .moves
                .last()
                .map(|m| m.check == CheckStatus::Checkmate)
                .unwrap_or_else(|| replay.final_board().is_checkmate());
            if !mated {
                return FilterOutcome::rejected();
            }
        }
        if config.match_only_stalemate && !replay.final_board().is_stalemate() {
            return FilterOutcome::rejected();
        }
        if config.match_only_insufficient && !replay.final_board().is_insufficient_material() {
            return FilterOutcome::rejected();
        }

        // repetition and the N-move rule
        if config.check_for_repetition > 0 {
            let reached = game.position_counts.values().any(|&n| n >= config.check_for_repetition);
            if !reached {
                return FilterOutcome::rejected();
            }
        }
        if let Some(threshold) = config.check_for_n_move_rule {
            if (replay.max_halfmove_clock as u32) < threshold {
                return FilterOutcome::rejected();
            }
        }

        // underpromotion
        if config.match_underpromotion && !replay.underpromotion {
            return FilterOutcome::rejected();
        }

        // commented games only
        if config.keep_only_commented_games && !game.has_comments() {
            return FilterOutcome::rejected();
        }

        outcome.accepted = true;
        outcome
    }

    fn match_fen_patterns(&self, replay: &Replay, config: &Config) -> Option<String> {
        let limit = if config.depth_of_positional_search == 0 {
            usize::MAX
        } else {
            config.depth_of_positional_search
        };
        for ply in 0..=replay.boards.len().min(limit) {
            let board = replay.board_after(ply);
            let side_ok = match config.whose_move {
                WhoseMove::Either => true,
                WhoseMove::WhiteToMove => board.turn() == Color::White,
                WhoseMove::BlackToMove => board.turn() == Color::Black,
            };
            if !side_ok {
                continue;
            }
            if let Some(label) = self.fen_patterns.match_board(board) {
                return Some(label);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::interp::interpret;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn game_and_replay(src: &str, config: &Config) -> (Game, Replay) {
        let mut game = Parser::new(tokenize(src, false)).next_game().unwrap();
        let replay = interpret(&mut game, config, None).unwrap();
        (game, replay)
    }

    #[test]
    fn test_empty_engine_accepts() {
        let config = Config::default();
        let (game, replay) = game_and_replay("[Event \"?\"]\n\n1. e4 e5 *\n", &config);
        let mut engine = FilterEngine::default();
        assert!(engine.check(&game, &replay, &config).accepted);
    }

    #[test]
    fn test_conjunction_of_predicates() {
        // every enabled predicate must accept
        let config = Config {
            match_only_checkmate: true,
            ..Config::default()
        };
        let mut engine = FilterEngine::default();
        engine.tag_matcher.add_line("Result 1-0").unwrap();

        let mated = "[Event \"?\"]\n[Result \"1-0\"]\n\n1. e4 e5 2. Qh5 Nc6 3. Bc4 Nf6 4. Qxf7# 1-0\n";
        let (game, replay) = game_and_replay(mated, &config);
        assert!(engine.check(&game, &replay, &config).accepted);

        // same game, wrong result tag: the tag predicate vetoes
        let mated_01 = "[Event \"?\"]\n[Result \"0-1\"]\n\n1. e4 e5 2. Qh5 Nc6 3. Bc4 Nf6 4. Qxf7# 1-0\n";
        let (game, replay) = game_and_replay(mated_01, &config);
        assert!(!engine.check(&game, &replay, &config).accepted);

        // right tag, no mate: the checkmate predicate vetoes
        let unmated = "[Event \"?\"]\n[Result \"1-0\"]\n\n1. e4 e5 1-0\n";
        let (game, replay) = game_and_replay(unmated, &config);
        assert!(!engine.check(&game, &replay, &config).accepted);
    }

    #[test]
    fn test_broken_games_rejected_unless_kept() {
        let mut config = Config::default();
        let (game, replay) = game_and_replay("[Event \"?\"]\n\n1. e4 Ke2 *\n", &config);
        let mut engine = FilterEngine::default();
        assert!(!engine.check(&game, &replay, &config).accepted);
        config.keep_broken_games = true;
        assert!(engine.check(&game, &replay, &config).accepted);
    }

    #[test]
    fn test_setup_policies() {
        let config_no = Config {
            setup_policy: SetupPolicy::NoSetupTags,
            ..Config::default()
        };
        let config_only = Config {
            setup_policy: SetupPolicy::OnlySetupTags,
            ..Config::default()
        };
        let plain = "[Event \"?\"]\n\n1. e4 *\n";
        let setup = "[Event \"?\"]\n[FEN \"7k/8/8/8/8/8/R7/K7 w - - 0 1\"]\n\n1. Ra8+ *\n";

        let mut engine = FilterEngine::default();
        let (g1, r1) = game_and_replay(plain, &config_no);
        let (g2, r2) = game_and_replay(setup, &config_no);
        assert!(engine.check(&g1, &r1, &config_no).accepted);
        assert!(!engine.check(&g2, &r2, &config_no).accepted);
        assert!(!engine.check(&g1, &r1, &config_only).accepted);
        assert!(engine.check(&g2, &r2, &config_only).accepted);
    }

    #[test]
    fn test_delete_same_setup() {
        let config = Config {
            delete_same_setup: true,
            ..Config::default()
        };
        let setup = "[Event \"?\"]\n[FEN \"7k/8/8/8/8/8/R7/K7 w - - 0 1\"]\n\n1. Ra8+ *\n";
        let mut engine = FilterEngine::default();
        let (g, r) = game_and_replay(setup, &config);
        assert!(engine.check(&g, &r, &config).accepted);
        assert!(!engine.check(&g, &r, &config).accepted, "second identical setup suppressed");
    }

    #[test]
    fn test_move_bounds() {
        let config = Config {
            lower_move_bound: 2,
            upper_move_bound: 3,
            ..Config::default()
        };
        let mut engine = FilterEngine::default();
        let (g, r) = game_and_replay("[Event \"?\"]\n\n1. e4 e5 *\n", &config);
        assert!(!engine.check(&g, &r, &config).accepted, "one move is too short");
        let (g, r) = game_and_replay("[Event \"?\"]\n\n1. e4 e5 2. Nf3 Nc6 *\n", &config);
        assert!(engine.check(&g, &r, &config).accepted);
    }

    #[test]
    fn test_stalemate_and_insufficient() {
        let config = Config {
            match_only_stalemate: true,
            ..Config::default()
        };
        let stale = "[Event \"?\"]\n[FEN \"7k/5Q2/6K1/8/8/8/8/8 b - - 0 1\"]\n\n*\n";
        let (g, r) = game_and_replay(stale, &config);
        let mut engine = FilterEngine::default();
        assert!(engine.check(&g, &r, &config).accepted);

        let config = Config {
            match_only_insufficient: true,
            ..Config::default()
        };
        let bare = "[Event \"?\"]\n[FEN \"7k/8/8/8/8/8/8/K7 w - - 0 1\"]\n\n*\n";
        let (g, r) = game_and_replay(bare, &config);
        assert!(engine.check(&g, &r, &config).accepted);
        let (g, r) = game_and_replay(stale, &config);
        assert!(!engine.check(&g, &r, &config).accepted);
    }

    #[test]
    fn test_repetition_filter() {
        let config = Config {
            check_for_repetition: 3,
            ..Config::default()
        };
        let shuffle = "[Event \"?\"]\n\n1. Nf3 Nf6 2. Ng1 Ng8 3. Nf3 Nf6 4. Ng1 Ng8 5. Nf3 Nf6 *\n";
        let (g, r) = game_and_replay(shuffle, &config);
        let mut engine = FilterEngine::default();
        assert!(engine.check(&g, &r, &config).accepted);

        let (g, r) = game_and_replay("[Event \"?\"]\n\n1. e4 e5 *\n", &config);
        assert!(!engine.check(&g, &r, &config).accepted);
    }

    #[test]
    fn test_n_move_rule() {
        let config = Config {
            check_for_n_move_rule: Some(100),
            ..Config::default()
        };
        let old = "[Event \"?\"]\n[FEN \"7k/8/8/8/8/8/R7/K7 w - - 99 80\"]\n\n1. Ra3 Kg8 *\n";
        let (g, r) = game_and_replay(old, &config);
        let mut engine = FilterEngine::default();
        assert!(engine.check(&g, &r, &config).accepted);
        let (g, r) = game_and_replay("[Event \"?\"]\n\n1. e4 e5 *\n", &config);
        assert!(!engine.check(&g, &r, &config).accepted);
    }

    #[test]
    fn test_underpromotion_filter() {
        let config = Config {
            match_underpromotion: true,
            ..Config::default()
        };
        let mut engine = FilterEngine::default();
        let under = "[Event \"?\"]\n[FEN \"7k/P7/8/8/8/8/8/7K w - - 0 1\"]\n\n1. a8=N+ *\n";
        let (g, r) = game_and_replay(under, &config);
        assert!(engine.check(&g, &r, &config).accepted);
        let queen = "[Event \"?\"]\n[FEN \"7k/P7/8/8/8/8/8/7K w - - 0 1\"]\n\n1. a8=Q+ *\n";
        let (g, r) = game_and_replay(queen, &config);
        assert!(!engine.check(&g, &r, &config).accepted);
    }

    #[test]
    fn test_commented_filter() {
        let config = Config {
            keep_only_commented_games: true,
            ..Config::default()
        };
        let mut engine = FilterEngine::default();
        let (g, r) = game_and_replay("[Event \"?\"]\n\n1. e4 {open} e5 *\n", &config);
        assert!(engine.check(&g, &r, &config).accepted);
        let (g, r) = game_and_replay("[Event \"?\"]\n\n1. e4 e5 *\n", &config);
        assert!(!engine.check(&g, &r, &config).accepted);
    }

    #[test]
    fn test_fen_pattern_filter_and_label() {
        let config = Config::default();
        let mut engine = FilterEngine::default();
        engine
            .fen_patterns
            .add_pattern("*k*/*/*/*/*/*/*/*K*R*", false, Some("white-rook"))
            .unwrap();
        let (g, r) = game_and_replay("[Event \"?\"]\n[FEN \"3k4/8/8/8/8/8/8/4K2R w - - 0 1\"]\n\n1. Rh8+ *\n", &config);
        let out = engine.check(&g, &r, &config);
        assert!(out.accepted);
        assert_eq!(out.match_label.as_deref(), Some("white-rook"));
    }

    #[test]
    fn test_position_match_records_ply() {
        let config = Config::default();
        let mut engine = FilterEngine::default();
        engine.position_matcher.add_variation_line("1. e4 c5").unwrap();
        let (g, r) = game_and_replay("[Event \"?\"]\n\n1. e4 c5 2. Nf3 *\n", &config);
        let out = engine.check(&g, &r, &config);
        assert!(out.accepted);
        assert_eq!(out.matched_ply, Some(2));

        let (g, r) = game_and_replay("[Event \"?\"]\n\n1. d4 d5 *\n", &config);
        assert!(!engine.check(&g, &r, &config).accepted);
    }
}
