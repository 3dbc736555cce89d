use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use pgnsift_base::infra::utils::{file_append, file_create, file_open};
use pgnsift_base::prelude::*;
use pgnsift_base::trace::logger::LoggingSystem;
use tracing::{debug, info, warn};

use crate::config::{in_ranges, Config, Counts, OutputFormat};
use crate::dedup::{DuplicateStore, Fingerprint};
use crate::eco::{self, EcoIndex};
use crate::filter::fenpattern::FenPatternMatcher;
use crate::filter::material::MaterialMatcher;
use crate::filter::position::build_position_matcher;
use crate::filter::tags::build_tag_matcher;
use crate::filter::varmatch::VariationMatcher;
use crate::filter::FilterEngine;
use crate::game::{Comment, Game};
use crate::interp::{interpret, Replay};
use crate::lexer::tokenize;
use crate::parser::Parser;
use crate::writer::{records, split::split_variations, write_pgn_game};

/// Criteria bodies gathered by the front end from files, the command
/// line and argsfiles.
#[derive(Clone, Debug, Default)]
pub struct Criteria {
    pub tag_lines:       Vec<String>,
    pub variation_lines: Vec<String>,
    pub position_lines:  Vec<String>,
    /// (line, both_colours)
    pub material_lines:  Vec<(String, bool)>,
    /// (pattern, add_reverse)
    pub fen_patterns:    Vec<(String, bool)>,
}

/// Everything that writes matched games, with count- and ECO-splitting
/// and the JSON bracketing that goes with each physical file.
struct OutputManager {
    format:         OutputFormat,
    json:           bool,
    mode:           SinkMode,
    games_in_sink:  usize,
}

enum SinkMode {
    Single(Box<dyn Write>),
    PerCount {
        games_per_file: usize,
        next_number:    usize,
        suffix:         &'static str,
        current:        Option<Box<dyn Write>>,
    },
    ByEco {
        level: u8,
    },
}

impl OutputManager {
    fn new(config: &Config) -> Result<OutputManager> {
        let mode = if let Some(level) = config.eco_level {
            SinkMode::ByEco { level }
        } else if config.games_per_file > 0 {
            SinkMode::PerCount {
                games_per_file: config.games_per_file,
                next_number:    config.next_file_number,
                suffix:         config.output_format.suffix(),
                current:        None,
            }
        } else {
            let sink: Box<dyn Write> = match &config.output_file {
                Some(path) if config.append_output => Box::new(file_append(path)?),
                Some(path) => Box::new(file_create(path)?),
                None => Box::new(std::io::stdout()),
            };
            SinkMode::Single(sink)
        };
        let mut manager = OutputManager {
            format: config.output_format,
            json: config.json_format,
            mode,
            games_in_sink: 0,
        };
        if manager.json {
            if let SinkMode::Single(sink) = &mut manager.mode {
                writeln!(sink, "[")?;
            }
        }
        Ok(manager)
    }

    fn write_game(&mut self, game: &Game, replay: &Replay, config: &Config) -> Result<()> {
        match &mut self.mode {
            SinkMode::Single(sink) => {
                emit_game(game, replay, sink.as_mut(), config, self.games_in_sink == 0)?;
                self.games_in_sink += 1;
            }
            SinkMode::PerCount {
                games_per_file,
                next_number,
                suffix,
                current,
            } => {
                if current.is_none() || self.games_in_sink >= *games_per_file {
                    if let Some(mut sink) = current.take() {
                        if self.json {
                            write!(sink, "\n]")?;
                        }
                        writeln!(sink)?;
                    }
                    let name = format!("{next_number}.{suffix}");
                    let mut sink: Box<dyn Write> = Box::new(file_create(&name)?);
                    *next_number += 1;
                    self.games_in_sink = 0;
                    if self.json {
                        writeln!(sink, "[")?;
                    }
                    *current = Some(sink);
                }
                let sink = current.as_mut().expect("sink just opened");
                emit_game(game, replay, sink.as_mut(), config, self.games_in_sink == 0)?;
                self.games_in_sink += 1;
            }
            SinkMode::ByEco { level } => {
                let code = game.tags.get("ECO").unwrap_or("NOECO");
                let short: String = code.chars().take(*level as usize).collect();
                let name = if short.is_empty() { "NOECO".to_string() } else { short };
                let mut sink = file_append(format!("{name}.pgn"))?;
                emit_game(game, replay, &mut sink, config, true)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.json {
            match &mut self.mode {
                SinkMode::Single(sink) => {
                    write!(sink, "\n]")?;
                    writeln!(sink)?;
                }
                SinkMode::PerCount { current, .. } => {
                    if let Some(sink) = current {
                        write!(sink, "\n]")?;
                        writeln!(sink)?;
                    }
                }
                SinkMode::ByEco { .. } => {}
            }
        }
        match &mut self.mode {
            SinkMode::Single(sink) => sink.flush()?,
            SinkMode::PerCount { current: Some(sink), .. } => sink.flush()?,
            _ => {}
        }
        Ok(())
    }
}

/// format dispatch for one accepted game
fn emit_game(game: &Game, replay: &Replay, sink: &mut dyn Write, config: &Config, first_in_file: bool) -> Result<()> {
    if config.json_format {
        return records::write_json_game(game, sink, config, first_in_file);
    }
    if config.tsv_format {
        return records::write_tsv_game(game, replay, sink, config);
    }
    match config.output_format {
        OutputFormat::Epd => records::write_epd_game(game, replay, sink, config),
        OutputFormat::Fen => records::write_fen_game(game, replay, sink, config),
        OutputFormat::Cm => records::write_cm_game(game, replay, sink, config),
        _ => write_pgn_game(game, replay, sink, config),
    }
}

pub fn build_filter_engine(config: &Config, criteria: &Criteria) -> Result<FilterEngine> {
    let mut engine = FilterEngine::default();
    engine.tag_matcher = build_tag_matcher(&criteria.tag_lines, config.use_soundex, config.tag_match_anywhere);

    engine.var_matcher = VariationMatcher::new(config.match_permutations);
    engine.var_matcher.add_lines(&criteria.variation_lines);

    engine.position_matcher = build_position_matcher(&criteria.position_lines, config.depth_of_positional_search);
    for hash in &config.position_match_hashes {
        engine.position_matcher.add_hash(*hash, 0);
    }

    let mut materials = MaterialMatcher::default();
    for (line, both) in &criteria.material_lines {
        if let Err(e) = materials.add_line(line, *both) {
            warn!("{e:#}");
        }
    }
    if config.stability_threshold > 0 {
        materials.set_default_move_depth(config.stability_threshold);
    }
    engine.material_matcher = materials;

    let mut patterns = FenPatternMatcher::default();
    for (pattern, reverse) in &criteria.fen_patterns {
        patterns.add_pattern(pattern, *reverse, None)?;
    }
    engine.fen_patterns = patterns;
    Ok(engine)
}

fn load_eco_index(config: &Config) -> Result<Option<EcoIndex>> {
    if !config.add_eco {
        return Ok(None);
    }
    let path = match &config.eco_file {
        Some(p) => p.clone(),
        None => PathBuf::from(
            std::env::var("ECO_FILE").map_err(|_| anyhow::anyhow!("-e given without a file and ECO_FILE is unset"))?,
        ),
    };
    Ok(Some(EcoIndex::load(path)?))
}

fn read_source(path: &Path) -> Result<String> {
    let mut src = String::new();
    file_open(path)?.read_to_string(&mut src)?;
    Ok(src)
}

fn wants_dedup(config: &Config) -> bool {
    config.suppress_duplicates
        || config.suppress_originals
        || config.duplicate_file.is_some()
        || !config.check_files.is_empty()
        || config.fuzzy_match_depth.is_some()
}

fn fingerprint_of(game: &Game, replay: &Replay, config: &Config) -> Option<Fingerprint> {
    // only fully interpreted games are fingerprinted
    if !game.moves_ok {
        return None;
    }
    Some(match config.fuzzy_match_depth {
        Some(depth) => Fingerprint {
            final_hash:      0,
            cumulative_hash: replay.cumulative_hash_at(depth),
            plycount:        0,
        },
        None => Fingerprint {
            final_hash:      game.final_hash,
            cumulative_hash: game.cumulative_hash,
            plycount:        game.plycount() as u32,
        },
    })
}

/// annotation tags and comments applied to a game once it is accepted
fn decorate(game: &mut Game, config: &Config, matched_ply: Option<usize>, label: Option<&str>) {
    if config.output_plycount {
        game.tags.set("PlyCount", &game.plycount().to_string());
    }
    if config.output_total_plycount {
        let total = game.plycount() + count_variation_plies(game);
        game.tags.set("TotalPlyCount", &total.to_string());
    }
    if config.add_hashcode_tag {
        game.tags.set("HashCode", &format!("{:x}", game.final_hash));
    }
    if config.fix_result_tags {
        game.tags.set("Result", &game.result.as_pgn());
    }
    if config.add_match_tag {
        if let Some(ply) = matched_ply {
            game.tags.set("MatchTag", &ply.to_string());
        }
    }
    if config.add_matchlabel_tag {
        if let Some(label) = label.filter(|l| !l.is_empty()) {
            game.tags.set("MatchLabel", label);
        }
    }
    if let (Some(marker), Some(ply)) = (&config.position_match_marker, matched_ply) {
        if ply >= 1 && ply <= game.moves.len() {
            game.moves[ply - 1].comments.push(Comment::parse(marker));
        }
    }
}

fn count_variation_plies(game: &Game) -> usize {
    fn in_var(var: &crate::game::Variation) -> usize {
        var.moves.len() + var.moves.iter().flat_map(|m| m.variations.iter()).map(in_var).sum::<usize>()
    }
    game.moves.iter().flat_map(|m| m.variations.iter()).map(in_var).sum()
}

/// The main pipeline: iterate source files, parse, interpret, filter and
/// route every game.
pub fn run(config: &Config, criteria: &Criteria) -> Result<Counts> {
    if let Some(log) = &config.log_file {
        LoggingSystem::instance()?.set_log_file(log, config.append_log)?;
    }

    let eco_index = load_eco_index(config)?;
    let mut engine = build_filter_engine(config, criteria)?;
    let mut counts = Counts::default();

    let mut dedup = if wants_dedup(config) {
        Some(if config.use_virtual_hash_table {
            DuplicateStore::on_disk()?
        } else {
            DuplicateStore::in_memory()
        })
    } else {
        None
    };

    // games listed in check files count as already seen
    if let Some(store) = &mut dedup {
        for path in &config.check_files {
            let src = read_source(path)?;
            let mut parser = Parser::new(tokenize(&src, config.allow_nested_comments));
            while let Some(mut game) = parser.next_game() {
                if let Ok(replay) = interpret(&mut game, config, None) {
                    if let Some(fp) = fingerprint_of(&game, &replay, config) {
                        store.check_and_insert(fp, &path.display().to_string())?;
                    }
                }
            }
        }
    }

    let mut output = OutputManager::new(config)?;
    let mut duplicate_sink: Option<Box<dyn Write>> = match &config.duplicate_file {
        Some(path) => Some(Box::new(file_create(path)?)),
        None => None,
    };
    let mut non_matching_sink: Option<Box<dyn Write>> = match &config.non_matching_file {
        Some(path) => Some(Box::new(file_create(path)?)),
        None => None,
    };

    let mut stop = false;
    for path in &config.source_files {
        if stop {
            break;
        }
        let src = match read_source(path) {
            Ok(src) => src,
            Err(e) => {
                warn!("{e:#}");
                continue;
            }
        };
        let mut file_games = 0usize;
        let mut file_matched = 0usize;
        let filename = path.display().to_string();
        let mut parser = Parser::new(tokenize(&src, config.allow_nested_comments));
        while let Some(mut game) = parser.next_game() {
            counts.num_games_processed += 1;
            file_games += 1;
            let game_number = counts.num_games_processed;

            if game_number < config.first_game {
                continue;
            }
            if game_number >= config.first_game.saturating_add(config.game_limit) {
                stop = true;
                break;
            }
            if !config.select_only.is_empty() && !in_ranges(&config.select_only, game_number) {
                continue;
            }

            if let Some(err) = &game.parse_error {
                LoggingSystem::instance()?.report(&format!("{filename}: malformed game: {err}"));
                if !config.keep_broken_games {
                    continue;
                }
            }
            if game.missing_result {
                LoggingSystem::instance()?.report(&format!(
                    "{filename}: game at line {} has no result",
                    game.start_line
                ));
            }

            let replay = match interpret(&mut game, config, eco_index.as_ref()) {
                Ok(replay) => replay,
                Err(e) => {
                    LoggingSystem::instance()?.report(&format!("{filename}: {e:#}"));
                    continue;
                }
            };
            if let Some(ply) = game.error_ply {
                LoggingSystem::instance()?.report(&format!(
                    "{filename}: game at line {}: illegal or unparseable move at ply {ply}",
                    game.start_line
                ));
            }

            if let Some(entry) = &replay.eco_entry {
                eco::stamp_game(&mut game, entry);
            }

            let outcome = engine.check(&game, &replay, config);
            let skip_forced = !config.skip_matching.is_empty() && in_ranges(&config.skip_matching, game_number);
            let mut accepted = outcome.accepted && !skip_forced;

            // duplicate policy
            if accepted {
                if let Some(store) = &mut dedup {
                    let first_seen = match fingerprint_of(&game, &replay, config) {
                        Some(fp) => store.check_and_insert(fp, &filename)?,
                        None => None,
                    };
                    match first_seen {
                        Some(original) => {
                            if let Some(sink) = &mut duplicate_sink {
                                let mut dup = game.clone();
                                dup.prefix_comment
                                    .insert(0, Comment::parse(&format!("First found in: {original}")));
                                emit_game(&dup, &replay, sink.as_mut(), config, false)?;
                            }
                            if config.suppress_duplicates || config.duplicate_file.is_some() {
                                accepted = false;
                            }
                        }
                        None => {
                            // with -U only the later copies are wanted
                            if config.suppress_originals {
                                accepted = false;
                            }
                        }
                    }
                }
            }

            if accepted {
                counts.num_games_matched += 1;
                file_matched += 1;
                if !config.check_only && !config.suppress_matched {
                    decorate(&mut game, config, outcome.matched_ply, outcome.match_label.as_deref());
                    output.write_game(&game, &replay, config)?;
                    if let Some(depth) = config.split_variants {
                        for mut split in split_variations(&game, depth) {
                            let split_replay = interpret(&mut split, config, None)?;
                            output.write_game(&split, &split_replay, config)?;
                        }
                    }
                }
                if let Some(max) = config.maximum_matches {
                    if counts.num_games_matched >= max {
                        stop = true;
                        break;
                    }
                }
            } else {
                counts.num_non_matching_games += 1;
                if let Some(sink) = &mut non_matching_sink {
                    if game.moves_ok || config.keep_broken_games {
                        emit_game(&game, &replay, sink.as_mut(), config, false)?;
                    }
                }
            }
        }
        if config.verbosity >= 2 {
            LoggingSystem::instance()?.report(&format!("{filename}: {file_games} games, {file_matched} matched"));
        }
    }

    output.finish()?;
    if let Some(sink) = &mut duplicate_sink {
        sink.flush()?;
    }
    if let Some(sink) = &mut non_matching_sink {
        sink.flush()?;
    }
    if config.verbosity >= 1 {
        info!(
            "{processed} games processed, {matched} matched",
            processed = counts.num_games_processed,
            matched = counts.num_games_matched
        );
    }
    debug!("final counts {counts:?}");
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("pgnsift-test-{}-{name}", std::process::id()));
        std::fs::write(&path, content).unwrap();
        path
    }

    fn run_capture(config: &mut Config, criteria: &Criteria, sources: &[(&str, &str)]) -> (Counts, String) {
        for (name, content) in sources {
            config.source_files.push(write_temp(name, content));
        }
        let out_path = std::env::temp_dir().join(format!(
            "pgnsift-test-out-{}-{}",
            std::process::id(),
            config.source_files[0].file_name().unwrap().to_string_lossy()
        ));
        config.output_file = Some(out_path.clone());
        let counts = run(config, criteria).unwrap();
        let text = std::fs::read_to_string(&out_path).unwrap_or_default();
        (counts, text)
    }

    const TWO_GAMES: &str = "[Event \"one\"]\n\n1. e4 e5 2. Nf3 Nc6 1-0\n\n[Event \"two\"]\n\n1. d4 d5 0-1\n";

    #[test]
    fn test_basic_run_counts_and_order() {
        let mut config = Config::default();
        let (counts, text) = run_capture(&mut config, &Criteria::default(), &[("basic.pgn", TWO_GAMES)]);
        assert_eq!(counts.num_games_processed, 2);
        assert_eq!(counts.num_games_matched, 2);
        let one = text.find("[Event \"one\"]").unwrap();
        let two = text.find("[Event \"two\"]").unwrap();
        assert!(one < two, "games emitted in input order");
    }

    #[test]
    fn test_tag_criteria_filtering() {
        let mut config = Config::default();
        let criteria = Criteria {
            tag_lines: vec!["Event one".to_string()],
            ..Criteria::default()
        };
        let (counts, text) = run_capture(&mut config, &criteria, &[("tagged.pgn", TWO_GAMES)]);
        assert_eq!(counts.num_games_matched, 1);
        assert!(text.contains("[Event \"one\"]"));
        assert!(!text.contains("[Event \"two\"]"));
    }

    #[test]
    fn test_duplicate_suppression() {
        let mut config = Config {
            suppress_duplicates: true,
            ..Config::default()
        };
        let game = "[Event \"a\"]\n\n1. e4 e5 2. Nf3 Nc6 1-0\n";
        let other_tags = "[Event \"b\"]\n[White \"someone\"]\n\n1. e4 e5 2. Nf3 Nc6 1-0\n";
        let (counts, text) = run_capture(
            &mut config,
            &Criteria::default(),
            &[("dup-a.pgn", game), ("dup-b.pgn", other_tags)],
        );
        assert_eq!(counts.num_games_processed, 2);
        assert_eq!(counts.num_games_matched, 1, "duplicate dropped despite differing tags");
        assert!(text.contains("[Event \"a\"]"));
        assert!(!text.contains("[Event \"b\"]"));
    }

    #[test]
    fn test_duplicate_file_names_original() {
        let dup_path = std::env::temp_dir().join(format!("pgnsift-test-dups-{}.pgn", std::process::id()));
        let mut config = Config {
            duplicate_file: Some(dup_path.clone()),
            ..Config::default()
        };
        let game = "[Event \"a\"]\n\n1. e4 e5 2. Nf3 Nc6 1-0\n";
        let (counts, _text) = run_capture(
            &mut config,
            &Criteria::default(),
            &[("orig.pgn", game), ("copy.pgn", game)],
        );
        assert_eq!(counts.num_games_matched, 1);
        let dups = std::fs::read_to_string(&dup_path).unwrap();
        assert!(dups.contains("First found in:"), "{dups}");
        assert!(dups.contains("orig.pgn"));
    }

    #[test]
    fn test_game_ranges() {
        let mut config = Config {
            first_game: 2,
            ..Config::default()
        };
        let (counts, text) = run_capture(&mut config, &Criteria::default(), &[("range.pgn", TWO_GAMES)]);
        assert_eq!(counts.num_games_processed, 2);
        assert_eq!(counts.num_games_matched, 1);
        assert!(text.contains("[Event \"two\"]"));
    }

    #[test]
    fn test_stop_after() {
        let mut config = Config {
            maximum_matches: Some(1),
            ..Config::default()
        };
        let (counts, text) = run_capture(&mut config, &Criteria::default(), &[("stop.pgn", TWO_GAMES)]);
        assert_eq!(counts.num_games_matched, 1);
        assert!(!text.contains("[Event \"two\"]"));
    }

    #[test]
    fn test_non_matching_sink() {
        let nm_path = std::env::temp_dir().join(format!("pgnsift-test-nm-{}.pgn", std::process::id()));
        let mut config = Config {
            non_matching_file: Some(nm_path.clone()),
            ..Config::default()
        };
        let criteria = Criteria {
            tag_lines: vec!["Event one".to_string()],
            ..Criteria::default()
        };
        run_capture(&mut config, &criteria, &[("nm.pgn", TWO_GAMES)]);
        let rejected = std::fs::read_to_string(&nm_path).unwrap();
        assert!(rejected.contains("[Event \"two\"]"));
        assert!(!rejected.contains("[Event \"one\"]"));
    }

    #[test]
    fn test_json_output_brackets() {
        let mut config = Config {
            json_format: true,
            ..Config::default()
        };
        let (_counts, text) = run_capture(&mut config, &Criteria::default(), &[("json.pgn", TWO_GAMES)]);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert!(text.ends_with("]\n"));
    }

    #[test]
    fn test_broken_game_skipped_and_kept() {
        let source = "[Event \"bad\"]\n\n1. e4 Ke2 *\n\n[Event \"ok\"]\n\n1. d4 d5 *\n";
        let mut config = Config::default();
        let (counts, text) = run_capture(&mut config, &Criteria::default(), &[("broken.pgn", source)]);
        assert_eq!(counts.num_games_matched, 1);
        assert!(!text.contains("[Event \"bad\"]"));

        let mut config = Config {
            keep_broken_games: true,
            ..Config::default()
        };
        let (counts, text) = run_capture(&mut config, &Criteria::default(), &[("broken2.pgn", source)]);
        assert_eq!(counts.num_games_matched, 2);
        assert!(text.contains("[Event \"bad\"]"));
    }

    #[test]
    fn test_eco_classification_end_to_end() {
        let eco_path = write_temp(
            "eco.pgn",
            "[ECO \"B90\"]\n[Opening \"Sicilian\"]\n[Variation \"Najdorf\"]\n\n1. e4 c5 2. Nf3 d6 3. d4 cxd4 4. Nxd4 Nf6 5. Nc3 a6 *\n",
        );
        let mut config = Config {
            add_eco: true,
            eco_file: Some(eco_path),
            ..Config::default()
        };
        let najdorf = "[Event \"sicilian\"]\n\n1. e4 c5 2. Nf3 d6 3. d4 cxd4 4. Nxd4 Nf6 5. Nc3 a6 *\n";
        let (_counts, text) = run_capture(&mut config, &Criteria::default(), &[("najdorf.pgn", najdorf)]);
        assert!(text.contains("[ECO \"B90\"]"), "{text}");
        assert!(text.contains("[Opening \"Sicilian\"]"));
        assert!(text.contains("[Variation \"Najdorf\"]"));
    }

    #[test]
    fn test_split_variants_emitted() {
        let mut config = Config {
            split_variants: Some(1),
            ..Config::default()
        };
        let source = "[Event \"rav\"]\n\n1. e4 (1. d4 d5) e5 1-0\n";
        let (_counts, text) = run_capture(&mut config, &Criteria::default(), &[("rav.pgn", source)]);
        assert!(text.contains("( 1. d4 d5 )"), "original keeps its variation");
        assert!(text.contains("1. d4 d5 *"), "split-out variant: {text}");
    }

    #[test]
    fn test_decorate_tags() {
        let mut config = Config {
            output_plycount: true,
            add_hashcode_tag: true,
            ..Config::default()
        };
        let (_counts, text) = run_capture(
            &mut config,
            &Criteria::default(),
            &[("decor.pgn", "[Event \"?\"]\n\n1. e4 e5 *\n")],
        );
        assert!(text.contains("[PlyCount \"2\"]"));
        assert!(text.contains("[HashCode \""));
    }
}
