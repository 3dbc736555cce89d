use std::path::PathBuf;

use pgnsift_base::prelude::*;

/// Move-text output formats.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// source movetext untouched apart from normalisation
    #[default]
    San,
    /// long algebraic: from-square and to-square
    Lalg,
    /// hyphenated long algebraic
    Halg,
    /// long algebraic with a piece-letter prefix
    Elalg,
    /// enhanced long algebraic with '-'/'x' markers
    Xlalg,
    /// as Xlalg but castling stays O-O/O-O-O
    Xolalg,
    Uci,
    Epd,
    Fen,
    /// legacy Chess Master column format
    Cm,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<OutputFormat> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "san" | "pgn" | "" => OutputFormat::San,
            "lalg" => OutputFormat::Lalg,
            "halg" => OutputFormat::Halg,
            "elalg" => OutputFormat::Elalg,
            "xlalg" => OutputFormat::Xlalg,
            "xolalg" => OutputFormat::Xolalg,
            "uci" => OutputFormat::Uci,
            "epd" => OutputFormat::Epd,
            "fen" => OutputFormat::Fen,
            "cm" => OutputFormat::Cm,
            _ => anyhow::bail!("unknown output format '{s}'"),
        })
    }

    pub fn suffix(self) -> &'static str {
        match self {
            OutputFormat::Epd => "epd",
            OutputFormat::Fen => "fen",
            OutputFormat::Cm => "cm",
            _ => "pgn",
        }
    }

    /// formats emitting one record per ply rather than movetext
    pub fn is_per_ply(self) -> bool {
        matches!(self, OutputFormat::Epd | OutputFormat::Fen)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TagOutputForm {
    #[default]
    AllTags,
    SevenTagRoster,
    NoTags,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SetupPolicy {
    #[default]
    SetupTagOk,
    NoSetupTags,
    OnlySetupTags,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum WhoseMove {
    #[default]
    Either,
    WhiteToMove,
    BlackToMove,
}

pub const DEFAULT_MAX_LINE_LENGTH: usize = 75;

/// The shared configuration record: every command line switch lands in
/// exactly one field here. Built once by the CLI/argsfile front end and
/// read-only during the main loop.
#[derive(Clone, Debug)]
pub struct Config {
    // source and sink files
    pub source_files:       Vec<PathBuf>,
    pub output_file:        Option<PathBuf>,
    pub append_output:      bool,
    pub check_files:        Vec<PathBuf>,
    pub non_matching_file:  Option<PathBuf>,
    pub duplicate_file:     Option<PathBuf>,
    pub log_file:           Option<PathBuf>,
    pub append_log:         bool,
    pub games_per_file:     usize,
    pub next_file_number:   usize,

    // duplicate handling
    pub suppress_duplicates:    bool,
    pub suppress_originals:     bool,
    pub use_virtual_hash_table: bool,
    pub fuzzy_match_depth:      Option<usize>,
    pub delete_same_setup:      bool,

    // output shape
    pub output_format:       OutputFormat,
    pub max_line_length:     usize,
    pub keep_nags:           bool,
    pub keep_comments:       bool,
    pub keep_variations:     bool,
    pub keep_move_numbers:   bool,
    pub keep_results:        bool,
    pub keep_checks:         bool,
    pub tag_output_form:     TagOutputForm,
    pub tag_roster_order:    Option<Vec<String>>,
    pub only_wanted_tags:    bool,
    pub detag:               Vec<String>,
    pub output_plycount:     bool,
    pub output_total_plycount: bool,
    pub json_format:         bool,
    pub tsv_format:          bool,
    pub add_fen_comments:    bool,
    pub add_hashcode_comments: bool,
    pub output_evaluation:   bool,
    pub add_hashcode_tag:    bool,
    pub add_match_tag:       bool,
    pub add_matchlabel_tag:  bool,
    pub add_position_match_comments: bool,
    pub position_match_marker: Option<String>,
    pub line_number_marker:  Option<String>,
    pub split_variants:      Option<usize>,
    pub output_ply_limit:    Option<usize>,
    pub start_ply:           usize,
    pub drop_ply_number:     i32,
    pub fix_result_tags:     bool,
    pub suppress_matched:    bool,

    // tolerances
    pub keep_broken_games:          bool,
    pub suppress_redundant_ep_info: bool,
    pub allow_null_moves:           bool,
    pub allow_nested_comments:      bool,
    pub reject_inconsistent_results: bool,
    pub check_only:                 bool,
    pub verbosity:                  u8,

    // match criteria
    pub match_only_checkmate:    bool,
    pub match_only_stalemate:    bool,
    pub match_only_insufficient: bool,
    pub match_underpromotion:    bool,
    pub keep_only_commented_games: bool,
    /// repetition count that must be reached (3 or 5), 0 for off
    pub check_for_repetition:    u32,
    /// halfmove-clock threshold in plies (100 for fifty, 150 for seventyfive)
    pub check_for_n_move_rule:   Option<u32>,
    pub lower_move_bound:        usize,
    pub upper_move_bound:        usize,
    pub lower_ply_bound:         usize,
    pub upper_ply_bound:         usize,
    pub whose_move:              WhoseMove,
    pub setup_policy:            SetupPolicy,
    pub use_soundex:             bool,
    pub tag_match_anywhere:      bool,
    pub match_permutations:      bool,
    pub depth_of_positional_search: usize,
    pub stability_threshold:     u32,
    pub position_match_hashes:   Vec<Hash>,

    // game ranges
    pub first_game:      usize,
    pub game_limit:      usize,
    pub maximum_matches: Option<usize>,
    pub select_only:     Vec<(usize, usize)>,
    pub skip_matching:   Vec<(usize, usize)>,

    // ECO classification
    pub add_eco:   bool,
    pub eco_file:  Option<PathBuf>,
    pub eco_level: Option<u8>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_files:       vec![],
            output_file:        None,
            append_output:      false,
            check_files:        vec![],
            non_matching_file:  None,
            duplicate_file:     None,
            log_file:           None,
            append_log:         false,
            games_per_file:     0,
            next_file_number:   1,

            suppress_duplicates:    false,
            suppress_originals:     false,
            use_virtual_hash_table: false,
            fuzzy_match_depth:      None,
            delete_same_setup:      false,

            output_format:       OutputFormat::San,
            max_line_length:     DEFAULT_MAX_LINE_LENGTH,
            keep_nags:           true,
            keep_comments:       true,
            keep_variations:     true,
            keep_move_numbers:   true,
            keep_results:        true,
            keep_checks:         true,
            tag_output_form:     TagOutputForm::AllTags,
            tag_roster_order:    None,
            only_wanted_tags:    false,
            detag:               vec![],
            output_plycount:     false,
            output_total_plycount: false,
            json_format:         false,
            tsv_format:          false,
            add_fen_comments:    false,
            add_hashcode_comments: false,
            output_evaluation:   false,
            add_hashcode_tag:    false,
            add_match_tag:       false,
            add_matchlabel_tag:  false,
            add_position_match_comments: false,
            position_match_marker: None,
            line_number_marker:  None,
            split_variants:      None,
            output_ply_limit:    None,
            start_ply:           1,
            drop_ply_number:     0,
            fix_result_tags:     false,
            suppress_matched:    false,

            keep_broken_games:          false,
            suppress_redundant_ep_info: false,
            allow_null_moves:           false,
            allow_nested_comments:      false,
            reject_inconsistent_results: false,
            check_only:                 false,
            verbosity:                  2,

            match_only_checkmate:    false,
            match_only_stalemate:    false,
            match_only_insufficient: false,
            match_underpromotion:    false,
            keep_only_commented_games: false,
            check_for_repetition:    0,
            check_for_n_move_rule:   None,
            lower_move_bound:        0,
            upper_move_bound:        10_000,
            lower_ply_bound:         0,
            upper_ply_bound:         20_000,
            whose_move:              WhoseMove::Either,
            setup_policy:            SetupPolicy::SetupTagOk,
            use_soundex:             false,
            tag_match_anywhere:      false,
            match_permutations:      true,
            depth_of_positional_search: 0,
            stability_threshold:     0,
            position_match_hashes:   vec![],

            first_game:      1,
            game_limit:      usize::MAX,
            maximum_matches: None,
            select_only:     vec![],
            skip_matching:   vec![],

            add_eco:   false,
            eco_file:  None,
            eco_level: None,
        }
    }
}

impl Config {
    /// `--json` yields to the formats that cannot carry it, per the
    /// original's precedence
    pub fn reconcile(&mut self) {
        if self.json_format
            && (self.tsv_format
                || self.eco_level.is_some()
                || matches!(self.output_format, OutputFormat::Epd | OutputFormat::Cm))
        {
            tracing::warn!("--json is not available with EPD/CM output, -E or --tsv, disabled");
            self.json_format = false;
        }
        if self.suppress_duplicates && self.duplicate_file.is_some() {
            tracing::warn!("-D ignored because -d names a duplicates file");
            self.suppress_duplicates = false;
        }
    }

    pub fn wants_fen_per_ply(&self) -> bool {
        self.add_fen_comments
            || self.output_format.is_per_ply()
            || self.json_format && self.add_fen_comments
    }
}

/// Monotone counters, kept apart from the read-only configuration.
#[derive(Clone, Debug, Default)]
pub struct Counts {
    pub num_games_processed:    usize,
    pub num_games_matched:      usize,
    pub num_non_matching_games: usize,
}

/// A game-number range "N" or "N:M".
pub fn parse_ranges(s: &str) -> Result<Vec<(usize, usize)>> {
    let mut ranges = vec![];
    for part in s.split(',') {
        let (lo, hi) = match part.split_once(':') {
            Some((lo, hi)) => (lo.parse()?, hi.parse()?),
            None => {
                let n = part.parse()?;
                (n, n)
            }
        };
        if lo == 0 || hi < lo {
            anyhow::bail!("range '{part}' must be ascending and 1-based");
        }
        if let Some(&(_, prev_hi)) = ranges.last() {
            if lo <= prev_hi {
                anyhow::bail!("ranges '{s}' must be ascending and non-overlapping");
            }
        }
        ranges.push((lo, hi));
    }
    Ok(ranges)
}

pub fn in_ranges(ranges: &[(usize, usize)], n: usize) -> bool {
    ranges.iter().any(|&(lo, hi)| n >= lo && n <= hi)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_output_format() {
        assert_eq!(OutputFormat::parse("san").unwrap(), OutputFormat::San);
        assert_eq!(OutputFormat::parse("UCI").unwrap(), OutputFormat::Uci);
        assert_eq!(OutputFormat::parse("xolalg").unwrap(), OutputFormat::Xolalg);
        assert!(OutputFormat::parse("nonsense").is_err());
        assert_eq!(OutputFormat::Epd.suffix(), "epd");
        assert_eq!(OutputFormat::San.suffix(), "pgn");
        assert!(OutputFormat::Fen.is_per_ply());
    }

    #[test]
    fn test_json_precedence() {
        let mut c = Config {
            json_format: true,
            output_format: OutputFormat::Epd,
            ..Config::default()
        };
        c.reconcile();
        assert!(!c.json_format);

        let mut c = Config {
            json_format: true,
            tsv_format: true,
            ..Config::default()
        };
        c.reconcile();
        assert!(!c.json_format);

        let mut c = Config {
            json_format: true,
            ..Config::default()
        };
        c.reconcile();
        assert!(c.json_format);
    }

    #[test]
    fn test_parse_ranges() {
        assert_eq!(parse_ranges("3").unwrap(), vec![(3, 3)]);
        assert_eq!(parse_ranges("1:4,8,10:12").unwrap(), vec![(1, 4), (8, 8), (10, 12)]);
        assert!(parse_ranges("4:2").is_err());
        assert!(parse_ranges("1:4,3:9").is_err(), "overlap rejected");
        assert!(parse_ranges("0:2").is_err(), "ranges are 1-based");
        assert!(in_ranges(&parse_ranges("1:4,8").unwrap(), 8));
        assert!(!in_ranges(&parse_ranges("1:4,8").unwrap(), 5));
    }
}
