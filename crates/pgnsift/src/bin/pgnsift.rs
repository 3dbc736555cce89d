use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pgnsift::argsfile::ArgsFile;
use pgnsift::config::{parse_ranges, Config, OutputFormat, SetupPolicy, TagOutputForm, WhoseMove};
use pgnsift::driver::{self, Criteria};
use pgnsift_base::infra::utils::read_file;
use pgnsift_base::trace::logger::LoggingSystem;
use tracing::{debug, error};

// -V belongs to the variation-suppression switch, so the automatic
// version short is disabled; --version remains available
#[derive(Parser, Debug, Clone, Default)]
#[command(
    author,
    version,
    about = "Search, filter and reformat PGN chess game collections",
    long_about = None,
    disable_version_flag = true
)]
struct Cli {
    /// Print version information
    #[arg(long, action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// PGN files to read
    #[arg(value_name = "FILE")]
    files: Vec<String>,

    // ---- filters ----
    /// File of tag criteria to match
    #[arg(short = 't', value_name = "FILE")]
    tag_files: Vec<String>,

    /// A single tag criterion, e.g. "WhiteElo >= 2700"
    #[arg(short = 'T', value_name = "CRITERION")]
    tag_criteria: Vec<String>,

    /// File of textual variations to match
    #[arg(short = 'v', value_name = "FILE")]
    variation_files: Vec<String>,

    /// File of positional variations or FENs to match
    #[arg(short = 'x', value_name = "FILE")]
    position_files: Vec<String>,

    /// File of material balances, colours interchangeable
    #[arg(short = 'y', value_name = "FILE")]
    material_either_files: Vec<String>,

    /// File of material balances, colours as given
    #[arg(short = 'z', value_name = "FILE")]
    material_files: Vec<String>,

    /// Match only games ending in checkmate
    #[arg(short = 'M')]
    checkmate: bool,

    /// Bound the number of moves: N, eN, lN (at most) or uN (at least)
    #[arg(short = 'b', value_name = "[elu]N")]
    move_bounds: Option<String>,

    /// Bound the number of plies, as for -b
    #[arg(short = 'p', value_name = "[elu]N")]
    ply_bounds: Option<String>,

    /// Match only games ending in stalemate
    #[arg(long)]
    stalemate: bool,

    /// Match only games ending with insufficient material
    #[arg(long)]
    insufficient: bool,

    /// Match games containing a threefold repetition
    #[arg(long)]
    repetition: bool,

    /// Match games containing a fivefold repetition
    #[arg(long = "repetition5")]
    repetition5: bool,

    /// Match games where the fifty-move rule could be claimed
    #[arg(long)]
    fifty: bool,

    /// Match games where the seventy-five-move rule applies
    #[arg(long)]
    seventyfive: bool,

    /// Match games reaching a position fitting this rank pattern
    #[arg(long, value_name = "PATTERN")]
    fenpattern: Vec<String>,

    /// As --fenpattern, additionally matching the colour-reversed form
    #[arg(long, value_name = "PATTERN")]
    fenpatterni: Vec<String>,

    /// Restrict position matches to black-to-move positions
    #[arg(long)]
    btm: bool,

    /// Restrict position matches to white-to-move positions
    #[arg(long)]
    wtm: bool,

    /// Match only games carrying comments
    #[arg(long)]
    commented: bool,

    /// Match only games containing an underpromotion
    #[arg(long)]
    underpromotion: bool,

    /// Match games reaching the position with this hex hash code
    #[arg(short = 'H', value_name = "HASH")]
    hashcodes: Vec<String>,

    /// Bound the ply depth searched for positional matches
    #[arg(long, value_name = "N")]
    matchdepth: Option<usize>,

    // ---- duplicates ----
    /// Write duplicate games to this file
    #[arg(short = 'd', value_name = "FILE")]
    duplicate_file: Option<String>,

    /// Suppress duplicate games
    #[arg(short = 'D')]
    suppress_duplicates: bool,

    /// Suppress the first occurrence of duplicated games
    #[arg(short = 'U')]
    suppress_originals: bool,

    /// Keep the duplicate table on disk rather than in memory
    #[arg(short = 'Z')]
    virtual_hash_table: bool,

    /// Treat games as duplicates when their first N plies agree
    #[arg(long, value_name = "N")]
    fuzzydepth: Option<usize>,

    /// Suppress games repeating an earlier FEN starting position
    #[arg(long)]
    deletesamesetup: bool,

    // ---- output shape ----
    /// Output format: san, lalg, halg, elalg, xlalg, xolalg, uci, epd, fen, cm
    #[arg(short = 'W', value_name = "FORMAT", num_args = 0..=1, default_missing_value = "san")]
    output_format: Option<String>,

    /// Maximum output line length, 0 disables wrapping
    #[arg(short = 'w', value_name = "N")]
    line_length: Option<usize>,

    /// Drop comments from output
    #[arg(short = 'C')]
    no_comments: bool,

    /// Drop NAGs from output
    #[arg(short = 'N')]
    no_nags: bool,

    /// Drop variations from output
    #[arg(short = 'V')]
    no_variations: bool,

    /// Emit only the Seven Tag Roster
    #[arg(short = '7')]
    seven_tag_roster: bool,

    /// Emit no tags at all
    #[arg(long)]
    notags: bool,

    /// File naming the tag output order
    #[arg(short = 'R', value_name = "FILE")]
    roster_file: Option<String>,

    /// Emit only tags named in the -R roster
    #[arg(long)]
    xroster: bool,

    /// Suppress the named tag
    #[arg(long, value_name = "TAG")]
    detag: Vec<String>,

    /// Add a PlyCount tag
    #[arg(long)]
    plycount: bool,

    /// Add a TotalPlyCount tag including variations
    #[arg(long)]
    totalplycount: bool,

    /// Emit games as JSON
    #[arg(long)]
    json: bool,

    /// Emit one tab-separated line per game
    #[arg(long)]
    tsv: bool,

    /// Comment each move with the resulting FEN
    #[arg(long)]
    fencomments: bool,

    /// Comment each move with the resulting position hash
    #[arg(long)]
    hashcomments: bool,

    /// Comment each move with a material evaluation
    #[arg(long)]
    evaluation: bool,

    /// Add a HashCode tag with the final position hash
    #[arg(long)]
    addhashcode: bool,

    /// Add a MatchTag naming the matched ply
    #[arg(long)]
    addmatchtag: bool,

    /// Add a MatchLabel tag from the matched FEN pattern
    #[arg(long)]
    addlabeltag: bool,

    /// Mark the matched position with this comment
    #[arg(long, value_name = "MARKER")]
    markmatches: Option<String>,

    /// Prefix each game with MARKER and its source line numbers
    #[arg(long, value_name = "MARKER")]
    linenumbers: Option<String>,

    /// Promote variations (to DEPTH) into separate games
    #[arg(long, value_name = "DEPTH", num_args = 0..=1, default_missing_value = "1")]
    separatevariants: Option<usize>,

    /// Emit at most N plies of each game
    #[arg(long, value_name = "N")]
    plylimit: Option<usize>,

    /// Start output at ply N
    #[arg(long, value_name = "N")]
    startply: Option<usize>,

    /// Drop the first N plies (negative keeps the last N)
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    dropply: Option<i32>,

    /// Plies a material balance must hold to count as stable
    #[arg(long, value_name = "N")]
    stable: Option<u32>,

    /// Suppress move numbers in output
    #[arg(long)]
    nomovenumbers: bool,

    /// Suppress terminating results in output
    #[arg(long)]
    noresults: bool,

    /// Suppress check indicators in output
    #[arg(long)]
    nochecks: bool,

    /// Reject games with missing or inconsistent results
    #[arg(long)]
    nobadresults: bool,

    /// Rewrite Result tags to match the game's real result
    #[arg(long)]
    fixresulttags: bool,

    /// Count matches without writing them
    #[arg(long)]
    suppressmatched: bool,

    /// Accept balanced nested brace comments
    #[arg(long)]
    nestedcomments: bool,

    /// Accept null moves in the main line
    #[arg(long)]
    allownullmoves: bool,

    /// Keep games whose moves could not be interpreted
    #[arg(long)]
    keepbroken: bool,

    /// Reject games that start from a set-up position
    #[arg(long)]
    nosetuptags: bool,

    /// Match only games that start from a set-up position
    #[arg(long)]
    onlysetuptags: bool,

    /// Drop en passant markers that permit no actual capture
    #[arg(long)]
    nofauxep: bool,

    /// Match tag values as substrings
    #[arg(long)]
    tagsubstr: bool,

    /// Match textual variations positionally, not as permutations
    #[arg(short = 'P')]
    no_permutations: bool,

    /// Compare player names by soundex
    #[arg(short = 'S')]
    soundex: bool,

    /// Check the input and report, writing nothing
    #[arg(short = 'r')]
    check_only: bool,

    /// Report only the final game counts
    #[arg(short = 's', long = "quiet")]
    quiet: bool,

    // ---- ECO ----
    /// Classify openings using this ECO file (default $ECO_FILE)
    #[arg(short = 'e', value_name = "FILE", num_args = 0..=1, default_missing_value = "")]
    eco_file: Option<String>,

    /// Split output by ECO code to this many letters (1-3)
    #[arg(short = 'E', value_name = "LEVEL", num_args = 0..=1, default_missing_value = "1")]
    eco_level: Option<u8>,

    // ---- files ----
    /// Write matched games to this file
    #[arg(short = 'o', value_name = "FILE")]
    output_file: Option<String>,

    /// Append matched games to this file
    #[arg(short = 'a', value_name = "FILE")]
    append_file: Option<String>,

    /// File of games already known; duplicates of them are suppressed
    #[arg(short = 'c', value_name = "FILE")]
    check_files: Vec<String>,

    /// File listing source PGN files
    #[arg(short = 'f', value_name = "FILE")]
    file_of_files: Vec<String>,

    /// Write non-matching games to this file
    #[arg(short = 'n', value_name = "FILE")]
    non_matching_file: Option<String>,

    /// Write the log to this file
    #[arg(short = 'l', value_name = "FILE")]
    log_file: Option<String>,

    /// Append the log to this file
    #[arg(short = 'L', value_name = "FILE")]
    append_log_file: Option<String>,

    /// Read further arguments from this argsfile
    #[arg(short = 'A', value_name = "FILE")]
    argsfiles: Vec<String>,

    /// Write N games per numbered file, starting at M
    #[arg(long = "gamesperfile", value_name = "N[,M]")]
    games_per_file: Option<String>,

    // ---- ranges ----
    /// First game number to process
    #[arg(long, value_name = "N")]
    firstgame: Option<usize>,

    /// Process at most N games
    #[arg(long, value_name = "N")]
    gamelimit: Option<usize>,

    /// Stop after N matches
    #[arg(long, value_name = "N")]
    stopafter: Option<usize>,

    /// Only consider games in these ranges, e.g. 1:100,150
    #[arg(long, value_name = "RANGES")]
    selectonly: Option<String>,

    /// Treat games in these ranges as non-matching
    #[arg(long, value_name = "RANGES")]
    skipmatching: Option<String>,
}

/// `-# N[,M]` predates long options; rewrite it before clap sees it
fn normalise_args(args: Vec<String>) -> Vec<String> {
    args.into_iter()
        .map(|a| match a.strip_prefix("-#") {
            Some(rest) if !rest.is_empty() => format!("--gamesperfile={rest}"),
            Some(_) => "--gamesperfile".to_string(),
            None => a,
        })
        .collect()
}

/// pull `-A` argsfiles into the argument list before parsing
fn expand_argsfiles(args: Vec<String>) -> Result<(Vec<String>, ArgsFile)> {
    let mut merged = ArgsFile::default();
    let mut out = vec![];
    let mut iter = args.into_iter().peekable();
    while let Some(arg) = iter.next() {
        let file = if arg == "-A" {
            iter.next()
        } else {
            arg.strip_prefix("-A").map(str::to_string)
        };
        match (arg.starts_with("-A"), file) {
            (true, Some(file)) if !file.is_empty() => {
                let parsed = ArgsFile::read(&file).with_context(|| format!("argsfile '{file}'"))?;
                out.extend(parsed.argv.clone());
                merged.merge(parsed);
            }
            (true, _) => bail!("-A requires a file name"),
            _ => out.push(arg),
        }
    }
    Ok((normalise_args(out), merged))
}

/// `eN` exactly, `lN` at most, `uN` at least, bare `N` exactly
fn parse_bounds(spec: &str) -> Result<(Option<usize>, Option<usize>)> {
    let (kind, digits) = match spec.chars().next() {
        Some(k @ ('e' | 'l' | 'u')) => (k, &spec[1..]),
        _ => ('e', spec),
    };
    let n: usize = digits.parse().with_context(|| format!("bound '{spec}'"))?;
    Ok(match kind {
        'l' => (None, Some(n)),
        'u' => (Some(n), None),
        _ => (Some(n), Some(n)),
    })
}

fn build_config(cli: &Cli, extra: &ArgsFile) -> Result<(Config, Criteria)> {
    let mut config = Config::default();
    let mut criteria = Criteria::default();

    // sources: positional, argsfile and -f lists
    config.source_files = cli.files.iter().map(PathBuf::from).collect();
    config.source_files.extend(extra.source_files.iter().map(PathBuf::from));
    for list in &cli.file_of_files {
        for line in read_file(list)? {
            let line = line.trim();
            if !line.is_empty() {
                config.source_files.push(PathBuf::from(line));
            }
        }
    }

    // criteria bodies
    for file in &cli.tag_files {
        criteria.tag_lines.extend(read_file(file)?);
    }
    criteria.tag_lines.extend(cli.tag_criteria.iter().cloned());
    criteria.tag_lines.extend(extra.tag_lines.iter().cloned());
    for file in &cli.variation_files {
        criteria.variation_lines.extend(read_file(file)?);
    }
    criteria.variation_lines.extend(extra.variation_lines.iter().cloned());
    for file in &cli.position_files {
        criteria.position_lines.extend(read_file(file)?);
    }
    criteria.position_lines.extend(extra.position_lines.iter().cloned());
    for file in &cli.material_either_files {
        criteria
            .material_lines
            .extend(read_file(file)?.into_iter().map(|l| (l, true)));
    }
    for file in &cli.material_files {
        criteria
            .material_lines
            .extend(read_file(file)?.into_iter().map(|l| (l, false)));
    }
    criteria.material_lines.extend(extra.material_lines.iter().cloned());
    criteria
        .fen_patterns
        .extend(cli.fenpattern.iter().map(|p| (p.clone(), false)));
    criteria
        .fen_patterns
        .extend(cli.fenpatterni.iter().map(|p| (p.clone(), true)));

    // filters
    config.match_only_checkmate = cli.checkmate;
    config.match_only_stalemate = cli.stalemate;
    config.match_only_insufficient = cli.insufficient;
    config.match_underpromotion = cli.underpromotion;
    config.keep_only_commented_games = cli.commented;
    if cli.repetition {
        config.check_for_repetition = 3;
    }
    if cli.repetition5 {
        config.check_for_repetition = 5;
    }
    if cli.fifty {
        config.check_for_n_move_rule = Some(100);
    }
    if cli.seventyfive {
        config.check_for_n_move_rule = Some(150);
    }
    if let Some(spec) = &cli.move_bounds {
        let (lower, upper) = parse_bounds(spec)?;
        if let Some(l) = lower {
            config.lower_move_bound = l;
        }
        if let Some(u) = upper {
            config.upper_move_bound = u;
        }
    }
    if let Some(spec) = &cli.ply_bounds {
        let (lower, upper) = parse_bounds(spec)?;
        if let Some(l) = lower {
            config.lower_ply_bound = l;
        }
        if let Some(u) = upper {
            config.upper_ply_bound = u;
        }
    }
    config.whose_move = match (cli.wtm, cli.btm) {
        (true, false) => WhoseMove::WhiteToMove,
        (false, true) => WhoseMove::BlackToMove,
        (false, false) => WhoseMove::Either,
        (true, true) => bail!("--wtm conflicts with --btm"),
    };
    for hex in &cli.hashcodes {
        let hash = u64::from_str_radix(hex.trim_start_matches("0x"), 16)
            .with_context(|| format!("hash value '{hex}'"))?;
        config.position_match_hashes.push(hash);
    }
    if let Some(depth) = cli.matchdepth {
        config.depth_of_positional_search = depth;
    }
    config.setup_policy = match (cli.nosetuptags, cli.onlysetuptags) {
        (true, false) => SetupPolicy::NoSetupTags,
        (false, true) => SetupPolicy::OnlySetupTags,
        (false, false) => SetupPolicy::SetupTagOk,
        (true, true) => bail!("--nosetuptags conflicts with --onlysetuptags"),
    };
    config.use_soundex = cli.soundex;
    config.tag_match_anywhere = cli.tagsubstr;
    config.match_permutations = !cli.no_permutations;
    if let Some(stable) = cli.stable {
        config.stability_threshold = stable;
    }

    // duplicates
    config.duplicate_file = cli.duplicate_file.as_ref().map(PathBuf::from);
    config.suppress_duplicates = cli.suppress_duplicates;
    config.suppress_originals = cli.suppress_originals;
    config.use_virtual_hash_table = cli.virtual_hash_table;
    config.fuzzy_match_depth = cli.fuzzydepth;
    config.delete_same_setup = cli.deletesamesetup;
    config.check_files = cli.check_files.iter().map(PathBuf::from).collect();

    // output
    if let Some(format) = &cli.output_format {
        config.output_format = OutputFormat::parse(format)?;
    }
    if let Some(width) = cli.line_length {
        config.max_line_length = width;
    }
    config.keep_comments = !cli.no_comments;
    config.keep_nags = !cli.no_nags;
    config.keep_variations = !cli.no_variations;
    config.keep_move_numbers = !cli.nomovenumbers;
    config.keep_results = !cli.noresults;
    config.keep_checks = !cli.nochecks;
    config.tag_output_form = match (cli.seven_tag_roster, cli.notags) {
        (_, true) => TagOutputForm::NoTags,
        (true, false) => TagOutputForm::SevenTagRoster,
        (false, false) => TagOutputForm::AllTags,
    };
    if let Some(file) = &cli.roster_file {
        let order: Vec<String> = read_file(file)?
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        config.tag_roster_order = Some(order);
    }
    config.only_wanted_tags = cli.xroster;
    config.detag = cli.detag.clone();
    config.output_plycount = cli.plycount;
    config.output_total_plycount = cli.totalplycount;
    config.json_format = cli.json;
    config.tsv_format = cli.tsv;
    config.add_fen_comments = cli.fencomments;
    config.add_hashcode_comments = cli.hashcomments;
    config.output_evaluation = cli.evaluation;
    config.add_hashcode_tag = cli.addhashcode;
    config.add_match_tag = cli.addmatchtag;
    config.add_matchlabel_tag = cli.addlabeltag;
    config.position_match_marker = cli.markmatches.clone();
    config.add_position_match_comments = cli.markmatches.is_some();
    config.line_number_marker = cli.linenumbers.clone();
    config.split_variants = cli.separatevariants;
    config.output_ply_limit = cli.plylimit;
    if let Some(start) = cli.startply {
        anyhow::ensure!(start >= 1, "--startply is 1-based");
        config.start_ply = start;
    }
    config.drop_ply_number = cli.dropply.unwrap_or(0);
    config.fix_result_tags = cli.fixresulttags;
    config.suppress_matched = cli.suppressmatched;
    config.reject_inconsistent_results = cli.nobadresults;
    config.allow_nested_comments = cli.nestedcomments;
    config.allow_null_moves = cli.allownullmoves;
    config.keep_broken_games = cli.keepbroken;
    config.suppress_redundant_ep_info = cli.nofauxep;
    config.check_only = cli.check_only;
    if cli.quiet {
        config.verbosity = 1;
    }

    // ECO
    if let Some(file) = &cli.eco_file {
        config.add_eco = true;
        if !file.is_empty() {
            config.eco_file = Some(PathBuf::from(file));
        }
    }
    if let Some(level) = cli.eco_level {
        anyhow::ensure!((1..=3).contains(&level), "-E level must be 1, 2 or 3");
        config.eco_level = Some(level);
        if !config.add_eco {
            config.add_eco = true;
        }
    }

    // plain files
    match (&cli.output_file, &cli.append_file) {
        (Some(_), Some(_)) => bail!("-o conflicts with -a"),
        (Some(o), None) => config.output_file = Some(PathBuf::from(o)),
        (None, Some(a)) => {
            config.output_file = Some(PathBuf::from(a));
            config.append_output = true;
        }
        (None, None) => {}
    }
    config.non_matching_file = cli.non_matching_file.as_ref().map(PathBuf::from);
    match (&cli.log_file, &cli.append_log_file) {
        (Some(_), Some(_)) => bail!("-l conflicts with -L"),
        (Some(l), None) => config.log_file = Some(PathBuf::from(l)),
        (None, Some(l)) => {
            config.log_file = Some(PathBuf::from(l));
            config.append_log = true;
        }
        (None, None) => {}
    }
    if let Some(spec) = &cli.games_per_file {
        let (n, m) = match spec.split_once(',') {
            Some((n, m)) => (n.parse()?, m.parse()?),
            None => (spec.parse()?, 1),
        };
        anyhow::ensure!(n > 0, "-# needs at least one game per file");
        config.games_per_file = n;
        config.next_file_number = m;
    }

    // ranges
    if let Some(n) = cli.firstgame {
        anyhow::ensure!(n >= 1, "--firstgame is 1-based");
        config.first_game = n;
    }
    if let Some(n) = cli.gamelimit {
        config.game_limit = n;
    }
    config.maximum_matches = cli.stopafter;
    if let Some(ranges) = &cli.selectonly {
        config.select_only = parse_ranges(ranges)?;
    }
    if let Some(ranges) = &cli.skipmatching {
        config.skip_matching = parse_ranges(ranges)?;
    }

    config.reconcile();
    if config.source_files.is_empty() {
        bail!("no input files given");
    }
    Ok((config, criteria))
}

fn main() {
    if let Err(e) = try_main() {
        error!("{e:#}");
        eprintln!("pgnsift: {e:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    LoggingSystem::init()?;
    let args: Vec<String> = std::env::args().collect();
    let (argv, extra) = expand_argsfiles(args)?;
    let cli = Cli::parse_from(argv);
    debug!("command line {cli:?}");
    let (config, criteria) = build_config(&cli, &extra)?;
    driver::run(&config, &criteria)?;
    Ok(())
}
