use pgnsift_base::prelude::*;
use tracing::{debug, warn};

use crate::config::Config;
use crate::eco::{EcoEntry, EcoIndex};
use crate::game::{CheckStatus, Game, MoveClass, Variation};

/// Everything the replay of a game's main line yielded, kept beside the
/// Game for the filter engine and the writer. Dropped with the game.
#[derive(Clone, Debug, Default)]
pub struct Replay {
    pub start:              Board,
    /// board after each main-line ply
    pub boards:             Vec<Board>,
    pub underpromotion:     bool,
    pub max_halfmove_clock: i32,
    pub eco_entry:          Option<EcoEntry>,
}

impl Replay {
    pub fn final_board(&self) -> &Board {
        self.boards.last().unwrap_or(&self.start)
    }

    pub fn board_after(&self, ply: usize) -> &Board {
        if ply == 0 {
            &self.start
        } else {
            &self.boards[ply - 1]
        }
    }

    /// cumulative hash over the first n plies, for fuzzy duplicate matching
    pub fn cumulative_hash_at(&self, n: usize) -> Hash {
        self.boards.iter().take(n).fold(0, |acc, b| acc ^ b.hash())
    }
}

/// Replay the game's moves from its starting position, disambiguating
/// SAN, classifying each move and filling per-ply state. Failure to
/// interpret marks the game rather than erroring: the game's `error_ply`
/// holds the first bad ply.
pub fn interpret(game: &mut Game, config: &Config, eco: Option<&EcoIndex>) -> Result<Replay> {
    normalise_setup_tags(game);

    let mut start = game.starting_board()?;
    detect_chess960(game, &mut start);

    let mut replay = Replay {
        start: start.clone(),
        ..Replay::default()
    };

    let mut board = start;
    game.moves_ok = true;
    game.moves_checked = true;
    game.error_ply = None;
    game.cumulative_hash = 0;
    game.position_counts.clear();

    let num_moves = game.moves.len();
    for i in 0..num_moves {
        let ply = i as Ply + 1;
        let node = &mut game.moves[i];

        let mv = if node.is_null() {
            if !config.allow_null_moves {
                warn!(
                    "game at line {}: null move at ply {ply} without --allownullmoves",
                    game.start_line
                );
                node.class = MoveClass::Unknown;
                game.moves_ok = false;
                game.error_ply = Some(ply);
                break;
            }
            Move::new_null()
        } else {
            match board.parse_san_move(&node.san) {
                Ok(mv) => mv,
                Err(e) => {
                    warn!("game at line {}: ply {ply}: {e:#}", game.start_line);
                    node.class = MoveClass::Unknown;
                    game.moves_ok = false;
                    game.error_ply = Some(ply);
                    break;
                }
            }
        };

        node.mv = Some(mv);
        node.class = classify(mv);
        if matches!(mv.promo, Some(p) if p != Piece::Queen) {
            replay.underpromotion = true;
        }

        let mut after = board.make_move(mv);
        if config.suppress_redundant_ep_info && after.en_passant_square().is_some() {
            // drop the e/p marker when no capture is actually possible so
            // it cannot perturb the position hash
            if !after.legal_moves().iter().any(|m| m.is_ep) {
                after.set_en_passant(None);
            }
        }

        node.check = check_status(&after);
        node.san_norm = Some(board.to_san(mv));
        node.hash_after = after.hash();
        node.fen_after = Some(after.to_fen());
        node.epd_after = Some(after.to_epd());
        if config.output_evaluation {
            node.evaluation = Some(evaluate(&after));
        }

        game.cumulative_hash ^= after.hash();
        *game.position_counts.entry(after.hash()).or_insert(0) += 1;
        replay.max_halfmove_clock = replay.max_halfmove_clock.max(after.halfmove_clock());

        if let (Some(index), true) = (eco, config.add_eco) {
            if let Some(entry) = index.lookup(after.hash()) {
                if entry.plycount <= ply as usize {
                    let deeper = replay
                        .eco_entry
                        .as_ref()
                        .map(|e| entry.plycount > e.plycount)
                        .unwrap_or(true);
                    if deeper {
                        replay.eco_entry = Some(entry.clone());
                    }
                }
            }
        }

        // variations branch from the board before this move
        let keep_variations = config.keep_variations || config.split_variants.is_some();
        if keep_variations {
            let pre = board.clone();
            for var in &mut game.moves[i].variations {
                interpret_variation(var, &pre, game.start_line);
            }
        }

        replay.boards.push(after.clone());
        board = after;
    }

    game.final_hash = replay.final_board().hash();
    if game.moves_ok {
        debug!(
            "game at line {}: {} plies, final hash {:x}",
            game.start_line,
            game.moves.len(),
            game.final_hash
        );
    }
    Ok(replay)
}

/// interpret a RAV from its branch point; null moves are always legal
/// here, and a bad move truncates the variation rather than the game
fn interpret_variation(var: &mut Variation, branch_board: &Board, game_line: u32) {
    let mut board = branch_board.clone();
    let mut bad_from = None;
    for (i, node) in var.moves.iter_mut().enumerate() {
        let mv = if node.is_null() {
            Move::new_null()
        } else {
            match board.parse_san_move(&node.san) {
                Ok(mv) => mv,
                Err(e) => {
                    warn!("game at line {game_line}: in variation: {e:#}");
                    bad_from = Some(i);
                    break;
                }
            }
        };
        node.mv = Some(mv);
        node.class = classify(mv);
        let pre = board.clone();
        let after = board.make_move(mv);
        node.check = check_status(&after);
        node.san_norm = Some(pre.to_san(mv));
        node.hash_after = after.hash();
        for inner in &mut node.variations {
            interpret_variation(inner, &pre, game_line);
        }
        board = after;
    }
    if let Some(i) = bad_from {
        var.moves.truncate(i);
    }
}

fn classify(mv: Move) -> MoveClass {
    if mv.is_null {
        MoveClass::Null
    } else if mv.castle == Some(CastlingSide::KingSide) {
        MoveClass::KingsideCastle
    } else if mv.castle == Some(CastlingSide::QueenSide) {
        MoveClass::QueensideCastle
    } else if mv.is_ep {
        MoveClass::EnPassantPawn
    } else if mv.is_promo() {
        MoveClass::PawnWithPromotion
    } else if mv.mover == Piece::Pawn {
        MoveClass::Pawn
    } else {
        MoveClass::PieceMove
    }
}

/// a bare material balance from White's point of view, in pawns
fn evaluate(board: &Board) -> String {
    let value = |p: Piece| match p {
        Piece::Pawn => 1,
        Piece::Knight | Piece::Bishop => 3,
        Piece::Rook => 5,
        Piece::Queen => 9,
        Piece::King => 0,
    };
    let mut total = 0;
    for p in Piece::ALL {
        total += value(p) * (board.count_of(Color::White, p) - board.count_of(Color::Black, p));
    }
    format!("{total:+}.00")
}

fn check_status(after: &Board) -> CheckStatus {
    if !after.is_in_check(after.turn()) {
        CheckStatus::None
    } else if after.is_checkmate() {
        CheckStatus::Checkmate
    } else {
        CheckStatus::Check
    }
}

/// SetUp/FEN tag consistency, corrected in place with a warning
fn normalise_setup_tags(game: &mut Game) {
    let has_fen = game.tags.contains("FEN");
    let setup = game.tags.get("SetUp").map(str::to_string);
    if has_fen && setup.as_deref() != Some("1") {
        warn!(
            "game at line {}: FEN tag without SetUp \"1\", inserted",
            game.start_line
        );
        game.tags.set("SetUp", "1");
    }
    if !has_fen && setup.is_some() {
        warn!(
            "game at line {}: SetUp tag without FEN, ignored",
            game.start_line
        );
        game.tags.remove("SetUp");
    }
}

/// A start position with every castling right, full home ranks and
/// mirror-symmetric but non-standard back ranks is Chess960; record the
/// king/rook files and synthesise the Variant tag.
fn detect_chess960(game: &mut Game, start: &mut Board) {
    let tagged = matches!(
        game.tags.get("Variant").map(str::to_ascii_lowercase).as_deref(),
        Some("chess 960") | Some("chess960") | Some("fischerandom")
    );
    let detected = !tagged && is_chess960_start(start);
    if detected {
        warn!(
            "game at line {}: non-standard symmetric start, tagged as chess 960",
            game.start_line
        );
        game.tags.set("Variant", "chess 960");
    }
    if tagged || detected {
        game.chess960 = true;
        if let Some(files) = c960_files_of(start) {
            start.set_c960_files(Some(files));
        }
    }
}

fn is_chess960_start(b: &Board) -> bool {
    if b.castling() != CastlingRights::ALL {
        return false;
    }
    let white_back = b.rank_text(0);
    let black_back = b.rank_text(7);
    if b.rank_text(1) != "PPPPPPPP" || b.rank_text(6) != "pppppppp" {
        return false;
    }
    if white_back.contains('.') || black_back.contains('.') {
        return false;
    }
    if white_back.to_ascii_lowercase() != black_back {
        return false;
    }
    white_back != "RNBQKBNR"
}

fn c960_files_of(b: &Board) -> Option<C960Files> {
    let king_file = b.king(Color::White)?.file_index();
    let rook_files: Vec<usize> = (b.rooks() & b.white() & Bitboard::RANK_1)
        .squares()
        .map(|sq| sq.file_index())
        .collect();
    let qside = rook_files.iter().copied().filter(|&f| f < king_file).max()?;
    let kside = rook_files.iter().copied().filter(|&f| f > king_file).min()?;
    Some(C960Files {
        king_file,
        kside_rook_file: kside,
        qside_rook_file: qside,
    })
}
