pub mod records;
pub mod split;

use std::io::Write;

use pgnsift_base::prelude::*;

use crate::config::{Config, OutputFormat, TagOutputForm};
use crate::game::{Game, MoveNode, Variation, RECOMMENDED_TAGS, SEVEN_TAG_ROSTER};
use crate::interp::Replay;

/// A token-at-a-time line accumulator: tokens are never split, lines
/// never end in whitespace, and a token that would push the line past
/// `max_line_length` flushes the line first. Zero disables wrapping.
pub struct LineWriter<'a> {
    sink:            &'a mut dyn Write,
    line:            String,
    max_line_length: usize,
}

impl<'a> LineWriter<'a> {
    pub fn new(sink: &'a mut dyn Write, max_line_length: usize) -> LineWriter<'a> {
        LineWriter {
            sink,
            line: String::new(),
            max_line_length,
        }
    }

    pub fn token(&mut self, tok: &str) -> Result<()> {
        if tok.is_empty() {
            return Ok(());
        }
        if self.line.is_empty() {
            self.line.push_str(tok);
            return Ok(());
        }
        if self.max_line_length > 0 && self.line.len() + 1 + tok.len() > self.max_line_length {
            self.terminate()?;
            self.line.push_str(tok);
        } else {
            self.line.push(' ');
            self.line.push_str(tok);
        }
        Ok(())
    }

    /// flush the pending line, if any
    pub fn terminate(&mut self) -> Result<()> {
        if !self.line.is_empty() {
            writeln!(self.sink, "{}", self.line)?;
            self.line.clear();
        }
        Ok(())
    }

    /// a raw line bypassing the wrap logic
    pub fn literal_line(&mut self, s: &str) -> Result<()> {
        self.terminate()?;
        writeln!(self.sink, "{s}")?;
        Ok(())
    }
}

/// ply → "N." / "N..." numbering from the starting board
#[derive(Copy, Clone, Debug)]
pub struct MoveNumbering {
    start_fullmove: i32,
    start_white:    bool,
}

impl MoveNumbering {
    pub fn from_board(b: &Board) -> MoveNumbering {
        MoveNumbering {
            start_fullmove: b.fullmove_number(),
            start_white:    b.turn() == Color::White,
        }
    }

    pub fn white_to_move(&self, ply: usize) -> bool {
        (ply % 2 == 0) == self.start_white
    }

    pub fn number_at(&self, ply: usize) -> i32 {
        let black_offset = usize::from(!self.start_white);
        self.start_fullmove + ((ply + black_offset) / 2) as i32
    }

    /// skip the numbering forward over dropped plies
    pub fn skipped(&self, plies: usize) -> MoveNumbering {
        MoveNumbering {
            start_fullmove: self.number_at(plies),
            start_white:    self.white_to_move(plies),
        }
    }
}

/// render one move in the configured output notation, without check
/// indicators
pub fn format_move(node: &MoveNode, format: OutputFormat) -> String {
    let san = || node.san_norm.clone().unwrap_or_else(|| node.san.clone());
    let Some(mv) = node.mv else {
        // uninterpreted moves can only be echoed
        return san();
    };
    if mv.is_null {
        return match format {
            OutputFormat::Uci => "0000".to_string(),
            _ => "--".to_string(),
        };
    }
    let piece_letter = |mv: &Move| {
        if mv.mover == Piece::Pawn {
            String::new()
        } else {
            mv.mover.to_upper_char().to_string()
        }
    };
    let promo_upper = |mv: &Move| match mv.promo {
        Some(p) => format!("={}", p.to_upper_char()),
        None => String::new(),
    };
    match format {
        OutputFormat::San | OutputFormat::Cm | OutputFormat::Epd | OutputFormat::Fen => san(),
        OutputFormat::Uci => mv.to_uci(),
        OutputFormat::Lalg => format!("{}{}{}", mv.from.uci(), mv.to.uci(), promo_upper(&mv)),
        OutputFormat::Halg => format!("{}-{}{}", mv.from.uci(), mv.to.uci(), promo_upper(&mv)),
        OutputFormat::Elalg => format!(
            "{}{}{}{}",
            piece_letter(&mv),
            mv.from.uci(),
            mv.to.uci(),
            promo_upper(&mv)
        ),
        OutputFormat::Xlalg => format!(
            "{}{}{}{}{}",
            piece_letter(&mv),
            mv.from.uci(),
            if mv.is_capture() { "x" } else { "-" },
            mv.to.uci(),
            promo_upper(&mv)
        ),
        OutputFormat::Xolalg => {
            if let Some(side) = mv.castle {
                side.san().to_string()
            } else {
                format!(
                    "{}{}{}{}{}",
                    piece_letter(&mv),
                    mv.from.uci(),
                    if mv.is_capture() { "x" } else { "-" },
                    mv.to.uci(),
                    promo_upper(&mv)
                )
            }
        }
    }
}

fn check_suffix(node: &MoveNode) -> &'static str {
    let status = if node.mv.is_some() { node.check } else { node.check_hint };
    status.suffix()
}

/// the tag names to emit, in order, honouring roster configuration
pub fn tag_order(game: &Game, config: &Config) -> Vec<String> {
    match config.tag_output_form {
        TagOutputForm::NoTags => return vec![],
        TagOutputForm::SevenTagRoster => {
            return SEVEN_TAG_ROSTER.iter().map(|s| s.to_string()).collect();
        }
        TagOutputForm::AllTags => {}
    }
    let mut order: Vec<String> = vec![];
    let mut push = |name: &str, order: &mut Vec<String>| {
        if !order.iter().any(|n| n == name) {
            order.push(name.to_string());
        }
    };
    match &config.tag_roster_order {
        Some(roster) => {
            for name in roster {
                if game.tags.contains(name) {
                    push(name, &mut order);
                }
            }
            if config.only_wanted_tags {
                return retained(order, config);
            }
        }
        None => {
            for name in SEVEN_TAG_ROSTER {
                if game.tags.contains(name) {
                    push(name, &mut order);
                }
            }
            for name in RECOMMENDED_TAGS {
                if game.tags.contains(name) {
                    push(name, &mut order);
                }
            }
        }
    }
    for (name, _) in game.tags.iter() {
        push(name, &mut order);
    }
    retained(order, config)
}

fn retained(order: Vec<String>, config: &Config) -> Vec<String> {
    order
        .into_iter()
        .filter(|name| !config.detag.iter().any(|d| d.eq_ignore_ascii_case(name)))
        .collect()
}

fn string_escape(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"")
}

pub fn write_tag_section(game: &Game, sink: &mut dyn Write, config: &Config) -> Result<()> {
    for name in tag_order(game, config) {
        let value = match config.tag_output_form {
            TagOutputForm::SevenTagRoster => game.tags.str_value(&name),
            _ => game.tags.get(&name).unwrap_or_default().to_string(),
        };
        writeln!(sink, "[{name} \"{}\"]", string_escape(&value))?;
    }
    if config.tag_output_form != TagOutputForm::NoTags && !tag_order(game, config).is_empty() {
        writeln!(sink)?;
    }
    Ok(())
}

/// which output slice of the main line to emit, from --startply,
/// --dropply and --plylimit
pub fn output_window(game: &Game, config: &Config) -> (usize, usize) {
    let plies = game.plycount();
    let mut first = config.start_ply.saturating_sub(1);
    if config.drop_ply_number > 0 {
        first = first.max(config.drop_ply_number as usize);
    } else if config.drop_ply_number < 0 {
        let keep = (-config.drop_ply_number) as usize;
        first = first.max(plies.saturating_sub(keep));
    }
    let mut last = plies;
    if let Some(limit) = config.output_ply_limit {
        last = last.min(first + limit);
    }
    (first.min(plies), last)
}

pub fn write_movetext(game: &Game, replay: &Replay, sink: &mut dyn Write, config: &Config) -> Result<()> {
    let mut lw = LineWriter::new(sink, config.max_line_length);
    let uci = config.output_format == OutputFormat::Uci;

    if config.keep_comments && !uci {
        for c in &game.prefix_comment {
            emit_comment(&mut lw, c.words())?;
        }
    }

    let (first, last) = output_window(game, config);
    let numbering = MoveNumbering::from_board(&replay.start).skipped(first);
    emit_moves(&mut lw, &game.moves[first..last], numbering, config, true)?;

    if config.keep_results {
        let result = if game.missing_result {
            game.tags.str_value("Result")
        } else {
            game.result.as_pgn()
        };
        lw.token(&result)?;
    }
    lw.terminate()?;
    writeln!(lw.sink)?;
    Ok(())
}

fn emit_comment(lw: &mut LineWriter, words: &[String]) -> Result<()> {
    lw.token("{")?;
    for w in words {
        lw.token(w)?;
    }
    lw.token("}")?;
    Ok(())
}

fn emit_moves(
    lw: &mut LineWriter,
    moves: &[MoveNode],
    numbering: MoveNumbering,
    config: &Config,
    mut number_due: bool,
) -> Result<()> {
    let uci = config.output_format == OutputFormat::Uci;
    for (ply, node) in moves.iter().enumerate() {
        let white = numbering.white_to_move(ply);
        if config.keep_move_numbers && !uci {
            if white {
                lw.token(&format!("{}.", numbering.number_at(ply)))?;
            } else if number_due {
                lw.token(&format!("{}...", numbering.number_at(ply)))?;
            }
        }
        number_due = false;

        let mut text = format_move(node, config.output_format);
        if config.keep_checks && !uci {
            text += check_suffix(node);
        }
        lw.token(&text)?;

        if config.keep_nags && !uci {
            for nag in &node.nags {
                lw.token(&format!("${nag}"))?;
            }
        }
        if config.add_fen_comments && !uci {
            if let Some(fen) = &node.fen_after {
                emit_comment(lw, &[fen.clone()])?;
            }
        } else if config.add_hashcode_comments && !uci {
            emit_comment(lw, &[format!("{:x}", node.hash_after)])?;
        }
        if config.output_evaluation && !uci {
            if let Some(eval) = &node.evaluation {
                emit_comment(lw, &[eval.clone()])?;
            }
        }
        if config.keep_comments && !uci {
            for c in &node.comments {
                emit_comment(lw, c.words())?;
                number_due = true;
            }
        }
        if config.keep_variations && !uci {
            for var in &node.variations {
                emit_variation(lw, var, numbering.skipped(ply), config)?;
                number_due = true;
            }
        }
    }
    Ok(())
}

fn emit_variation(lw: &mut LineWriter, var: &Variation, numbering: MoveNumbering, config: &Config) -> Result<()> {
    lw.token("(")?;
    if config.keep_comments {
        for c in &var.prefix_comment {
            emit_comment(lw, c.words())?;
        }
    }
    emit_moves(lw, &var.moves, numbering, config, true)?;
    if let Some(result) = var.result {
        lw.token(&result.as_pgn())?;
    }
    lw.token(")")?;
    if config.keep_comments {
        for c in &var.suffix_comment {
            emit_comment(lw, c.words())?;
        }
    }
    Ok(())
}

/// a whole game in one of the PGN-shaped formats
pub fn write_pgn_game(game: &Game, replay: &Replay, sink: &mut dyn Write, config: &Config) -> Result<()> {
    if let Some(marker) = &config.line_number_marker {
        writeln!(sink, "{marker} {} {}", game.start_line, game.end_line)?;
    }
    write_tag_section(game, sink, config)?;
    write_movetext(game, replay, sink, config)?;
    Ok(())
}
