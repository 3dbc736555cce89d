use std::io::Write;

use pgnsift_base::prelude::*;
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::game::{CheckStatus, Game};
use crate::interp::Replay;
use crate::writer::{format_move, output_window, tag_order, LineWriter, MoveNumbering};

/// One EPD record per ply: the position fields, a c0 comment naming the
/// players/event/date and a c1 comment carrying the result.
pub fn write_epd_game(game: &Game, replay: &Replay, sink: &mut dyn Write, config: &Config) -> Result<()> {
    let c0 = format!(
        "{white}-{black}, {event}, {date}",
        white = game.tags.str_value("White"),
        black = game.tags.str_value("Black"),
        event = game.tags.str_value("Event"),
        date = game.tags.str_value("Date"),
    );
    let c1 = game.tags.str_value("Result");
    let (first, last) = output_window(game, config);
    let last = last.min(replay.boards.len());
    for ply in first..=last {
        let board = replay.board_after(ply);
        writeln!(sink, "{epd} c0 \"{c0}\"; c1 \"{c1}\";", epd = board.to_epd())?;
    }
    writeln!(sink)?;
    Ok(())
}

/// each ply's FEN on its own line, starting position first
pub fn write_fen_game(game: &Game, replay: &Replay, sink: &mut dyn Write, config: &Config) -> Result<()> {
    let (first, last) = output_window(game, config);
    let last = last.min(replay.boards.len());
    for ply in first..=last {
        writeln!(sink, "{}", replay.board_after(ply).to_fen())?;
    }
    writeln!(sink)?;
    Ok(())
}

const CM_MOVE_NUMBER_WIDTH: usize = 3;
const CM_MOVE_WIDTH: usize = 15;
const CM_COMMENT_CHAR: char = ';';

/// The legacy Chess Master column layout. Only games from the standard
/// starting position can be rendered this way.
pub fn write_cm_game(game: &Game, replay: &Replay, sink: &mut dyn Write, config: &Config) -> Result<()> {
    if replay.start != Board::starting_pos() {
        tracing::warn!(
            "game at line {}: CM output requires the starting position",
            game.start_line
        );
    }
    writeln!(sink, "WHITE: {}", game.tags.get("White").unwrap_or(""))?;
    writeln!(sink, "BLACK: {}", game.tags.get("Black").unwrap_or(""))?;
    writeln!(sink)?;

    if config.keep_comments {
        for c in &game.prefix_comment {
            writeln!(sink, "{CM_COMMENT_CHAR} {}", c.text())?;
        }
    }

    let numbering = MoveNumbering::from_board(&replay.start);
    let mut line = String::new();
    for (ply, node) in game.moves.iter().enumerate() {
        let text = format_move(node, config.output_format) + node.check.suffix();
        if numbering.white_to_move(ply) {
            line = format!(
                "{num:>width$}. {mv:<mw$}",
                num = numbering.number_at(ply),
                width = CM_MOVE_NUMBER_WIDTH,
                mv = text,
                mw = CM_MOVE_WIDTH
            );
        } else {
            line += &format!("{mv:<mw$}", mv = text, mw = CM_MOVE_WIDTH);
            writeln!(sink, "{}", line.trim_end())?;
            line.clear();
        }
        if config.keep_comments {
            for c in &node.comments {
                if !line.is_empty() {
                    writeln!(sink, "{}", line.trim_end())?;
                    line.clear();
                }
                writeln!(sink, "{CM_COMMENT_CHAR} {}", c.text())?;
            }
        }
    }
    if !line.is_empty() {
        writeln!(sink, "{}", line.trim_end())?;
    }
    let last_is_mate = game
        .moves
        .last()
        .map(|m| m.check == CheckStatus::Checkmate)
        .unwrap_or(false);
    if !last_is_mate {
        let explanation = match game.result {
            Outcome::Win(Color::White) => "and black resigns",
            Outcome::Win(Color::Black) => "and white resigns",
            Outcome::Draw => "draw",
            Outcome::Unterminated => "incomplete result",
        };
        writeln!(sink, "{CM_COMMENT_CHAR} {explanation}")?;
    }
    writeln!(sink)?;
    Ok(())
}

/// one JSON object per game; the caller brackets multi-game files
pub fn game_to_json(game: &Game, config: &Config) -> Value {
    let mut obj = Map::new();
    for name in tag_order(game, config) {
        let value = match config.tag_output_form {
            crate::config::TagOutputForm::SevenTagRoster => game.tags.str_value(&name),
            _ => game.tags.get(&name).unwrap_or_default().to_string(),
        };
        obj.insert(name, Value::String(value));
    }
    let (first, last) = output_window(game, config);
    let moves: Vec<Value> = game.moves[first..last]
        .iter()
        .map(|node| {
            let mut m = Map::new();
            let text = format_move(node, config.output_format)
                + if config.keep_checks { node.check.suffix() } else { "" };
            m.insert("move".to_string(), Value::String(text));
            if config.keep_nags && !node.nags.is_empty() {
                m.insert("nags".to_string(), json!(node.nags));
            }
            if config.add_fen_comments {
                if let Some(fen) = &node.fen_after {
                    m.insert("FEN".to_string(), Value::String(fen.clone()));
                }
            }
            if config.output_evaluation {
                if let Some(eval) = &node.evaluation {
                    m.insert("evaluation".to_string(), Value::String(eval.clone()));
                }
            }
            if config.add_hashcode_comments {
                m.insert("HashCode".to_string(), Value::String(format!("{:x}", node.hash_after)));
            }
            Value::Object(m)
        })
        .collect();
    obj.insert("moves".to_string(), Value::Array(moves));
    if config.keep_results {
        obj.insert("Result".to_string(), Value::String(game.result.as_pgn()));
    }
    Value::Object(obj)
}

pub fn write_json_game(game: &Game, sink: &mut dyn Write, config: &Config, first_in_file: bool) -> Result<()> {
    if !first_in_file {
        writeln!(sink, ",")?;
    }
    let text = serde_json::to_string_pretty(&game_to_json(game, config))?;
    write!(sink, "{text}")?;
    Ok(())
}

/// one game per line: tag columns tab-separated, then the move text
pub fn write_tsv_game(game: &Game, replay: &Replay, sink: &mut dyn Write, config: &Config) -> Result<()> {
    let mut fields: Vec<String> = tag_order(game, config)
        .iter()
        .map(|name| game.tags.str_value(name))
        .collect();

    let mut movetext = vec![];
    {
        let flat = Config {
            max_line_length: 0,
            ..config.clone()
        };
        let mut lw = LineWriter::new(&mut movetext, 0);
        let (first, last) = output_window(game, &flat);
        let numbering = MoveNumbering::from_board(&replay.start).skipped(first);
        super::emit_moves(&mut lw, &game.moves[first..last], numbering, &flat, true)?;
        if flat.keep_results {
            lw.token(&game.result.as_pgn())?;
        }
        lw.terminate()?;
    }
    fields.push(String::from_utf8(movetext)?.trim_end().to_string());
    writeln!(sink, "{}", fields.join("\t"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::config::{OutputFormat, TagOutputForm};
    use crate::interp::interpret;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn parse_and_interp(src: &str, config: &Config) -> (Game, Replay) {
        let mut game = Parser::new(tokenize(src, false)).next_game().unwrap();
        let replay = interpret(&mut game, config, None).unwrap();
        (game, replay)
    }

    #[test]
    fn test_epd_output() {
        let config = Config {
            output_format: OutputFormat::Epd,
            ..Config::default()
        };
        let src = "[Event \"test\"]\n[White \"A\"]\n[Black \"B\"]\n[Result \"1-0\"]\n\n1. e4 e5 1-0\n";
        let (game, replay) = parse_and_interp(src, &config);
        let mut out = vec![];
        write_epd_game(&game, &replay, &mut out, &config).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 3, "start position plus two plies");
        assert!(lines[0].starts_with("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -"));
        assert!(lines[1].contains("c0 \"A-B, test,"));
        assert!(lines[2].contains("c1 \"1-0\";"));
    }

    #[test]
    fn test_fen_output() {
        let config = Config {
            output_format: OutputFormat::Fen,
            ..Config::default()
        };
        let (game, replay) = parse_and_interp("[Event \"?\"]\n\n1. e4 e5 *\n", &config);
        let mut out = vec![];
        write_fen_game(&game, &replay, &mut out, &config).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2");
    }

    #[test]
    fn test_cm_output() {
        let config = Config {
            output_format: OutputFormat::Cm,
            ..Config::default()
        };
        let src = "[White \"Alpha\"]\n[Black \"Beta\"]\n\n1. e4 e5 2. Nf3 1-0\n";
        let (game, replay) = parse_and_interp(src, &config);
        let mut out = vec![];
        write_cm_game(&game, &replay, &mut out, &config).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("WHITE: Alpha\nBLACK: Beta\n"));
        assert!(text.contains("  1. e4"));
        assert!(text.contains("; and black resigns"));
    }

    #[test]
    fn test_json_shape() {
        let config = Config {
            json_format: true,
            ..Config::default()
        };
        let src = "[Event \"test\"]\n\n1. e4 $1 e5 1-0\n";
        let (game, _) = parse_and_interp(src, &config);
        let value = game_to_json(&game, &config);
        assert_eq!(value["Event"], "test");
        assert_eq!(value["Result"], "1-0");
        assert_eq!(value["moves"][0]["move"], "e4");
        assert_eq!(value["moves"][0]["nags"][0], 1);
        assert!(value["moves"][1].get("nags").is_none());
    }

    #[test]
    fn test_json_optional_fields() {
        let config = Config {
            json_format: true,
            add_fen_comments: true,
            add_hashcode_comments: true,
            ..Config::default()
        };
        let (game, replay) = parse_and_interp("[Event \"?\"]\n\n1. e4 *\n", &config);
        let value = game_to_json(&game, &config);
        assert_eq!(
            value["moves"][0]["FEN"],
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
        assert_eq!(value["moves"][0]["HashCode"], format!("{:x}", replay.boards[0].hash()));
    }

    #[test]
    fn test_json_bracketing() {
        let config = Config::default();
        let (game, _) = parse_and_interp("[Event \"?\"]\n\n1. e4 *\n", &config);
        let mut out = vec![];
        writeln!(out, "[").unwrap();
        write_json_game(&game, &mut out, &config, true).unwrap();
        write_json_game(&game, &mut out, &config, false).unwrap();
        write!(out, "\n]\n").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(serde_json::from_str::<Value>(&text).unwrap().is_array());
    }

    #[test]
    fn test_tsv_output() {
        let config = Config {
            tsv_format: true,
            tag_output_form: TagOutputForm::SevenTagRoster,
            ..Config::default()
        };
        let src = "[Event \"test\"]\n[White \"A\"]\n[Black \"B\"]\n[Result \"1-0\"]\n\n1. e4 e5 1-0\n";
        let (game, replay) = parse_and_interp(src, &config);
        let mut out = vec![];
        write_tsv_game(&game, &replay, &mut out, &config).unwrap();
        let text = String::from_utf8(out).unwrap();
        let fields: Vec<&str> = text.trim_end().split('\t').collect();
        assert_eq!(fields.len(), 8, "seven tags plus movetext");
        assert_eq!(fields[0], "test");
        assert_eq!(fields[7], "1. e4 e5 1-0");
        assert_eq!(text.lines().count(), 1);
    }
}
