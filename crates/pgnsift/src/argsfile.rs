use std::path::Path;

use pgnsift_base::infra::utils::read_file;
use pgnsift_base::prelude::*;
use tracing::warn;

/// What an argsfile contributes: replayed command-line arguments, extra
/// source files, and the bodies of the multi-line criteria arguments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArgsFile {
    pub argv:            Vec<String>,
    pub source_files:    Vec<String>,
    pub tag_lines:       Vec<String>,
    pub variation_lines: Vec<String>,
    pub position_lines:  Vec<String>,
    /// (line, both_colours)
    pub material_lines:  Vec<(String, bool)>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum MultiLine {
    None,
    Tags,
    Variations,
    Positions,
    MaterialEither,
    MaterialAsGiven,
}

impl ArgsFile {
    /// The dialect: `:-Xvalue` replays the same argument as its command
    /// line form, a bare `:filename` adds a source file, and unprefixed
    /// lines feed the most recent multi-line argument (`:-t`, `:-v`,
    /// `:-x`, `:-y`, `:-z` given without a value).
    pub fn parse_lines(lines: &[String]) -> ArgsFile {
        let mut out = ArgsFile::default();
        let mut mode = MultiLine::None;
        for raw in lines {
            let line = raw.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix(':') {
                if let Some(arg) = rest.strip_prefix('-') {
                    mode = match arg {
                        "t" | "T" => MultiLine::Tags,
                        "v" => MultiLine::Variations,
                        "x" => MultiLine::Positions,
                        "y" => MultiLine::MaterialEither,
                        "z" => MultiLine::MaterialAsGiven,
                        _ => {
                            out.argv.push(format!("-{arg}"));
                            MultiLine::None
                        }
                    };
                } else {
                    out.source_files.push(rest.to_string());
                    mode = MultiLine::None;
                }
            } else {
                match mode {
                    MultiLine::None => warn!("argsfile line '{line}' outside any multi-line argument, ignored"),
                    MultiLine::Tags => out.tag_lines.push(line.to_string()),
                    MultiLine::Variations => out.variation_lines.push(line.to_string()),
                    MultiLine::Positions => out.position_lines.push(line.to_string()),
                    MultiLine::MaterialEither => out.material_lines.push((line.to_string(), true)),
                    MultiLine::MaterialAsGiven => out.material_lines.push((line.to_string(), false)),
                }
            }
        }
        out
    }

    pub fn read(path: impl AsRef<Path>) -> Result<ArgsFile> {
        let lines = read_file(&path)?;
        let mut parsed = Self::parse_lines(&lines);

        // a :-A line pulls in another argsfile
        let nested: Vec<String> = parsed
            .argv
            .iter()
            .filter_map(|a| a.strip_prefix("-A").map(str::to_string))
            .filter(|f| !f.is_empty())
            .collect();
        parsed.argv.retain(|a| !a.starts_with("-A"));
        for file in nested {
            let inner = Self::read(&file).with_context(|| format!("argsfile '{file}'"))?;
            parsed.merge(inner);
        }
        Ok(parsed)
    }

    pub fn merge(&mut self, other: ArgsFile) {
        self.argv.extend(other.argv);
        self.source_files.extend(other.source_files);
        self.tag_lines.extend(other.tag_lines);
        self.variation_lines.extend(other.variation_lines);
        self.position_lines.extend(other.position_lines);
        self.material_lines.extend(other.material_lines);
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn lines(src: &str) -> Vec<String> {
        src.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_replayed_arguments() {
        let af = ArgsFile::parse_lines(&lines(":-D\n:-oout.pgn\n:-7\n"));
        assert_eq!(af.argv, vec!["-D", "-oout.pgn", "-7"]);
        assert!(af.source_files.is_empty());
    }

    #[test]
    fn test_source_files() {
        let af = ArgsFile::parse_lines(&lines(":games.pgn\n:more.pgn\n"));
        assert_eq!(af.source_files, vec!["games.pgn", "more.pgn"]);
    }

    #[test]
    fn test_multiline_tags() {
        let af = ArgsFile::parse_lines(&lines(":-t\nWhite Kasparov\nWhiteElo >= 2700\n:-D\n"));
        assert_eq!(af.tag_lines, vec!["White Kasparov", "WhiteElo >= 2700"]);
        assert_eq!(af.argv, vec!["-D"]);
    }

    #[test]
    fn test_multiline_variations_and_materials() {
        let src = ":-v\n1. e4 c5 2. Nf3\n:-z\nKRP* kr\n:-y\nKQ k\n";
        let af = ArgsFile::parse_lines(&lines(src));
        assert_eq!(af.variation_lines, vec!["1. e4 c5 2. Nf3"]);
        assert_eq!(af.material_lines, vec![("KRP* kr".to_string(), false), ("KQ k".to_string(), true)]);
    }

    #[test]
    fn test_stray_value_warned_and_ignored() {
        let af = ArgsFile::parse_lines(&lines("White Kasparov\n:-D\n"));
        assert!(af.tag_lines.is_empty());
        assert_eq!(af.argv, vec!["-D"]);
    }

    #[test]
    fn test_mode_ends_at_next_argument() {
        let af = ArgsFile::parse_lines(&lines(":-t\nWhite X\n:games.pgn\nBlack Y\n"));
        assert_eq!(af.tag_lines, vec!["White X"]);
        assert_eq!(af.source_files, vec!["games.pgn"]);
    }
}
