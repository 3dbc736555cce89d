use std::collections::HashMap;

use pgnsift_base::prelude::*;
use regex::Regex;
use tracing::warn;

use crate::game::Game;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagOp {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Regex,
}

#[derive(Clone, Debug)]
pub struct TagCriterion {
    pub value: String,
    pub op:    TagOp,
    regex:     Option<Regex>,
}

impl TagCriterion {
    pub fn new(op: TagOp, value: &str) -> Result<TagCriterion> {
        let regex = match op {
            TagOp::Regex => Some(Regex::new(value).with_context(|| format!("tag pattern '{value}'"))?),
            _ => None,
        };
        Ok(TagCriterion {
            value: value.to_string(),
            op,
            regex,
        })
    }
}

/// Per tag, a positive list (alternatives, any may hold) and a negative
/// list (none may hold). Tags with no positive entries are unconstrained.
#[derive(Debug, Default)]
pub struct TagMatcher {
    positive: HashMap<String, Vec<TagCriterion>>,
    negative: HashMap<String, Vec<TagCriterion>>,
    /// soundex comparison for the player tags
    pub use_soundex: bool,
    /// substring rather than whole-string equality
    pub match_anywhere: bool,
}

impl TagMatcher {
    pub fn is_empty(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty()
    }

    pub fn add(&mut self, tag: &str, criterion: TagCriterion) {
        self.positive.entry(tag.to_string()).or_default().push(criterion);
    }

    pub fn add_negative(&mut self, tag: &str, criterion: TagCriterion) {
        self.negative.entry(tag.to_string()).or_default().push(criterion);
    }

    /// One criterion line: `TagName op value`, operator one of
    /// `= != < <= > >= ~`, value optionally double-quoted; omitted
    /// operator means equality; a leading `!` on the tag name makes the
    /// criterion negative.
    pub fn add_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('%') {
            return Ok(());
        }
        let (name, rest) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| anyhow::anyhow!("tag criterion '{line}' has no value"))?;
        let rest = rest.trim();
        let (op, value) = if let Some(v) = rest.strip_prefix("!=") {
            (TagOp::NotEqual, v)
        } else if let Some(v) = rest.strip_prefix("<>") {
            (TagOp::NotEqual, v)
        } else if let Some(v) = rest.strip_prefix("<=") {
            (TagOp::LessOrEqual, v)
        } else if let Some(v) = rest.strip_prefix(">=") {
            (TagOp::GreaterOrEqual, v)
        } else if let Some(v) = rest.strip_prefix('<') {
            (TagOp::LessThan, v)
        } else if let Some(v) = rest.strip_prefix('>') {
            (TagOp::GreaterThan, v)
        } else if let Some(v) = rest.strip_prefix('~') {
            (TagOp::Regex, v)
        } else if let Some(v) = rest.strip_prefix('=') {
            (TagOp::Equal, v)
        } else {
            (TagOp::Equal, rest)
        };
        let value = value.trim().trim_matches('"');
        let (name, negative) = match name.strip_prefix('!') {
            Some(n) => (n, true),
            None => (name, false),
        };
        let criterion = TagCriterion::new(op, value)?;
        if negative {
            self.add_negative(name, criterion);
        } else {
            self.add(name, criterion);
        }
        Ok(())
    }

    pub fn add_lines(&mut self, lines: &[String]) -> Result<()> {
        for line in lines {
            self.add_line(line)?;
        }
        Ok(())
    }

    pub fn matches(&self, game: &Game) -> bool {
        for (tag, criteria) in &self.positive {
            let value = game.tags.get(tag);
            let any = criteria.iter().any(|c| self.criterion_matches(tag, c, value));
            if !any {
                return false;
            }
        }
        for (tag, criteria) in &self.negative {
            let value = game.tags.get(tag);
            if criteria.iter().any(|c| self.criterion_matches(tag, c, value)) {
                return false;
            }
        }
        true
    }

    fn criterion_matches(&self, tag: &str, c: &TagCriterion, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match c.op {
            TagOp::Regex => c.regex.as_ref().map(|re| re.is_match(value)).unwrap_or(false),
            TagOp::Equal | TagOp::NotEqual => {
                let eq = self.string_equal(tag, &c.value, value);
                (c.op == TagOp::Equal) == eq
            }
            _ => {
                let ord = compare_values(value, &c.value);
                match c.op {
                    TagOp::LessThan => ord.is_lt(),
                    TagOp::LessOrEqual => ord.is_le(),
                    TagOp::GreaterThan => ord.is_gt(),
                    TagOp::GreaterOrEqual => ord.is_ge(),
                    _ => unreachable!(),
                }
            }
        }
    }

    fn string_equal(&self, tag: &str, wanted: &str, value: &str) -> bool {
        if self.use_soundex && (tag == "White" || tag == "Black") {
            return soundex(wanted) == soundex(value);
        }
        if self.match_anywhere {
            return value.to_ascii_lowercase().contains(&wanted.to_ascii_lowercase());
        }
        value.eq_ignore_ascii_case(wanted)
    }
}

/// numeric comparison when both sides parse as decimals, string ordering
/// otherwise (PGN dates order correctly as strings)
fn compare_values(left: &str, right: &str) -> std::cmp::Ordering {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r).unwrap_or(std::cmp::Ordering::Equal),
        _ => left.cmp(right),
    }
}

/// The classic four-character soundex code, for forgiving player-name
/// matches.
pub fn soundex(name: &str) -> String {
    fn code(ch: char) -> Option<char> {
        match ch.to_ascii_lowercase() {
            'b' | 'f' | 'p' | 'v' => Some('1'),
            'c' | 'g' | 'j' | 'k' | 'q' | 's' | 'x' | 'z' => Some('2'),
            'd' | 't' => Some('3'),
            'l' => Some('4'),
            'm' | 'n' => Some('5'),
            'r' => Some('6'),
            _ => None,
        }
    }

    let mut chars = name.chars().filter(|c| c.is_ascii_alphabetic());
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out = String::new();
    out.push(first.to_ascii_uppercase());
    let mut last = code(first);
    for ch in chars {
        let c = code(ch);
        if let Some(digit) = c {
            if Some(digit) != last {
                out.push(digit);
                if out.len() == 4 {
                    return out;
                }
            }
        }
        // vowels separate duplicate codes; h and w do not
        if !matches!(ch.to_ascii_lowercase(), 'h' | 'w') {
            last = c;
        }
    }
    while out.len() < 4 {
        out.push('0');
    }
    out
}

/// parse a whole -t file, warning on bad lines rather than failing
pub fn build_tag_matcher(lines: &[String], use_soundex: bool, match_anywhere: bool) -> TagMatcher {
    let mut m = TagMatcher {
        use_soundex,
        match_anywhere,
        ..TagMatcher::default()
    };
    for line in lines {
        if let Err(e) = m.add_line(line) {
            warn!("{e:#}");
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::game::Game;

    fn game_with(tags: &[(&str, &str)]) -> Game {
        let mut g = Game::new();
        for (k, v) in tags {
            g.tags.set(k, v);
        }
        g
    }

    #[test]
    fn test_equality_and_case() {
        let mut m = TagMatcher::default();
        m.add_line("White Kasparov").unwrap();
        assert!(m.matches(&game_with(&[("White", "Kasparov")])));
        assert!(m.matches(&game_with(&[("White", "KASPAROV")])), "case-insensitive");
        assert!(!m.matches(&game_with(&[("White", "Karpov")])));
        assert!(!m.matches(&game_with(&[("Black", "Kasparov")])), "wrong tag");
    }

    #[test]
    fn test_alternatives_or_within_tag() {
        let mut m = TagMatcher::default();
        m.add_line("White Kasparov").unwrap();
        m.add_line("White Karpov").unwrap();
        assert!(m.matches(&game_with(&[("White", "Karpov")])));
        assert!(m.matches(&game_with(&[("White", "Kasparov")])));
        assert!(!m.matches(&game_with(&[("White", "Short")])));
    }

    #[test]
    fn test_conjunction_across_tags() {
        let mut m = TagMatcher::default();
        m.add_line("White Kasparov").unwrap();
        m.add_line("Result 1-0").unwrap();
        assert!(m.matches(&game_with(&[("White", "Kasparov"), ("Result", "1-0")])));
        assert!(!m.matches(&game_with(&[("White", "Kasparov"), ("Result", "0-1")])));
    }

    #[test]
    fn test_numeric_operators() {
        let mut m = TagMatcher::default();
        m.add_line("WhiteElo >= 2700").unwrap();
        assert!(m.matches(&game_with(&[("WhiteElo", "2750")])));
        assert!(!m.matches(&game_with(&[("WhiteElo", "2650")])));
        assert!(!m.matches(&game_with(&[("Black", "x")])), "absent tag fails");
    }

    #[test]
    fn test_date_comparison() {
        let mut m = TagMatcher::default();
        m.add_line("Date >= \"1990.01.01\"").unwrap();
        assert!(m.matches(&game_with(&[("Date", "1998.05.23")])));
        assert!(!m.matches(&game_with(&[("Date", "1985.11.09")])));
    }

    #[test]
    fn test_negative_criteria() {
        let mut m = TagMatcher::default();
        m.add_line("!Event blitz").unwrap();
        assert!(m.matches(&game_with(&[("Event", "classical")])));
        assert!(!m.matches(&game_with(&[("Event", "Blitz")])));
        assert!(m.matches(&game_with(&[("White", "x")])), "absent tag cannot match");
    }

    #[test]
    fn test_regex_operator() {
        let mut m = TagMatcher::default();
        m.add_line("ECO ~ ^B9[0-9]$").unwrap();
        assert!(m.matches(&game_with(&[("ECO", "B90")])));
        assert!(!m.matches(&game_with(&[("ECO", "B80")])));
        assert!(TagMatcher::default().add_line("ECO ~ [unclosed").is_err());
    }

    #[test]
    fn test_substring_mode() {
        let mut m = TagMatcher {
            match_anywhere: true,
            ..TagMatcher::default()
        };
        m.add_line("Event wch").unwrap();
        assert!(m.matches(&game_with(&[("Event", "WCh Rapid 2014")])));
        assert!(!m.matches(&game_with(&[("Event", "Open")])));
    }

    #[test]
    fn test_soundex() {
        assert_eq!(soundex("Robert"), "R163");
        assert_eq!(soundex("Rupert"), "R163");
        assert_eq!(soundex("Tymczak"), "T522");
        assert_eq!(soundex("Pfister"), "P236");
        assert_eq!(soundex("Honeyman"), "H555");

        let mut m = TagMatcher {
            use_soundex: true,
            ..TagMatcher::default()
        };
        m.add_line("White Kasparov").unwrap();
        assert!(m.matches(&game_with(&[("White", "Kasparow")])), "soundex-equal");
    }

    #[test]
    fn test_comment_lines_skipped() {
        let mut m = TagMatcher::default();
        m.add_line("# a comment").unwrap();
        m.add_line("").unwrap();
        assert!(m.is_empty());
    }
}
