use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::piece::Color;

/// The terminating result of a game, per the PGN result tokens.
#[derive(Copy, Hash, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Outcome {
    #[default]
    Unterminated,
    Win(Color),
    Draw,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.as_pgn())
    }
}

impl Outcome {
    #[inline]
    pub fn is_draw(self) -> bool {
        self == Self::Draw
    }

    #[inline]
    pub fn is_game_over(self) -> bool {
        self != Self::Unterminated
    }

    #[inline]
    pub fn winning_color(self) -> Option<Color> {
        match self {
            Self::Win(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_pgn(self) -> String {
        match self {
            Self::Draw => "1/2-1/2",
            Self::Win(Color::White) => "1-0",
            Self::Win(Color::Black) => "0-1",
            Self::Unterminated => "*",
        }
        .to_string()
    }

    pub fn try_from_pgn(s: &str) -> Result<Outcome> {
        match s {
            "1/2-1/2" | "1/2" => Ok(Outcome::Draw),
            "1-0" => Ok(Outcome::Win(Color::White)),
            "0-1" => Ok(Outcome::Win(Color::Black)),
            "*" => Ok(Outcome::Unterminated),
            _ => Err(anyhow!("unknown outcome token '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome() {
        assert_eq!(Outcome::try_from_pgn("1-0").unwrap(), Outcome::Win(Color::White));
        assert_eq!(Outcome::try_from_pgn("0-1").unwrap(), Outcome::Win(Color::Black));
        assert_eq!(Outcome::try_from_pgn("1/2-1/2").unwrap(), Outcome::Draw);
        assert_eq!(Outcome::try_from_pgn("1/2").unwrap(), Outcome::Draw, "short draws accepted");
        assert_eq!(Outcome::try_from_pgn("*").unwrap(), Outcome::Unterminated);
        assert!(Outcome::try_from_pgn("2-0").is_err());

        assert_eq!(Outcome::Win(Color::White).as_pgn(), "1-0");
        assert_eq!(Outcome::Draw.as_pgn(), "1/2-1/2");
        assert_eq!(Outcome::Unterminated.to_string(), "*");
        assert_eq!(Outcome::Win(Color::Black).winning_color(), Some(Color::Black));
        assert!(Outcome::Draw.is_game_over());
        assert!(!Outcome::Unterminated.is_game_over());
    }
}
