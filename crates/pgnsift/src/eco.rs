use std::collections::HashMap;
use std::path::Path;

use pgnsift_base::infra::utils::file_open;
use pgnsift_base::prelude::*;
use tracing::{debug, warn};

use crate::game::Game;
use crate::lexer::tokenize;
use crate::parser::Parser;

/// One classified opening line: the ECO code plus naming tags and the
/// length of the line that reached the indexed position.
#[derive(Clone, Debug, PartialEq)]
pub struct EcoEntry {
    pub eco:           String,
    pub opening:       Option<String>,
    pub variation:     Option<String>,
    pub sub_variation: Option<String>,
    pub plycount:      usize,
}

/// Opening lines indexed by the hash of their final position. The Result
/// tags of the ECO file are ignored; the lines themselves are what count.
#[derive(Clone, Debug, Default)]
pub struct EcoIndex {
    by_hash: HashMap<Hash, EcoEntry>,
}

impl EcoIndex {
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn lookup(&self, hash: Hash) -> Option<&EcoEntry> {
        self.by_hash.get(&hash)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<EcoIndex> {
        use std::io::Read;
        let mut src = String::new();
        file_open(&path)?.read_to_string(&mut src)?;
        let index = Self::from_pgn(&src);
        debug!(
            "ECO file '{}' indexed {} opening lines",
            path.as_ref().display(),
            index.len()
        );
        Ok(index)
    }

    pub fn from_pgn(src: &str) -> EcoIndex {
        let mut index = EcoIndex::default();
        let mut parser = Parser::new(tokenize(src, false));
        while let Some(game) = parser.next_game() {
            index.insert_line(&game);
        }
        index
    }

    fn insert_line(&mut self, game: &Game) {
        let Some(eco) = game.tags.get("ECO") else {
            warn!("ECO file line at {} has no ECO tag, skipped", game.start_line);
            return;
        };
        let mut board = match game.starting_board() {
            Ok(b) => b,
            Err(e) => {
                warn!("ECO file line at {}: {e:#}", game.start_line);
                return;
            }
        };
        let mut plycount = 0;
        for node in &game.moves {
            match board.parse_san_move(&node.san) {
                Ok(mv) => {
                    board = board.make_move(mv);
                    plycount += 1;
                }
                Err(e) => {
                    warn!("ECO file line at {}: {e:#}", game.start_line);
                    return;
                }
            }
        }
        let entry = EcoEntry {
            eco: eco.to_string(),
            opening: game.tags.get("Opening").map(str::to_string),
            variation: game.tags.get("Variation").map(str::to_string),
            sub_variation: game.tags.get("SubVariation").map(str::to_string),
            plycount,
        };
        // first line in wins, matching the original's index build
        self.by_hash.entry(board.hash()).or_insert(entry);
    }
}

/// Stamp a game's classification tags from the deepest matching entry.
pub fn stamp_game(game: &mut Game, entry: &EcoEntry) {
    game.tags.set("ECO", &entry.eco);
    match &entry.opening {
        Some(v) => {
            game.tags.set("Opening", v);
        }
        None => game.tags.remove("Opening"),
    }
    match &entry.variation {
        Some(v) => {
            game.tags.set("Variation", v);
        }
        None => game.tags.remove("Variation"),
    }
    match &entry.sub_variation {
        Some(v) => {
            game.tags.set("SubVariation", v);
        }
        None => game.tags.remove("SubVariation"),
    }
}
