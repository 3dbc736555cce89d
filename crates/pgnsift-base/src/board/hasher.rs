use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use static_init::dynamic;

use crate::bits::square::Square;
use crate::board::board::Board;
use crate::piece::{Color, Hash, Piece};

// Polyglot-shaped Zobrist keys: one number per piece/square, one for the
// side to move being black, sixteen for the castling-right bitflags and
// eight for the en-passant file. The table is generated from a fixed seed
// so that hashes are reproducible across runs and platforms.
#[repr(align(128))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Hasher {
    seed:                u64,
    squares:             [[[u64; Square::len()]; Piece::len()]; 2], // [colour][piece][square]
    ep:                  [u64; 8],
    castling_by_bitflag: [u64; 16],
    side:                u64,
}

impl fmt::Display for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Zobrist({})", self.seed)
    }
}

#[dynamic]
static STATIC_INSTANCE: Box<Hasher> = Hasher::new(3141592653589793);

impl Hasher {
    // doesnt impl Default as too large to copy by value
    #[inline]
    pub fn instance() -> &'static Self {
        &STATIC_INSTANCE
    }

    pub fn new(seed: u64) -> Box<Self> {
        let mut rng = ChaChaRng::seed_from_u64(seed);
        let mut h = Hasher {
            seed,
            squares: [[[0; Square::len()]; Piece::len()]; 2],
            side: 0,
            castling_by_bitflag: [0; 16],
            ep: [0; 8],
        };
        for c in &Color::ALL {
            for p in &Piece::ALL {
                rng.fill(&mut h.squares[c.index()][p.index()]);
            }
        }
        h.side = rng.gen();
        let mut castling_by_flag = [0u64; 4];
        rng.fill(&mut castling_by_flag);

        // fill out the castling by bitflag using castling by flag
        for bits in 0..16 {
            for bit in 0..4 {
                if (1 << bit) & bits > 0 {
                    h.castling_by_bitflag[bits] ^= castling_by_flag[bit];
                }
            }
        }
        rng.fill(&mut h.ep);
        Box::new(h)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline(always)]
    fn get(&self, c: Color, p: Piece, sq: Square) -> Hash {
        self.squares[c.index()][p.index()][sq.index()]
    }

    pub fn hash_board(&self, b: &Board) -> Hash {
        let mut hash = b.turn().chooser_wb(0, self.side);

        hash ^= self.castling_by_bitflag[b.castling().bits() as usize];

        if let Some(ep) = b.en_passant_square() {
            hash ^= self.ep[ep.file_index()];
        }
        for &p in &Piece::ALL {
            for sq in (b.pieces(p) & b.white()).squares() {
                hash ^= self.get(Color::White, p, sq);
            }
            for sq in (b.pieces(p) & b.black()).squares() {
                hash ^= self.get(Color::Black, p, sq);
            }
        }
        hash
    }
}
