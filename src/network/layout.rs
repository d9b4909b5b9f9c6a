use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Number of distinct cell values: 0 (empty) plus exponents 1..=10.
pub const RADIX: usize = 11;

/// Weight tables are split into two stages; a board belongs to stage 1 as
/// soon as any cell reaches this exponent.
pub const STAGES: usize = 2;
pub const STAGE_THRESHOLD: u8 = 9;

/// The 8 dihedral placements of the 3x3 grid: identity, rotations by 90,
/// 180, 270 degrees, and each composed with a horizontal flip. Entry
/// `SYMMETRIES[s][i]` is the source cell feeding position `i` of the
/// transformed board.
pub const NUM_SYMMETRIES: usize = 8;
pub const SYMMETRIES: [[usize; 9]; NUM_SYMMETRIES] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8],
    [0, 3, 6, 1, 4, 7, 2, 5, 8],
    [2, 1, 0, 5, 4, 3, 8, 7, 6],
    [2, 5, 8, 1, 4, 7, 0, 3, 6],
    [6, 7, 8, 3, 4, 5, 0, 1, 2],
    [6, 3, 0, 7, 4, 1, 8, 5, 2],
    [8, 7, 6, 5, 4, 3, 2, 1, 0],
    [8, 5, 2, 7, 4, 1, 6, 3, 0],
];

/// Maximum tuple arity across all variants.
pub const MAX_ARITY: usize = 6;

// Base tuple shapes; each is unrolled through the 8 symmetries above.
const BASE_6: [[usize; MAX_ARITY]; 2] = [[0, 1, 2, 3, 4, 5], [0, 3, 4, 6, 7, 8]];
const BASE_4: [[usize; MAX_ARITY]; 3] = [
    [0, 1, 3, 4, 0, 0], // 2x2 square
    [0, 1, 2, 5, 0, 0], // bent line
    [0, 1, 2, 4, 0, 0], // T
];

/// Network variant, chosen once at startup. Table shapes differ per
/// variant and the weight files are not self-describing, so the variant
/// must be resolved before any table I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Variant {
    /// 4-tuples, one physical table shared across the 8 placements.
    Sym4,
    /// 6-tuples, one physical table shared across the 8 placements.
    Sym6,
    /// 4-tuples unrolled: 8 independent tables per base tuple.
    Notsym4,
    /// 6-tuples unrolled: 8 independent tables per base tuple.
    Notsym6,
}

impl Variant {
    /// Cells per tuple.
    pub fn arity(self) -> usize {
        match self {
            Variant::Sym4 | Variant::Notsym4 => 4,
            Variant::Sym6 | Variant::Notsym6 => 6,
        }
    }

    /// Whether the 8 placements of a base tuple share one table.
    pub fn symmetric(self) -> bool {
        matches!(self, Variant::Sym4 | Variant::Sym6)
    }

    fn base(self) -> &'static [[usize; MAX_ARITY]] {
        match self.arity() {
            4 => &BASE_4,
            _ => &BASE_6,
        }
    }

    /// Short label used in output paths and log file names, e.g. `nt6_sym`.
    pub fn label(self) -> &'static str {
        match self {
            Variant::Sym4 => "nt4_sym",
            Variant::Sym6 => "nt6_sym",
            Variant::Notsym4 => "nt4_notsym",
            Variant::Notsym6 => "nt6_notsym",
        }
    }

    /// Directory name for this variant under a run's seed directory.
    pub fn dir_name(self) -> &'static str {
        match self {
            Variant::Sym4 => "NT4_sym",
            Variant::Sym6 => "NT6_sym",
            Variant::Notsym4 => "NT4_notsym",
            Variant::Notsym6 => "NT6_notsym",
        }
    }

    /// Checkpoint file name for checkpoint number `n` of a seeded run,
    /// e.g. `6tuple_sym_data_13_0.dat`.
    pub fn dat_file_name(self, seed: u64, n: u32) -> String {
        let sym = if self.symmetric() { "sym" } else { "notsym" };
        format!("{}tuple_{}_data_{}_{}.dat", self.arity(), sym, seed, n)
    }
}

// Matches the clap value names so a default can round-trip through parsing.
impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Variant::Sym4 => "sym4",
            Variant::Sym6 => "sym6",
            Variant::Notsym4 => "notsym4",
            Variant::Notsym6 => "notsym6",
        })
    }
}

/// One effective tuple: the table it reads and the board cells it selects,
/// most significant first.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub table: usize,
    pub cells: [usize; MAX_ARITY],
}

/// Shape descriptor for a variant's weight tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub arity: usize,
    pub symmetric: bool,
    pub stages: usize,
    /// Physical tables per stage.
    pub tables: usize,
    /// Entries per table (`RADIX^arity`).
    pub entries: usize,
    /// Effective tuples summed per evaluation (base tuples x 8).
    pub effective_tuples: usize,
}

impl Shape {
    /// Total elements in one flat dump: `stages x tables x entries`.
    pub fn total_elements(&self) -> usize {
        self.stages * self.tables * self.entries
    }
}

/// Placement list plus derived shape for one variant.
#[derive(Debug, Clone)]
pub struct Layout {
    pub variant: Variant,
    pub shape: Shape,
    pub placements: Vec<Placement>,
}

impl Layout {
    pub fn new(variant: Variant) -> Self {
        let base = variant.base();
        let arity = variant.arity();
        let mut placements = Vec::with_capacity(base.len() * NUM_SYMMETRIES);
        for (b, tuple) in base.iter().enumerate() {
            for (s, sym) in SYMMETRIES.iter().enumerate() {
                let mut cells = [0usize; MAX_ARITY];
                for k in 0..arity {
                    cells[k] = sym[tuple[k]];
                }
                let table = if variant.symmetric() {
                    b
                } else {
                    b * NUM_SYMMETRIES + s
                };
                placements.push(Placement { table, cells });
            }
        }
        let tables = if variant.symmetric() {
            base.len()
        } else {
            base.len() * NUM_SYMMETRIES
        };
        let shape = Shape {
            arity,
            symmetric: variant.symmetric(),
            stages: STAGES,
            tables,
            entries: RADIX.pow(arity as u32),
            effective_tuples: placements.len(),
        };
        Layout {
            variant,
            shape,
            placements,
        }
    }
}
