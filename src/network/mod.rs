//! N-tuple value network over 3x3 boards.
//!
//! A network is an additive decomposition of the positional value: each
//! effective tuple selects a few cells, folds them into a mixed-radix
//! pattern index, and looks up one entry of a flat table. Four parallel
//! tables are kept per entry (value, signed residual, absolute residual,
//! update count); the residual statistics drive a per-entry adaptive step
//! size. Checkpoints are whole-table binary dumps consumed by external
//! batch evaluators, so the on-disk layout is part of the contract.

mod layout;
mod tables;

pub use layout::{
    Layout, Placement, Shape, Variant, MAX_ARITY, NUM_SYMMETRIES, RADIX, STAGES, STAGE_THRESHOLD,
    SYMMETRIES,
};
pub use tables::Tables;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::mem;
use std::path::Path;

use crate::engine::Board;

#[derive(thiserror::Error, Debug)]
pub enum NetworkError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("weight file holds {found} bytes, expected {expected} for variant {variant:?}")]
    ShapeMismatch {
        variant: Variant,
        expected: u64,
        found: u64,
    },
}

/// One tuple's resolved entry for a given board, as seen by both
/// `evaluate` and `update`. Exposed for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedEntry {
    pub stage: usize,
    pub table: usize,
    pub index: usize,
    pub ev: f64,
    pub err: f64,
    pub aerr: f64,
    pub uc: u32,
}

/// The full set of weight tables for one variant, owned by a single
/// training session or evaluator.
#[derive(Debug)]
pub struct TupleNetwork {
    layout: Layout,
    tables: Tables,
}

impl TupleNetwork {
    /// Fresh zero-initialized network for `variant`.
    pub fn new(variant: Variant) -> Self {
        let layout = Layout::new(variant);
        let tables = Tables::new(layout.shape.stages, layout.shape.tables, layout.shape.entries);
        TupleNetwork { layout, tables }
    }

    /// Fresh network with `init` broadcast across the value tables.
    pub fn with_init(variant: Variant, init: f64) -> Self {
        let mut net = Self::new(variant);
        net.init_evs(init);
        net
    }

    #[inline]
    pub fn variant(&self) -> Variant {
        self.layout.variant
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.layout.shape
    }

    /// Broadcast `init / effective_tuples` into every value entry and zero
    /// the residual statistics, so that summing over tuples reproduces
    /// `init` for any board.
    pub fn init_evs(&mut self, init: f64) {
        self.tables
            .reset(init / self.layout.shape.effective_tuples as f64);
    }

    /// Stage of `board`: 1 once any cell reaches the threshold exponent.
    #[inline]
    fn stage(board: &Board) -> usize {
        if board.cells().iter().any(|&c| c >= STAGE_THRESHOLD) {
            1
        } else {
            0
        }
    }

    /// Mixed-radix pattern index of `board` under `placement`, most
    /// significant cell first. Cell values must be `< RADIX`; this is not
    /// checked in release builds.
    #[inline]
    fn index(&self, placement: &Placement, board: &Board) -> usize {
        let mut index = 0;
        for k in 0..self.layout.shape.arity {
            let cell = board.cell(placement.cells[k]);
            debug_assert!((cell as usize) < RADIX);
            index = index * RADIX + cell as usize;
        }
        index
    }

    /// Value estimate for the exact board passed in: the sum of every
    /// tuple's value entry.
    ///
    /// Symmetric variants assume the caller queries the canonical
    /// (un-transformed) board; evaluation of any of its 8 dihedral
    /// transforms yields the same value.
    pub fn evaluate(&self, board: &Board) -> f64 {
        let stage = Self::stage(board);
        let mut ev = 0.0;
        for placement in &self.layout.placements {
            let index = self.index(placement, board);
            ev += self
                .tables
                .value(self.tables.offset(stage, placement.table, index));
        }
        ev
    }

    /// Apply the whole-network training residual `diff` to `board`.
    ///
    /// The residual is split evenly across the effective tuples, so on a
    /// fresh entry set, re-evaluating immediately after the update moves
    /// the total estimate by exactly `diff`.
    pub fn update(&mut self, board: &Board, diff: f64) {
        let share = diff / self.layout.shape.effective_tuples as f64;
        let stage = Self::stage(board);
        for placement in &self.layout.placements {
            let index = self.index(placement, board);
            let offset = self.tables.offset(stage, placement.table, index);
            self.tables.apply(offset, share);
        }
    }

    /// The `(stage, table, index)` entries `board` resolves to, one per
    /// effective tuple, in placement order.
    pub fn resolved_entries(&self, board: &Board) -> Vec<ResolvedEntry> {
        let stage = Self::stage(board);
        self.layout
            .placements
            .iter()
            .map(|placement| {
                let index = self.index(placement, board);
                let offset = self.tables.offset(stage, placement.table, index);
                let (ev, err, aerr, uc) = self.tables.entry(offset);
                ResolvedEntry {
                    stage,
                    table: placement.table,
                    index,
                    ev,
                    err,
                    aerr,
                    uc,
                }
            })
            .collect()
    }

    /// Expected byte length of a weight file for this network's shape:
    /// three f64 dumps plus one u32 dump, `total_elements` each.
    fn file_len(&self) -> u64 {
        let total = self.layout.shape.total_elements() as u64;
        total * (3 * mem::size_of::<f64>() as u64 + mem::size_of::<u32>() as u64)
    }

    /// Serialize the four tables in fixed order (values, signed residual,
    /// absolute residual, update count) as flat native-representation
    /// dumps. Same-architecture round-trip only.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), NetworkError> {
        let file = File::create(path)?;
        let mut w = BufWriter::new(file);
        w.write_all(bytemuck::cast_slice(&self.tables.ev))?;
        w.write_all(bytemuck::cast_slice(&self.tables.err))?;
        w.write_all(bytemuck::cast_slice(&self.tables.aerr))?;
        w.write_all(bytemuck::cast_slice(&self.tables.uc))?;
        w.flush()?;
        Ok(())
    }

    /// Load a network for `variant` from a weight file written by `save`
    /// (or by an earlier run). The file length must match the variant's
    /// shape exactly; a partial file is an error, never a partial load.
    pub fn load<P: AsRef<Path>>(variant: Variant, path: P) -> Result<Self, NetworkError> {
        let mut net = Self::new(variant);
        net.read_evs(path)?;
        Ok(net)
    }

    /// Replace this network's tables with the contents of a weight file.
    pub fn read_evs<P: AsRef<Path>>(&mut self, path: P) -> Result<(), NetworkError> {
        let file = File::open(path)?;
        let found = file.metadata()?.len();
        let expected = self.file_len();
        if found != expected {
            return Err(NetworkError::ShapeMismatch {
                variant: self.layout.variant,
                expected,
                found,
            });
        }
        let mut r = BufReader::new(file);
        r.read_exact(bytemuck::cast_slice_mut(&mut self.tables.ev))?;
        r.read_exact(bytemuck::cast_slice_mut(&mut self.tables.err))?;
        r.read_exact(bytemuck::cast_slice_mut(&mut self.tables.aerr))?;
        r.read_exact(bytemuck::cast_slice_mut(&mut self.tables.uc))?;
        Ok(())
    }
}
