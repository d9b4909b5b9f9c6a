/// The four parallel flat tables backing a network: value estimates plus
/// the per-entry residual statistics driving the adaptive step size.
///
/// All four are indexed by the same `(stage, table, pattern index)` offset;
/// learning and evaluation must never disagree on addressing, so the offset
/// computation lives here and nowhere else.
#[derive(Debug, Clone)]
pub struct Tables {
    tables: usize,
    entries: usize,
    /// Value estimates.
    pub(super) ev: Vec<f64>,
    /// Cumulative signed residuals.
    pub(super) err: Vec<f64>,
    /// Cumulative absolute residuals.
    pub(super) aerr: Vec<f64>,
    /// Update counts.
    pub(super) uc: Vec<u32>,
}

impl Tables {
    pub fn new(stages: usize, tables: usize, entries: usize) -> Self {
        let total = stages * tables * entries;
        Tables {
            tables,
            entries,
            ev: vec![0.0; total],
            err: vec![0.0; total],
            aerr: vec![0.0; total],
            uc: vec![0; total],
        }
    }

    /// Flat offset of `(stage, table, index)`.
    #[inline]
    pub fn offset(&self, stage: usize, table: usize, index: usize) -> usize {
        debug_assert!(table < self.tables);
        debug_assert!(index < self.entries);
        (stage * self.tables + table) * self.entries + index
    }

    /// Broadcast `value` into every `ev` entry and zero the statistics.
    pub fn reset(&mut self, value: f64) {
        self.ev.fill(value);
        self.err.fill(0.0);
        self.aerr.fill(0.0);
        self.uc.fill(0);
    }

    /// Apply one per-tuple share of a training residual at `offset`.
    ///
    /// `aerr` accumulates `|share|` and `err` the signed share, so
    /// `|err| <= aerr` always holds and the multiplier `|err| / aerr` stays
    /// in [0, 1]: near 0 when past residuals at this entry alternated in
    /// sign, near 1 when they have been consistently one-signed.
    #[inline]
    pub fn apply(&mut self, offset: usize, share: f64) {
        self.aerr[offset] += share.abs();
        self.err[offset] += share;
        let aerr = self.aerr[offset];
        if aerr == 0.0 {
            self.ev[offset] += share;
        } else {
            self.ev[offset] += share * (self.err[offset].abs() / aerr);
        }
        self.uc[offset] += 1;
    }

    /// Read the four scalars at `offset`: `(ev, err, aerr, uc)`.
    #[inline]
    pub fn entry(&self, offset: usize) -> (f64, f64, f64, u32) {
        (
            self.ev[offset],
            self.err[offset],
            self.aerr[offset],
            self.uc[offset],
        )
    }

    #[inline]
    pub fn value(&self, offset: usize) -> f64 {
        self.ev[offset]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_applies_full_share() {
        let mut t = Tables::new(1, 1, 10);
        t.apply(3, 0.5);
        assert_eq!(t.entry(3), (0.5, 0.5, 0.5, 1));
    }

    #[test]
    fn alternating_residuals_dampen_step() {
        let mut t = Tables::new(1, 1, 10);
        t.apply(0, 1.0);
        // err = 0, aerr = 2 -> multiplier 0, ev unchanged.
        t.apply(0, -1.0);
        let (ev, err, aerr, uc) = t.entry(0);
        assert_eq!(ev, 1.0);
        assert_eq!(err, 0.0);
        assert_eq!(aerr, 2.0);
        assert_eq!(uc, 2);
    }

    #[test]
    fn consistent_residuals_keep_full_step() {
        let mut t = Tables::new(1, 1, 10);
        for _ in 0..5 {
            t.apply(0, 0.25);
        }
        let (ev, err, aerr, uc) = t.entry(0);
        // |err| == aerr -> every step applied in full.
        assert!((ev - 1.25).abs() < 1e-12);
        assert_eq!(err, aerr);
        assert_eq!(uc, 5);
    }

    #[test]
    fn multiplier_stays_bounded() {
        let mut t = Tables::new(1, 1, 4);
        let shares = [0.3, -0.7, 0.1, 0.1, -0.2, 0.9, -0.9, 0.4];
        let mut count = 0;
        for &s in &shares {
            t.apply(2, s);
            count += 1;
            let (_, err, aerr, uc) = t.entry(2);
            assert!(err.abs() <= aerr + 1e-12);
            assert_eq!(uc, count);
        }
    }

    #[test]
    fn offsets_partition_the_tables() {
        let t = Tables::new(2, 3, 7);
        let mut seen = vec![false; 2 * 3 * 7];
        for stage in 0..2 {
            for table in 0..3 {
                for index in 0..7 {
                    let off = t.offset(stage, table, index);
                    assert!(!seen[off]);
                    seen[off] = true;
                }
            }
        }
        assert!(seen.iter().all(|&s| s));
    }
}
