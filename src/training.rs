//! Self-play TD(0) training session.
//!
//! One session owns one network, one seeded RNG and one output directory;
//! parallel exploration is done by running independent processes with
//! distinct seeds, never by sharing a session. Moves are picked by 1-ply
//! greedy afterstate lookahead (network estimate plus immediate reward),
//! and every turn past the first trains the previous afterstate toward the
//! selected value; the terminal afterstate is anchored to zero.

use std::path::{Path, PathBuf};

use rand::{rngs::StdRng, SeedableRng};

use crate::engine::{Board, GameState, Move};
use crate::network::{NetworkError, TupleNetwork};

#[derive(thiserror::Error, Debug)]
pub enum TrainError {
    /// SELECT found no legal direction even though the previous terminal
    /// check passed. This is a bug in move or terminal-detection logic,
    /// not a recoverable runtime condition.
    #[error("no legal move at turn {turn} on a board that is not game over")]
    NoLegalMove { turn: u32 },
    #[error(transparent)]
    Network(#[from] NetworkError),
}

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub seed: u64,
    /// Write a checkpoint every this many updates.
    pub storage_frequency: u64,
    /// Stop the run after this many checkpoints.
    pub storage_count: u32,
    /// Hard ceiling on completed games; once reached, `play_game`
    /// returns `BudgetExhausted` without playing.
    pub max_games: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            seed: 0,
            storage_frequency: 50_000_000,
            storage_count: 10,
            max_games: 1_000_000_000,
        }
    }
}

/// Result of one completed self-play game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameResult {
    pub score: u32,
    pub turns: u32,
}

/// Outcome of driving one game through the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    Completed(GameResult),
    /// The checkpoint budget ran out mid-game (the partial game is
    /// discarded), or the game ceiling was already reached. Either way
    /// this is the run's deliberate termination, not a failure.
    BudgetExhausted,
}

/// A self-play training run: network, RNG and checkpoint bookkeeping under
/// single ownership.
pub struct Session {
    cfg: TrainConfig,
    network: TupleNetwork,
    rng: StdRng,
    out_dir: PathBuf,
    train_count: u64,
    games_played: u64,
    checkpoints: u32,
}

impl Session {
    pub fn new<P: AsRef<Path>>(network: TupleNetwork, cfg: TrainConfig, out_dir: P) -> Self {
        let rng = StdRng::seed_from_u64(cfg.seed);
        Session {
            cfg,
            network,
            rng,
            out_dir: out_dir.as_ref().to_path_buf(),
            train_count: 0,
            games_played: 0,
            checkpoints: 0,
        }
    }

    #[inline]
    pub fn network(&self) -> &TupleNetwork {
        &self.network
    }

    /// Total updates applied across the whole run.
    #[inline]
    pub fn train_count(&self) -> u64 {
        self.train_count
    }

    /// Completed games across the whole run.
    #[inline]
    pub fn games_played(&self) -> u64 {
        self.games_played
    }

    #[inline]
    pub fn checkpoints_written(&self) -> u32 {
        self.checkpoints
    }

    /// True once the checkpoint budget is spent.
    #[inline]
    pub fn finished(&self) -> bool {
        self.checkpoints >= self.cfg.storage_count
    }

    /// Path of checkpoint number `n` for this run.
    pub fn checkpoint_path(&self, n: u32) -> PathBuf {
        self.out_dir
            .join(self.network.variant().dat_file_name(self.cfg.seed, n))
    }

    /// Play one self-play game, applying TD updates along the way.
    pub fn play_game(&mut self) -> Result<GameOutcome, TrainError> {
        if self.games_played >= self.cfg.max_games {
            return Ok(GameOutcome::BudgetExhausted);
        }
        let mut state = GameState::new(&mut self.rng);
        let mut last_board = Board::EMPTY;
        let mut turn = 0u32;
        loop {
            turn += 1;
            // SELECT: greedy over afterstate value + immediate reward,
            // ties to the lowest direction index.
            let mut selected: Option<(GameState, f64)> = None;
            for dir in Move::ALL {
                if let Some(after) = state.play(dir) {
                    let value = self.network.evaluate(&after.board)
                        + f64::from(after.score - state.score);
                    if selected.map_or(true, |(_, best)| value > best) {
                        selected = Some((after, value));
                    }
                }
            }
            let (after, value) = selected.ok_or(TrainError::NoLegalMove { turn })?;
            // APPLY.
            state = after;
            // TRAIN: every turn but the first, pull the previous afterstate
            // toward the value selected from it.
            if turn > 1 {
                let diff = value - self.network.evaluate(&last_board);
                self.network.update(&last_board, diff);
                if self.count_update()? {
                    return Ok(GameOutcome::BudgetExhausted);
                }
            }
            last_board = state.board;
            // SPAWN.
            state.put_new_tile(&mut self.rng);
            // CHECK.
            if state.is_game_over() {
                let diff = 0.0 - self.network.evaluate(&last_board);
                self.network.update(&last_board, diff);
                self.count_update()?;
                self.games_played += 1;
                return Ok(GameOutcome::Completed(GameResult {
                    score: state.score,
                    turns: turn,
                }));
            }
        }
    }

    /// Count one applied update; write a checkpoint on the cadence.
    /// Returns true once the checkpoint budget is spent.
    fn count_update(&mut self) -> Result<bool, TrainError> {
        self.train_count += 1;
        if self.train_count % self.cfg.storage_frequency == 0 {
            let path = self.checkpoint_path(self.checkpoints);
            self.network.save(&path)?;
            self.checkpoints += 1;
        }
        Ok(self.finished())
    }
}

/// Running score statistics over a block of games, reported between
/// checkpoints (mean/sd/min/max the way the score log records them).
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreBlock {
    games: u64,
    sum: u64,
    sumsq: u64,
    min: u32,
    max: u32,
}

/// Summary of one finished score block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockSummary {
    pub games: u64,
    pub mean: f64,
    pub sd: f64,
    pub min: u32,
    pub max: u32,
}

impl ScoreBlock {
    pub fn add(&mut self, score: u32) {
        if self.games == 0 {
            self.min = score;
            self.max = score;
        } else {
            self.min = self.min.min(score);
            self.max = self.max.max(score);
        }
        self.games += 1;
        self.sum += u64::from(score);
        self.sumsq += u64::from(score) * u64::from(score);
    }

    #[inline]
    pub fn games(&self) -> u64 {
        self.games
    }

    /// Summarize and reset. `None` when the block is empty.
    pub fn take(&mut self) -> Option<BlockSummary> {
        if self.games == 0 {
            return None;
        }
        let n = self.games as f64;
        let mean = self.sum as f64 / n;
        let var = if self.games >= 2 {
            ((self.sumsq as f64 - (self.sum as f64) * (self.sum as f64) / n) / (n - 1.0)).max(0.0)
        } else {
            0.0
        };
        let summary = BlockSummary {
            games: self.games,
            mean,
            sd: var.sqrt(),
            min: self.min,
            max: self.max,
        };
        *self = ScoreBlock::default();
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Variant;
    use tempfile::tempdir;

    fn small_session(dir: &Path, seed: u64, frequency: u64, count: u32) -> Session {
        let cfg = TrainConfig {
            seed,
            storage_frequency: frequency,
            storage_count: count,
            max_games: 1_000,
        };
        Session::new(TupleNetwork::new(Variant::Sym4), cfg, dir)
    }

    #[test]
    fn games_complete_and_score() {
        let dir = tempdir().unwrap();
        let mut session = small_session(dir.path(), 7, u64::MAX, 1);
        for _ in 0..5 {
            match session.play_game().unwrap() {
                GameOutcome::Completed(result) => {
                    assert!(result.score > 0);
                    assert!(result.turns > 1);
                }
                GameOutcome::BudgetExhausted => panic!("budget cannot run out here"),
            }
        }
        assert!(session.train_count() > 0);
    }

    #[test]
    fn same_seed_reproduces_the_run() {
        let dir_a = tempdir().unwrap();
        let dir_b = tempdir().unwrap();
        let mut a = small_session(dir_a.path(), 99, u64::MAX, 1);
        let mut b = small_session(dir_b.path(), 99, u64::MAX, 1);
        for _ in 0..3 {
            assert_eq!(a.play_game().unwrap(), b.play_game().unwrap());
        }
        assert_eq!(a.train_count(), b.train_count());
    }

    #[test]
    fn checkpoints_written_on_cadence_and_budget_stops_run() {
        let dir = tempdir().unwrap();
        let mut session = small_session(dir.path(), 3, 50, 2);
        let mut games = 0;
        while !session.finished() {
            session.play_game().unwrap();
            games += 1;
            assert!(games < 1_000, "budget never reached");
        }
        assert_eq!(session.checkpoints_written(), 2);
        assert!(session.train_count() >= 100);
        for n in 0..2 {
            let path = session.checkpoint_path(n);
            let meta = std::fs::metadata(&path).unwrap();
            let total = session.network().shape().total_elements() as u64;
            assert_eq!(meta.len(), total * 28);
        }
    }

    #[test]
    fn game_ceiling_stops_the_run() {
        let dir = tempdir().unwrap();
        let cfg = TrainConfig {
            seed: 11,
            storage_frequency: u64::MAX,
            storage_count: 1,
            max_games: 3,
        };
        let mut session = Session::new(TupleNetwork::new(Variant::Sym4), cfg, dir.path());
        for _ in 0..3 {
            assert!(matches!(
                session.play_game().unwrap(),
                GameOutcome::Completed(_)
            ));
        }
        assert_eq!(session.games_played(), 3);
        assert_eq!(session.play_game().unwrap(), GameOutcome::BudgetExhausted);
        // The ceiling stops play without touching the checkpoint budget.
        assert_eq!(session.games_played(), 3);
        assert_eq!(session.checkpoints_written(), 0);
    }

    #[test]
    fn checkpoint_round_trips_through_load() {
        let dir = tempdir().unwrap();
        let mut session = small_session(dir.path(), 5, 20, 1);
        while !session.finished() {
            session.play_game().unwrap();
        }
        let loaded = TupleNetwork::load(Variant::Sym4, session.checkpoint_path(0)).unwrap();
        assert_eq!(loaded.shape(), session.network().shape());
    }

    #[test]
    fn score_block_statistics() {
        let mut block = ScoreBlock::default();
        assert!(block.take().is_none());
        for score in [10, 20, 30] {
            block.add(score);
        }
        let summary = block.take().unwrap();
        assert_eq!(summary.games, 3);
        assert!((summary.mean - 20.0).abs() < 1e-12);
        assert!((summary.sd - 10.0).abs() < 1e-12);
        assert_eq!(summary.min, 10);
        assert_eq!(summary.max, 30);
        // take() resets the block.
        assert!(block.take().is_none());
    }
}
