use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};

use ntuple_2048::engine::{Board, GameState, Move};
use ntuple_2048::network::{TupleNetwork, Variant};
use ntuple_2048::statedump::{self, Record};

/// Value written for an illegal direction in per-direction output.
const ILLEGAL_EV: f64 = -1e10;

#[derive(Debug, Parser)]
#[command(name = "eval", about = "Batch evaluators over trained n-tuple weight files")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play greedy games with a trained network and write bucketed score
    /// averages as CSV
    Scores {
        /// Weight file to load
        dat: PathBuf,
        /// Output CSV path
        out: PathBuf,
        /// Network variant; inferred from the weight file name when omitted
        #[arg(long, value_enum)]
        variant: Option<Variant>,
        /// Games to play
        #[arg(long, default_value_t = 10_000)]
        games: u64,
        /// Games per averaging bucket
        #[arg(long, default_value_t = 1_000)]
        avescope: u64,
        /// RNG seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Evaluate recorded pre-move states: four per-direction afterstate
    /// values plus a progress scalar per board
    States {
        /// Weight file to load
        dat: PathBuf,
        /// State dump to evaluate (state.txt)
        input: PathBuf,
        /// Output text path
        out: PathBuf,
        #[arg(long, value_enum)]
        variant: Option<Variant>,
    },
    /// Evaluate recorded afterstates: one value per board
    Afterstates {
        /// Weight file to load
        dat: PathBuf,
        /// Afterstate dump to evaluate (after-state.txt)
        input: PathBuf,
        /// Output text path
        out: PathBuf,
        #[arg(long, value_enum)]
        variant: Option<Variant>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Scores {
            dat,
            out,
            variant,
            games,
            avescope,
            seed,
        } => {
            if games == 0 || avescope == 0 {
                bail!("games and avescope must be > 0");
            }
            let net = load_network(&dat, variant)?;
            run_scores(&net, &out, games, avescope, seed)
        }
        Command::States {
            dat,
            input,
            out,
            variant,
        } => {
            let net = load_network(&dat, variant)?;
            run_states(&net, &input, &out)
        }
        Command::Afterstates {
            dat,
            input,
            out,
            variant,
        } => {
            let net = load_network(&dat, variant)?;
            run_afterstates(&net, &input, &out)
        }
    }
}

fn load_network(dat: &Path, explicit: Option<Variant>) -> anyhow::Result<TupleNetwork> {
    let variant = match explicit {
        Some(v) => v,
        None => infer_variant(dat)?,
    };
    TupleNetwork::load(variant, dat)
        .with_context(|| format!("loading weight file {}", dat.display()))
}

/// Recover the variant from a checkpoint file name like
/// `6tuple_sym_data_13_0.dat`. Shapes are not self-describing in the file,
/// so this must be resolved before any table read.
fn infer_variant(dat: &Path) -> anyhow::Result<Variant> {
    let name = dat
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let notsym = name.contains("notsym") || name.contains("nosym");
    match (name.as_bytes().first(), notsym) {
        (Some(b'4'), false) => Ok(Variant::Sym4),
        (Some(b'4'), true) => Ok(Variant::Notsym4),
        (Some(b'6'), false) => Ok(Variant::Sym6),
        (Some(b'6'), true) => Ok(Variant::Notsym6),
        _ => bail!(
            "cannot infer variant from file name {name:?}; pass --variant explicitly"
        ),
    }
}

/// Greedy afterstate value of a legal move: network estimate plus the
/// immediate reward.
fn branch_value(net: &TupleNetwork, state: &GameState, after: &GameState) -> f64 {
    net.evaluate(&after.board) + f64::from(after.score - state.score)
}

/// Play one greedy game to completion; returns the final score.
fn play_greedy(net: &TupleNetwork, rng: &mut StdRng) -> u32 {
    let mut state = GameState::new(rng);
    loop {
        let mut selected: Option<(GameState, f64)> = None;
        for dir in Move::ALL {
            if let Some(after) = state.play(dir) {
                let value = branch_value(net, &state, &after);
                if selected.map_or(true, |(_, best)| value > best) {
                    selected = Some((after, value));
                }
            }
        }
        let Some((after, _)) = selected else {
            return state.score;
        };
        state = after;
        state.put_new_tile(rng);
        if state.is_game_over() {
            return state.score;
        }
    }
}

/// Streaming mean and standard deviation (Welford).
#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Stats {
    fn add(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn stddev(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.m2 / self.count as f64).sqrt()
    }
}

fn run_scores(
    net: &TupleNetwork,
    out: &Path,
    games: u64,
    avescope: u64,
    seed: u64,
) -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let buckets = ((games + avescope - 1) / avescope) as usize;
    let mut stats = vec![Stats::default(); buckets];
    for gid in 0..games {
        let score = play_greedy(net, &mut rng);
        stats[(gid / avescope) as usize].add(f64::from(score));
    }

    let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
    let mut w = BufWriter::new(file);
    writeln!(w, "start_game,end_game,avg_score,stddev,count")?;
    for (i, s) in stats.iter().enumerate() {
        let start_game = i as u64 * avescope + 1;
        let end_game = ((i as u64 + 1) * avescope).min(games);
        writeln!(
            w,
            "{},{},{:.6},{:.6},{}",
            start_game,
            end_game,
            s.mean,
            s.stddev(),
            s.count
        )?;
    }
    w.flush()?;
    Ok(())
}

fn run_states(net: &TupleNetwork, input: &Path, out: &Path) -> anyhow::Result<()> {
    let records = statedump::read_records(input)
        .with_context(|| format!("reading state dump {}", input.display()))?;
    let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
    let mut w = BufWriter::new(file);
    for record in records {
        match record {
            Record::GameOver(line) => writeln!(w, "{line}")?,
            Record::Board(board) => {
                let state = GameState { board, score: 0 };
                for dir in Move::ALL {
                    let value = match state.play(dir) {
                        Some(after) => net.evaluate(&after.board),
                        None => ILLEGAL_EV,
                    };
                    write!(w, "{value:.6} ")?;
                }
                writeln!(w, "{}", progress(&board))?;
            }
        }
    }
    w.flush()?;
    Ok(())
}

fn run_afterstates(net: &TupleNetwork, input: &Path, out: &Path) -> anyhow::Result<()> {
    let records = statedump::read_records(input)
        .with_context(|| format!("reading afterstate dump {}", input.display()))?;
    let file = File::create(out).with_context(|| format!("creating {}", out.display()))?;
    let mut w = BufWriter::new(file);
    for record in records {
        match record {
            Record::GameOver(line) => writeln!(w, "{line}")?,
            Record::Board(board) => writeln!(w, "{:.6}", net.evaluate(&board))?,
        }
    }
    w.flush()?;
    Ok(())
}

/// Progress scalar of a board: half the total face value on it.
fn progress(board: &Board) -> u32 {
    board.total_value() / 2
}
