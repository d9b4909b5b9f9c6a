use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use ntuple_2048::network::{TupleNetwork, Variant};
use ntuple_2048::training::{GameOutcome, ScoreBlock, Session, TrainConfig};

#[derive(Debug, Parser)]
#[command(name = "train", about = "Self-play TD trainer for the 3x3 n-tuple network")]
struct Args {
    /// RNG seed for this run; also part of output paths and file names
    seed: u64,

    /// Run name; output lands under <output-root>/<run-name>/seed<seed>/
    run_name: String,

    /// Network variant (table shapes differ per variant)
    #[arg(long, value_enum, default_value_t = Variant::Sym6)]
    variant: Variant,

    /// Root directory for weight files and logs
    #[arg(long, default_value = "ntuple_dat")]
    output_root: PathBuf,

    /// Initial value broadcast across the network before training
    #[arg(long, default_value_t = 0.0)]
    init_ev: f64,

    /// Resume from a weight file written by an earlier run
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Updates between checkpoints
    #[arg(long, default_value_t = 50_000_000)]
    storage_frequency: u64,

    /// Checkpoints to write before the run stops
    #[arg(long, default_value_t = 10)]
    storage_count: u32,

    /// Hard ceiling on self-play games
    #[arg(long, default_value_t = 1_000_000_000)]
    max_games: u64,

    /// Games per score-log block
    #[arg(long, default_value_t = 10_000)]
    block_games: u64,

    /// Suppress the status line
    #[arg(long)]
    quiet: bool,
}

#[derive(Serialize)]
struct RunMeta {
    tuple: usize,
    sym: &'static str,
    seed: u64,
    init_ev: f64,
    storage_frequency: u64,
    storage_count: u32,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let out_dir = args
        .output_root
        .join(&args.run_name)
        .join(format!("seed{}", args.seed))
        .join(args.variant.dir_name());
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let network = match &args.resume {
        Some(path) => TupleNetwork::load(args.variant, path)
            .with_context(|| format!("loading weight file {}", path.display()))?,
        None => TupleNetwork::with_init(args.variant, args.init_ev),
    };

    write_meta(&out_dir, &args)?;
    let mut score_log = open_score_log(&out_dir, &args)?;

    let cfg = TrainConfig {
        seed: args.seed,
        storage_frequency: args.storage_frequency,
        storage_count: args.storage_count,
        max_games: args.max_games,
    };
    let mut session = Session::new(network, cfg, &out_dir);

    let pb = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} | Games: {msg}")?
                .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    };

    let start = Instant::now();
    let condition = args.variant.label();
    let mut block = ScoreBlock::default();
    let mut total_games: u64 = 0;
    let mut checkpoints_seen: u32 = 0;

    loop {
        let outcome = session.play_game()?;
        // Report any checkpoints the game produced.
        while checkpoints_seen < session.checkpoints_written() {
            let path = session.checkpoint_path(checkpoints_seen);
            if let Some(pb) = &pb {
                pb.println(format!("stored {}", path.display()));
            } else {
                println!("stored {}", path.display());
            }
            checkpoints_seen += 1;
        }
        let result = match outcome {
            GameOutcome::Completed(result) => result,
            GameOutcome::BudgetExhausted => break,
        };
        total_games += 1;
        block.add(result.score);

        if block.games() == args.block_games {
            if let Some(summary) = block.take() {
                writeln!(
                    score_log,
                    "{},{},{},{},{},{},{:.6},{:.6},{},{}",
                    condition,
                    args.seed,
                    std::process::id(),
                    total_games,
                    summary.games,
                    session.train_count(),
                    summary.mean,
                    summary.sd,
                    summary.min,
                    summary.max
                )?;
                score_log.flush()?;
            }
        }
        if let Some(pb) = &pb {
            let elapsed = start.elapsed().as_secs_f64().max(1e-6);
            pb.set_message(format!(
                "{} | games/sec: {:.1} | last score: {}",
                total_games,
                total_games as f64 / elapsed,
                result.score
            ));
        }
        if session.finished() {
            break;
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    if session.finished() {
        println!(
            "Run complete: {} games, {} updates, {} checkpoints in {}",
            total_games,
            session.train_count(),
            session.checkpoints_written(),
            out_dir.display()
        );
    } else {
        eprintln!(
            "Training finished before saving {} checkpoints ({} written)",
            args.storage_count,
            session.checkpoints_written()
        );
    }
    Ok(())
}

fn write_meta(out_dir: &std::path::Path, args: &Args) -> anyhow::Result<()> {
    let meta = RunMeta {
        tuple: args.variant.arity(),
        sym: if args.variant.symmetric() { "sym" } else { "notsym" },
        seed: args.seed,
        init_ev: args.init_ev,
        storage_frequency: args.storage_frequency,
        storage_count: args.storage_count,
    };
    let path = out_dir.join("meta.json");
    fs::write(&path, serde_json::to_string_pretty(&meta)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn open_score_log(out_dir: &std::path::Path, args: &Args) -> anyhow::Result<File> {
    let path = out_dir.join(format!(
        "log_score_{}_seed{}_pid{}.csv",
        args.variant.label(),
        args.seed,
        std::process::id()
    ));
    let mut file =
        File::create(&path).with_context(|| format!("creating score log {}", path.display()))?;
    writeln!(
        file,
        "condition,seed,pid,games_total,block_games,traincount_total,\
         score_mean,score_sd,score_min,score_max"
    )?;
    Ok(file)
}
