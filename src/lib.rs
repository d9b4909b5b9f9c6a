//! ntuple-2048: a 3x3 2048 engine + n-tuple TD(0) self-play trainer
//!
//! This crate provides:
//! - A 3x3 `Board`/`GameState` engine (`engine` module)
//! - An n-tuple value network with symmetric and unrolled variants,
//!   adaptive per-entry step sizes and flat binary checkpoints
//!   (`network` module)
//! - A self-play TD(0) training session with checkpoint budgeting
//!   (`training` module)
//! - The state-dump text format consumed by batch evaluators
//!   (`statedump` module)
//!
//! Quick start:
//! ```
//! use ntuple_2048::engine::GameState;
//! use ntuple_2048::network::{TupleNetwork, Variant};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic game start with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let state = GameState::new(&mut rng);
//! assert_eq!(state.score, 0);
//!
//! // A fresh network scores any board at the broadcast initial value
//! let net = TupleNetwork::with_init(Variant::Sym4, 100.0);
//! assert!((net.evaluate(&state.board) - 100.0).abs() < 1e-9);
//! ```
//!
//! Training loop (tiny budget to keep doctests fast)
//! ```
//! use ntuple_2048::network::{TupleNetwork, Variant};
//! use ntuple_2048::training::{GameOutcome, Session, TrainConfig};
//!
//! let dir = std::env::temp_dir().join("ntuple-2048-doctest");
//! std::fs::create_dir_all(&dir).unwrap();
//! let cfg = TrainConfig { seed: 1, storage_frequency: 100, storage_count: 1, max_games: 100 };
//! let mut session = Session::new(TupleNetwork::new(Variant::Sym4), cfg, &dir);
//! while !session.finished() {
//!     match session.play_game().unwrap() {
//!         GameOutcome::Completed(result) => assert!(result.score > 0),
//!         GameOutcome::BudgetExhausted => break,
//!     }
//! }
//! assert_eq!(session.checkpoints_written(), 1);
//! ```
pub mod engine;
pub mod network;
pub mod statedump;
pub mod training;
