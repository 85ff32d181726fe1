//! Headless game runner for batch simulation and CI verification.
//!
//! This crate drives complete games without a frontend:
//!
//! - **Scripted play**: [`Strategy`] policies choose actions and popup
//!   responses each turn
//! - **Batch runs**: many seeds in parallel, with outcome distributions
//!   written as JSON for balance review
//! - **Determinism checks**: the same seed run repeatedly must produce
//!   identical final state hashes
//! - **Replay verification**: recorded sessions re-run and compared
//!
//! # Example
//!
//! ```bash
//! # Play one game with a scripted strategy
//! cargo run -p lab_headless -- run --seed pilot-1 --strategy balanced
//!
//! # Sweep 100 seeds and write results/batch.json
//! cargo run -p lab_headless -- batch --count 100 --output results
//!
//! # Confirm a seed is deterministic across 8 runs
//! cargo run -p lab_headless -- verify --seed pilot-1 --runs 8
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod runner;
pub mod strategies;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults};
pub use runner::{run_game, GameSummary, RunConfig};
pub use strategies::Strategy;
