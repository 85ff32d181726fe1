//! Headless lab-simulation runner.
//!
//! This binary plays complete games without a frontend, for balance
//! sweeps, CI determinism checks, and replay verification.
//!
//! # Usage
//!
//! ```bash
//! # Play one game and print a JSON summary
//! cargo run -p lab_headless -- run --seed pilot-1 --strategy balanced --json
//!
//! # Run a batch sweep
//! cargo run -p lab_headless -- batch --count 200 --output results/
//!
//! # Verify determinism of one seed
//! cargo run -p lab_headless -- verify --seed pilot-1 --runs 8
//!
//! # Verify a recorded replay
//! cargo run -p lab_headless -- replay --file game.replay
//! ```
//!
//! Logs go to stderr; structured output (JSON summaries) goes to stdout.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lab_core::data::Scenario;
use lab_core::prelude::{Replay, Seed};
use lab_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::{run_game, RunConfig},
    strategies::Strategy,
};

#[derive(Parser)]
#[command(name = "lab_headless")]
#[command(about = "Headless lab-simulation runner for balance testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single game under a scripted strategy
    Run {
        /// Seed (numeric or free text)
        #[arg(short, long, default_value = "0")]
        seed: String,

        /// Strategy: balanced, safety-first, expansion
        #[arg(long, default_value = "balanced")]
        strategy: String,

        /// Scenario RON file (built-in scenario if omitted)
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Override the scenario's turn limit
        #[arg(long)]
        max_turns: Option<u32>,

        /// Print the summary as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Write a replay of the game to this path
        #[arg(long)]
        replay_out: Option<PathBuf>,
    },

    /// Run a batch of games across consecutive seeds
    Batch {
        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Starting numeric seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Strategy applied to every game
        #[arg(long, default_value = "balanced")]
        strategy: String,

        /// Scenario RON file (built-in scenario if omitted)
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Output directory for results JSON
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Override the scenario's turn limit
        #[arg(long)]
        max_turns: Option<u32>,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        /// Seed to verify (numeric or free text)
        #[arg(long, default_value = "12345")]
        seed: String,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Strategy to play during verification
        #[arg(long, default_value = "balanced")]
        strategy: String,

        /// Scenario RON file (built-in scenario if omitted)
        #[arg(long)]
        scenario: Option<PathBuf>,
    },

    /// Verify a recorded replay file
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs to stderr; stdout is reserved for structured output.
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Commands::Run {
            seed,
            strategy,
            scenario,
            max_turns,
            json,
            replay_out,
        } => cmd_run(&seed, &strategy, scenario.as_deref(), max_turns, json, replay_out),
        Commands::Batch {
            count,
            seed,
            strategy,
            scenario,
            output,
            max_turns,
        } => cmd_batch(count, seed, strategy, scenario.as_deref(), output, max_turns),
        Commands::Verify {
            seed,
            runs,
            strategy,
            scenario,
        } => cmd_verify(&seed, runs, &strategy, scenario.as_deref()),
        Commands::Replay { file } => cmd_replay(&file),
    }
}

/// Parse a seed argument: plain integers become numeric seeds, anything
/// else is folded as text.
fn parse_seed(arg: &str) -> Seed {
    arg.parse::<u64>().map_or_else(|_| Seed::from(arg), Seed::from)
}

/// Parse a strategy name or exit.
fn parse_strategy(name: &str) -> Strategy {
    Strategy::from_name(name).unwrap_or_else(|| {
        eprintln!("Unknown strategy '{name}' (expected balanced, safety-first, or expansion)");
        std::process::exit(1);
    })
}

/// Load a scenario from a RON file, or the built-in one.
fn load_scenario(path: Option<&Path>) -> Scenario {
    let Some(path) = path else {
        return Scenario::builtin();
    };
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Failed to read scenario '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    };
    match Scenario::from_ron_str(&path.display().to_string(), &text) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Failed to load scenario '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

/// Play one game and report the summary.
fn cmd_run(
    seed: &str,
    strategy: &str,
    scenario: Option<&Path>,
    max_turns: Option<u32>,
    json: bool,
    replay_out: Option<PathBuf>,
) {
    let config = RunConfig {
        scenario: load_scenario(scenario),
        seed: parse_seed(seed),
        strategy: parse_strategy(strategy),
        max_turns,
    };

    let result = match run_game(config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Game failed: {e}");
            std::process::exit(1);
        }
    };

    if let Some(path) = replay_out {
        let replay = Replay::capture(&result.session);
        let bytes = match replay.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("Failed to encode replay: {e}");
                std::process::exit(1);
            }
        };
        if let Err(e) = std::fs::write(&path, bytes) {
            eprintln!("Failed to write replay '{}': {}", path.display(), e);
            std::process::exit(1);
        }
        eprintln!("Replay saved to: {}", path.display());
    }

    let summary = &result.summary;
    if json {
        match serde_json::to_string_pretty(summary) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Failed to encode summary: {e}");
                std::process::exit(1);
            }
        }
    } else {
        eprintln!("Outcome: {}", summary.outcome);
        eprintln!("Turns played: {}", summary.turns_played);
        eprintln!("Popups answered: {}", summary.popups_answered);
        for (name, value) in &summary.final_resources {
            eprintln!("  {name}: {value}");
        }
        eprintln!("Final state hash: {:016x}", summary.final_state_hash);
        if summary.degraded {
            eprintln!("WARNING: at least one turn force-completed");
        }
    }
}

/// Run a batch sweep and write aggregated results.
fn cmd_batch(
    count: u32,
    seed: u64,
    strategy: String,
    scenario: Option<&Path>,
    output: PathBuf,
    max_turns: Option<u32>,
) {
    let scenario = load_scenario(scenario);
    let config = BatchConfig {
        game_count: count,
        seed_start: seed,
        strategy,
        output_dir: output.clone(),
        max_turns,
    };

    let results = match run_batch(&scenario, config) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("Batch failed: {e}");
            std::process::exit(1);
        }
    };

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        eprintln!("Failed to save results: {e}");
        std::process::exit(1);
    }

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Games played: {}", results.games.len());
    if !results.errors.is_empty() {
        eprintln!("Games FAILED: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!(
        "Throughput: {:.1} games/sec",
        results.games.len() as f64 / results.duration_seconds.max(0.001)
    );
    eprintln!("\nOutcomes:");
    let total = results.games.len().max(1) as f64;
    for (outcome, count) in &results.outcome_counts {
        eprintln!(
            "  {}: {} ({:.1}%)",
            outcome,
            count,
            f64::from(*count) / total * 100.0
        );
    }
    if results.degraded_games > 0 {
        eprintln!("\nDegraded games: {}", results.degraded_games);
    }

    if !results.errors.is_empty() {
        eprintln!("\nGAME FAILURES:");
        for (seed_value, message) in results.errors.iter().take(10) {
            eprintln!("  seed {seed_value}: {message}");
        }
        if results.errors.len() > 10 {
            eprintln!("  ... and {} more failures", results.errors.len() - 10);
        }
    }

    eprintln!("\nResults saved to: {}", results_path.display());
}

/// Verify determinism of one seed.
fn cmd_verify(seed: &str, runs: u32, strategy: &str, scenario: Option<&Path>) {
    let scenario = load_scenario(scenario);
    let seed = parse_seed(seed);
    let strategy = parse_strategy(strategy);

    tracing::info!(seed = ?seed, runs = runs, "verifying determinism");

    match verify_determinism(&scenario, &seed, strategy, runs) {
        Ok(hash) => {
            eprintln!("PASS: all {runs} runs produced identical results");
            eprintln!("  Final state hash: {hash:016x}");
        }
        Err(e) => {
            eprintln!("FAIL: {e}");
            std::process::exit(1);
        }
    }
}

/// Verify a recorded replay file.
fn cmd_replay(file: &Path) {
    let bytes = match std::fs::read(file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read replay '{}': {}", file.display(), e);
            std::process::exit(1);
        }
    };

    let replay = match Replay::from_bytes(&bytes) {
        Ok(replay) => replay,
        Err(e) => {
            eprintln!("Failed to load replay: {e}");
            std::process::exit(1);
        }
    };

    eprintln!("Loaded replay:");
    eprintln!("  Turns: {}", replay.turns());
    eprintln!("  Recorded hash: {:016x}", replay.final_hash());

    match replay.verify() {
        Ok(hash) => {
            eprintln!("PASS: replay verified");
            eprintln!("  Final state hash: {hash:016x}");
        }
        Err(e) => {
            eprintln!("FAIL: {e}");
            std::process::exit(1);
        }
    }
}
