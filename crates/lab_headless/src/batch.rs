//! Batch game runner for balance sweeps.
//!
//! Runs many seeds in parallel with rayon and aggregates outcome counts,
//! so a balance change can be judged across hundreds of games instead of
//! one anecdote. Also hosts the repeated-run determinism check used by CI.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use lab_core::data::Scenario;
use lab_core::error::{GameError, Result};
use lab_core::prelude::Seed;

use crate::runner::{run_game, GameSummary, RunConfig};
use crate::strategies::Strategy;

/// Configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of games to run.
    pub game_count: u32,
    /// First numeric seed; game `i` plays seed `seed_start + i`.
    pub seed_start: u64,
    /// Strategy name applied to every game.
    pub strategy: String,
    /// Directory the results JSON is written to.
    pub output_dir: PathBuf,
    /// Override for the scenario's turn limit, if set.
    pub max_turns: Option<u32>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            game_count: 100,
            seed_start: 0,
            strategy: Strategy::Balanced.name().to_string(),
            output_dir: PathBuf::from("results"),
            max_turns: None,
        }
    }
}

/// Aggregated results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Per-game summaries, in seed order.
    pub games: Vec<GameSummary>,
    /// How many games ended with each outcome label.
    pub outcome_counts: BTreeMap<String, u32>,
    /// Games where a turn force-completed on the stuck-step budget.
    pub degraded_games: u32,
    /// Errors encountered, as (seed, message) pairs.
    pub errors: Vec<(u64, String)>,
    /// Total wall-clock runtime.
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results as pretty-printed JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from a JSON file written by [`BatchResults::save`].
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file is missing or not valid JSON.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Run a batch of games across consecutive seeds.
///
/// Games are independent sessions, so rayon can run them in any order
/// without affecting per-game determinism. Results are sorted back into
/// seed order before aggregation.
///
/// # Errors
///
/// Returns an error if the strategy name is unknown. Individual game
/// failures are collected into [`BatchResults::errors`], not propagated.
pub fn run_batch(scenario: &Scenario, config: BatchConfig) -> Result<BatchResults> {
    let strategy = Strategy::from_name(&config.strategy).ok_or_else(|| {
        GameError::InvalidState(format!("unknown strategy: {}", config.strategy))
    })?;

    let start = Instant::now();
    info!(
        games = config.game_count,
        seed_start = config.seed_start,
        strategy = strategy.name(),
        "starting batch"
    );

    let runs: Vec<(u64, std::result::Result<GameSummary, String>)> = (0..config.game_count)
        .into_par_iter()
        .map(|index| {
            let seed_value = config.seed_start + u64::from(index);
            let run = RunConfig {
                scenario: scenario.clone(),
                seed: Seed::from(seed_value),
                strategy,
                max_turns: config.max_turns,
            };
            let outcome = run_game(run)
                .map(|result| result.summary)
                .map_err(|e| e.to_string());
            (seed_value, outcome)
        })
        .collect();

    let mut games = Vec::with_capacity(runs.len());
    let mut errors = Vec::new();
    let mut outcome_counts: BTreeMap<String, u32> = BTreeMap::new();
    let mut degraded_games = 0u32;

    for (seed_value, outcome) in runs {
        match outcome {
            Ok(summary) => {
                *outcome_counts.entry(summary.outcome.clone()).or_insert(0) += 1;
                if summary.degraded {
                    degraded_games += 1;
                }
                games.push(summary);
            }
            Err(message) => {
                warn!(seed = seed_value, error = %message, "game failed");
                errors.push((seed_value, message));
            }
        }
    }

    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        completed = games.len(),
        failed = errors.len(),
        degraded = degraded_games,
        duration_s = duration_seconds,
        "batch complete"
    );

    Ok(BatchResults {
        config,
        games,
        outcome_counts,
        degraded_games,
        errors,
        duration_seconds,
    })
}

/// Run the same seeded game repeatedly and require identical final hashes.
///
/// Returns the agreed-upon hash on success.
///
/// # Errors
///
/// Returns [`GameError::ReplayDiverged`] naming the first mismatched pair
/// of hashes, or any error the underlying games produce.
pub fn verify_determinism(
    scenario: &Scenario,
    seed: &Seed,
    strategy: Strategy,
    runs: u32,
) -> Result<u64> {
    let hashes: Vec<Result<u64>> = (0..runs.max(2))
        .into_par_iter()
        .map(|_| {
            let run = RunConfig {
                scenario: scenario.clone(),
                seed: seed.clone(),
                strategy,
                max_turns: None,
            };
            run_game(run).map(|result| result.summary.final_state_hash)
        })
        .collect();

    let mut first: Option<u64> = None;
    for hash in hashes {
        let hash = hash?;
        match first {
            None => first = Some(hash),
            Some(expected) if expected != hash => {
                return Err(GameError::ReplayDiverged {
                    recorded: expected,
                    replayed: hash,
                });
            }
            Some(_) => {}
        }
    }
    first.ok_or_else(|| GameError::InvalidState("no runs executed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_small_batch_aggregates() {
        let scenario = Scenario::builtin();
        let config = BatchConfig {
            game_count: 4,
            seed_start: 100,
            max_turns: Some(10),
            ..BatchConfig::default()
        };
        let results = run_batch(&scenario, config).unwrap();
        assert_eq!(results.games.len(), 4);
        assert!(results.errors.is_empty());
        let counted: u32 = results.outcome_counts.values().sum();
        assert_eq!(counted, 4);
        // Seed order survives parallel execution.
        assert_eq!(results.games[0].seed, Seed::from(100u64));
        assert_eq!(results.games[3].seed, Seed::from(103u64));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let scenario = Scenario::builtin();
        let config = BatchConfig {
            strategy: "nonsense".to_string(),
            ..BatchConfig::default()
        };
        assert!(run_batch(&scenario, config).is_err());
    }

    #[test]
    fn test_results_roundtrip_json() {
        let scenario = Scenario::builtin();
        let config = BatchConfig {
            game_count: 2,
            seed_start: 7,
            max_turns: Some(5),
            ..BatchConfig::default()
        };
        let results = run_batch(&scenario, config).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("sub").join("batch.json");
        results.save(&path).unwrap();
        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.games.len(), results.games.len());
        assert_eq!(loaded.outcome_counts, results.outcome_counts);
    }

    #[test]
    fn test_verify_determinism_agrees() {
        let scenario = Scenario::builtin();
        let seed = Seed::from("batch-det");
        let hash = verify_determinism(&scenario, &seed, Strategy::Balanced, 4).unwrap();
        let again = verify_determinism(&scenario, &seed, Strategy::Balanced, 2).unwrap();
        assert_eq!(hash, again);
    }
}
