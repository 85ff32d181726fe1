//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the turn engine produces
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Seed-sharing (weekly challenges, replays) requires the engine to be
//! 100% deterministic. Sources of non-determinism include:
//!
//! - **Unordered iteration**: `HashMap` iteration order is randomized.
//!   The engine uses `BTreeMap`/`BTreeSet` and definition order instead.
//!
//! - **System randomness**: No draws outside the per-turn seeded streams.
//!
//! - **Draw misalignment**: A conditional that sometimes skips an RNG
//!   draw shifts every later draw. Chance checks always consume a draw.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual subsystem determinism
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full games are reproducible
//! 4. **Parallel tests**: Running N games in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use lab_core::prelude::*;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of turns simulated.
    pub turns: u32,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic engine).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Engine is non-deterministic!\n\
                 Runs: {}\n\
                 Turns: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.turns,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel game runs.
#[derive(Debug, Clone)]
pub struct ParallelRunResult {
    /// Final state hash from each game.
    pub hashes: Vec<u64>,
    /// Number of turns each game ran.
    pub turns: u32,
    /// Number of games run.
    pub num_runs: usize,
}

impl ParallelRunResult {
    /// Check if all games produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all games matched.
    ///
    /// # Panics
    ///
    /// Panics if games produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel games diverged!\n\
                 Games: {}\n\
                 Turns: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_runs,
                self.turns,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `turns` - Number of steps per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute a state hash
///
/// # Example
///
/// ```ignore
/// use lab_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(
///     5,   // Run 5 times
///     100, // 100 turns each
///     || setup_session(),
///     |session| { play_turn(session, Vec::new()); },
///     |session| session.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    turns: u32,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..turns {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        turns,
    }
}

/// Simplified determinism verification for [`GameSession`].
///
/// Runs the session twice with identical setup and inputs, and verifies
/// the final state hashes match exactly. Popups are accepted.
pub fn verify_session_determinism<F, Q>(setup_fn: F, queue_fn: Q, turns: u32) -> bool
where
    F: Fn() -> GameSession,
    Q: Fn(u32) -> Vec<PlannedAction>,
{
    let result = verify_determinism(
        2,
        1,
        &setup_fn,
        |session| {
            for turn in 0..turns {
                if session.game_over().is_some() {
                    break;
                }
                crate::fixtures::play_turn(session, queue_fn(turn));
            }
        },
        GameSession::state_hash,
    );
    result.is_deterministic
}

/// Run N games in parallel using scoped threads and collect final hashes.
///
/// Useful for catching non-determinism that only manifests under thread
/// scheduling variations or memory layout differences.
pub fn run_parallel_sessions_scoped<F>(setup_fn: F, num_runs: usize, turns: u32) -> ParallelRunResult
where
    F: Fn() -> GameSession + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_runs)
            .map(|_| {
                s.spawn(|| {
                    let mut session = setup_fn();
                    crate::fixtures::play_idle_turns(&mut session, turns);
                    session.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    ParallelRunResult {
        hashes,
        turns,
        num_runs,
    }
}

/// Compare two game runs turn-by-turn, finding the first divergence.
///
/// Useful for debugging non-determinism by finding exactly which turn
/// two runs start to differ.
///
/// # Returns
///
/// `None` if the runs match, `Some(turn)` if they diverge at that turn.
pub fn find_first_divergence<F>(setup_fn: F, turns: u32) -> Option<u32>
where
    F: Fn() -> GameSession,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for turn in 1..=turns {
        if a.game_over().is_some() || b.game_over().is_some() {
            break;
        }
        crate::fixtures::play_turn(&mut a, Vec::new());
        crate::fixtures::play_turn(&mut b, Vec::new());

        if a.state_hash() != b.state_hash() {
            return Some(turn);
        }
    }

    None
}

/// Verify that a save round-trip preserves session state exactly.
///
/// This is what resuming a weekly-challenge run depends on.
pub fn verify_save_roundtrip<F>(setup_fn: F, turns: u32) -> bool
where
    F: Fn() -> GameSession,
{
    let mut session = setup_fn();
    crate::fixtures::play_idle_turns(&mut session, turns);

    let hash_before = session.state_hash();

    let Ok(save) = SaveGame::capture(&session) else {
        return false;
    };
    let Ok(bytes) = save.to_bytes() else {
        return false;
    };
    let Ok(restored) = SaveGame::from_bytes(&bytes).and_then(SaveGame::restore) else {
        return false;
    };

    restored.state_hash() == hash_before
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of engine determinism.
pub mod strategies {
    use proptest::prelude::*;

    use lab_core::prelude::*;

    /// Action IDs present in the built-in scenario.
    pub const BUILTIN_ACTIONS: [&str; 9] = [
        "fundraise",
        "hire_staff",
        "safety_research",
        "capability_research",
        "buy_compute",
        "community_outreach",
        "hire_manager",
        "compliance_office",
        "espionage_probe",
    ];

    /// Generate a seed: numeric or a short challenge-code-like string.
    pub fn arb_seed() -> impl Strategy<Value = Seed> {
        prop_oneof![
            any::<u64>().prop_map(Seed::from),
            "[a-z0-9]{4,12}".prop_map(Seed::Text),
        ]
    }

    /// Generate one planned action drawn from the built-in scenario.
    pub fn arb_planned_action() -> impl Strategy<Value = PlannedAction> {
        (0..BUILTIN_ACTIONS.len(), any::<bool>()).prop_map(|(index, delegated)| PlannedAction {
            action_id: BUILTIN_ACTIONS[index].to_string(),
            delegated,
        })
    }

    /// Generate an action queue for one turn.
    pub fn arb_queue(max_len: usize) -> impl Strategy<Value = Vec<PlannedAction>> {
        proptest::collection::vec(arb_planned_action(), 0..max_len)
    }

    /// Generate a popup response.
    pub fn arb_response() -> impl Strategy<Value = PopupResponse> {
        prop_oneof![
            Just(PopupResponse::Accept),
            Just(PopupResponse::Reduce),
            Just(PopupResponse::Dismiss),
            Just(PopupResponse::Defer),
        ]
    }

    /// Generate per-turn queues for a whole game.
    pub fn arb_game_inputs(turns: usize) -> impl Strategy<Value = Vec<Vec<PlannedAction>>> {
        proptest::collection::vec(arb_queue(4), turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{funded_scenario, play_turn, quiet_scenario, session};
    use lab_core::data::Scenario;
    use proptest::prelude::*;

    // =========================================================================
    // Basic determinism tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_idle_game_determinism() {
        assert!(verify_session_determinism(
            || session(quiet_scenario(), "harness"),
            |_| Vec::new(),
            20,
        ));
    }

    #[test]
    fn test_full_builtin_game_determinism() {
        assert!(verify_session_determinism(
            || session(Scenario::builtin(), "harness"),
            |turn| {
                if turn % 2 == 0 {
                    vec![PlannedAction::direct("fundraise")]
                } else {
                    vec![
                        PlannedAction::direct("safety_research"),
                        PlannedAction::direct("espionage_probe"),
                    ]
                }
            },
            30,
        ));
    }

    #[test]
    fn test_find_divergence_on_deterministic_game() {
        let divergence = find_first_divergence(|| session(Scenario::builtin(), "stable"), 15);
        assert!(divergence.is_none(), "Expected no divergence");
    }

    // =========================================================================
    // Save round-trip tests
    // =========================================================================

    #[test]
    fn test_save_roundtrip_fresh_game() {
        assert!(verify_save_roundtrip(
            || session(Scenario::builtin(), "fresh"),
            0
        ));
    }

    #[test]
    fn test_save_roundtrip_mid_game() {
        assert!(verify_save_roundtrip(
            || session(Scenario::builtin(), "midgame"),
            10
        ));
    }

    // =========================================================================
    // Parallel game tests
    // =========================================================================

    #[test]
    fn test_parallel_idle_games() {
        let result =
            run_parallel_sessions_scoped(|| session(quiet_scenario(), "parallel"), 4, 15);
        result.assert_deterministic();
    }

    #[test]
    fn test_parallel_builtin_games() {
        let result =
            run_parallel_sessions_scoped(|| session(Scenario::builtin(), "parallel"), 4, 15);
        result.assert_deterministic();
    }

    // =========================================================================
    // Property-based tests using proptest
    // =========================================================================

    proptest! {
        /// Any seed must produce a reproducible game.
        #[test]
        fn prop_any_seed_is_deterministic(seed in strategies::arb_seed()) {
            let seed2 = seed.clone();
            let run = move |seed: Seed| {
                let mut session = GameSession::new(funded_scenario(), seed)
                    .expect("builtin scenario validates");
                for _ in 0..8 {
                    if session.game_over().is_some() {
                        break;
                    }
                    play_turn(&mut session, vec![PlannedAction::direct("fundraise")]);
                }
                session.state_hash()
            };
            prop_assert_eq!(run(seed), run(seed2));
        }

        /// Random queues, including unaffordable and unknown-policy mixes,
        /// must replay identically.
        #[test]
        fn prop_random_queues_are_deterministic(
            inputs in strategies::arb_game_inputs(10),
        ) {
            let run = || {
                let mut session = GameSession::new(funded_scenario(), Seed::from("prop"))
                    .expect("builtin scenario validates");
                for queue in &inputs {
                    if session.game_over().is_some() {
                        break;
                    }
                    play_turn(&mut session, queue.clone());
                }
                session.state_hash()
            };
            prop_assert_eq!(run(), run());
        }

        /// Save round-trips must be exact at any point in a game.
        #[test]
        fn prop_save_roundtrip_is_exact(turns in 0u32..15) {
            prop_assert!(verify_save_roundtrip(
                || session(Scenario::builtin(), "prop-save"),
                turns,
            ));
        }

        /// Text seed folding is a pure function of the bytes.
        #[test]
        fn prop_text_seeds_fold_stably(text in "[ -~]{0,64}") {
            let a = Seed::Text(text.clone()).to_u64();
            let b = Seed::Text(text).to_u64();
            prop_assert_eq!(a, b);
        }
    }
}
