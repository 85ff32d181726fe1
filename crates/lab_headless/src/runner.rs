//! Complete game execution for headless testing.
//!
//! Plays a session from turn 1 to game over under a scripted [`Strategy`],
//! answering popups as they arrive, and collects a serializable summary.
//! All loops are bounded; a session that refuses to finish is an error,
//! never a hang.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use lab_core::data::Scenario;
use lab_core::error::{GameError, Result};
use lab_core::ledger::Attribute;
use lab_core::prelude::*;

use crate::strategies::Strategy;

/// Popup responses allowed within a single turn before we assume the
/// event queue is misbehaving and abort.
const MAX_POPUPS_PER_TURN: u32 = 1_000;

/// Configuration for a single headless game.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Scenario to play.
    pub scenario: Scenario,
    /// Seed for the deterministic draw streams.
    pub seed: Seed,
    /// Scripted policy driving the game.
    pub strategy: Strategy,
    /// Override for the scenario's turn limit, if set.
    pub max_turns: Option<u32>,
}

/// Serializable summary of a finished game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    /// Seed the game was played with.
    pub seed: Seed,
    /// Strategy name.
    pub strategy: String,
    /// Turns completed before the game ended.
    pub turns_played: u32,
    /// Terminal outcome label.
    pub outcome: String,
    /// Final value of every resource attribute, by name.
    pub final_resources: BTreeMap<String, i64>,
    /// Popups answered over the whole game.
    pub popups_answered: u32,
    /// Whether any turn hit the stuck-step budget and force-completed.
    pub degraded: bool,
    /// Hash of the final session state.
    pub final_state_hash: u64,
}

/// A finished game: the summary plus the session it came from.
///
/// The session is returned so callers can capture a replay or inspect
/// subsystems beyond what the summary records.
#[derive(Debug)]
pub struct GameResult {
    /// Serializable summary.
    pub summary: GameSummary,
    /// The completed session.
    pub session: GameSession,
}

/// Stable label for a terminal outcome, used in summaries and batch counts.
#[must_use]
pub fn outcome_label(game_over: &GameOver) -> String {
    match game_over {
        GameOver::DoomMaxed => "doom_maxed".to_string(),
        GameOver::Bankrupt => "bankrupt".to_string(),
        GameOver::OpponentBreakout { agent_id } => format!("breakout:{agent_id}"),
        GameOver::Survived => "survived".to_string(),
    }
}

/// Play one complete game under a scripted strategy.
///
/// # Errors
///
/// Returns an error if the scenario fails validation or the engine
/// rejects an input the strategy produced.
pub fn run_game(config: RunConfig) -> Result<GameResult> {
    let RunConfig {
        mut scenario,
        seed,
        strategy,
        max_turns,
    } = config;
    if let Some(limit) = max_turns {
        scenario.config.max_turns = limit;
    }

    let start = Instant::now();
    info!(
        seed = ?seed,
        strategy = strategy.name(),
        max_turns = scenario.config.max_turns,
        "starting headless game"
    );

    let mut session = GameSession::new(scenario, seed.clone())?;
    let mut popups_answered = 0u32;

    // Bounded: the engine declares Survived at max_turns, so the loop
    // cannot outrun the scenario's own limit.
    while session.game_over().is_none() {
        let queue = strategy.queue_for_turn(&session);
        let mut advance = session.end_turn(queue)?;
        let mut popups_this_turn = 0u32;
        loop {
            match advance {
                TurnAdvance::Completed(report) => {
                    debug!(
                        turn = report.turn,
                        money = session.ledger().get(Attribute::Money),
                        doom = session.ledger().get(Attribute::Doom),
                        "turn complete"
                    );
                    break;
                }
                TurnAdvance::AwaitingPopup { event_id } => {
                    popups_this_turn += 1;
                    if popups_this_turn > MAX_POPUPS_PER_TURN {
                        return Err(GameError::InvalidState(format!(
                            "more than {MAX_POPUPS_PER_TURN} popups in one turn"
                        )));
                    }
                    let response = strategy.respond(&event_id);
                    debug!(event = %event_id, response = ?response, "answering popup");
                    advance = session.respond_to_popup(&event_id, response)?;
                    popups_answered += 1;
                }
            }
        }
    }

    let game_over = session
        .game_over()
        .ok_or_else(|| GameError::InvalidState("game loop exited without game over".to_string()))?;
    let outcome = outcome_label(game_over);

    if session.degraded() {
        warn!(seed = ?seed, "session force-completed at least one stuck turn");
    }

    let final_resources = Attribute::ALL
        .iter()
        .map(|&attr| (attr.name().to_string(), session.ledger().get(attr)))
        .collect();

    let summary = GameSummary {
        seed,
        strategy: strategy.name().to_string(),
        turns_played: session.turn(),
        outcome,
        final_resources,
        popups_answered,
        degraded: session.degraded(),
        final_state_hash: session.state_hash(),
    };

    info!(
        outcome = %summary.outcome,
        turns = summary.turns_played,
        popups = summary.popups_answered,
        elapsed_ms = start.elapsed().as_millis(),
        "headless game complete"
    );

    Ok(GameResult { summary, session })
}
