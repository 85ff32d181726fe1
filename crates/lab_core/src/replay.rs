//! Replay capture and verification.
//!
//! A replay is the scenario, the seed, and the per-turn inputs (action
//! queues, early deferred settlements, and popup responses), plus the
//! final state hash. Playing the
//! inputs back through a fresh session must land on the same hash; a
//! mismatch means the engine's determinism contract was broken somewhere.

use serde::{Deserialize, Serialize};

use crate::actions::PlannedAction;
use crate::error::{GameError, Result};
use crate::events::PopupResponse;
use crate::turn::{GameSession, TurnAdvance};

/// Replay format version this build reads and writes.
pub const REPLAY_VERSION: u32 = 1;

/// Player input for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnInput {
    /// Action queue submitted for the turn.
    pub queue: Vec<PlannedAction>,
    /// Deferred decisions the player asked to settle early this turn.
    #[serde(default)]
    pub early: Vec<String>,
    /// Popup responses given during the turn, in order.
    pub responses: Vec<(String, PopupResponse)>,
}

/// A self-contained recording of one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    version: u32,
    scenario: crate::data::Scenario,
    seed: crate::rng::Seed,
    inputs: Vec<TurnInput>,
    final_hash: u64,
}

impl Replay {
    /// Capture a replay of everything the session has played so far.
    #[must_use]
    pub fn capture(session: &GameSession) -> Self {
        Self {
            version: REPLAY_VERSION,
            scenario: session.scenario().clone(),
            seed: session.seed().clone(),
            inputs: session.recorded_inputs().to_vec(),
            final_hash: session.state_hash(),
        }
    }

    /// Number of recorded turns.
    #[must_use]
    pub fn turns(&self) -> usize {
        self.inputs.len()
    }

    /// Final state hash recorded at capture time.
    #[must_use]
    pub const fn final_hash(&self) -> u64 {
        self.final_hash
    }

    /// Serialize to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] on encoding failure.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| GameError::DataParseError {
            path: "replay".to_string(),
            message: e.to_string(),
        })
    }

    /// Deserialize from bytes, checking the format version.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::SaveVersionMismatch`] for replays from
    /// another format version, [`GameError::DataParseError`] for corrupt
    /// bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let replay: Self = bincode::deserialize(bytes).map_err(|e| GameError::DataParseError {
            path: "replay".to_string(),
            message: e.to_string(),
        })?;
        if replay.version != REPLAY_VERSION {
            return Err(GameError::SaveVersionMismatch {
                expected: REPLAY_VERSION,
                got: replay.version,
            });
        }
        Ok(replay)
    }

    /// Play the recorded inputs through a fresh session and check the
    /// final hash.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ReplayDiverged`] when playback lands on a
    /// different hash, [`GameError::InvalidState`] when the recorded
    /// popup responses do not match playback's popups.
    pub fn verify(&self) -> Result<u64> {
        let session = self.play_back()?;
        let replayed = session.state_hash();
        if replayed != self.final_hash {
            return Err(GameError::ReplayDiverged {
                recorded: self.final_hash,
                replayed,
            });
        }
        Ok(replayed)
    }

    /// Play the recorded inputs through a fresh session, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] when recorded responses run
    /// out or name the wrong popup.
    pub fn play_back(&self) -> Result<GameSession> {
        let mut session = GameSession::new(self.scenario.clone(), self.seed.clone())?;
        for (index, input) in self.inputs.iter().enumerate() {
            for event_id in &input.early {
                session.resolve_deferred(event_id)?;
            }
            let mut responses = input.responses.iter();
            let mut advance = session.end_turn(input.queue.clone())?;
            while let TurnAdvance::AwaitingPopup { event_id } = advance {
                let Some((recorded_id, response)) = responses.next() else {
                    return Err(GameError::InvalidState(format!(
                        "turn {}: popup '{event_id}' has no recorded response",
                        index + 1
                    )));
                };
                if recorded_id != &event_id {
                    return Err(GameError::InvalidState(format!(
                        "turn {}: recorded response for '{recorded_id}' but popup is '{event_id}'",
                        index + 1
                    )));
                }
                advance = session.respond_to_popup(&event_id, *response)?;
            }
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Scenario;
    use crate::rng::Seed;

    fn play_game(turns: u32) -> GameSession {
        let mut session =
            GameSession::new(Scenario::builtin(), Seed::from("replay-test")).unwrap();
        for turn in 0..turns {
            let queue = if turn % 2 == 0 {
                vec![PlannedAction::direct("fundraise"), PlannedAction::direct("safety_research")]
            } else {
                vec![PlannedAction::direct("capability_research")]
            };
            let mut advance = session.end_turn(queue).unwrap();
            while let TurnAdvance::AwaitingPopup { event_id } = advance {
                advance = session
                    .respond_to_popup(&event_id, PopupResponse::Reduce)
                    .unwrap();
            }
            if session.game_over().is_some() {
                break;
            }
        }
        session
    }

    #[test]
    fn test_replay_roundtrip_verifies() {
        let session = play_game(8);
        let replay = Replay::capture(&session);
        let bytes = replay.to_bytes().unwrap();

        let loaded = Replay::from_bytes(&bytes).unwrap();
        assert_eq!(loaded.verify().unwrap(), replay.final_hash());
    }

    #[test]
    fn test_tampered_hash_diverges() {
        let session = play_game(4);
        let mut replay = Replay::capture(&session);
        replay.final_hash ^= 1;

        assert!(matches!(
            replay.verify(),
            Err(GameError::ReplayDiverged { .. })
        ));
    }

    #[test]
    fn test_tampered_inputs_fail_verification() {
        let session = play_game(4);
        let mut replay = Replay::capture(&session);
        replay.inputs[0].queue.push(PlannedAction::direct("buy_compute"));

        // Either the hash diverges or a recorded popup no longer lines up.
        assert!(replay.verify().is_err());
    }

    #[test]
    fn test_early_settlements_replay_faithfully() {
        use crate::data::{EventDef, EventKind, TriggerSpec};
        use crate::effects::EffectSpec;
        use crate::ledger::Attribute;

        let mut scenario = Scenario::builtin();
        scenario.opponents = Vec::new();
        scenario.events = vec![EventDef {
            id: "retrofit".to_string(),
            name: "Retrofit".to_string(),
            description: String::new(),
            kind: EventKind::Deferred,
            trigger: TriggerSpec::Always,
            effects: vec![EffectSpec::Flat {
                attribute: Attribute::Doom,
                amount: -3,
            }],
            reduced_effects: None,
            hidden_consequence: None,
            repeatable: false,
            max_deferred_turns: Some(6),
        }];
        let mut session = GameSession::new(scenario, Seed::from("early")).unwrap();

        // Turn 1 queues the decision; the player settles it before turn 2.
        session.end_turn(Vec::new()).unwrap();
        session.resolve_deferred("retrofit").unwrap();
        session.end_turn(Vec::new()).unwrap();
        assert!(session.events().deferred().is_empty());

        let replay = Replay::capture(&session);
        assert_eq!(replay.inputs[1].early, vec!["retrofit".to_string()]);
        assert_eq!(replay.verify().unwrap(), session.state_hash());
    }

    #[test]
    fn test_playback_reproduces_full_state() {
        let session = play_game(6);
        let replay = Replay::capture(&session);
        let replayed = replay.play_back().unwrap();

        assert_eq!(replayed.turn(), session.turn());
        assert_eq!(
            replayed.ledger().snapshot(),
            session.ledger().snapshot()
        );
        assert_eq!(replayed.state_hash(), session.state_hash());
    }
}
