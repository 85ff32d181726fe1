//! Versioned save and restore.
//!
//! Saves capture between-turn state only: a paused popup has a live random
//! stream that is deliberately not persisted, so the caller must answer it
//! before saving. The scenario is embedded in the save, making the file
//! self-contained.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::turn::{GameSession, SessionParts, TurnPhase};

/// Save format version this build reads and writes.
pub const SAVE_VERSION: u32 = 1;

/// A serializable snapshot of a session between turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveGame {
    version: u32,
    parts: SessionParts,
}

impl SaveGame {
    /// Capture the session's current state.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] if a popup is awaiting a
    /// response.
    pub fn capture(session: &GameSession) -> Result<Self> {
        if session.phase() == TurnPhase::AwaitingPopup {
            return Err(GameError::InvalidState(
                "cannot save while a popup is awaiting a response".to_string(),
            ));
        }
        Ok(Self {
            version: SAVE_VERSION,
            parts: session.parts_ref(),
        })
    }

    /// Serialize to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] on encoding failure.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| GameError::DataParseError {
            path: "save".to_string(),
            message: e.to_string(),
        })
    }

    /// Deserialize from bytes, checking the format version.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::SaveVersionMismatch`] for saves from another
    /// format version, [`GameError::DataParseError`] for corrupt bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let save: Self = bincode::deserialize(bytes).map_err(|e| GameError::DataParseError {
            path: "save".to_string(),
            message: e.to_string(),
        })?;
        if save.version != SAVE_VERSION {
            return Err(GameError::SaveVersionMismatch {
                expected: SAVE_VERSION,
                got: save.version,
            });
        }
        Ok(save)
    }

    /// Rebuild a playable session.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ValidationError`] if the embedded scenario
    /// fails validation.
    pub fn restore(self) -> Result<GameSession> {
        self.parts.scenario.validate()?;
        Ok(GameSession::restore_parts(self.parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::PlannedAction;
    use crate::data::Scenario;
    use crate::events::PopupResponse;
    use crate::rng::Seed;
    use crate::turn::TurnAdvance;

    fn advance(session: &mut GameSession, queue: Vec<PlannedAction>) {
        let mut advance = session.end_turn(queue).unwrap();
        while let TurnAdvance::AwaitingPopup { event_id } = advance {
            advance = session
                .respond_to_popup(&event_id, PopupResponse::Accept)
                .unwrap();
        }
    }

    #[test]
    fn test_resumed_game_matches_uninterrupted_run() {
        let scenario = Scenario::builtin();
        let seed = Seed::from("save-test");
        let queue = || vec![PlannedAction::direct("fundraise")];

        let mut uninterrupted = GameSession::new(scenario.clone(), seed.clone()).unwrap();
        for _ in 0..6 {
            advance(&mut uninterrupted, queue());
        }

        let mut first_half = GameSession::new(scenario, seed).unwrap();
        for _ in 0..3 {
            advance(&mut first_half, queue());
        }
        let bytes = SaveGame::capture(&first_half).unwrap().to_bytes().unwrap();

        let mut resumed = SaveGame::from_bytes(&bytes).unwrap().restore().unwrap();
        for _ in 0..3 {
            advance(&mut resumed, queue());
        }

        assert_eq!(resumed.state_hash(), uninterrupted.state_hash());
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let session = GameSession::new(Scenario::builtin(), Seed::from(1u64)).unwrap();
        let mut save = SaveGame::capture(&session).unwrap();
        save.version = SAVE_VERSION + 1;
        let bytes = bincode::serialize(&save).unwrap();

        assert!(matches!(
            SaveGame::from_bytes(&bytes),
            Err(GameError::SaveVersionMismatch { .. })
        ));
    }

    #[test]
    fn test_corrupt_bytes_rejected() {
        assert!(matches!(
            SaveGame::from_bytes(&[0xff, 0x00, 0x13]),
            Err(GameError::DataParseError { .. })
        ));
    }
}
