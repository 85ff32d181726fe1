//! Reusable scenarios and session helpers for tests.

use lab_core::data::Scenario;
use lab_core::prelude::*;

/// The built-in scenario with events and rivals stripped out.
///
/// With no chance triggers and no opponent purchases, every turn is fully
/// predictable, which makes exact-value assertions possible.
#[must_use]
pub fn quiet_scenario() -> Scenario {
    Scenario {
        events: Vec::new(),
        opponents: Vec::new(),
        ..Scenario::builtin()
    }
}

/// The built-in scenario with a comfortable treasury, so affordability
/// never interferes with what a test is actually exercising.
#[must_use]
pub fn funded_scenario() -> Scenario {
    let mut scenario = Scenario::builtin();
    scenario.config.starting_money = 1_000_000;
    scenario
}

/// Start a session on the given scenario, panicking on invalid fixtures.
///
/// # Panics
///
/// Panics if the scenario fails validation; fixtures are expected to be
/// well-formed.
#[must_use]
pub fn session(scenario: Scenario, seed: &str) -> GameSession {
    GameSession::new(scenario, Seed::from(seed)).expect("fixture scenario must validate")
}

/// Run one turn to completion, accepting every popup.
///
/// # Panics
///
/// Panics on engine errors; fixture turns are expected to be legal.
pub fn play_turn(session: &mut GameSession, queue: Vec<PlannedAction>) -> TurnReport {
    let mut advance = session.end_turn(queue).expect("fixture turn must be legal");
    loop {
        match advance {
            TurnAdvance::Completed(report) => return report,
            TurnAdvance::AwaitingPopup { event_id } => {
                advance = session
                    .respond_to_popup(&event_id, PopupResponse::Accept)
                    .expect("accepting a pending popup cannot fail");
            }
        }
    }
}

/// Run `turns` empty turns (or until game over), accepting every popup.
pub fn play_idle_turns(session: &mut GameSession, turns: u32) {
    for _ in 0..turns {
        if session.game_over().is_some() {
            return;
        }
        play_turn(session, Vec::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_scenarios_validate() {
        quiet_scenario().validate().unwrap();
        funded_scenario().validate().unwrap();
    }

    #[test]
    fn test_play_turn_completes() {
        let mut session = session(quiet_scenario(), "fixtures");
        let report = play_turn(&mut session, vec![PlannedAction::direct("fundraise")]);
        assert_eq!(report.turn, 1);
        assert_eq!(session.phase(), TurnPhase::Ready);
    }

    #[test]
    fn test_idle_turns_stop_at_game_over() {
        let mut scenario = quiet_scenario();
        scenario.config.max_turns = 2;
        let mut session = session(scenario, "fixtures");
        play_idle_turns(&mut session, 10);
        assert_eq!(session.turn(), 2);
        assert_eq!(session.game_over(), Some(&GameOver::Survived));
    }
}
