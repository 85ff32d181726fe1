//! Scripted policies for unattended play.
//!
//! A strategy decides each turn's action queue and each popup response
//! from observable state only (the ledger, owned upgrades, espionage
//! discoveries). Strategies are deliberately simple: their job is to
//! exercise the engine across different play styles for batch testing,
//! not to play well.

use lab_core::prelude::*;

/// A scripted play style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Alternate fundraising, hiring, and safety work.
    Balanced,
    /// Spend everything on keeping doom down.
    SafetyFirst,
    /// Grow staff and compute aggressively, ignore the risks.
    Expansion,
}

impl Strategy {
    /// All strategies, for batch sweeps.
    pub const ALL: [Self; 3] = [Self::Balanced, Self::SafetyFirst, Self::Expansion];

    /// Parse a strategy name as given on the command line.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "balanced" => Some(Self::Balanced),
            "safety-first" => Some(Self::SafetyFirst),
            "expansion" => Some(Self::Expansion),
            _ => None,
        }
    }

    /// Canonical name for reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::SafetyFirst => "safety-first",
            Self::Expansion => "expansion",
        }
    }

    /// Pick the action queue for the coming turn.
    #[must_use]
    pub fn queue_for_turn(self, session: &GameSession) -> Vec<PlannedAction> {
        let money = session.ledger().get(Attribute::Money);
        let doom = session.ledger().get(Attribute::Doom);
        let turn = session.turn();

        match self {
            Self::Balanced => {
                if money < 10_000 {
                    vec![PlannedAction::direct("fundraise")]
                } else if doom > 50 {
                    vec![
                        PlannedAction::direct("safety_research"),
                        PlannedAction::direct("safety_research"),
                    ]
                } else {
                    vec![
                        PlannedAction::direct("hire_staff"),
                        PlannedAction::direct("community_outreach"),
                    ]
                }
            }
            Self::SafetyFirst => {
                let mut queue = vec![PlannedAction::direct("safety_research")];
                if money < 5_000 {
                    queue.push(PlannedAction::direct("fundraise"));
                } else {
                    queue.push(PlannedAction::direct("safety_research"));
                }
                queue
            }
            Self::Expansion => {
                if money < 15_000 {
                    vec![PlannedAction::direct("fundraise")]
                } else if turn % 4 == 0 {
                    vec![
                        PlannedAction::direct("buy_compute"),
                        PlannedAction::direct("espionage_probe"),
                    ]
                } else {
                    vec![
                        PlannedAction::direct("hire_staff"),
                        PlannedAction::direct("capability_research"),
                    ]
                }
            }
        }
    }

    /// Respond to a blocking popup.
    #[must_use]
    pub fn respond(self, _event_id: &str) -> PopupResponse {
        match self {
            // Balanced takes its medicine at a discount when offered.
            Self::Balanced => PopupResponse::Reduce,
            Self::SafetyFirst => PopupResponse::Accept,
            // Expansion brushes everything off and eats the consequences.
            Self::Expansion => PopupResponse::Dismiss,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_roundtrip() {
        for strategy in Strategy::ALL {
            assert_eq!(Strategy::from_name(strategy.name()), Some(strategy));
        }
        assert_eq!(Strategy::from_name("yolo"), None);
    }

    #[test]
    fn test_queues_reference_known_actions() {
        let scenario = lab_core::data::Scenario::builtin();
        let session = GameSession::new(scenario.clone(), Seed::from(1u64)).unwrap();
        for strategy in Strategy::ALL {
            for action in strategy.queue_for_turn(&session) {
                assert!(
                    scenario.action(&action.action_id).is_some(),
                    "{} queued unknown action {}",
                    strategy.name(),
                    action.action_id
                );
            }
        }
    }
}
