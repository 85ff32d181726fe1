//! Event definitions: immediate effects, popups, and deferrable decisions.

use serde::{Deserialize, Serialize};

use crate::data::{validation, Requirement};
use crate::effects::EffectSpec;
use crate::error::Result;

/// How an event presents itself when triggered.
///
/// When the `enhanced_events` config flag is off, every kind collapses to
/// `Immediate` and there is a single resolution path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Effects apply the moment the event triggers.
    Immediate,
    /// Blocks turn completion until the player accepts, reduces,
    /// dismisses, or defers it.
    Popup,
    /// Enters the deferred queue on trigger without blocking. The player
    /// may settle it early; otherwise it auto-executes at full strength
    /// `max_deferred_turns` after it triggered.
    Deferred,
}

/// When an event fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerSpec {
    /// Fires every turn (subject to `repeatable`).
    Always,
    /// Fires whenever all requirements hold.
    Requirements(Vec<Requirement>),
    /// Fires with `percent`/100 probability on turns where the
    /// requirements hold. The roll consumes exactly one draw whether the
    /// requirements hold or not, so event counts never shift draw
    /// alignment between runs.
    Chance {
        /// Probability in percent.
        percent: u32,
        /// Gate conditions (empty means unconditional).
        #[serde(default)]
        requirements: Vec<Requirement>,
    },
}

/// One event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDef {
    /// Unique ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Flavor/description text.
    #[serde(default)]
    pub description: String,
    /// Presentation kind.
    pub kind: EventKind,
    /// Trigger condition.
    pub trigger: TriggerSpec,
    /// Effects applied on acceptance (or immediately, for `Immediate`).
    #[serde(default)]
    pub effects: Vec<EffectSpec>,
    /// Alternative effect set for the "reduce" popup response. Falls back
    /// to `effects` scaled to half when absent.
    #[serde(default)]
    pub reduced_effects: Option<Vec<EffectSpec>>,
    /// Flag set when the player dismisses this event, readable by later
    /// triggers and milestone predicates. Dismissal looks free to the
    /// player; this is how it comes back to bite them.
    #[serde(default)]
    pub hidden_consequence: Option<String>,
    /// Whether the event may fire more than once per game.
    #[serde(default)]
    pub repeatable: bool,
    /// How many turns the decision may wait before auto-executing at full
    /// strength. Required for `Deferred` events; for popups it overrides
    /// the configured default window when the player defers.
    #[serde(default)]
    pub max_deferred_turns: Option<u32>,
}

impl EventDef {
    /// Shape checks run once at scenario load.
    pub(crate) fn validate(&self) -> Result<()> {
        if let TriggerSpec::Chance { percent, .. } = &self.trigger {
            if *percent > 100 {
                return Err(validation(&self.id, "trigger percent must be at most 100"));
            }
        }
        match self.kind {
            EventKind::Deferred => {
                if self.max_deferred_turns.map_or(true, |turns| turns == 0) {
                    return Err(validation(
                        &self.id,
                        "Deferred events need max_deferred_turns >= 1",
                    ));
                }
                if self.hidden_consequence.is_some() {
                    return Err(validation(
                        &self.id,
                        "Deferred events cannot carry a hidden consequence (nothing to dismiss)",
                    ));
                }
            }
            EventKind::Immediate => {
                if self.hidden_consequence.is_some() {
                    return Err(validation(
                        &self.id,
                        "Immediate events cannot carry a hidden consequence (nothing to dismiss)",
                    ));
                }
            }
            EventKind::Popup => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(kind: EventKind) -> EventDef {
        EventDef {
            id: "e".to_string(),
            name: "E".to_string(),
            description: String::new(),
            kind,
            trigger: TriggerSpec::Always,
            effects: Vec::new(),
            reduced_effects: None,
            hidden_consequence: None,
            repeatable: false,
            max_deferred_turns: None,
        }
    }

    #[test]
    fn test_deferred_requires_window() {
        assert!(minimal(EventKind::Deferred).validate().is_err());

        let mut event = minimal(EventKind::Deferred);
        event.max_deferred_turns = Some(3);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_immediate_cannot_hide_consequences() {
        let mut event = minimal(EventKind::Immediate);
        event.hidden_consequence = Some("grudge".to_string());
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_deferred_cannot_hide_consequences() {
        let mut event = minimal(EventKind::Deferred);
        event.max_deferred_turns = Some(3);
        event.hidden_consequence = Some("grudge".to_string());
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_chance_percent_bounded() {
        let mut event = minimal(EventKind::Popup);
        event.trigger = TriggerSpec::Chance {
            percent: 150,
            requirements: Vec::new(),
        };
        assert!(event.validate().is_err());
    }
}
