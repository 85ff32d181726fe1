//! Milestone definitions: one-shot thresholds with optional persistent
//! static effects.

use serde::{Deserialize, Serialize};

use crate::data::{validation, Requirement};
use crate::effects::EffectSpec;
use crate::error::Result;
use crate::ledger::Attribute;

/// A penalty that grows the longer its static effect stays active.
///
/// The applied delta on the Nth active turn is `base + step * (N - 1)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDef {
    /// Attribute to mutate each turn.
    pub attribute: Attribute,
    /// Delta on the first active turn.
    pub base: i64,
    /// Additional delta per subsequent active turn.
    pub step: i64,
}

/// Behavioral rules a static effect can impose, beyond numeric deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaticRule {
    /// Staff beyond supervision capacity produce no research. Capacity is
    /// `supervisor_capacity` from the config; owning the countermand
    /// upgrade lifts the cap entirely.
    StaffRequireSupervision,
}

/// Persistent effect attached to a fired milestone.
///
/// Applies every turn after the firing turn until its countermand
/// requirements are met, at which point it deactivates permanently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticEffectDef {
    /// Flat effects applied each active turn.
    #[serde(default)]
    pub effects: Vec<EffectSpec>,
    /// Optional growing penalty.
    #[serde(default)]
    pub escalation: Option<EscalationDef>,
    /// Optional behavioral rule.
    #[serde(default)]
    pub rule: Option<StaticRule>,
    /// Conditions that switch the effect off. Empty means it runs for the
    /// rest of the game.
    #[serde(default)]
    pub countermand: Vec<Requirement>,
}

/// A milestone: fires at most once, when all requirements hold.
///
/// Requirements are checked against ledger state observed push-style after
/// each pipeline stage, so a threshold crossed and un-crossed within one
/// turn still fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneDef {
    /// Unique ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Flavor/description text.
    #[serde(default)]
    pub description: String,
    /// Firing predicate, all of which must hold simultaneously.
    pub requirements: Vec<Requirement>,
    /// Effects applied exactly once, on the firing turn.
    #[serde(default)]
    pub once_effects: Vec<EffectSpec>,
    /// Persistent effect active from the turn after firing.
    #[serde(default)]
    pub static_effect: Option<StaticEffectDef>,
}

impl MilestoneDef {
    /// Shape checks run once at scenario load.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.requirements.is_empty() {
            return Err(validation(&self.id, "milestone needs at least one requirement"));
        }
        if let Some(static_effect) = &self.static_effect {
            let empty = static_effect.effects.is_empty()
                && static_effect.escalation.is_none()
                && static_effect.rule.is_none();
            if empty {
                return Err(validation(&self.id, "static effect does nothing"));
            }
        }
        Ok(())
    }
}
