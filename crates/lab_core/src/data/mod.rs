//! Data-driven scenario definitions.
//!
//! Actions, events, milestones, upgrades, and opponents are plain records
//! loaded from RON at construction time and validated once, so the engine
//! never re-checks shapes at access time. Numeric thresholds and penalty
//! magnitudes live in [`GameConfig`] rather than code: the source material
//! disagrees on several of them, so nothing is hardcoded.

mod action_data;
mod builtin;
mod event_data;
mod milestone_data;
mod opponent_data;

pub use action_data::{ActionDef, DelegationPolicy, EspionageSpec};
pub use event_data::{EventDef, EventKind, TriggerSpec};
pub use milestone_data::{EscalationDef, MilestoneDef, StaticEffectDef, StaticRule};
pub use opponent_data::{OpponentDef, OpponentStat};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::ledger::{Attribute, LedgerSnapshot};

/// Declarative predicate over game state, usable as an action availability
/// check, an event trigger condition, a milestone predicate, or a static
/// effect countermand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Requirement {
    /// Attribute value is at least `value`.
    AtLeast {
        /// Attribute to read.
        attribute: Attribute,
        /// Inclusive minimum.
        value: i64,
    },
    /// Attribute value is at most `value`.
    AtMost {
        /// Attribute to read.
        attribute: Attribute,
        /// Inclusive maximum.
        value: i64,
    },
    /// Money spent so far this turn is at least `value`.
    SpendAtLeast {
        /// Inclusive minimum spend.
        value: i64,
    },
    /// The named upgrade has been purchased.
    UpgradeOwned {
        /// Upgrade ID.
        id: String,
    },
    /// The named upgrade has not been purchased.
    UpgradeMissing {
        /// Upgrade ID.
        id: String,
    },
    /// The named milestone has fired.
    MilestoneFired {
        /// Milestone ID.
        id: String,
    },
    /// The named milestone has not fired.
    MilestoneNotFired {
        /// Milestone ID.
        id: String,
    },
    /// The named hidden-consequence flag has been set.
    FlagSet {
        /// Flag name.
        id: String,
    },
    /// Current turn number is at least `turn`.
    TurnAtLeast {
        /// Inclusive minimum turn.
        turn: u32,
    },
}

/// Read-only evaluation context for [`Requirement`] predicates.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// Ledger values.
    pub snapshot: &'a LedgerSnapshot,
    /// Current turn number (1-based).
    pub turn: u32,
    /// Money spent so far this turn.
    pub turn_spend: i64,
    /// Milestones that have fired.
    pub fired_milestones: &'a BTreeSet<String>,
    /// Upgrades the player owns.
    pub upgrades: &'a BTreeSet<String>,
    /// Hidden-consequence flags that have been set.
    pub flags: &'a BTreeSet<String>,
}

impl Requirement {
    /// Evaluate this requirement against the given context.
    #[must_use]
    pub fn satisfied(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            Self::AtLeast { attribute, value } => ctx.snapshot.get(*attribute) >= *value,
            Self::AtMost { attribute, value } => ctx.snapshot.get(*attribute) <= *value,
            Self::SpendAtLeast { value } => ctx.turn_spend >= *value,
            Self::UpgradeOwned { id } => ctx.upgrades.contains(id),
            Self::UpgradeMissing { id } => !ctx.upgrades.contains(id),
            Self::MilestoneFired { id } => ctx.fired_milestones.contains(id),
            Self::MilestoneNotFired { id } => !ctx.fired_milestones.contains(id),
            Self::FlagSet { id } => ctx.flags.contains(id),
            Self::TurnAtLeast { turn } => ctx.turn >= *turn,
        }
    }
}

/// Evaluate a requirement list (empty list is always satisfied).
#[must_use]
pub fn all_satisfied(requirements: &[Requirement], ctx: &EvalContext<'_>) -> bool {
    requirements.iter().all(|req| req.satisfied(ctx))
}

/// A purchasable one-time upgrade flag.
///
/// Upgrades carry no behavior of their own; actions grant them and
/// requirements/countermands read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeDef {
    /// Unique ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Flavor/description text.
    #[serde(default)]
    pub description: String,
}

/// Opponent simulation tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpponentTuning {
    /// Fraction of remaining budget an opponent spends per turn
    /// (budget / divisor).
    pub spend_divisor: i64,
    /// Research spend that buys one point of capability progress.
    pub research_cost: i64,
    /// Cost to add one researcher.
    pub hire_cost: i64,
    /// Cost to add one compute unit.
    pub compute_cost: i64,
    /// Cost to add one lobbyist.
    pub lobby_cost: i64,
    /// Percent progress boost per compute unit
    /// (effective research = researchers * (100 + compute * boost) / 100).
    pub compute_boost_percent: u32,
    /// Divisor applied to capability progress when contributing to doom.
    pub doom_divisor: i64,
}

impl Default for OpponentTuning {
    fn default() -> Self {
        Self {
            spend_divisor: 10,
            research_cost: 1_000,
            hire_cost: 5_000,
            compute_cost: 2_000,
            lobby_cost: 3_000,
            compute_boost_percent: 5,
            doom_divisor: 4,
        }
    }
}

/// Engine-level configuration constants.
///
/// # Example RON
///
/// ```ron
/// GameConfig(
///     starting_money: 100000,
///     starting_staff: 2,
///     action_points_per_turn: 3,
///     max_turns: 52,
///     compliance_spend_threshold: 10000,
///     supervisor_capacity: 9,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Starting money.
    pub starting_money: i64,
    /// Starting staff count.
    pub starting_staff: i64,
    /// Starting reputation.
    pub starting_reputation: i64,
    /// Starting doom.
    pub starting_doom: i64,
    /// Starting compute.
    pub starting_compute: i64,
    /// Action points granted at the start of every turn.
    pub action_points_per_turn: i64,
    /// Turn count at which surviving counts as victory.
    pub max_turns: u32,
    /// Whether popup/deferred classification is enabled. When false every
    /// event resolves immediately on trigger (single code path).
    pub enhanced_events: bool,
    /// Deferred queue capacity; exceeding it force-resolves the oldest
    /// entry rather than rejecting the newcomer.
    pub deferred_queue_bound: usize,
    /// Deferral window used when a popup is deferred but its definition
    /// does not carry an explicit window.
    pub default_deferral_turns: u32,
    /// Internal pipeline step budget before a turn is declared stuck.
    pub stuck_step_budget: u32,
    /// Per-turn salary paid per staff member.
    pub salary_per_staff: i64,
    /// Research produced per supervised staff member per turn.
    pub research_per_staff: i64,
    /// Staff a single supervisor can manage once supervision is required.
    pub supervisor_capacity: i64,
    /// Single-turn spend threshold that triggers the compliance milestone.
    pub compliance_spend_threshold: i64,
    /// Sampling noise (+/- percent) applied to espionage discoveries.
    pub espionage_noise_percent: u32,
    /// Opponent simulation tuning.
    pub opponents: OpponentTuning,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_money: 100_000,
            starting_staff: 2,
            starting_reputation: 50,
            starting_doom: 25,
            starting_compute: 10,
            action_points_per_turn: 3,
            max_turns: 52,
            enhanced_events: true,
            deferred_queue_bound: 8,
            default_deferral_turns: 3,
            stuck_step_budget: 10_000,
            salary_per_staff: 600,
            research_per_staff: 2,
            supervisor_capacity: 9,
            compliance_spend_threshold: 10_000,
            espionage_noise_percent: 20,
            opponents: OpponentTuning::default(),
        }
    }
}

impl GameConfig {
    /// Starting ledger values as a snapshot.
    #[must_use]
    pub fn starting_snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::from_values(&[
            (Attribute::Money, self.starting_money),
            (Attribute::Staff, self.starting_staff),
            (Attribute::Reputation, self.starting_reputation),
            (Attribute::Doom, self.starting_doom),
            (Attribute::Compute, self.starting_compute),
            (Attribute::Research, 0),
            (Attribute::ActionPoints, self.action_points_per_turn),
        ])
    }
}

/// A complete, validated bundle of definitions for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario identifier, recorded in saves and replays.
    pub id: String,
    /// Engine configuration.
    #[serde(default)]
    pub config: GameConfig,
    /// Player actions.
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    /// Events.
    #[serde(default)]
    pub events: Vec<EventDef>,
    /// Milestones.
    #[serde(default)]
    pub milestones: Vec<MilestoneDef>,
    /// Purchasable upgrades.
    #[serde(default)]
    pub upgrades: Vec<UpgradeDef>,
    /// Rival organizations.
    #[serde(default)]
    pub opponents: Vec<OpponentDef>,
}

impl Scenario {
    /// Parse a scenario from RON text and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] on malformed RON and
    /// [`GameError::ValidationError`] on semantic problems.
    pub fn from_ron_str(label: &str, source: &str) -> Result<Self> {
        let scenario: Self = ron::from_str(source).map_err(|e| GameError::DataParseError {
            path: label.to_string(),
            message: e.to_string(),
        })?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Look up an action definition.
    #[must_use]
    pub fn action(&self, id: &str) -> Option<&ActionDef> {
        self.actions.iter().find(|def| def.id == id)
    }

    /// Look up an event definition.
    #[must_use]
    pub fn event(&self, id: &str) -> Option<&EventDef> {
        self.events.iter().find(|def| def.id == id)
    }

    /// Look up a milestone definition.
    #[must_use]
    pub fn milestone(&self, id: &str) -> Option<&MilestoneDef> {
        self.milestones.iter().find(|def| def.id == id)
    }

    /// Validate the whole bundle. Called once at load time so access-time
    /// code never re-checks shapes.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ValidationError`] describing the first problem
    /// found.
    pub fn validate(&self) -> Result<()> {
        check_unique("action", self.actions.iter().map(|d| d.id.as_str()))?;
        check_unique("event", self.events.iter().map(|d| d.id.as_str()))?;
        check_unique("milestone", self.milestones.iter().map(|d| d.id.as_str()))?;
        check_unique("upgrade", self.upgrades.iter().map(|d| d.id.as_str()))?;
        check_unique("opponent", self.opponents.iter().map(|d| d.id.as_str()))?;

        let upgrade_ids: BTreeSet<&str> = self.upgrades.iter().map(|d| d.id.as_str()).collect();
        let milestone_ids: BTreeSet<&str> = self.milestones.iter().map(|d| d.id.as_str()).collect();
        let flag_ids: BTreeSet<&str> = self
            .events
            .iter()
            .filter_map(|d| d.hidden_consequence.as_deref())
            .collect();
        let opponent_ids: BTreeSet<&str> = self.opponents.iter().map(|d| d.id.as_str()).collect();

        for action in &self.actions {
            action.validate()?;
            if let Some(upgrade) = &action.grants_upgrade {
                if !upgrade_ids.contains(upgrade.as_str()) {
                    return Err(validation(&action.id, format!("grants unknown upgrade '{upgrade}'")));
                }
            }
            if let Some(espionage) = &action.espionage {
                if let Some(agent) = &espionage.agent {
                    if !opponent_ids.contains(agent.as_str()) {
                        return Err(validation(&action.id, format!("spies on unknown opponent '{agent}'")));
                    }
                }
            }
            self.check_requirements(&action.id, &action.requirements, &upgrade_ids, &milestone_ids, &flag_ids)?;
        }

        for event in &self.events {
            event.validate()?;
            if let TriggerSpec::Requirements(reqs) | TriggerSpec::Chance { requirements: reqs, .. } =
                &event.trigger
            {
                self.check_requirements(&event.id, reqs, &upgrade_ids, &milestone_ids, &flag_ids)?;
            }
        }

        for milestone in &self.milestones {
            milestone.validate()?;
            self.check_requirements(&milestone.id, &milestone.requirements, &upgrade_ids, &milestone_ids, &flag_ids)?;
            if let Some(static_effect) = &milestone.static_effect {
                self.check_requirements(&milestone.id, &static_effect.countermand, &upgrade_ids, &milestone_ids, &flag_ids)?;
            }
        }

        for opponent in &self.opponents {
            opponent.validate()?;
        }

        Ok(())
    }

    fn check_requirements(
        &self,
        owner: &str,
        requirements: &[Requirement],
        upgrades: &BTreeSet<&str>,
        milestones: &BTreeSet<&str>,
        flags: &BTreeSet<&str>,
    ) -> Result<()> {
        for requirement in requirements {
            match requirement {
                Requirement::UpgradeOwned { id } | Requirement::UpgradeMissing { id } => {
                    if !upgrades.contains(id.as_str()) {
                        return Err(validation(owner, format!("references unknown upgrade '{id}'")));
                    }
                }
                Requirement::MilestoneFired { id } | Requirement::MilestoneNotFired { id } => {
                    if !milestones.contains(id.as_str()) {
                        return Err(validation(owner, format!("references unknown milestone '{id}'")));
                    }
                }
                Requirement::FlagSet { id } => {
                    if !flags.contains(id.as_str()) {
                        return Err(validation(owner, format!("references flag '{id}' no event sets")));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

pub(crate) fn validation(id: &str, message: impl Into<String>) -> GameError {
    GameError::ValidationError {
        id: id.to_string(),
        message: message.into(),
    }
}

fn check_unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(validation(id, format!("duplicate {kind} ID")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_scenario_validates() {
        Scenario::builtin().validate().expect("builtin must validate");
    }

    #[test]
    fn test_duplicate_action_id_rejected() {
        let mut scenario = Scenario::builtin();
        let dup = scenario.actions[0].clone();
        scenario.actions.push(dup);
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn test_unknown_upgrade_reference_rejected() {
        let mut scenario = Scenario::builtin();
        scenario.actions[0].grants_upgrade = Some("no_such_upgrade".to_string());
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn test_ron_roundtrip() {
        let scenario = Scenario::builtin();
        let text = ron::to_string(&scenario).unwrap();
        let parsed = Scenario::from_ron_str("builtin", &text).unwrap();
        assert_eq!(parsed.id, scenario.id);
        assert_eq!(parsed.actions.len(), scenario.actions.len());
    }

    #[test]
    fn test_requirement_evaluation() {
        let snapshot = LedgerSnapshot::from_values(&[(Attribute::Staff, 9)]);
        let fired = BTreeSet::new();
        let mut upgrades = BTreeSet::new();
        let flags = BTreeSet::new();
        let ctx = EvalContext {
            snapshot: &snapshot,
            turn: 5,
            turn_spend: 12_000,
            fired_milestones: &fired,
            upgrades: &upgrades,
            flags: &flags,
        };

        assert!(Requirement::AtLeast { attribute: Attribute::Staff, value: 9 }.satisfied(&ctx));
        assert!(Requirement::SpendAtLeast { value: 10_000 }.satisfied(&ctx));
        assert!(Requirement::UpgradeMissing { id: "manager".into() }.satisfied(&ctx));
        assert!(Requirement::TurnAtLeast { turn: 5 }.satisfied(&ctx));
        assert!(!Requirement::TurnAtLeast { turn: 6 }.satisfied(&ctx));

        upgrades.insert("manager".to_string());
        let ctx = EvalContext {
            snapshot: &snapshot,
            turn: 5,
            turn_spend: 12_000,
            fired_milestones: &fired,
            upgrades: &upgrades,
            flags: &flags,
        };
        assert!(Requirement::UpgradeOwned { id: "manager".into() }.satisfied(&ctx));
    }
}
