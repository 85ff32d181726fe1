//! Milestones: one-shot thresholds observed push-style, with persistent
//! static effects.
//!
//! The engine is notified after every pipeline stage by draining the
//! ledger's mutation queue, so a predicate that is true only transiently
//! within a turn (a spend spike that later income masks, say) still
//! fires. Each milestone fires at most once per game.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::data::{all_satisfied, EvalContext, Scenario, StaticRule};
use crate::effects::resolve_all;
use crate::ledger::{Adjustment, ResourceLedger};
use crate::rng::DeterministicRng;

/// A milestone's persistent effect while active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStaticEffect {
    /// Milestone this effect belongs to.
    pub milestone_id: String,
    /// Turn the milestone fired. Numeric effects start the turn after.
    pub activated_turn: u32,
    /// Turns the effect has been applied so far (drives escalation).
    pub turns_active: u32,
}

/// One milestone firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneReport {
    /// Milestone that fired.
    pub milestone_id: String,
    /// Adjustments from its one-shot effects.
    pub adjustments: Vec<Adjustment>,
}

/// One turn of one active static effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticEffectReport {
    /// Owning milestone.
    pub milestone_id: String,
    /// Adjustments applied this turn (empty when deactivating).
    pub adjustments: Vec<Adjustment>,
    /// Whether the countermand was met and the effect retired.
    pub deactivated: bool,
}

/// Milestone state for one game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneEngine {
    fired: BTreeSet<String>,
    active: Vec<ActiveStaticEffect>,
}

impl MilestoneEngine {
    /// Milestones that have fired so far.
    #[must_use]
    pub const fn fired(&self) -> &BTreeSet<String> {
        &self.fired
    }

    /// Currently active static effects.
    #[must_use]
    pub fn active(&self) -> &[ActiveStaticEffect] {
        &self.active
    }

    /// One observation pass: drain pending mutations, evaluate unfired
    /// milestones against current state, fire any whose requirements
    /// hold.
    ///
    /// Firing applies one-shot effects, which may themselves push the
    /// ledger across another milestone's threshold; the caller loops
    /// until a pass returns no reports.
    pub fn observe(
        &mut self,
        scenario: &Scenario,
        ledger: &mut ResourceLedger,
        turn: u32,
        upgrades: &BTreeSet<String>,
        flags: &BTreeSet<String>,
        rng: &mut DeterministicRng,
    ) -> Vec<MilestoneReport> {
        // Nothing changed since the last pass: predicates cannot have
        // flipped, and re-rolling Chance effects here would misalign the
        // draw stream.
        if ledger.drain_mutations().is_empty() {
            return Vec::new();
        }

        let mut reports = Vec::new();
        for def in &scenario.milestones {
            if self.fired.contains(&def.id) {
                continue;
            }
            let firing = {
                let snapshot = ledger.snapshot();
                let ctx = EvalContext {
                    snapshot: &snapshot,
                    turn,
                    turn_spend: ledger.turn_spend(),
                    fired_milestones: &self.fired,
                    upgrades,
                    flags,
                };
                all_satisfied(&def.requirements, &ctx)
            };
            if !firing {
                continue;
            }

            tracing::info!(milestone = %def.id, turn, "Milestone fired");
            self.fired.insert(def.id.clone());

            let snapshot = ledger.snapshot();
            let deltas = resolve_all(&def.once_effects, &snapshot, rng);
            let adjustments = deltas
                .into_iter()
                .map(|delta| {
                    ledger.add(delta.attribute, delta.amount, &format!("milestone:{}", def.id))
                })
                .collect();

            if def.static_effect.is_some() {
                self.active.push(ActiveStaticEffect {
                    milestone_id: def.id.clone(),
                    activated_turn: turn,
                    turns_active: 0,
                });
            }

            reports.push(MilestoneReport {
                milestone_id: def.id.clone(),
                adjustments,
            });
        }
        reports
    }

    /// Apply all active static effects for this turn.
    ///
    /// Effects whose countermand requirements are met deactivate
    /// permanently instead of applying. Escalation grows linearly with
    /// the number of turns the effect has been active.
    pub fn apply_static(
        &mut self,
        scenario: &Scenario,
        ledger: &mut ResourceLedger,
        turn: u32,
        upgrades: &BTreeSet<String>,
        flags: &BTreeSet<String>,
        rng: &mut DeterministicRng,
    ) -> Vec<StaticEffectReport> {
        let mut reports = Vec::new();
        let mut survivors = Vec::new();

        for mut active in std::mem::take(&mut self.active) {
            let Some(def) = scenario.milestone(&active.milestone_id) else {
                continue;
            };
            let Some(static_effect) = &def.static_effect else {
                continue;
            };

            // Numeric effects begin the turn after firing; a spend spike
            // should not be punished twice within the same turn.
            if active.activated_turn >= turn {
                survivors.push(active);
                continue;
            }

            let countermanded = {
                let snapshot = ledger.snapshot();
                let ctx = EvalContext {
                    snapshot: &snapshot,
                    turn,
                    turn_spend: ledger.turn_spend(),
                    fired_milestones: &self.fired,
                    upgrades,
                    flags,
                };
                !static_effect.countermand.is_empty()
                    && all_satisfied(&static_effect.countermand, &ctx)
            };
            if countermanded {
                tracing::info!(milestone = %active.milestone_id, turn, "Static effect countermanded");
                reports.push(StaticEffectReport {
                    milestone_id: active.milestone_id,
                    adjustments: Vec::new(),
                    deactivated: true,
                });
                continue;
            }

            active.turns_active += 1;
            let reason = format!("static:{}", active.milestone_id);

            let snapshot = ledger.snapshot();
            let deltas = resolve_all(&static_effect.effects, &snapshot, rng);
            let mut adjustments: Vec<Adjustment> = deltas
                .into_iter()
                .map(|delta| ledger.add(delta.attribute, delta.amount, &reason))
                .collect();

            if let Some(escalation) = &static_effect.escalation {
                let amount = escalation
                    .base
                    .saturating_add(escalation.step.saturating_mul(i64::from(active.turns_active - 1)));
                adjustments.push(ledger.add(escalation.attribute, amount, &reason));
            }

            reports.push(StaticEffectReport {
                milestone_id: active.milestone_id.clone(),
                adjustments,
                deactivated: false,
            });
            survivors.push(active);
        }

        self.active = survivors;
        reports
    }

    /// Staff cap imposed by an active `StaffRequireSupervision` rule,
    /// if one is in force.
    #[must_use]
    pub fn supervision_cap(&self, scenario: &Scenario) -> Option<i64> {
        let imposed = self.active.iter().any(|active| {
            scenario
                .milestone(&active.milestone_id)
                .and_then(|def| def.static_effect.as_ref())
                .and_then(|static_effect| static_effect.rule)
                == Some(StaticRule::StaffRequireSupervision)
        });
        imposed.then_some(scenario.config.supervisor_capacity)
    }
}
