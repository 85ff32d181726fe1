//! Action queue execution.
//!
//! Queued actions execute in order during the action phase. Execution is
//! all-or-nothing per action: requirements, money, staffing, and action
//! points are all checked before anything is deducted, and an action that
//! fails any check is skipped with a reason rather than partially applied
//! or aborting the turn.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::data::{all_satisfied, ActionDef, EvalContext, Scenario};
use crate::effects::{resolve_all, scale_deltas};
use crate::error::{GameError, Result};
use crate::ledger::{Adjustment, Attribute, ResourceLedger};
use crate::opponents::{EspionageReport, OpponentRoster};
use crate::rng::DeterministicRng;

/// One queued action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAction {
    /// Action definition ID.
    pub action_id: String,
    /// Execute via staff delegation instead of directly.
    #[serde(default)]
    pub delegated: bool,
}

impl PlannedAction {
    /// Direct execution of the named action.
    #[must_use]
    pub fn direct(action_id: &str) -> Self {
        Self {
            action_id: action_id.to_string(),
            delegated: false,
        }
    }

    /// Delegated execution of the named action.
    #[must_use]
    pub fn delegated(action_id: &str) -> Self {
        Self {
            action_id: action_id.to_string(),
            delegated: true,
        }
    }
}

/// Why a queued action was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Availability requirements not met.
    RequirementsNotMet,
    /// Not enough money for the up-front cost.
    InsufficientMoney,
    /// Not enough action points.
    InsufficientActionPoints,
    /// Not enough unoccupied staff to delegate to.
    InsufficientStaff,
    /// Delegation requested but the action has no delegation policy.
    DelegationUnavailable,
}

/// Result of one queued action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Action definition ID.
    pub action_id: String,
    /// Whether this was a delegated execution.
    pub delegated: bool,
    /// Why the action was skipped, or `None` if it executed.
    pub skipped: Option<SkipReason>,
    /// Ledger adjustments made (costs and effects).
    pub adjustments: Vec<Adjustment>,
    /// Upgrade granted, if any.
    pub granted_upgrade: Option<String>,
    /// Espionage result, if this was an intelligence action.
    pub espionage: Option<EspionageReport>,
}

impl ActionOutcome {
    fn skipped(planned: &PlannedAction, reason: SkipReason) -> Self {
        tracing::debug!(action = %planned.action_id, ?reason, "Action skipped");
        Self {
            action_id: planned.action_id.clone(),
            delegated: planned.delegated,
            skipped: Some(reason),
            adjustments: Vec::new(),
            granted_upgrade: None,
            espionage: None,
        }
    }
}

/// Aggregate result of the action phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPhaseResult {
    /// Per-action outcomes, in queue order.
    pub outcomes: Vec<ActionOutcome>,
    /// Staff tied up by delegated actions this turn. Occupied staff
    /// produce no research during the production phase.
    pub staff_occupied: i64,
}

/// Execute a queue of planned actions in order.
///
/// # Errors
///
/// Returns [`GameError::UnknownAction`] if the queue references an action
/// ID missing from the scenario. Skips (unaffordable, unavailable) are
/// reported per outcome, never as errors.
#[allow(clippy::too_many_arguments)]
pub fn run_action_phase(
    queue: &[PlannedAction],
    scenario: &Scenario,
    ledger: &mut ResourceLedger,
    roster: &mut OpponentRoster,
    upgrades: &mut BTreeSet<String>,
    fired_milestones: &BTreeSet<String>,
    flags: &BTreeSet<String>,
    turn: u32,
    rng: &mut DeterministicRng,
) -> Result<ActionPhaseResult> {
    let mut result = ActionPhaseResult::default();

    for planned in queue {
        let def = scenario
            .action(&planned.action_id)
            .ok_or_else(|| GameError::UnknownAction(planned.action_id.clone()))?;

        let outcome = execute_one(
            planned,
            def,
            scenario,
            ledger,
            roster,
            upgrades,
            fired_milestones,
            flags,
            turn,
            result.staff_occupied,
            rng,
        );
        if outcome.skipped.is_none() && planned.delegated {
            if let Some(policy) = &def.delegation {
                result.staff_occupied += policy.staff_required;
            }
        }
        result.outcomes.push(outcome);
    }

    Ok(result)
}

#[allow(clippy::too_many_arguments)]
fn execute_one(
    planned: &PlannedAction,
    def: &ActionDef,
    scenario: &Scenario,
    ledger: &mut ResourceLedger,
    roster: &mut OpponentRoster,
    upgrades: &mut BTreeSet<String>,
    fired_milestones: &BTreeSet<String>,
    flags: &BTreeSet<String>,
    turn: u32,
    staff_occupied: i64,
    rng: &mut DeterministicRng,
) -> ActionOutcome {
    let available = {
        let snapshot = ledger.snapshot();
        let ctx = EvalContext {
            snapshot: &snapshot,
            turn,
            turn_spend: ledger.turn_spend(),
            fired_milestones,
            upgrades,
            flags,
        };
        all_satisfied(&def.requirements, &ctx)
    };
    if !available {
        return ActionOutcome::skipped(planned, SkipReason::RequirementsNotMet);
    }

    let (ap_cost, effectiveness) = if planned.delegated {
        let Some(policy) = &def.delegation else {
            return ActionOutcome::skipped(planned, SkipReason::DelegationUnavailable);
        };
        let free_staff = ledger.get(Attribute::Staff) - staff_occupied;
        if free_staff < policy.staff_required {
            return ActionOutcome::skipped(planned, SkipReason::InsufficientStaff);
        }
        (policy.ap_cost, policy.effectiveness_percent)
    } else {
        (def.ap_cost, 100)
    };

    // All checks before any deduction: no partial execution.
    if ledger.get(Attribute::Money) < def.money_cost {
        return ActionOutcome::skipped(planned, SkipReason::InsufficientMoney);
    }
    if ledger.get(Attribute::ActionPoints) < ap_cost {
        return ActionOutcome::skipped(planned, SkipReason::InsufficientActionPoints);
    }

    let mut adjustments = Vec::new();
    if def.money_cost > 0 {
        adjustments.push(ledger.add(
            Attribute::Money,
            -def.money_cost,
            &format!("action:{}:cost", def.id),
        ));
    }
    if ap_cost > 0 {
        adjustments.push(ledger.add(
            Attribute::ActionPoints,
            -ap_cost,
            &format!("action:{}:cost", def.id),
        ));
    }

    let snapshot = ledger.snapshot();
    let mut deltas = resolve_all(&def.upside, &snapshot, rng);
    deltas.extend(resolve_all(&def.downside, &snapshot, rng));
    if effectiveness < 100 {
        scale_deltas(&mut deltas, effectiveness);
    }
    for delta in deltas {
        adjustments.push(ledger.add(delta.attribute, delta.amount, &format!("action:{}", def.id)));
    }

    let granted_upgrade = def.grants_upgrade.clone();
    if let Some(upgrade) = &granted_upgrade {
        upgrades.insert(upgrade.clone());
    }

    let espionage = def.espionage.as_ref().and_then(|spec| {
        roster.reveal(
            spec.agent.as_deref(),
            spec.stat,
            scenario.config.espionage_noise_percent,
            turn,
            rng,
        )
    });

    ActionOutcome {
        action_id: def.id.clone(),
        delegated: planned.delegated,
        skipped: None,
        adjustments,
        granted_upgrade,
        espionage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerSnapshot;
    use crate::rng::Seed;

    struct Harness {
        scenario: Scenario,
        ledger: ResourceLedger,
        roster: OpponentRoster,
        upgrades: BTreeSet<String>,
    }

    impl Harness {
        fn new(money: i64, staff: i64, ap: i64) -> Self {
            let scenario = Scenario::builtin();
            let roster = OpponentRoster::new(&scenario);
            let mut ledger = ResourceLedger::new(&LedgerSnapshot::from_values(&[
                (Attribute::Money, money),
                (Attribute::Staff, staff),
                (Attribute::Reputation, 50),
                (Attribute::Doom, 25),
                (Attribute::ActionPoints, ap),
            ]));
            ledger.begin_turn(1);
            Self {
                scenario,
                ledger,
                roster,
                upgrades: BTreeSet::new(),
            }
        }

        fn run(&mut self, queue: &[PlannedAction]) -> ActionPhaseResult {
            let fired = BTreeSet::new();
            let flags = BTreeSet::new();
            let mut rng = DeterministicRng::for_turn(&Seed::from("actions"), 1);
            run_action_phase(
                queue,
                &self.scenario,
                &mut self.ledger,
                &mut self.roster,
                &mut self.upgrades,
                &fired,
                &flags,
                1,
                &mut rng,
            )
            .unwrap()
        }
    }

    #[test]
    fn test_costs_deducted_and_effects_applied() {
        let mut h = Harness::new(10_000, 3, 3);
        let result = h.run(&[PlannedAction::direct("hire_staff")]);

        assert!(result.outcomes[0].skipped.is_none());
        assert_eq!(h.ledger.get(Attribute::Money), 8_000);
        assert_eq!(h.ledger.get(Attribute::ActionPoints), 2);
        assert_eq!(h.ledger.get(Attribute::Staff), 4);
    }

    #[test]
    fn test_unaffordable_action_skipped_without_partial_deduction() {
        let mut h = Harness::new(500, 3, 3);
        let result = h.run(&[PlannedAction::direct("hire_staff")]);

        assert_eq!(result.outcomes[0].skipped, Some(SkipReason::InsufficientMoney));
        assert_eq!(h.ledger.get(Attribute::Money), 500);
        assert_eq!(h.ledger.get(Attribute::ActionPoints), 3);
        assert_eq!(h.ledger.get(Attribute::Staff), 3);
    }

    #[test]
    fn test_ap_exhaustion_skips_later_actions() {
        let mut h = Harness::new(50_000, 3, 2);
        let queue = [
            PlannedAction::direct("hire_staff"),
            PlannedAction::direct("buy_compute"),
            PlannedAction::direct("safety_research"),
        ];
        let result = h.run(&queue);

        assert!(result.outcomes[0].skipped.is_none());
        assert!(result.outcomes[1].skipped.is_none());
        assert_eq!(
            result.outcomes[2].skipped,
            Some(SkipReason::InsufficientActionPoints)
        );
    }

    #[test]
    fn test_unknown_action_is_error() {
        let mut h = Harness::new(10_000, 3, 3);
        let fired = BTreeSet::new();
        let flags = BTreeSet::new();
        let mut rng = DeterministicRng::for_turn(&Seed::from("actions"), 1);
        let result = run_action_phase(
            &[PlannedAction::direct("transmute_gold")],
            &h.scenario,
            &mut h.ledger,
            &mut h.roster,
            &mut h.upgrades,
            &fired,
            &flags,
            1,
            &mut rng,
        );
        assert!(matches!(result, Err(GameError::UnknownAction(_))));
    }

    #[test]
    fn test_delegation_needs_free_staff_and_scales_outcome() {
        // safety_research delegation: 3 staff, 80% effectiveness, 0 AP.
        let mut h = Harness::new(10_000, 2, 3);
        let result = h.run(&[PlannedAction::delegated("safety_research")]);
        assert_eq!(result.outcomes[0].skipped, Some(SkipReason::InsufficientStaff));

        let mut h = Harness::new(10_000, 3, 3);
        let result = h.run(&[PlannedAction::delegated("safety_research")]);
        assert!(result.outcomes[0].skipped.is_none());
        assert_eq!(result.staff_occupied, 3);
        // Delegated execution spends no action points.
        assert_eq!(h.ledger.get(Attribute::ActionPoints), 3);
        // Doom delta in [-5, -2] scaled to 80%: at most -1 moved.
        let doom = h.ledger.get(Attribute::Doom);
        assert!(doom < 25 && doom >= 21);
    }

    #[test]
    fn test_delegation_without_policy_skipped() {
        let mut h = Harness::new(10_000, 10, 3);
        let result = h.run(&[PlannedAction::delegated("hire_staff")]);
        assert_eq!(
            result.outcomes[0].skipped,
            Some(SkipReason::DelegationUnavailable)
        );
    }

    #[test]
    fn test_occupied_staff_reduce_later_delegations() {
        // Two delegations needing 3 + 2 staff out of 4 total: second one
        // must be skipped.
        let mut h = Harness::new(10_000, 4, 3);
        let queue = [
            PlannedAction::delegated("safety_research"),
            PlannedAction::delegated("community_outreach"),
        ];
        let result = h.run(&queue);
        assert!(result.outcomes[0].skipped.is_none());
        assert_eq!(result.outcomes[1].skipped, Some(SkipReason::InsufficientStaff));
        assert_eq!(result.staff_occupied, 3);
    }

    #[test]
    fn test_upgrade_granted_and_requirement_gates_repurchase() {
        let mut h = Harness::new(50_000, 3, 3);
        let result = h.run(&[PlannedAction::direct("hire_manager")]);
        assert_eq!(result.outcomes[0].granted_upgrade.as_deref(), Some("manager"));
        assert!(h.upgrades.contains("manager"));

        // Second purchase fails the UpgradeMissing requirement.
        let result = h.run(&[PlannedAction::direct("hire_manager")]);
        assert_eq!(
            result.outcomes[0].skipped,
            Some(SkipReason::RequirementsNotMet)
        );
    }

    #[test]
    fn test_espionage_action_logs_discovery() {
        let mut h = Harness::new(50_000, 3, 3);
        let result = h.run(&[PlannedAction::direct("espionage_probe")]);

        let report = result.outcomes[0].espionage.as_ref().unwrap();
        assert!(h.roster.discoveries().contains_key(&report.agent_id));
    }
}
