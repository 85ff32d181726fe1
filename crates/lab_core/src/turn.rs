//! Turn pipeline and game session.
//!
//! A turn runs a fixed phase order: action queue, events, static effects,
//! upkeep (research production and salaries), opponents, terminal checks.
//! Milestones are observed after every phase. Popups pause the pipeline
//! between the event phase and the rest; the per-turn random stream is
//! stashed across the pause so the resumed turn draws from exactly where
//! it left off.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::actions::{run_action_phase, ActionPhaseResult, PlannedAction};
use crate::data::Scenario;
use crate::error::{GameError, Result};
use crate::events::{EventReport, EventScheduler, PopupResponse};
use crate::ledger::{Attribute, ResourceLedger};
use crate::milestones::{MilestoneEngine, MilestoneReport, StaticEffectReport};
use crate::opponents::{OpponentPhaseReport, OpponentRoster};
use crate::replay::TurnInput;
use crate::rng::{DeterministicRng, Seed, StableHasher};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    /// Between turns, ready for a queue.
    Ready,
    /// Mid-turn, paused on a blocking popup.
    AwaitingPopup,
    /// Game over; no further turns accepted.
    Completed,
}

/// Why the game ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOver {
    /// Doom reached its ceiling.
    DoomMaxed,
    /// Out of money with nobody left on payroll.
    Bankrupt,
    /// A rival crossed its capability ceiling.
    OpponentBreakout {
        /// The rival that broke out.
        agent_id: String,
    },
    /// Reached the final turn intact.
    Survived,
}

/// Upkeep phase results: production and payroll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpkeepReport {
    /// Research produced by unoccupied, supervised staff.
    pub research_produced: i64,
    /// Salary actually paid.
    pub salaries_paid: i64,
    /// Staff who left over unpaid salary.
    pub departures: i64,
}

/// Everything that happened in one completed turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReport {
    /// Turn number (1-based).
    pub turn: u32,
    /// Action phase outcomes.
    pub actions: ActionPhaseResult,
    /// Event resolutions, including popup responses and forced expiries.
    pub events: Vec<EventReport>,
    /// Milestones fired this turn.
    pub milestones: Vec<MilestoneReport>,
    /// Static effects applied or retired this turn.
    pub statics: Vec<StaticEffectReport>,
    /// Upkeep results.
    pub upkeep: UpkeepReport,
    /// Opponent phase results.
    pub opponents: OpponentPhaseReport,
    /// Set when this turn ended the game.
    pub game_over: Option<GameOver>,
    /// Whether the observation step budget was exhausted and the turn was
    /// force-completed.
    pub degraded: bool,
    /// Random draws consumed this turn. Two runs of the same seed and
    /// inputs must agree on this per turn; a mismatch pinpoints where a
    /// divergence started.
    pub draws: u64,
}

/// Result of advancing the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnAdvance {
    /// The pipeline paused on a popup; respond to continue.
    AwaitingPopup {
        /// Event awaiting a response.
        event_id: String,
    },
    /// The turn ran to completion.
    Completed(TurnReport),
}

/// One running game.
#[derive(Debug, Clone)]
pub struct GameSession {
    scenario: Scenario,
    seed: Seed,
    turn: u32,
    phase: TurnPhase,
    ledger: ResourceLedger,
    events: EventScheduler,
    milestones: MilestoneEngine,
    opponents: OpponentRoster,
    upgrades: BTreeSet<String>,
    game_over: Option<GameOver>,
    degraded: bool,
    staff_occupied: i64,
    observe_steps: u32,
    turn_rng: Option<DeterministicRng>,
    early_queue: Vec<String>,
    report: TurnReport,
    current_input: TurnInput,
    recording: Vec<TurnInput>,
}

impl GameSession {
    /// Start a new game.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ValidationError`] if the scenario is invalid.
    pub fn new(scenario: Scenario, seed: Seed) -> Result<Self> {
        scenario.validate()?;
        let mut ledger = ResourceLedger::new(&scenario.config.starting_snapshot());
        // Starting values are not milestone triggers.
        ledger.drain_mutations();
        let opponents = OpponentRoster::new(&scenario);
        Ok(Self {
            scenario,
            seed,
            turn: 0,
            phase: TurnPhase::Ready,
            ledger,
            events: EventScheduler::default(),
            milestones: MilestoneEngine::default(),
            opponents,
            upgrades: BTreeSet::new(),
            game_over: None,
            degraded: false,
            staff_occupied: 0,
            observe_steps: 0,
            turn_rng: None,
            early_queue: Vec::new(),
            report: TurnReport::default(),
            current_input: TurnInput::default(),
            recording: Vec::new(),
        })
    }

    /// The scenario this session runs.
    #[must_use]
    pub const fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// The game seed.
    #[must_use]
    pub const fn seed(&self) -> &Seed {
        &self.seed
    }

    /// Number of the last completed (or in-progress) turn.
    #[must_use]
    pub const fn turn(&self) -> u32 {
        self.turn
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Numeric game state.
    #[must_use]
    pub const fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Event state (pending popup, flags, deferrals).
    #[must_use]
    pub const fn events(&self) -> &EventScheduler {
        &self.events
    }

    /// Milestone state.
    #[must_use]
    pub const fn milestones(&self) -> &MilestoneEngine {
        &self.milestones
    }

    /// Rival state and discoveries.
    #[must_use]
    pub const fn opponents(&self) -> &OpponentRoster {
        &self.opponents
    }

    /// Upgrades owned.
    #[must_use]
    pub const fn upgrades(&self) -> &BTreeSet<String> {
        &self.upgrades
    }

    /// How the game ended, if it has.
    #[must_use]
    pub const fn game_over(&self) -> Option<&GameOver> {
        self.game_over.as_ref()
    }

    /// Whether any turn so far was force-completed.
    #[must_use]
    pub const fn degraded(&self) -> bool {
        self.degraded
    }

    /// Inputs of every completed turn, for replay capture.
    #[must_use]
    pub fn recorded_inputs(&self) -> &[TurnInput] {
        &self.recording
    }

    /// Ask for a queued deferred decision to be settled ahead of its
    /// expiry. It resolves at full strength during the next turn's event
    /// phase, before new triggers are evaluated. Asking twice for the
    /// same event is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] when called mid-popup or after
    /// game over, or when `event_id` is not currently deferred.
    pub fn resolve_deferred(&mut self, event_id: &str) -> Result<()> {
        if self.phase != TurnPhase::Ready {
            return Err(GameError::InvalidState(
                "deferred decisions can only be settled between turns".to_string(),
            ));
        }
        if !self
            .events
            .deferred()
            .iter()
            .any(|entry| entry.event_id == event_id)
        {
            return Err(GameError::InvalidState(format!(
                "event '{event_id}' is not deferred"
            )));
        }
        if !self.early_queue.iter().any(|id| id == event_id) {
            self.early_queue.push(event_id.to_string());
        }
        Ok(())
    }

    /// Run one turn with the given action queue.
    ///
    /// Returns [`TurnAdvance::AwaitingPopup`] if an event blocks the
    /// turn; answer it with [`respond_to_popup`](Self::respond_to_popup).
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] when called mid-popup or after
    /// game over, and [`GameError::UnknownAction`] for a bad queue entry.
    pub fn end_turn(&mut self, queue: Vec<PlannedAction>) -> Result<TurnAdvance> {
        match self.phase {
            TurnPhase::Ready => {}
            TurnPhase::AwaitingPopup => {
                return Err(GameError::InvalidState(
                    "a popup is awaiting a response".to_string(),
                ))
            }
            TurnPhase::Completed => {
                return Err(GameError::InvalidState("the game is over".to_string()))
            }
        }

        self.turn += 1;
        self.observe_steps = 0;
        self.ledger.begin_turn(self.turn);
        self.report = TurnReport {
            turn: self.turn,
            ..TurnReport::default()
        };
        self.current_input = TurnInput {
            queue: queue.clone(),
            early: std::mem::take(&mut self.early_queue),
            responses: Vec::new(),
        };
        let mut rng = DeterministicRng::for_turn(&self.seed, self.turn);

        self.ledger.refill(
            Attribute::ActionPoints,
            self.scenario.config.action_points_per_turn,
            "turn:refill",
        );
        self.ledger.drain_mutations();

        let actions = run_action_phase(
            &queue,
            &self.scenario,
            &mut self.ledger,
            &mut self.opponents,
            &mut self.upgrades,
            self.milestones.fired(),
            self.events.flags(),
            self.turn,
            &mut rng,
        )?;
        self.staff_occupied = actions.staff_occupied;
        self.report.actions = actions;
        self.observe_until_quiet(&mut rng);

        // Early resolutions settle before this turn's triggers run.
        for event_id in self.current_input.early.clone() {
            if let Some(report) =
                self.events
                    .resolve_early(&self.scenario, &event_id, &mut self.ledger, &mut rng)
            {
                self.report.events.push(report);
            }
        }
        self.observe_until_quiet(&mut rng);

        let events = self.events.trigger_phase(
            &self.scenario,
            &mut self.ledger,
            self.turn,
            &self.upgrades,
            self.milestones.fired(),
            &mut rng,
        );
        self.report.events.extend(events);
        self.observe_until_quiet(&mut rng);

        if let Some(event_id) = self.events.pending_popup() {
            let event_id = event_id.to_string();
            self.turn_rng = Some(rng);
            self.phase = TurnPhase::AwaitingPopup;
            return Ok(TurnAdvance::AwaitingPopup { event_id });
        }

        self.finish_turn(rng)
    }

    /// Answer the popup currently blocking the turn.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] when no turn is paused,
    /// [`GameError::NoPendingPopup`] when `event_id` is not the blocking
    /// popup.
    pub fn respond_to_popup(
        &mut self,
        event_id: &str,
        response: PopupResponse,
    ) -> Result<TurnAdvance> {
        if self.phase != TurnPhase::AwaitingPopup {
            return Err(GameError::InvalidState(
                "no popup is awaiting a response".to_string(),
            ));
        }
        let mut rng = self
            .turn_rng
            .take()
            .ok_or_else(|| GameError::InvalidState("paused turn lost its random stream".to_string()))?;

        let resolved = match self.events.respond(
            &self.scenario,
            event_id,
            response,
            &mut self.ledger,
            self.turn,
            &mut rng,
        ) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.turn_rng = Some(rng);
                return Err(err);
            }
        };
        self.current_input
            .responses
            .push((event_id.to_string(), response));
        self.report.events.extend(resolved);
        self.observe_until_quiet(&mut rng);

        if let Some(next) = self.events.pending_popup() {
            let event_id = next.to_string();
            self.turn_rng = Some(rng);
            return Ok(TurnAdvance::AwaitingPopup { event_id });
        }

        self.finish_turn(rng)
    }

    fn finish_turn(&mut self, mut rng: DeterministicRng) -> Result<TurnAdvance> {
        let statics = self.milestones.apply_static(
            &self.scenario,
            &mut self.ledger,
            self.turn,
            &self.upgrades,
            self.events.flags(),
            &mut rng,
        );
        self.report.statics = statics;
        self.observe_until_quiet(&mut rng);

        self.run_upkeep();
        self.observe_until_quiet(&mut rng);

        let opponents = self.opponents.advance(&self.scenario, &mut rng);
        if opponents.doom_delta != 0 {
            self.ledger
                .add(Attribute::Doom, opponents.doom_delta, "opponents:capability");
        }
        self.report.opponents = opponents;
        self.observe_until_quiet(&mut rng);

        self.check_game_over();

        self.recording.push(std::mem::take(&mut self.current_input));
        self.report.draws = rng.draw_count();
        self.report.game_over = self.game_over.clone();
        self.phase = if self.game_over.is_some() {
            TurnPhase::Completed
        } else {
            TurnPhase::Ready
        };
        self.turn_rng = None;

        let report = std::mem::take(&mut self.report);
        tracing::debug!(
            turn = report.turn,
            doom = self.ledger.get(Attribute::Doom),
            money = self.ledger.get(Attribute::Money),
            over = report.game_over.is_some(),
            "Turn completed"
        );
        Ok(TurnAdvance::Completed(report))
    }

    /// Loop milestone observation until a pass fires nothing, bounded by
    /// the configured step budget. Exhausting the budget force-completes
    /// the turn and marks the session degraded instead of hanging.
    fn observe_until_quiet(&mut self, rng: &mut DeterministicRng) {
        loop {
            if self.observe_steps >= self.scenario.config.stuck_step_budget {
                if !self.report.degraded {
                    tracing::warn!(
                        turn = self.turn,
                        budget = self.scenario.config.stuck_step_budget,
                        "Observation step budget exhausted, force-completing turn"
                    );
                }
                self.degraded = true;
                self.report.degraded = true;
                self.ledger.drain_mutations();
                return;
            }
            self.observe_steps += 1;

            let fired = self.milestones.observe(
                &self.scenario,
                &mut self.ledger,
                self.turn,
                &self.upgrades,
                self.events.flags(),
                rng,
            );
            if fired.is_empty() {
                return;
            }
            self.report.milestones.extend(fired);
        }
    }

    fn run_upkeep(&mut self) {
        let config = &self.scenario.config;
        let staff = self.ledger.get(Attribute::Staff);

        let mut productive = (staff - self.staff_occupied).max(0);
        if let Some(cap) = self.milestones.supervision_cap(&self.scenario) {
            productive = productive.min(cap.max(0));
        }
        let produced = productive.saturating_mul(config.research_per_staff);
        if produced > 0 {
            self.ledger.add(Attribute::Research, produced, "upkeep:production");
        }

        let mut upkeep = UpkeepReport {
            research_produced: produced,
            ..UpkeepReport::default()
        };

        let salary = staff.saturating_mul(config.salary_per_staff);
        if salary > 0 {
            let paid = self.ledger.add(Attribute::Money, -salary, "upkeep:salaries");
            upkeep.salaries_paid = -paid.applied;
            let unpaid = paid.applied - paid.requested;
            if unpaid > 0 && config.salary_per_staff > 0 {
                // Unpaid staff walk: one per full salary short.
                let departures =
                    (unpaid + config.salary_per_staff - 1) / config.salary_per_staff;
                let left = self.ledger.add(Attribute::Staff, -departures, "upkeep:departures");
                upkeep.departures = -left.applied;
            }
        }

        self.report.upkeep = upkeep;
        self.staff_occupied = 0;
    }

    fn check_game_over(&mut self) {
        let doom = self.ledger.get(Attribute::Doom);
        let money = self.ledger.get(Attribute::Money);
        let staff = self.ledger.get(Attribute::Staff);

        self.game_over = if doom >= 100 {
            Some(GameOver::DoomMaxed)
        } else if let Some(agent_id) = self.report.opponents.breakout.clone() {
            Some(GameOver::OpponentBreakout { agent_id })
        } else if money == 0 && staff == 0 {
            Some(GameOver::Bankrupt)
        } else if self.turn >= self.scenario.config.max_turns {
            Some(GameOver::Survived)
        } else {
            None
        };
    }

    /// Hash of the observable game state, in canonical field order.
    ///
    /// Two sessions with the same seed and the same inputs produce the
    /// same hash after every turn; replay verification and the
    /// determinism harness both rest on this. The fold goes through
    /// [`StableHasher`] because these hashes are persisted in replay
    /// files and compared across machines and toolchain versions.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = StableHasher::new();
        hasher.write_u32(self.turn);
        for attribute in Attribute::ALL {
            hasher.write_i64(self.ledger.get(attribute));
        }
        hasher.write_i64(self.ledger.turn_spend());
        for upgrade in &self.upgrades {
            hasher.write_str(upgrade);
        }
        for flag in self.events.flags() {
            hasher.write_str(flag);
        }
        for entry in self.events.deferred() {
            hasher.write_str(&entry.event_id);
            hasher.write_u32(entry.expires_at_turn);
        }
        for milestone in self.milestones.fired() {
            hasher.write_str(milestone);
        }
        for active in self.milestones.active() {
            hasher.write_str(&active.milestone_id);
            hasher.write_u32(active.activated_turn);
            hasher.write_u32(active.turns_active);
        }
        for agent in self.opponents.agents() {
            hasher.write_str(&agent.id);
            hasher.write_i64(agent.budget);
            hasher.write_i64(agent.researchers);
            hasher.write_i64(agent.compute);
            hasher.write_i64(agent.lobbyists);
            hasher.write_i64(agent.progress);
        }
        hasher.write_bool(self.degraded);
        hasher.finish()
    }

    pub(crate) fn restore_parts(parts: SessionParts) -> Self {
        Self {
            scenario: parts.scenario,
            seed: parts.seed,
            turn: parts.turn,
            phase: if parts.game_over.is_some() {
                TurnPhase::Completed
            } else {
                TurnPhase::Ready
            },
            ledger: parts.ledger,
            events: parts.events,
            milestones: parts.milestones,
            opponents: parts.opponents,
            upgrades: parts.upgrades,
            game_over: parts.game_over,
            degraded: parts.degraded,
            staff_occupied: 0,
            observe_steps: 0,
            turn_rng: None,
            early_queue: parts.early_queue,
            report: TurnReport::default(),
            current_input: TurnInput::default(),
            recording: parts.recording,
        }
    }

    pub(crate) fn into_parts(self) -> SessionParts {
        SessionParts {
            scenario: self.scenario,
            seed: self.seed,
            turn: self.turn,
            ledger: self.ledger,
            events: self.events,
            milestones: self.milestones,
            opponents: self.opponents,
            upgrades: self.upgrades,
            game_over: self.game_over,
            degraded: self.degraded,
            early_queue: self.early_queue,
            recording: self.recording,
        }
    }

    pub(crate) fn parts_ref(&self) -> SessionParts {
        self.clone().into_parts()
    }
}

/// Between-turn session state, as persisted by saves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SessionParts {
    pub scenario: Scenario,
    pub seed: Seed,
    pub turn: u32,
    pub ledger: ResourceLedger,
    pub events: EventScheduler,
    pub milestones: MilestoneEngine,
    pub opponents: OpponentRoster,
    pub upgrades: BTreeSet<String>,
    pub game_over: Option<GameOver>,
    pub degraded: bool,
    #[serde(default)]
    pub early_queue: Vec<String>,
    pub recording: Vec<TurnInput>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GameConfig;

    fn session() -> GameSession {
        GameSession::new(Scenario::builtin(), Seed::from("turn-tests")).unwrap()
    }

    fn quiet_scenario() -> Scenario {
        // No events or opponents: turns complete without popups.
        Scenario {
            events: Vec::new(),
            opponents: Vec::new(),
            ..Scenario::builtin()
        }
    }

    fn complete(advance: TurnAdvance) -> TurnReport {
        match advance {
            TurnAdvance::Completed(report) => report,
            TurnAdvance::AwaitingPopup { event_id } => {
                panic!("unexpected popup: {event_id}")
            }
        }
    }

    #[test]
    fn test_turn_refills_action_points() {
        let mut session = GameSession::new(quiet_scenario(), Seed::from(1u64)).unwrap();
        let report = complete(
            session
                .end_turn(vec![PlannedAction::direct("safety_research")])
                .unwrap(),
        );
        assert_eq!(report.turn, 1);
        // 3 refilled, 1 spent.
        assert_eq!(session.ledger().get(Attribute::ActionPoints), 2);

        complete(session.end_turn(Vec::new()).unwrap());
        assert_eq!(session.ledger().get(Attribute::ActionPoints), 3);
    }

    #[test]
    fn test_upkeep_pays_salaries_and_produces_research() {
        let mut session = GameSession::new(quiet_scenario(), Seed::from(1u64)).unwrap();
        let money_before = session.ledger().get(Attribute::Money);
        let report = complete(session.end_turn(Vec::new()).unwrap());

        // 2 staff at 600 each.
        assert_eq!(report.upkeep.salaries_paid, 1_200);
        assert_eq!(report.upkeep.research_produced, 4);
        assert_eq!(session.ledger().get(Attribute::Money), money_before - 1_200);
        assert_eq!(session.ledger().get(Attribute::Research), 4);
    }

    #[test]
    fn test_unpaid_staff_depart_and_empty_lab_goes_bankrupt() {
        let mut scenario = quiet_scenario();
        scenario.config.starting_money = 700;
        scenario.config.starting_staff = 2;
        let mut session = GameSession::new(scenario, Seed::from(1u64)).unwrap();

        // Salary owed 1200, only 700 available: 500 unpaid, one departs.
        let report = complete(session.end_turn(Vec::new()).unwrap());
        assert_eq!(report.upkeep.departures, 1);
        assert_eq!(session.ledger().get(Attribute::Money), 0);
        assert_eq!(session.ledger().get(Attribute::Staff), 1);
        assert!(report.game_over.is_none());

        // Next turn the last member is fully unpaid and leaves.
        let report = complete(session.end_turn(Vec::new()).unwrap());
        assert_eq!(report.game_over, Some(GameOver::Bankrupt));
        assert_eq!(session.phase(), TurnPhase::Completed);
        assert!(session.end_turn(Vec::new()).is_err());
    }

    #[test]
    fn test_survival_at_max_turns() {
        let mut scenario = quiet_scenario();
        scenario.config.max_turns = 3;
        let mut session = GameSession::new(scenario, Seed::from(1u64)).unwrap();

        for _ in 0..2 {
            let report = complete(session.end_turn(Vec::new()).unwrap());
            assert!(report.game_over.is_none());
        }
        let report = complete(session.end_turn(Vec::new()).unwrap());
        assert_eq!(report.game_over, Some(GameOver::Survived));
    }

    #[test]
    fn test_doom_ceiling_ends_game() {
        let mut scenario = quiet_scenario();
        scenario.config.starting_doom = 99;
        scenario.config.starting_money = 1_000_000;
        let mut session = GameSession::new(scenario, Seed::from(1u64)).unwrap();

        // Capability research pushes doom by at least 1.
        let report = complete(
            session
                .end_turn(vec![PlannedAction::direct("capability_research")])
                .unwrap(),
        );
        assert_eq!(report.game_over, Some(GameOver::DoomMaxed));
    }

    #[test]
    fn test_opponent_breakout_ends_game() {
        let mut scenario = Scenario::builtin();
        scenario.events = Vec::new();
        scenario.opponents[0].progress_max = 1;
        let mut session = GameSession::new(scenario, Seed::from(1u64)).unwrap();

        let report = complete(session.end_turn(Vec::new()).unwrap());
        assert_eq!(
            report.game_over,
            Some(GameOver::OpponentBreakout {
                agent_id: "nimbus".to_string()
            })
        );
    }

    #[test]
    fn test_deferred_event_queues_without_blocking_turn() {
        use crate::data::{EventDef, EventKind, TriggerSpec};
        use crate::effects::EffectSpec;

        let mut scenario = quiet_scenario();
        scenario.events = vec![EventDef {
            id: "inquiry".to_string(),
            name: "Inquiry".to_string(),
            description: String::new(),
            kind: EventKind::Deferred,
            trigger: TriggerSpec::Always,
            effects: vec![EffectSpec::Flat {
                attribute: Attribute::Doom,
                amount: 7,
            }],
            reduced_effects: None,
            hidden_consequence: None,
            repeatable: false,
            max_deferred_turns: Some(4),
        }];
        let mut session = GameSession::new(scenario, Seed::from(1u64)).unwrap();

        // The turn completes outright; the decision waits in the queue.
        let report = complete(session.end_turn(Vec::new()).unwrap());
        assert!(report.events.is_empty());
        assert_eq!(session.phase(), TurnPhase::Ready);
        assert!(session
            .events()
            .deferred()
            .iter()
            .any(|entry| entry.event_id == "inquiry"));
        assert_eq!(session.ledger().get(Attribute::Doom), 25);

        // Settling early applies full strength in the next event phase.
        session.resolve_deferred("inquiry").unwrap();
        let report = complete(session.end_turn(Vec::new()).unwrap());
        assert!(report
            .events
            .iter()
            .any(|e| e.event_id == "inquiry" && e.response == Some(PopupResponse::Accept)));
        assert_eq!(session.ledger().get(Attribute::Doom), 32);

        // Nothing left to settle.
        assert!(session.resolve_deferred("inquiry").is_err());
    }

    #[test]
    fn test_popup_pauses_and_resumes_pipeline() {
        let mut scenario = Scenario::builtin();
        scenario.opponents = Vec::new();
        // Money low enough to trip the funding crisis popup.
        scenario.config.starting_money = 5_000;
        scenario.config.starting_staff = 5;
        let mut session = GameSession::new(scenario, Seed::from(3u64)).unwrap();

        // Spend down to the trigger threshold.
        let advance = session
            .end_turn(vec![
                PlannedAction::direct("hire_staff"),
                PlannedAction::direct("safety_research"),
            ])
            .unwrap();
        let TurnAdvance::AwaitingPopup { event_id } = advance else {
            panic!("expected a blocking popup");
        };
        assert_eq!(event_id, "funding_crisis");
        assert_eq!(session.phase(), TurnPhase::AwaitingPopup);

        // Turns cannot advance past an unanswered popup.
        assert!(session.end_turn(Vec::new()).is_err());

        let advance = session
            .respond_to_popup("funding_crisis", PopupResponse::Accept)
            .unwrap();
        let report = complete(advance);
        assert!(report
            .events
            .iter()
            .any(|e| e.event_id == "funding_crisis" && e.response == Some(PopupResponse::Accept)));
        assert_eq!(session.phase(), TurnPhase::Ready);
    }

    #[test]
    fn test_wrong_popup_response_keeps_turn_resumable() {
        let mut scenario = Scenario::builtin();
        scenario.opponents = Vec::new();
        scenario.config.starting_money = 1_000;
        let mut session = GameSession::new(scenario, Seed::from(3u64)).unwrap();

        let TurnAdvance::AwaitingPopup { event_id } = session.end_turn(Vec::new()).unwrap() else {
            panic!("expected a blocking popup");
        };

        assert!(session
            .respond_to_popup("not_a_popup", PopupResponse::Accept)
            .is_err());
        // The right response still works after the bad one.
        assert!(session.respond_to_popup(&event_id, PopupResponse::Accept).is_ok());
    }

    #[test]
    fn test_identical_seeds_produce_identical_hashes() {
        let run = || {
            let mut session = session();
            let mut hashes = Vec::new();
            for _ in 0..10 {
                let mut advance = session
                    .end_turn(vec![PlannedAction::direct("fundraise")])
                    .unwrap();
                while let TurnAdvance::AwaitingPopup { event_id } = advance {
                    advance = session
                        .respond_to_popup(&event_id, PopupResponse::Accept)
                        .unwrap();
                }
                hashes.push(session.state_hash());
                if session.game_over().is_some() {
                    break;
                }
            }
            hashes
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_different_seeds_diverge() {
        let run = |seed: u64| {
            let mut session =
                GameSession::new(quiet_scenario(), Seed::from(seed)).unwrap();
            for _ in 0..5 {
                complete(session.end_turn(vec![PlannedAction::direct("fundraise")]).unwrap());
            }
            session.state_hash()
        };
        assert_ne!(run(11), run(12));
    }

    #[test]
    fn test_step_budget_exhaustion_degrades_instead_of_hanging() {
        let mut scenario = quiet_scenario();
        scenario.config.stuck_step_budget = 0;
        let mut session = GameSession::new(scenario, Seed::from(1u64)).unwrap();

        let report = complete(session.end_turn(Vec::new()).unwrap());
        assert!(report.degraded);
        assert!(session.degraded());
    }

    #[test]
    fn test_supervision_cap_limits_production() {
        let mut scenario = quiet_scenario();
        scenario.config.starting_staff = 12;
        scenario.config.starting_money = 1_000_000;
        let mut session = GameSession::new(scenario, Seed::from(1u64)).unwrap();

        // Turn 1 fires the supervision milestone after upkeep, so all 12
        // staff still produce this turn.
        let report = complete(session.end_turn(Vec::new()).unwrap());
        assert!(session.milestones().fired().contains("growing_pains"));
        assert_eq!(report.upkeep.research_produced, 24);

        // Subsequent turns: only 9 of 12 staff produce.
        let report = complete(session.end_turn(Vec::new()).unwrap());
        let config = GameConfig::default();
        assert_eq!(
            report.upkeep.research_produced,
            config.supervisor_capacity * config.research_per_staff
        );
    }
}
