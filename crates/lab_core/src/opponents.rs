//! Hidden rival organizations.
//!
//! Rivals run a simplified version of the player's economy: each turn they
//! split a spend allowance across research, hiring, compute, and lobbying
//! with jittered weighted proportions, then convert researchers and direct
//! research spending into capability progress. Their true state is hidden
//! from the player except through espionage, which returns noisy point
//! samples recorded in a discovery log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::{OpponentDef, OpponentStat, OpponentTuning, Scenario};
use crate::rng::DeterministicRng;

/// Base allocation weights in priority order: research, hiring, compute,
/// lobbying. Each is jittered per turn so rivals do not all develop
/// identically, but the priority holds on average.
const ALLOCATION_WEIGHTS: [i64; 4] = [4, 3, 2, 1];

/// Runtime state of one rival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentAgent {
    /// Definition ID.
    pub id: String,
    /// Remaining budget.
    pub budget: i64,
    /// Researcher headcount.
    pub researchers: i64,
    /// Compute units.
    pub compute: i64,
    /// Lobbyist headcount.
    pub lobbyists: i64,
    /// Accumulated capability progress.
    pub progress: i64,
}

impl OpponentAgent {
    fn from_def(def: &OpponentDef) -> Self {
        Self {
            id: def.id.clone(),
            budget: def.budget,
            researchers: def.researchers,
            compute: def.compute,
            lobbyists: def.lobbyists,
            progress: 0,
        }
    }

    /// Read one statistic's true value.
    #[must_use]
    pub const fn stat(&self, stat: OpponentStat) -> i64 {
        match stat {
            OpponentStat::Budget => self.budget,
            OpponentStat::Researchers => self.researchers,
            OpponentStat::Compute => self.compute,
            OpponentStat::Lobbyists => self.lobbyists,
            OpponentStat::Progress => self.progress,
        }
    }
}

/// One noisy espionage observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discovery {
    /// Turn the observation was made.
    pub turn: u32,
    /// Statistic sampled.
    pub stat: OpponentStat,
    /// Observed (noised) value.
    pub observed: i64,
}

/// Result of one espionage probe, also appended to the discovery log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EspionageReport {
    /// Rival that was probed.
    pub agent_id: String,
    /// Statistic sampled.
    pub stat: OpponentStat,
    /// Observed (noised) value.
    pub observed: i64,
}

/// Aggregate outcome of one opponent phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentPhaseReport {
    /// Doom contributed by rival capability work this turn.
    pub doom_delta: i64,
    /// Progress gained this turn, keyed by rival ID, for rivals whose
    /// progress espionage has revealed. Undiscovered rivals stay hidden.
    pub progress_deltas: BTreeMap<String, i64>,
    /// Rival that crossed its progress ceiling, if any.
    pub breakout: Option<String>,
}

/// All rivals plus the player's accumulated intelligence about them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentRoster {
    agents: Vec<OpponentAgent>,
    discoveries: BTreeMap<String, Vec<Discovery>>,
}

impl OpponentRoster {
    /// Build the roster from scenario definitions, preserving their order
    /// (iteration order is part of the deterministic contract).
    #[must_use]
    pub fn new(scenario: &Scenario) -> Self {
        Self {
            agents: scenario.opponents.iter().map(OpponentAgent::from_def).collect(),
            discoveries: BTreeMap::new(),
        }
    }

    /// True rival states. Engine-internal; UIs should only surface
    /// [`discoveries`](Self::discoveries).
    #[must_use]
    pub fn agents(&self) -> &[OpponentAgent] {
        &self.agents
    }

    /// Everything espionage has revealed, keyed by rival ID.
    #[must_use]
    pub const fn discoveries(&self) -> &BTreeMap<String, Vec<Discovery>> {
        &self.discoveries
    }

    /// Run one turn of rival activity.
    ///
    /// Each rival splits its spend allowance across research, hiring,
    /// compute, and lobbying with jittered weighted proportions, then
    /// gains progress from its researchers (boosted by compute) plus the
    /// progress bought directly with research spend. The share of progress
    /// aimed at raw capability feeds the returned doom delta. Breakout is
    /// checked against the definition's ceiling.
    pub fn advance(&mut self, scenario: &Scenario, rng: &mut DeterministicRng) -> OpponentPhaseReport {
        let tuning = &scenario.config.opponents;
        let mut report = OpponentPhaseReport::default();

        for agent in &mut self.agents {
            let Some(def) = scenario.opponents.iter().find(|d| d.id == agent.id) else {
                continue;
            };

            let bought = allocate_budget(agent, tuning, rng);

            let effective = agent
                .researchers
                .saturating_mul(100 + agent.compute.saturating_mul(i64::from(tuning.compute_boost_percent)))
                / 100;
            let gained = effective.saturating_add(bought);
            agent.progress = agent.progress.saturating_add(gained);

            let capability_share =
                gained.saturating_mul(i64::from(def.capability_focus_percent)) / 100;
            report.doom_delta += capability_share / tuning.doom_divisor.max(1);

            let progress_known = self
                .discoveries
                .get(&agent.id)
                .is_some_and(|log| log.iter().any(|d| d.stat == OpponentStat::Progress));
            if progress_known {
                report.progress_deltas.insert(agent.id.clone(), gained);
            }

            if agent.progress >= def.progress_max && report.breakout.is_none() {
                tracing::info!(agent = %agent.id, progress = agent.progress, "Rival crossed capability ceiling");
                report.breakout = Some(agent.id.clone());
            }
        }

        report
    }

    /// Sample one rival statistic with noise and log the discovery.
    ///
    /// `agent` and `stat` default to uniform random picks when unset.
    /// Returns `None` only when the roster is empty.
    pub fn reveal(
        &mut self,
        agent: Option<&str>,
        stat: Option<OpponentStat>,
        noise_percent: u32,
        turn: u32,
        rng: &mut DeterministicRng,
    ) -> Option<EspionageReport> {
        if self.agents.is_empty() {
            return None;
        }

        let index = match agent {
            Some(id) => self.agents.iter().position(|a| a.id == id)?,
            None => {
                let weights = vec![1u64; self.agents.len()];
                rng.weighted_choice(&weights)?
            }
        };
        let stat = match stat {
            Some(stat) => stat,
            None => {
                let pick = rng.weighted_choice(&[1; OpponentStat::ALL.len()])?;
                OpponentStat::ALL[pick]
            }
        };

        let agent = &self.agents[index];
        let truth = agent.stat(stat);
        let noise = i64::from(noise_percent);
        let observed = truth.saturating_mul(100 + rng.draw_range(-noise, noise)) / 100;

        let report = EspionageReport {
            agent_id: agent.id.clone(),
            stat,
            observed,
        };
        self.discoveries
            .entry(report.agent_id.clone())
            .or_default()
            .push(Discovery {
                turn,
                stat,
                observed,
            });
        Some(report)
    }
}

/// Split one turn's spend allowance across research, hiring, compute, and
/// lobbying. Each base weight is jittered to 50..150% of itself, and each
/// category buys as many whole units as its share affords; only spent
/// money leaves the budget. Returns the progress bought by research spend.
///
/// The four jitter draws happen unconditionally, so the draw stream stays
/// aligned even for broke rivals.
fn allocate_budget(
    agent: &mut OpponentAgent,
    tuning: &OpponentTuning,
    rng: &mut DeterministicRng,
) -> i64 {
    let mut weights = [0_i64; 4];
    let mut total = 0_i64;
    for (weight, base) in weights.iter_mut().zip(ALLOCATION_WEIGHTS) {
        *weight = base.saturating_mul(rng.draw_range(50, 150));
        total = total.saturating_add(*weight);
    }

    let allowance = agent.budget / tuning.spend_divisor.max(1);
    if allowance <= 0 || total <= 0 {
        return 0;
    }

    let mut buy = |weight: i64, cost: i64| -> i64 {
        if cost <= 0 {
            return 0;
        }
        let units = allowance.saturating_mul(weight) / total / cost;
        agent.budget -= units * cost;
        units
    };

    let bought_progress = buy(weights[0], tuning.research_cost);
    let hires = buy(weights[1], tuning.hire_cost);
    let nodes = buy(weights[2], tuning.compute_cost);
    let lobbyists = buy(weights[3], tuning.lobby_cost);

    agent.researchers += hires;
    agent.compute += nodes;
    agent.lobbyists += lobbyists;
    bought_progress
}
